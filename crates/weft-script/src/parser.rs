//! Recursive-descent parser for the federation payload dialect.

use std::rc::Rc;

use crate::ast::{ArrowBody, BinaryOp, Expr, Stmt, UnaryOp};
use crate::error::ScriptError;
use crate::lexer::tokenize;
use crate::token::{Span, Token};

/// A parsed payload program, ready for evaluation.
#[derive(Debug, Clone)]
pub struct Script {
    stmts: Rc<[Stmt]>,
}

impl Script {
    /// Parse payload source text.
    pub fn parse(source: &str) -> Result<Script, ScriptError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let mut stmts = Vec::new();
        while !parser.at_end() {
            stmts.push(parser.statement()?);
        }
        Ok(Script {
            stmts: stmts.into(),
        })
    }

    pub fn statements(&self) -> &Rc<[Stmt]> {
        &self.stmts
    }
}

struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
}

impl Parser {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), ScriptError> {
        if self.check(token) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected {:?}", token)))
        }
    }

    fn unexpected(&self, context: &str) -> ScriptError {
        match self.tokens.get(self.pos) {
            Some((token, span)) => ScriptError::Parse(format!(
                "{}, found {} at byte {}",
                context, token, span.start
            )),
            None => ScriptError::Parse(format!("{}, found end of input", context)),
        }
    }

    fn ident(&mut self) -> Result<String, ScriptError> {
        match self.advance() {
            Some(Token::Ident(name)) => Ok(name),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.unexpected("expected identifier"))
            }
        }
    }

    fn string(&mut self) -> Result<String, ScriptError> {
        match self.advance() {
            Some(Token::Str(s)) => Ok(s),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.unexpected("expected string literal"))
            }
        }
    }

    // ---- statements ----

    fn statement(&mut self) -> Result<Stmt, ScriptError> {
        match self.peek() {
            Some(Token::Import) => self.import_statement(),
            Some(Token::Var) | Some(Token::Let) | Some(Token::Const) => self.var_statement(),
            Some(Token::If) => self.if_statement(),
            Some(Token::For) => self.for_in_statement(),
            Some(Token::Return) => {
                self.advance();
                let value = if self.terminates_statement() {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.check(&Token::Semicolon);
                Ok(Stmt::Return(value))
            }
            Some(Token::Throw) => {
                self.advance();
                let value = self.expression()?;
                self.check(&Token::Semicolon);
                Ok(Stmt::Throw(value))
            }
            Some(Token::LBrace) => Ok(Stmt::Block(self.block()?)),
            _ => {
                let expr = self.expression()?;
                self.check(&Token::Semicolon);
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn terminates_statement(&self) -> bool {
        matches!(
            self.peek(),
            None | Some(Token::Semicolon) | Some(Token::RBrace)
        )
    }

    fn import_statement(&mut self) -> Result<Stmt, ScriptError> {
        self.expect(&Token::Import)?;
        let local = self.ident()?;
        self.expect(&Token::From)?;
        let specifier = self.string()?;
        self.check(&Token::Semicolon);
        Ok(Stmt::Import { local, specifier })
    }

    fn var_statement(&mut self) -> Result<Stmt, ScriptError> {
        self.advance();
        let name = self.ident()?;
        let init = if self.check(&Token::Assign) {
            Some(self.expression()?)
        } else {
            None
        };
        self.check(&Token::Semicolon);
        Ok(Stmt::VarDecl { name, init })
    }

    fn if_statement(&mut self) -> Result<Stmt, ScriptError> {
        self.expect(&Token::If)?;
        self.expect(&Token::LParen)?;
        let cond = self.expression()?;
        self.expect(&Token::RParen)?;
        let then_branch = self.branch()?;
        let else_branch = if self.check(&Token::Else) {
            if self.peek() == Some(&Token::If) {
                Some(vec![self.if_statement()?])
            } else {
                Some(self.branch()?)
            }
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    fn for_in_statement(&mut self) -> Result<Stmt, ScriptError> {
        self.expect(&Token::For)?;
        self.expect(&Token::LParen)?;
        if matches!(
            self.peek(),
            Some(Token::Var) | Some(Token::Let) | Some(Token::Const)
        ) {
            self.advance();
        }
        let binding = self.ident()?;
        self.expect(&Token::In)?;
        let object = self.expression()?;
        self.expect(&Token::RParen)?;
        let body = self.branch()?;
        Ok(Stmt::ForIn {
            binding,
            object,
            body,
        })
    }

    /// A braced block, or a single statement treated as one.
    fn branch(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        if self.peek() == Some(&Token::LBrace) {
            self.block()
        } else {
            Ok(vec![self.statement()?])
        }
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        self.expect(&Token::LBrace)?;
        let mut stmts = Vec::new();
        while self.peek() != Some(&Token::RBrace) {
            if self.at_end() {
                return Err(self.unexpected("expected '}'"));
            }
            stmts.push(self.statement()?);
        }
        self.expect(&Token::RBrace)?;
        Ok(stmts)
    }

    // ---- expressions ----

    fn expression(&mut self) -> Result<Expr, ScriptError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, ScriptError> {
        if let Some(arrow) = self.try_arrow()? {
            return Ok(arrow);
        }
        let expr = self.ternary()?;
        if self.check(&Token::Assign) {
            match expr {
                Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. } => {
                    let value = self.assignment()?;
                    Ok(Expr::Assign {
                        target: Box::new(expr),
                        value: Box::new(value),
                    })
                }
                _ => Err(ScriptError::Parse(
                    "invalid assignment target".to_string(),
                )),
            }
        } else {
            Ok(expr)
        }
    }

    /// Arrow functions need lookahead: `x => ...` or `(a, b) => ...`.
    fn try_arrow(&mut self) -> Result<Option<Expr>, ScriptError> {
        match self.peek() {
            Some(Token::Ident(_)) if self.peek_at(1) == Some(&Token::Arrow) => {
                let param = self.ident()?;
                self.expect(&Token::Arrow)?;
                let body = self.arrow_body()?;
                Ok(Some(Expr::Arrow {
                    params: vec![param],
                    body,
                }))
            }
            Some(Token::LParen) => {
                let saved = self.pos;
                match self.arrow_param_list() {
                    Some(params) if self.check(&Token::Arrow) => {
                        let body = self.arrow_body()?;
                        Ok(Some(Expr::Arrow { params, body }))
                    }
                    _ => {
                        self.pos = saved;
                        Ok(None)
                    }
                }
            }
            _ => Ok(None),
        }
    }

    /// Attempt to consume `( ident, ident, ... )`; restores on failure.
    fn arrow_param_list(&mut self) -> Option<Vec<String>> {
        let saved = self.pos;
        if !self.check(&Token::LParen) {
            return None;
        }
        let mut params = Vec::new();
        if self.check(&Token::RParen) {
            return Some(params);
        }
        loop {
            match self.advance() {
                Some(Token::Ident(name)) => params.push(name),
                _ => {
                    self.pos = saved;
                    return None;
                }
            }
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Some(params),
                _ => {
                    self.pos = saved;
                    return None;
                }
            }
        }
    }

    fn arrow_body(&mut self) -> Result<ArrowBody, ScriptError> {
        if self.peek() == Some(&Token::LBrace) {
            let block = self.block()?;
            Ok(ArrowBody::Block(block.into()))
        } else {
            let expr = self.assignment()?;
            Ok(ArrowBody::Expr(Rc::new(expr)))
        }
    }

    fn ternary(&mut self) -> Result<Expr, ScriptError> {
        let cond = self.or()?;
        if self.check(&Token::Question) {
            let then_expr = self.assignment()?;
            self.expect(&Token::Colon)?;
            let else_expr = self.assignment()?;
            Ok(Expr::Ternary {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            })
        } else {
            Ok(cond)
        }
    }

    fn or(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.and()?;
        while self.check(&Token::OrOr) {
            let rhs = self.and()?;
            expr = binary(BinaryOp::Or, expr, rhs);
        }
        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.equality()?;
        while self.check(&Token::AndAnd) {
            let rhs = self.equality()?;
            expr = binary(BinaryOp::And, expr, rhs);
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.relational()?;
        loop {
            // Loose equality is parsed but evaluated strictly; the dialect
            // has no coercing comparison.
            let op = match self.peek() {
                Some(Token::StrictEq) | Some(Token::LooseEq) => BinaryOp::StrictEq,
                Some(Token::StrictNe) | Some(Token::LooseNe) => BinaryOp::StrictNe,
                _ => break,
            };
            self.advance();
            let rhs = self.relational()?;
            expr = binary(op, expr, rhs);
        }
        Ok(expr)
    }

    fn relational(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.additive()?;
            expr = binary(op, expr, rhs);
        }
        Ok(expr)
    }

    fn additive(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.multiplicative()?;
            expr = binary(op, expr, rhs);
        }
        Ok(expr)
    }

    fn multiplicative(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.unary()?;
            expr = binary(op, expr, rhs);
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        let op = match self.peek() {
            Some(Token::Not) => Some(UnaryOp::Not),
            Some(Token::Minus) => Some(UnaryOp::Neg),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.unary()?;
            Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            })
        } else {
            self.postfix()
        }
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.primary()?;
        loop {
            if self.check(&Token::Dot) {
                let property = match self.advance() {
                    Some(Token::Ident(name)) => name,
                    // Keywords are legal property names after a dot.
                    Some(Token::From) => "from".to_string(),
                    Some(Token::In) => "in".to_string(),
                    Some(Token::Import) => "import".to_string(),
                    _ => {
                        self.pos = self.pos.saturating_sub(1);
                        return Err(self.unexpected("expected property name"));
                    }
                };
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.check(&Token::LBracket) {
                let index = self.expression()?;
                self.expect(&Token::RBracket)?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.check(&Token::LParen) {
                let mut args = Vec::new();
                if self.peek() != Some(&Token::RParen) {
                    loop {
                        args.push(self.assignment()?);
                        if !self.check(&Token::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&Token::RParen)?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        match self.advance() {
            Some(Token::Null) => Ok(Expr::Null),
            Some(Token::Undefined) => Ok(Expr::Undefined),
            Some(Token::True) => Ok(Expr::Bool(true)),
            Some(Token::False) => Ok(Expr::Bool(false)),
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::Ident(name)) => Ok(Expr::Ident(name)),
            Some(Token::LParen) => {
                let expr = self.expression()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Some(Token::LBracket) => {
                let mut elements = Vec::new();
                if self.peek() != Some(&Token::RBracket) {
                    loop {
                        elements.push(self.assignment()?);
                        if !self.check(&Token::Comma) {
                            break;
                        }
                        if self.peek() == Some(&Token::RBracket) {
                            break;
                        }
                    }
                }
                self.expect(&Token::RBracket)?;
                Ok(Expr::Array(elements))
            }
            Some(Token::LBrace) => self.object_literal(),
            Some(Token::Function) => {
                // Anonymous function expression only; the dialect has no
                // hoisted declarations.
                let params = self
                    .arrow_param_list()
                    .ok_or_else(|| ScriptError::Parse("expected parameter list".to_string()))?;
                let body = self.block()?;
                Ok(Expr::Function {
                    params,
                    body: body.into(),
                })
            }
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.unexpected("expected expression"))
            }
        }
    }

    fn object_literal(&mut self) -> Result<Expr, ScriptError> {
        let mut props = Vec::new();
        if self.check(&Token::RBrace) {
            return Ok(Expr::Object(props));
        }
        loop {
            let key = match self.advance() {
                Some(Token::Ident(name)) => name,
                Some(Token::Str(s)) => s,
                // Keywords are legal property keys.
                Some(Token::From) => "from".to_string(),
                Some(Token::In) => "in".to_string(),
                Some(Token::Import) => "import".to_string(),
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.unexpected("expected property key"));
                }
            };
            let value = if self.check(&Token::Colon) {
                self.assignment()?
            } else {
                // Shorthand property
                Expr::Ident(key.clone())
            };
            props.push((key, value));
            if !self.check(&Token::Comma) {
                break;
            }
            if self.peek() == Some(&Token::RBrace) {
                break;
            }
        }
        self.expect(&Token::RBrace)?;
        Ok(Expr::Object(props))
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import() {
        let script = Script::parse("import federation from '/rt/impl.js';").unwrap();
        assert_eq!(
            script.statements()[0],
            Stmt::Import {
                local: "federation".to_string(),
                specifier: "/rt/impl.js".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_module_exports_assignment() {
        let script = Script::parse("module.exports = { greet: () => 'hi' };").unwrap();
        match &script.statements()[0] {
            Stmt::Expr(Expr::Assign { target, value }) => {
                assert!(matches!(**target, Expr::Member { .. }));
                assert!(matches!(**value, Expr::Object(_)));
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn test_parse_arrow_with_params() {
        let script = Script::parse("var f = (a, b) => a + b;").unwrap();
        match &script.statements()[0] {
            Stmt::VarDecl {
                init: Some(Expr::Arrow { params, .. }),
                ..
            } => assert_eq!(params, &["a".to_string(), "b".to_string()]),
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn test_parse_parenthesized_expression_not_arrow() {
        let script = Script::parse("var x = (1 + 2) * 3;").unwrap();
        assert!(matches!(
            script.statements()[0],
            Stmt::VarDecl { init: Some(_), .. }
        ));
    }

    #[test]
    fn test_parse_for_in() {
        let script = Script::parse("for (var key in obj) { out[key] = obj[key]; }").unwrap();
        assert!(matches!(script.statements()[0], Stmt::ForIn { .. }));
    }

    #[test]
    fn test_parse_ternary_and_or() {
        let script =
            Script::parse("var p = plugin ? (plugin.default || plugin)() : false;").unwrap();
        match &script.statements()[0] {
            Stmt::VarDecl {
                init: Some(Expr::Ternary { .. }),
                ..
            } => {}
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn test_parse_keyword_as_property_key_and_name() {
        let script = Script::parse("var x = { from: 1 }.from;").unwrap();
        match &script.statements()[0] {
            Stmt::VarDecl {
                init: Some(Expr::Member { property, .. }),
                ..
            } => assert_eq!(property, "from"),
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_reports_position() {
        let err = Script::parse("var = 3;").unwrap_err();
        assert!(matches!(err, ScriptError::Parse(_)));
    }
}
