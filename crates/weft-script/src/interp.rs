//! Tree-walking evaluator for the payload dialect.
//!
//! Evaluation takes an explicit binding set (the isolated execution context
//! the loader constructs: `exports`, `module`, `require`, `__dirname`,
//! `__filename`), a shared global object standing in for the realm's global
//! scope, and an optional module resolver backing `import` statements.
//! Payload code runs to completion; there are no suspension points.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::ast::{BinaryOp, Expr, Stmt, UnaryOp};
use crate::error::ScriptError;
use crate::parser::Script;
use crate::value::{Closure, FnBody, NativeFunction, Object, SharedObject, Value};

/// Resolves `import`/`require` specifiers to already-evaluated interfaces.
pub trait ModuleResolver {
    fn resolve(&self, specifier: &str) -> Result<Value, ScriptError>;
}

impl<F> ModuleResolver for F
where
    F: Fn(&str) -> Result<Value, ScriptError>,
{
    fn resolve(&self, specifier: &str) -> Result<Value, ScriptError> {
        self(specifier)
    }
}

/// Shared evaluation context: realm globals plus the import resolver.
pub struct EvalCtx {
    pub globals: SharedObject,
    pub resolver: Option<Rc<dyn ModuleResolver>>,
}

/// A lexical scope in the scope chain.
pub struct Scope {
    vars: FxHashMap<String, Value>,
    parent: Option<Env>,
}

/// Shared handle to a scope.
pub type Env = Rc<RefCell<Scope>>;

impl Scope {
    fn root() -> Env {
        Rc::new(RefCell::new(Scope {
            vars: FxHashMap::default(),
            parent: None,
        }))
    }

    fn child(parent: &Env) -> Env {
        Rc::new(RefCell::new(Scope {
            vars: FxHashMap::default(),
            parent: Some(parent.clone()),
        }))
    }
}

/// Statement-level control flow.
enum Flow {
    Normal,
    Return(Value),
}

/// Evaluates parsed payloads against a realm global object.
pub struct Evaluator {
    ctx: Rc<EvalCtx>,
}

impl Evaluator {
    /// Evaluator over the given realm globals, with no import resolver.
    pub fn new(globals: SharedObject) -> Evaluator {
        Evaluator {
            ctx: Rc::new(EvalCtx {
                globals,
                resolver: None,
            }),
        }
    }

    /// Evaluator whose `import` statements resolve through `resolver`.
    pub fn with_resolver(globals: SharedObject, resolver: Rc<dyn ModuleResolver>) -> Evaluator {
        Evaluator {
            ctx: Rc::new(EvalCtx {
                globals,
                resolver: Some(resolver),
            }),
        }
    }

    /// Run a script with the supplied top-level bindings.
    pub fn run(&self, script: &Script, bindings: Vec<(String, Value)>) -> Result<(), ScriptError> {
        let env = Scope::root();
        {
            let mut scope = env.borrow_mut();
            scope.vars.insert(
                "Boolean".to_string(),
                NativeFunction::new("Boolean", |args| {
                    Ok(Value::Bool(
                        args.first().map(Value::is_truthy).unwrap_or(false),
                    ))
                }),
            );
            for (name, value) in bindings {
                scope.vars.insert(name, value);
            }
        }
        match exec_stmts(&self.ctx, &env, script.statements())? {
            Flow::Normal | Flow::Return(_) => Ok(()),
        }
    }
}

/// Call a function value from host code.
pub fn call_value(callee: &Value, args: &[Value]) -> Result<Value, ScriptError> {
    match callee {
        Value::Native(native) => (native.func)(args),
        Value::Function(closure) => {
            let env = Scope::child(&closure.env);
            {
                let mut scope = env.borrow_mut();
                for (i, param) in closure.params.iter().enumerate() {
                    let value = args.get(i).cloned().unwrap_or(Value::Undefined);
                    scope.vars.insert(param.clone(), value);
                }
            }
            match &closure.body {
                FnBody::Expr(expr) => eval_expr(&closure.ctx, &env, expr),
                FnBody::Block(stmts) => match exec_stmts(&closure.ctx, &env, stmts)? {
                    Flow::Return(value) => Ok(value),
                    Flow::Normal => Ok(Value::Undefined),
                },
            }
        }
        other => Err(ScriptError::Eval(format!(
            "{} is not a function",
            other.type_name()
        ))),
    }
}

fn exec_stmts(ctx: &Rc<EvalCtx>, env: &Env, stmts: &[Stmt]) -> Result<Flow, ScriptError> {
    for stmt in stmts {
        match exec_stmt(ctx, env, stmt)? {
            Flow::Normal => {}
            flow => return Ok(flow),
        }
    }
    Ok(Flow::Normal)
}

fn exec_stmt(ctx: &Rc<EvalCtx>, env: &Env, stmt: &Stmt) -> Result<Flow, ScriptError> {
    match stmt {
        Stmt::Import { local, specifier } => {
            let resolver = ctx.resolver.as_ref().ok_or_else(|| {
                ScriptError::Eval(format!(
                    "cannot import '{}': no module resolver in this context",
                    specifier
                ))
            })?;
            let value = resolver.resolve(specifier)?;
            env.borrow_mut().vars.insert(local.clone(), value);
            Ok(Flow::Normal)
        }
        Stmt::VarDecl { name, init } => {
            let value = match init {
                Some(expr) => eval_expr(ctx, env, expr)?,
                None => Value::Undefined,
            };
            env.borrow_mut().vars.insert(name.clone(), value);
            Ok(Flow::Normal)
        }
        Stmt::If {
            cond,
            then_branch,
            else_branch,
        } => {
            if eval_expr(ctx, env, cond)?.is_truthy() {
                exec_stmts(ctx, env, then_branch)
            } else if let Some(else_branch) = else_branch {
                exec_stmts(ctx, env, else_branch)
            } else {
                Ok(Flow::Normal)
            }
        }
        Stmt::ForIn {
            binding,
            object,
            body,
        } => {
            let target = eval_expr(ctx, env, object)?;
            let keys = match &target {
                Value::Object(obj) => obj.borrow().keys(),
                Value::Array(elements) => {
                    (0..elements.borrow().len()).map(|i| i.to_string()).collect()
                }
                Value::Undefined | Value::Null => Vec::new(),
                other => {
                    return Err(ScriptError::Eval(format!(
                        "cannot enumerate {}",
                        other.type_name()
                    )))
                }
            };
            for key in keys {
                env.borrow_mut()
                    .vars
                    .insert(binding.clone(), Value::string(&key));
                match exec_stmts(ctx, env, body)? {
                    Flow::Normal => {}
                    flow => return Ok(flow),
                }
            }
            Ok(Flow::Normal)
        }
        Stmt::Return(value) => {
            let value = match value {
                Some(expr) => eval_expr(ctx, env, expr)?,
                None => Value::Undefined,
            };
            Ok(Flow::Return(value))
        }
        Stmt::Throw(expr) => {
            let value = eval_expr(ctx, env, expr)?;
            Err(ScriptError::Eval(value.to_string()))
        }
        Stmt::Block(stmts) => {
            let child = Scope::child(env);
            exec_stmts(ctx, &child, stmts)
        }
        Stmt::Expr(expr) => {
            eval_expr(ctx, env, expr)?;
            Ok(Flow::Normal)
        }
    }
}

fn eval_expr(ctx: &Rc<EvalCtx>, env: &Env, expr: &Expr) -> Result<Value, ScriptError> {
    match expr {
        Expr::Null => Ok(Value::Null),
        Expr::Undefined => Ok(Value::Undefined),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Str(s) => Ok(Value::string(s)),
        Expr::Ident(name) => lookup(ctx, env, name),
        Expr::Array(elements) => {
            let mut values = Vec::with_capacity(elements.len());
            for element in elements {
                values.push(eval_expr(ctx, env, element)?);
            }
            Ok(Value::array(values))
        }
        Expr::Object(props) => {
            let obj = Object::shared();
            for (key, value_expr) in props {
                let value = eval_expr(ctx, env, value_expr)?;
                obj.borrow_mut().set(key, value);
            }
            Ok(Value::Object(obj))
        }
        Expr::Function { params, body } => Ok(Value::Function(Rc::new(Closure {
            params: params.clone(),
            body: FnBody::Block(body.clone()),
            env: env.clone(),
            ctx: ctx.clone(),
        }))),
        Expr::Arrow { params, body } => Ok(Value::Function(Rc::new(Closure {
            params: params.clone(),
            body: body.clone().into(),
            env: env.clone(),
            ctx: ctx.clone(),
        }))),
        Expr::Member { object, property } => {
            let target = eval_expr(ctx, env, object)?;
            get_property(&target, property)
        }
        Expr::Index { object, index } => {
            let target = eval_expr(ctx, env, object)?;
            let index = eval_expr(ctx, env, index)?;
            get_index(&target, &index)
        }
        Expr::Call { callee, args } => eval_call(ctx, env, callee, args),
        Expr::Unary { op, operand } => {
            let value = eval_expr(ctx, env, operand)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                UnaryOp::Neg => match value {
                    Value::Number(n) => Ok(Value::Number(-n)),
                    other => Err(ScriptError::Eval(format!(
                        "cannot negate {}",
                        other.type_name()
                    ))),
                },
            }
        }
        Expr::Binary { op, lhs, rhs } => eval_binary(ctx, env, *op, lhs, rhs),
        Expr::Ternary {
            cond,
            then_expr,
            else_expr,
        } => {
            if eval_expr(ctx, env, cond)?.is_truthy() {
                eval_expr(ctx, env, then_expr)
            } else {
                eval_expr(ctx, env, else_expr)
            }
        }
        Expr::Assign { target, value } => {
            let value = eval_expr(ctx, env, value)?;
            assign(ctx, env, target, value.clone())?;
            Ok(value)
        }
    }
}

/// Resolve an identifier: scope chain first, then the realm globals.
fn lookup(ctx: &Rc<EvalCtx>, env: &Env, name: &str) -> Result<Value, ScriptError> {
    let mut current = Some(env.clone());
    while let Some(scope) = current {
        let scope = scope.borrow();
        if let Some(value) = scope.vars.get(name) {
            return Ok(value.clone());
        }
        current = scope.parent.clone();
    }
    if let Some(value) = ctx.globals.borrow().get(name) {
        return Ok(value);
    }
    Err(ScriptError::Eval(format!("{} is not defined", name)))
}

/// Assign to a target. Undeclared identifiers write the realm global, the
/// way top-level `NAME = {}` installs a realm-wide record.
fn assign(ctx: &Rc<EvalCtx>, env: &Env, target: &Expr, value: Value) -> Result<(), ScriptError> {
    match target {
        Expr::Ident(name) => {
            let mut current = Some(env.clone());
            while let Some(scope) = current {
                let mut scope = scope.borrow_mut();
                if scope.vars.contains_key(name) {
                    scope.vars.insert(name.clone(), value);
                    return Ok(());
                }
                current = scope.parent.clone();
            }
            ctx.globals.borrow_mut().set(name, value);
            Ok(())
        }
        Expr::Member { object, property } => {
            let target = eval_expr(ctx, env, object)?;
            set_property(&target, property, value)
        }
        Expr::Index { object, index } => {
            let target = eval_expr(ctx, env, object)?;
            let index = eval_expr(ctx, env, index)?;
            match &index {
                Value::Str(key) => set_property(&target, key, value),
                Value::Number(n) => match &target {
                    Value::Array(elements) => {
                        let mut elements = elements.borrow_mut();
                        let idx = *n as usize;
                        if idx < elements.len() {
                            elements[idx] = value;
                        } else if idx == elements.len() {
                            elements.push(value);
                        } else {
                            return Err(ScriptError::Eval(format!(
                                "array index {} out of bounds",
                                idx
                            )));
                        }
                        Ok(())
                    }
                    other => set_property(other, &index.to_string(), value),
                },
                other => Err(ScriptError::Eval(format!(
                    "invalid index of type {}",
                    other.type_name()
                ))),
            }
        }
        _ => Err(ScriptError::Eval("invalid assignment target".to_string())),
    }
}

fn get_property(target: &Value, property: &str) -> Result<Value, ScriptError> {
    match target {
        Value::Object(obj) => Ok(obj.borrow().get(property).unwrap_or(Value::Undefined)),
        Value::Array(elements) => {
            if property == "length" {
                Ok(Value::Number(elements.borrow().len() as f64))
            } else {
                Ok(Value::Undefined)
            }
        }
        Value::Str(s) => {
            if property == "length" {
                Ok(Value::Number(s.chars().count() as f64))
            } else {
                Ok(Value::Undefined)
            }
        }
        Value::Function(_) | Value::Native(_) => Ok(Value::Undefined),
        Value::Undefined | Value::Null => Err(ScriptError::Eval(format!(
            "cannot read property '{}' of {}",
            property,
            target.type_name()
        ))),
        _ => Ok(Value::Undefined),
    }
}

fn get_index(target: &Value, index: &Value) -> Result<Value, ScriptError> {
    match (target, index) {
        (Value::Array(elements), Value::Number(n)) => Ok(elements
            .borrow()
            .get(*n as usize)
            .cloned()
            .unwrap_or(Value::Undefined)),
        (_, Value::Str(key)) => get_property(target, key),
        (_, Value::Number(n)) => get_property(target, &Value::Number(*n).to_string()),
        (_, other) => Err(ScriptError::Eval(format!(
            "invalid index of type {}",
            other.type_name()
        ))),
    }
}

fn set_property(target: &Value, property: &str, value: Value) -> Result<(), ScriptError> {
    match target {
        Value::Object(obj) => {
            obj.borrow_mut().set(property, value);
            Ok(())
        }
        other => Err(ScriptError::Eval(format!(
            "cannot set property '{}' on {}",
            property,
            other.type_name()
        ))),
    }
}

fn eval_call(
    ctx: &Rc<EvalCtx>,
    env: &Env,
    callee: &Expr,
    args: &[Expr],
) -> Result<Value, ScriptError> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(eval_expr(ctx, env, arg)?);
    }

    // Method-call shape: array builtins are dispatched on the receiver,
    // everything else calls the property's value.
    if let Expr::Member { object, property } = callee {
        let receiver = eval_expr(ctx, env, object)?;
        if let Value::Array(elements) = &receiver {
            if let Some(result) = call_array_builtin(elements, property, &values)? {
                return Ok(result);
            }
        }
        let method = get_property(&receiver, property)?;
        if !method.is_callable() {
            return Err(ScriptError::Eval(format!(
                "{}.{} is not a function",
                receiver.type_name(),
                property
            )));
        }
        return call_value(&method, &values);
    }

    let callee = eval_expr(ctx, env, callee)?;
    call_value(&callee, &values)
}

/// Built-in array methods the bootstrap dialect relies on.
fn call_array_builtin(
    elements: &Rc<RefCell<Vec<Value>>>,
    method: &str,
    args: &[Value],
) -> Result<Option<Value>, ScriptError> {
    match method {
        "concat" => {
            let mut out = elements.borrow().clone();
            for arg in args {
                match arg {
                    Value::Array(more) => out.extend(more.borrow().iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Ok(Some(Value::array(out)))
        }
        "filter" => {
            let predicate = args
                .first()
                .ok_or_else(|| ScriptError::Eval("filter requires a predicate".to_string()))?;
            let snapshot = elements.borrow().clone();
            let mut out = Vec::new();
            for element in snapshot {
                if call_value(predicate, &[element.clone()])?.is_truthy() {
                    out.push(element);
                }
            }
            Ok(Some(Value::array(out)))
        }
        "map" => {
            let mapper = args
                .first()
                .ok_or_else(|| ScriptError::Eval("map requires a function".to_string()))?;
            let snapshot = elements.borrow().clone();
            let mut out = Vec::with_capacity(snapshot.len());
            for element in snapshot {
                out.push(call_value(mapper, &[element])?);
            }
            Ok(Some(Value::array(out)))
        }
        "push" => {
            let mut elements = elements.borrow_mut();
            for arg in args {
                elements.push(arg.clone());
            }
            Ok(Some(Value::Number(elements.len() as f64)))
        }
        "join" => {
            let separator = args
                .first()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| ",".to_string());
            let parts: Vec<String> =
                elements.borrow().iter().map(|v| v.to_string()).collect();
            Ok(Some(Value::string(&parts.join(&separator))))
        }
        "indexOf" => {
            let needle = args.first().cloned().unwrap_or(Value::Undefined);
            let index = elements
                .borrow()
                .iter()
                .position(|v| v.strict_eq(&needle))
                .map(|i| i as f64)
                .unwrap_or(-1.0);
            Ok(Some(Value::Number(index)))
        }
        _ => Ok(None),
    }
}

fn eval_binary(
    ctx: &Rc<EvalCtx>,
    env: &Env,
    op: BinaryOp,
    lhs: &Expr,
    rhs: &Expr,
) -> Result<Value, ScriptError> {
    // Short-circuit operators yield operand values, not booleans.
    match op {
        BinaryOp::Or => {
            let left = eval_expr(ctx, env, lhs)?;
            if left.is_truthy() {
                return Ok(left);
            }
            return eval_expr(ctx, env, rhs);
        }
        BinaryOp::And => {
            let left = eval_expr(ctx, env, lhs)?;
            if !left.is_truthy() {
                return Ok(left);
            }
            return eval_expr(ctx, env, rhs);
        }
        _ => {}
    }

    let left = eval_expr(ctx, env, lhs)?;
    let right = eval_expr(ctx, env, rhs)?;
    match op {
        BinaryOp::StrictEq => Ok(Value::Bool(left.strict_eq(&right))),
        BinaryOp::StrictNe => Ok(Value::Bool(!left.strict_eq(&right))),
        BinaryOp::Add => match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::Str(_), _) | (_, Value::Str(_)) => {
                Ok(Value::string(&format!("{}{}", left, right)))
            }
            _ => Err(type_error("+", &left, &right)),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
            match (left.as_number(), right.as_number()) {
                (Some(a), Some(b)) => Ok(Value::Number(match op {
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    _ => a / b,
                })),
                _ => Err(type_error("arithmetic", &left, &right)),
            }
        }
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
            let ordering = match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => None,
            };
            let Some(ordering) = ordering else {
                return Err(type_error("comparison", &left, &right));
            };
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Gt => ordering.is_gt(),
                BinaryOp::Le => ordering.is_le(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::Or | BinaryOp::And => unreachable!("handled above"),
    }
}

fn type_error(op: &str, left: &Value, right: &Value) -> ScriptError {
    ScriptError::Eval(format!(
        "invalid operands for {}: {} and {}",
        op,
        left.type_name(),
        right.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Script;

    fn run_with_module(source: &str) -> Result<SharedObject, ScriptError> {
        let script = Script::parse(source)?;
        let globals = Object::shared();
        let evaluator = Evaluator::new(globals);
        let module = Object::shared();
        module.borrow_mut().set("exports", Value::object());
        let exports = Value::object();
        evaluator.run(
            &script,
            vec![
                ("module".to_string(), Value::Object(module.clone())),
                ("exports".to_string(), exports),
            ],
        )?;
        Ok(module)
    }

    #[test]
    fn test_module_exports_object_with_arrow() {
        let module = run_with_module("module.exports = { greet: () => 'hi' };").unwrap();
        let exports = module.borrow().get("exports").unwrap();
        let greet = exports.as_object().unwrap().borrow().get("greet").unwrap();
        let result = call_value(&greet, &[]).unwrap();
        assert_eq!(result.as_str(), Some("hi"));
    }

    #[test]
    fn test_closure_captures_environment() {
        let module = run_with_module(
            "var base = 'hello';\n\
             module.exports = { make: (name) => base + ' ' + name };",
        )
        .unwrap();
        let exports = module.borrow().get("exports").unwrap();
        let make = exports.as_object().unwrap().borrow().get("make").unwrap();
        let result = call_value(&make, &[Value::string("world")]).unwrap();
        assert_eq!(result.as_str(), Some("hello world"));
    }

    #[test]
    fn test_for_in_copies_in_insertion_order() {
        let module = run_with_module(
            "var src = { b: 1, a: 2 };\n\
             var dst = {};\n\
             for (var key in src) { dst[key] = src[key]; }\n\
             module.exports = dst;",
        )
        .unwrap();
        let exports = module.borrow().get("exports").unwrap();
        let keys = exports.as_object().unwrap().borrow().keys();
        assert_eq!(keys, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_or_yields_first_truthy_operand() {
        let module = run_with_module(
            "var obj = { value: 3 };\n\
             module.exports = { picked: obj.missing || obj.value };",
        )
        .unwrap();
        let exports = module.borrow().get("exports").unwrap();
        let picked = exports.as_object().unwrap().borrow().get("picked").unwrap();
        assert_eq!(picked.as_number(), Some(3.0));
    }

    #[test]
    fn test_filter_boolean_drops_falsy() {
        let module = run_with_module(
            "var list = [1, false, 'x', null, undefined].filter(Boolean);\n\
             module.exports = { count: list.length };",
        )
        .unwrap();
        let exports = module.borrow().get("exports").unwrap();
        let count = exports.as_object().unwrap().borrow().get("count").unwrap();
        assert_eq!(count.as_number(), Some(2.0));
    }

    #[test]
    fn test_undeclared_assignment_writes_global() {
        let script = Script::parse("SHARED = { ready: true };").unwrap();
        let globals = Object::shared();
        let evaluator = Evaluator::new(globals.clone());
        evaluator.run(&script, vec![]).unwrap();
        assert!(globals.borrow().has("SHARED"));
    }

    #[test]
    fn test_undefined_identifier_is_error() {
        let err = run_with_module("boom();").unwrap_err();
        assert!(matches!(err, ScriptError::Eval(_)));
    }

    #[test]
    fn test_throw_surfaces_as_eval_error() {
        let err = run_with_module("throw 'broken payload';").unwrap_err();
        assert!(err.to_string().contains("broken payload"));
    }

    #[test]
    fn test_import_without_resolver_is_error() {
        let err = run_with_module("import x from './dep.js';").unwrap_err();
        assert!(err.to_string().contains("no module resolver"));
    }

    #[test]
    fn test_import_resolves_through_resolver() {
        let script =
            Script::parse("import dep from './dep.js';\nmodule.exports = dep;").unwrap();
        let globals = Object::shared();
        let resolver = |specifier: &str| {
            assert_eq!(specifier, "./dep.js");
            let obj = Object::shared();
            obj.borrow_mut().set("answer", Value::Number(42.0));
            Ok(Value::Object(obj))
        };
        let evaluator = Evaluator::with_resolver(globals, Rc::new(resolver));
        let module = Object::shared();
        evaluator
            .run(
                &script,
                vec![("module".to_string(), Value::Object(module.clone()))],
            )
            .unwrap();
        let exports = module.borrow().get("exports").unwrap();
        let answer = exports.as_object().unwrap().borrow().get("answer").unwrap();
        assert_eq!(answer.as_number(), Some(42.0));
    }
}
