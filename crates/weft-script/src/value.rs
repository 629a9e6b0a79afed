//! Runtime value model for the payload dialect.
//!
//! Values form an `Rc` graph: objects and arrays are shared by reference,
//! matching the host-language semantics the payloads expect. The engine is
//! single-threaded by design (the federation realm is cooperative), so no
//! `Send`/`Sync` bounds apply.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::{ArrowBody, Stmt};
use crate::error::ScriptError;
use crate::interp::EvalCtx;

/// A heap object with insertion-ordered properties.
///
/// Property count is small in practice (federation records, exported
/// interfaces), so lookup is a linear scan over the entry list, which also
/// preserves for-in iteration order.
#[derive(Debug, Default)]
pub struct Object {
    entries: Vec<(String, Value)>,
}

/// Shared handle to a heap object.
pub type SharedObject = Rc<RefCell<Object>>;

impl Object {
    pub fn new() -> Object {
        Object::default()
    }

    /// Allocate an empty shared object.
    pub fn shared() -> SharedObject {
        Rc::new(RefCell::new(Object::new()))
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Set a property, replacing in place or appending in insertion order.
    pub fn set(&mut self, key: &str, value: Value) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key.to_string(), value));
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A function closure over its defining environment.
pub struct Closure {
    pub params: Vec<String>,
    pub body: FnBody,
    pub env: crate::interp::Env,
    pub ctx: Rc<EvalCtx>,
}

/// Function body shape shared between `function` expressions and arrows.
pub enum FnBody {
    Block(Rc<[Stmt]>),
    Expr(Rc<crate::ast::Expr>),
}

impl From<ArrowBody> for FnBody {
    fn from(body: ArrowBody) -> FnBody {
        match body {
            ArrowBody::Expr(e) => FnBody::Expr(e),
            ArrowBody::Block(b) => FnBody::Block(b),
        }
    }
}

/// A host-provided function callable from payload code.
pub struct NativeFunction {
    pub name: String,
    #[allow(clippy::type_complexity)]
    pub func: Box<dyn Fn(&[Value]) -> Result<Value, ScriptError>>,
}

impl NativeFunction {
    pub fn new(
        name: &str,
        func: impl Fn(&[Value]) -> Result<Value, ScriptError> + 'static,
    ) -> Value {
        Value::Native(Rc::new(NativeFunction {
            name: name.to_string(),
            func: Box::new(func),
        }))
    }
}

/// A value in the payload dialect.
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(SharedObject),
    Function(Rc<Closure>),
    Native(Rc<NativeFunction>),
}

impl Value {
    pub fn string(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn array(elements: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(elements)))
    }

    pub fn object() -> Value {
        Value::Object(Object::shared())
    }

    /// Host-language truthiness: undefined, null, false, 0, NaN and the
    /// empty string are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Native(_) => true,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Native(_))
    }

    /// Strict equality: same kind and same value; reference types compare
    /// by identity.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Object handle, if this value is an object.
    pub fn as_object(&self) -> Option<&SharedObject> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Kind name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) | Value::Native(_) => "function",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Str(s) => write!(f, "{}", s),
            Value::Array(elements) => {
                let parts: Vec<String> =
                    elements.borrow().iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Object(_) => write!(f, "[object Object]"),
            Value::Function(_) => write!(f, "[function]"),
            Value::Native(native) => write!(f, "[native {}]", native.name),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Object(obj) => {
                let obj = obj.borrow();
                let mut map = f.debug_map();
                for key in obj.keys() {
                    map.entry(&key, &obj.get(&key).unwrap_or(Value::Undefined));
                }
                map.finish()
            }
            other => write!(f, "{}", other),
        }
    }
}
