//! Weft Script
//!
//! A deliberately small, sandboxed script engine for the federation payload
//! dialect: the JavaScript subset that generated bootstrap programs and
//! container entry payloads are written in. The engine evaluates source
//! text with an explicitly supplied binding set and captures the exports
//! the payload declares; it never touches ambient process state beyond the
//! global object it is handed.

pub mod ast;
pub mod error;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod value;

pub use error::ScriptError;
pub use interp::{call_value, Evaluator, ModuleResolver};
pub use parser::Script;
pub use value::{NativeFunction, Object, SharedObject, Value};
