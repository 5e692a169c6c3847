//! Conscript - an embedded C-family command interpreter for live object graphs.
//!
//! # Overview
//!
//! Conscript lets an operator type code snippets into a running application
//! and have them evaluated against the application's own objects: declare
//! variables, call methods, read and write fields, iterate collections,
//! branch and loop, construct objects. Names resolve dynamically against a
//! host type model supplied at runtime; the interpreter itself never assumes
//! a particular reflection mechanism.
//!
//! # Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use conscript::{Engine, EngineOptions};
//! use conscript::host::registry::Registry;
//! use conscript::symbols::SymbolTableBuilder;
//!
//! let registry = Registry::new();
//! let table = SymbolTableBuilder::new().build();
//! let engine = Engine::new(Arc::new(table), Arc::new(registry), EngineOptions::default());
//!
//! let command = engine.parse("int x = 40; x + 2").unwrap();
//! let result = engine.execute(&command).unwrap();
//! assert_eq!(result.as_i64(), Some(42));
//! ```
//!
//! # Pipeline
//!
//! Source text flows through the lexer, the precedence-climbing parser
//! (which consults the symbol table and host type model to produce a typed
//! AST), and the tree-walking executor. The suggestion engine drives the
//! same lexer and parser with a cursor offset to produce autocomplete data
//! instead of an executable [`Command`](api::Command).

pub mod api;
pub mod ast;
pub mod exec;
pub mod host;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod suggest;
pub mod symbols;

pub use api::{Command, Engine, EngineOptions, Error};
pub use host::value::{Ty, TypeRef, Value};

/// Test utilities for enabling logging in tests.
#[cfg(test)]
pub mod test_utils {
    /// Initialize tracing subscriber for tests with DEBUG level.
    /// Call this at the start of tests where you want to see logging output.
    pub fn init_test_logging() {
        use tracing_subscriber::{fmt, EnvFilter};

        // Try to initialize, ignore error if already initialized
        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    }
}
