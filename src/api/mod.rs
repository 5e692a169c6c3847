//! Public entry point: the engine façade over the pipeline.

use std::sync::Arc;

use ecow::EcoString;
use thiserror::Error;
use tracing::debug;

use crate::exec::{self, ExecError};
use crate::host::value::Value;
use crate::host::HostModel;
use crate::lexer::{self, LexError};
use crate::parser::{self, ParseError};
use crate::suggest::{self, SuggestWorker, SuggestionTable};
use crate::symbols::SymbolTable;

pub use crate::ast::Command;

#[cfg(test)]
mod engine_test;

/// Anything that can go wrong between source text and a result value.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] ExecError),
}

/// Engine-wide settings, fixed at construction.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Per-loop iteration budget; a loop that exceeds it aborts the
    /// command instead of hanging the host.
    pub max_loop_iterations: u64,
    /// Hide non-public host members from resolution and suggestions.
    pub safe_mode: bool,
    /// Namespace prefixes searched when a bare identifier is not found
    /// at the root, in order.
    pub using_namespaces: Vec<EcoString>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_loop_iterations: 10_000,
            safe_mode: true,
            using_namespaces: Vec::new(),
        }
    }
}

/// A configured interpreter bound to one symbol table and host model.
///
/// Parsing and execution are separate so a command can be parsed once
/// and executed many times (or parsed only to validate input).
pub struct Engine {
    table: Arc<SymbolTable>,
    host: Arc<dyn HostModel>,
    opts: EngineOptions,
}

impl Engine {
    pub fn new(table: Arc<SymbolTable>, host: Arc<dyn HostModel>, opts: EngineOptions) -> Self {
        Self { table, host, opts }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.opts
    }

    /// Parse source text into an executable command.
    pub fn parse(&self, source: &str) -> Result<Command, Error> {
        let tokens = lexer::lex(source)?;
        let command = parser::parse(source, tokens, &self.table, self.host.as_ref(), &self.opts)?;
        Ok(command)
    }

    /// Execute a previously parsed command. Commands are immutable and
    /// reusable; locals live only for the duration of one execution.
    pub fn execute(&self, command: &Command) -> Result<Value, Error> {
        Ok(exec::execute(command, self.host.as_ref(), &self.opts)?)
    }

    /// Parse and execute in one step.
    pub fn eval(&self, source: &str) -> Result<Value, Error> {
        debug!(source, "eval");
        let command = self.parse(source)?;
        self.execute(&command)
    }

    /// Compute suggestions synchronously for the cursor position.
    pub fn suggest(&self, source: &str, cursor: usize) -> SuggestionTable {
        suggest::build(
            source,
            cursor,
            &self.table,
            self.host.as_ref(),
            &self.opts,
            || false,
        )
    }

    /// A background worker sharing this engine's table, host, and
    /// options.
    pub fn suggest_worker(&self) -> SuggestWorker {
        SuggestWorker::new(Arc::clone(&self.table), Arc::clone(&self.host), self.opts.clone())
    }
}
