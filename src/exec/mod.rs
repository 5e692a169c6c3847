//! Tree-walking executor.
//!
//! A parsed [`Command`] carries all binding decisions, so execution is a
//! straight recursive walk: no name lookup, no overload selection, no
//! implicit conversion search. The only dynamic checks left are the ones
//! that depend on runtime values: null receivers, array bounds, downcast
//! targets, and division by zero.

use ecow::EcoString;
use tracing::debug;

use crate::api::EngineOptions;
use crate::ast::Command;
use crate::host::value::{Ty, Value};
use crate::host::HostModel;

mod error;
mod eval;

#[cfg(test)]
mod exec_test;

pub use error::ExecError;

/// Execute a command against the host, returning the value of its last
/// statement.
pub fn execute(
    command: &Command,
    host: &dyn HostModel,
    opts: &EngineOptions,
) -> Result<Value, ExecError> {
    let mut ctx = ExecutionContext::new(host, opts.max_loop_iterations);
    let out = ctx.eval(&command.root)?;
    debug!(result = %out, "command executed");
    Ok(out)
}

/// How control leaves a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
}

struct VarSlot {
    name: EcoString,
    #[allow(dead_code)]
    ty: Ty,
    value: Value,
}

/// Mutable state of one command execution: the variable stack plus the
/// pending control-flow signal.
pub(crate) struct ExecutionContext<'a> {
    host: &'a dyn HostModel,
    vars: Vec<VarSlot>,
    flow: Flow,
    max_loop_iterations: u64,
}

impl<'a> ExecutionContext<'a> {
    fn new(host: &'a dyn HostModel, max_loop_iterations: u64) -> Self {
        Self {
            host,
            vars: Vec::new(),
            flow: Flow::Normal,
            max_loop_iterations,
        }
    }

    fn var_index(&self, name: &str) -> usize {
        self.vars
            .iter()
            .rposition(|slot| slot.name == name)
            .expect("local resolved at parse time")
    }

    fn push_var(&mut self, name: EcoString, ty: Ty, value: Value) {
        self.vars.push(VarSlot { name, ty, value });
    }

    /// Charge one loop iteration against the budget.
    fn charge_iteration(&self, iterations: &mut u64) -> Result<(), ExecError> {
        *iterations += 1;
        if *iterations > self.max_loop_iterations {
            return Err(ExecError::LoopBudgetExceeded { limit: self.max_loop_iterations });
        }
        Ok(())
    }
}
