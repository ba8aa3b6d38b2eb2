//! Per-session command evaluation and the command dispatch table.
//!
//! An [`Evaluator`] maps wire command names to handlers. Proxies install
//! handlers into it during setup; a command with no installed handler
//! falls back to the built-in local-only behaviour, which applies the
//! mutation to the store and replicates nothing.

use std::collections::HashMap;
use std::sync::Arc;

use crate::decoder::Decoder;

pub const ENTITY_DELETE: &str = "entity-delete";
pub const ENTITY_DELETE_RECURSIVE: &str = "entity-delete-recursive";
pub const VALUE_SET: &str = "value-set";
pub const VALUES_SET: &str = "values-set";
pub const ANNOTATION_SET: &str = "annotation-set";
pub const VALUE_UPDATE: &str = "value-update";

/// Every mutation command the evaluator understands natively.
pub const MUTATION_COMMANDS: [&str; 6] = [
    ENTITY_DELETE,
    ENTITY_DELETE_RECURSIVE,
    VALUE_SET,
    VALUES_SET,
    ANNOTATION_SET,
    VALUE_UPDATE,
];

/// A command handler: wire argument in, wire reply out.
pub type Handler = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Errors from command evaluation.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

/// Command dispatch table for one session.
///
/// Cloning is cheap: handlers are shared.
#[derive(Clone)]
pub struct Evaluator {
    decoder: Arc<Decoder>,
    handlers: HashMap<String, Handler>,
}

impl Evaluator {
    pub fn new(decoder: Arc<Decoder>) -> Self {
        Evaluator {
            decoder,
            handlers: HashMap::new(),
        }
    }

    /// Binds `name` to `handler`, returning the handler it replaced.
    pub fn install_handler(&mut self, name: &str, handler: Handler) -> Option<Handler> {
        self.handlers.insert(name.to_string(), handler)
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Names of installed handlers, sorted.
    pub fn installed(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Evaluates one command.
    pub fn eval(&self, command: &str, arg: &str) -> Result<String, EvalError> {
        if let Some(handler) = self.handlers.get(command) {
            return Ok(handler(arg));
        }
        self.eval_builtin(command, arg)
    }

    fn eval_builtin(&self, command: &str, arg: &str) -> Result<String, EvalError> {
        let decoder = &self.decoder;
        let reply = match command {
            ENTITY_DELETE => decoder.extract(arg, false),
            ENTITY_DELETE_RECURSIVE => decoder.extract(arg, true),
            VALUE_SET => decoder.set_value(arg, |_, _, _| {}),
            VALUES_SET => decoder.set_values(arg, |_| {}),
            ANNOTATION_SET => decoder.set_annotation(arg, |_, _| {}),
            VALUE_UPDATE => decoder.update_value(arg, |_, _, _| {}),
            other => return Err(EvalError::UnknownCommand(other.to_string())),
        };
        Ok(reply)
    }
}
