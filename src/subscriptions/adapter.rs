//! Executor Adapter
//!
//! Thin call-through to the query engine. Renders results to JSON with the
//! debug flag fixed at construction.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::graphql::{Context, ExecutionError, Executor};

/// Runs operations and renders their results
#[derive(Clone)]
pub struct ExecutorAdapter {
    engine: Arc<dyn Executor>,
    debug: bool,
}

impl ExecutorAdapter {
    pub fn new(engine: Arc<dyn Executor>, debug: bool) -> Self {
        Self { engine, debug }
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Execute and render the result as a `data` frame payload
    pub fn execute(
        &self,
        query: &str,
        root: &Value,
        context: &Context,
        variables: Option<&Value>,
    ) -> Result<Value, ExecutionError> {
        let result = self.engine.execute(query, root, context, variables)?;
        Ok(result.to_json(self.debug))
    }
}

impl fmt::Debug for ExecutorAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorAdapter")
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}
