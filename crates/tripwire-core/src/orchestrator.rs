//! Startup trigger setup.
//!
//! Walks the configured function list, validates that each entry has a
//! registered implementation, builds its handler, and registers it. Every
//! failure is scoped to the one descriptor that caused it: the diagnostic
//! is broadcast and the loop moves on, so a misconfigured function never
//! blocks the others from registering.

use crate::config::FunctionDefs;
use crate::triggers::{build_handler, TriggerContext};

/// Runs the one-time setup phase over a function-definition list.
pub struct Orchestrator {
    ctx: TriggerContext,
}

impl Orchestrator {
    pub fn new(ctx: TriggerContext) -> Self {
        Self { ctx }
    }

    /// Build and register a handler for every descriptor in `defs`.
    ///
    /// Returns the number of successfully registered triggers.
    pub async fn setup_triggers(&self, defs: &FunctionDefs) -> usize {
        self.ctx.sink.broadcast("Starting trigger setup...").await;

        let mut registered = 0;
        for descriptor in &defs.functions {
            let name = &descriptor.name;

            if !self.ctx.executor.registry().contains(name) {
                let message = format!("Function {name} does not exist");
                tracing::error!(function = %name, "{message}");
                self.ctx.sink.broadcast(message).await;
                continue;
            }

            let handler = match build_handler(name, &descriptor.trigger, &self.ctx) {
                Ok(handler) => handler,
                Err(e) => {
                    let message = format!("Error setting up trigger for {name}: {e}");
                    tracing::error!(function = %name, error = %e, "trigger construction failed");
                    self.ctx.sink.broadcast(message).await;
                    continue;
                }
            };

            match handler.setup().await {
                Ok(()) => {
                    tracing::info!(
                        function = %name,
                        trigger_type = handler.trigger_type(),
                        "trigger registered"
                    );
                    registered += 1;
                }
                Err(e) => {
                    let message = format!("Error setting up trigger for {name}: {e}");
                    tracing::error!(function = %name, error = %e, "trigger setup failed");
                    self.ctx.sink.broadcast(message).await;
                }
            }
        }
        registered
    }
}
