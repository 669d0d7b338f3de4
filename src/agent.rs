use tracing::{debug, warn};

use crate::adapter::ProviderAdapter;
use crate::catalog::ToolCatalog;
use crate::dispatch::dispatch;
use crate::error::{AgentError, Result};
use crate::session::AgentSession;
use crate::turns::{Role, Turn};

/// Sole liveness guarantee: bounds tool-calling cycles that never converge.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub final_text: String,
    pub conversation: Vec<Turn>,
    pub iterations: usize,
}

/// The tool-calling orchestration loop.
///
/// Each cycle sends the accumulated conversation to the provider. A reply
/// carrying tool calls is appended, its requests dispatched in arrival order,
/// and one tool-role turn per result appended in that same order before the
/// loop continues. A reply without tool calls is the final answer. The loop
/// strictly alternates one provider call with one dispatch phase; the
/// provider call is the only suspension point.
pub struct AgentLoop<A> {
    adapter: A,
    max_iterations: usize,
}

impl<A: ProviderAdapter> AgentLoop<A> {
    pub fn new(adapter: A) -> Self {
        Self {
            adapter,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Runs the loop to completion over a fresh session seeded with `seed`.
    ///
    /// Returns the final answer and the full transcript, or fails with a
    /// provider failure or an exhausted iteration budget. Tool failures never
    /// surface here; they are fed back to the model as error results.
    pub async fn run(&self, seed: Vec<Turn>, catalog: &ToolCatalog) -> Result<AgentOutcome> {
        let mut session = AgentSession::new(seed, catalog.clone(), self.max_iterations);

        while !session.budget_exhausted() {
            let reply = self.adapter.send(session.conversation(), session.catalog()).await?;

            if !reply.has_tool_calls() {
                if reply.text.is_none() {
                    warn!(
                        provider = self.adapter.provider(),
                        "reply carried neither text nor tool calls; treating as empty final answer"
                    );
                }
                let final_text = reply.text().to_string();
                session.append(Turn {
                    role: Role::Assistant,
                    text: Some(final_text.clone()),
                    tool_calls: Vec::new(),
                    tool_results: Vec::new(),
                });
                let iterations = session.iterations();
                debug!(iterations, "agent run finished with final answer");
                return Ok(AgentOutcome {
                    final_text,
                    conversation: session.into_conversation(),
                    iterations,
                });
            }

            debug!(
                provider = self.adapter.provider(),
                calls = reply.tool_calls.len(),
                iteration = session.iterations() + 1,
                "dispatching tool calls"
            );

            let requests = reply.tool_calls.clone();
            session.append(reply);
            for request in &requests {
                let result = dispatch(request, session.catalog());
                session.append(Turn::tool_result(result));
            }

            session.count_iteration();
        }

        Err(AgentError::IterationBudgetExceeded {
            iterations: session.iterations(),
        })
    }
}
