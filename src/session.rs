use crate::catalog::ToolCatalog;
use crate::turns::Turn;

/// The accumulated state of one agent run: the append-only conversation, the
/// catalog offered to the model, and the iteration budget. Exclusively owned
/// by one [`crate::AgentLoop`] run; sessions share nothing, so any number may
/// run in parallel without locking.
#[derive(Debug, Clone)]
pub struct AgentSession {
    conversation: Vec<Turn>,
    catalog: ToolCatalog,
    iterations: usize,
    max_iterations: usize,
}

impl AgentSession {
    pub fn new(seed: Vec<Turn>, catalog: ToolCatalog, max_iterations: usize) -> Self {
        Self {
            conversation: seed,
            catalog,
            iterations: 0,
            max_iterations,
        }
    }

    pub fn conversation(&self) -> &[Turn] {
        &self.conversation
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// One tool-dispatch round completed.
    pub(crate) fn count_iteration(&mut self) {
        self.iterations += 1;
    }

    pub(crate) fn budget_exhausted(&self) -> bool {
        self.iterations >= self.max_iterations
    }

    pub(crate) fn append(&mut self, turn: Turn) {
        self.conversation.push(turn);
    }

    pub fn into_conversation(self) -> Vec<Turn> {
        self.conversation
    }
}
