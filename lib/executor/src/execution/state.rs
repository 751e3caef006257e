use std::fmt::{Display, Formatter as FmtFormatter, Result as FmtResult};

/// Lifecycle of one step during a single execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepState {
    #[default]
    Pending,
    /// Every dependency completed; about to be dispatched.
    Ready,
    Running,
    Completed,
    Failed,
    /// Never dispatched, because a dependency failed or the request was cancelled.
    Skipped,
}

impl StepState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepState::Completed | StepState::Failed | StepState::Skipped
        )
    }

    /// Dependents of a step in this state must not run.
    pub fn blocks_dependents(&self) -> bool {
        matches!(self, StepState::Failed | StepState::Skipped)
    }
}

impl Display for StepState {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        match self {
            StepState::Pending => write!(f, "pending"),
            StepState::Ready => write!(f, "ready"),
            StepState::Running => write!(f, "running"),
            StepState::Completed => write!(f, "completed"),
            StepState::Failed => write!(f, "failed"),
            StepState::Skipped => write!(f, "skipped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::StepState;

    #[test]
    fn only_failures_block_dependents() {
        assert!(StepState::Failed.blocks_dependents());
        assert!(StepState::Skipped.blocks_dependents());
        assert!(!StepState::Completed.blocks_dependents());
        assert!(!StepState::Ready.is_terminal());
        assert!(StepState::Skipped.is_terminal());
    }
}
