//! Run state

use serde::{Deserialize, Serialize};

/// Scheduler run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunState {
    #[default]
    Idle,
    Running,
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunState::Idle => "Stopped",
            RunState::Running => "Playing",
        }
    }
}
