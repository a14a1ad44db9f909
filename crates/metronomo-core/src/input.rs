//! Discrete user actions and how they map to scheduler commands

use crate::transport::RunState;

/// Actions raised by key bindings or buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    ToggleRun,
    ResetIfIdle,
    ForceStop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    Start,
    Stop,
    Reset,
}

impl InputAction {
    /// Resolve an action against the current run state.
    ///
    /// `text_focused` suppresses everything except `ForceStop`, so typing
    /// into an entry field never starts or resets playback.
    pub fn route(self, run_state: RunState, text_focused: bool) -> Option<SchedulerCommand> {
        match self {
            InputAction::ForceStop => Some(SchedulerCommand::Stop),
            _ if text_focused => None,
            InputAction::ToggleRun => Some(match run_state {
                RunState::Idle => SchedulerCommand::Start,
                RunState::Running => SchedulerCommand::Stop,
            }),
            InputAction::ResetIfIdle => match run_state {
                RunState::Idle => Some(SchedulerCommand::Reset),
                RunState::Running => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_run() {
        assert_eq!(InputAction::ToggleRun.route(RunState::Idle, false), Some(SchedulerCommand::Start));
        assert_eq!(InputAction::ToggleRun.route(RunState::Running, false), Some(SchedulerCommand::Stop));
    }

    #[test]
    fn test_reset_only_when_idle() {
        assert_eq!(InputAction::ResetIfIdle.route(RunState::Idle, false), Some(SchedulerCommand::Reset));
        assert_eq!(InputAction::ResetIfIdle.route(RunState::Running, false), None);
    }

    #[test]
    fn test_text_focus_suppression() {
        assert_eq!(InputAction::ToggleRun.route(RunState::Idle, true), None);
        assert_eq!(InputAction::ResetIfIdle.route(RunState::Idle, true), None);
        assert_eq!(InputAction::ForceStop.route(RunState::Running, true), Some(SchedulerCommand::Stop));
    }
}
