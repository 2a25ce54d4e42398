//! Lifecycle state machine for a monitored deployment

/// Monitor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Nothing launched yet
    Idle,

    /// Launch sequence in flight
    Launching,

    /// Job running, both channels live
    Monitoring,

    /// Job finished successfully
    Completed,

    /// Launch or job failed
    Failed,

    /// Torn down by the user
    Cancelled,
}

impl MonitorState {
    /// Whether this state is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MonitorState::Completed | MonitorState::Failed | MonitorState::Cancelled
        )
    }
}

/// Lifecycle event
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// Start the launch sequence
    Launch,

    /// All three launch calls succeeded
    LaunchSucceeded,

    /// A launch call failed
    LaunchFailed(String),

    /// Terminal success observed by the arbiter
    Complete,

    /// Terminal failure observed by the arbiter
    Fail(String),

    /// Explicit user cancellation
    Cancel,
}

/// Monitor lifecycle FSM
#[derive(Debug, Clone)]
pub struct MonitorFsm {
    state: MonitorState,
    error: Option<String>,
}

impl MonitorFsm {
    /// Create a new FSM in idle state
    pub fn new() -> Self {
        Self {
            state: MonitorState::Idle,
            error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: LifecycleEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            // From Idle
            (MonitorState::Idle, LifecycleEvent::Launch) => MonitorState::Launching,

            // From Launching
            (MonitorState::Launching, LifecycleEvent::LaunchSucceeded) => MonitorState::Monitoring,
            (MonitorState::Launching, LifecycleEvent::LaunchFailed(err)) => {
                self.error = Some(err.clone());
                MonitorState::Failed
            }
            (MonitorState::Launching, LifecycleEvent::Cancel) => MonitorState::Cancelled,

            // From Monitoring
            (MonitorState::Monitoring, LifecycleEvent::Complete) => MonitorState::Completed,
            (MonitorState::Monitoring, LifecycleEvent::Fail(err)) => {
                self.error = Some(err.clone());
                MonitorState::Failed
            }
            (MonitorState::Monitoring, LifecycleEvent::Cancel) => MonitorState::Cancelled,

            // Terminal states are sticky
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for MonitorFsm {
    fn default() -> Self {
        Self::new()
    }
}
