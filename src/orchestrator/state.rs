//! Pipeline state management and stage tracking
//!
//! State tracking structures used by the orchestrator to sequence the
//! synthesis and implementation stages.
//!
//! **Architecture**:
//! - `StageState`: discrete lifecycle states of one build stage
//! - `PipelineState`: tracks both stages, timestamps and the first error
//! - Transitions are driven by the orchestrator and validated here

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::models::StageKind;

/// Lifecycle state of a single build stage.
///
/// Stages move strictly forward; a terminal state never transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageState {
    /// Created, not yet launched
    Pending,

    /// Launched, toolchain job in flight
    Running,

    /// Terminal: toolchain reported success
    Succeeded,

    /// Terminal: toolchain reported failure
    Failed,
}

impl StageState {
    /// Get the human-readable name for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageState::Pending => "pending",
            StageState::Running => "running",
            StageState::Succeeded => "succeeded",
            StageState::Failed => "failed",
        }
    }

    /// Get all valid transitions FROM this state.
    pub fn valid_next_states(&self) -> Vec<StageState> {
        match self {
            StageState::Pending => vec![StageState::Running],
            StageState::Running => vec![StageState::Succeeded, StageState::Failed],
            StageState::Succeeded => vec![],
            StageState::Failed => vec![],
        }
    }

    /// Check if a transition to the given state is valid.
    pub fn can_transition_to(&self, next: StageState) -> bool {
        self.valid_next_states().contains(&next)
    }

    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageState::Succeeded | StageState::Failed)
    }
}

/// Pipeline execution state snapshot.
///
/// Maintained by the orchestrator; serializable so a run can be inspected
/// after the fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    /// Project identity, for snapshots and logs
    pub project_name: String,

    /// Target part identifier
    pub part: String,

    /// Synthesis stage state
    pub synthesis: StageState,

    /// Implementation stage state
    pub implementation: StageState,

    /// Pipeline start timestamp
    pub start_time: SystemTime,

    /// Last transition timestamp
    pub last_update_time: SystemTime,

    /// First fatal error, if any
    pub error: Option<String>,
}

impl PipelineState {
    /// Create a new pipeline state with both stages pending.
    pub fn new(project_name: &str, part: &str) -> Self {
        let now = SystemTime::now();
        PipelineState {
            project_name: project_name.to_string(),
            part: part.to_string(),
            synthesis: StageState::Pending,
            implementation: StageState::Pending,
            start_time: now,
            last_update_time: now,
            error: None,
        }
    }

    /// Current state of the given stage.
    pub fn stage(&self, kind: StageKind) -> StageState {
        match kind {
            StageKind::Synthesis => self.synthesis,
            StageKind::Implementation => self.implementation,
        }
    }

    /// Attempt to transition the given stage to the next state.
    pub fn transition(&mut self, kind: StageKind, next: StageState) -> Result<(), String> {
        let current = self.stage(kind);
        if !current.can_transition_to(next) {
            return Err(format!(
                "Invalid {} transition: {} -> {}",
                kind,
                current.as_str(),
                next.as_str()
            ));
        }
        match kind {
            StageKind::Synthesis => self.synthesis = next,
            StageKind::Implementation => self.implementation = next,
        }
        self.last_update_time = SystemTime::now();
        Ok(())
    }

    /// Whether the given stage may be launched now.
    ///
    /// Encodes the ordering guarantee: implementation never starts unless
    /// synthesis reached `succeeded`.
    pub fn can_start(&self, kind: StageKind) -> bool {
        match kind {
            StageKind::Synthesis => self.synthesis == StageState::Pending,
            StageKind::Implementation => {
                self.implementation == StageState::Pending
                    && self.synthesis == StageState::Succeeded
            }
        }
    }

    /// Record the first fatal error.
    pub fn record_error(&mut self, error: String) {
        if self.error.is_none() {
            self.error = Some(error);
        }
        self.last_update_time = SystemTime::now();
    }

    /// Get time elapsed since pipeline start.
    pub fn elapsed_since_start(&self) -> Result<std::time::Duration, std::time::SystemTimeError> {
        self.start_time.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_transitions() {
        assert!(StageState::Pending.can_transition_to(StageState::Running));
        assert!(StageState::Running.can_transition_to(StageState::Succeeded));
        assert!(StageState::Running.can_transition_to(StageState::Failed));
        assert!(!StageState::Pending.can_transition_to(StageState::Succeeded));
    }

    #[test]
    fn test_terminal_states_never_transition() {
        assert!(StageState::Succeeded.valid_next_states().is_empty());
        assert!(StageState::Failed.valid_next_states().is_empty());
        assert!(!StageState::Failed.can_transition_to(StageState::Pending));
        assert!(!StageState::Succeeded.can_transition_to(StageState::Running));
    }

    #[test]
    fn test_pipeline_state_creation() {
        let state = PipelineState::new("add3", "xc7a35tcpg236-1");
        assert_eq!(state.synthesis, StageState::Pending);
        assert_eq!(state.implementation, StageState::Pending);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_legal_transition_chain() {
        let mut state = PipelineState::new("add3", "partX");
        assert!(state
            .transition(StageKind::Synthesis, StageState::Running)
            .is_ok());
        assert!(state
            .transition(StageKind::Synthesis, StageState::Succeeded)
            .is_ok());
        assert_eq!(state.synthesis, StageState::Succeeded);
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut state = PipelineState::new("add3", "partX");
        assert!(state
            .transition(StageKind::Synthesis, StageState::Succeeded)
            .is_err());
        assert_eq!(state.synthesis, StageState::Pending);
    }

    #[test]
    fn test_implementation_gated_on_synthesis() {
        let mut state = PipelineState::new("add3", "partX");
        assert!(!state.can_start(StageKind::Implementation));

        state.transition(StageKind::Synthesis, StageState::Running).unwrap();
        state.transition(StageKind::Synthesis, StageState::Failed).unwrap();
        assert!(!state.can_start(StageKind::Implementation));

        let mut ok = PipelineState::new("add3", "partX");
        ok.transition(StageKind::Synthesis, StageState::Running).unwrap();
        ok.transition(StageKind::Synthesis, StageState::Succeeded).unwrap();
        assert!(ok.can_start(StageKind::Implementation));
    }

    #[test]
    fn test_record_error_keeps_first() {
        let mut state = PipelineState::new("add3", "partX");
        state.record_error("synthesis stage failed".to_string());
        state.record_error("later noise".to_string());
        assert_eq!(state.error.as_deref(), Some("synthesis stage failed"));
    }
}
