//! State machine for tracking a single publish run
//!
//! Transitions are strictly linear: Idle → Cleaning → Cloning → Installing
//! → Done, with a direct jump to Failed from any working state. The history
//! lives in memory only and is handed back with the publish report.

use crate::core::error::PublishStage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Publishing state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublishState {
    Idle,
    Cleaning,
    Cloning,
    Installing,
    Done,
    Failed(PublishStage),
}

impl PublishState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PublishState::Done | PublishState::Failed(_))
    }

    /// Stage that is running while in this state
    pub fn stage(&self) -> Option<PublishStage> {
        match self {
            PublishState::Cleaning => Some(PublishStage::Cleaning),
            PublishState::Cloning => Some(PublishStage::Cloning),
            PublishState::Installing => Some(PublishStage::Installing),
            _ => None,
        }
    }

    fn next(&self) -> Option<PublishState> {
        match self {
            PublishState::Idle => Some(PublishState::Cleaning),
            PublishState::Cleaning => Some(PublishState::Cloning),
            PublishState::Cloning => Some(PublishState::Installing),
            PublishState::Installing => Some(PublishState::Done),
            PublishState::Done | PublishState::Failed(_) => None,
        }
    }
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishState::Failed(stage) => write!(f, "Failed({})", stage),
            other => write!(f, "{:?}", other),
        }
    }
}

/// State transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateTransition {
    pub from: PublishState,
    pub to: PublishState,
    pub timestamp: DateTime<Utc>,
}

/// Error returned for a transition the pipeline never makes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid publish state transition {from} → {to}")]
pub struct InvalidTransition {
    pub from: PublishState,
    pub to: PublishState,
}

/// State machine for one publish invocation
#[derive(Debug)]
pub struct PublishStateMachine {
    current_state: PublishState,
    transitions: Vec<StateTransition>,
}

impl Default for PublishStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PublishStateMachine {
    pub fn new() -> Self {
        Self {
            current_state: PublishState::Idle,
            transitions: Vec::new(),
        }
    }

    /// Move to the next stage in the pipeline
    pub fn advance(&mut self) -> Result<PublishState, InvalidTransition> {
        let to = self.current_state.next().ok_or(InvalidTransition {
            from: self.current_state,
            to: PublishState::Done,
        })?;
        self.record(to);
        Ok(to)
    }

    /// Jump to `Failed`, tagged with the stage currently running
    pub fn fail(&mut self) -> Result<PublishStage, InvalidTransition> {
        let stage = self.current_state.stage().ok_or(InvalidTransition {
            from: self.current_state,
            to: PublishState::Failed(PublishStage::Cleaning),
        })?;
        self.record(PublishState::Failed(stage));
        Ok(stage)
    }

    fn record(&mut self, to: PublishState) {
        self.transitions.push(StateTransition {
            from: self.current_state,
            to,
            timestamp: Utc::now(),
        });
        self.current_state = to;
    }

    /// Get current state
    pub fn get_state(&self) -> PublishState {
        self.current_state
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    pub fn into_transitions(self) -> Vec<StateTransition> {
        self.transitions
    }
}

/// Render transitions as one `timestamp: from → to` line each
pub fn format_history(transitions: &[StateTransition]) -> String {
    transitions
        .iter()
        .map(|t| format!("{}: {} → {}", t.timestamp.to_rfc3339(), t.from, t.to))
        .collect::<Vec<_>>()
        .join("\n")
}
