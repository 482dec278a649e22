use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Structural failures rejected at the API boundary. A returned error
/// guarantees the tree was not mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("moving '{node}' under '{target}' would make it its own ancestor")]
    CircularReference { node: String, target: String },
    #[error("degenerate input: {reason}")]
    DegenerateInput { reason: String },
    #[error("unknown node id '{id}'")]
    UnknownNode { id: String },
    #[error("a drag session is already in progress")]
    SessionActive,
    #[error("no drag session is in progress")]
    NoSession,
}

/// Non-fatal conditions attached to a computed layout. Geometric
/// difficulties never fail a layout call; they surface here instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum LayoutWarning {
    /// Relaxation hit the iteration cap at this depth; the layout is the
    /// best found, with the residual adjustment in pixels.
    Convergence { depth: usize, residual: f32 },
    /// The ring at this depth could not fit its nodes at the configured
    /// radius and was grown to the reported value.
    Capacity { depth: usize, radius: f32 },
}

impl fmt::Display for LayoutWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Convergence { depth, residual } => write!(
                f,
                "layout did not fully converge at depth {depth} (residual {residual:.2}px)"
            ),
            Self::Capacity { depth, radius } => {
                write!(f, "radius at depth {depth} auto-increased to {radius:.1}")
            }
        }
    }
}
