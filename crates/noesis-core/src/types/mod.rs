//! Core types for noesis.

mod event;
mod memory_strength;
mod message;
mod node;
mod stage;

pub use event::DocumentEvent;
pub use memory_strength::{MemoryStrengthData, DEFAULT_SUCCESS_RATE, HISTORY_WINDOW};
pub use message::*;
pub use node::*;
pub use stage::{CognitiveStage, CognitiveStageScores};
