//! Conversation engine.
//!
//! [`score`] carries the pure accumulation and outcome-classification
//! logic; [`session`] is the in-memory state machine that walks a
//! [`crate::scenario::ScenarioGraph`]. The server-authoritative adapter
//! reuses the same [`StepOutcome`] shape, so one scripted test suite can
//! drive either backing store through the same surface.

mod score;
mod session;

pub use score::{OutcomeLevel, ScoreTotals};
pub use session::{
    ChatMessage, ConversationSession, DisplayOption, NextOption, Role, SessionState, Settings,
    SettingsPatch, StepOutcome,
};
