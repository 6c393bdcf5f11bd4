//! Form session state machine
//!
//! Elm-style: a pure transition function returns the next progress and a
//! list of effects, which the engine then executes.

mod effect;
pub mod event;
pub mod render;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, Outbound};
pub use event::{Command, Event};
pub use state::{Answers, FormState, Progress};
pub use transition::{transition, TransitionError, TransitionResult};
