//! Runtime, builder and turn pipeline for the Alice agent

mod builder;
mod context;
mod post_turn;
mod runtime;

pub mod spec;

pub use builder::AliceBuilder;
pub use context::{ContextAssembler, memory_block};
pub use post_turn::{PostTurnOutcome, PostTurnProcessor};
pub use runtime::{Alice, AliceResponse};

pub use alice_core::{AliceError, Result};
