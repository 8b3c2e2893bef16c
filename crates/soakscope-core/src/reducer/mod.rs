//! Reducer framework for replaying telemetry into aggregate state.
//!
//! A reducer folds an ordered stream of inputs into a projection. Soak logs
//! are replayed offline in a single pass, so there is no checkpointing: each
//! replay starts from an empty state and ends with a frozen value.
//!
//! # Architecture
//!
//! ```text
//! Records (loader) --> typed inputs --> Reducer --> Aggregate
//! ```
//!
//! # Determinism
//!
//! Reducers must be deterministic: given the same sequence of inputs they
//! must produce the same state. [`replay`] always resets before folding, so
//! replaying the same sequence twice yields equal aggregates. This is checked
//! by property tests.
//!
//! # Example
//!
//! ```rust
//! use soakscope_core::reducer::{Reducer, ReducerContext, replay};
//!
//! #[derive(Default)]
//! struct ActiveCount {
//!     active: u64,
//! }
//!
//! impl Reducer for ActiveCount {
//!     type Input<'a> = &'a str;
//!     type State = u64;
//!
//!     fn name(&self) -> &'static str {
//!         "active-count"
//!     }
//!
//!     fn apply(&mut self, input: &str, _ctx: &ReducerContext) {
//!         match input {
//!             "start" => self.active += 1,
//!             "end" => self.active = self.active.saturating_sub(1),
//!             _ => {},
//!         }
//!     }
//!
//!     fn state(&self) -> &u64 {
//!         &self.active
//!     }
//!
//!     fn reset(&mut self) {
//!         self.active = 0;
//!     }
//!
//!     fn into_state(self) -> u64 {
//!         self.active
//!     }
//! }
//!
//! let mut reducer = ActiveCount::default();
//! let result = replay(&mut reducer, ["start", "start", "end"]);
//! assert_eq!(result.inputs_processed, 3);
//! assert_eq!(*reducer.state(), 1);
//! ```


use tracing::trace;

/// Position information handed to every [`Reducer::apply`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReducerContext {
    /// 1-based position of the input within the replayed sequence.
    pub seq: u64,
}

impl ReducerContext {
    /// Creates a context for the input at `seq`.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self { seq }
    }
}

/// A pure fold from ordered inputs to a projection.
pub trait Reducer {
    /// The input type, borrowed from the materialized sequence.
    type Input<'a>;

    /// The projection built by this reducer.
    type State;

    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    /// Folds one input into the state. Must not fail: malformed inputs
    /// degrade to documented defaults.
    fn apply(&mut self, input: Self::Input<'_>, ctx: &ReducerContext);

    /// Borrows the current state.
    fn state(&self) -> &Self::State;

    /// Returns the reducer to its empty state.
    fn reset(&mut self);

    /// Finishes the fold and hands the state off by value.
    fn into_state(self) -> Self::State;
}

/// Outcome of a [`replay`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayResult {
    /// Number of inputs folded.
    pub inputs_processed: u64,
    /// Position of the last input folded (0 when nothing was folded).
    pub last_seq: u64,
}

/// Resets `reducer` and folds `inputs` into it in iteration order.
pub fn replay<'a, R, I>(reducer: &mut R, inputs: I) -> ReplayResult
where
    R: Reducer,
    I: IntoIterator<Item = R::Input<'a>>,
{
    reducer.reset();

    let mut seq: u64 = 0;
    for input in inputs {
        seq += 1;
        reducer.apply(input, &ReducerContext::new(seq));
    }

    trace!(reducer = reducer.name(), inputs = seq, "replay complete");
    ReplayResult {
        inputs_processed: seq,
        last_seq: seq,
    }
}
