//! Rotation engine
//!
//! Converging one base name runs in two halves:
//!
//! - [`plan`] is a pure function from the desired record and the records the
//!   store holds to the store operations that reconcile them;
//! - the executor reads state, plans, applies the plan, and on a lost
//!   optimistic-concurrency race re-reads and tries again under a
//!   [`RetryPolicy`].
//!
//! Within one attempt a new generation is written in a fixed order:
//! materialize, delete superseded `Old` records, copy the prior `Current` to
//! `Old` (`KeepOld` only), delete prior `Current` records, create the new
//! `Current`. A retry after a partial attempt re-plans from whatever state the
//! store is in, so every intermediate state converges.

pub(crate) mod engine;
pub mod plan;
mod retry;
mod strategy;

pub use retry::RetryPolicy;
pub use strategy::RotationStrategy;
