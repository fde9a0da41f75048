//! Bounded worker pool with per-item retries and a failure circuit breaker
//!
//! This is the engine behind `drover run`: a fixed set of worker threads pulls
//! work orders from a bounded channel, retries each one against a backoff
//! policy, and stops dispatching new work once permanent failures pass a
//! configured ceiling. Every input item lands in exactly one of three result
//! sets (succeeded, failed, discarded).

mod breaker;
mod cancel;
mod core;
mod outcome;
mod policy;

pub use breaker::FailureBreaker;
pub use cancel::CancelToken;
pub use core::{PoolConfig, WorkerPool};
pub use outcome::{Disposition, Failed, RunReport, Succeeded};
pub use policy::{Backoff, ErrorClass};
