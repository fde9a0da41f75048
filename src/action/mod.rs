//! What the pool applies to each work order
//!
//! [`BulkAction`] is the seam between the worker pool and the side effect:
//! one implementation per kind of operation, instantiated where it is used.
//! The CLI ships two: [`CommandAction`] executes a templated command per
//! row, and [`RehearsalAction`] only logs what would run (the default).

mod command;
mod rehearsal;
mod template;

pub use command::{CommandAction, CommandError};
pub use rehearsal::RehearsalAction;
pub use template::CommandTemplate;

use anyhow::Result;

use crate::pool::Disposition;

/// One side-effecting operation applied across many items.
///
/// Every worker thread owns a `Worker` value built by [`init_worker`]
/// before the run starts, so connection-like state is never shared
/// between threads.
///
/// [`init_worker`]: BulkAction::init_worker
pub trait BulkAction<T>: Sync {
    type Worker: Send;

    /// Build per-worker state for worker `slot`. An error here aborts the
    /// whole run before any item is attempted.
    fn init_worker(&self, slot: usize) -> Result<Self::Worker>;

    /// Apply the operation to one item. Errors are retried by the pool
    /// unless classified fatal; success says whether anything changed.
    fn apply(&self, worker: &mut Self::Worker, item: &T) -> Result<Disposition>;
}

/// Plain closures are stateless actions.
impl<T, F> BulkAction<T> for F
where
    F: Fn(&T) -> Result<Disposition> + Sync,
{
    type Worker = ();

    fn init_worker(&self, _slot: usize) -> Result<()> {
        Ok(())
    }

    fn apply(&self, _worker: &mut (), item: &T) -> Result<Disposition> {
        self(item)
    }
}
