//! Run named tasks in a controlled order.
//!
//! A sequence is a list of steps. Each step is either a single task or a
//! group of tasks started together; a step only starts once every task in the
//! previous step has stopped. The first failure ends the sequence.
//!
//! Tasks themselves live in a [`Host`], which knows how to start them and
//! tells us (through [`Notification`]s) when they stop or fail.
//!
//! ```ignore
//! let seq = Sequencer::new(host);
//! seq.run_with(["clean", Entry::from(["build-js", "build-css"]), "deploy"], |outcome| {
//!     if let Err(e) = outcome {
//!         eprintln!("{}", error_chain(&e));
//!     }
//! })?;
//! ```

mod driver;
mod error;
mod handle;
mod host;
mod options;
mod plan;
mod task;

#[cfg(test)]
mod test_host;

pub use driver::{
    clear_default_host, default_sequencer, run, run_with, set_default_host, Callback, Sequencer,
};
pub use error::{error_chain, PlanError, RunError};
pub use handle::{RunHandle, RunResult};
pub use host::{cause, Cause, Channel, Failure, Handler, Host, Listeners, Notification, SubscriptionId};
pub use options::{options, set_options, update_options, Options};
pub use plan::{drop_blanks, Plan, TaskGroup};
pub use task::{Entry, TaskName};
