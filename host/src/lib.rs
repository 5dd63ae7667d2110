//! An in-process [`Host`](sequence::Host): a registry of named tasks with
//! dependencies, and a scheduler that runs them as closures or shell commands.

mod action;
pub use action::{Action, Job, Progress, Shell};

mod error;
pub use error::Error;

mod registry;
pub use registry::{Registry, TaskDef};

mod local;
pub use local::{LocalHost, POLL_INTERVAL};
