use std::error::Error as StdError;
use std::fmt::Write;

use crate::{Cause, TaskName};

/// Problems with the shape of a requested sequence.
/// These are always reported before any task starts.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("No tasks were provided to run")]
    EmptyPlan,
    #[error("Task {0} is not a valid task name")]
    InvalidTask(String),
    #[error("Task '{0}' is not registered with the host")]
    UnknownTask(TaskName),
    #[error("An empty group was provided as a sequence step")]
    EmptyGroup,
    #[error("Task '{0}' is listed more than once in the same group. This is probably a typo.")]
    DuplicateTask(TaskName),
    #[error("No default host registered; use `Sequencer::new` or `set_default_host`")]
    NoDefaultHost,
}

/// Terminal failure of a sequence that started running.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RunError {
    /// The host reported that a task failed.
    /// `cause` is dropped when detailed errors are turned off.
    #[error("Task '{task}' failed")]
    TaskFailed {
        task: TaskName,
        #[source]
        cause: Option<Cause>,
    },
    /// The host halted while the task was still pending.
    #[error("Execution aborted while task '{task}' was pending")]
    Aborted { task: TaskName },
}

impl RunError {
    /// Name of the task the failure originated from.
    pub fn task(&self) -> &TaskName {
        match self {
            Self::TaskFailed { task, .. } | Self::Aborted { task } => task,
        }
    }
}

/// Render an error along with its chain of causes.
pub fn error_chain(err: &dyn StdError) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        // writing to a String can't fail.
        let _ = write!(msg, "\nCaused by:\n\t{cause}");
        source = cause.source();
    }
    msg
}
