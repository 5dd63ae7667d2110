use sequence::TaskName;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Task '{0}' is already registered")]
    DuplicateTask(String),
    #[error("Task '{0}' is not registered")]
    UnknownTask(String),
    #[error("Task '{task}' depends on '{dep}', which is not registered")]
    UnknownDependency { task: String, dep: String },
    #[error("Dependency cycle detected at task '{0}'")]
    Cycle(TaskName),
    #[error("Not run because task '{failed}' failed")]
    Cancelled { failed: TaskName },
    #[error("Shell command exited with {0}")]
    ExitStatus(std::process::ExitStatus),
    #[error("No tasks are running, but the sequence has not finished")]
    Stalled,
}
