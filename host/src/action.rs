use std::path::PathBuf;
use std::process::{Child, Command};

use anyhow::Context;

use sequence::TaskName;

/// Identifies one launched task instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub(crate) id: u64,
    pub(crate) batch: u64,
    pub(crate) task: TaskName,
}

impl Job {
    pub fn task(&self) -> &TaskName {
        &self.task
    }
}

/// What an [`Action`] did when it was started.
#[derive(Debug)]
pub enum Progress {
    /// Finished before returning.
    Done(anyhow::Result<()>),
    /// Still running; the owner reports completion through
    /// [`LocalHost::complete`](crate::LocalHost::complete).
    Pending,
    /// Running as a child process, which the host polls.
    Spawned(Child),
}

impl From<anyhow::Result<()>> for Progress {
    fn from(result: anyhow::Result<()>) -> Self {
        Self::Done(result)
    }
}

/// The work behind a registered task.
pub trait Action {
    fn start(&self, job: &Job) -> Progress;
}

impl<F> Action for F
where
    F: Fn(&Job) -> Progress,
{
    fn start(&self, job: &Job) -> Progress {
        self(job)
    }
}

/// Runs a shell snippet with `sh -c`.
#[derive(Debug, Clone)]
pub struct Shell {
    code: String,
    dir: PathBuf,
}

impl Shell {
    pub fn new(code: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            code: code.into(),
            dir: dir.into(),
        }
    }
}

impl Action for Shell {
    fn start(&self, job: &Job) -> Progress {
        log::trace!("Running shell code for task '{}':\n{}", job.task, self.code);
        let spawned = Command::new("sh")
            .arg("-c")
            .arg(&self.code)
            .current_dir(&self.dir)
            .spawn()
            .with_context(|| format!("spawning shell for task '{}' in {:?}", job.task, self.dir));
        match spawned {
            Ok(child) => Progress::Spawned(child),
            Err(e) => Progress::Done(Err(e)),
        }
    }
}
