use std::path::{Path, PathBuf};

use sequence::{Entry, Options};

use crate::args::Args;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Task file {0:?} not found")]
    TaskFileNotFound(PathBuf),
    #[error("Task file {0:?} has no parent directory")]
    TaskFileHasNoParent(PathBuf),
}

/// What to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Print the task file's contents.
    List,
    /// A plan named in the task file.
    Plan(String),
    /// A sequence given on the command line.
    Sequence(Vec<Entry>),
}

/// Settings are like Args, except all the logic has
/// been applied so e.g. defaults are added in.
#[derive(Debug)]
pub struct Settings {
    pub file: PathBuf,
    /// working directory for shell tasks.
    pub dir: PathBuf,
    pub target: Target,
    pub options: Options,
    pub verbose: u8,
}

impl TryFrom<Args> for Settings {
    type Error = anyhow::Error;
    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let file = PathBuf::from(&args.file);
        if !file.exists() {
            return Err(Error::TaskFileNotFound(file).into());
        }
        let file = file.canonicalize()?;

        let dir = match args.dir {
            Some(dir) => PathBuf::from(dir),
            None => file
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| Error::TaskFileHasNoParent(file.clone()))?,
        };

        let target = if args.list {
            Target::List
        } else if let Some(plan) = args.plan {
            Target::Plan(plan)
        } else {
            Target::Sequence(args.sequence.iter().map(|step| parse_step(step)).collect())
        };

        let options = Options {
            ignore_undefined_tasks: args.ignore_undefined,
            show_detailed_errors: !args.summary_errors,
        };

        Ok(Self {
            file,
            dir,
            target,
            options,
            verbose: args.verbose,
        })
    }
}

/// "a" is a single task, "a,b" a concurrent group.
/// Empty names become holes, which are only allowed with --ignore-undefined.
fn parse_step(step: &str) -> Entry {
    if step.contains(',') {
        Entry::group(step.split(',').map(name_or_hole))
    } else {
        name_or_hole(step)
    }
}

fn name_or_hole(name: &str) -> Entry {
    let name = name.trim();
    if name.is_empty() {
        Entry::Missing
    } else {
        Entry::from(name)
    }
}
