use clap::Parser;

const CMD_NAME: &str = "rseq";
const DEFAULT_TASK_FILE: &str = "tasks.rseq";

/// Stores our command-line args format.
#[derive(Parser, Debug, Default)]
#[command(name = CMD_NAME, version, about = None, long_about = None)]
pub struct Args {
    /// Task definition file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_TASK_FILE)]
    #[arg(env = "RSEQ_FILE")]
    pub file: String,

    /// Name of a plan defined in the task file
    #[arg(short, long, value_name = "PLAN", conflicts_with = "sequence")]
    pub plan: Option<String>,

    /// Steps to run in order; separate tasks with commas to run them concurrently
    #[arg(value_name = "TASK[,TASK...]")]
    pub sequence: Vec<String>,

    /// List tasks and plans, then exit
    #[arg(short, long)]
    pub list: bool,

    /// Skip empty task names instead of failing
    #[arg(long)]
    pub ignore_undefined: bool,

    /// Only report which task failed, not why
    #[arg(long)]
    pub summary_errors: bool,

    /// Working directory for shell tasks (default: the task file's directory)
    #[arg(short = 'C', long, value_name = "DIR")]
    pub dir: Option<String>,

    /// Print additional debugging info (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
