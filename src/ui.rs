use std::cell::RefCell;
use std::rc::Rc;

use colored::Colorize;

use sequence::{Channel, Failure, Host, Notification, TaskName};
use util::{HashMap, Timer};

/// All interactions with the text UI should go through this struct.
pub struct Ui {
    /// -v setting, displays extra text info to user
    pub verbose: u8,
    /// keeps track of time for each running task
    timers: RefCell<HashMap<TaskName, Timer>>,
}

impl Ui {
    pub fn new(verbose: u8) -> Rc<Self> {
        Rc::new(Self {
            verbose,
            timers: RefCell::default(),
        })
    }

    /// Print a status line for every task the host starts, stops, or fails.
    pub fn follow(self: &Rc<Self>, host: &dyn Host) {
        for channel in [Channel::TaskStart, Channel::TaskStop, Channel::TaskError] {
            let ui = Rc::clone(self);
            host.subscribe(channel, Rc::new(move |n: &Notification| ui.task_event(n)));
        }
    }

    fn task_event(&self, notification: &Notification) {
        match notification {
            Notification::TaskStart { task } => {
                eprintln!("{} {task}", "RUN".green());
                if self.verbose > 0 {
                    self.timers.borrow_mut().insert(task.clone(), Timer::now());
                }
            }
            Notification::TaskStop { task } => {
                eprintln!("{} {task}", "COMPLETED".green());
                self.print_elapsed(task);
            }
            Notification::TaskError { task, failure } => {
                match failure {
                    Failure::Aborted => eprintln!("{} {task} (aborted)", "FAILED".red()),
                    Failure::Error(e) => eprintln!("{} {task}: {e}", "FAILED".red()),
                }
                self.print_elapsed(task);
            }
        }
    }

    fn print_elapsed(&self, task: &TaskName) {
        if let Some(timer) = self.timers.borrow_mut().remove(task) {
            timer.print_elapsed(task.as_str());
        }
    }

    pub fn verbose_msg(&self, msg: &str) {
        if self.verbose > 0 {
            eprintln!("{}", msg.magenta());
        }
    }

    pub fn heading(&self, msg: &str) {
        println!("{}", msg.bold());
    }
}
