//! Scriptable in-memory [`Host`] for exercising the driver.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use util::{HashMap, HashSet};

use crate::{
    cause, Channel, Failure, Handler, Host, Listeners, Notification, RunError, SubscriptionId,
    TaskName,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// stop as soon as started.
    Sync,
    /// wait for `resume`, `stop`, `fail` or `abort`.
    Pause,
    /// fail as soon as started.
    Fail,
}

pub struct TestHost {
    modes: RefCell<HashMap<String, Mode>>,
    paused: RefCell<HashSet<String>>,
    events: RefCell<Vec<String>>,
    /// number of `start_tasks` calls.
    pub starts: Cell<usize>,
    /// errors passed to `log_error`.
    pub logged: RefCell<Vec<String>>,
    pub listeners: Listeners,
}

impl TestHost {
    pub fn with_tasks(names: &[&str]) -> Rc<Self> {
        Rc::new(Self {
            modes: RefCell::new(
                names
                    .iter()
                    .map(|name| (name.to_string(), Mode::Sync))
                    .collect(),
            ),
            paused: RefCell::default(),
            events: RefCell::default(),
            starts: Cell::new(0),
            logged: RefCell::default(),
            listeners: Listeners::default(),
        })
    }

    pub fn set_mode(&self, name: &str, mode: Mode) {
        self.modes.borrow_mut().insert(name.to_owned(), mode);
    }

    pub fn log(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    /// Stop a paused task.
    pub fn resume(&self, name: &str) {
        assert!(self.paused.borrow_mut().remove(name), "'{name}' is not paused");
        self.stop(name);
    }

    pub fn stop(&self, name: &str) {
        self.paused.borrow_mut().remove(name);
        self.record(format!("stop {name}"));
        self.listeners.emit(&Notification::TaskStop {
            task: TaskName::from(name),
        });
    }

    pub fn fail(&self, name: &str) {
        self.paused.borrow_mut().remove(name);
        self.record(format!("fail {name}"));
        self.listeners.emit(&Notification::TaskError {
            task: TaskName::from(name),
            failure: Failure::Error(cause(format!("{name} broke"))),
        });
    }

    pub fn abort(&self, name: &str) {
        self.paused.borrow_mut().remove(name);
        self.record(format!("abort {name}"));
        self.listeners.emit(&Notification::TaskError {
            task: TaskName::from(name),
            failure: Failure::Aborted,
        });
    }

    fn record(&self, event: String) {
        self.events.borrow_mut().push(event);
    }
}

impl Host for TestHost {
    fn has_task(&self, name: &str) -> bool {
        self.modes.borrow().contains_key(name)
    }

    fn start_tasks(&self, names: &[TaskName]) {
        self.starts.set(self.starts.get() + 1);
        for name in names {
            let mode = self
                .modes
                .borrow()
                .get(name.as_str())
                .copied()
                .unwrap_or(Mode::Sync);
            self.record(format!("start {name}"));
            match mode {
                Mode::Sync => self.stop(name.as_str()),
                Mode::Fail => self.fail(name.as_str()),
                Mode::Pause => {
                    self.paused.borrow_mut().insert(name.to_string());
                }
            }
        }
    }

    fn subscribe(&self, channel: Channel, handler: Handler) -> SubscriptionId {
        self.listeners.subscribe(channel, handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.unsubscribe(id);
    }

    fn log_error(&self, err: &RunError) {
        self.logged.borrow_mut().push(err.to_string());
    }
}
