use std::cell::RefCell;
use std::error::Error as StdError;
use std::rc::Rc;
use std::sync::Arc;

use colored::Colorize;

use crate::{error_chain, RunError, TaskName};

/// Underlying error reported by a host, shared between all listeners.
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// Convert anything error-like (including `anyhow::Error` and strings) into a [`Cause`].
pub fn cause(err: impl Into<Box<dyn StdError + Send + Sync + 'static>>) -> Cause {
    Arc::from(err.into())
}

/// Why a task did not stop normally.
#[derive(Debug, Clone)]
pub enum Failure {
    /// The task itself failed.
    Error(Cause),
    /// The host halted before the task could finish.
    Aborted,
}

/// Notification channels a host provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    TaskStart,
    TaskStop,
    TaskError,
}

/// Something that happened to a task instance inside the host.
///
/// A task instance reports exactly one of `TaskStop` or `TaskError`.
#[derive(Debug, Clone)]
pub enum Notification {
    TaskStart { task: TaskName },
    TaskStop { task: TaskName },
    TaskError { task: TaskName, failure: Failure },
}

impl Notification {
    pub fn channel(&self) -> Channel {
        match self {
            Self::TaskStart { .. } => Channel::TaskStart,
            Self::TaskStop { .. } => Channel::TaskStop,
            Self::TaskError { .. } => Channel::TaskError,
        }
    }

    pub fn task(&self) -> &TaskName {
        match self {
            Self::TaskStart { task } | Self::TaskStop { task } | Self::TaskError { task, .. } => {
                task
            }
        }
    }
}

/// Identifies one subscription so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callback invoked for each notification on a subscribed channel.
pub type Handler = Rc<dyn Fn(&Notification)>;

/// A task-execution runtime: a registry of named tasks,
/// a scheduler that runs them, and an emitter of [`Notification`]s.
///
/// Hosts are single-threaded. `start_tasks` may report completions
/// synchronously (before it returns) or at any later point.
pub trait Host {
    /// true if a task with this name is registered.
    fn has_task(&self, name: &str) -> bool;

    /// Start all of the given tasks. Results are only reported through notifications.
    ///
    /// Every name in `names` must eventually get a `TaskStop` or a `TaskError`
    /// of its own. A sequence only listens for the tasks it asked for, so if a
    /// task can't run because something it depends on failed, the host has to
    /// report an error for the requested task too. Errors reported only for
    /// other tasks leave the sequence waiting.
    fn start_tasks(&self, names: &[TaskName]);

    fn subscribe(&self, channel: Channel, handler: Handler) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);

    /// Report a failed run that nobody asked to be told about.
    fn log_error(&self, err: &RunError) {
        log::error!("{err}");
        eprintln!(
            "{} {}",
            "Error running task sequence:".red(),
            error_chain(err)
        );
    }
}

#[derive(Default)]
struct Table {
    next_id: u64,
    entries: Vec<(SubscriptionId, Channel, Handler)>,
}

/// Subscription bookkeeping for [`Host`] implementations.
///
/// Handlers may subscribe, unsubscribe, or trigger further emits
/// while a notification is being delivered.
#[derive(Default)]
pub struct Listeners {
    table: RefCell<Table>,
}

impl Listeners {
    pub fn subscribe(&self, channel: Channel, handler: Handler) -> SubscriptionId {
        let mut table = self.table.borrow_mut();
        let id = SubscriptionId(table.next_id);
        table.next_id += 1;
        table.entries.push((id, channel, handler));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut table = self.table.borrow_mut();
        let len = table.entries.len();
        table.entries.retain(|(entry_id, ..)| *entry_id != id);
        table.entries.len() != len
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.table
            .borrow()
            .entries
            .iter()
            .any(|(entry_id, ..)| *entry_id == id)
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.table.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `notification` to every handler subscribed to its channel.
    pub fn emit(&self, notification: &Notification) {
        let channel = notification.channel();
        let targets: Vec<(SubscriptionId, Handler)> = self
            .table
            .borrow()
            .entries
            .iter()
            .filter(|(_, entry_channel, _)| *entry_channel == channel)
            .map(|(id, _, handler)| (*id, Rc::clone(handler)))
            .collect();

        for (id, handler) in targets {
            // an earlier handler in this round may have unsubscribed this one:
            if self.is_subscribed(id) {
                handler(notification);
            }
        }
    }
}
