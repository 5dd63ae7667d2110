use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use util::HashSet;

use crate::options::{self, Options};
use crate::plan::{drop_blanks, Plan, TaskGroup};
use crate::{
    Channel, Entry, Failure, Host, Notification, PlanError, RunError, RunHandle, RunResult,
    SubscriptionId, TaskName,
};

/// Callback invoked with the outcome of a run.
pub type Callback = Box<dyn FnOnce(RunResult)>;

/// Runs sequences of tasks against one [`Host`].
///
/// Each call to [`run`](Self::run) validates the whole sequence first; if the
/// sequence is malformed or names a task the host doesn't know, it returns an
/// error without touching the host. Otherwise it starts the first step and
/// returns a [`RunHandle`]. Later steps are started from the host's
/// notifications, one step after the previous step's tasks have all stopped.
#[derive(Clone)]
pub struct Sequencer {
    host: Rc<dyn Host>,
    /// when unset, the process-wide options are read at the start of each run.
    options: Option<Options>,
}

impl Sequencer {
    /// Create a `Sequencer` bound to `host`.
    pub fn new(host: Rc<dyn Host>) -> Self {
        Self {
            host,
            options: None,
        }
    }

    /// Use `options` for every run instead of the process-wide options.
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = Some(options);
        self
    }

    pub fn host(&self) -> &Rc<dyn Host> {
        &self.host
    }

    /// Run `entries` in order. The outcome is only available through the returned handle.
    pub fn run<I, E>(&self, entries: I) -> Result<RunHandle, PlanError>
    where
        I: IntoIterator<Item = E>,
        E: Into<Entry>,
    {
        self.start(entries.into_iter().map(Into::into).collect(), None)
    }

    /// Run `entries` in order and call `callback` with the outcome.
    /// `callback` is not called if the sequence fails validation.
    pub fn run_with<I, E, F>(&self, entries: I, callback: F) -> Result<RunHandle, PlanError>
    where
        I: IntoIterator<Item = E>,
        E: Into<Entry>,
        F: FnOnce(RunResult) + 'static,
    {
        self.start(
            entries.into_iter().map(Into::into).collect(),
            Some(Box::new(callback)),
        )
    }

    fn start(
        &self,
        entries: Vec<Entry>,
        callback: Option<Callback>,
    ) -> Result<RunHandle, PlanError> {
        let options = self.options.unwrap_or_else(options::options);
        let entries = if options.ignore_undefined_tasks {
            drop_blanks(entries)
        } else {
            entries
        };

        let plan = Plan::validate(&entries, |name| self.host.has_task(name))?;
        log::debug!("Starting sequence of {} steps", plan.len());

        let run = Rc::new(Run {
            host: Rc::downgrade(&self.host),
            handle: RunHandle::new(),
            detailed_errors: options.show_detailed_errors,
            state: RefCell::new(RunState {
                phase: Phase::Starting,
                steps: plan.len(),
                groups: plan.into_groups().into(),
                active: HashSet::default(),
                advancing: false,
                advance_pending: false,
                subscriptions: Vec::with_capacity(2),
                callback,
            }),
        });
        let handle = run.handle.clone();

        run.listen(&self.host);
        run.advance();

        Ok(handle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Starting,
    Running { step: usize },
    Finished,
}

struct RunState {
    phase: Phase,
    /// total number of steps, for logging.
    steps: usize,
    /// steps not started yet.
    groups: VecDeque<TaskGroup>,
    /// tasks in the current step that haven't stopped yet.
    active: HashSet<TaskName>,
    /// set while `advance` is starting steps.
    advancing: bool,
    /// a step finished inside a `start_tasks` call that hasn't returned yet.
    advance_pending: bool,
    subscriptions: Vec<SubscriptionId>,
    callback: Option<Callback>,
}

/// One in-progress run.
///
/// The host's handlers own the run; the run only holds the host weakly.
/// No `RefCell` borrow is held across a call into the host, since the host
/// may notify us again before the call returns.
struct Run {
    host: Weak<dyn Host>,
    handle: RunHandle,
    detailed_errors: bool,
    state: RefCell<RunState>,
}

impl Run {
    fn listen(self: &Rc<Self>, host: &Rc<dyn Host>) {
        let ids = [Channel::TaskStop, Channel::TaskError].map(|channel| {
            let run = Rc::clone(self);
            host.subscribe(
                channel,
                Rc::new(move |notification: &Notification| run.notify(notification)),
            )
        });
        self.state.borrow_mut().subscriptions.extend(ids);
    }

    fn notify(&self, notification: &Notification) {
        match notification {
            Notification::TaskStop { task } => self.task_stopped(task),
            Notification::TaskError { task, failure } => self.task_failed(task, failure),
            Notification::TaskStart { .. } => {}
        }
    }

    fn task_stopped(&self, task: &TaskName) {
        let step_done = {
            let mut state = self.state.borrow_mut();
            if state.phase == Phase::Finished {
                return;
            }
            // stops for tasks outside the current step (or already stopped) are ignored:
            state.active.remove(task) && state.active.is_empty()
        };
        if step_done {
            self.advance();
        }
    }

    fn task_failed(&self, task: &TaskName, failure: &Failure) {
        let tracked = {
            let state = self.state.borrow();
            state.phase != Phase::Finished && state.active.contains(task)
        };
        if !tracked {
            log::debug!("Ignoring failure of task '{task}', which is not part of this step");
            return;
        }

        let err = match failure {
            Failure::Aborted => RunError::Aborted { task: task.clone() },
            Failure::Error(cause) => RunError::TaskFailed {
                task: task.clone(),
                cause: self.detailed_errors.then(|| Arc::clone(cause)),
            },
        };
        self.finish(Err(err));
    }

    /// Start the next step, and keep going while steps finish synchronously.
    ///
    /// A host may report every stop before `start_tasks` returns. Nested calls
    /// only mark the advance as pending, so the outermost call loops instead
    /// of recursing once per step.
    fn advance(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.advancing {
                state.advance_pending = true;
                return;
            }
            state.advancing = true;
        }

        loop {
            self.start_next_group();
            let mut state = self.state.borrow_mut();
            let again = std::mem::take(&mut state.advance_pending);
            if !again || state.phase == Phase::Finished {
                state.advancing = false;
                return;
            }
        }
    }

    fn start_next_group(&self) {
        let next = {
            let mut state = self.state.borrow_mut();
            let step = match state.phase {
                Phase::Starting => 0,
                Phase::Running { step } => step + 1,
                Phase::Finished => return,
            };
            match state.groups.pop_front() {
                Some(group) => {
                    state.phase = Phase::Running { step };
                    state.active = group.tasks().iter().cloned().collect();
                    log::debug!(
                        "Step {}/{}: starting {}",
                        step + 1,
                        state.steps,
                        group
                            .tasks()
                            .iter()
                            .map(TaskName::as_str)
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                    Some(group)
                }
                None => None,
            }
        };

        match next {
            Some(group) => {
                if let Some(host) = self.host.upgrade() {
                    host.start_tasks(group.tasks());
                }
            }
            None => self.finish(Ok(())),
        }
    }

    /// Single exit path: stop listening, report, and complete the handle.
    /// Only the first call has any effect.
    fn finish(&self, outcome: RunResult) {
        let (subscriptions, callback) = {
            let mut state = self.state.borrow_mut();
            if state.phase == Phase::Finished {
                return;
            }
            state.phase = Phase::Finished;
            state.groups.clear();
            state.active.clear();
            (
                std::mem::take(&mut state.subscriptions),
                state.callback.take(),
            )
        };

        match &outcome {
            Ok(()) => log::debug!("Sequence completed"),
            Err(e) => log::debug!("Sequence failed: {e}"),
        }

        let host = self.host.upgrade();
        if let Some(host) = &host {
            for id in subscriptions {
                host.unsubscribe(id);
            }
        }

        match callback {
            Some(callback) => callback(outcome.clone()),
            None => {
                if let (Err(e), Some(host)) = (&outcome, &host) {
                    host.log_error(e);
                }
            }
        }

        self.handle.resolve(outcome);
    }
}

thread_local! {
    static DEFAULT_HOST: RefCell<Option<Rc<dyn Host>>> = const { RefCell::new(None) };
}

/// Register the host used by [`run`] and [`run_with`] on this thread.
/// Returns the previously registered host, if any.
pub fn set_default_host(host: Rc<dyn Host>) -> Option<Rc<dyn Host>> {
    DEFAULT_HOST.with(|slot| slot.borrow_mut().replace(host))
}

/// Remove the default host for this thread.
pub fn clear_default_host() -> Option<Rc<dyn Host>> {
    DEFAULT_HOST.with(|slot| slot.borrow_mut().take())
}

/// A [`Sequencer`] bound to the default host, if one is registered.
pub fn default_sequencer() -> Option<Sequencer> {
    DEFAULT_HOST.with(|slot| slot.borrow().clone().map(Sequencer::new))
}

/// Run `entries` on the default host.
pub fn run<I, E>(entries: I) -> Result<RunHandle, PlanError>
where
    I: IntoIterator<Item = E>,
    E: Into<Entry>,
{
    default_sequencer()
        .ok_or(PlanError::NoDefaultHost)?
        .run(entries)
}

/// Run `entries` on the default host and call `callback` with the outcome.
pub fn run_with<I, E, F>(entries: I, callback: F) -> Result<RunHandle, PlanError>
where
    I: IntoIterator<Item = E>,
    E: Into<Entry>,
    F: FnOnce(RunResult) + 'static,
{
    default_sequencer()
        .ok_or(PlanError::NoDefaultHost)?
        .run_with(entries, callback)
}
