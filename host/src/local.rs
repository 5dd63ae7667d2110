use std::cell::{Cell, RefCell};
use std::process::Child;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use sequence::{
    cause, Cause, Channel, Failure, Handler, Host, Listeners, Notification, RunHandle,
    SubscriptionId, TaskName,
};

use crate::{Action, Error, Job, Progress, Registry};

/// How long `run_until` sleeps when a poll finds nothing finished.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Waiting,
    Running,
    Done,
    Failed,
    Cancelled,
}

struct Node {
    name: TaskName,
    deps: Vec<TaskName>,
    action: Rc<dyn Action>,
    status: Status,
}

/// Everything started by one `start_tasks` call.
struct Batch {
    id: u64,
    /// the tasks that were asked for, as opposed to their dependencies.
    roots: Vec<TaskName>,
    /// dependencies first.
    nodes: Vec<Node>,
    failed: bool,
}

impl Batch {
    fn status(&self, name: &TaskName) -> Option<Status> {
        self.nodes
            .iter()
            .find(|node| node.name == *name)
            .map(|node| node.status)
    }

    fn is_ready(&self, node: &Node) -> bool {
        node.status == Status::Waiting
            && node
                .deps
                .iter()
                .all(|dep| self.status(dep) == Some(Status::Done))
    }

    fn is_settled(&self) -> bool {
        !self.nodes.iter().any(|node| match node.status {
            Status::Running => true,
            Status::Waiting => !self.failed,
            _ => false,
        })
    }
}

#[derive(Default)]
struct State {
    next_id: u64,
    batches: Vec<Batch>,
    children: Vec<(Job, Child)>,
}

/// Runs registered tasks inside this process.
///
/// Each `start_tasks` call becomes a batch: the requested tasks plus all of
/// their dependencies. Tasks whose dependencies have finished are launched right
/// away, so independent tasks run concurrently. A failure stops its batch;
/// requested tasks that will no longer run are reported as failed too, so that
/// whoever is waiting on them hears about it.
///
/// Child processes are only checked when [`poll`](Self::poll) or
/// [`run_until`](Self::run_until) is called.
#[derive(Default)]
pub struct LocalHost {
    registry: RefCell<Registry>,
    listeners: Listeners,
    state: RefCell<State>,
    /// set while launching, so that nested calls only queue work.
    pumping: Cell<bool>,
}

impl LocalHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<A>(&self, name: &str, deps: &[&str], action: A) -> Result<(), Error>
    where
        A: Action + 'static,
    {
        log::trace!("Registering task '{name}' with deps {deps:?}");
        self.registry
            .borrow_mut()
            .register(name, deps, Rc::new(action))
    }

    /// Make sure every dependency is registered and there are no cycles.
    pub fn check(&self) -> Result<(), Error> {
        self.registry.borrow().check()
    }

    /// Names of all registered tasks, in registration order.
    pub fn task_names(&self) -> Vec<TaskName> {
        self.registry
            .borrow()
            .iter()
            .map(|def| def.name.clone())
            .collect()
    }

    /// Report the result of a job whose action returned [`Progress::Pending`].
    pub fn complete(&self, job: &Job, result: anyhow::Result<()>) {
        self.finish_job(job, result.map_err(cause));
        self.pump();
    }

    /// Reap finished child processes. Returns how many finished.
    pub fn poll(&self) -> usize {
        let children = std::mem::take(&mut self.state.borrow_mut().children);

        let mut finished = Vec::new();
        let mut running = Vec::with_capacity(children.len());
        for (job, mut child) in children {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => finished.push((job, Ok(()))),
                Ok(Some(status)) => finished.push((job, Err(cause(Error::ExitStatus(status))))),
                Ok(None) => running.push((job, child)),
                Err(e) => finished.push((job, Err(cause(e)))),
            }
        }
        self.state.borrow_mut().children.extend(running);

        let count = finished.len();
        for (job, result) in finished {
            self.finish_job(&job, result);
        }
        if count > 0 {
            self.pump();
        }
        count
    }

    /// true while any child process is running.
    pub fn is_busy(&self) -> bool {
        !self.state.borrow().children.is_empty()
    }

    /// Poll until `handle` resolves.
    ///
    /// Jobs left [`Pending`](Progress::Pending) are not waited on: if only
    /// those remain, this fails with [`Error::Stalled`].
    pub fn run_until(&self, handle: &RunHandle) -> Result<(), Error> {
        loop {
            if handle.is_done() {
                return Ok(());
            }
            let finished = self.poll();
            if handle.is_done() {
                return Ok(());
            }
            if !self.is_busy() {
                return Err(Error::Stalled);
            }
            if finished == 0 {
                thread::sleep(POLL_INTERVAL);
            }
        }
    }

    /// Kill all child processes, forget all batches, and report every
    /// requested task that hadn't stopped as aborted.
    pub fn halt(&self) {
        let (children, batches) = {
            let mut state = self.state.borrow_mut();
            (
                std::mem::take(&mut state.children),
                std::mem::take(&mut state.batches),
            )
        };

        for (job, mut child) in children {
            log::debug!("Killing child process for task '{}'", job.task);
            if let Err(e) = child.kill().and_then(|_| child.wait().map(|_| ())) {
                log::warn!("Failed to kill child process for task '{}': {e}", job.task);
            }
        }

        for batch in batches {
            for root in &batch.roots {
                if matches!(batch.status(root), Some(Status::Waiting | Status::Running)) {
                    self.listeners.emit(&Notification::TaskError {
                        task: root.clone(),
                        failure: Failure::Aborted,
                    });
                }
            }
        }
    }

    fn enqueue(&self, names: &[TaskName]) -> Result<(), Error> {
        let nodes: Vec<Node> = self
            .registry
            .borrow()
            .resolve(names)?
            .into_iter()
            .map(|def| Node {
                name: def.name.clone(),
                deps: def.deps.clone(),
                action: Rc::clone(&def.action),
                status: Status::Waiting,
            })
            .collect();

        let mut roots: Vec<TaskName> = Vec::with_capacity(names.len());
        for name in names {
            if !roots.contains(name) {
                roots.push(name.clone());
            }
        }

        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        log::debug!("Batch {id}: {} tasks for {roots:?}", nodes.len());
        state.batches.push(Batch {
            id,
            roots,
            nodes,
            failed: false,
        });
        Ok(())
    }

    /// Launch every ready task, including ones made ready by tasks
    /// that finish while we're launching.
    fn pump(&self) {
        if self.pumping.replace(true) {
            return;
        }
        while let Some((job, action)) = self.next_ready() {
            self.launch(job, action);
        }
        self.pumping.set(false);
    }

    fn next_ready(&self) -> Option<(Job, Rc<dyn Action>)> {
        let mut state = self.state.borrow_mut();
        let State {
            next_id, batches, ..
        } = &mut *state;

        for batch in batches.iter_mut().filter(|batch| !batch.failed) {
            let Some(i) = batch.nodes.iter().position(|node| batch.is_ready(node)) else {
                continue;
            };
            let node = &mut batch.nodes[i];
            node.status = Status::Running;
            let job = Job {
                id: *next_id,
                batch: batch.id,
                task: node.name.clone(),
            };
            *next_id += 1;
            return Some((job, Rc::clone(&node.action)));
        }
        None
    }

    fn launch(&self, job: Job, action: Rc<dyn Action>) {
        log::debug!("Starting task '{}'", job.task);
        self.listeners.emit(&Notification::TaskStart {
            task: job.task.clone(),
        });
        match action.start(&job) {
            Progress::Done(result) => self.finish_job(&job, result.map_err(cause)),
            Progress::Pending => {}
            Progress::Spawned(child) => self.state.borrow_mut().children.push((job, child)),
        }
    }

    fn finish_job(&self, job: &Job, result: Result<(), Cause>) {
        let mut notifications = Vec::new();
        {
            let mut state = self.state.borrow_mut();
            let Some(pos) = state.batches.iter().position(|b| b.id == job.batch) else {
                log::debug!("Ignoring result of task '{}' from a halted batch", job.task);
                return;
            };
            let batch = &mut state.batches[pos];
            let Some(node) = batch
                .nodes
                .iter_mut()
                .find(|node| node.name == job.task && node.status == Status::Running)
            else {
                log::warn!("Task '{}' finished more than once", job.task);
                return;
            };

            match result {
                Ok(()) => {
                    node.status = Status::Done;
                    log::debug!("Task '{}' finished", job.task);
                    notifications.push(Notification::TaskStop {
                        task: job.task.clone(),
                    });
                }
                Err(e) => {
                    node.status = Status::Failed;
                    log::debug!("Task '{}' failed: {e}", job.task);
                    batch.failed = true;
                    notifications.push(Notification::TaskError {
                        task: job.task.clone(),
                        failure: Failure::Error(e),
                    });
                    cancel_waiting(batch, &job.task, &mut notifications);
                }
            }

            if batch.is_settled() {
                log::trace!("Batch {} settled", batch.id);
                state.batches.remove(pos);
            }
        }

        for notification in &notifications {
            self.listeners.emit(notification);
        }
    }
}

/// Mark the requested tasks that can no longer run as cancelled.
fn cancel_waiting(batch: &mut Batch, failed: &TaskName, notifications: &mut Vec<Notification>) {
    let Batch { roots, nodes, .. } = batch;
    for node in nodes.iter_mut() {
        if node.status != Status::Waiting || !roots.contains(&node.name) {
            continue;
        }
        node.status = Status::Cancelled;
        notifications.push(Notification::TaskError {
            task: node.name.clone(),
            failure: Failure::Error(cause(Error::Cancelled {
                failed: failed.clone(),
            })),
        });
    }
}

impl Host for LocalHost {
    fn has_task(&self, name: &str) -> bool {
        self.registry.borrow().contains(name)
    }

    fn start_tasks(&self, names: &[TaskName]) {
        if let Err(e) = self.enqueue(names) {
            let e = cause(e);
            for name in names {
                self.listeners.emit(&Notification::TaskError {
                    task: name.clone(),
                    failure: Failure::Error(Cause::clone(&e)),
                });
            }
            return;
        }
        self.pump();
    }

    fn subscribe(&self, channel: Channel, handler: Handler) -> SubscriptionId {
        self.listeners.subscribe(channel, handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.unsubscribe(id);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use anyhow::anyhow;
    use sequence::{Entry, Options, RunError, Sequencer};

    /// Host plus a log of everything it announced.
    fn host() -> (Rc<LocalHost>, Rc<RefCell<Vec<String>>>) {
        let host = Rc::new(LocalHost::new());
        let events = Rc::new(RefCell::new(Vec::new()));
        for channel in [Channel::TaskStart, Channel::TaskStop, Channel::TaskError] {
            let events = Rc::clone(&events);
            host.subscribe(
                channel,
                Rc::new(move |n: &Notification| {
                    let kind = match n {
                        Notification::TaskStart { .. } => "start",
                        Notification::TaskStop { .. } => "stop",
                        Notification::TaskError { .. } => "error",
                    };
                    events.borrow_mut().push(format!("{kind} {}", n.task()));
                }),
            );
        }
        (host, events)
    }

    fn ok(_: &Job) -> Progress {
        Progress::Done(Ok(()))
    }

    fn broken(job: &Job) -> Progress {
        Progress::Done(Err(anyhow!("{} broke", job.task())))
    }

    fn sequencer(host: &Rc<LocalHost>) -> Sequencer {
        let host: Rc<dyn Host> = host.clone();
        Sequencer::new(host).with_options(Options::default())
    }

    /// Action that parks its jobs until the test completes them.
    fn parked() -> (Rc<RefCell<Vec<Job>>>, impl Fn(&Job) -> Progress) {
        let jobs = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&jobs);
        (jobs, move |job: &Job| {
            sink.borrow_mut().push(job.clone());
            Progress::Pending
        })
    }

    #[test]
    fn test_sync_sequence() -> anyhow::Result<()> {
        let (host, events) = host();
        host.register("task1", &[], ok)?;
        host.register("task2", &[], ok)?;
        assert_eq!(host.task_names(), vec![TaskName::from("task1"), TaskName::from("task2")]);

        let handle = sequencer(&host).run(["task1", "task2"])?;
        assert!(matches!(handle.outcome(), Some(Ok(()))));
        assert_eq!(
            *events.borrow(),
            vec!["start task1", "stop task1", "start task2", "stop task2"]
        );
        Ok(())
    }

    #[test]
    fn test_pending_tasks() -> anyhow::Result<()> {
        let (host, events) = host();
        let (jobs, action) = parked();
        host.register("task1", &[], action)?;
        host.register("task2", &[], ok)?;
        host.register("task3", &[], ok)?;

        let handle = sequencer(&host).run([Entry::from(["task1", "task2"]), Entry::from("task3")])?;
        assert_eq!(
            *events.borrow(),
            vec!["start task1", "start task2", "stop task2"]
        );
        assert!(!handle.is_done());

        let job = jobs.borrow_mut().remove(0);
        host.complete(&job, Ok(()));
        assert!(matches!(handle.outcome(), Some(Ok(()))));
        assert_eq!(events.borrow().len(), 6);
        Ok(())
    }

    #[test]
    fn test_dependencies_run_first() -> anyhow::Result<()> {
        let (host, events) = host();
        host.register("task3", &[], ok)?;
        host.register("task4", &["task3"], ok)?;
        host.check()?;

        let handle = sequencer(&host).run(["task4"])?;
        assert!(handle.is_done());
        assert_eq!(
            *events.borrow(),
            vec!["start task3", "stop task3", "start task4", "stop task4"]
        );
        Ok(())
    }

    #[test]
    fn test_dependency_waits_for_pending() -> anyhow::Result<()> {
        let (host, events) = host();
        let (jobs, action) = parked();
        host.register("dep", &[], action)?;
        host.register("main", &["dep"], ok)?;

        let handle = sequencer(&host).run(["main"])?;
        assert_eq!(*events.borrow(), vec!["start dep"]);

        let job = jobs.borrow_mut().remove(0);
        host.complete(&job, Ok(()));
        assert!(handle.is_done());
        assert_eq!(events.borrow().last().map(String::as_str), Some("stop main"));
        Ok(())
    }

    #[test]
    fn test_error_stops_sequence() -> anyhow::Result<()> {
        let (host, events) = host();
        host.register("task1", &[], ok)?;
        host.register("errTask", &[], broken)?;
        host.register("task3", &[], ok)?;

        let handle = sequencer(&host).run(["task1", "errTask", "task3"])?;
        match handle.outcome() {
            Some(Err(RunError::TaskFailed { task, cause })) => {
                assert_eq!(task, "errTask");
                assert_eq!(cause.map(|c| c.to_string()).as_deref(), Some("errTask broke"));
            }
            other => panic!("expected task failure, got {other:?}"),
        }
        assert!(!events.borrow().iter().any(|e| e.ends_with("task3")));
        Ok(())
    }

    #[test]
    fn test_failed_dependency_cancels_task() -> anyhow::Result<()> {
        let (host, events) = host();
        host.register("dep", &[], broken)?;
        host.register("main", &["dep"], ok)?;

        let handle = sequencer(&host).run(["main"])?;
        match handle.outcome() {
            Some(Err(RunError::TaskFailed { task, cause })) => {
                assert_eq!(task, "main");
                let msg = cause.map(|c| c.to_string());
                assert_eq!(msg.as_deref(), Some("Not run because task 'dep' failed"));
            }
            other => panic!("expected task failure, got {other:?}"),
        }
        assert_eq!(*events.borrow(), vec!["start dep", "error dep", "error main"]);
        Ok(())
    }

    #[test]
    fn test_sibling_keeps_running_after_failure() -> anyhow::Result<()> {
        let (host, events) = host();
        let (jobs, action) = parked();
        host.register("slow", &[], action)?;
        host.register("bad", &[], broken)?;

        let handle = sequencer(&host).run([["slow", "bad"]])?;
        assert!(matches!(handle.outcome(), Some(Err(_))));

        let job = jobs.borrow_mut().remove(0);
        host.complete(&job, Ok(()));
        assert_eq!(
            *events.borrow(),
            vec!["start slow", "start bad", "error bad", "stop slow"]
        );
        assert!(host.state.borrow().batches.is_empty());
        Ok(())
    }

    #[test]
    fn test_same_task_runs_in_each_step() -> anyhow::Result<()> {
        let (host, events) = host();
        host.register("a", &[], ok)?;
        host.register("b", &["a"], ok)?;

        sequencer(&host).run(["a", "b"])?;
        let starts = events.borrow().iter().filter(|e| *e == "start a").count();
        assert_eq!(starts, 2);
        Ok(())
    }

    #[test]
    fn test_halt_aborts_pending() -> anyhow::Result<()> {
        let (host, events) = host();
        let (jobs, action) = parked();
        host.register("task1", &[], action)?;
        host.register("task2", &[], ok)?;

        let handle = sequencer(&host).run(["task1", "task2"])?;
        host.halt();
        match handle.outcome() {
            Some(Err(RunError::Aborted { task })) => assert_eq!(task, "task1"),
            other => panic!("expected abort, got {other:?}"),
        }

        // a late completion from the halted batch goes nowhere:
        let job = jobs.borrow_mut().remove(0);
        host.complete(&job, Ok(()));
        assert_eq!(*events.borrow(), vec!["start task1", "error task1"]);
        Ok(())
    }

    #[test]
    fn test_nested_sequence() -> anyhow::Result<()> {
        let (host, events) = host();
        host.register("task1", &[], ok)?;
        host.register("task2", &[], ok)?;

        let seq = sequencer(&host);
        let inner = Rc::new(RefCell::new(None));
        let (seq2, slot) = (seq.clone(), Rc::clone(&inner));
        seq.run_with(["task1"], move |outcome| {
            assert!(outcome.is_ok());
            *slot.borrow_mut() = Some(seq2.run(["task2"]));
        })?;

        // the inner run is queued while the host is still launching, then picked up:
        let inner = inner.borrow_mut().take();
        assert!(matches!(inner, Some(Ok(ref handle)) if handle.is_done()));
        assert_eq!(events.borrow().len(), 4);
        Ok(())
    }

    #[test]
    fn test_shell_tasks() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (host, _) = host();
        host.register("write", &[], crate::Shell::new("echo hi > out.txt", dir.path()))?;
        host.register("fail", &["write"], crate::Shell::new("exit 3", dir.path()))?;

        let handle = sequencer(&host).run(["write"])?;
        assert!(!handle.is_done());
        host.run_until(&handle)?;
        assert!(matches!(handle.outcome(), Some(Ok(()))));
        assert_eq!(std::fs::read_to_string(dir.path().join("out.txt"))?, "hi\n");

        let handle = sequencer(&host).run_with(["fail"], |_| {})?;
        host.run_until(&handle)?;
        match handle.outcome() {
            Some(Err(RunError::TaskFailed { task, cause })) => {
                assert_eq!(task, "fail");
                let msg = cause.map(|c| c.to_string()).unwrap_or_default();
                assert!(msg.contains("exit status: 3"), "{msg}");
            }
            other => panic!("expected task failure, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_stalled() -> anyhow::Result<()> {
        let (host, _) = host();
        let (_jobs, action) = parked();
        host.register("forever", &[], action)?;

        let handle = sequencer(&host).run(["forever"])?;
        assert!(matches!(host.run_until(&handle), Err(Error::Stalled)));
        Ok(())
    }
}
