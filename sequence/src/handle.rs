use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::RunError;

/// Terminal outcome of a run.
pub type RunResult = Result<(), RunError>;

type Waiter = Box<dyn FnOnce(&RunResult)>;

#[derive(Default)]
struct Deferred {
    outcome: Option<RunResult>,
    waiters: Vec<Waiter>,
}

/// Deferred result of a run, completed on the same terminal event
/// that invokes the run's callback (and always after it).
#[derive(Clone, Default)]
pub struct RunHandle {
    inner: Rc<RefCell<Deferred>>,
}

impl RunHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self) -> bool {
        self.inner.borrow().outcome.is_some()
    }

    /// The outcome, if the run has finished.
    pub fn outcome(&self) -> Option<RunResult> {
        self.inner.borrow().outcome.clone()
    }

    /// Call `f` with the outcome once the run finishes,
    /// or right away if it already has.
    pub fn then<F>(&self, f: F)
    where
        F: FnOnce(&RunResult) + 'static,
    {
        let outcome = self.outcome();
        match outcome {
            Some(outcome) => f(&outcome),
            None => self.inner.borrow_mut().waiters.push(Box::new(f)),
        }
    }

    /// Complete the handle. Only the first call has any effect.
    pub(crate) fn resolve(&self, outcome: RunResult) {
        let waiters = {
            let mut deferred = self.inner.borrow_mut();
            if deferred.outcome.is_some() {
                return;
            }
            deferred.outcome = Some(outcome.clone());
            std::mem::take(&mut deferred.waiters)
        };
        for waiter in waiters {
            waiter(&outcome);
        }
    }
}

impl fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHandle")
            .field("outcome", &self.inner.borrow().outcome)
            .finish_non_exhaustive()
    }
}
