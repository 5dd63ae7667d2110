use std::sync::{PoisonError, RwLock};

/// Settings read at the start of every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Drop holes and empty names from a sequence instead of rejecting it.
    pub ignore_undefined_tasks: bool,
    /// Keep the host's error as the cause of a [`RunError`](crate::RunError).
    /// When false, only the name of the failing task is reported.
    pub show_detailed_errors: bool,
}

impl Options {
    pub const DEFAULT: Self = Self {
        ignore_undefined_tasks: false,
        show_detailed_errors: true,
    };
}

impl Default for Options {
    fn default() -> Self {
        Self::DEFAULT
    }
}

static OPTIONS: RwLock<Options> = RwLock::new(Options::DEFAULT);

/// Current process-wide options.
pub fn options() -> Options {
    *OPTIONS.read().unwrap_or_else(PoisonError::into_inner)
}

/// Replace the process-wide options.
pub fn set_options(options: Options) {
    *OPTIONS.write().unwrap_or_else(PoisonError::into_inner) = options;
}

/// Modify the process-wide options in place.
pub fn update_options(f: impl FnOnce(&mut Options)) {
    let mut guard = OPTIONS.write().unwrap_or_else(PoisonError::into_inner);
    f(&mut *guard);
}
