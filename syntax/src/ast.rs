/// A task definition:
///
/// ```text
/// task build < clean codegen {
///   cargo build
/// }
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct TaskBlock<'a> {
    /// Task name
    pub name: &'a str,
    /// Tasks that must complete before this one starts (listed after `<`)
    pub deps: Vec<&'a str>,
    /// Shell code contained within braces, trimmed
    pub code: &'a str,
}

/// One step of a [`PlanBlock`].
#[derive(Debug, PartialEq, Eq)]
pub enum Element<'a> {
    /// A single task, e.g. `clean`.
    Task(&'a str),
    /// Tasks that run concurrently, e.g. `[build, lint]`.
    Group(Vec<&'a str>),
}

/// A named sequence of tasks:
///
/// ```text
/// plan release { clean [build, lint] test }
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct PlanBlock<'a> {
    /// Plan name
    pub name: &'a str,
    /// Steps, in order
    pub elements: Vec<Element<'a>>,
}

/// One high-level item in a task file.
#[derive(Debug, PartialEq, Eq)]
pub enum Item<'a> {
    /// A task definition.
    Task(TaskBlock<'a>),
    /// A [`PlanBlock`].
    Plan(PlanBlock<'a>),
}
