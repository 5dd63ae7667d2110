use util::{HashSet, Hasher};

use crate::{Entry, PlanError, TaskName};

/// Tasks started together in one step of a [`Plan`].
/// Never empty, and never contains the same task twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskGroup {
    tasks: Vec<TaskName>,
}

impl TaskGroup {
    pub fn tasks(&self) -> &[TaskName] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Always false; groups are checked for emptiness on creation.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// A validated sequence of [`TaskGroup`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    groups: Vec<TaskGroup>,
}

impl Plan {
    /// Check that `entries` form a well-shaped sequence
    /// and that `has_task` knows every task in it.
    ///
    /// A task may appear in several steps (it will be run again each time),
    /// but only once within a single group.
    pub fn validate<F>(entries: &[Entry], has_task: F) -> Result<Self, PlanError>
    where
        F: Fn(&str) -> bool,
    {
        if entries.is_empty() {
            return Err(PlanError::EmptyPlan);
        }

        let mut groups = Vec::with_capacity(entries.len());
        for entry in entries {
            let group = match entry {
                Entry::Task(name) => TaskGroup {
                    tasks: vec![known_task(name, &has_task)?],
                },
                Entry::Group(members) => validate_group(members, &has_task)?,
                Entry::Missing => return Err(PlanError::InvalidTask(entry.to_string())),
            };
            groups.push(group);
        }

        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[TaskGroup] {
        &self.groups
    }

    pub fn into_groups(self) -> Vec<TaskGroup> {
        self.groups
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

fn validate_group<F>(members: &[Entry], has_task: &F) -> Result<TaskGroup, PlanError>
where
    F: Fn(&str) -> bool,
{
    if members.is_empty() {
        return Err(PlanError::EmptyGroup);
    }

    let mut seen = HashSet::with_capacity_and_hasher(members.len(), Hasher::default());
    let mut tasks = Vec::with_capacity(members.len());
    for member in members {
        // groups can't be nested:
        let Entry::Task(name) = member else {
            return Err(PlanError::InvalidTask(member.to_string()));
        };
        let name = known_task(name, has_task)?;
        if !seen.insert(name.clone()) {
            return Err(PlanError::DuplicateTask(name));
        }
        tasks.push(name);
    }

    Ok(TaskGroup { tasks })
}

fn known_task<F>(name: &str, has_task: &F) -> Result<TaskName, PlanError>
where
    F: Fn(&str) -> bool,
{
    if has_task(name) {
        Ok(TaskName::from(name))
    } else {
        Err(PlanError::UnknownTask(TaskName::from(name)))
    }
}

/// Remove holes and empty names from `entries`, including inside groups.
/// A group that only contained holes is kept (empty) so validation can reject it.
pub fn drop_blanks(entries: Vec<Entry>) -> Vec<Entry> {
    entries
        .into_iter()
        .filter(|entry| !entry.is_blank())
        .map(|entry| match entry {
            Entry::Group(members) => {
                Entry::Group(members.into_iter().filter(|m| !m.is_blank()).collect())
            }
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn known(name: &str) -> bool {
        matches!(name, "a" | "b" | "c")
    }

    fn names(plan: &Plan) -> Vec<Vec<&str>> {
        plan.groups()
            .iter()
            .map(|g| g.tasks().iter().map(TaskName::as_str).collect())
            .collect()
    }

    #[test]
    fn test_valid() -> Result<(), PlanError> {
        let entries = vec![Entry::from("a"), Entry::from(["b", "c"]), Entry::from("a")];
        let plan = Plan::validate(&entries, known)?;
        assert_eq!(names(&plan), vec![vec!["a"], vec!["b", "c"], vec!["a"]]);
        Ok(())
    }

    #[test]
    fn test_empty_plan() {
        assert!(matches!(
            Plan::validate(&[], known),
            Err(PlanError::EmptyPlan)
        ));
    }

    #[test]
    fn test_invalid_entries() {
        assert!(matches!(
            Plan::validate(&[Entry::Missing], known),
            Err(PlanError::InvalidTask(_))
        ));
        assert!(matches!(
            Plan::validate(&[Entry::group([Entry::Missing])], known),
            Err(PlanError::InvalidTask(_))
        ));
        let nested = Entry::group([Entry::from("a"), Entry::from(["b"])]);
        match Plan::validate(&[nested], known) {
            Err(PlanError::InvalidTask(msg)) => assert_eq!(msg, "['b']"),
            other => panic!("expected invalid task, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_task() {
        match Plan::validate(&[Entry::from("a"), Entry::from("hello world")], known) {
            Err(PlanError::UnknownTask(name)) => assert_eq!(name, "hello world"),
            other => panic!("expected unknown task, got {other:?}"),
        }
        assert!(matches!(
            Plan::validate(&[Entry::from(["a", "zzz"])], known),
            Err(PlanError::UnknownTask(_))
        ));
    }

    #[test]
    fn test_empty_name_is_unknown() {
        match Plan::validate(&[Entry::from("")], known) {
            Err(PlanError::UnknownTask(name)) => assert_eq!(name, ""),
            other => panic!("expected unknown task, got {other:?}"),
        }
        assert!(matches!(
            Plan::validate(&[Entry::from(["a", ""])], known),
            Err(PlanError::UnknownTask(_))
        ));
    }

    #[test]
    fn test_empty_group() {
        assert!(matches!(
            Plan::validate(&[Entry::from("a"), Entry::Group(vec![])], known),
            Err(PlanError::EmptyGroup)
        ));
    }

    #[test]
    fn test_duplicate_in_group() {
        match Plan::validate(&[Entry::from(["a", "a"]), Entry::from("b")], known) {
            Err(PlanError::DuplicateTask(name)) => assert_eq!(name, "a"),
            other => panic!("expected duplicate task, got {other:?}"),
        }
    }

    #[test]
    fn test_drop_blanks() {
        let entries = vec![
            Entry::from("a"),
            Entry::Missing,
            Entry::group([Entry::from("b"), Entry::from(""), Entry::Missing]),
            Entry::group([Entry::Missing]),
        ];
        assert_eq!(
            drop_blanks(entries),
            vec![
                Entry::from("a"),
                Entry::from(["b"]),
                Entry::Group(vec![])
            ]
        );
    }
}
