use std::borrow::Borrow;
use std::fmt;

/// Name of a unit of work registered with a [`Host`](crate::Host).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskName(String);

impl TaskName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for TaskName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for TaskName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for TaskName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TaskName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<&str> for TaskName {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for TaskName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// One element of a requested sequence, as handed to us by a caller.
///
/// Entries are unchecked: they may contain holes or groups nested inside
/// groups, both of which are rejected when the sequence is validated into a
/// [`Plan`](crate::Plan).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// A single task.
    Task(String),
    /// Tasks to run concurrently.
    Group(Vec<Entry>),
    /// A hole in the sequence (e.g. an optional task that wasn't configured).
    Missing,
}

impl Entry {
    /// Create a group from anything that converts to entries.
    pub fn group<I, E>(members: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Entry>,
    {
        Self::Group(members.into_iter().map(Into::into).collect())
    }

    /// true for holes and empty task names.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Missing => true,
            Self::Task(name) => name.is_empty(),
            Self::Group(_) => false,
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task(name) => write!(f, "'{name}'"),
            Self::Missing => f.write_str("<missing>"),
            Self::Group(members) => {
                f.write_str("[")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{member}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for Entry {
    fn from(name: &str) -> Self {
        Self::Task(name.to_owned())
    }
}

impl From<String> for Entry {
    fn from(name: String) -> Self {
        Self::Task(name)
    }
}

impl From<TaskName> for Entry {
    fn from(name: TaskName) -> Self {
        Self::Task(name.0)
    }
}

impl<T: Into<Entry>> From<Option<T>> for Entry {
    fn from(entry: Option<T>) -> Self {
        entry.map_or(Self::Missing, Into::into)
    }
}

impl<E: Into<Entry>> From<Vec<E>> for Entry {
    fn from(members: Vec<E>) -> Self {
        Self::group(members)
    }
}

impl<E: Into<Entry>, const N: usize> From<[E; N]> for Entry {
    fn from(members: [E; N]) -> Self {
        Self::group(members)
    }
}
