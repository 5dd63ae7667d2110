use std::rc::Rc;

use util::HashMap;

use sequence::TaskName;

use crate::{Action, Error};

/// A registered task.
pub struct TaskDef {
    pub name: TaskName,
    /// pre-tasks that must finish before this one starts.
    pub deps: Vec<TaskName>,
    pub action: Rc<dyn Action>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Named tasks, kept in registration order.
#[derive(Default)]
pub struct Registry {
    tasks: Vec<TaskDef>,
    index: HashMap<TaskName, usize>,
}

impl Registry {
    pub fn register(
        &mut self,
        name: &str,
        deps: &[&str],
        action: Rc<dyn Action>,
    ) -> Result<(), Error> {
        if self.contains(name) {
            return Err(Error::DuplicateTask(name.to_owned()));
        }
        let name = TaskName::new(name);
        self.index.insert(name.clone(), self.tasks.len());
        self.tasks.push(TaskDef {
            name,
            deps: deps.iter().map(|dep| TaskName::from(*dep)).collect(),
            action,
        });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&TaskDef> {
        self.index.get(name).map(|&i| &self.tasks[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskDef> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Make sure every dependency is registered and there are no cycles.
    pub fn check(&self) -> Result<(), Error> {
        for def in &self.tasks {
            if let Some(dep) = def.deps.iter().find(|dep| !self.contains(dep.as_str())) {
                return Err(Error::UnknownDependency {
                    task: def.name.to_string(),
                    dep: dep.to_string(),
                });
            }
        }
        let names: Vec<TaskName> = self.tasks.iter().map(|def| def.name.clone()).collect();
        self.resolve(&names).map(|_| ())
    }

    /// Everything needed to run `roots`, dependencies first,
    /// with each task appearing once.
    pub fn resolve(&self, roots: &[TaskName]) -> Result<Vec<&TaskDef>, Error> {
        let mut marks = HashMap::default();
        let mut order = Vec::with_capacity(roots.len());
        for root in roots {
            self.visit(root.as_str(), &mut marks, &mut order)?;
        }
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        name: &str,
        marks: &mut HashMap<&'a str, Mark>,
        order: &mut Vec<&'a TaskDef>,
    ) -> Result<(), Error> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => return Err(Error::Cycle(TaskName::from(name))),
            None => {}
        }

        let def = self
            .get(name)
            .ok_or_else(|| Error::UnknownTask(name.to_owned()))?;
        marks.insert(def.name.as_str(), Mark::Visiting);
        for dep in &def.deps {
            self.visit(dep.as_str(), marks, order)?;
        }
        marks.insert(def.name.as_str(), Mark::Done);
        order.push(def);
        Ok(())
    }
}
