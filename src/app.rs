use std::rc::Rc;

use anyhow::{Context, Result};
use colored::Colorize;

use host::{LocalHost, Shell};
use sequence::{Entry, Host, Sequencer};
use syntax::ast::{self, Element, Item, PlanBlock, TaskBlock};
use util::Timer;

use crate::settings::{Settings, Target};
use crate::ui::Ui;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Nothing to run: give a sequence of tasks or a --plan")]
    NoTargetSpecified,
    #[error("Plan '{0}' is not defined in the task file")]
    UnknownPlan(String),
    #[error("Sequence stopped without finishing")]
    Unfinished,
}

/// This struct actually runs the command-line app.
pub struct App {
    /// Interpreted command line settings
    settings: Settings,
    /// User interface
    ui: Rc<Ui>,
}

impl App {
    /// Create a new `App`.
    pub fn new(settings: Settings) -> Self {
        let ui = Ui::new(settings.verbose);
        Self { settings, ui }
    }

    /// Run the app, using settings to determine which tasks to run.
    pub fn run(self) -> Result<()> {
        let text = std::fs::read_to_string(&self.settings.file)
            .with_context(|| format!("while reading task file {:?}", self.settings.file))?;
        let items = syntax::parse(&text)
            .with_context(|| format!("while parsing task file {:?}", self.settings.file))?;
        let (tasks, plans) = split_items(items);
        log::info!(
            "Loaded {} tasks and {} plans from {:?}",
            tasks.len(),
            plans.len(),
            self.settings.file
        );

        if self.settings.target == Target::List {
            self.list(&tasks, &plans);
            return Ok(());
        }

        let host = Rc::new(LocalHost::new());
        self.register_tasks(&host, &tasks)?;
        let entries = self.entries(&plans)?;
        self.run_sequence(host, entries)
    }

    fn register_tasks(&self, host: &LocalHost, tasks: &[TaskBlock]) -> Result<()> {
        self.ui.verbose_msg(&format!(
            "Registering {} tasks, running in {:?}",
            tasks.len(),
            self.settings.dir
        ));
        for task in tasks {
            host.register(task.name, &task.deps, Shell::new(task.code, &self.settings.dir))
                .with_context(|| format!("while registering task '{}'", task.name))?;
        }
        host.check().context("while checking task dependencies")?;
        Ok(())
    }

    fn entries(&self, plans: &[PlanBlock]) -> Result<Vec<Entry>> {
        match &self.settings.target {
            Target::Plan(name) => {
                let plan = plans
                    .iter()
                    .find(|plan| plan.name == name)
                    .ok_or_else(|| Error::UnknownPlan(name.clone()))?;
                Ok(plan.elements.iter().map(element_entry).collect())
            }
            Target::Sequence(entries) if !entries.is_empty() => Ok(entries.clone()),
            _ => Err(Error::NoTargetSpecified.into()),
        }
    }

    fn run_sequence(&self, host: Rc<LocalHost>, entries: Vec<Entry>) -> Result<()> {
        self.ui.follow(&*host);

        let dyn_host: Rc<dyn Host> = host.clone();
        let sequencer = Sequencer::new(dyn_host).with_options(self.settings.options);

        let timer = Timer::now();
        let verbose = self.settings.verbose > 0;
        let handle = sequencer
            .run_with(entries, move |outcome| {
                if verbose && outcome.is_ok() {
                    timer.print_elapsed("Sequence");
                }
            })
            .context("while starting task sequence")?;

        if let Err(e) = host.run_until(&handle) {
            host.halt();
            return Err(e).context("while running task sequence");
        }

        match handle.outcome().ok_or(Error::Unfinished)? {
            Ok(()) => {
                eprintln!("{}", "Sequence complete.".green());
                Ok(())
            }
            Err(e) => {
                host.halt();
                Err(e).context("while running task sequence")
            }
        }
    }

    fn list(&self, tasks: &[TaskBlock], plans: &[PlanBlock]) {
        self.ui.heading("Tasks:");
        for task in tasks {
            if task.deps.is_empty() {
                println!("  {}", task.name);
            } else {
                println!("  {} < {}", task.name, task.deps.join(" "));
            }
        }
        if !plans.is_empty() {
            self.ui.heading("Plans:");
            for plan in plans {
                let steps: Vec<String> = plan
                    .elements
                    .iter()
                    .map(|e| element_entry(e).to_string())
                    .collect();
                println!("  {}: {}", plan.name, steps.join(" "));
            }
        }
    }
}

fn split_items(items: Vec<Item>) -> (Vec<TaskBlock>, Vec<PlanBlock>) {
    let mut tasks = Vec::with_capacity(items.len());
    let mut plans = Vec::new();
    for item in items {
        match item {
            Item::Task(task) => tasks.push(task),
            Item::Plan(plan) => plans.push(plan),
        }
    }
    (tasks, plans)
}

fn element_entry(element: &ast::Element) -> Entry {
    match element {
        Element::Task(name) => Entry::from(*name),
        Element::Group(names) => Entry::group(names.iter().copied()),
    }
}
