//! Execution of a tree of configuration blocks with named prerequisites.
//!
//! Blocks are visited depth-first in declaration order. A block whose prerequisites have all
//! run executes immediately; otherwise it is deferred. Every time a block executes, the
//! deferred blocks are swept repeatedly until a sweep makes no progress. Blocks still deferred
//! after the traversal can never run, which is reported as a configuration error.
use crate::error::{ConfigurationError, StuckBlock};
use eyre::{bail, WrapErr};
use log::debug;
use std::collections::BTreeSet;
use std::fmt;

pub type Task<C> = Box<dyn FnMut(&mut C) -> eyre::Result<()>>;

/// A named unit of configuration work.
pub struct Block<C> {
    name: String,
    prerequisites: Vec<String>,
    children: Vec<Block<C>>,
    active_children: Option<Vec<String>>,
    task: Option<Task<C>>,
}

impl<C> fmt::Debug for Block<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("name", &self.name)
            .field("prerequisites", &self.prerequisites)
            .field("children", &self.children)
            .field("active_children", &self.active_children)
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl<C> Block<C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prerequisites: Vec::new(),
            children: Vec::new(),
            active_children: None,
            task: None,
        }
    }

    pub fn with_prerequisites<S: Into<String>>(mut self, prerequisites: impl IntoIterator<Item = S>) -> Self {
        self.prerequisites
            .extend(prerequisites.into_iter().map(Into::into));
        self
    }

    pub fn with_child(mut self, child: Block<C>) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Block<C>>) -> Self {
        self.children.extend(children);
        self
    }

    /// Only the named children (and their subtrees) are visited, in the order given here.
    pub fn with_active_children<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.active_children = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_task<F>(mut self, task: F) -> Self
    where
        F: FnMut(&mut C) -> eyre::Result<()> + 'static,
    {
        self.task = Some(Box::new(task));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prerequisites(&self) -> &[String] {
        &self.prerequisites
    }

    pub fn children(&self) -> &[Block<C>] {
        &self.children
    }
}

/// Blocks in the order they ran, and the number of sweeps it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub executed: Vec<String>,
    /// The initial traversal plus every sweep over the deferred blocks that ran at least one
    /// block.
    pub sweeps: usize,
}

struct Entry<'a, C> {
    name: &'a str,
    prerequisites: &'a [String],
    task: Option<&'a mut Task<C>>,
}

fn flatten<'a, C>(block: &'a mut Block<C>, entries: &mut Vec<Entry<'a, C>>) {
    let Block {
        name,
        prerequisites,
        children,
        active_children,
        task,
    } = block;
    entries.push(Entry {
        name,
        prerequisites,
        task: task.as_mut(),
    });

    match active_children {
        None => {
            for child in children.iter_mut() {
                flatten(child, entries);
            }
        }
        Some(active) => {
            // Borrow each child at most once, in the order of the active list.
            let mut remaining: Vec<Option<&'a mut Block<C>>> = children.iter_mut().map(Some).collect();
            for name in active.iter() {
                let position = remaining
                    .iter()
                    .position(|child| child.as_ref().map_or(false, |c| &c.name == name));
                if let Some(child) = position.and_then(|p| remaining[p].take()) {
                    flatten(child, entries);
                }
            }
        }
    }
}

struct Execution<'a, 'b, C> {
    entries: Vec<Entry<'a, C>>,
    executed: BTreeSet<&'a str>,
    order: Vec<String>,
    deferred: Vec<usize>,
    sweeps: usize,
    ctx: &'b mut C,
}

impl<'a, 'b, C> Execution<'a, 'b, C> {
    fn missing(&self, index: usize) -> Vec<String> {
        self.entries[index]
            .prerequisites
            .iter()
            .filter(|p| !self.executed.contains(p.as_str()))
            .cloned()
            .collect()
    }

    fn is_ready(&self, index: usize) -> bool {
        self.entries[index]
            .prerequisites
            .iter()
            .all(|p| self.executed.contains(p.as_str()))
    }

    fn run(&mut self, index: usize) -> eyre::Result<()> {
        let entry = &mut self.entries[index];
        let name = entry.name;
        if let Some(task) = entry.task.as_deref_mut() {
            task(self.ctx).wrap_err_with(|| format!("block `{}` failed", name))?;
        }
        self.executed.insert(name);
        self.order.push(name.to_string());
        Ok(())
    }

    /// Sweeps the deferred blocks until a sweep makes no progress.
    fn drain_deferred(&mut self) -> eyre::Result<()> {
        loop {
            let mut progress = false;
            let mut still_deferred = Vec::new();
            for index in std::mem::take(&mut self.deferred) {
                if self.is_ready(index) {
                    self.run(index)?;
                    progress = true;
                } else {
                    still_deferred.push(index);
                }
            }
            self.deferred = still_deferred;
            if !progress {
                return Ok(());
            }
            self.sweeps += 1;
            debug!(
                "Scheduler sweep {}: {} blocks executed, {} deferred",
                self.sweeps,
                self.order.len(),
                self.deferred.len()
            );
        }
    }
}

pub struct Scheduler;

impl Scheduler {
    /// Executes `root` and all of its active descendants against `ctx`.
    ///
    /// Fails with [`ConfigurationError::DuplicateName`] if two blocks share a name and with
    /// [`ConfigurationError::UnsatisfiablePrerequisites`] if some blocks can never run. A
    /// failing task aborts execution immediately.
    pub fn execute<C>(root: &mut Block<C>, ctx: &mut C) -> eyre::Result<ExecutionReport> {
        let mut entries = Vec::new();
        flatten(root, &mut entries);

        let mut names = BTreeSet::new();
        for entry in &entries {
            if !names.insert(entry.name) {
                bail!(ConfigurationError::DuplicateName {
                    name: entry.name.to_string(),
                });
            }
        }

        let num_blocks = entries.len();
        let mut execution = Execution {
            entries,
            executed: BTreeSet::new(),
            order: Vec::with_capacity(num_blocks),
            deferred: Vec::new(),
            sweeps: 1,
            ctx,
        };
        for index in 0..num_blocks {
            if execution.is_ready(index) {
                execution.run(index)?;
                execution.drain_deferred()?;
            } else {
                execution.deferred.push(index);
            }
        }
        debug!(
            "Scheduler traversal finished: {} of {} blocks executed in {} sweeps",
            execution.order.len(),
            num_blocks,
            execution.sweeps
        );

        if !execution.deferred.is_empty() {
            let stuck = execution
                .deferred
                .iter()
                .map(|&index| StuckBlock {
                    name: execution.entries[index].name.to_string(),
                    missing: execution.missing(index),
                })
                .collect();
            bail!(ConfigurationError::UnsatisfiablePrerequisites { stuck });
        }

        Ok(ExecutionReport {
            executed: execution.order,
            sweeps: execution.sweeps,
        })
    }
}
