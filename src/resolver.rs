//! Incremental ordering of objects that produce and consume variables.
use crate::error::ConfigurationError;
use crate::variables::VariableId;

#[derive(Debug, Clone)]
struct Entry<K> {
    key: K,
    name: String,
    output: VariableId,
    inputs: Vec<VariableId>,
}

/// Keeps a list of objects ordered so that every producer of a variable runs before every
/// consumer of it.
///
/// Insertion places a new object right after the last object producing one of its inputs,
/// or first if there is none. Objects that currently run earlier but depend, directly or
/// through other such objects, on the new object's output are moved right after it with
/// their relative order preserved. Insertions that would close a cycle are rejected and
/// leave the order untouched.
#[derive(Debug, Clone)]
pub struct DependencyResolver<K> {
    entries: Vec<Entry<K>>,
}

impl<K> Default for DependencyResolver<K> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<K: Clone> DependencyResolver<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, key: K, name: &str, output: VariableId, inputs: &[VariableId]) -> Result<(), ConfigurationError> {
        let inputs: Vec<VariableId> = inputs.iter().copied().filter(|&v| v != output).collect();

        let last_producer = self
            .entries
            .iter()
            .rposition(|entry| inputs.contains(&entry.output));
        let insert_at = last_producer.map(|i| i + 1).unwrap_or(0);

        // Everything before the insertion point that consumes the new output, transitively
        let mut produced = vec![output];
        let mut relocated = vec![false; insert_at];
        for (j, entry) in self.entries[..insert_at].iter().enumerate() {
            if entry.inputs.iter().any(|v| produced.contains(v)) {
                relocated[j] = true;
                produced.push(entry.output);
            }
        }

        let cyclic_producer = self.entries[..insert_at]
            .iter()
            .zip(&relocated)
            .find(|(entry, &moved)| moved && inputs.contains(&entry.output));
        if let Some((producer, _)) = cyclic_producer {
            return Err(ConfigurationError::CyclicDependency {
                object: name.to_string(),
                cycle: vec![name.to_string(), producer.name.clone(), name.to_string()],
            });
        }

        let new_entry = Entry {
            key,
            name: name.to_string(),
            output,
            inputs,
        };
        let tail = self.entries.split_off(insert_at);
        let (moved, kept): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .zip(relocated)
            .partition(|(_, moved)| *moved);
        self.entries.extend(kept.into_iter().map(|(entry, _)| entry));
        self.entries.push(new_entry);
        self.entries.extend(moved.into_iter().map(|(entry, _)| entry));
        self.entries.extend(tail);
        Ok(())
    }

    /// Keys in execution order.
    pub fn order(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|entry| &entry.key)
    }

    /// Dependency level of each entry, in execution order.
    ///
    /// Entries of level 0 consume nothing produced in the list. An entry of level `l > 0`
    /// consumes the output of at least one entry of level `l - 1`, and only outputs of
    /// lower levels.
    pub fn levels(&self) -> Vec<usize> {
        let mut levels: Vec<usize> = Vec::with_capacity(self.entries.len());
        for (i, entry) in self.entries.iter().enumerate() {
            let level = self.entries[..i]
                .iter()
                .zip(&levels)
                .filter(|(producer, _)| entry.inputs.contains(&producer.output))
                .map(|(_, &level)| level + 1)
                .max()
                .unwrap_or(0);
            levels.push(level);
        }
        levels
    }
}
