//! Owning storage for physics objects with active-subset lookup by subdomain or boundary.
use crate::error::ConfigurationError;
use crate::objects::{ContributionObject, SetupHook};
use crate::resolver::DependencyResolver;
use crate::SubdomainId;
use eyre::WrapErr;
use std::collections::BTreeMap;

/// Index of an object within the warehouse that owns it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectHandle(usize);

impl ObjectHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Owns all objects of one kind for one thread.
///
/// Unrestricted objects live in the global list and are implicitly active everywhere.
/// An object restricted to a set of keys (subdomain or boundary ids) appears only in the
/// per-key lists. Lists are kept in execution order, which is insertion order unless the
/// warehouse orders objects by their variable dependencies.
pub struct Warehouse<O: ?Sized> {
    objects: Vec<Box<O>>,
    restrictions: Vec<Vec<u32>>,
    resolver: Option<DependencyResolver<ObjectHandle>>,
    // rank[handle] is the position of the object in execution order
    rank: Vec<usize>,
    global: Vec<ObjectHandle>,
    keyed: BTreeMap<u32, Vec<ObjectHandle>>,
    active_global: Vec<ObjectHandle>,
    active_keyed: BTreeMap<u32, Vec<ObjectHandle>>,
}

impl<O: ?Sized> Default for Warehouse<O> {
    fn default() -> Self {
        Self {
            objects: Vec::new(),
            restrictions: Vec::new(),
            resolver: None,
            rank: Vec::new(),
            global: Vec::new(),
            keyed: BTreeMap::new(),
            active_global: Vec::new(),
            active_keyed: BTreeMap::new(),
        }
    }
}

impl<O> Warehouse<O>
where
    O: ?Sized + ContributionObject + SetupHook,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// A warehouse whose execution order follows variable dependencies between its
    /// objects. Every object must then declare the variable it computes.
    pub fn with_dependency_ordering() -> Self {
        Self {
            resolver: Some(DependencyResolver::new()),
            ..Self::default()
        }
    }

    /// Takes ownership of `object`. It is active immediately.
    pub fn add_object(&mut self, restriction: &[u32], object: Box<O>) -> Result<ObjectHandle, ConfigurationError> {
        let handle = ObjectHandle(self.objects.len());
        let info = object.info();

        match &mut self.resolver {
            Some(resolver) => {
                let output = info.variable.ok_or_else(|| ConfigurationError::MissingParameter {
                    object: info.name.clone(),
                    parameter: "variable".to_string(),
                })?;
                resolver.insert(handle, &info.name, output, &info.coupled)?;
                self.rank = vec![0; self.objects.len() + 1];
                for (position, h) in resolver.order().enumerate() {
                    self.rank[h.0] = position;
                }
            }
            None => self.rank.push(handle.0),
        }

        let mut restriction = restriction.to_vec();
        restriction.sort_unstable();
        restriction.dedup();

        self.objects.push(object);
        if restriction.is_empty() {
            self.global.push(handle);
            self.active_global.push(handle);
        } else {
            for &key in &restriction {
                self.keyed.entry(key).or_default().push(handle);
                self.active_keyed.entry(key).or_default().push(handle);
            }
        }
        self.restrictions.push(restriction);
        self.sort_lists();
        Ok(handle)
    }

    fn sort_lists(&mut self) {
        let rank = &self.rank;
        let lists = std::iter::once(&mut self.global)
            .chain(std::iter::once(&mut self.active_global))
            .chain(self.keyed.values_mut())
            .chain(self.active_keyed.values_mut());
        for list in lists {
            list.sort_by_key(|h| rank[h.0]);
        }
    }

    /// Rebuilds the active lists from the objects whose activation window contains `time`.
    pub fn update_active(&mut self, time: f64) {
        let objects = &self.objects;
        let is_active = |h: &&ObjectHandle| objects[h.0].info().is_active_at(time);
        self.active_global = self.global.iter().filter(is_active).copied().collect();
        self.active_keyed = self
            .keyed
            .iter()
            .map(|(&key, handles)| (key, handles.iter().filter(is_active).copied().collect()))
            .collect();
    }

    /// Active unrestricted objects.
    pub fn active_global(&self) -> &[ObjectHandle] {
        &self.active_global
    }

    /// Active objects restricted to `key`. Does not include the global ones.
    pub fn active_for_key(&self, key: u32) -> &[ObjectHandle] {
        self.active_keyed.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Collects every object active on `key`, global or restricted, in execution order.
    pub fn active_on(&self, key: u32, handles: &mut Vec<ObjectHandle>) {
        handles.clear();
        handles.extend_from_slice(&self.active_global);
        handles.extend_from_slice(self.active_for_key(key));
        handles.sort_by_key(|h| self.rank[h.0]);
    }

    /// Collects every object active on at least one of `keys`, global or restricted, in
    /// execution order and without duplicates.
    pub fn active_on_any(&self, keys: &[u32], handles: &mut Vec<ObjectHandle>) {
        handles.clear();
        handles.extend_from_slice(&self.active_global);
        for &key in keys {
            handles.extend_from_slice(self.active_for_key(key));
        }
        handles.sort_by_key(|h| self.rank[h.0]);
        handles.dedup();
    }

    pub fn has_active_objects(&self) -> bool {
        !self.active_global.is_empty() || self.active_keyed.values().any(|list| !list.is_empty())
    }

    pub fn has_active_on(&self, key: u32) -> bool {
        !self.active_global.is_empty() || !self.active_for_key(key).is_empty()
    }

    /// Keys named in any restriction, including those of inactive objects.
    pub fn restriction_keys(&self) -> impl Iterator<Item = u32> + '_ {
        self.keyed.keys().copied()
    }

    pub fn restriction(&self, handle: ObjectHandle) -> &[u32] {
        &self.restrictions[handle.0]
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Every owned object regardless of activity.
    pub fn all(&self) -> impl Iterator<Item = &O> {
        self.objects.iter().map(|object| object.as_ref())
    }

    /// Every handle in execution order regardless of activity.
    pub fn handles_in_order(&self) -> Vec<ObjectHandle> {
        let mut handles: Vec<_> = (0..self.objects.len()).map(ObjectHandle).collect();
        handles.sort_by_key(|h| self.rank[h.0]);
        handles
    }

    /// Dependency level of every object for dependency-ordered warehouses, or zero for all
    /// objects otherwise. Indexed by handle.
    pub fn dependency_levels(&self) -> Vec<usize> {
        let mut levels = vec![0; self.objects.len()];
        if let Some(resolver) = &self.resolver {
            for (h, level) in resolver.order().zip(resolver.levels()) {
                levels[h.0] = level;
            }
        }
        levels
    }

    pub fn get(&self, handle: ObjectHandle) -> &O {
        self.objects[handle.0].as_ref()
    }

    pub fn get_mut(&mut self, handle: ObjectHandle) -> &mut O {
        self.objects[handle.0].as_mut()
    }

    pub fn initial_setup(&mut self) -> eyre::Result<()> {
        for object in &mut self.objects {
            object
                .initial_setup()
                .wrap_err_with(|| format!("initial setup of `{}` failed", object.name()))?;
        }
        Ok(())
    }

    pub fn timestep_setup(&mut self) -> eyre::Result<()> {
        for h in self.active_handles() {
            let object = &mut self.objects[h.0];
            object
                .timestep_setup()
                .wrap_err_with(|| format!("time step setup of `{}` failed", object.name()))?;
        }
        Ok(())
    }

    pub fn residual_setup(&mut self) -> eyre::Result<()> {
        for h in self.active_handles() {
            let object = &mut self.objects[h.0];
            object
                .residual_setup()
                .wrap_err_with(|| format!("residual setup of `{}` failed", object.name()))?;
        }
        Ok(())
    }

    pub fn jacobian_setup(&mut self) -> eyre::Result<()> {
        for h in self.active_handles() {
            let object = &mut self.objects[h.0];
            object
                .jacobian_setup()
                .wrap_err_with(|| format!("Jacobian setup of `{}` failed", object.name()))?;
        }
        Ok(())
    }

    /// Runs the subdomain hook of the given objects.
    pub fn subdomain_setup(&mut self, handles: &[ObjectHandle], subdomain: SubdomainId) -> eyre::Result<()> {
        for h in handles {
            let object = &mut self.objects[h.0];
            object
                .subdomain_setup(subdomain)
                .wrap_err_with(|| format!("subdomain setup of `{}` failed", object.name()))?;
        }
        Ok(())
    }

    fn active_handles(&self) -> Vec<ObjectHandle> {
        let mut handles: Vec<_> = self
            .active_global
            .iter()
            .chain(self.active_keyed.values().flatten())
            .copied()
            .collect();
        handles.sort_by_key(|h| self.rank[h.0]);
        handles.dedup();
        handles
    }
}
