//! Parallel element and node loops.
//!
//! Every worker owns a [`ThreadData`]: its own copy of every physics object and its own
//! scratch buffers. Work is split into contiguous ranges of elements (or nodes), one per
//! worker. Local contributions are scattered into the shared global storage under a lock.
use crate::assembly::global::{GlobalMatrix, GlobalVector};
use crate::assembly::{AssemblyContext, ElementData, LocalBuffers};
use crate::objects::{
    AuxKernel, ContributionObject, Damper, IntegratedBoundaryCondition, JacobianContributor, Kernel, Material,
    ResidualContributor, SetupHook,
};
use crate::variables::{SystemKind, VariableId};
use crate::warehouse::{ObjectHandle, Warehouse};
use crate::{Real, SubdomainId};
use eyre::WrapErr;
use nalgebra::DVector;
use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::ops::Range;

/// What a pass over the elements computes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Residual,
    Jacobian,
}

/// The physics objects owned by one worker.
pub struct ThreadWarehouses<T: Real> {
    pub kernels: Warehouse<dyn Kernel<T>>,
    pub stabilizers: Warehouse<dyn Kernel<T>>,
    pub integrated_bcs: Warehouse<dyn IntegratedBoundaryCondition<T>>,
    pub materials: Warehouse<dyn Material<T>>,
    pub nodal_aux: Warehouse<dyn AuxKernel<T>>,
    pub elemental_aux: Warehouse<dyn AuxKernel<T>>,
    pub dampers: Warehouse<dyn Damper<T>>,
}

impl<T: Real> Default for ThreadWarehouses<T> {
    fn default() -> Self {
        Self {
            kernels: Warehouse::new(),
            stabilizers: Warehouse::new(),
            integrated_bcs: Warehouse::new(),
            materials: Warehouse::new(),
            nodal_aux: Warehouse::with_dependency_ordering(),
            elemental_aux: Warehouse::with_dependency_ordering(),
            dampers: Warehouse::new(),
        }
    }
}

impl<T: Real> ThreadWarehouses<T> {
    pub fn update_active(&mut self, time: f64) {
        self.kernels.update_active(time);
        self.stabilizers.update_active(time);
        self.integrated_bcs.update_active(time);
        self.materials.update_active(time);
        self.nodal_aux.update_active(time);
        self.elemental_aux.update_active(time);
        self.dampers.update_active(time);
    }

    pub fn initial_setup(&mut self) -> eyre::Result<()> {
        self.materials.initial_setup()?;
        self.kernels.initial_setup()?;
        self.stabilizers.initial_setup()?;
        self.integrated_bcs.initial_setup()?;
        self.nodal_aux.initial_setup()?;
        self.elemental_aux.initial_setup()?;
        self.dampers.initial_setup()
    }

    pub fn timestep_setup(&mut self) -> eyre::Result<()> {
        self.materials.timestep_setup()?;
        self.kernels.timestep_setup()?;
        self.stabilizers.timestep_setup()?;
        self.integrated_bcs.timestep_setup()?;
        self.nodal_aux.timestep_setup()?;
        self.elemental_aux.timestep_setup()?;
        self.dampers.timestep_setup()
    }

    pub fn residual_setup(&mut self) -> eyre::Result<()> {
        self.materials.residual_setup()?;
        self.kernels.residual_setup()?;
        self.stabilizers.residual_setup()?;
        self.integrated_bcs.residual_setup()
    }

    pub fn jacobian_setup(&mut self) -> eyre::Result<()> {
        self.materials.jacobian_setup()?;
        self.kernels.jacobian_setup()?;
        self.stabilizers.jacobian_setup()?;
        self.integrated_bcs.jacobian_setup()
    }
}

struct Scratch<T: Real> {
    data: ElementData<T>,
    local: LocalBuffers<T>,
    kernels: Vec<ObjectHandle>,
    stabilizers: Vec<ObjectHandle>,
    materials: Vec<ObjectHandle>,
    boundary: Vec<ObjectHandle>,
    dampers: Vec<ObjectHandle>,
    aux: Vec<ObjectHandle>,
    jvars: Vec<VariableId>,
    increment: Vec<T>,
    values: Vec<T>,
    writes: Vec<(usize, T)>,
}

impl<T: Real> Default for Scratch<T> {
    fn default() -> Self {
        Self {
            data: ElementData::default(),
            local: LocalBuffers::default(),
            kernels: Vec::new(),
            stabilizers: Vec::new(),
            materials: Vec::new(),
            boundary: Vec::new(),
            dampers: Vec::new(),
            aux: Vec::new(),
            jvars: Vec::new(),
            increment: Vec::new(),
            values: Vec::new(),
            writes: Vec::new(),
        }
    }
}

/// Objects and scratch memory of one worker.
pub struct ThreadData<T: Real> {
    pub warehouses: ThreadWarehouses<T>,
    scratch: Scratch<T>,
}

impl<T: Real> Default for ThreadData<T> {
    fn default() -> Self {
        Self {
            warehouses: ThreadWarehouses::default(),
            scratch: Scratch::default(),
        }
    }
}

/// Splits `0 .. n` into `parts` contiguous ranges whose lengths differ by at most one.
pub fn partition_range(n: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.max(1);
    let base = n / parts;
    let remainder = n % parts;
    let mut start = 0;
    (0..parts)
        .map(|i| {
            let len = base + usize::from(i < remainder);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

fn run_partitions<T, F>(
    pool: &ThreadPool,
    threads: &mut [ThreadData<T>],
    ranges: &[Range<usize>],
    f: F,
) -> eyre::Result<()>
where
    T: Real,
    F: Fn(&mut ThreadData<T>, Range<usize>) -> eyre::Result<()> + Sync + Send,
{
    assert_eq!(threads.len(), ranges.len(), "Need one range per thread");
    pool.install(|| {
        threads
            .par_iter_mut()
            .zip(ranges.par_iter())
            .try_for_each(|(thread, range)| f(thread, range.clone()))
    })
}

/// Adds the element contributions of all active kernels, stabilizers and integrated
/// boundary conditions to `residual`.
pub fn assemble_residual<T, V>(
    pool: &ThreadPool,
    threads: &mut [ThreadData<T>],
    ranges: &[Range<usize>],
    ctx: &AssemblyContext<T>,
    residual: &mut V,
) -> eyre::Result<()>
where
    T: Real,
    V: ?Sized + GlobalVector<T>,
{
    let residual = Mutex::new(residual);
    let scatter = |local: &LocalBuffers<T>| residual.lock().add_local(local.dofs(), local.residual());
    run_partitions(pool, threads, ranges, |thread, range| {
        thread.assemble_partition(ctx, range, Evaluation::Residual, &scatter)
    })
}

/// Adds the element Jacobians of all active kernels, stabilizers and integrated boundary
/// conditions to `jacobian`.
pub fn assemble_jacobian<T, M>(
    pool: &ThreadPool,
    threads: &mut [ThreadData<T>],
    ranges: &[Range<usize>],
    ctx: &AssemblyContext<T>,
    jacobian: &mut M,
) -> eyre::Result<()>
where
    T: Real,
    M: ?Sized + GlobalMatrix<T>,
{
    let jacobian = Mutex::new(jacobian);
    let scatter = |local: &LocalBuffers<T>| jacobian.lock().add_local(local.dofs(), local.jacobian());
    run_partitions(pool, threads, ranges, |thread, range| {
        thread.assemble_partition(ctx, range, Evaluation::Jacobian, &scatter)
    })
}

/// Smallest damping factor over all active dampers and elements, or one if there are no
/// dampers.
pub fn compute_damping<T: Real>(
    pool: &ThreadPool,
    threads: &mut [ThreadData<T>],
    ranges: &[Range<usize>],
    ctx: &AssemblyContext<T>,
    increment: &DVector<T>,
) -> eyre::Result<T> {
    assert_eq!(threads.len(), ranges.len(), "Need one range per thread");
    let factors: Vec<T> = pool.install(|| {
        threads
            .par_iter_mut()
            .zip(ranges.par_iter())
            .map(|(thread, range)| thread.damping_partition(ctx, range.clone(), increment))
            .collect::<eyre::Result<_>>()
    })?;
    Ok(factors.into_iter().fold(T::one(), |a, b| a.min(b)))
}

/// Ranges and lookup tables driving an auxiliary pass.
pub struct AuxPartitions<'a> {
    pub elements: &'a [Range<usize>],
    pub nodes: &'a [Range<usize>],
    /// Subdomains touching each node.
    pub node_subdomains: &'a [Vec<SubdomainId>],
}

/// Evaluates the auxiliary kernels selected by `base.execute_on` and stores the results in
/// `aux`.
///
/// Kernels run level by level in dependency order, nodal kernels before elemental ones
/// within a level. Each level sees the values written by the previous levels. The current
/// auxiliary solution of `base` is ignored and replaced by `aux`.
pub fn execute_aux_kernels<T: Real>(
    pool: &ThreadPool,
    threads: &mut [ThreadData<T>],
    partitions: &AuxPartitions,
    base: &AssemblyContext<T>,
    aux: &mut DVector<T>,
) -> eyre::Result<()> {
    let Some(first) = threads.first() else {
        return Ok(());
    };
    let nodal_levels = first.warehouses.nodal_aux.dependency_levels();
    let elemental_levels = first.warehouses.elemental_aux.dependency_levels();
    let num_levels = nodal_levels
        .iter()
        .chain(&elemental_levels)
        .map(|level| level + 1)
        .max()
        .unwrap_or(0);

    for level in 0..num_levels {
        for nodal in [true, false] {
            let levels = if nodal { &nodal_levels } else { &elemental_levels };
            if !levels.contains(&level) {
                continue;
            }
            {
                let ctx = AssemblyContext {
                    aux: [&*aux, base.aux[1], base.aux[2]],
                    ..*base
                };
                if nodal {
                    run_partitions(pool, threads, partitions.nodes, |thread, range| {
                        thread.nodal_aux_partition(&ctx, range, partitions.node_subdomains, levels, level)
                    })?;
                } else {
                    run_partitions(pool, threads, partitions.elements, |thread, range| {
                        thread.elemental_aux_partition(&ctx, range, levels, level)
                    })?;
                }
            }
            for thread in threads.iter_mut() {
                for (dof, value) in thread.scratch.writes.drain(..) {
                    aux[dof] = value;
                }
            }
        }
    }
    Ok(())
}

fn compute_materials<T: Real>(
    materials: &mut Warehouse<dyn Material<T>>,
    handles: &[ObjectHandle],
    data: &mut ElementData<T>,
) -> eyre::Result<()> {
    let mut properties = std::mem::take(&mut data.materials);
    properties.clear();
    let mut result = Ok(());
    for &h in handles {
        let material = materials.get_mut(h);
        result = material
            .compute_properties(data, &mut properties)
            .wrap_err_with(|| format!("material `{}` failed on element {}", material.name(), data.element()));
        if result.is_err() {
            break;
        }
    }
    data.materials = properties;
    result
}

fn accumulate<T, O>(
    warehouse: &mut Warehouse<O>,
    handles: &[ObjectHandle],
    data: &ElementData<T>,
    local: &mut LocalBuffers<T>,
    jvars: &mut Vec<VariableId>,
    evaluation: Evaluation,
) -> eyre::Result<()>
where
    T: Real,
    O: ?Sized + ContributionObject + SetupHook + ResidualContributor<T> + JacobianContributor<T>,
{
    for &h in handles {
        let object = warehouse.get_mut(h);
        let var = match object.info().variable {
            Some(var) if var.system == SystemKind::Primary && data.is_defined(var) => var,
            _ => continue,
        };
        match evaluation {
            Evaluation::Residual => object
                .accumulate_residual(data, local.residual_block(var))
                .wrap_err_with(|| format!("residual of `{}` failed on element {}", object.name(), data.element()))?,
            Evaluation::Jacobian => {
                jvars.clear();
                jvars.push(var);
                for &coupled in &object.info().coupled {
                    if coupled.system == SystemKind::Primary && data.is_defined(coupled) && !jvars.contains(&coupled) {
                        jvars.push(coupled);
                    }
                }
                for &jvar in jvars.iter() {
                    object
                        .accumulate_jacobian(data, jvar, local.jacobian_block(var, jvar))
                        .wrap_err_with(|| {
                            format!("Jacobian of `{}` failed on element {}", object.name(), data.element())
                        })?;
                }
            }
        }
    }
    Ok(())
}

impl<T: Real> ThreadData<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn assemble_partition(
        &mut self,
        ctx: &AssemblyContext<T>,
        elements: Range<usize>,
        evaluation: Evaluation,
        scatter: &(dyn Fn(&LocalBuffers<T>) -> eyre::Result<()> + Sync),
    ) -> eyre::Result<()> {
        let mesh = ctx.space.mesh();
        let num_primary = ctx.variables.system(SystemKind::Primary).len();
        let Self { warehouses: w, scratch: s } = self;

        let mut current_subdomain = None;
        for element in elements {
            let subdomain = mesh.element_subdomain(element);
            if current_subdomain != Some(subdomain) {
                w.materials.active_on(subdomain, &mut s.materials);
                w.kernels.active_on(subdomain, &mut s.kernels);
                w.stabilizers.active_on(subdomain, &mut s.stabilizers);
                w.materials.subdomain_setup(&s.materials, subdomain)?;
                w.kernels.subdomain_setup(&s.kernels, subdomain)?;
                w.stabilizers.subdomain_setup(&s.stabilizers, subdomain)?;
                current_subdomain = Some(subdomain);
            }

            s.data.reinit_element(ctx, element)?;
            compute_materials(&mut w.materials, &s.materials, &mut s.data)?;
            s.local
                .prepare(&s.data, num_primary, evaluation == Evaluation::Jacobian);
            if s.local.is_empty() {
                continue;
            }
            accumulate(&mut w.kernels, &s.kernels, &s.data, &mut s.local, &mut s.jvars, evaluation)?;
            accumulate(&mut w.stabilizers, &s.stabilizers, &s.data, &mut s.local, &mut s.jvars, evaluation)?;

            for side in 0..mesh.connectivity()[element].num_sides() {
                if mesh.neighbor(element, side).is_some() {
                    continue;
                }
                let ids = mesh.side_boundary_ids(element, side);
                if ids.is_empty() {
                    continue;
                }
                w.integrated_bcs.active_on_any(ids, &mut s.boundary);
                if s.boundary.is_empty() {
                    continue;
                }
                s.data.reinit_side(ctx, element, side)?;
                compute_materials(&mut w.materials, &s.materials, &mut s.data)?;
                accumulate(&mut w.integrated_bcs, &s.boundary, &s.data, &mut s.local, &mut s.jvars, evaluation)?;
            }

            scatter(&s.local)?;
        }
        Ok(())
    }

    fn damping_partition(
        &mut self,
        ctx: &AssemblyContext<T>,
        elements: Range<usize>,
        increment: &DVector<T>,
    ) -> eyre::Result<T> {
        let mesh = ctx.space.mesh();
        let Self { warehouses: w, scratch: s } = self;

        let mut damping = T::one();
        let mut current_subdomain = None;
        for element in elements {
            let subdomain = mesh.element_subdomain(element);
            if current_subdomain != Some(subdomain) {
                w.dampers.active_on(subdomain, &mut s.dampers);
                w.dampers.subdomain_setup(&s.dampers, subdomain)?;
                current_subdomain = Some(subdomain);
            }
            if s.dampers.is_empty() {
                continue;
            }

            s.data.reinit_element(ctx, element)?;
            for &h in &s.dampers {
                let damper = w.dampers.get_mut(h);
                let var = match damper.info().variable {
                    Some(var) if s.data.is_defined(var) => var,
                    _ => continue,
                };
                s.increment.clear();
                s.increment
                    .extend(s.data.dof_indices(var).iter().map(|&dof| increment[dof]));
                s.data.interpolate(var, &s.increment, &mut s.values);
                let factor = damper
                    .compute_damping(&s.data, &s.values)
                    .wrap_err_with(|| format!("damper `{}` failed on element {}", damper.name(), element))?;
                damping = damping.min(factor);
            }
        }
        Ok(damping)
    }

    fn nodal_aux_partition(
        &mut self,
        ctx: &AssemblyContext<T>,
        nodes: Range<usize>,
        node_subdomains: &[Vec<SubdomainId>],
        levels: &[usize],
        level: usize,
    ) -> eyre::Result<()> {
        let Self { warehouses: w, scratch: s } = self;
        let aux = &mut w.nodal_aux;
        s.writes.clear();
        for node in nodes {
            aux.active_on_any(&node_subdomains[node], &mut s.aux);
            s.aux
                .retain(|&h| levels[h.index()] == level && aux.get(h).info().executes_on(ctx.execute_on));
            if s.aux.is_empty() {
                continue;
            }

            s.data.reinit_node(ctx, node)?;
            for &h in &s.aux {
                let kernel = aux.get_mut(h);
                let dof = match kernel
                    .info()
                    .variable
                    .and_then(|var| ctx.aux_dofs.node_dof(var, node))
                {
                    Some(dof) => dof,
                    None => continue,
                };
                let value = kernel
                    .compute_value(&s.data, 0)
                    .wrap_err_with(|| format!("auxiliary kernel `{}` failed on node {}", kernel.name(), node))?;
                s.writes.push((dof, value));
            }
        }
        Ok(())
    }

    fn elemental_aux_partition(
        &mut self,
        ctx: &AssemblyContext<T>,
        elements: Range<usize>,
        levels: &[usize],
        level: usize,
    ) -> eyre::Result<()> {
        let mesh = ctx.space.mesh();
        let Self { warehouses: w, scratch: s } = self;
        s.writes.clear();

        let mut current_subdomain = None;
        for element in elements {
            let subdomain = mesh.element_subdomain(element);
            if current_subdomain != Some(subdomain) {
                let aux = &w.elemental_aux;
                aux.active_on(subdomain, &mut s.aux);
                s.aux
                    .retain(|&h| levels[h.index()] == level && aux.get(h).info().executes_on(ctx.execute_on));
                w.materials.active_on(subdomain, &mut s.materials);
                if !s.aux.is_empty() {
                    w.materials.subdomain_setup(&s.materials, subdomain)?;
                    w.elemental_aux.subdomain_setup(&s.aux, subdomain)?;
                }
                current_subdomain = Some(subdomain);
            }
            if s.aux.is_empty() {
                continue;
            }

            s.data.reinit_element(ctx, element)?;
            compute_materials(&mut w.materials, &s.materials, &mut s.data)?;
            for &h in &s.aux {
                let kernel = w.elemental_aux.get_mut(h);
                let dof = match kernel
                    .info()
                    .variable
                    .and_then(|var| ctx.aux_dofs.element_dofs(var, element).first().copied())
                {
                    Some(dof) => dof,
                    None => continue,
                };
                let mut integral = T::zero();
                let mut volume = T::zero();
                for (qp, &jxw) in s.data.jxw().iter().enumerate() {
                    let value = kernel.compute_value(&s.data, qp).wrap_err_with(|| {
                        format!("auxiliary kernel `{}` failed on element {}", kernel.name(), element)
                    })?;
                    integral += value * jxw;
                    volume += jxw;
                }
                s.writes.push((dof, integral / volume));
            }
        }
        Ok(())
    }
}
