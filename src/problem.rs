//! The simulation context.
use crate::assembly::global::{
    assemble_sparsity_pattern, constrain_jacobian, constrain_residual, zero_csr_matrix, EssentialConstraint,
    GlobalMatrix, GlobalVector,
};
use crate::assembly::{
    assemble_jacobian, assemble_residual, execute_aux_kernels, partition_range, AssemblyContext, AuxPartitions,
    ThreadData, ThreadWarehouses,
};
use crate::config::ProblemConfig;
use crate::error::ConfigurationError;
use crate::factory::{Factory, ObjectRequest, Registry};
use crate::objects::{ContributionObject, ExecuteOn, NodalBoundaryCondition, SetupHook};
use crate::optimize::newton::NewtonOutcome;
use crate::parameters::Parameters;
use crate::solver::{DenseLu, LinearSolver};
use crate::space::FiniteElementSpace;
use crate::variables::{DofMap, FeType, SystemKind, VariableId, VariableRegistry};
use crate::warehouse::Warehouse;
use crate::{BoundaryId, Real, SubdomainId};
use eyre::{bail, ensure, WrapErr};
use log::info;
use nalgebra::DVector;
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

/// Degree-of-freedom numberings of the primary and auxiliary systems.
#[derive(Debug, Clone)]
pub struct DofMaps {
    pub primary: DofMap,
    pub aux: DofMap,
}

/// Solution vectors of both systems at the current, old and older time levels.
#[derive(Debug, Clone)]
pub struct SolutionState<T: Real> {
    pub primary: [DVector<T>; 3],
    pub aux: [DVector<T>; 3],
}

impl<T: Real> SolutionState<T> {
    fn zeros(n_primary: usize, n_aux: usize) -> Self {
        Self {
            primary: [0, 1, 2].map(|_| DVector::zeros(n_primary)),
            aux: [0, 1, 2].map(|_| DVector::zeros(n_aux)),
        }
    }

    fn shift_time_levels(&mut self) {
        for levels in [&mut self.primary, &mut self.aux] {
            let [current, old, older] = levels;
            older.copy_from(old);
            old.copy_from(current);
        }
    }
}

/// Owns the discretization, the variables, the object factory and one set of warehouses
/// per assembly thread.
///
/// Configuration (variables and objects) must be complete before [`Problem::initialize`].
/// Every object is constructed once per thread so that threads never share object state.
pub struct Problem<T: Real> {
    config: ProblemConfig,
    space: Box<dyn FiniteElementSpace<T>>,
    variables: VariableRegistry,
    factory: Factory<T>,
    threads: Vec<ThreadData<T>>,
    nodal_bcs: Warehouse<dyn NodalBoundaryCondition<T>>,
    object_names: BTreeSet<String>,
    pool: ThreadPool,
    element_ranges: Vec<Range<usize>>,
    node_ranges: Vec<Range<usize>>,
    node_subdomains: Vec<Vec<SubdomainId>>,
    boundary_nodes: BTreeMap<BoundaryId, Vec<usize>>,
    dofs: Option<DofMaps>,
    pattern: Option<SparsityPattern>,
    state: SolutionState<T>,
    time: f64,
    dt: f64,
}

impl<T: Real> Problem<T> {
    pub fn new(space: impl FiniteElementSpace<T> + 'static, config: ProblemConfig) -> eyre::Result<Self> {
        Self::with_factory(space, config, Factory::with_builtin())
    }

    pub fn with_factory(
        space: impl FiniteElementSpace<T> + 'static,
        config: ProblemConfig,
        factory: Factory<T>,
    ) -> eyre::Result<Self> {
        config.validate()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.num_threads)
            .build()
            .wrap_err("failed to build assembly thread pool")?;
        let threads = (0..config.num_threads).map(|_| ThreadData::new()).collect();
        let mut problem = Self {
            config,
            space: Box::new(space),
            variables: VariableRegistry::new(),
            factory,
            threads,
            nodal_bcs: Warehouse::new(),
            object_names: BTreeSet::new(),
            pool,
            element_ranges: Vec::new(),
            node_ranges: Vec::new(),
            node_subdomains: Vec::new(),
            boundary_nodes: BTreeMap::new(),
            dofs: None,
            pattern: None,
            state: SolutionState::zeros(0, 0),
            time: 0.0,
            dt: 0.0,
        };
        problem.rebuild_ranges();
        Ok(problem)
    }

    /// Recomputes the element and node partitions and the node and boundary lookup tables.
    /// Must be called after the mesh topology or its labels change.
    pub fn rebuild_ranges(&mut self) {
        let mesh = self.space.mesh();
        let num_threads = self.threads.len();
        self.element_ranges = partition_range(mesh.num_elements(), num_threads);
        self.node_ranges = partition_range(mesh.num_nodes(), num_threads);
        self.node_subdomains = mesh.node_subdomains();
        self.boundary_nodes = mesh
            .boundary_ids()
            .into_iter()
            .map(|id| (id, mesh.boundary_nodes(id)))
            .collect();
    }

    pub fn config(&self) -> &ProblemConfig {
        &self.config
    }

    pub fn space(&self) -> &dyn FiniteElementSpace<T> {
        &*self.space
    }

    /// Mutable access to the discretization. Call [`Problem::rebuild_ranges`] after changing
    /// the mesh.
    pub fn space_mut(&mut self) -> &mut dyn FiniteElementSpace<T> {
        &mut *self.space
    }

    pub fn variables(&self) -> &VariableRegistry {
        &self.variables
    }

    /// Register custom object kinds here before adding objects of that kind.
    pub fn factory_mut(&mut self) -> &mut Factory<T> {
        &mut self.factory
    }

    pub fn num_threads(&self) -> usize {
        self.threads.len()
    }

    pub fn is_initialized(&self) -> bool {
        self.dofs.is_some()
    }

    pub fn dof_maps(&self) -> eyre::Result<&DofMaps> {
        Ok(self
            .dofs
            .as_ref()
            .ok_or(ConfigurationError::NotInitialized)?)
    }

    /// Number of primary degrees of freedom.
    pub fn n_dofs(&self) -> usize {
        self.dofs
            .as_ref()
            .map(|dofs| dofs.primary.n_dofs())
            .unwrap_or(0)
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn state(&self) -> &SolutionState<T> {
        &self.state
    }

    pub fn solution(&self) -> &DVector<T> {
        &self.state.primary[0]
    }

    pub fn aux_solution(&self) -> &DVector<T> {
        &self.state.aux[0]
    }

    pub fn set_solution(&mut self, solution: DVector<T>) -> eyre::Result<()> {
        ensure!(
            solution.len() == self.state.primary[0].len(),
            "solution has length {}, expected {}",
            solution.len(),
            self.state.primary[0].len()
        );
        self.state.primary[0] = solution;
        Ok(())
    }

    /// Current value of a nodal variable at `node`, or `None` if it has no dof there.
    pub fn nodal_value(&self, variable: &str, node: usize) -> eyre::Result<Option<T>> {
        let (id, dof_map, solution) = self.lookup(variable)?;
        Ok(dof_map
            .node_dof(id, node)
            .map(|dof| solution[dof]))
    }

    /// Current value of an elemental variable on `element`, or `None` if it has no dof there.
    pub fn element_value(&self, variable: &str, element: usize) -> eyre::Result<Option<T>> {
        let (id, dof_map, solution) = self.lookup(variable)?;
        Ok(dof_map
            .element_dofs(id, element)
            .first()
            .map(|&dof| solution[dof]))
    }

    fn lookup(&self, variable: &str) -> eyre::Result<(VariableId, &DofMap, &DVector<T>)> {
        let dofs = self.dof_maps()?;
        let id = self.variables.resolve("problem", variable)?;
        Ok(match id.system {
            SystemKind::Primary => (id, &dofs.primary, &self.state.primary[0]),
            SystemKind::Auxiliary => (id, &dofs.aux, &self.state.aux[0]),
        })
    }

    fn ensure_configurable(&self) -> eyre::Result<()> {
        if self.is_initialized() {
            bail!(ConfigurationError::AlreadyInitialized);
        }
        Ok(())
    }

    fn check_subdomains(&self, object: &str, restriction: &[SubdomainId]) -> eyre::Result<()> {
        let subdomains = self.space.mesh().subdomain_ids();
        if let Some(&subdomain) = restriction.iter().find(|id| !subdomains.contains(id)) {
            bail!(ConfigurationError::MissingSubdomain {
                object: object.to_string(),
                subdomain,
            });
        }
        Ok(())
    }

    fn check_boundaries(&self, object: &str, restriction: &[BoundaryId]) -> eyre::Result<()> {
        if let Some(&boundary) = restriction
            .iter()
            .find(|id| !self.boundary_nodes.contains_key(id))
        {
            bail!(ConfigurationError::MissingBoundary {
                object: object.to_string(),
                boundary,
            });
        }
        Ok(())
    }

    fn check_name(&self, name: &str) -> eyre::Result<()> {
        if self.object_names.contains(name) {
            bail!(ConfigurationError::DuplicateName { name: name.to_string() });
        }
        Ok(())
    }

    /// Adds a primary variable, restricted to the given subdomains unless `restriction` is
    /// empty.
    pub fn add_variable(
        &mut self,
        name: &str,
        fe_type: FeType,
        restriction: &[SubdomainId],
    ) -> eyre::Result<VariableId> {
        self.add_variable_to(name, SystemKind::Primary, fe_type, restriction)
    }

    pub fn add_aux_variable(
        &mut self,
        name: &str,
        fe_type: FeType,
        restriction: &[SubdomainId],
    ) -> eyre::Result<VariableId> {
        self.add_variable_to(name, SystemKind::Auxiliary, fe_type, restriction)
    }

    fn add_variable_to(
        &mut self,
        name: &str,
        system: SystemKind,
        fe_type: FeType,
        restriction: &[SubdomainId],
    ) -> eyre::Result<VariableId> {
        self.ensure_configurable()?;
        self.check_subdomains(name, restriction)?;
        let restriction = (!restriction.is_empty()).then(|| restriction.iter().copied().collect());
        Ok(self.variables.add(name, system, fe_type, restriction)?)
    }

    /// Constructs one object per thread and hands each to the warehouse selected by
    /// `warehouse`.
    fn add_object<O>(
        &mut self,
        kind: &str,
        name: &str,
        restriction: &[u32],
        parameters: &Parameters,
        registry: fn(&Factory<T>) -> &Registry<O>,
        warehouse: fn(&mut ThreadWarehouses<T>) -> &mut Warehouse<O>,
    ) -> eyre::Result<()>
    where
        O: ?Sized + ContributionObject + SetupHook,
    {
        let request = ObjectRequest {
            kind,
            name,
            restriction,
            parameters,
            variables: &self.variables,
        };
        let registry = registry(&self.factory);
        let objects = self
            .threads
            .iter()
            .map(|_| registry.create(&request))
            .collect::<eyre::Result<Vec<_>>>()
            .wrap_err_with(|| format!("failed to construct `{}`", name))?;
        for (thread, object) in self.threads.iter_mut().zip(objects) {
            warehouse(&mut thread.warehouses).add_object(restriction, object)?;
        }
        self.object_names.insert(name.to_string());
        Ok(())
    }

    /// Adds a volumetric kernel acting on the subdomains in `restriction`, or everywhere if
    /// it is empty.
    pub fn add_kernel(
        &mut self,
        kind: &str,
        name: &str,
        restriction: &[SubdomainId],
        parameters: &Parameters,
    ) -> eyre::Result<()> {
        self.ensure_configurable()?;
        self.check_name(name)?;
        self.check_subdomains(name, restriction)?;
        self.add_object(
            kind,
            name,
            restriction,
            parameters,
            |factory| &factory.kernels,
            |warehouses| &mut warehouses.kernels,
        )
    }

    /// Adds a stabilization term. Stabilizers are volumetric kernels kept apart from the
    /// physical ones.
    pub fn add_stabilizer(
        &mut self,
        kind: &str,
        name: &str,
        restriction: &[SubdomainId],
        parameters: &Parameters,
    ) -> eyre::Result<()> {
        self.ensure_configurable()?;
        self.check_name(name)?;
        self.check_subdomains(name, restriction)?;
        self.add_object(
            kind,
            name,
            restriction,
            parameters,
            |factory| &factory.stabilizers,
            |warehouses| &mut warehouses.stabilizers,
        )
    }

    pub fn add_material(
        &mut self,
        kind: &str,
        name: &str,
        restriction: &[SubdomainId],
        parameters: &Parameters,
    ) -> eyre::Result<()> {
        self.ensure_configurable()?;
        self.check_name(name)?;
        self.check_subdomains(name, restriction)?;
        self.add_object(
            kind,
            name,
            restriction,
            parameters,
            |factory| &factory.materials,
            |warehouses| &mut warehouses.materials,
        )
    }

    pub fn add_damper(
        &mut self,
        kind: &str,
        name: &str,
        restriction: &[SubdomainId],
        parameters: &Parameters,
    ) -> eyre::Result<()> {
        self.ensure_configurable()?;
        self.check_name(name)?;
        self.check_subdomains(name, restriction)?;
        self.add_object(
            kind,
            name,
            restriction,
            parameters,
            |factory| &factory.dampers,
            |warehouses| &mut warehouses.dampers,
        )
    }

    /// Adds an auxiliary kernel. Kernels computing nodal variables run over nodes, the others
    /// over elements. Both are ordered by their variable dependencies.
    pub fn add_aux_kernel(
        &mut self,
        kind: &str,
        name: &str,
        restriction: &[SubdomainId],
        parameters: &Parameters,
    ) -> eyre::Result<()> {
        self.ensure_configurable()?;
        self.check_name(name)?;
        self.check_subdomains(name, restriction)?;
        let request = ObjectRequest {
            kind,
            name,
            restriction,
            parameters,
            variables: &self.variables,
        };
        let var = request.aux_variable()?;
        let nodal = self.variables.get(var).fe_type.is_nodal();
        if nodal {
            let kernel = self
                .factory
                .aux_kernels
                .create(&request)
                .wrap_err_with(|| format!("failed to construct `{}`", name))?;
            if let Some(&coupled) = kernel
                .info()
                .coupled
                .iter()
                .find(|&&coupled| !self.variables.get(coupled).fe_type.is_nodal())
            {
                bail!(ConfigurationError::ElementalCoupling {
                    object: name.to_string(),
                    variable: self.variables.name(coupled).to_string(),
                });
            }
        }
        if nodal {
            self.add_object(
                kind,
                name,
                restriction,
                parameters,
                |factory| &factory.aux_kernels,
                |warehouses| &mut warehouses.nodal_aux,
            )
        } else {
            self.add_object(
                kind,
                name,
                restriction,
                parameters,
                |factory| &factory.aux_kernels,
                |warehouses| &mut warehouses.elemental_aux,
            )
        }
    }

    /// Adds a boundary condition on the given boundaries. Integrated conditions run in the
    /// element loop, nodal ones are enforced as essential constraints afterwards.
    pub fn add_bc(
        &mut self,
        kind: &str,
        name: &str,
        boundaries: &[BoundaryId],
        parameters: &Parameters,
    ) -> eyre::Result<()> {
        self.ensure_configurable()?;
        self.check_name(name)?;
        self.check_boundaries(name, boundaries)?;
        if self.factory.integrated_bcs.contains(kind) {
            return self.add_object(
                kind,
                name,
                boundaries,
                parameters,
                |factory| &factory.integrated_bcs,
                |warehouses| &mut warehouses.integrated_bcs,
            );
        }

        let request = ObjectRequest {
            kind,
            name,
            restriction: boundaries,
            parameters,
            variables: &self.variables,
        };
        let bc = self
            .factory
            .nodal_bcs
            .create(&request)
            .wrap_err_with(|| format!("failed to construct `{}`", name))?;
        self.nodal_bcs.add_object(boundaries, bc)?;
        self.object_names.insert(name.to_string());
        Ok(())
    }

    /// Numbers the degrees of freedom, validates the configuration, builds the Jacobian
    /// sparsity pattern, runs the initial setup of all objects and the initial auxiliary pass.
    pub fn initialize(&mut self) -> eyre::Result<()> {
        self.ensure_configurable()?;
        let mesh = self.space.mesh();
        if self.config.check_kernel_coverage {
            self.check_kernel_coverage()?;
        }

        let primary = DofMap::build(mesh, SystemKind::Primary, self.variables.system(SystemKind::Primary));
        let aux = DofMap::build(mesh, SystemKind::Auxiliary, self.variables.system(SystemKind::Auxiliary));
        let num_primary = self.variables.system(SystemKind::Primary).len();
        let pattern = assemble_sparsity_pattern(primary.n_dofs(), mesh.num_elements(), |element, dofs| {
            for index in 0..num_primary {
                let var = VariableId {
                    system: SystemKind::Primary,
                    index,
                };
                dofs.extend_from_slice(primary.element_dofs(var, element));
            }
        })?;

        self.state = SolutionState::zeros(primary.n_dofs(), aux.n_dofs());
        info!(
            "Initialized problem with {} primary dofs, {} auxiliary dofs and {} Jacobian nonzeros on {} threads",
            primary.n_dofs(),
            aux.n_dofs(),
            pattern.nnz(),
            self.threads.len()
        );
        if let Some(thread) = self.threads.first() {
            let w = &thread.warehouses;
            info!(
                "Objects: {} kernels, {} stabilizers, {} integrated BCs, {} nodal BCs, {} materials, \
                 {} nodal aux kernels, {} elemental aux kernels, {} dampers",
                w.kernels.len(),
                w.stabilizers.len(),
                w.integrated_bcs.len(),
                self.nodal_bcs.len(),
                w.materials.len(),
                w.nodal_aux.len(),
                w.elemental_aux.len(),
                w.dampers.len()
            );
        }
        self.dofs = Some(DofMaps { primary, aux });
        self.pattern = Some(pattern);

        self.update_active();
        for thread in &mut self.threads {
            thread.warehouses.initial_setup()?;
        }
        self.nodal_bcs.initial_setup()?;

        let mut solution = std::mem::replace(&mut self.state.primary[0], DVector::zeros(0));
        let constrained = self.apply_constraints(&mut solution);
        self.state.primary[0] = solution;
        constrained?;
        self.execute_aux(None, ExecuteOn::Initial)
    }

    fn check_kernel_coverage(&self) -> eyre::Result<()> {
        let Some(thread) = self.threads.first() else {
            return Ok(());
        };
        let kernels = &thread.warehouses.kernels;
        let mut handles = Vec::new();
        for subdomain in self.space.mesh().occupied_subdomain_ids() {
            kernels.active_on(subdomain, &mut handles);
            for variable in self.variables.system(SystemKind::Primary) {
                if !variable.is_defined_on(subdomain) {
                    continue;
                }
                let covered = handles
                    .iter()
                    .any(|&h| kernels.get(h).info().variable == Some(variable.id));
                if !covered {
                    bail!(ConfigurationError::MissingKernelCoverage {
                        subdomain,
                        variable: variable.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn update_active(&mut self) {
        for thread in &mut self.threads {
            thread.warehouses.update_active(self.time);
        }
        self.nodal_bcs.update_active(self.time);
    }

    /// Essential constraints of all active nodal boundary conditions at the current time.
    /// Where several conditions constrain the same dof, the last one in registration order
    /// wins.
    pub fn essential_constraints(&self) -> eyre::Result<Vec<EssentialConstraint<T>>> {
        let dofs = self.dof_maps()?;
        let mesh = self.space.mesh();
        let time = nalgebra::convert(self.time);

        let mut entries = Vec::new();
        for (&boundary, nodes) in &self.boundary_nodes {
            for &h in self.nodal_bcs.active_for_key(boundary) {
                let bc = self.nodal_bcs.get(h);
                let Some(var) = bc.info().variable else {
                    continue;
                };
                for &node in nodes {
                    if let Some(dof) = dofs.primary.node_dof(var, node) {
                        let value = bc
                            .prescribed_value(node, &mesh.vertices()[node], time)
                            .wrap_err_with(|| format!("`{}` failed on node {}", bc.name(), node))?;
                        entries.push((h, dof, value));
                    }
                }
            }
        }
        entries.sort_by_key(|&(h, _, _)| h);
        let constraints: BTreeMap<usize, T> = entries
            .into_iter()
            .map(|(_, dof, value)| (dof, value))
            .collect();
        Ok(constraints
            .into_iter()
            .map(|(dof, value)| EssentialConstraint { dof, value })
            .collect())
    }

    /// Writes the prescribed values into `u`.
    pub fn apply_constraints(&self, u: &mut DVector<T>) -> eyre::Result<()> {
        for constraint in self.essential_constraints()? {
            u[constraint.dof] = constraint.value;
        }
        Ok(())
    }

    fn execute_aux(&mut self, u: Option<&DVector<T>>, execute_on: ExecuteOn) -> eyre::Result<()> {
        let dofs = self
            .dofs
            .as_ref()
            .ok_or(ConfigurationError::NotInitialized)?;
        if dofs.aux.n_dofs() == 0 {
            return Ok(());
        }
        let mut aux = std::mem::replace(&mut self.state.aux[0], DVector::zeros(0));
        let result = {
            let base = AssemblyContext {
                space: &*self.space,
                variables: &self.variables,
                primary_dofs: &dofs.primary,
                aux_dofs: &dofs.aux,
                primary: [
                    u.unwrap_or(&self.state.primary[0]),
                    &self.state.primary[1],
                    &self.state.primary[2],
                ],
                aux: [&self.state.aux[0], &self.state.aux[1], &self.state.aux[2]],
                time: nalgebra::convert(self.time),
                dt: nalgebra::convert(self.dt),
                execute_on,
            };
            let partitions = AuxPartitions {
                elements: &self.element_ranges,
                nodes: &self.node_ranges,
                node_subdomains: &self.node_subdomains,
            };
            execute_aux_kernels(&self.pool, &mut self.threads, &partitions, &base, &mut aux)
        };
        self.state.aux[0] = aux;
        result.wrap_err_with(|| format!("auxiliary pass on {:?} failed", execute_on))
    }

    /// Assembles `residual = R(u)`.
    ///
    /// Auxiliary kernels executing on [`ExecuteOn::Linear`] are evaluated first. Rows of
    /// constrained dofs hold `u - g` for the prescribed value `g`.
    pub fn compute_residual<V>(&mut self, u: &DVector<T>, residual: &mut V) -> eyre::Result<()>
    where
        V: GlobalVector<T>,
    {
        self.check_vector_lengths(u, residual.len())?;
        for thread in &mut self.threads {
            thread.warehouses.residual_setup()?;
        }
        self.execute_aux(Some(u), ExecuteOn::Linear)?;

        residual.zero();
        {
            let dofs = self
                .dofs
                .as_ref()
                .ok_or(ConfigurationError::NotInitialized)?;
            let ctx = assembly_context(&*self.space, &self.variables, dofs, &self.state, u, self.time, self.dt);
            assemble_residual(&self.pool, &mut self.threads, &self.element_ranges, &ctx, residual)?;
        }
        let constraints = self.essential_constraints()?;
        constrain_residual(residual, u, &constraints)
    }

    /// Assembles `jacobian = dR/du (u)` into a matrix whose pattern covers the problem's
    /// sparsity pattern.
    pub fn compute_jacobian<M>(&mut self, u: &DVector<T>, jacobian: &mut M) -> eyre::Result<()>
    where
        M: GlobalMatrix<T>,
    {
        self.check_vector_lengths(u, jacobian.nrows())?;
        for thread in &mut self.threads {
            thread.warehouses.jacobian_setup()?;
        }
        self.execute_aux(Some(u), ExecuteOn::Linear)?;

        jacobian.zero();
        {
            let dofs = self
                .dofs
                .as_ref()
                .ok_or(ConfigurationError::NotInitialized)?;
            let ctx = assembly_context(&*self.space, &self.variables, dofs, &self.state, u, self.time, self.dt);
            assemble_jacobian(&self.pool, &mut self.threads, &self.element_ranges, &ctx, jacobian)?;
        }
        let constraints = self.essential_constraints()?;
        constrain_jacobian(jacobian, &constraints)
    }

    /// A zero CSR matrix on the problem's sparsity pattern.
    pub fn create_jacobian(&self) -> eyre::Result<CsrMatrix<T>> {
        let pattern = self
            .pattern
            .as_ref()
            .ok_or(ConfigurationError::NotInitialized)?;
        zero_csr_matrix(pattern.clone())
    }

    /// The factor in `(0, 1]` by which the update `u + step` is scaled, as the minimum over
    /// all active dampers, elements and threads.
    pub fn compute_damping(&mut self, u: &DVector<T>, step: &DVector<T>) -> eyre::Result<T> {
        self.check_vector_lengths(u, step.len())?;
        let dofs = self
            .dofs
            .as_ref()
            .ok_or(ConfigurationError::NotInitialized)?;
        let has_dampers = self
            .threads
            .first()
            .map(|thread| thread.warehouses.dampers.has_active_objects())
            .unwrap_or(false);
        if !has_dampers {
            return Ok(T::one());
        }
        let ctx = assembly_context(&*self.space, &self.variables, dofs, &self.state, u, self.time, self.dt);
        crate::assembly::compute_damping(&self.pool, &mut self.threads, &self.element_ranges, &ctx, step)
    }

    fn check_vector_lengths(&self, u: &DVector<T>, other: usize) -> eyre::Result<()> {
        let n = self.dof_maps()?.primary.n_dofs();
        ensure!(
            u.len() == n && other == n,
            "expected vectors of length {}, got {} and {}",
            n,
            u.len(),
            other
        );
        Ok(())
    }

    /// Solves `R(u) = 0` with Newton's method, starting from the current solution with
    /// essential constraints applied, using a dense LU factorization for the linear systems.
    ///
    /// The current solution is replaced by the last iterate, also when the solver did not
    /// converge.
    pub fn solve(&mut self) -> eyre::Result<NewtonOutcome<T>> {
        self.solve_with(&mut DenseLu)
    }

    pub fn solve_with(&mut self, linear_solver: &mut dyn LinearSolver<T>) -> eyre::Result<NewtonOutcome<T>> {
        crate::solver::solve(self, linear_solver)
    }

    /// Moves to the next time step: shifts time levels, advances time by `dt`, runs the time
    /// step setup, refreshes active objects and runs the auxiliary pass for
    /// [`ExecuteOn::TimestepEnd`].
    pub fn advance_time(&mut self, dt: f64) -> eyre::Result<()> {
        self.dof_maps()?;
        ensure!(dt > 0.0, "time step must be positive, got {}", dt);
        self.state.shift_time_levels();
        self.time += dt;
        self.dt = dt;
        for thread in &mut self.threads {
            thread.warehouses.timestep_setup()?;
        }
        self.nodal_bcs.timestep_setup()?;
        self.update_active();
        self.execute_aux(None, ExecuteOn::TimestepEnd)
    }
}

fn assembly_context<'a, T: Real>(
    space: &'a dyn FiniteElementSpace<T>,
    variables: &'a VariableRegistry,
    dofs: &'a DofMaps,
    state: &'a SolutionState<T>,
    u: &'a DVector<T>,
    time: f64,
    dt: f64,
) -> AssemblyContext<'a, T> {
    AssemblyContext {
        space,
        variables,
        primary_dofs: &dofs.primary,
        aux_dofs: &dofs.aux,
        primary: [u, &state.primary[1], &state.primary[2]],
        aux: [&state.aux[0], &state.aux[1], &state.aux[2]],
        time: nalgebra::convert(time),
        dt: nalgebra::convert(dt),
        execute_on: ExecuteOn::Linear,
    }
}
