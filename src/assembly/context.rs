//! Per-thread scratch data for the element currently being visited.
use crate::objects::ExecuteOn;
use crate::space::{FiniteElementSpace, ShapeValues};
use crate::variables::{DofMap, FeType, SystemKind, Variable, VariableId, VariableRegistry};
use crate::{Real, SubdomainId};
use eyre::eyre;
use nalgebra::{DVector, Point2, Vector2};
use rustc_hash::FxHashMap;

/// Everything needed to evaluate fields on mesh entities during one assembly pass.
///
/// The primary and auxiliary solutions are given at three time levels: current (the trial
/// solution of the nonlinear solver), old and older.
#[derive(Clone, Copy)]
pub struct AssemblyContext<'a, T: Real> {
    pub space: &'a dyn FiniteElementSpace<T>,
    pub variables: &'a VariableRegistry,
    pub primary_dofs: &'a DofMap,
    pub aux_dofs: &'a DofMap,
    pub primary: [&'a DVector<T>; 3],
    pub aux: [&'a DVector<T>; 3],
    pub time: T,
    pub dt: T,
    /// Which auxiliary kernels run in an auxiliary pass.
    pub execute_on: ExecuteOn,
}

impl<'a, T: Real> AssemblyContext<'a, T> {
    fn dof_map(&self, system: SystemKind) -> &'a DofMap {
        match system {
            SystemKind::Primary => self.primary_dofs,
            SystemKind::Auxiliary => self.aux_dofs,
        }
    }

    fn solution(&self, system: SystemKind) -> [&'a DVector<T>; 3] {
        match system {
            SystemKind::Primary => self.primary,
            SystemKind::Auxiliary => self.aux,
        }
    }
}

/// Time level of a field value.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimeLevel {
    Current = 0,
    Old = 1,
    Older = 2,
}

const TIME_LEVELS: [TimeLevel; 3] = [TimeLevel::Current, TimeLevel::Old, TimeLevel::Older];

/// Values of one variable on the current element, side or node.
#[derive(Debug, Clone)]
struct FieldValues<T: Real> {
    fe_type: FeType,
    dofs: Vec<usize>,
    local: [Vec<T>; 3],
    values: [Vec<T>; 3],
    gradients: Vec<Vector2<T>>,
}

impl<T: Real> FieldValues<T> {
    fn new(fe_type: FeType) -> Self {
        Self {
            fe_type,
            dofs: Vec::new(),
            local: Default::default(),
            values: Default::default(),
            gradients: Vec::new(),
        }
    }
}

fn prepare_fields<T: Real>(fields: &mut Vec<FieldValues<T>>, declared: &[Variable]) {
    if fields.len() != declared.len() {
        *fields = declared
            .iter()
            .map(|variable| FieldValues::new(variable.fe_type))
            .collect();
    }
}

/// Material properties at the quadrature points of the current element or side.
///
/// Values are cleared, but not deallocated, before materials are evaluated on a new entity.
#[derive(Debug, Clone)]
pub struct MaterialProperties<T: Real> {
    index: FxHashMap<String, usize>,
    values: Vec<Vec<T>>,
    derivatives: Vec<(String, VariableId, Vec<T>)>,
}

impl<T: Real> Default for MaterialProperties<T> {
    fn default() -> Self {
        Self {
            index: FxHashMap::default(),
            values: Vec::new(),
            derivatives: Vec::new(),
        }
    }
}

impl<T: Real> MaterialProperties<T> {
    pub fn clear(&mut self) {
        self.values.iter_mut().for_each(Vec::clear);
        self.derivatives.iter_mut().for_each(|(_, _, values)| values.clear());
    }

    /// Storage for property `name` at `n_qp` quadrature points, zero-initialized.
    pub fn declare(&mut self, name: &str, n_qp: usize) -> &mut [T] {
        let index = match self.index.get(name) {
            Some(&index) => index,
            None => {
                self.index.insert(name.to_string(), self.values.len());
                self.values.push(Vec::new());
                self.values.len() - 1
            }
        };
        let storage = &mut self.values[index];
        storage.clear();
        storage.resize(n_qp, T::zero());
        storage
    }

    /// Storage for the derivative of property `name` with respect to `variable`.
    pub fn declare_derivative(&mut self, name: &str, variable: VariableId, n_qp: usize) -> &mut [T] {
        let position = self
            .derivatives
            .iter()
            .position(|(property, v, _)| *v == variable && property == name);
        let index = match position {
            Some(index) => index,
            None => {
                self.derivatives.push((name.to_string(), variable, Vec::new()));
                self.derivatives.len() - 1
            }
        };
        let storage = &mut self.derivatives[index].2;
        storage.clear();
        storage.resize(n_qp, T::zero());
        storage
    }

    pub fn get(&self, name: &str) -> Option<&[T]> {
        self.index
            .get(name)
            .map(|&index| self.values[index].as_slice())
            .filter(|values| !values.is_empty())
    }

    pub fn derivative(&self, name: &str, variable: VariableId) -> Option<&[T]> {
        self.derivatives
            .iter()
            .find(|(property, v, values)| *v == variable && property == name && !values.is_empty())
            .map(|(_, _, values)| values.as_slice())
    }
}

/// Shape functions, field values and material properties on the mesh entity currently
/// visited by one thread.
///
/// Contents are valid only until the next `reinit_*` call. Buffers keep their allocations
/// between entities.
#[derive(Debug, Clone)]
pub struct ElementData<T: Real> {
    dim: usize,
    element: usize,
    subdomain: SubdomainId,
    side: Option<usize>,
    node: Option<usize>,
    time: T,
    dt: T,
    lagrange: ShapeValues<T>,
    primary: Vec<FieldValues<T>>,
    aux: Vec<FieldValues<T>>,
    pub(crate) materials: MaterialProperties<T>,
}

impl<T: Real> Default for ElementData<T> {
    fn default() -> Self {
        Self {
            dim: 0,
            element: 0,
            subdomain: 0,
            side: None,
            node: None,
            time: T::zero(),
            dt: T::zero(),
            lagrange: ShapeValues::default(),
            primary: Vec::new(),
            aux: Vec::new(),
            materials: MaterialProperties::default(),
        }
    }
}

impl<T: Real> ElementData<T> {
    pub fn reinit_element(&mut self, ctx: &AssemblyContext<T>, element: usize) -> eyre::Result<()> {
        ctx.space.reinit_element(element, &mut self.lagrange)?;
        self.side = None;
        self.node = None;
        self.reinit_fields(ctx, element)
    }

    pub fn reinit_side(&mut self, ctx: &AssemblyContext<T>, element: usize, side: usize) -> eyre::Result<()> {
        ctx.space.reinit_side(element, side, &mut self.lagrange)?;
        self.node = None;
        self.reinit_fields(ctx, element)?;
        self.side = Some(side);
        Ok(())
    }

    /// Evaluates nodal fields at `node`. Fields without a dof at the node, including all
    /// elemental fields, read as zero.
    pub fn reinit_node(&mut self, ctx: &AssemblyContext<T>, node: usize) -> eyre::Result<()> {
        let point = *ctx
            .space
            .mesh()
            .vertices()
            .get(node)
            .ok_or_else(|| eyre!("node {} out of bounds", node))?;
        self.lagrange.set_single_point(point);
        self.materials.clear();
        self.dim = ctx.space.mesh().dim();
        self.side = None;
        self.node = Some(node);
        self.time = ctx.time;
        self.dt = ctx.dt;

        for system in [SystemKind::Primary, SystemKind::Auxiliary] {
            let dof_map = ctx.dof_map(system);
            let solution = ctx.solution(system);
            let fields = self.fields_mut(ctx.variables, system);
            for (index, field) in fields.iter_mut().enumerate() {
                let var = VariableId { system, index };
                field.dofs.clear();
                if field.fe_type.is_nodal() {
                    field.dofs.extend(dof_map.node_dof(var, node));
                }
                for level in TIME_LEVELS {
                    let l = level as usize;
                    field.local[l].clear();
                    field.local[l].extend(field.dofs.iter().map(|&dof| solution[l][dof]));
                    field.values[l].clear();
                    field.values[l].push(field.local[l].first().copied().unwrap_or_else(T::zero));
                }
                field.gradients.clear();
                field.gradients.push(Vector2::zeros());
            }
        }
        Ok(())
    }

    fn fields_mut(&mut self, variables: &VariableRegistry, system: SystemKind) -> &mut Vec<FieldValues<T>> {
        let fields = match system {
            SystemKind::Primary => &mut self.primary,
            SystemKind::Auxiliary => &mut self.aux,
        };
        prepare_fields(fields, variables.system(system));
        fields
    }

    fn reinit_fields(&mut self, ctx: &AssemblyContext<T>, element: usize) -> eyre::Result<()> {
        self.dim = ctx.space.mesh().dim();
        self.element = element;
        self.subdomain = ctx.space.mesh().element_subdomain(element);
        self.time = ctx.time;
        self.dt = ctx.dt;

        let n_qp = self.lagrange.n_qp();
        for system in [SystemKind::Primary, SystemKind::Auxiliary] {
            let dof_map = ctx.dof_map(system);
            let solution = ctx.solution(system);
            let lagrange = &self.lagrange;
            let fields = match system {
                SystemKind::Primary => &mut self.primary,
                SystemKind::Auxiliary => &mut self.aux,
            };
            prepare_fields(fields, ctx.variables.system(system));

            for (index, field) in fields.iter_mut().enumerate() {
                let var = VariableId { system, index };
                field.dofs.clear();
                field.dofs.extend_from_slice(dof_map.element_dofs(var, element));
                let n_dofs = field.dofs.len();
                if field.fe_type.is_nodal() && n_dofs != 0 && n_dofs != lagrange.n_basis() {
                    return Err(eyre!(
                        "variable {:?} has {} dofs on element {} with {} nodes",
                        var,
                        n_dofs,
                        element,
                        lagrange.n_basis()
                    ));
                }

                for level in TIME_LEVELS {
                    let l = level as usize;
                    field.local[l].clear();
                    field.local[l].extend(field.dofs.iter().map(|&dof| solution[l][dof]));
                    field.values[l].clear();
                    field.values[l].resize(n_qp, T::zero());
                }
                field.gradients.clear();
                field.gradients.resize(n_qp, Vector2::zeros());
                if n_dofs == 0 {
                    continue;
                }

                match field.fe_type {
                    FeType::FirstLagrange => {
                        for qp in 0..n_qp {
                            for i in 0..n_dofs {
                                let phi = lagrange.phi(i, qp);
                                for l in 0..3 {
                                    field.values[l][qp] += phi * field.local[l][i];
                                }
                                field.gradients[qp] += lagrange.grad_phi(i, qp) * field.local[0][i];
                            }
                        }
                    }
                    FeType::ConstantMonomial => {
                        for l in 0..3 {
                            let value = field.local[l][0];
                            field.values[l].iter_mut().for_each(|v| *v = value);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Spatial dimension of the mesh.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn element(&self) -> usize {
        self.element
    }

    pub fn subdomain(&self) -> SubdomainId {
        self.subdomain
    }

    /// The side being integrated over, if any.
    pub fn side(&self) -> Option<usize> {
        self.side
    }

    /// The node being evaluated, during nodal auxiliary passes.
    pub fn node(&self) -> Option<usize> {
        self.node
    }

    pub fn time(&self) -> T {
        self.time
    }

    pub fn dt(&self) -> T {
        self.dt
    }

    pub fn n_qp(&self) -> usize {
        self.lagrange.n_qp()
    }

    pub fn jxw(&self) -> &[T] {
        self.lagrange.jxw()
    }

    pub fn q_point(&self, qp: usize) -> &Point2<T> {
        &self.lagrange.q_points()[qp]
    }

    pub fn normal(&self, qp: usize) -> &Vector2<T> {
        &self.lagrange.normals()[qp]
    }

    fn field(&self, var: VariableId) -> &FieldValues<T> {
        match var.system {
            SystemKind::Primary => &self.primary[var.index],
            SystemKind::Auxiliary => &self.aux[var.index],
        }
    }

    /// Whether `var` has degrees of freedom on the current entity.
    pub fn is_defined(&self, var: VariableId) -> bool {
        !self.field(var).dofs.is_empty()
    }

    pub fn n_dofs(&self, var: VariableId) -> usize {
        self.field(var).dofs.len()
    }

    pub fn dof_indices(&self, var: VariableId) -> &[usize] {
        &self.field(var).dofs
    }

    /// Local degree-of-freedom values at the current time level.
    pub fn dof_values(&self, var: VariableId) -> &[T] {
        &self.field(var).local[0]
    }

    /// Value of basis function `i` of `var` at quadrature point `qp`.
    pub fn phi(&self, var: VariableId, i: usize, qp: usize) -> T {
        match self.field(var).fe_type {
            FeType::FirstLagrange => self.lagrange.phi(i, qp),
            FeType::ConstantMonomial => T::one(),
        }
    }

    pub fn grad_phi(&self, var: VariableId, i: usize, qp: usize) -> Vector2<T> {
        match self.field(var).fe_type {
            FeType::FirstLagrange => *self.lagrange.grad_phi(i, qp),
            FeType::ConstantMonomial => Vector2::zeros(),
        }
    }

    pub fn value(&self, var: VariableId, qp: usize) -> T {
        self.field(var).values[TimeLevel::Current as usize][qp]
    }

    pub fn value_at(&self, var: VariableId, level: TimeLevel, qp: usize) -> T {
        self.field(var).values[level as usize][qp]
    }

    pub fn old_value(&self, var: VariableId, qp: usize) -> T {
        self.value_at(var, TimeLevel::Old, qp)
    }

    pub fn older_value(&self, var: VariableId, qp: usize) -> T {
        self.value_at(var, TimeLevel::Older, qp)
    }

    pub fn gradient(&self, var: VariableId, qp: usize) -> &Vector2<T> {
        &self.field(var).gradients[qp]
    }

    /// Interpolates arbitrary local dof values of `var` to the quadrature points.
    pub fn interpolate(&self, var: VariableId, local: &[T], output: &mut Vec<T>) {
        output.clear();
        output.resize(self.n_qp(), T::zero());
        for (qp, out) in output.iter_mut().enumerate() {
            for (i, &value) in local.iter().enumerate() {
                *out += self.phi(var, i, qp) * value;
            }
        }
    }

    pub fn material(&self, name: &str) -> eyre::Result<&[T]> {
        self.materials.get(name).ok_or_else(|| {
            eyre!(
                "material property `{}` is not available on subdomain {}",
                name,
                self.subdomain
            )
        })
    }

    pub fn material_derivative(&self, name: &str, variable: VariableId) -> Option<&[T]> {
        self.materials.derivative(name, variable)
    }
}
