//! Capabilities of the physics objects driven by the assembly engine.
//!
//! Concrete physics are plain structs implementing the capabilities they need. The
//! composite traits ([`Kernel`], [`IntegratedBoundaryCondition`], ...) are implemented
//! automatically for any type providing the required capabilities.
use crate::assembly::ElementData;
use crate::error::ConfigurationError;
use crate::variables::VariableId;
use crate::{Real, SubdomainId};
use nalgebra::{DMatrixViewMut, DVectorViewMut, Point2};
use serde::{Deserialize, Serialize};

/// When an auxiliary kernel is evaluated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteOn {
    /// Once, during problem initialization.
    Initial,
    /// Before every residual evaluation.
    Linear,
    /// After a time step has been accepted.
    TimestepEnd,
}

impl ExecuteOn {
    pub fn parse(object: &str, text: &str) -> Result<Self, ConfigurationError> {
        match text {
            "initial" => Ok(Self::Initial),
            "linear" => Ok(Self::Linear),
            "timestep_end" => Ok(Self::TimestepEnd),
            other => Err(ConfigurationError::InvalidParameter {
                object: object.to_string(),
                parameter: "execute_on".to_string(),
                reason: format!("unknown execution point `{}`", other),
            }),
        }
    }
}

/// Construction-time metadata every object carries.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInfo {
    pub name: String,
    /// The variable the object contributes to or computes. Materials have none.
    pub variable: Option<VariableId>,
    /// Variables the object reads besides its own.
    pub coupled: Vec<VariableId>,
    /// Subdomain ids (volumetric objects) or boundary ids (boundary objects). Empty means
    /// unrestricted.
    pub restriction: Vec<u32>,
    /// The object is active for `start_time <= t < end_time`.
    pub start_time: f64,
    pub end_time: f64,
    pub execute_on: Vec<ExecuteOn>,
}

impl ObjectInfo {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            variable: None,
            coupled: Vec::new(),
            restriction: Vec::new(),
            start_time: f64::NEG_INFINITY,
            end_time: f64::INFINITY,
            execute_on: vec![ExecuteOn::Initial, ExecuteOn::Linear],
        }
    }

    pub fn with_variable(mut self, variable: VariableId) -> Self {
        self.variable = Some(variable);
        self
    }

    pub fn with_coupled(mut self, coupled: Vec<VariableId>) -> Self {
        self.coupled = coupled;
        self
    }

    pub fn with_restriction(mut self, restriction: &[u32]) -> Self {
        self.restriction = restriction.to_vec();
        self
    }

    pub fn with_active_window(mut self, start_time: f64, end_time: f64) -> Self {
        self.start_time = start_time;
        self.end_time = end_time;
        self
    }

    pub fn with_execute_on(mut self, execute_on: Vec<ExecuteOn>) -> Self {
        self.execute_on = execute_on;
        self
    }

    pub fn is_active_at(&self, time: f64) -> bool {
        self.start_time <= time && time < self.end_time
    }

    pub fn executes_on(&self, point: ExecuteOn) -> bool {
        self.execute_on.contains(&point)
    }
}

/// Anything owned by a [`Warehouse`](crate::warehouse::Warehouse).
pub trait ContributionObject: Send {
    fn info(&self) -> &ObjectInfo;

    fn name(&self) -> &str {
        &self.info().name
    }
}

/// Lifecycle hooks. All default to doing nothing.
pub trait SetupHook {
    fn initial_setup(&mut self) -> eyre::Result<()> {
        Ok(())
    }

    fn timestep_setup(&mut self) -> eyre::Result<()> {
        Ok(())
    }

    fn residual_setup(&mut self) -> eyre::Result<()> {
        Ok(())
    }

    fn jacobian_setup(&mut self) -> eyre::Result<()> {
        Ok(())
    }

    /// Called on a thread before the first element of a run of elements in `subdomain`.
    fn subdomain_setup(&mut self, _subdomain: SubdomainId) -> eyre::Result<()> {
        Ok(())
    }
}

pub trait ResidualContributor<T: Real> {
    /// Adds this object's contribution to the local residual of its variable.
    fn accumulate_residual(&mut self, data: &ElementData<T>, residual: DVectorViewMut<T>) -> eyre::Result<()>;
}

pub trait JacobianContributor<T: Real> {
    /// Adds the derivative of this object's residual with respect to `jvar` to the local
    /// Jacobian block (rows: own variable, columns: `jvar`).
    fn accumulate_jacobian(
        &mut self,
        data: &ElementData<T>,
        jvar: VariableId,
        jacobian: DMatrixViewMut<T>,
    ) -> eyre::Result<()>;
}

/// A volumetric weak-form contribution.
pub trait Kernel<T: Real>: ContributionObject + SetupHook + ResidualContributor<T> + JacobianContributor<T> {}

impl<T: Real, K> Kernel<T> for K where K: ContributionObject + SetupHook + ResidualContributor<T> + JacobianContributor<T> {}

/// A weak-form contribution integrated over boundary sides.
pub trait IntegratedBoundaryCondition<T: Real>:
    ContributionObject + SetupHook + ResidualContributor<T> + JacobianContributor<T>
{
}

impl<T: Real, B> IntegratedBoundaryCondition<T> for B where
    B: ContributionObject + SetupHook + ResidualContributor<T> + JacobianContributor<T>
{
}

/// An essential constraint prescribing nodal values on a boundary.
pub trait NodalBoundaryCondition<T: Real>: ContributionObject + SetupHook {
    fn prescribed_value(&self, node: usize, point: &Point2<T>, time: T) -> eyre::Result<T>;
}

/// Stores a property and, optionally, its derivatives under
/// [`MaterialProperties`](crate::assembly::MaterialProperties) for every quadrature point.
pub trait Material<T: Real>: ContributionObject + SetupHook {
    fn compute_properties(&mut self, data: &ElementData<T>, properties: &mut crate::assembly::MaterialProperties<T>)
        -> eyre::Result<()>;
}

/// Computes the value of an auxiliary variable at a quadrature point.
///
/// Nodal auxiliary variables are evaluated with a single point located at the node.
/// Elemental ones take the volume average over the element's quadrature points.
pub trait AuxKernel<T: Real>: ContributionObject + SetupHook {
    fn compute_value(&mut self, data: &ElementData<T>, qp: usize) -> eyre::Result<T>;
}

/// Limits the Newton step. `increment` holds the step of the damper's variable at each
/// quadrature point.
pub trait Damper<T: Real>: ContributionObject + SetupHook {
    fn compute_damping(&mut self, data: &ElementData<T>, increment: &[T]) -> eyre::Result<T>;
}
