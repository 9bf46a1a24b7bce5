use super::kernels::add_mass_matrix;
use crate::assembly::ElementData;
use crate::error::ConfigurationError;
use crate::factory::{Factory, ObjectRequest};
use crate::objects::{
    IntegratedBoundaryCondition, JacobianContributor, NodalBoundaryCondition, ObjectInfo, ResidualContributor,
};
use crate::variables::VariableId;
use crate::Real;
use nalgebra::{DMatrixViewMut, DVectorViewMut, Point2};

pub(super) fn register<T: Real>(factory: &mut Factory<T>) {
    factory.integrated_bcs.register("NeumannBC", |r| {
        Ok(Box::new(NeumannBC::<T>::new(r)?) as Box<dyn IntegratedBoundaryCondition<T>>)
    });
    factory.integrated_bcs.register("RobinBC", |r| {
        Ok(Box::new(RobinBC::<T>::new(r)?) as Box<dyn IntegratedBoundaryCondition<T>>)
    });
    factory.nodal_bcs.register("DirichletBC", |r| {
        Ok(Box::new(DirichletBC::<T>::new(r)?) as Box<dyn NodalBoundaryCondition<T>>)
    });
}

fn boundary_info(request: &ObjectRequest, var: VariableId) -> Result<ObjectInfo, ConfigurationError> {
    if request.restriction.is_empty() {
        return Err(ConfigurationError::MissingParameter {
            object: request.name.to_string(),
            parameter: "boundary".to_string(),
        });
    }
    Ok(request.info()?.with_variable(var))
}

/// Prescribed flux `-(g, φ)` on the boundary.
#[derive(Debug, Clone)]
pub struct NeumannBC<T> {
    info: ObjectInfo,
    var: VariableId,
    value: T,
}

impl<T: Real> NeumannBC<T> {
    pub fn new(request: &ObjectRequest) -> Result<Self, ConfigurationError> {
        let var = request.primary_variable()?;
        Ok(Self {
            info: boundary_info(request, var)?,
            var,
            value: request.real("value")?,
        })
    }
}

impl<T: Real> ResidualContributor<T> for NeumannBC<T> {
    fn accumulate_residual(&mut self, data: &ElementData<T>, mut residual: DVectorViewMut<T>) -> eyre::Result<()> {
        for (qp, &jxw) in data.jxw().iter().enumerate() {
            for i in 0..residual.nrows() {
                residual[i] -= self.value * data.phi(self.var, i, qp) * jxw;
            }
        }
        Ok(())
    }
}

impl<T: Real> JacobianContributor<T> for NeumannBC<T> {
    fn accumulate_jacobian(&mut self, _: &ElementData<T>, _: VariableId, _: DMatrixViewMut<T>) -> eyre::Result<()> {
        Ok(())
    }
}

/// Convective exchange `(α (u - u_∞), φ)` with an ambient value `u_∞`.
#[derive(Debug, Clone)]
pub struct RobinBC<T> {
    info: ObjectInfo,
    var: VariableId,
    coefficient: T,
    ambient: T,
}

impl<T: Real> RobinBC<T> {
    pub fn new(request: &ObjectRequest) -> Result<Self, ConfigurationError> {
        let var = request.primary_variable()?;
        Ok(Self {
            info: boundary_info(request, var)?,
            var,
            coefficient: request.real_or("coefficient", 1.0)?,
            ambient: request.real_or("ambient", 0.0)?,
        })
    }
}

impl<T: Real> ResidualContributor<T> for RobinBC<T> {
    fn accumulate_residual(&mut self, data: &ElementData<T>, mut residual: DVectorViewMut<T>) -> eyre::Result<()> {
        for (qp, &jxw) in data.jxw().iter().enumerate() {
            let u = data.value(self.var, qp);
            for i in 0..residual.nrows() {
                residual[i] += self.coefficient * (u - self.ambient) * data.phi(self.var, i, qp) * jxw;
            }
        }
        Ok(())
    }
}

impl<T: Real> JacobianContributor<T> for RobinBC<T> {
    fn accumulate_jacobian(
        &mut self,
        data: &ElementData<T>,
        jvar: VariableId,
        jacobian: DMatrixViewMut<T>,
    ) -> eyre::Result<()> {
        if jvar == self.var {
            add_mass_matrix(data, self.var, jvar, self.coefficient, jacobian);
        }
        Ok(())
    }
}

/// Prescribes `u = value + rate * t` on the nodes of its boundaries.
#[derive(Debug, Clone)]
pub struct DirichletBC<T> {
    info: ObjectInfo,
    value: T,
    rate: T,
}

impl<T: Real> DirichletBC<T> {
    pub fn new(request: &ObjectRequest) -> Result<Self, ConfigurationError> {
        let var = request.primary_variable()?;
        Ok(Self {
            info: boundary_info(request, var)?,
            value: request.real("value")?,
            rate: request.real_or("rate", 0.0)?,
        })
    }
}

impl<T: Real> NodalBoundaryCondition<T> for DirichletBC<T> {
    fn prescribed_value(&self, _node: usize, _point: &Point2<T>, time: T) -> eyre::Result<T> {
        Ok(self.value + self.rate * time)
    }
}

impl_contribution_object!(NeumannBC, RobinBC, DirichletBC);
