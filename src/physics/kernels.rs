use crate::assembly::ElementData;
use crate::error::ConfigurationError;
use crate::factory::{Factory, ObjectRequest};
use crate::objects::{JacobianContributor, Kernel, ObjectInfo, ResidualContributor};
use crate::variables::VariableId;
use crate::Real;
use eyre::ensure;
use nalgebra::{DMatrixViewMut, DVectorViewMut};

pub(super) fn register<T: Real>(factory: &mut Factory<T>) {
    let kernels = &mut factory.kernels;
    kernels.register("Diffusion", |r| Ok(Box::new(Diffusion::<T>::new(r)?) as Box<dyn Kernel<T>>));
    kernels.register("Reaction", |r| Ok(Box::new(Reaction::<T>::new(r)?) as Box<dyn Kernel<T>>));
    kernels.register("BodyForce", |r| Ok(Box::new(BodyForce::<T>::new(r)?) as Box<dyn Kernel<T>>));
    kernels.register("CoupledForce", |r| Ok(Box::new(CoupledForce::<T>::new(r)?) as Box<dyn Kernel<T>>));
    kernels.register("TimeDerivative", |r| Ok(Box::new(TimeDerivative::<T>::new(r)?) as Box<dyn Kernel<T>>));
    kernels.register("NonlinearReaction", |r| {
        Ok(Box::new(NonlinearReaction::<T>::new(r)?) as Box<dyn Kernel<T>>)
    });
}

#[derive(Debug, Clone)]
enum Diffusivity<T> {
    Constant(T),
    Property(String),
}

/// `(D ∇u, ∇φ)` with a constant diffusivity or one taken from a material property.
///
/// When the property has derivatives with respect to other variables, the corresponding
/// off-diagonal Jacobian blocks are assembled for the variables listed in
/// `coupled_variables`.
#[derive(Debug, Clone)]
pub struct Diffusion<T> {
    info: ObjectInfo,
    var: VariableId,
    diffusivity: Diffusivity<T>,
}

impl<T: Real> Diffusion<T> {
    pub fn new(request: &ObjectRequest) -> Result<Self, ConfigurationError> {
        let var = request.primary_variable()?;
        let property = request
            .parameters
            .optional_text(request.name, "diffusivity_property")?;
        let diffusivity = match property {
            Some(_) if request.parameters.contains("diffusivity") => {
                return Err(request.invalid(
                    "diffusivity",
                    "cannot be combined with `diffusivity_property`",
                ));
            }
            Some(name) => Diffusivity::Property(name.to_string()),
            None => Diffusivity::Constant(request.real_or("diffusivity", 1.0)?),
        };
        Ok(Self {
            info: request.info()?.with_variable(var),
            var,
            diffusivity,
        })
    }

    fn diffusivity<'a>(&self, data: &'a ElementData<T>) -> eyre::Result<Option<&'a [T]>> {
        match &self.diffusivity {
            Diffusivity::Constant(_) => Ok(None),
            Diffusivity::Property(name) => data.material(name).map(Some),
        }
    }

    fn diffusivity_at(&self, property: Option<&[T]>, qp: usize) -> T {
        match (&self.diffusivity, property) {
            (_, Some(values)) => values[qp],
            (Diffusivity::Constant(value), None) => *value,
            (Diffusivity::Property(_), None) => T::zero(),
        }
    }
}

impl<T: Real> ResidualContributor<T> for Diffusion<T> {
    fn accumulate_residual(&mut self, data: &ElementData<T>, mut residual: DVectorViewMut<T>) -> eyre::Result<()> {
        let property = self.diffusivity(data)?;
        for (qp, &jxw) in data.jxw().iter().enumerate() {
            let d = self.diffusivity_at(property, qp);
            let grad_u = data.gradient(self.var, qp);
            for i in 0..residual.nrows() {
                residual[i] += d * grad_u.dot(&data.grad_phi(self.var, i, qp)) * jxw;
            }
        }
        Ok(())
    }
}

impl<T: Real> JacobianContributor<T> for Diffusion<T> {
    fn accumulate_jacobian(
        &mut self,
        data: &ElementData<T>,
        jvar: VariableId,
        mut jacobian: DMatrixViewMut<T>,
    ) -> eyre::Result<()> {
        let property = self.diffusivity(data)?;
        let derivative = match &self.diffusivity {
            Diffusivity::Property(name) => data.material_derivative(name, jvar),
            Diffusivity::Constant(_) => None,
        };
        if jvar != self.var && derivative.is_none() {
            return Ok(());
        }

        for (qp, &jxw) in data.jxw().iter().enumerate() {
            let d = self.diffusivity_at(property, qp);
            let grad_u = data.gradient(self.var, qp);
            for i in 0..jacobian.nrows() {
                let grad_phi_i = data.grad_phi(self.var, i, qp);
                for j in 0..jacobian.ncols() {
                    let mut value = T::zero();
                    if jvar == self.var {
                        value += d * data.grad_phi(jvar, j, qp).dot(&grad_phi_i);
                    }
                    if let Some(dd) = derivative {
                        value += dd[qp] * data.phi(jvar, j, qp) * grad_u.dot(&grad_phi_i);
                    }
                    jacobian[(i, j)] += value * jxw;
                }
            }
        }
        Ok(())
    }
}

/// `(σ u, φ)`
#[derive(Debug, Clone)]
pub struct Reaction<T> {
    info: ObjectInfo,
    var: VariableId,
    coefficient: T,
}

impl<T: Real> Reaction<T> {
    pub fn new(request: &ObjectRequest) -> Result<Self, ConfigurationError> {
        let var = request.primary_variable()?;
        Ok(Self {
            info: request.info()?.with_variable(var),
            var,
            coefficient: request.real_or("coefficient", 1.0)?,
        })
    }
}

impl<T: Real> ResidualContributor<T> for Reaction<T> {
    fn accumulate_residual(&mut self, data: &ElementData<T>, mut residual: DVectorViewMut<T>) -> eyre::Result<()> {
        for (qp, &jxw) in data.jxw().iter().enumerate() {
            let u = data.value(self.var, qp);
            for i in 0..residual.nrows() {
                residual[i] += self.coefficient * u * data.phi(self.var, i, qp) * jxw;
            }
        }
        Ok(())
    }
}

impl<T: Real> JacobianContributor<T> for Reaction<T> {
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

/// `-(f, φ)` for a constant source `f`.
#[derive(Debug, Clone)]
pub struct BodyForce<T> {
    info: ObjectInfo,
    var: VariableId,
    value: T,
}

impl<T: Real> BodyForce<T> {
    pub fn new(request: &ObjectRequest) -> Result<Self, ConfigurationError> {
        let var = request.primary_variable()?;
        Ok(Self {
            info: request.info()?.with_variable(var),
            var,
            value: request.real_or("value", 1.0)?,
        })
    }
}

impl<T: Real> ResidualContributor<T> for BodyForce<T> {
    fn accumulate_residual(&mut self, data: &ElementData<T>, mut residual: DVectorViewMut<T>) -> eyre::Result<()> {
        for (qp, &jxw) in data.jxw().iter().enumerate() {
            for i in 0..residual.nrows() {
                residual[i] -= self.value * data.phi(self.var, i, qp) * jxw;
            }
        }
        Ok(())
    }
}

impl<T: Real> JacobianContributor<T> for BodyForce<T> {
    fn accumulate_jacobian(&mut self, _: &ElementData<T>, _: VariableId, _: DMatrixViewMut<T>) -> eyre::Result<()> {
        Ok(())
    }
}

/// `-(c v, φ)` where `v` is another variable.
#[derive(Debug, Clone)]
pub struct CoupledForce<T> {
    info: ObjectInfo,
    var: VariableId,
    coupled: VariableId,
    coefficient: T,
}

impl<T: Real> CoupledForce<T> {
    pub fn new(request: &ObjectRequest) -> Result<Self, ConfigurationError> {
        let var = request.primary_variable()?;
        let coupled = request.coupled("v")?;
        let mut info = request.info()?.with_variable(var);
        if !info.coupled.contains(&coupled) {
            info.coupled.push(coupled);
        }
        Ok(Self {
            info,
            var,
            coupled,
            coefficient: request.real_or("coefficient", 1.0)?,
        })
    }
}

impl<T: Real> ResidualContributor<T> for CoupledForce<T> {
    fn accumulate_residual(&mut self, data: &ElementData<T>, mut residual: DVectorViewMut<T>) -> eyre::Result<()> {
        for (qp, &jxw) in data.jxw().iter().enumerate() {
            let v = data.value(self.coupled, qp);
            for i in 0..residual.nrows() {
                residual[i] -= self.coefficient * v * data.phi(self.var, i, qp) * jxw;
            }
        }
        Ok(())
    }
}

impl<T: Real> JacobianContributor<T> for CoupledForce<T> {
    fn accumulate_jacobian(
        &mut self,
        data: &ElementData<T>,
        jvar: VariableId,
        jacobian: DMatrixViewMut<T>,
    ) -> eyre::Result<()> {
        if jvar == self.coupled {
            add_mass_matrix(data, self.var, jvar, -self.coefficient, jacobian);
        }
        Ok(())
    }
}

/// Backward Euler `((u - u_old) / dt, φ)`.
#[derive(Debug, Clone)]
pub struct TimeDerivative<T> {
    info: ObjectInfo,
    var: VariableId,
    marker: std::marker::PhantomData<T>,
}

impl<T: Real> TimeDerivative<T> {
    pub fn new(request: &ObjectRequest) -> Result<Self, ConfigurationError> {
        let var = request.primary_variable()?;
        Ok(Self {
            info: request.info()?.with_variable(var),
            var,
            marker: Default::default(),
        })
    }
}

impl<T: Real> ResidualContributor<T> for TimeDerivative<T> {
    fn accumulate_residual(&mut self, data: &ElementData<T>, mut residual: DVectorViewMut<T>) -> eyre::Result<()> {
        let dt = data.dt();
        ensure!(dt > T::zero(), "`{}` requires a positive time step", self.info.name);
        for (qp, &jxw) in data.jxw().iter().enumerate() {
            let rate = (data.value(self.var, qp) - data.old_value(self.var, qp)) / dt;
            for i in 0..residual.nrows() {
                residual[i] += rate * data.phi(self.var, i, qp) * jxw;
            }
        }
        Ok(())
    }
}

impl<T: Real> JacobianContributor<T> for TimeDerivative<T> {
    fn accumulate_jacobian(
        &mut self,
        data: &ElementData<T>,
        jvar: VariableId,
        jacobian: DMatrixViewMut<T>,
    ) -> eyre::Result<()> {
        let dt = data.dt();
        ensure!(dt > T::zero(), "`{}` requires a positive time step", self.info.name);
        if jvar == self.var {
            add_mass_matrix(data, self.var, jvar, T::one() / dt, jacobian);
        }
        Ok(())
    }
}

/// `(λ u³, φ)`
#[derive(Debug, Clone)]
pub struct NonlinearReaction<T> {
    info: ObjectInfo,
    var: VariableId,
    lambda: T,
}

impl<T: Real> NonlinearReaction<T> {
    pub fn new(request: &ObjectRequest) -> Result<Self, ConfigurationError> {
        let var = request.primary_variable()?;
        Ok(Self {
            info: request.info()?.with_variable(var),
            var,
            lambda: request.real_or("lambda", 1.0)?,
        })
    }
}

impl<T: Real> ResidualContributor<T> for NonlinearReaction<T> {
    fn accumulate_residual(&mut self, data: &ElementData<T>, mut residual: DVectorViewMut<T>) -> eyre::Result<()> {
        for (qp, &jxw) in data.jxw().iter().enumerate() {
            let u = data.value(self.var, qp);
            for i in 0..residual.nrows() {
                residual[i] += self.lambda * u * u * u * data.phi(self.var, i, qp) * jxw;
            }
        }
        Ok(())
    }
}

impl<T: Real> JacobianContributor<T> for NonlinearReaction<T> {
    fn accumulate_jacobian(
        &mut self,
        data: &ElementData<T>,
        jvar: VariableId,
        mut jacobian: DMatrixViewMut<T>,
    ) -> eyre::Result<()> {
        if jvar != self.var {
            return Ok(());
        }
        let three = T::one() + T::one() + T::one();
        for (qp, &jxw) in data.jxw().iter().enumerate() {
            let u = data.value(self.var, qp);
            let du = three * self.lambda * u * u;
            for i in 0..jacobian.nrows() {
                for j in 0..jacobian.ncols() {
                    jacobian[(i, j)] += du * data.phi(jvar, j, qp) * data.phi(self.var, i, qp) * jxw;
                }
            }
        }
        Ok(())
    }
}

/// Adds `scale * (φ_j, φ_i)` for `φ_i` of `ivar` and `φ_j` of `jvar`.
pub(super) fn add_mass_matrix<T: Real>(
    data: &ElementData<T>,
    ivar: VariableId,
    jvar: VariableId,
    scale: T,
    mut jacobian: DMatrixViewMut<T>,
) {
    for (qp, &jxw) in data.jxw().iter().enumerate() {
        for i in 0..jacobian.nrows() {
            let phi_i = data.phi(ivar, i, qp);
            for j in 0..jacobian.ncols() {
                jacobian[(i, j)] += scale * data.phi(jvar, j, qp) * phi_i * jxw;
            }
        }
    }
}

impl_contribution_object!(Diffusion, Reaction, BodyForce, CoupledForce, TimeDerivative, NonlinearReaction);
