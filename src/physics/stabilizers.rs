use crate::assembly::ElementData;
use crate::error::ConfigurationError;
use crate::factory::{Factory, ObjectRequest};
use crate::objects::{JacobianContributor, Kernel, ObjectInfo, ResidualContributor};
use crate::variables::VariableId;
use crate::Real;
use nalgebra::{DMatrixViewMut, DVectorViewMut};

pub(super) fn register<T: Real>(factory: &mut Factory<T>) {
    factory.stabilizers.register("ArtificialDiffusion", |r| {
        Ok(Box::new(ArtificialDiffusion::<T>::new(r)?) as Box<dyn Kernel<T>>)
    });
}

/// Upwind-type isotropic diffusion `(ε ∇u, ∇φ)` with `ε = |a| h / 2`, where `h` is the
/// element size and `|a|` the given `velocity` magnitude.
#[derive(Debug, Clone)]
pub struct ArtificialDiffusion<T> {
    info: ObjectInfo,
    var: VariableId,
    velocity: T,
}

impl<T: Real> ArtificialDiffusion<T> {
    pub fn new(request: &ObjectRequest) -> Result<Self, ConfigurationError> {
        let var = request.primary_variable()?;
        let velocity: T = request.real("velocity")?;
        Ok(Self {
            info: request.info()?.with_variable(var),
            var,
            velocity: velocity.abs(),
        })
    }

    fn epsilon(&self, data: &ElementData<T>) -> T {
        let volume = data.jxw().iter().fold(T::zero(), |sum, &w| sum + w);
        let dim: T = nalgebra::convert(data.dim().max(1) as f64);
        let h = volume.powf(T::one() / dim);
        self.velocity * h / (T::one() + T::one())
    }
}

impl<T: Real> ResidualContributor<T> for ArtificialDiffusion<T> {
    fn accumulate_residual(&mut self, data: &ElementData<T>, mut residual: DVectorViewMut<T>) -> eyre::Result<()> {
        let epsilon = self.epsilon(data);
        for (qp, &jxw) in data.jxw().iter().enumerate() {
            let grad_u = data.gradient(self.var, qp);
            for i in 0..residual.nrows() {
                residual[i] += epsilon * grad_u.dot(&data.grad_phi(self.var, i, qp)) * jxw;
            }
        }
        Ok(())
    }
}

impl<T: Real> JacobianContributor<T> for ArtificialDiffusion<T> {
    fn accumulate_jacobian(
        &mut self,
        data: &ElementData<T>,
        jvar: VariableId,
        mut jacobian: DMatrixViewMut<T>,
    ) -> eyre::Result<()> {
        if jvar != self.var {
            return Ok(());
        }
        let epsilon = self.epsilon(data);
        for (qp, &jxw) in data.jxw().iter().enumerate() {
            for i in 0..jacobian.nrows() {
                let grad_phi_i = data.grad_phi(self.var, i, qp);
                for j in 0..jacobian.ncols() {
                    jacobian[(i, j)] += epsilon * data.grad_phi(jvar, j, qp).dot(&grad_phi_i) * jxw;
                }
            }
        }
        Ok(())
    }
}

impl_contribution_object!(ArtificialDiffusion);
