use crate::assembly::ElementData;
use crate::error::ConfigurationError;
use crate::factory::{Factory, ObjectRequest};
use crate::objects::{Damper, ObjectInfo};
use crate::variables::VariableId;
use crate::Real;

pub(super) fn register<T: Real>(factory: &mut Factory<T>) {
    factory.dampers.register("ConstantDamper", |r| {
        Ok(Box::new(ConstantDamper::<T>::new(r)?) as Box<dyn Damper<T>>)
    });
    factory.dampers.register("BoundingValueDamper", |r| {
        Ok(Box::new(BoundingValueDamper::<T>::new(r)?) as Box<dyn Damper<T>>)
    });
}

fn damping_factor<T: Real>(request: &ObjectRequest, key: &str, default: f64) -> Result<T, ConfigurationError> {
    let value = request.parameters.real_or(request.name, key, default)?;
    if !(value > 0.0 && value <= 1.0) {
        return Err(request.invalid(key, format!("{} is not in (0, 1]", value)));
    }
    Ok(nalgebra::convert(value))
}

/// Scales every Newton step by the same factor.
#[derive(Debug, Clone)]
pub struct ConstantDamper<T> {
    info: ObjectInfo,
    damping: T,
}

impl<T: Real> ConstantDamper<T> {
    pub fn new(request: &ObjectRequest) -> Result<Self, ConfigurationError> {
        let var = request.primary_variable()?;
        Ok(Self {
            info: request.info()?.with_variable(var),
            damping: damping_factor(request, "damping", 1.0)?,
        })
    }
}

impl<T: Real> Damper<T> for ConstantDamper<T> {
    fn compute_damping(&mut self, _data: &ElementData<T>, _increment: &[T]) -> eyre::Result<T> {
        Ok(self.damping)
    }
}

/// Shortens the step so that the variable stays within `[min_value, max_value]` at every
/// quadrature point, down to `min_damping`.
#[derive(Debug, Clone)]
pub struct BoundingValueDamper<T> {
    info: ObjectInfo,
    var: VariableId,
    min_value: T,
    max_value: T,
    min_damping: T,
}

impl<T: Real> BoundingValueDamper<T> {
    pub fn new(request: &ObjectRequest) -> Result<Self, ConfigurationError> {
        let var = request.primary_variable()?;
        let min_value: T = request.real_or("min_value", f64::MIN)?;
        let max_value: T = request.real_or("max_value", f64::MAX)?;
        if min_value > max_value {
            return Err(request.invalid("max_value", "must not be smaller than `min_value`"));
        }
        Ok(Self {
            info: request.info()?.with_variable(var),
            var,
            min_value,
            max_value,
            min_damping: damping_factor(request, "min_damping", 1e-3)?,
        })
    }
}

impl<T: Real> Damper<T> for BoundingValueDamper<T> {
    fn compute_damping(&mut self, data: &ElementData<T>, increment: &[T]) -> eyre::Result<T> {
        let mut damping = T::one();
        for (qp, &step) in increment.iter().enumerate() {
            let u = data.value(self.var, qp);
            let updated = u + step;
            let factor = if updated > self.max_value {
                (self.max_value - u) / step
            } else if updated < self.min_value {
                (self.min_value - u) / step
            } else {
                T::one()
            };
            damping = damping.min(factor.max(self.min_damping));
        }
        Ok(damping)
    }
}

impl_contribution_object!(ConstantDamper, BoundingValueDamper);
