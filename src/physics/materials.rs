use crate::assembly::{ElementData, MaterialProperties};
use crate::error::ConfigurationError;
use crate::factory::{Factory, ObjectRequest};
use crate::objects::{Material, ObjectInfo};
use crate::variables::{SystemKind, VariableId};
use crate::Real;

pub(super) fn register<T: Real>(factory: &mut Factory<T>) {
    factory.materials.register("ConstantMaterial", |r| {
        Ok(Box::new(ConstantMaterial::<T>::new(r)?) as Box<dyn Material<T>>)
    });
    factory.materials.register("LinearMaterial", |r| {
        Ok(Box::new(LinearMaterial::<T>::new(r)?) as Box<dyn Material<T>>)
    });
}

/// A property with the same value everywhere.
#[derive(Debug, Clone)]
pub struct ConstantMaterial<T> {
    info: ObjectInfo,
    property: String,
    value: T,
}

impl<T: Real> ConstantMaterial<T> {
    pub fn new(request: &ObjectRequest) -> Result<Self, ConfigurationError> {
        Ok(Self {
            info: request.info()?,
            property: request
                .parameters
                .text(request.name, "property")?
                .to_string(),
            value: request.real("value")?,
        })
    }
}

impl<T: Real> Material<T> for ConstantMaterial<T> {
    fn compute_properties(&mut self, data: &ElementData<T>, properties: &mut MaterialProperties<T>) -> eyre::Result<()> {
        properties
            .declare(&self.property, data.n_qp())
            .fill(self.value);
        Ok(())
    }
}

/// `a + b v` for a variable `v`, with its derivative with respect to `v` when `v` is a
/// primary variable.
#[derive(Debug, Clone)]
pub struct LinearMaterial<T> {
    info: ObjectInfo,
    property: String,
    coupled: VariableId,
    a: T,
    b: T,
}

impl<T: Real> LinearMaterial<T> {
    pub fn new(request: &ObjectRequest) -> Result<Self, ConfigurationError> {
        let coupled = request.coupled("v")?;
        let mut info = request.info()?;
        if !info.coupled.contains(&coupled) {
            info.coupled.push(coupled);
        }
        Ok(Self {
            info,
            property: request
                .parameters
                .text(request.name, "property")?
                .to_string(),
            coupled,
            a: request.real_or("a", 0.0)?,
            b: request.real_or("b", 1.0)?,
        })
    }
}

impl<T: Real> Material<T> for LinearMaterial<T> {
    fn compute_properties(&mut self, data: &ElementData<T>, properties: &mut MaterialProperties<T>) -> eyre::Result<()> {
        let n_qp = data.n_qp();
        for (qp, value) in properties
            .declare(&self.property, n_qp)
            .iter_mut()
            .enumerate()
        {
            *value = self.a + self.b * data.value(self.coupled, qp);
        }
        if self.coupled.system == SystemKind::Primary {
            properties
                .declare_derivative(&self.property, self.coupled, n_qp)
                .fill(self.b);
        }
        Ok(())
    }
}

impl_contribution_object!(ConstantMaterial, LinearMaterial);
