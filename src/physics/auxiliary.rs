use crate::assembly::ElementData;
use crate::error::ConfigurationError;
use crate::factory::{Factory, ObjectRequest};
use crate::objects::{AuxKernel, ObjectInfo};
use crate::variables::VariableId;
use crate::Real;

pub(super) fn register<T: Real>(factory: &mut Factory<T>) {
    let aux = &mut factory.aux_kernels;
    aux.register("ConstantAux", |r| Ok(Box::new(ConstantAux::<T>::new(r)?) as Box<dyn AuxKernel<T>>));
    aux.register("ScaledCoupledAux", |r| {
        Ok(Box::new(ScaledCoupledAux::<T>::new(r)?) as Box<dyn AuxKernel<T>>)
    });
    aux.register("SumAux", |r| Ok(Box::new(SumAux::<T>::new(r)?) as Box<dyn AuxKernel<T>>));
    aux.register("MaterialPropertyAux", |r| {
        Ok(Box::new(MaterialPropertyAux::<T>::new(r)?) as Box<dyn AuxKernel<T>>)
    });
}

fn aux_info(request: &ObjectRequest, coupled: &[VariableId]) -> Result<ObjectInfo, ConfigurationError> {
    let var = request.aux_variable()?;
    let mut info = request.info()?.with_variable(var);
    for &v in coupled {
        if !info.coupled.contains(&v) {
            info.coupled.push(v);
        }
    }
    Ok(info)
}

#[derive(Debug, Clone)]
pub struct ConstantAux<T> {
    info: ObjectInfo,
    value: T,
}

impl<T: Real> ConstantAux<T> {
    pub fn new(request: &ObjectRequest) -> Result<Self, ConfigurationError> {
        Ok(Self {
            info: aux_info(request, &[])?,
            value: request.real_or("value", 0.0)?,
        })
    }
}

impl<T: Real> AuxKernel<T> for ConstantAux<T> {
    fn compute_value(&mut self, _data: &ElementData<T>, _qp: usize) -> eyre::Result<T> {
        Ok(self.value)
    }
}

/// `factor * v`
#[derive(Debug, Clone)]
pub struct ScaledCoupledAux<T> {
    info: ObjectInfo,
    coupled: VariableId,
    factor: T,
}

impl<T: Real> ScaledCoupledAux<T> {
    pub fn new(request: &ObjectRequest) -> Result<Self, ConfigurationError> {
        let coupled = request.coupled("v")?;
        Ok(Self {
            info: aux_info(request, &[coupled])?,
            coupled,
            factor: request.real_or("factor", 1.0)?,
        })
    }
}

impl<T: Real> AuxKernel<T> for ScaledCoupledAux<T> {
    fn compute_value(&mut self, data: &ElementData<T>, qp: usize) -> eyre::Result<T> {
        Ok(self.factor * data.value(self.coupled, qp))
    }
}

/// Sum of the variables listed in `values`.
#[derive(Debug, Clone)]
pub struct SumAux<T> {
    info: ObjectInfo,
    summands: Vec<VariableId>,
    marker: std::marker::PhantomData<T>,
}

impl<T: Real> SumAux<T> {
    pub fn new(request: &ObjectRequest) -> Result<Self, ConfigurationError> {
        let summands = request.coupled_list("values")?;
        if summands.is_empty() {
            return Err(ConfigurationError::MissingParameter {
                object: request.name.to_string(),
                parameter: "values".to_string(),
            });
        }
        Ok(Self {
            info: aux_info(request, &summands)?,
            summands,
            marker: Default::default(),
        })
    }
}

impl<T: Real> AuxKernel<T> for SumAux<T> {
    fn compute_value(&mut self, data: &ElementData<T>, qp: usize) -> eyre::Result<T> {
        Ok(self
            .summands
            .iter()
            .fold(T::zero(), |sum, &v| sum + data.value(v, qp)))
    }
}

/// Copies a material property into an elemental variable.
#[derive(Debug, Clone)]
pub struct MaterialPropertyAux<T> {
    info: ObjectInfo,
    property: String,
    marker: std::marker::PhantomData<T>,
}

impl<T: Real> MaterialPropertyAux<T> {
    pub fn new(request: &ObjectRequest) -> Result<Self, ConfigurationError> {
        let info = aux_info(request, &[])?;
        let var = request.aux_variable()?;
        if request.variables.get(var).fe_type.is_nodal() {
            return Err(request.invalid("variable", "material properties are only available on elements"));
        }
        Ok(Self {
            info,
            property: request
                .parameters
                .text(request.name, "property")?
                .to_string(),
            marker: Default::default(),
        })
    }
}

impl<T: Real> AuxKernel<T> for MaterialPropertyAux<T> {
    fn compute_value(&mut self, data: &ElementData<T>, qp: usize) -> eyre::Result<T> {
        Ok(data.material(&self.property)?[qp])
    }
}

impl_contribution_object!(ConstantAux, ScaledCoupledAux, SumAux, MaterialPropertyAux);
