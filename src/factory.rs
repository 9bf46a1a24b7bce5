//! Registries mapping object kind names to constructors.
//!
//! A [`Factory`] is owned by a [`Problem`](crate::problem::Problem). Registering a new
//! kind only affects that problem.
use crate::error::ConfigurationError;
use crate::objects::{
    AuxKernel, Damper, ExecuteOn, IntegratedBoundaryCondition, Kernel, Material, NodalBoundaryCondition, ObjectInfo,
};
use crate::parameters::Parameters;
use crate::variables::{SystemKind, Variable, VariableId, VariableRegistry};
use crate::Real;
use std::collections::BTreeMap;

/// Everything a constructor gets to see.
#[derive(Debug, Copy, Clone)]
pub struct ObjectRequest<'a> {
    pub kind: &'a str,
    pub name: &'a str,
    pub restriction: &'a [u32],
    pub parameters: &'a Parameters,
    pub variables: &'a VariableRegistry,
}

impl<'a> ObjectRequest<'a> {
    /// Resolves the variable named by the text parameter `key`.
    pub fn variable_parameter(&self, key: &str) -> Result<&'a Variable, ConfigurationError> {
        let name = self.parameters.text(self.name, key)?;
        let id = self.variables.resolve(self.name, name)?;
        Ok(self.variables.get(id))
    }

    /// The primary variable the object acts on, given by the `variable` parameter.
    pub fn primary_variable(&self) -> Result<VariableId, ConfigurationError> {
        self.variable_in(SystemKind::Primary)
    }

    /// The auxiliary variable the object computes, given by the `variable` parameter.
    pub fn aux_variable(&self) -> Result<VariableId, ConfigurationError> {
        self.variable_in(SystemKind::Auxiliary)
    }

    fn variable_in(&self, system: SystemKind) -> Result<VariableId, ConfigurationError> {
        let variable = self.variable_parameter("variable")?;
        if variable.id.system != system {
            return Err(ConfigurationError::WrongSystem {
                object: self.name.to_string(),
                variable: variable.name.clone(),
                expected: match system {
                    SystemKind::Primary => "primary",
                    SystemKind::Auxiliary => "auxiliary",
                },
            });
        }
        Ok(variable.id)
    }

    /// Resolves a single coupled variable named by the text parameter `key`.
    pub fn coupled(&self, key: &str) -> Result<VariableId, ConfigurationError> {
        self.variable_parameter(key).map(|variable| variable.id)
    }

    /// Resolves every name in the text list parameter `key`. A missing parameter is an
    /// empty list.
    pub fn coupled_list(&self, key: &str) -> Result<Vec<VariableId>, ConfigurationError> {
        self.parameters
            .text_list(self.name, key)?
            .iter()
            .map(|name| self.variables.resolve(self.name, name))
            .collect()
    }

    pub fn real<T: Real>(&self, key: &str) -> Result<T, ConfigurationError> {
        self.parameters.real(self.name, key).map(nalgebra::convert)
    }

    pub fn real_or<T: Real>(&self, key: &str, default: f64) -> Result<T, ConfigurationError> {
        self.parameters
            .real_or(self.name, key, default)
            .map(nalgebra::convert)
    }

    pub fn invalid(&self, parameter: &str, reason: impl Into<String>) -> ConfigurationError {
        ConfigurationError::InvalidParameter {
            object: self.name.to_string(),
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }

    /// Metadata common to all objects: name, restriction, activation window and
    /// execution points.
    ///
    /// Recognized parameters are `start_time`, `end_time` and `execute_on`. Variables named
    /// in `coupled_variables` are added to the coupled list.
    pub fn info(&self) -> Result<ObjectInfo, ConfigurationError> {
        let start_time = self.parameters.real_or(self.name, "start_time", f64::NEG_INFINITY)?;
        let end_time = self.parameters.real_or(self.name, "end_time", f64::INFINITY)?;
        if start_time >= end_time {
            return Err(self.invalid("end_time", "the activation window is empty"));
        }
        let mut info = ObjectInfo::new(self.name)
            .with_restriction(self.restriction)
            .with_active_window(start_time, end_time)
            .with_coupled(self.coupled_list("coupled_variables")?);

        let execute_on = self.parameters.text_list(self.name, "execute_on")?;
        if !execute_on.is_empty() {
            let points = execute_on
                .iter()
                .map(|text| ExecuteOn::parse(self.name, text))
                .collect::<Result<Vec<_>, _>>()?;
            info = info.with_execute_on(points);
        }
        Ok(info)
    }
}

type Constructor<O> = Box<dyn Fn(&ObjectRequest) -> eyre::Result<Box<O>> + Send + Sync>;

/// Constructors for one category of objects, keyed by kind.
pub struct Registry<O: ?Sized> {
    category: &'static str,
    constructors: BTreeMap<String, Constructor<O>>,
}

impl<O: ?Sized> Registry<O> {
    pub fn new(category: &'static str) -> Self {
        Self {
            category,
            constructors: BTreeMap::new(),
        }
    }

    /// Registers `constructor` under `kind`, replacing any previous constructor of that kind.
    pub fn register<F>(&mut self, kind: &str, constructor: F)
    where
        F: Fn(&ObjectRequest) -> eyre::Result<Box<O>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(kind.to_string(), Box::new(constructor));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn create(&self, request: &ObjectRequest) -> eyre::Result<Box<O>> {
        let constructor = self
            .constructors
            .get(request.kind)
            .ok_or_else(|| ConfigurationError::UnknownObjectKind {
                category: self.category,
                kind: request.kind.to_string(),
            })?;
        constructor(request)
    }
}

/// All constructor registries of a problem.
pub struct Factory<T: Real> {
    pub kernels: Registry<dyn Kernel<T>>,
    pub integrated_bcs: Registry<dyn IntegratedBoundaryCondition<T>>,
    pub nodal_bcs: Registry<dyn NodalBoundaryCondition<T>>,
    pub materials: Registry<dyn Material<T>>,
    pub aux_kernels: Registry<dyn AuxKernel<T>>,
    pub dampers: Registry<dyn Damper<T>>,
    pub stabilizers: Registry<dyn Kernel<T>>,
}

impl<T: Real> Factory<T> {
    /// A factory without any registered kinds.
    pub fn empty() -> Self {
        Self {
            kernels: Registry::new("kernel"),
            integrated_bcs: Registry::new("boundary condition"),
            nodal_bcs: Registry::new("boundary condition"),
            materials: Registry::new("material"),
            aux_kernels: Registry::new("auxiliary kernel"),
            dampers: Registry::new("damper"),
            stabilizers: Registry::new("stabilizer"),
        }
    }

    /// A factory with all kinds from [`physics`](crate::physics) registered.
    pub fn with_builtin() -> Self {
        let mut factory = Self::empty();
        crate::physics::register_builtin(&mut factory);
        factory
    }
}

impl<T: Real> Default for Factory<T> {
    fn default() -> Self {
        Self::with_builtin()
    }
}
