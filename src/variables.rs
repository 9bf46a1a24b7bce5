//! Field variables and their registry.
use crate::error::ConfigurationError;
use crate::SubdomainId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub mod dof_map;

pub use dof_map::DofMap;

/// The system a variable belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SystemKind {
    /// Unknowns of the nonlinear system.
    Primary,
    /// Explicitly computed fields, never part of the Jacobian.
    Auxiliary,
}

impl fmt::Display for SystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Auxiliary => write!(f, "auxiliary"),
        }
    }
}

/// Discretization of a variable.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeType {
    /// Continuous, one degree of freedom per mesh node.
    FirstLagrange,
    /// Piecewise constant, one degree of freedom per element.
    ConstantMonomial,
}

impl FeType {
    pub fn is_nodal(&self) -> bool {
        matches!(self, Self::FirstLagrange)
    }
}

/// Identifies a variable within its system.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VariableId {
    pub system: SystemKind,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub id: VariableId,
    pub fe_type: FeType,
    /// Subdomains the variable lives on. `None` means everywhere.
    pub restriction: Option<BTreeSet<SubdomainId>>,
}

impl Variable {
    pub fn is_defined_on(&self, subdomain: SubdomainId) -> bool {
        self.restriction
            .as_ref()
            .map(|subdomains| subdomains.contains(&subdomain))
            .unwrap_or(true)
    }
}

/// All primary and auxiliary variables of a problem.
#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    primary: Vec<Variable>,
    auxiliary: Vec<Variable>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable. Names are unique across both systems.
    pub fn add(
        &mut self,
        name: &str,
        system: SystemKind,
        fe_type: FeType,
        restriction: Option<BTreeSet<SubdomainId>>,
    ) -> Result<VariableId, ConfigurationError> {
        if self.find(name).is_some() {
            return Err(ConfigurationError::DuplicateName { name: name.to_string() });
        }
        let variables = match system {
            SystemKind::Primary => &mut self.primary,
            SystemKind::Auxiliary => &mut self.auxiliary,
        };
        let id = VariableId {
            system,
            index: variables.len(),
        };
        variables.push(Variable {
            name: name.to_string(),
            id,
            fe_type,
            restriction,
        });
        Ok(id)
    }

    pub fn find(&self, name: &str) -> Option<&Variable> {
        self.primary
            .iter()
            .chain(&self.auxiliary)
            .find(|variable| variable.name == name)
    }

    /// Resolves a variable name on behalf of `object`.
    pub fn resolve(&self, object: &str, name: &str) -> Result<VariableId, ConfigurationError> {
        self.find(name)
            .map(|variable| variable.id)
            .ok_or_else(|| ConfigurationError::UnresolvedVariable {
                object: object.to_string(),
                variable: name.to_string(),
            })
    }

    pub fn get(&self, id: VariableId) -> &Variable {
        match id.system {
            SystemKind::Primary => &self.primary[id.index],
            SystemKind::Auxiliary => &self.auxiliary[id.index],
        }
    }

    pub fn system(&self, system: SystemKind) -> &[Variable] {
        match system {
            SystemKind::Primary => &self.primary,
            SystemKind::Auxiliary => &self.auxiliary,
        }
    }

    pub fn name(&self, id: VariableId) -> &str {
        &self.get(id).name
    }
}
