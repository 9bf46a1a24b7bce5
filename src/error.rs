//! Errors detected while a problem is being configured.
//!
//! Configuration errors are raised through [`eyre`] like every other error in the crate,
//! and can be recovered with `report.downcast_ref::<ConfigurationError>()`.
use crate::{BoundaryId, SubdomainId};
use itertools::Itertools;
use thiserror::Error;

/// A block that could not run, together with the prerequisites that never ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StuckBlock {
    pub name: String,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("duplicate name `{name}`")]
    DuplicateName { name: String },
    #[error("`{object}` refers to unknown variable `{variable}`")]
    UnresolvedVariable { object: String, variable: String },
    #[error("unknown {category} kind `{kind}`")]
    UnknownObjectKind { category: &'static str, kind: String },
    #[error("`{object}` is restricted to subdomain {subdomain}, which does not exist in the mesh")]
    MissingSubdomain { object: String, subdomain: SubdomainId },
    #[error("`{object}` is restricted to boundary {boundary}, which does not exist in the mesh")]
    MissingBoundary { object: String, boundary: BoundaryId },
    #[error("no kernel acts on variable `{variable}` in subdomain {subdomain}")]
    MissingKernelCoverage { subdomain: SubdomainId, variable: String },
    #[error("unsatisfiable prerequisites: {}", describe_stuck(.stuck))]
    UnsatisfiablePrerequisites { stuck: Vec<StuckBlock> },
    #[error("`{object}` closes a dependency cycle through {}", .cycle.join(" -> "))]
    CyclicDependency { object: String, cycle: Vec<String> },
    #[error("`{object}` is missing required parameter `{parameter}`")]
    MissingParameter { object: String, parameter: String },
    #[error("parameter `{parameter}` of `{object}` is invalid: {reason}")]
    InvalidParameter {
        object: String,
        parameter: String,
        reason: String,
    },
    #[error("variable `{variable}` used by `{object}` must be a {expected} variable")]
    WrongSystem {
        object: String,
        variable: String,
        expected: &'static str,
    },
    #[error("nodal `{object}` cannot read elemental variable `{variable}`")]
    ElementalCoupling { object: String, variable: String },
    #[error("the problem has already been initialized")]
    AlreadyInitialized,
    #[error("the problem has not been initialized")]
    NotInitialized,
}

fn describe_stuck(stuck: &[StuckBlock]) -> String {
    stuck
        .iter()
        .map(|block| format!("`{}` waits for [{}]", block.name, block.missing.join(", ")))
        .join("; ")
}
