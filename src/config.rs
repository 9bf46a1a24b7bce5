//! Problem-wide settings.
use crate::optimize::newton::NewtonSettings;
use eyre::{ensure, WrapErr};
use serde::{Deserialize, Serialize};

/// Line search used by [`Problem::solve`](crate::problem::Problem::solve).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSearchKind {
    None,
    Backtracking,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProblemConfig {
    /// Number of threads assembling in parallel.
    pub num_threads: usize,
    pub newton: NewtonSettings<f64>,
    pub line_search: LineSearchKind,
    /// Require every subdomain to carry a kernel for every primary variable defined on it.
    pub check_kernel_coverage: bool,
}

impl Default for ProblemConfig {
    fn default() -> Self {
        Self {
            num_threads: 1,
            newton: NewtonSettings::default(),
            line_search: LineSearchKind::None,
            check_kernel_coverage: true,
        }
    }
}

impl ProblemConfig {
    pub fn from_json_str(json: &str) -> eyre::Result<Self> {
        let config: Self = serde_json::from_str(json).wrap_err("failed to parse problem configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn validate(&self) -> eyre::Result<()> {
        ensure!(self.num_threads > 0, "number of threads must be positive");
        ensure!(
            self.newton.abs_tolerance >= 0.0 && self.newton.rel_tolerance >= 0.0,
            "Newton tolerances must be non-negative"
        );
        ensure!(
            self.newton.abs_tolerance > 0.0 || self.newton.rel_tolerance > 0.0,
            "at least one Newton tolerance must be positive"
        );
        Ok(())
    }
}
