//! Thread-parallel residual and Jacobian assembly for coupled multiphysics problems.
//!
//! A [`Problem`](problem::Problem) owns the discretization, the variables and per-thread
//! [`Warehouse`](warehouse::Warehouse)s of physics objects. Every residual or Jacobian
//! evaluation first refreshes auxiliary fields in dependency order, then runs the element loop
//! on a dedicated thread pool, and finally enforces essential boundary conditions serially.

pub mod assembly;
pub mod config;
pub mod connectivity;
pub mod element;
pub mod error;
pub mod factory;
pub mod mesh;
pub mod objects;
pub mod parameters;
pub mod physics;
pub mod problem;
pub mod quadrature;
pub mod resolver;
pub mod scheduler;
pub mod solver;
pub mod space;
pub mod variables;
pub mod warehouse;

pub mod optimize {
    pub use multiphys_optimize::*;
}

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

pub use multiphys_optimize::Real;

/// Label attached to every mesh element.
pub type SubdomainId = u32;

/// Label attached to element sides on the mesh boundary.
pub type BoundaryId = u32;
