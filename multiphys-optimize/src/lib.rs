use nalgebra::RealField;

/// Calculus helper traits and numerical differentiation
pub mod calculus;
/// Newton's method with pluggable line search and damping
pub mod newton;

/// Scalar type used throughout the solver crates.
pub trait Real: RealField + Copy {}

impl<T> Real for T where T: RealField + Copy {}

/// Error type returned by user-supplied callbacks.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;
