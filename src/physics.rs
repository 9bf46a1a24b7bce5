//! Built-in physics objects.
//!
//! Every object is a plain struct implementing the capabilities it needs. Constructors
//! read their parameters from an [`ObjectRequest`](crate::factory::ObjectRequest) and are
//! registered with a [`Factory`] by [`register_builtin`].
use crate::factory::Factory;
use crate::Real;

/// Implements `ContributionObject` and the default `SetupHook` for structs with an
/// `info: ObjectInfo` field.
macro_rules! impl_contribution_object {
    ($($object:ident),+ $(,)?) => {
        $(
            impl<T: crate::Real> crate::objects::ContributionObject for $object<T> {
                fn info(&self) -> &crate::objects::ObjectInfo {
                    &self.info
                }
            }

            impl<T: crate::Real> crate::objects::SetupHook for $object<T> {}
        )+
    };
}

mod auxiliary;
mod boundary;
mod dampers;
mod kernels;
mod materials;
mod stabilizers;

pub use auxiliary::*;
pub use boundary::*;
pub use dampers::*;
pub use kernels::*;
pub use materials::*;
pub use stabilizers::*;

pub fn register_builtin<T: Real>(factory: &mut Factory<T>) {
    kernels::register(factory);
    boundary::register(factory);
    materials::register(factory);
    auxiliary::register(factory);
    dampers::register(factory);
    stabilizers::register(factory);
}
