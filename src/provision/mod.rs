//! Execution environments for talk daemons.
//!
//! A [`Provisioner`] acquires an [`Environment`] (host, port, login, key)
//! for a talk and releases it when the talk is done with it.

mod container;
mod environment;
mod error;
mod immortal;
mod instance;
mod ports;
mod static_host;

#[cfg(test)]
mod tests;

pub use container::{ContainerProvisioner, container_name};
pub use environment::Environment;
pub use error::{ProvisionError, ProvisionResult};
pub use immortal::Immortal;
pub use instance::{InstanceApi, InstanceHandle, InstanceProvisioner, Reachability};
pub use ports::{Provisioner, ProvisionerHandle};
pub use static_host::StaticHost;

#[cfg(test)]
pub(crate) use instance::MockInstanceApi;
