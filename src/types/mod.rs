// ABOUTME: Type-safe identifiers and validated domain names.
// ABOUTME: Names are checked once at construction so the core never re-validates.

mod id;
mod name;

pub use id::{DeploymentId, LockId};
pub use name::{EnvironmentName, NameError, ServiceName};
