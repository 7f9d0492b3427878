// ABOUTME: Domain records shared by planning, locking and execution.
// ABOUTME: Desired definitions, persisted service/environment state, status enums.

mod environment;
mod service;
mod state;

pub use environment::{
    AwsEnvironmentConfig, EnvironmentState, EnvironmentStatus, GcpEnvironmentConfig,
};
pub use service::{CloudProvider, ServiceDefinition, ServiceProduct};
pub use state::{ProviderOutputs, ReleaseKind, ServiceState, ServiceStatus};
