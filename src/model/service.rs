// ABOUTME: Desired service definitions and the closed set of service products.
// ABOUTME: Definitions are immutable values built from shipwright.yml.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::types::ServiceName;

/// Cloud provider hosting a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    Gcp,
    Aws,
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudProvider::Gcp => f.write_str("gcp"),
            CloudProvider::Aws => f.write_str("aws"),
        }
    }
}

/// The product a service is released to.
///
/// This is a closed set: every product has exactly one provider workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceProduct {
    GcpCloudRun,
    AwsEcsFargate,
}

impl ServiceProduct {
    pub fn cloud_provider(&self) -> CloudProvider {
        match self {
            ServiceProduct::GcpCloudRun => CloudProvider::Gcp,
            ServiceProduct::AwsEcsFargate => CloudProvider::Aws,
        }
    }

    /// Identifier used in config files and workflow script names.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceProduct::GcpCloudRun => "gcp-cloud-run",
            ServiceProduct::AwsEcsFargate => "aws-ecs-fargate",
        }
    }

    /// Short type name used when referring to a service in output.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ServiceProduct::GcpCloudRun => "CloudRun",
            ServiceProduct::AwsEcsFargate => "EcsFargate",
        }
    }
}

impl fmt::Display for ServiceProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_build_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_dockerfile() -> String {
    "Dockerfile".to_string()
}

/// Desired specification of one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub name: ServiceName,

    pub product: ServiceProduct,

    /// Source directory, relative to the project root.
    #[serde(default = "default_build_directory")]
    pub build_directory: PathBuf,

    /// Build file, relative to `build_directory`.
    #[serde(default = "default_dockerfile")]
    pub dockerfile: String,

    /// Provider-specific arguments passed through to the workflow.
    #[serde(default)]
    pub args: BTreeMap<String, Value>,
}

impl ServiceDefinition {
    pub fn new(name: ServiceName, product: ServiceProduct) -> Self {
        Self {
            name,
            product,
            build_directory: default_build_directory(),
            dockerfile: default_dockerfile(),
            args: BTreeMap::new(),
        }
    }

    pub fn with_build_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.build_directory = dir.into();
        self
    }

    pub fn with_dockerfile(mut self, dockerfile: impl Into<String>) -> Self {
        self.dockerfile = dockerfile.into();
        self
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// The inputs snapshot persisted with the service and diffed at plan time.
    pub fn inputs(&self) -> Value {
        let mut map = Map::new();
        map.insert(
            "build_directory".to_string(),
            Value::String(self.build_directory.display().to_string()),
        );
        map.insert(
            "dockerfile".to_string(),
            Value::String(self.dockerfile.clone()),
        );
        for (key, value) in &self.args {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }

    /// Human-readable reference, e.g. `CloudRun(api)`.
    pub fn service_ref(&self) -> String {
        format!("{}({})", self.product.kind_name(), self.name)
    }
}
