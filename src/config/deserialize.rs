// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Rejects empty project names, empty service lists and duplicate service names.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::HashSet;

use crate::model::ServiceDefinition;

pub fn deserialize_project<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    if s.trim().is_empty() {
        return Err(serde::de::Error::custom("project cannot be empty"));
    }
    Ok(s)
}

pub fn deserialize_services<'de, D>(
    deserializer: D,
) -> Result<NonEmpty<ServiceDefinition>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let services: Vec<ServiceDefinition> = Vec::deserialize(deserializer)?;

    let mut seen = HashSet::new();
    for service in &services {
        if !seen.insert(&service.name) {
            return Err(serde::de::Error::custom(format!(
                "duplicate service name: {}",
                service.name
            )));
        }
    }

    NonEmpty::from_vec(services)
        .ok_or_else(|| serde::de::Error::custom("at least one service is required"))
}
