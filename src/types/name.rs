// ABOUTME: DNS-compatible service and environment name validation.
// ABOUTME: Both follow RFC 1123 label rules so they are safe as path and lock keys.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

const MAX_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("{0} name cannot be empty")]
    Empty(&'static str),

    #[error("{0} name exceeds maximum length of 63 characters")]
    TooLong(&'static str),

    #[error("{0} name cannot start with a hyphen")]
    StartsWithHyphen(&'static str),

    #[error("{0} name cannot end with a hyphen")]
    EndsWithHyphen(&'static str),

    #[error("{0} name must be lowercase")]
    NotLowercase(&'static str),

    #[error("invalid character in {0} name: '{1}'")]
    InvalidChar(&'static str, char),
}

fn validate(kind: &'static str, value: &str) -> Result<(), NameError> {
    if value.is_empty() {
        return Err(NameError::Empty(kind));
    }
    if value.len() > MAX_LEN {
        return Err(NameError::TooLong(kind));
    }
    if value.starts_with('-') {
        return Err(NameError::StartsWithHyphen(kind));
    }
    if value.ends_with('-') {
        return Err(NameError::EndsWithHyphen(kind));
    }
    for c in value.chars() {
        if c.is_ascii_uppercase() {
            return Err(NameError::NotLowercase(kind));
        }
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
            return Err(NameError::InvalidChar(kind, c));
        }
    }
    Ok(())
}

macro_rules! label_type {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: &str) -> Result<Self, NameError> {
                validate($kind, value)?;
                Ok(Self(value.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = NameError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                self.0.serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::new(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

label_type!(
    /// Name of a deployable service, unique within an environment.
    ServiceName,
    "service"
);

label_type!(
    /// Name of a deployment target such as `staging` or `prod`.
    EnvironmentName,
    "environment"
);
