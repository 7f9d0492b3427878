// ABOUTME: Integration tests for validated names and typed identifiers.
// ABOUTME: Property tests cover the DNS label rules shared by services and environments.

use proptest::prelude::*;
use shipwright::types::*;

mod name_tests {
    use super::*;

    #[test]
    fn accepts_simple_labels() {
        assert_eq!(ServiceName::new("api").unwrap().as_str(), "api");
        assert_eq!(EnvironmentName::new("prod-eu1").unwrap().as_str(), "prod-eu1");
    }

    #[test]
    fn errors_name_the_kind() {
        let err = EnvironmentName::new("").unwrap_err();
        assert_eq!(err.to_string(), "environment name cannot be empty");
        let err = ServiceName::new("Api").unwrap_err();
        assert_eq!(err, NameError::NotLowercase("service"));
    }

    #[test]
    fn serde_validates_on_the_way_in() {
        let name: ServiceName = serde_json::from_str("\"web\"").unwrap();
        assert_eq!(name.as_str(), "web");
        assert!(serde_json::from_str::<ServiceName>("\"-web\"").is_err());
    }

    #[test]
    fn parses_from_str() {
        let name: EnvironmentName = "staging".parse().unwrap();
        assert_eq!(name.to_string(), "staging");
    }
}

mod id_tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = LockId::generate();
        let b = LockId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = DeploymentId::new("d-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"d-1\"");
    }
}

proptest! {
    #[test]
    fn valid_labels_round_trip(name in "[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?") {
        let parsed = ServiceName::new(&name).unwrap();
        prop_assert_eq!(parsed.as_str(), name.as_str());
    }

    #[test]
    fn uppercase_is_always_rejected(prefix in "[a-z]{0,10}", upper in "[A-Z]", suffix in "[a-z]{0,10}") {
        let name = format!("{prefix}{upper}{suffix}");
        prop_assert!(EnvironmentName::new(&name).is_err());
    }

    #[test]
    fn over_long_labels_are_rejected(name in "[a-z]{64,80}") {
        prop_assert_eq!(ServiceName::new(&name).unwrap_err(), NameError::TooLong("service"));
    }
}
