#![cfg(feature = "config")]

use ferrous_ioc::{Lifetime, ProviderOptions};

#[test]
fn test_options_deserialize_with_defaults() {
    let options: ProviderOptions = serde_json::from_str(r#"{ "validate_scopes": true }"#).unwrap();

    assert!(options.validate_scopes);
    assert!(!options.validate_on_build);

    let empty: ProviderOptions = serde_json::from_str("{}").unwrap();
    assert_eq!(empty, ProviderOptions::default());
}

#[test]
fn test_lifetime_deserializes_from_variant_name() {
    let lifetimes: Vec<Lifetime> = serde_json::from_str(r#"["Singleton", "Scoped", "Transient"]"#).unwrap();
    assert_eq!(lifetimes, vec![Lifetime::Singleton, Lifetime::Scoped, Lifetime::Transient]);

    assert!(serde_json::from_str::<Lifetime>(r#""Forever""#).is_err());
}
