/// Unit tests for service identity: keys, identifiers and their display forms.
use ferrous_ioc::{ServiceIdentifier, ServiceKey};
use std::any::TypeId;
use std::collections::HashSet;

struct Mailer;

#[test]
fn test_service_key_from_conversions() {
    assert_eq!(ServiceKey::from("smtp"), ServiceKey::Name("smtp".into()));
    assert_eq!(ServiceKey::from(String::from("smtp")), ServiceKey::from("smtp"));
    assert_eq!(ServiceKey::from(3i64), ServiceKey::Index(3));
    assert_ne!(ServiceKey::from("3"), ServiceKey::from(3i64));
}

#[test]
fn test_service_key_display() {
    assert_eq!(ServiceKey::from("primary").to_string(), "primary");
    assert_eq!(ServiceKey::from(-1i64).to_string(), "-1");
    assert_eq!(ServiceKey::Any.to_string(), "*");
}

#[test]
fn test_only_any_is_wildcard() {
    assert!(ServiceKey::Any.is_any());
    assert!(!ServiceKey::from("*").is_any());
    assert!(!ServiceKey::from(0i64).is_any());
}

#[test]
fn test_identifier_accessors() {
    let plain = ServiceIdentifier::of::<Mailer>();
    assert_eq!(plain.type_id(), TypeId::of::<Mailer>());
    assert!(plain.type_name().ends_with("Mailer"));
    assert!(plain.key().is_none());

    let keyed = ServiceIdentifier::keyed::<Mailer>("smtp");
    assert_eq!(keyed.type_id(), plain.type_id());
    assert_eq!(keyed.key(), Some(&ServiceKey::from("smtp")));
}

#[test]
fn test_identifier_equality_uses_type_and_key() {
    let a = ServiceIdentifier::keyed::<Mailer>("smtp");
    let b = ServiceIdentifier::keyed::<Mailer>("smtp");
    let c = ServiceIdentifier::keyed::<Mailer>("ses");
    let d = ServiceIdentifier::keyed::<String>("smtp");

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_ne!(a, d);
    assert_ne!(a, ServiceIdentifier::of::<Mailer>());
    assert_ne!(a, ServiceIdentifier::keyed::<Mailer>(ServiceKey::Any));
}

#[test]
fn test_identifier_hashing_matches_equality() {
    let mut set = HashSet::new();
    set.insert(ServiceIdentifier::of::<Mailer>());
    set.insert(ServiceIdentifier::of::<Mailer>());
    set.insert(ServiceIdentifier::keyed::<Mailer>("smtp"));
    set.insert(ServiceIdentifier::keyed::<Mailer>("smtp"));
    set.insert(ServiceIdentifier::keyed::<Mailer>(1i64));

    assert_eq!(set.len(), 3);
    assert!(set.contains(&ServiceIdentifier::keyed::<Mailer>("smtp")));
}

#[test]
fn test_with_key_keeps_the_type() {
    let plain = ServiceIdentifier::of::<Mailer>();
    let keyed = plain.with_key(Some(ServiceKey::from("smtp")));

    assert_eq!(keyed, ServiceIdentifier::keyed::<Mailer>("smtp"));
    assert_eq!(keyed.with_key(None), plain);
}

#[test]
fn test_identifier_display() {
    let plain = ServiceIdentifier::of::<u32>();
    assert_eq!(plain.to_string(), "u32");

    let keyed = ServiceIdentifier::keyed::<u32>("port");
    assert_eq!(keyed.to_string(), "u32[port]");

    let any = ServiceIdentifier::keyed::<u32>(ServiceKey::Any);
    assert_eq!(any.to_string(), "u32[*]");
    assert_eq!(format!("{:?}", keyed), "ServiceIdentifier(u32[port])");
}

#[test]
fn test_unsized_types_have_identifiers() {
    let identifier = ServiceIdentifier::of::<dyn std::fmt::Debug + Send + Sync>();
    assert!(identifier.type_name().contains("Debug"));
    assert_ne!(identifier, ServiceIdentifier::of::<String>());
}
