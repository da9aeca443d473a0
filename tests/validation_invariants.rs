//! Validation Invariant Tests
//!
//! Validation must:
//! 1. Keep valid/invalid complementary and consistent with the error set
//! 2. Replace only the re-validated field's messages
//! 3. Never reach the transport, neither on its own nor when rejecting a save

use aerorecord::{
    Attributes, MemoryTransport, ModelDefinition, ModelRegistry, NamedFormat, PersistError,
    Validation, Verb,
};
use proptest::prelude::*;
use serde_json::{json, Value};

fn attrs(value: Value) -> Attributes {
    value.as_object().cloned().expect("object literal")
}

fn registry(transport: &MemoryTransport) -> ModelRegistry {
    ModelRegistry::builder(transport.clone())
        .define(
            ModelDefinition::new("Comment")
                .attributes(["body", "email", "terms"])
                .validates(json!({
                    "body": {"presence": true, "length": {"max": 140}},
                    "terms": {"acceptance": {"message": "must be ticked"}}
                }))
                .validate("email", Validation::format(NamedFormat::Email)),
        )
        .build()
        .unwrap()
}

fn valid_comment() -> Attributes {
    attrs(json!({"body": "hello", "email": "ada@example.com", "terms": true}))
}

// =============================================================================
// ERROR SET CONSISTENCY
// =============================================================================

/// The worked example: blank, then too long, then fixed.
#[test]
fn test_blank_then_long_then_valid_body() {
    let transport = MemoryTransport::new();
    let comments = registry(&transport).model("Comment").unwrap();

    let comment = comments.build(attrs(json!({"body": "", "email": "ada@example.com", "terms": true})));
    assert!(!comment.validate(None));
    assert!(comment.is_invalid());
    assert!(comment
        .errors()
        .get("body")
        .contains(&"Body can't be blank".to_string()));

    comment.set("body", json!("x".repeat(500)));
    assert!(!comment.validate(Some("body")));
    assert_eq!(
        comment.errors().get("body"),
        ["Body is too long (maximum is 140 characters)".to_string()]
    );

    comment.set("body", json!("x".repeat(50)));
    assert!(comment.validate(Some("body")));
    assert!(comment.is_valid());
    assert!(comment.errors().get("body").is_empty());

    assert_eq!(transport.request_count(), 0);
}

/// Re-validating one field leaves other fields' messages alone.
#[test]
fn test_single_field_revalidation_is_isolated() {
    let transport = MemoryTransport::new();
    let comments = registry(&transport).model("Comment").unwrap();

    let comment = comments.build(attrs(json!({"body": "", "email": "nope", "terms": false})));
    comment.validate(None);
    let before = comment.errors();
    assert_eq!(before.get("terms"), ["must be ticked".to_string()]);
    assert_eq!(before.get("email"), ["Email is invalid".to_string()]);

    comment.set("body", json!("fixed"));
    comment.validate(Some("body"));
    let after = comment.errors();

    assert!(!after.contains("body"));
    assert_eq!(after.get("email"), before.get("email"));
    assert_eq!(after.get("terms"), before.get("terms"));
    assert!(comment.is_invalid());
}

/// A full validation drops messages for fields that now pass.
#[test]
fn test_full_validation_rebuilds() {
    let transport = MemoryTransport::new();
    let comments = registry(&transport).model("Comment").unwrap();

    let comment = comments.build(attrs(json!({"body": "", "email": "nope", "terms": true})));
    assert!(!comment.validate(None));
    assert_eq!(comment.errors().len(), 2);

    comment.update(attrs(json!({"body": "ok", "email": "ada@example.com"})));
    assert!(comment.validate(None));
    assert!(comment.errors().is_empty());
}

// =============================================================================
// VALIDATION NEVER REACHES THE TRANSPORT
// =============================================================================

#[tokio::test]
async fn test_invalid_create_issues_no_request() {
    let transport = MemoryTransport::new();
    let comments = registry(&transport).model("Comment").unwrap();

    let comment = comments.build(attrs(json!({"body": ""})));
    let err = comment.save().await.unwrap_err();

    assert!(err.is_validation());
    let errors = err.validation_errors().unwrap();
    assert!(errors.contains("body"));
    assert!(errors.contains("terms"));
    assert!(comment.is_invalid());
    assert!(comment.is_new());
    assert_eq!(transport.request_count(), 0);
    assert_eq!(comments.stats().validation_failures, 1);
    assert_eq!(comments.stats().transport_calls, 0);
}

#[tokio::test]
async fn test_invalid_update_issues_no_request() {
    let transport = MemoryTransport::new();
    let comments = registry(&transport).model("Comment").unwrap();

    let comment = comments.build(valid_comment());
    comment.save().await.unwrap();
    transport.clear_log();

    let err = comment
        .update_remote(attrs(json!({"body": "x".repeat(141)})))
        .await
        .unwrap_err();

    assert!(matches!(err, PersistError::Validation { .. }));
    assert!(comment.is_saved());
    assert_eq!(transport.count(Verb::Update), 0);
    // The rejected value stays so its errors can be shown next to it
    assert_eq!(comment.get("body"), Some(json!("x".repeat(141))));
}

#[tokio::test]
async fn test_valid_record_reaches_transport_once() {
    let transport = MemoryTransport::new();
    let comments = registry(&transport).model("Comment").unwrap();

    let comment = comments.build(valid_comment());
    comment.create().await.unwrap();

    assert!(comment.is_valid());
    assert_eq!(transport.count(Verb::Create), 1);
    assert_eq!(transport.request_count(), 1);
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    /// valid and invalid are complementary and track error set emptiness,
    /// whatever the body.
    #[test]
    fn prop_validity_matches_error_set(body in ".{0,200}", revalidate_one in any::<bool>()) {
        let transport = MemoryTransport::new();
        let comments = registry(&transport).model("Comment").unwrap();
        let comment = comments.build(valid_comment());

        comment.set("body", json!(body));
        if revalidate_one {
            comment.validate(Some("body"));
        } else {
            comment.validate(None);
        }

        prop_assert_eq!(comment.is_valid(), !comment.is_invalid());
        prop_assert_eq!(comment.is_valid(), comment.errors().is_empty());

        let expected_valid = !body.trim().is_empty() && body.chars().count() <= 140;
        prop_assert_eq!(comment.is_valid(), expected_valid);
        prop_assert_eq!(transport.request_count(), 0);
    }

    /// Re-validating body never touches an email error.
    #[test]
    fn prop_email_errors_survive_body_revalidation(body in "[a-z ]{0,20}") {
        let transport = MemoryTransport::new();
        let comments = registry(&transport).model("Comment").unwrap();
        let comment = comments.build(attrs(json!({"body": "x", "email": "broken", "terms": true})));
        comment.validate(None);
        let email_errors = comment.errors().get("email").to_vec();

        comment.set("body", json!(body));
        comment.validate(Some("body"));

        let errors_after = comment.errors();
        prop_assert_eq!(errors_after.get("email"), email_errors.as_slice());
        prop_assert!(comment.is_invalid());
    }
}
