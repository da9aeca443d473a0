//! Validation engine
//!
//! Rules are registered per field at declaration time and evaluated on
//! demand against a record's current attributes.
//!
//! # Design Principles
//!
//! - Evaluation is pure and synchronous
//! - Re-validating one field replaces only that field's messages
//! - A record is valid exactly when its `ErrorSet` is empty
//! - Validation never reaches the transport or the cache

mod declare;
mod error_set;
mod formats;
mod rules;

pub use declare::parse_validations;
pub use error_set::ErrorSet;
pub use formats::NamedFormat;
pub use rules::{
    evaluate, humanize, is_blank, is_truthy, CustomCheck, CustomRule, Format, LengthConstraint,
    Rule, Validation, Verdict,
};

use crate::Attributes;
use serde_json::Value;

/// Runs every validation registered for one field, returning the failure
/// messages in registration order.
pub(crate) fn messages_for(
    field: &str,
    validations: &[Validation],
    attributes: &Attributes,
) -> Vec<String> {
    let value = attributes.get(field).unwrap_or(&Value::Null);
    validations
        .iter()
        .filter_map(|validation| evaluate(validation, field, value, attributes).message)
        .collect()
}
