//! Parsing of JSON-shaped `validates` declarations
//!
//! ```ignore
//! validates(json!({
//!     "body":  { "presence": true, "length": { "in": [1, 140] } },
//!     "email": { "format": "email" },
//!     "terms": { "acceptance": { "message": "must be ticked" } }
//! }))
//! ```
//!
//! A rule set to `false` is skipped. Unknown rules and malformed parameters
//! are declaration errors.

use regex::Regex;
use serde_json::{Map, Value};

use super::formats::NamedFormat;
use super::rules::{Format, LengthConstraint, Rule, Validation};
use crate::error::{DeclarationError, DeclarationResult};

/// Parses `{field: {rule: params}}` into `(field, validation)` pairs, in
/// declaration order.
pub fn parse_validations(model: &str, declared: &Value) -> DeclarationResult<Vec<(String, Validation)>> {
    let fields = declared.as_object().ok_or_else(|| DeclarationError::InvalidValidation {
        model: model.to_string(),
        field: "$root".into(),
        rule: "validates".into(),
        reason: "expected an object of fields".into(),
    })?;

    let mut parsed = Vec::new();
    for (field, rules) in fields {
        let rules = rules.as_object().ok_or_else(|| DeclarationError::InvalidValidation {
            model: model.to_string(),
            field: field.clone(),
            rule: "validates".into(),
            reason: "expected an object of rules".into(),
        })?;

        for (rule_name, params) in rules {
            if params == &Value::Bool(false) {
                continue;
            }
            let ctx = RuleContext {
                model,
                field,
                rule: rule_name,
            };
            let rule = ctx.parse_rule(params)?;
            let mut validation = Validation::new(rule);
            if let Some(message) = params.get("message").and_then(Value::as_str) {
                validation = validation.with_message(message);
            }
            parsed.push((field.clone(), validation));
        }
    }
    Ok(parsed)
}

struct RuleContext<'a> {
    model: &'a str,
    field: &'a str,
    rule: &'a str,
}

impl RuleContext<'_> {
    fn invalid(&self, reason: impl Into<String>) -> DeclarationError {
        DeclarationError::InvalidValidation {
            model: self.model.to_string(),
            field: self.field.to_string(),
            rule: self.rule.to_string(),
            reason: reason.into(),
        }
    }

    fn parse_rule(&self, params: &Value) -> DeclarationResult<Rule> {
        match self.rule {
            "presence" => self.flag(params).map(|_| Rule::Presence),
            "absence" => self.flag(params).map(|_| Rule::Absence),
            "acceptance" => self.flag(params).map(|_| Rule::Acceptance),
            "length" => self.length(params).map(Rule::Length),
            "format" => self.format(params).map(Rule::Format),
            "numericality" => self.numericality(params),
            "inclusion" => self.value_set(params).map(Rule::Inclusion),
            "exclusion" => self.value_set(params).map(Rule::Exclusion),
            "confirmation" => self.confirmation(params),
            other => Err(self.invalid(format!("unknown rule '{}'", other))),
        }
    }

    /// `true` or an options object (which may only carry a message).
    fn flag(&self, params: &Value) -> DeclarationResult<()> {
        match params {
            Value::Bool(true) | Value::Object(_) => Ok(()),
            _ => Err(self.invalid("expected true or an options object")),
        }
    }

    fn length(&self, params: &Value) -> DeclarationResult<LengthConstraint> {
        if let Some(n) = params.as_u64() {
            return Ok(LengthConstraint::Exact(n as usize));
        }
        let opts = self.options(params)?;

        if let Some(n) = opts.get("is") {
            return self.count(n).map(LengthConstraint::Exact);
        }
        if let Some(range) = opts.get("in").or_else(|| opts.get("within")) {
            let bounds = range
                .as_array()
                .filter(|b| b.len() == 2)
                .ok_or_else(|| self.invalid("'in' expects [min, max]"))?;
            let (min, max) = (self.count(&bounds[0])?, self.count(&bounds[1])?);
            if min > max {
                return Err(self.invalid("minimum exceeds maximum"));
            }
            return Ok(LengthConstraint::between(min, max));
        }

        let min = opts
            .get("min")
            .or_else(|| opts.get("minimum"))
            .map(|v| self.count(v))
            .transpose()?;
        let max = opts
            .get("max")
            .or_else(|| opts.get("maximum"))
            .map(|v| self.count(v))
            .transpose()?;
        match (min, max) {
            (None, None) => Err(self.invalid("expected is, in, min or max")),
            (Some(lo), Some(hi)) if lo > hi => Err(self.invalid("minimum exceeds maximum")),
            (min, max) => Ok(LengthConstraint::Range { min, max }),
        }
    }

    fn format(&self, params: &Value) -> DeclarationResult<Format> {
        if let Some(name) = params.as_str() {
            return self.named_format(name);
        }
        let opts = self.options(params)?;
        if let Some(pattern) = opts.get("with") {
            let source = pattern
                .as_str()
                .ok_or_else(|| self.invalid("'with' expects a pattern string"))?;
            let regex = Regex::new(source).map_err(|e| self.invalid(e.to_string()))?;
            return Ok(Format::Pattern(regex));
        }
        opts.iter()
            .find(|(key, enabled)| key.as_str() != "message" && enabled == &&Value::Bool(true))
            .map(|(key, _)| self.named_format(key))
            .unwrap_or_else(|| Err(self.invalid("expected a format name or 'with' pattern")))
    }

    fn named_format(&self, name: &str) -> DeclarationResult<Format> {
        NamedFormat::from_name(name)
            .map(Format::Named)
            .ok_or_else(|| self.invalid(format!("unknown format '{}'", name)))
    }

    fn numericality(&self, params: &Value) -> DeclarationResult<Rule> {
        if params == &Value::Bool(true) {
            return Ok(Rule::Numericality { ignore: None });
        }
        let opts = self.options(params)?;
        let ignore = match opts.get("ignore") {
            Some(Value::String(source)) => {
                Some(Regex::new(source).map_err(|e| self.invalid(e.to_string()))?)
            }
            Some(_) => return Err(self.invalid("'ignore' expects a pattern string")),
            None => None,
        };
        Ok(Rule::Numericality { ignore })
    }

    fn value_set(&self, params: &Value) -> DeclarationResult<Vec<Value>> {
        let set = match params {
            Value::Array(items) => items,
            Value::Object(opts) => opts
                .get("in")
                .and_then(Value::as_array)
                .ok_or_else(|| self.invalid("'in' expects an array"))?,
            _ => return Err(self.invalid("expected an array or {in: [...]}")),
        };
        Ok(set.clone())
    }

    fn confirmation(&self, params: &Value) -> DeclarationResult<Rule> {
        let companion = match params {
            Value::Bool(true) => None,
            Value::String(name) => Some(name.clone()),
            Value::Object(opts) => opts.get("with").and_then(Value::as_str).map(String::from),
            _ => return Err(self.invalid("expected true, a field name or an options object")),
        };
        Ok(Rule::Confirmation { companion })
    }

    fn options<'v>(&self, params: &'v Value) -> DeclarationResult<&'v Map<String, Value>> {
        params
            .as_object()
            .ok_or_else(|| self.invalid("expected an options object"))
    }

    fn count(&self, value: &Value) -> DeclarationResult<usize> {
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| self.invalid("expected a non-negative integer"))
    }
}
