//! Validation rules and their evaluator
//!
//! Evaluation semantics:
//! - Pure: a verdict depends only on the rule, the field value and the
//!   record's other attributes (for `confirmation` and custom rules)
//! - No side effects, no network, no cache access
//! - A failing verdict always carries a message (custom or default)

use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use super::formats::NamedFormat;
use crate::Attributes;

/// Length bound for the `length` rule. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthConstraint {
    Exact(usize),
    Range { min: Option<usize>, max: Option<usize> },
}

impl LengthConstraint {
    pub fn exactly(n: usize) -> Self {
        Self::Exact(n)
    }

    pub fn between(min: usize, max: usize) -> Self {
        Self::Range {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn at_least(min: usize) -> Self {
        Self::Range {
            min: Some(min),
            max: None,
        }
    }

    pub fn at_most(max: usize) -> Self {
        Self::Range {
            min: None,
            max: Some(max),
        }
    }
}

impl From<RangeInclusive<usize>> for LengthConstraint {
    fn from(range: RangeInclusive<usize>) -> Self {
        Self::between(*range.start(), *range.end())
    }
}

/// Pattern for the `format` rule.
#[derive(Debug, Clone)]
pub enum Format {
    Named(NamedFormat),
    Pattern(Regex),
}

impl Format {
    fn is_match(&self, text: &str) -> bool {
        match self {
            Format::Named(named) => named.is_match(text),
            Format::Pattern(regex) => regex.is_match(text),
        }
    }
}

/// Caller-supplied predicate over the field value and the record's attributes.
pub type CustomCheck = Arc<dyn Fn(&Value, &Attributes) -> bool + Send + Sync>;

/// A named custom rule.
#[derive(Clone)]
pub struct CustomRule {
    pub name: String,
    pub check: CustomCheck,
}

impl fmt::Debug for CustomRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRule").field("name", &self.name).finish()
    }
}

/// Rule kinds understood by the validator.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Fails when the value is absent, null, blank text or an empty collection
    Presence,
    /// Fails when the value is present
    Absence,
    Length(LengthConstraint),
    Format(Format),
    /// Passes for numbers, and for text that parses as a number once every
    /// match of `ignore` has been removed
    Numericality { ignore: Option<Regex> },
    /// Fails unless the value is truthy
    Acceptance,
    Inclusion(Vec<Value>),
    Exclusion(Vec<Value>),
    /// Must equal the companion field; defaults to `<field>_confirmation`
    Confirmation { companion: Option<String> },
    Custom(CustomRule),
}

impl Rule {
    /// Rule name as used in declarations.
    pub fn name(&self) -> &str {
        match self {
            Rule::Presence => "presence",
            Rule::Absence => "absence",
            Rule::Length(_) => "length",
            Rule::Format(_) => "format",
            Rule::Numericality { .. } => "numericality",
            Rule::Acceptance => "acceptance",
            Rule::Inclusion(_) => "inclusion",
            Rule::Exclusion(_) => "exclusion",
            Rule::Confirmation { .. } => "confirmation",
            Rule::Custom(custom) => &custom.name,
        }
    }
}

/// A rule plus an optional message replacing the default one.
#[derive(Debug, Clone)]
pub struct Validation {
    pub rule: Rule,
    pub message: Option<String>,
}

impl Validation {
    pub fn new(rule: Rule) -> Self {
        Self {
            rule,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn presence() -> Self {
        Self::new(Rule::Presence)
    }

    pub fn absence() -> Self {
        Self::new(Rule::Absence)
    }

    pub fn length(constraint: impl Into<LengthConstraint>) -> Self {
        Self::new(Rule::Length(constraint.into()))
    }

    pub fn format(format: NamedFormat) -> Self {
        Self::new(Rule::Format(Format::Named(format)))
    }

    pub fn pattern(regex: Regex) -> Self {
        Self::new(Rule::Format(Format::Pattern(regex)))
    }

    pub fn numericality() -> Self {
        Self::new(Rule::Numericality { ignore: None })
    }

    pub fn acceptance() -> Self {
        Self::new(Rule::Acceptance)
    }

    pub fn inclusion(values: impl IntoIterator<Item = Value>) -> Self {
        Self::new(Rule::Inclusion(values.into_iter().collect()))
    }

    pub fn exclusion(values: impl IntoIterator<Item = Value>) -> Self {
        Self::new(Rule::Exclusion(values.into_iter().collect()))
    }

    pub fn confirmation() -> Self {
        Self::new(Rule::Confirmation { companion: None })
    }

    pub fn custom<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value, &Attributes) -> bool + Send + Sync + 'static,
    {
        Self::new(Rule::Custom(CustomRule {
            name: name.into(),
            check: Arc::new(check),
        }))
    }
}

/// Outcome of evaluating one validation against one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub passed: bool,
    pub message: Option<String>,
}

impl Verdict {
    fn pass() -> Self {
        Self {
            passed: true,
            message: None,
        }
    }

    fn fail(message: String) -> Self {
        Self {
            passed: false,
            message: Some(message),
        }
    }
}

/// Evaluates `validation` against the current value of `field`.
pub fn evaluate(validation: &Validation, field: &str, value: &Value, attributes: &Attributes) -> Verdict {
    match check(&validation.rule, field, value, attributes) {
        None => Verdict::pass(),
        Some(default) => Verdict::fail(validation.message.clone().unwrap_or(default)),
    }
}

/// Returns the default failure message, or `None` when the rule passes.
fn check(rule: &Rule, field: &str, value: &Value, attributes: &Attributes) -> Option<String> {
    let label = humanize(field);
    match rule {
        Rule::Presence => is_blank(value).then(|| format!("{} can't be blank", label)),
        Rule::Absence => (!is_blank(value)).then(|| format!("{} must be blank", label)),
        Rule::Length(constraint) => check_length(*constraint, &label, value),
        Rule::Format(format) => {
            let matched = value_text(value).is_some_and(|text| format.is_match(&text));
            (!matched).then(|| format!("{} is invalid", label))
        }
        Rule::Numericality { ignore } => {
            (!is_numeric(value, ignore.as_ref())).then(|| format!("{} is not a number", label))
        }
        Rule::Acceptance => (!is_truthy(value)).then(|| format!("{} must be accepted", label)),
        Rule::Inclusion(set) => {
            (!set.contains(value)).then(|| format!("{} is not included in the list", label))
        }
        Rule::Exclusion(set) => set.contains(value).then(|| format!("{} is reserved", label)),
        Rule::Confirmation { companion } => {
            let companion = companion
                .clone()
                .unwrap_or_else(|| format!("{}_confirmation", field));
            let other = attributes.get(&companion).unwrap_or(&Value::Null);
            (other != value).then(|| format!("{} doesn't match {}", humanize(&companion), label))
        }
        Rule::Custom(custom) => {
            (!(custom.check)(value, attributes)).then(|| format!("{} is invalid", label))
        }
    }
}

fn check_length(constraint: LengthConstraint, label: &str, value: &Value) -> Option<String> {
    let len = value_length(value);
    match constraint {
        LengthConstraint::Exact(n) if len != n => Some(format!(
            "{} is the wrong length (should be {} characters)",
            label, n
        )),
        LengthConstraint::Exact(_) => None,
        LengthConstraint::Range { min, max } => {
            if let Some(min) = min.filter(|min| len < *min) {
                return Some(format!("{} is too short (minimum is {} characters)", label, min));
            }
            if let Some(max) = max.filter(|max| len > *max) {
                return Some(format!("{} is too long (maximum is {} characters)", label, max));
            }
            None
        }
    }
}

/// `first_name` → `First name`, `author_id` → `Author`.
pub fn humanize(field: &str) -> String {
    let base = field
        .strip_suffix("_id")
        .filter(|s| !s.is_empty())
        .unwrap_or(field);
    let spaced = base.replace('_', " ");
    let mut chars = spaced.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Absent, null, whitespace-only text, or an empty collection.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Truthiness as a browser would see it: null, false, 0, NaN and "" are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn is_numeric(value: &Value, ignore: Option<&Regex>) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(text) => {
            let stripped = match ignore {
                Some(regex) => regex.replace_all(text, "").into_owned(),
                None => text.clone(),
            };
            stripped
                .trim()
                .parse::<f64>()
                .is_ok_and(|parsed| parsed.is_finite())
        }
        _ => false,
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_length(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::Number(n) => n.to_string().chars().count(),
        Value::Bool(b) => b.to_string().len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(validation: &Validation, value: Value) -> Verdict {
        evaluate(validation, "body", &value, &Attributes::new())
    }

    #[test]
    fn test_presence() {
        let v = Validation::presence();
        assert!(!run(&v, Value::Null).passed);
        assert!(!run(&v, json!("")).passed);
        assert!(!run(&v, json!("   ")).passed);
        assert!(!run(&v, json!([])).passed);
        assert!(run(&v, json!("hi")).passed);
        assert!(run(&v, json!(0)).passed);
        assert!(run(&v, json!(false)).passed);

        let verdict = run(&v, json!(""));
        assert_eq!(verdict.message.as_deref(), Some("Body can't be blank"));
    }

    #[test]
    fn test_absence() {
        let v = Validation::absence();
        assert!(run(&v, Value::Null).passed);
        assert!(run(&v, json!("")).passed);
        assert!(!run(&v, json!("x")).passed);
    }

    #[test]
    fn test_length_range_and_exact() {
        let v = Validation::length(1..=140);
        assert!(run(&v, json!("a")).passed);
        assert!(run(&v, json!("a".repeat(140))).passed);

        let long = run(&v, json!("a".repeat(141)));
        assert!(!long.passed);
        assert!(long.message.unwrap().contains("too long"));

        let short = run(&v, json!(""));
        assert!(short.message.unwrap().contains("too short"));

        let exact = Validation::length(LengthConstraint::exactly(5));
        assert!(run(&exact, json!("94105")).passed);
        assert!(!run(&exact, json!("9410")).passed);
        assert!(run(&exact, json!(94105)).passed);
    }

    #[test]
    fn test_length_counts_chars_not_bytes() {
        let v = Validation::length(LengthConstraint::at_most(3));
        assert!(run(&v, json!("héé")).passed);
    }

    #[test]
    fn test_length_open_bounds() {
        let min = Validation::length(LengthConstraint::at_least(2));
        assert!(!run(&min, json!("a")).passed);
        assert!(run(&min, json!("a".repeat(1000))).passed);

        let items = Validation::length(LengthConstraint::at_most(2));
        assert!(run(&items, json!([1, 2])).passed);
        assert!(!run(&items, json!([1, 2, 3])).passed);
    }

    #[test]
    fn test_format_named_and_pattern() {
        let email = Validation::format(NamedFormat::Email);
        assert!(run(&email, json!("a@b.co")).passed);
        assert!(!run(&email, json!("nope")).passed);
        assert!(!run(&email, Value::Null).passed);

        let pattern = Validation::pattern(Regex::new(r"^[a-z]+$").unwrap());
        assert!(run(&pattern, json!("abc")).passed);
        assert!(!run(&pattern, json!("ABC")).passed);
    }

    #[test]
    fn test_numericality_with_ignore() {
        let plain = Validation::numericality();
        assert!(run(&plain, json!(12.5)).passed);
        assert!(run(&plain, json!(" 42 ")).passed);
        assert!(!run(&plain, json!("1,000")).passed);
        assert!(!run(&plain, json!("abc")).passed);
        assert!(!run(&plain, Value::Null).passed);

        let lenient = Validation::new(Rule::Numericality {
            ignore: Some(Regex::new(r"[,$]").unwrap()),
        });
        assert!(run(&lenient, json!("$1,000")).passed);
        assert!(!run(&lenient, json!("$1,000x")).passed);
    }

    #[test]
    fn test_acceptance() {
        let v = Validation::acceptance();
        assert!(run(&v, json!(true)).passed);
        assert!(run(&v, json!("yes")).passed);
        assert!(run(&v, json!(1)).passed);
        assert!(!run(&v, json!(false)).passed);
        assert!(!run(&v, json!(0)).passed);
        assert!(!run(&v, json!("")).passed);
        assert!(!run(&v, Value::Null).passed);
    }

    #[test]
    fn test_inclusion_exclusion() {
        let inc = Validation::inclusion([json!("draft"), json!("published")]);
        assert!(run(&inc, json!("draft")).passed);
        assert!(!run(&inc, json!("archived")).passed);

        let exc = Validation::exclusion([json!("admin")]);
        assert!(!run(&exc, json!("admin")).passed);
        assert!(run(&exc, json!("ada")).passed);
    }

    #[test]
    fn test_confirmation_uses_companion() {
        let v = Validation::confirmation();
        let mut attrs = Attributes::new();
        attrs.insert("password".into(), json!("secret"));
        attrs.insert("password_confirmation".into(), json!("secret"));
        assert!(evaluate(&v, "password", &json!("secret"), &attrs).passed);

        attrs.insert("password_confirmation".into(), json!("other"));
        let verdict = evaluate(&v, "password", &json!("secret"), &attrs);
        assert!(!verdict.passed);
        assert_eq!(
            verdict.message.as_deref(),
            Some("Password confirmation doesn't match Password")
        );

        let named = Validation::new(Rule::Confirmation {
            companion: Some("repeat".into()),
        });
        attrs.insert("repeat".into(), json!("secret"));
        assert!(evaluate(&named, "password", &json!("secret"), &attrs).passed);
    }

    #[test]
    fn test_custom_rule_and_message() {
        let even = Validation::custom("even", |value, _| {
            value.as_i64().is_some_and(|n| n % 2 == 0)
        })
        .with_message("must be even");
        assert!(run(&even, json!(4)).passed);

        let verdict = run(&even, json!(3));
        assert_eq!(verdict.message.as_deref(), Some("must be even"));
        assert_eq!(even.rule.name(), "even");
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize("body"), "Body");
        assert_eq!(humanize("first_name"), "First name");
        assert_eq!(humanize("author_id"), "Author");
        assert_eq!(humanize("_id"), "Id");
    }
}
