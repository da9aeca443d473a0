//! Record identity
//!
//! A record is identified by its server-assigned primary key once saved and
//! by a temporary local token before that.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A primary key value as the server assigns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    Int(i64),
    Text(String),
}

impl PrimaryKey {
    /// Reads a key from a field value. Null, empty text, fractional numbers
    /// and composite values are not keys.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
                .map(PrimaryKey::Int),
            Value::String(s) if !s.is_empty() => Some(PrimaryKey::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            PrimaryKey::Int(n) => Value::from(*n),
            PrimaryKey::Text(s) => Value::String(s.clone()),
        }
    }

    /// True when `value` holds this key. Compared in text form, so a
    /// foreign key sent as `"7"` still names `Int(7)`.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, PrimaryKey::from_value(value)) {
            (_, None) => false,
            (PrimaryKey::Int(a), Some(PrimaryKey::Int(b))) => *a == b,
            (_, Some(other)) => self.to_string() == other.to_string(),
        }
    }
}

impl PrimaryKey {
    /// The same key in the other representation: `Int(7)` <-> `Text("7")`.
    /// Text that is not a canonical integer has none.
    pub(crate) fn alternate(&self) -> Option<PrimaryKey> {
        match self {
            PrimaryKey::Int(n) => Some(PrimaryKey::Text(n.to_string())),
            PrimaryKey::Text(s) => s
                .parse::<i64>()
                .ok()
                .filter(|n| n.to_string() == *s)
                .map(PrimaryKey::Int),
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimaryKey::Int(n) => write!(f, "{}", n),
            PrimaryKey::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for PrimaryKey {
    fn from(n: i64) -> Self {
        PrimaryKey::Int(n)
    }
}

impl From<i32> for PrimaryKey {
    fn from(n: i32) -> Self {
        PrimaryKey::Int(i64::from(n))
    }
}

impl From<u32> for PrimaryKey {
    fn from(n: u32) -> Self {
        PrimaryKey::Int(i64::from(n))
    }
}

impl From<&str> for PrimaryKey {
    fn from(s: &str) -> Self {
        PrimaryKey::Text(s.to_string())
    }
}

impl From<String> for PrimaryKey {
    fn from(s: String) -> Self {
        PrimaryKey::Text(s)
    }
}

/// The key a record is stored under in its identity map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    /// Assigned by the server
    Primary(PrimaryKey),
    /// Local token for a record that has never been saved
    Temporary(Uuid),
}

impl RecordKey {
    pub fn is_temporary(&self) -> bool {
        matches!(self, RecordKey::Temporary(_))
    }

    pub fn primary(&self) -> Option<&PrimaryKey> {
        match self {
            RecordKey::Primary(pk) => Some(pk),
            RecordKey::Temporary(_) => None,
        }
    }
}

impl From<PrimaryKey> for RecordKey {
    fn from(pk: PrimaryKey) -> Self {
        RecordKey::Primary(pk)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Primary(pk) => write!(f, "{}", pk),
            RecordKey::Temporary(token) => write!(f, "tmp:{}", token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value() {
        assert_eq!(PrimaryKey::from_value(&json!(7)), Some(PrimaryKey::Int(7)));
        assert_eq!(
            PrimaryKey::from_value(&json!("abc")),
            Some(PrimaryKey::Text("abc".into()))
        );
        assert_eq!(PrimaryKey::from_value(&json!("")), None);
        assert_eq!(PrimaryKey::from_value(&json!(1.5)), None);
        assert_eq!(PrimaryKey::from_value(&Value::Null), None);
        assert_eq!(PrimaryKey::from_value(&json!({"id": 1})), None);
    }

    #[test]
    fn test_matches_across_int_and_text() {
        let pk = PrimaryKey::Int(1);
        assert!(pk.matches(&json!(1)));
        assert!(pk.matches(&json!("1")));
        assert!(!pk.matches(&json!("01")));
        assert!(!pk.matches(&json!(2)));
        assert!(!pk.matches(&Value::Null));

        let slug = PrimaryKey::from("42");
        assert!(slug.matches(&json!(42)));
        assert!(!PrimaryKey::from("ada").matches(&json!("Ada")));
    }

    #[test]
    fn test_alternate_form() {
        assert_eq!(PrimaryKey::Int(7).alternate(), Some(PrimaryKey::from("7")));
        assert_eq!(PrimaryKey::from("7").alternate(), Some(PrimaryKey::Int(7)));
        assert_eq!(PrimaryKey::from("007").alternate(), None);
        assert_eq!(PrimaryKey::from("ada").alternate(), None);
    }

    #[test]
    fn test_round_trip_through_value() {
        for pk in [PrimaryKey::Int(42), PrimaryKey::Text("slug".into())] {
            assert_eq!(PrimaryKey::from_value(&pk.to_value()), Some(pk));
        }
    }

    #[test]
    fn test_record_key_display() {
        assert_eq!(RecordKey::Primary(PrimaryKey::Int(3)).to_string(), "3");
        let token = Uuid::new_v4();
        let key = RecordKey::Temporary(token);
        assert!(key.is_temporary());
        assert!(key.primary().is_none());
        assert_eq!(key.to_string(), format!("tmp:{}", token));
    }
}
