//! Built-in named format patterns

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));
static POSTAL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}(?:[-\s]\d{4})?$").expect("postal code pattern"));
static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("url pattern"));
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9][0-9\s\-().]{5,}[0-9]$").expect("phone pattern"));
static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("uuid pattern")
});
static INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?\d+$").expect("integer pattern"));
static ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("alphanumeric pattern"));

/// Formats that can be referenced by name in a `format` rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedFormat {
    Email,
    /// US-style postal code, `12345` or `12345-6789`
    PostalCode,
    Url,
    Phone,
    Uuid,
    Integer,
    Alphanumeric,
}

impl NamedFormat {
    /// Looks a format up by the name used in declarations.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "email" => Some(Self::Email),
            "zip" | "zipcode" | "zip_code" | "postal_code" | "postalcode" => Some(Self::PostalCode),
            "url" => Some(Self::Url),
            "phone" => Some(Self::Phone),
            "uuid" => Some(Self::Uuid),
            "integer" | "int" => Some(Self::Integer),
            "alphanumeric" => Some(Self::Alphanumeric),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::PostalCode => "postal_code",
            Self::Url => "url",
            Self::Phone => "phone",
            Self::Uuid => "uuid",
            Self::Integer => "integer",
            Self::Alphanumeric => "alphanumeric",
        }
    }

    pub fn regex(&self) -> &'static Regex {
        match self {
            Self::Email => &EMAIL,
            Self::PostalCode => &POSTAL_CODE,
            Self::Url => &URL,
            Self::Phone => &PHONE,
            Self::Uuid => &UUID,
            Self::Integer => &INTEGER,
            Self::Alphanumeric => &ALPHANUMERIC,
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex().is_match(text)
    }
}

impl fmt::Display for NamedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
