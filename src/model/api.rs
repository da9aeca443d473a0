//! API endpoint configuration
//!
//! URLs resolve as `<base><action path>[/<primary key>]`. The action path is
//! empty unless overridden; the primary key is appended for single-record
//! reads, updates and deletes.

use std::collections::HashMap;

use crate::model::PrimaryKey;
use crate::transport::Verb;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiConfig {
    base: Option<String>,
    overrides: HashMap<Verb, String>,
}

impl ApiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL.
    pub fn set(&mut self, base: impl Into<String>) {
        self.base = Some(base.into());
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.set(base);
        self
    }

    /// Overrides the path appended to the base for one action.
    pub fn override_action(&mut self, verb: Verb, path: impl Into<String>) {
        self.overrides.insert(verb, path.into());
    }

    pub fn with_override(mut self, verb: Verb, path: impl Into<String>) -> Self {
        self.override_action(verb, path);
        self
    }

    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    pub fn action_path(&self, verb: Verb) -> Option<&str> {
        self.overrides.get(&verb).map(String::as_str)
    }

    /// Fills in the base when none was declared and prefixes `root` onto
    /// relative bases.
    pub(crate) fn resolve(&mut self, default_base: String, root: Option<&str>) {
        let base = self.base.take().unwrap_or(default_base);
        let base = match root {
            Some(root) if !is_absolute(&base) => join(root, &base),
            _ => base,
        };
        self.base = Some(base);
    }

    /// URL for `verb`, with `key` appended when given.
    pub fn url(&self, verb: Verb, key: Option<&PrimaryKey>) -> String {
        let mut url = self.base.clone().unwrap_or_default();
        if let Some(path) = self.action_path(verb).filter(|p| !p.is_empty()) {
            url = join(&url, path);
        }
        match key {
            Some(key) => join(&url, &key.to_string()),
            None => url,
        }
    }
}

fn is_absolute(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn join(left: &str, right: &str) -> String {
    format!(
        "{}/{}",
        left.trim_end_matches('/'),
        right.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let api = ApiConfig::new().with_base("/posts");
        let pk = PrimaryKey::Int(4);

        assert_eq!(api.url(Verb::Create, None), "/posts");
        assert_eq!(api.url(Verb::Read, None), "/posts");
        assert_eq!(api.url(Verb::Read, Some(&pk)), "/posts/4");
        assert_eq!(api.url(Verb::Update, Some(&pk)), "/posts/4");
        assert_eq!(api.url(Verb::Delete, Some(&pk)), "/posts/4");
    }

    #[test]
    fn test_overrides_append_to_base() {
        let api = ApiConfig::new()
            .with_base("/api/posts/")
            .with_override(Verb::Create, "/publish")
            .with_override(Verb::Delete, "archive");
        let pk = PrimaryKey::Text("hello-world".into());

        assert_eq!(api.url(Verb::Create, None), "/api/posts/publish");
        assert_eq!(api.url(Verb::Delete, Some(&pk)), "/api/posts/archive/hello-world");
        assert_eq!(api.url(Verb::Update, Some(&pk)), "/api/posts/hello-world");
    }

    #[test]
    fn test_resolve_defaults_and_root() {
        let mut implicit = ApiConfig::new();
        implicit.resolve("/comments".into(), None);
        assert_eq!(implicit.base(), Some("/comments"));

        let mut rooted = ApiConfig::new();
        rooted.resolve("/comments".into(), Some("https://api.example.com/v1/"));
        assert_eq!(rooted.base(), Some("https://api.example.com/v1/comments"));

        let mut absolute = ApiConfig::new().with_base("https://other.example.com/c");
        absolute.resolve("/comments".into(), Some("https://api.example.com"));
        assert_eq!(absolute.base(), Some("https://other.example.com/c"));
    }
}
