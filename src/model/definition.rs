//! Declaration-time model builder
//!
//! A `ModelDefinition` is plain data: nothing is checked until the registry
//! resolves every definition together in `RegistryBuilder::build`.

use std::sync::Arc;

use serde_json::Value;

use super::{Action, ApiConfig, Hooks, Record};
use crate::association::{AssociationKind, AssociationOptions};
use crate::transport::Verb;
use crate::validation::Validation;

/// An association as declared, before inference.
#[derive(Debug, Clone)]
pub(crate) struct DeclaredAssociation {
    pub name: String,
    pub kind: AssociationKind,
    pub options: AssociationOptions,
}

/// Shape of one model, handed to `ModelRegistry::builder().define(..)`.
#[derive(Debug, Clone)]
pub struct ModelDefinition {
    pub(crate) name: String,
    pub(crate) primary_key: Option<String>,
    pub(crate) attributes: Vec<String>,
    pub(crate) associations: Vec<DeclaredAssociation>,
    pub(crate) dependent: Vec<String>,
    pub(crate) declared_rules: Vec<Value>,
    pub(crate) validations: Vec<(String, Validation)>,
    pub(crate) api: ApiConfig,
    pub(crate) hooks: Hooks,
}

impl ModelDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: None,
            attributes: Vec::new(),
            associations: Vec::new(),
            dependent: Vec::new(),
            declared_rules: Vec::new(),
            validations: Vec::new(),
            api: ApiConfig::new(),
            hooks: Hooks::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names the primary key field. Defaults to the registry's configured key.
    pub fn primary_key(mut self, field: impl Into<String>) -> Self {
        self.primary_key = Some(field.into());
        self
    }

    pub fn attribute(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if !self.attributes.contains(&field) {
            self.attributes.push(field);
        }
        self
    }

    pub fn attributes<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        fields.into_iter().fold(self, |def, field| def.attribute(field))
    }

    pub fn has_many(self, name: impl Into<String>, options: AssociationOptions) -> Self {
        self.associate(name.into(), AssociationKind::HasMany, options)
    }

    pub fn belongs_to(self, name: impl Into<String>, options: AssociationOptions) -> Self {
        self.associate(name.into(), AssociationKind::BelongsTo, options)
    }

    /// Destroying a record of this model also destroys the records
    /// associated through `association`.
    pub fn dependent_destroy(mut self, association: impl Into<String>) -> Self {
        let association = association.into();
        if !self.dependent.contains(&association) {
            self.dependent.push(association);
        }
        self
    }

    /// Declares rules in the `{ field: { rule: params } }` shape, e.g.
    /// `json!({"body": {"presence": true, "length": {"max": 140}}})`.
    /// Parsed when the registry is built.
    pub fn validates(mut self, rules: Value) -> Self {
        self.declared_rules.push(rules);
        self
    }

    /// Registers one rule for one field.
    pub fn validate(mut self, field: impl Into<String>, validation: Validation) -> Self {
        self.validations.push((field.into(), validation));
        self
    }

    /// Sets the base URL. Relative bases are prefixed with the configured API root.
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.api.set(base);
        self
    }

    pub fn api_override(mut self, verb: Verb, path: impl Into<String>) -> Self {
        self.api.override_action(verb, path);
        self
    }

    pub fn before<F>(mut self, action: Action, hook: F) -> Self
    where
        F: Fn(&Record) -> Result<(), String> + Send + Sync + 'static,
    {
        self.hooks.add_before(action, Arc::new(hook));
        self
    }

    pub fn after<F>(mut self, action: Action, hook: F) -> Self
    where
        F: Fn(&Record) + Send + Sync + 'static,
    {
        self.hooks.add_after(action, Arc::new(hook));
        self
    }

    fn associate(mut self, name: String, kind: AssociationKind, options: AssociationOptions) -> Self {
        self.associations.push(DeclaredAssociation { name, kind, options });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_collects_declarations() {
        let def = ModelDefinition::new("Post")
            .attributes(["title", "body", "title"])
            .has_many("comments", AssociationOptions::new())
            .belongs_to("author", AssociationOptions::new().provider("User"))
            .dependent_destroy("comments")
            .dependent_destroy("comments")
            .validates(json!({"title": {"presence": true}}))
            .validate("body", Validation::presence())
            .api_base("/articles")
            .api_override(Verb::Create, "/publish")
            .after(Action::Create, |_| {});

        assert_eq!(def.name(), "Post");
        assert_eq!(def.attributes, vec!["title", "body"]);
        assert_eq!(def.associations.len(), 2);
        assert_eq!(def.associations[1].options.provider.as_deref(), Some("User"));
        assert_eq!(def.dependent, vec!["comments"]);
        assert_eq!(def.declared_rules.len(), 1);
        assert_eq!(def.validations.len(), 1);
        assert_eq!(def.api.base(), Some("/articles"));
        assert_eq!(def.api.action_path(Verb::Create), Some("/publish"));
        assert_eq!(def.hooks.after(Action::Create).len(), 1);
    }
}
