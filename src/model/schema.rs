//! Resolved model schema
//!
//! Produced once per model by the registry builder and shared by every
//! record of the model. Immutable after construction.

use indexmap::IndexMap;

use super::ApiConfig;
use crate::association::AssociationDescriptor;
use crate::validation::Validation;

#[derive(Debug)]
pub struct ModelSchema {
    pub(crate) name: String,
    pub(crate) primary_key: String,
    pub(crate) attributes: Vec<String>,
    pub(crate) associations: IndexMap<String, AssociationDescriptor>,
    pub(crate) validations: IndexMap<String, Vec<Validation>>,
    pub(crate) api: ApiConfig,
}

impl ModelSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Declared attributes, primary key first.
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn has_attribute(&self, field: &str) -> bool {
        self.attributes.iter().any(|a| a == field)
    }

    pub fn association(&self, name: &str) -> Option<&AssociationDescriptor> {
        self.associations.get(name)
    }

    pub fn associations(&self) -> impl Iterator<Item = &AssociationDescriptor> {
        self.associations.values()
    }

    /// Associations destroyed along with a record of this model.
    pub fn dependents(&self) -> impl Iterator<Item = &AssociationDescriptor> {
        self.associations.values().filter(|a| a.dependent)
    }

    pub fn validations_for(&self, field: &str) -> &[Validation] {
        self.validations.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fields with at least one rule, in declaration order.
    pub fn validated_fields(&self) -> impl Iterator<Item = &str> {
        self.validations.keys().map(String::as_str)
    }

    pub fn api(&self) -> &ApiConfig {
        &self.api
    }
}

#[cfg(test)]
impl ModelSchema {
    /// Schema with no attributes, associations or rules.
    pub(crate) fn bare(name: &str, primary_key: &str) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            name: name.to_string(),
            primary_key: primary_key.to_string(),
            attributes: vec![primary_key.to_string()],
            associations: IndexMap::new(),
            validations: IndexMap::new(),
            api: ApiConfig::new(),
        })
    }
}
