//! Model registry
//!
//! Resolves every `ModelDefinition` together and owns the per-model state
//! (identity map, hooks, counters) for the life of the registry.
//!
//! # Resolution
//!
//! `RegistryBuilder::build` is the only place declarations are checked:
//!
//! - model names are unique and non-empty, primary keys non-empty
//! - every association target names a defined model
//! - every foreign key is an attribute of the model that holds it
//!   (belongs-to keys are added to their owner automatically)
//! - `dependent_destroy` only names declared associations
//! - `validates` declarations parse
//!
//! Any failure aborts the build; a registry never holds a half-resolved model.

mod class;
mod identity_map;
mod persist;

pub use class::ModelClass;
pub use identity_map::IdentityMap;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::association::inflect::{belongs_to_key, collection_path, has_many_key, infer_target};
use crate::association::{AssociationDescriptor, AssociationKind};
use crate::config::RegistryConfig;
use crate::error::{DeclarationError, DeclarationResult, PersistError, PersistResult};
use crate::model::{DeclaredAssociation, Hooks, ModelDefinition, ModelSchema, PrimaryKey, Record};
use crate::observability::{Event, PersistStats, TARGET_ASSOC, TARGET_DECLARE};
use crate::transport::Transport;
use crate::validation::{parse_validations, Validation};

/// State shared by every model class of one registry.
pub(crate) struct RegistryShared {
    pub(crate) config: RegistryConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) classes: IndexMap<String, Arc<ClassState>>,
}

/// Per-model state, created with the registry and dropped with it.
pub(crate) struct ClassState {
    pub(crate) schema: Arc<ModelSchema>,
    pub(crate) map: IdentityMap,
    pub(crate) hooks: RwLock<Hooks>,
    pub(crate) stats: PersistStats,
}

impl ClassState {
    fn new(schema: ModelSchema, hooks: Hooks) -> Self {
        Self {
            map: IdentityMap::new(schema.name()),
            schema: Arc::new(schema),
            hooks: RwLock::new(hooks),
            stats: PersistStats::new(),
        }
    }
}

/// A resolved set of models sharing one transport.
///
/// Cloning yields another handle onto the same registry.
#[derive(Clone)]
pub struct ModelRegistry {
    shared: Arc<RegistryShared>,
}

impl ModelRegistry {
    pub fn builder(transport: impl Transport + 'static) -> RegistryBuilder {
        RegistryBuilder::new(Arc::new(transport))
    }

    pub(crate) fn from_shared(shared: Arc<RegistryShared>) -> Self {
        Self { shared }
    }

    /// Handle onto the model class named `name`.
    pub fn model(&self, name: &str) -> PersistResult<ModelClass> {
        self.shared
            .classes
            .get(name)
            .map(|state| ModelClass::new(Arc::clone(&self.shared), Arc::clone(state)))
            .ok_or_else(|| PersistError::UnknownModel(name.to_string()))
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.shared.classes.keys().map(String::as_str)
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.shared.config
    }

    /// Empties every identity map.
    pub fn clear_caches(&self) {
        for state in self.shared.classes.values() {
            state.map.clear();
        }
    }

    /// Turns every pending link to `owner` into a foreign key value.
    pub(crate) fn resolve_pending_links(&self, owner: &Record, key: &PrimaryKey) {
        for state in self.shared.classes.values() {
            for record in state.map.query_local(|r| r.has_pending_links()) {
                for foreign_key in record.resolve_links_to(owner, key) {
                    debug!(
                        target: TARGET_ASSOC,
                        event = %Event::LinkResolved,
                        model = %state.schema.name(),
                        record = %record.key(),
                        foreign_key = %foreign_key,
                        owner = %key,
                        "pending link resolved"
                    );
                }
            }
        }
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.model_names().collect::<Vec<_>>())
            .field("config", &self.shared.config)
            .finish()
    }
}

/// Collects definitions and resolves them into a [`ModelRegistry`].
pub struct RegistryBuilder {
    config: RegistryConfig,
    transport: Arc<dyn Transport>,
    definitions: Vec<ModelDefinition>,
}

impl RegistryBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            config: RegistryConfig::default(),
            transport,
            definitions: Vec::new(),
        }
    }

    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn define(mut self, definition: ModelDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn build(self) -> DeclarationResult<ModelRegistry> {
        let RegistryBuilder {
            config,
            transport,
            definitions,
        } = self;

        // Pass 1: names, primary keys and attribute sets, so that pass 2 can
        // check foreign keys against models declared later.
        let mut shapes: IndexMap<String, Vec<String>> = IndexMap::new();
        for definition in &definitions {
            let name = definition.name.trim();
            if name.is_empty() {
                return Err(DeclarationError::InvalidModel {
                    model: definition.name.clone(),
                    reason: "model name must not be empty".into(),
                });
            }
            if shapes.contains_key(name) {
                return Err(DeclarationError::DuplicateModel(name.to_string()));
            }
            shapes.insert(name.to_string(), attribute_set(definition, &config)?);
        }

        // Pass 2: associations, validations and URLs.
        let mut classes = IndexMap::new();
        for definition in definitions {
            let name = definition.name.trim().to_string();
            let attributes = shapes[&name].clone();
            let schema = resolve_schema(&definition, attributes, &shapes, &config)?;
            debug!(
                target: TARGET_DECLARE,
                event = %Event::ModelDeclared,
                model = %schema.name(),
                primary_key = %schema.primary_key(),
                associations = schema.associations.len(),
                base = schema.api().base().unwrap_or_default(),
                "model declared"
            );
            classes.insert(name, Arc::new(ClassState::new(schema, definition.hooks)));
        }

        info!(
            target: TARGET_DECLARE,
            event = %Event::RegistryReady,
            models = classes.len(),
            "model registry ready"
        );

        Ok(ModelRegistry {
            shared: Arc::new(RegistryShared {
                config,
                transport,
                classes,
            }),
        })
    }
}

fn primary_key_of(definition: &ModelDefinition, config: &RegistryConfig) -> String {
    definition
        .primary_key
        .clone()
        .unwrap_or_else(|| config.default_primary_key.clone())
}

/// Primary key first, then declared attributes, then belongs-to keys.
fn attribute_set(definition: &ModelDefinition, config: &RegistryConfig) -> DeclarationResult<Vec<String>> {
    let primary_key = primary_key_of(definition, config);
    if primary_key.trim().is_empty() {
        return Err(DeclarationError::InvalidModel {
            model: definition.name.clone(),
            reason: "primary key must not be empty".into(),
        });
    }

    let mut attributes = vec![primary_key];
    let belongs_to_keys = definition
        .associations
        .iter()
        .filter(|a| a.kind == AssociationKind::BelongsTo)
        .map(foreign_key_for_belongs_to);
    for field in definition.attributes.iter().cloned().chain(belongs_to_keys) {
        if !attributes.contains(&field) {
            attributes.push(field);
        }
    }
    Ok(attributes)
}

fn foreign_key_for_belongs_to(association: &DeclaredAssociation) -> String {
    association
        .options
        .foreign_key
        .clone()
        .unwrap_or_else(|| belongs_to_key(&association.name))
}

fn resolve_schema(
    definition: &ModelDefinition,
    attributes: Vec<String>,
    shapes: &IndexMap<String, Vec<String>>,
    config: &RegistryConfig,
) -> DeclarationResult<ModelSchema> {
    let owner = definition.name.trim();

    let mut associations: IndexMap<String, AssociationDescriptor> = IndexMap::new();
    for declared in &definition.associations {
        if associations.contains_key(&declared.name) {
            return Err(DeclarationError::DuplicateAssociation {
                model: owner.to_string(),
                association: declared.name.clone(),
            });
        }
        let descriptor = resolve_association(owner, declared, definition, shapes)?;
        associations.insert(declared.name.clone(), descriptor);
    }

    for dependent in &definition.dependent {
        if !associations.contains_key(dependent) {
            return Err(DeclarationError::UnknownDependent {
                model: owner.to_string(),
                association: dependent.clone(),
            });
        }
    }

    let mut validations: IndexMap<String, Vec<Validation>> = IndexMap::new();
    for rules in &definition.declared_rules {
        for (field, validation) in parse_validations(owner, rules)? {
            validations.entry(field).or_default().push(validation);
        }
    }
    for (field, validation) in &definition.validations {
        validations.entry(field.clone()).or_default().push(validation.clone());
    }

    let mut api = definition.api.clone();
    api.resolve(collection_path(owner, config.pluralize_base_urls), config.root());

    Ok(ModelSchema {
        name: owner.to_string(),
        primary_key: primary_key_of(definition, config),
        attributes,
        associations,
        validations,
        api,
    })
}

fn resolve_association(
    owner: &str,
    declared: &DeclaredAssociation,
    definition: &ModelDefinition,
    shapes: &IndexMap<String, Vec<String>>,
) -> DeclarationResult<AssociationDescriptor> {
    let target = declared
        .options
        .provider
        .clone()
        .unwrap_or_else(|| infer_target(&declared.name));
    if !shapes.contains_key(&target) {
        return Err(DeclarationError::UnknownTarget {
            model: owner.to_string(),
            association: declared.name.clone(),
            target,
        });
    }

    let foreign_key = match declared.kind {
        AssociationKind::BelongsTo => foreign_key_for_belongs_to(declared),
        AssociationKind::HasMany => declared
            .options
            .foreign_key
            .clone()
            .unwrap_or_else(|| has_many_key(owner)),
    };

    let descriptor = AssociationDescriptor {
        owner: owner.to_string(),
        name: declared.name.clone(),
        kind: declared.kind,
        target,
        foreign_key,
        dependent: definition.dependent.contains(&declared.name),
    };

    let holder = descriptor.key_holder();
    let held = shapes
        .get(holder)
        .is_some_and(|attributes| attributes.contains(&descriptor.foreign_key));
    if !held {
        return Err(DeclarationError::MissingForeignKey {
            model: owner.to_string(),
            association: descriptor.name.clone(),
            foreign_key: descriptor.foreign_key.clone(),
            holder: holder.to_string(),
        });
    }

    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::association::AssociationOptions;
    use crate::transport::{MemoryTransport, Verb};
    use serde_json::json;

    fn blog() -> RegistryBuilder {
        ModelRegistry::builder(MemoryTransport::new())
            .define(
                ModelDefinition::new("Post")
                    .attributes(["title", "body"])
                    .has_many("comments", AssociationOptions::new())
                    .dependent_destroy("comments"),
            )
            .define(
                ModelDefinition::new("Comment")
                    .attribute("body")
                    .belongs_to("post", AssociationOptions::new()),
            )
    }

    #[test]
    fn test_resolves_inferred_associations() {
        let registry = blog().build().unwrap();
        let post = registry.model("Post").unwrap();
        let comments = post.schema().association("comments").unwrap();

        assert_eq!(comments.target, "Comment");
        assert_eq!(comments.foreign_key, "post_id");
        assert!(comments.dependent);

        let comment = registry.model("Comment").unwrap();
        assert_eq!(comment.schema().attributes(), ["id", "body", "post_id"]);
        assert_eq!(comment.schema().association("post").unwrap().target, "Post");
        assert_eq!(registry.model_names().collect::<Vec<_>>(), ["Post", "Comment"]);
    }

    #[test]
    fn test_unknown_target_is_fatal() {
        let result = ModelRegistry::builder(MemoryTransport::new())
            .define(ModelDefinition::new("Post").has_many("comments", AssociationOptions::new()))
            .build();

        let err = result.unwrap_err();
        assert!(err.is_resolution_failure());
        assert!(matches!(err, DeclarationError::UnknownTarget { ref target, .. } if target == "Comment"));
    }

    #[test]
    fn test_missing_foreign_key_is_fatal() {
        let result = ModelRegistry::builder(MemoryTransport::new())
            .define(ModelDefinition::new("Post").has_many("comments", AssociationOptions::new()))
            .define(ModelDefinition::new("Comment").attribute("body"))
            .build();

        match result.unwrap_err() {
            DeclarationError::MissingForeignKey {
                foreign_key, holder, ..
            } => {
                assert_eq!(foreign_key, "post_id");
                assert_eq!(holder, "Comment");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_provider_and_foreign_key_overrides() {
        let registry = ModelRegistry::builder(MemoryTransport::new())
            .define(ModelDefinition::new("User").attribute("name").has_many(
                "articles",
                AssociationOptions::new().provider("Post").foreign_key("writer_id"),
            ))
            .define(
                ModelDefinition::new("Post")
                    .belongs_to("writer", AssociationOptions::new().provider("User")),
            )
            .build()
            .unwrap();

        let user = registry.model("User").unwrap();
        let articles = user.schema().association("articles").unwrap();
        assert_eq!(articles.target, "Post");
        assert_eq!(articles.foreign_key, "writer_id");
    }

    #[test]
    fn test_duplicates_and_unknown_dependent() {
        let dup = ModelRegistry::builder(MemoryTransport::new())
            .define(ModelDefinition::new("Post"))
            .define(ModelDefinition::new("Post"))
            .build();
        assert_eq!(dup.unwrap_err(), DeclarationError::DuplicateModel("Post".into()));

        let dependent = ModelRegistry::builder(MemoryTransport::new())
            .define(ModelDefinition::new("Post").dependent_destroy("comments"))
            .build();
        assert_eq!(dependent.unwrap_err().code(), "UNKNOWN_DEPENDENT");

        let assoc = ModelRegistry::builder(MemoryTransport::new())
            .define(
                ModelDefinition::new("Post")
                    .belongs_to("author", AssociationOptions::new().provider("Post"))
                    .belongs_to("author", AssociationOptions::new().provider("Post")),
            )
            .build();
        assert_eq!(assoc.unwrap_err().code(), "DUPLICATE_ASSOCIATION");
    }

    #[test]
    fn test_invalid_validation_declaration() {
        let result = ModelRegistry::builder(MemoryTransport::new())
            .define(ModelDefinition::new("Post").validates(json!({"title": {"shiny": true}})))
            .build();
        assert_eq!(result.unwrap_err().code(), "INVALID_VALIDATION");
    }

    #[test]
    fn test_urls_follow_config() {
        let registry = ModelRegistry::builder(MemoryTransport::new())
            .config(RegistryConfig::with_api_root("https://api.example.com"))
            .define(ModelDefinition::new("BlogPost"))
            .define(ModelDefinition::new("Tag").api_base("/labels").api_override(Verb::Create, "/bulk"))
            .build()
            .unwrap();

        let post = registry.model("BlogPost").unwrap();
        assert_eq!(
            post.schema().api().url(Verb::Read, None),
            "https://api.example.com/blog_posts"
        );
        let tag = registry.model("Tag").unwrap();
        assert_eq!(tag.schema().api().url(Verb::Create, None), "https://api.example.com/labels/bulk");
    }

    #[test]
    fn test_unknown_model_lookup() {
        let registry = blog().build().unwrap();
        assert!(matches!(registry.model("Author"), Err(PersistError::UnknownModel(_))));
    }
}
