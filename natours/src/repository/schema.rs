//! Collection schemas
//!
//! A [`Schema`] is what a repository knows about the documents it stores:
//! how to validate and normalize them, which fields are unique, which are
//! never shown to clients and which rows every read should skip.
//!
//! Typed models implement [`Model`] and are adapted with [`ModelSchema`]:
//! the document is checked for required fields, deserialized into the model
//! (rejecting wrongly typed values), run through the model's own rules and
//! save hook, and serialized back. Unknown fields are dropped on the way.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

use super::filter::FilterCondition;
use super::Document;

/// Accumulated validation messages for one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<String>);

impl ValidationErrors {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set holding one message
    pub fn single(message: impl Into<String>) -> Self {
        Self(vec![message.into()])
    }

    /// Record a message
    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Recorded messages, in order
    pub fn messages(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}

/// What a repository needs to know about one collection
pub trait Schema: Send + Sync + 'static {
    /// Entity name used in messages ("Tour")
    fn entity(&self) -> &'static str;

    /// TypeID prefix of document identifiers ("tour")
    fn id_prefix(&self) -> &'static str;

    /// Fields whose values must be unique across the collection
    fn unique_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Fields that never leave the server and cannot be queried
    fn hidden_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Field groups whose combined values must be unique
    fn unique_together(&self) -> &'static [&'static [&'static str]] {
        &[]
    }

    /// Fields clients may filter on; `None` allows any visible field
    fn filterable_fields(&self) -> Option<&'static [&'static str]> {
        None
    }

    /// Conditions every read, update and delete implicitly adds
    fn default_filters(&self) -> Vec<FilterCondition> {
        Vec::new()
    }

    /// Validate and normalize a document's own fields
    ///
    /// `doc` never contains `id`, `__v` or `createdAt`; the repository owns
    /// those.
    fn validate(&self, doc: Document, is_new: bool) -> Result<Document, ValidationErrors>;

    /// Add computed fields to an outgoing document
    fn add_virtuals(&self, _doc: &mut Document) {}
}

/// Prepare a stored document for a client: drop hidden fields, add virtuals
pub fn present(schema: &dyn Schema, mut doc: Document) -> Document {
    for field in schema.hidden_fields() {
        doc.remove(*field);
    }
    schema.add_virtuals(&mut doc);
    doc
}

/// A typed document model
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Entity name used in messages
    const ENTITY: &'static str;

    /// TypeID prefix of identifiers
    const ID_PREFIX: &'static str;

    /// Required fields with the message reported when one is missing
    const REQUIRED: &'static [(&'static str, &'static str)];

    /// Unique fields
    const UNIQUE: &'static [&'static str] = &[];

    /// Compound unique field groups
    const UNIQUE_TOGETHER: &'static [&'static [&'static str]] = &[];

    /// Hidden fields
    const HIDDEN: &'static [&'static str] = &[];

    /// Filterable fields
    const FILTERABLE: Option<&'static [&'static str]> = None;

    /// Field-level rules beyond presence and type
    fn validate(&self, _errors: &mut ValidationErrors) {}

    /// Normalization run after validation succeeds
    fn before_save(&mut self, _is_new: bool) {}

    /// Conditions every read implicitly adds
    fn default_filters() -> Vec<FilterCondition> {
        Vec::new()
    }

    /// Computed fields for outgoing documents
    fn virtuals(_doc: &mut Document) {}
}

/// Adapts a [`Model`] to the object-safe [`Schema`] trait
pub struct ModelSchema<M>(PhantomData<fn() -> M>);

impl<M> ModelSchema<M> {
    /// New adapter
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<M> Default for ModelSchema<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> Schema for ModelSchema<M> {
    fn entity(&self) -> &'static str {
        M::ENTITY
    }

    fn id_prefix(&self) -> &'static str {
        M::ID_PREFIX
    }

    fn unique_fields(&self) -> &'static [&'static str] {
        M::UNIQUE
    }

    fn unique_together(&self) -> &'static [&'static [&'static str]] {
        M::UNIQUE_TOGETHER
    }

    fn hidden_fields(&self) -> &'static [&'static str] {
        M::HIDDEN
    }

    fn filterable_fields(&self) -> Option<&'static [&'static str]> {
        M::FILTERABLE
    }

    fn default_filters(&self) -> Vec<FilterCondition> {
        M::default_filters()
    }

    fn validate(&self, doc: Document, is_new: bool) -> Result<Document, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (field, message) in M::REQUIRED {
            let missing = match doc.get(*field) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            };
            if missing {
                errors.push(*message);
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut model: M = serde_json::from_value(Value::Object(doc))
            .map_err(|e| ValidationErrors::single(e.to_string()))?;

        model.validate(&mut errors);
        if !errors.is_empty() {
            return Err(errors);
        }

        model.before_save(is_new);

        match serde_json::to_value(&model) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ValidationErrors::single(format!(
                "{} did not serialize to an object",
                M::ENTITY
            ))),
            Err(e) => Err(ValidationErrors::single(e.to_string())),
        }
    }

    fn add_virtuals(&self, doc: &mut Document) {
        M::virtuals(doc);
    }
}
