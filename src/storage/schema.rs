// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Corpus schema and the compatibility check run at startup.
//!
//! A schema change is **compatible** when every document valid under the old
//! schema is still valid under the new one. Anything else is incompatible
//! and needs a forced reset followed by a full reindex:
//!
//! - a type is removed
//! - a property is removed or changes kind
//! - an optional property becomes required
//! - a repeated property becomes single-valued
//! - a new required property appears
//!
//! # Example
//!
//! ```
//! use contacts_indexer::storage::{check_compatibility, CorpusSchema, SchemaCompatibility};
//!
//! let schema = CorpusSchema::person_corpus();
//! assert_eq!(check_compatibility(None, &schema), SchemaCompatibility::Fresh);
//! assert_eq!(check_compatibility(Some(&schema), &schema), SchemaCompatibility::Unchanged);
//! ```

use serde::{Deserialize, Serialize};

use crate::document::{CONTACT_POINT_SCHEMA_TYPE, PERSON_SCHEMA_TYPE};

/// Bumped whenever [`CorpusSchema::person_corpus`] changes.
pub const PERSON_CORPUS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    Text,
    Boolean,
    Int64,
    /// Nested document of the named type
    Document(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    Optional,
    Required,
    Repeated,
}

impl Cardinality {
    /// Whether values valid under `self` remain valid under `next`.
    fn widens_to(self, next: Cardinality) -> bool {
        use Cardinality::*;
        matches!(
            (self, next),
            (Optional, Optional)
                | (Optional, Repeated)
                | (Required, _)
                | (Repeated, Repeated)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyConfig {
    pub name: String,
    pub kind: PropertyKind,
    pub cardinality: Cardinality,
    /// Whether the property is tokenized for search
    pub indexed: bool,
}

impl PropertyConfig {
    fn new(name: &str, kind: PropertyKind, cardinality: Cardinality, indexed: bool) -> Self {
        Self { name: name.to_string(), kind, cardinality, indexed }
    }

    fn text(name: &str, cardinality: Cardinality) -> Self {
        Self::new(name, PropertyKind::Text, cardinality, true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaType {
    pub name: String,
    pub properties: Vec<PropertyConfig>,
}

impl SchemaType {
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyConfig> {
        self.properties.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusSchema {
    pub version: u32,
    pub types: Vec<SchemaType>,
}

impl CorpusSchema {
    /// The schema person documents are written under.
    #[must_use]
    pub fn person_corpus() -> Self {
        use Cardinality::*;

        let contact_point = SchemaType {
            name: CONTACT_POINT_SCHEMA_TYPE.to_string(),
            properties: vec![
                PropertyConfig::text("label", Optional),
                PropertyConfig::text("email", Repeated),
                PropertyConfig::text("telephone", Repeated),
                PropertyConfig::text("address", Repeated),
            ],
        };

        let person = SchemaType {
            name: PERSON_SCHEMA_TYPE.to_string(),
            properties: vec![
                PropertyConfig::text("name", Optional),
                PropertyConfig::text("givenName", Optional),
                PropertyConfig::text("middleName", Optional),
                PropertyConfig::text("familyName", Optional),
                PropertyConfig::text("additionalNames", Repeated),
                PropertyConfig::new(
                    "contactPoints",
                    PropertyKind::Document(CONTACT_POINT_SCHEMA_TYPE.to_string()),
                    Repeated,
                    true,
                ),
                PropertyConfig::text("affiliations", Repeated),
                PropertyConfig::text("relations", Repeated),
                PropertyConfig::text("notes", Repeated),
                PropertyConfig::new("imageUri", PropertyKind::Text, Optional, false),
                PropertyConfig::new("isImportant", PropertyKind::Boolean, Optional, false),
                PropertyConfig::new("fingerprint", PropertyKind::Text, Optional, false),
            ],
        };

        Self {
            version: PERSON_CORPUS_SCHEMA_VERSION,
            types: vec![contact_point, person],
        }
    }

    #[must_use]
    pub fn schema_type(&self, name: &str) -> Option<&SchemaType> {
        self.types.iter().find(|t| t.name == name)
    }
}

/// How a desired schema relates to the installed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaCompatibility {
    /// Nothing installed yet
    Fresh,
    Unchanged,
    /// Additive change, existing documents stay valid
    Compatible,
    /// These types need their documents dropped
    Incompatible(Vec<String>),
}

/// Result of a `set_schema` call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetSchemaOutcome {
    /// Types whose documents were dropped by a forced change
    pub incompatible_types: Vec<String>,
}

impl SetSchemaOutcome {
    #[must_use]
    pub fn documents_dropped(&self) -> bool {
        !self.incompatible_types.is_empty()
    }
}

/// Compare the installed schema with the desired one.
#[must_use]
pub fn check_compatibility(installed: Option<&CorpusSchema>, desired: &CorpusSchema) -> SchemaCompatibility {
    let Some(installed) = installed else {
        return SchemaCompatibility::Fresh;
    };
    if installed == desired {
        return SchemaCompatibility::Unchanged;
    }

    let mut incompatible: Vec<String> = installed
        .types
        .iter()
        .filter(|old| match desired.schema_type(&old.name) {
            None => true,
            Some(new) => !type_is_compatible(old, new),
        })
        .map(|old| old.name.clone())
        .collect();
    incompatible.sort();

    if incompatible.is_empty() {
        SchemaCompatibility::Compatible
    } else {
        SchemaCompatibility::Incompatible(incompatible)
    }
}

fn type_is_compatible(old: &SchemaType, new: &SchemaType) -> bool {
    let existing_ok = old.properties.iter().all(|old_prop| match new.property(&old_prop.name) {
        None => false,
        Some(new_prop) => {
            new_prop.kind == old_prop.kind && old_prop.cardinality.widens_to(new_prop.cardinality)
        }
    });
    let added_ok = new
        .properties
        .iter()
        .filter(|p| old.property(&p.name).is_none())
        .all(|p| p.cardinality != Cardinality::Required);
    existing_ok && added_ok
}
