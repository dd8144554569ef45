// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Document store seam.
//!
//! - [`DocumentStore`]: the trait the indexer writes through
//! - [`schema`]: corpus schema and compatibility rules
//! - [`InMemoryDocumentStore`]: reference implementation for tests and embedders

pub mod traits;
pub mod schema;
pub mod memory;

pub use memory::InMemoryDocumentStore;
pub use schema::{
    check_compatibility, Cardinality, CorpusSchema, PropertyConfig, PropertyKind,
    SchemaCompatibility, SchemaType, SetSchemaOutcome,
};
pub use traits::{BatchOutcome, DocumentStore, IndexedFingerprint, StatusCode, StorageError};
