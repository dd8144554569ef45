// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Content fingerprints and diffing against the index.
//!
//! A fingerprint is a SHA-256 digest over a canonical, tag-and-length framed
//! encoding of a document's normalized fields:
//!
//! - strings are trimmed and internal whitespace runs collapse to one space
//! - empty values are dropped
//! - multi-valued fields are sorted and de-duplicated
//! - the creation timestamp and the stored fingerprint are excluded
//!
//! Two documents with the same semantic content therefore fingerprint equal
//! regardless of incidental metadata.
//!
//! # Example
//!
//! ```
//! use contacts_indexer::{ContactRecord, DiffDecision, PersonDocument};
//! use contacts_indexer::fingerprint::diff;
//!
//! let doc = PersonDocument::from_contact(&ContactRecord::new("1", "Ada"), 10);
//! assert_eq!(diff(doc, None).decision, DiffDecision::New);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::document::{ContactPoint, PersonDocument};
use crate::storage::IndexedFingerprint;

/// SHA-256 content fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// Field tags in the canonical encoding. Never reuse a tag.
const TAG_ID: u8 = 1;
const TAG_NAME: u8 = 2;
const TAG_GIVEN_NAME: u8 = 3;
const TAG_MIDDLE_NAME: u8 = 4;
const TAG_FAMILY_NAME: u8 = 5;
const TAG_ADDITIONAL_NAME: u8 = 6;
const TAG_CONTACT_POINT: u8 = 7;
const TAG_AFFILIATION: u8 = 8;
const TAG_RELATION: u8 = 9;
const TAG_NOTE: u8 = 10;
const TAG_IMAGE_URI: u8 = 11;
const TAG_IMPORTANT: u8 = 12;

const TAG_POINT_LABEL: u8 = 1;
const TAG_POINT_EMAIL: u8 = 2;
const TAG_POINT_PHONE: u8 = 3;
const TAG_POINT_ADDRESS: u8 = 4;

/// Trim and collapse internal whitespace.
#[must_use]
pub fn normalize(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Tag + length framed writer over any byte sink.
struct CanonicalWriter<'a> {
    out: &'a mut Vec<u8>,
}

impl CanonicalWriter<'_> {
    fn raw(&mut self, tag: u8, bytes: &[u8]) {
        self.out.push(tag);
        self.out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        self.out.extend_from_slice(bytes);
    }

    fn text(&mut self, tag: u8, value: &str) {
        let normalized = normalize(value);
        if !normalized.is_empty() {
            self.raw(tag, normalized.as_bytes());
        }
    }

    fn opt_text(&mut self, tag: u8, value: Option<&String>) {
        if let Some(value) = value {
            self.text(tag, value);
        }
    }

    fn set(&mut self, tag: u8, values: &[String]) {
        let mut normalized: Vec<String> = values
            .iter()
            .map(|v| normalize(v))
            .filter(|v| !v.is_empty())
            .collect();
        normalized.sort();
        normalized.dedup();
        for value in normalized {
            self.raw(tag, value.as_bytes());
        }
    }
}

fn encode_contact_point(point: &ContactPoint) -> Vec<u8> {
    let mut out = Vec::new();
    let mut writer = CanonicalWriter { out: &mut out };
    writer.text(TAG_POINT_LABEL, &point.label);
    writer.set(TAG_POINT_EMAIL, &point.emails);
    writer.set(TAG_POINT_PHONE, &point.phones);
    writer.set(TAG_POINT_ADDRESS, &point.addresses);
    out
}

/// Compute the fingerprint of a document's semantic content.
#[must_use]
pub fn fingerprint_of(doc: &PersonDocument) -> Fingerprint {
    let mut out = Vec::with_capacity(256);
    {
        let mut writer = CanonicalWriter { out: &mut out };
        writer.text(TAG_ID, &doc.id);
        writer.text(TAG_NAME, &doc.name);
        writer.opt_text(TAG_GIVEN_NAME, doc.given_name.as_ref());
        writer.opt_text(TAG_MIDDLE_NAME, doc.middle_name.as_ref());
        writer.opt_text(TAG_FAMILY_NAME, doc.family_name.as_ref());
        writer.set(TAG_ADDITIONAL_NAME, &doc.additional_names);

        // Contact points with no content are noise; order does not matter.
        let mut points: Vec<Vec<u8>> = doc
            .contact_points
            .iter()
            .filter(|p| !(p.emails.is_empty() && p.phones.is_empty() && p.addresses.is_empty()))
            .map(encode_contact_point)
            .collect();
        points.sort();
        points.dedup();
        for point in points {
            writer.raw(TAG_CONTACT_POINT, &point);
        }

        writer.set(TAG_AFFILIATION, &doc.affiliations);
        writer.set(TAG_RELATION, &doc.relations);
        writer.set(TAG_NOTE, &doc.notes);
        writer.opt_text(TAG_IMAGE_URI, doc.image_uri.as_ref());
        if doc.is_important {
            writer.raw(TAG_IMPORTANT, &[1]);
        }
    }
    Fingerprint(Sha256::digest(&out).into())
}

/// What to do with a candidate document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffDecision {
    /// Not indexed yet
    New,
    /// Indexed with the same fingerprint, skip the write
    Unchanged,
    /// Indexed with a different fingerprint; keep the original creation time
    Changed { original_creation_timestamp_millis: i64 },
}

/// A candidate document with its diff decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffedDocument {
    pub document: PersonDocument,
    pub decision: DiffDecision,
}

impl DiffedDocument {
    #[must_use]
    pub fn needs_write(&self) -> bool {
        !matches!(self.decision, DiffDecision::Unchanged)
    }

    /// The document to write, if any, with the creation timestamp carried
    /// over for changed documents.
    #[must_use]
    pub fn into_indexable(self) -> Option<PersonDocument> {
        match self.decision {
            DiffDecision::New => Some(self.document),
            DiffDecision::Unchanged => None,
            DiffDecision::Changed { original_creation_timestamp_millis } => {
                Some(self.document.with_creation_timestamp(original_creation_timestamp_millis))
            }
        }
    }
}

/// Compare a candidate against what is stored for the same id.
#[must_use]
pub fn diff(candidate: PersonDocument, existing: Option<&IndexedFingerprint>) -> DiffedDocument {
    let decision = match existing {
        None => DiffDecision::New,
        Some(stored) if stored.fingerprint == candidate.fingerprint => DiffDecision::Unchanged,
        Some(stored) => DiffDecision::Changed {
            original_creation_timestamp_millis: stored.creation_timestamp_millis,
        },
    };
    DiffedDocument { document: candidate, decision }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ContactRecord, LabeledValue};

    fn doc(name: &str) -> PersonDocument {
        PersonDocument::from_contact(&ContactRecord::new("1", name), 100)
    }

    fn stored(doc: &PersonDocument, creation: i64) -> IndexedFingerprint {
        IndexedFingerprint {
            id: doc.id.clone(),
            fingerprint: doc.fingerprint,
            creation_timestamp_millis: creation,
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Ada \t  Lovelace\n"), "Ada Lovelace");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_whitespace_and_order_do_not_change_fingerprint() {
        let a = ContactRecord::new("1", "Ada  Lovelace")
            .with_email(LabeledValue::new("home", "a@x"))
            .with_email(LabeledValue::new("home", "b@x"))
            .with_nickname("Countess");
        let b = ContactRecord::new("1", " Ada Lovelace ")
            .with_email(LabeledValue::new("home", "b@x"))
            .with_email(LabeledValue::new("home", "a@x"))
            .with_nickname("Countess")
            .with_nickname("  ");
        assert_eq!(
            PersonDocument::from_contact(&a, 1).fingerprint,
            PersonDocument::from_contact(&b, 2).fingerprint
        );
    }

    #[test]
    fn test_semantic_change_changes_fingerprint() {
        assert_ne!(doc("Ada").fingerprint, doc("Ada Lovelace").fingerprint);

        let plain = PersonDocument::from_contact(&ContactRecord::new("1", "Ada"), 0);
        let starred = PersonDocument::from_contact(&ContactRecord::new("1", "Ada").starred(true), 0);
        assert_ne!(plain.fingerprint, starred.fingerprint);
    }

    #[test]
    fn test_field_boundaries_are_framed() {
        // "ab" + "" must not collide with "a" + "b"
        let mut x = doc("ab");
        x.given_name = None;
        x.refresh_fingerprint();
        let mut y = doc("a");
        y.given_name = Some("b".into());
        y.refresh_fingerprint();
        assert_ne!(x.fingerprint, y.fingerprint);
    }

    #[test]
    fn test_diff_new() {
        let d = diff(doc("Ada"), None);
        assert_eq!(d.decision, DiffDecision::New);
        assert!(d.needs_write());
        assert_eq!(d.into_indexable().unwrap().creation_timestamp_millis, 100);
    }

    #[test]
    fn test_diff_unchanged() {
        let existing = doc("Ada");
        let d = diff(doc("Ada"), Some(&stored(&existing, 7)));
        assert_eq!(d.decision, DiffDecision::Unchanged);
        assert!(!d.needs_write());
        assert!(d.into_indexable().is_none());
    }

    #[test]
    fn test_diff_changed_preserves_creation_timestamp() {
        let existing = doc("Ada");
        let d = diff(doc("Ada Lovelace"), Some(&stored(&existing, 7)));
        assert_eq!(d.decision, DiffDecision::Changed { original_creation_timestamp_millis: 7 });

        let written = d.into_indexable().unwrap();
        assert_eq!(written.creation_timestamp_millis, 7);
        assert_eq!(written.name, "Ada Lovelace");
    }

    #[test]
    fn test_hex_display() {
        let fp = Fingerprint([0xab; 32]);
        assert_eq!(fp.to_string().len(), 64);
        assert!(fp.to_string().starts_with("abab"));
    }
}
