// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Person documents: the indexed form of a contact.
//!
//! A [`PersonDocument`] is built from a [`ContactRecord`] and carries its own
//! content [`Fingerprint`]. Emails, phones and postal addresses are grouped
//! into one [`ContactPoint`] per label.
//!
//! # Example
//!
//! ```
//! use contacts_indexer::{ContactRecord, LabeledValue, PersonDocument};
//!
//! let contact = ContactRecord::new("7", "Alan Turing")
//!     .with_email(LabeledValue::new("work", "alan@bletchley.uk"))
//!     .with_phone(LabeledValue::new("work", "+44 1908 640404"));
//!
//! let doc = PersonDocument::from_contact(&contact, 1_000);
//! assert_eq!(doc.contact_points.len(), 1);
//! assert_eq!(doc.creation_timestamp_millis, 1_000);
//!
//! // The creation timestamp is not part of the fingerprint
//! let later = PersonDocument::from_contact(&contact, 2_000);
//! assert_eq!(doc.fingerprint, later.fingerprint);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::fingerprint::{fingerprint_of, Fingerprint};
use crate::source::ContactRecord;

/// Schema type name of person documents.
pub const PERSON_SCHEMA_TYPE: &str = "builtin:Person";
/// Schema type name of nested contact points.
pub const CONTACT_POINT_SCHEMA_TYPE: &str = "builtin:ContactPoint";

/// Ways to reach a person under one label.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContactPoint {
    pub label: String,
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub addresses: Vec<String>,
}

/// Indexed representation of one contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonDocument {
    /// Contact id, also the document id
    pub id: String,
    pub name: String,
    pub given_name: Option<String>,
    pub middle_name: Option<String>,
    pub family_name: Option<String>,
    /// Nicknames and phonetic names
    pub additional_names: Vec<String>,
    pub contact_points: Vec<ContactPoint>,
    pub affiliations: Vec<String>,
    pub relations: Vec<String>,
    pub notes: Vec<String>,
    pub image_uri: Option<String>,
    /// Starred contacts
    pub is_important: bool,
    /// Set on first index, preserved across content changes
    pub creation_timestamp_millis: i64,
    /// Hash of the semantic fields above (excluding the creation timestamp)
    pub fingerprint: Fingerprint,
}

impl PersonDocument {
    /// Build a document from a contact row, stamping `creation_timestamp_millis`.
    pub fn from_contact(record: &ContactRecord, creation_timestamp_millis: i64) -> Self {
        let mut by_label: BTreeMap<&str, ContactPoint> = BTreeMap::new();
        for email in &record.emails {
            point_for(&mut by_label, &email.label).emails.push(email.value.clone());
        }
        for phone in &record.phones {
            point_for(&mut by_label, &phone.label).phones.push(phone.value.clone());
        }
        for address in &record.postal_addresses {
            point_for(&mut by_label, &address.label).addresses.push(address.value.clone());
        }

        let mut additional_names = record.nicknames.clone();
        if let Some(ref phonetic) = record.phonetic_name {
            additional_names.push(phonetic.clone());
        }

        let mut doc = Self {
            id: record.id.clone(),
            name: record.display_name.clone(),
            given_name: record.given_name.clone(),
            middle_name: record.middle_name.clone(),
            family_name: record.family_name.clone(),
            additional_names,
            contact_points: by_label.into_values().collect(),
            affiliations: record.organizations.clone(),
            relations: record.relations.clone(),
            notes: record.note.iter().cloned().collect(),
            image_uri: record.photo_uri.clone(),
            is_important: record.starred,
            creation_timestamp_millis,
            fingerprint: Fingerprint::default(),
        };
        doc.refresh_fingerprint();
        doc
    }

    /// Recompute the fingerprint after editing fields directly.
    pub fn refresh_fingerprint(&mut self) {
        self.fingerprint = fingerprint_of(self);
    }

    /// Same document with a different creation timestamp. The fingerprint is
    /// unaffected.
    #[must_use]
    pub fn with_creation_timestamp(mut self, creation_timestamp_millis: i64) -> Self {
        self.creation_timestamp_millis = creation_timestamp_millis;
        self
    }
}

fn point_for<'a, 'm>(by_label: &'m mut BTreeMap<&'a str, ContactPoint>, label: &'a str) -> &'m mut ContactPoint {
    by_label.entry(label).or_insert_with(|| ContactPoint {
        label: label.to_string(),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::LabeledValue;

    #[test]
    fn test_contact_points_grouped_by_label() {
        let contact = ContactRecord::new("1", "Ada")
            .with_email(LabeledValue::new("home", "ada@home"))
            .with_email(LabeledValue::new("work", "ada@work"))
            .with_phone(LabeledValue::new("home", "111"))
            .with_address(LabeledValue::new("home", "12 St James's Square"));

        let doc = PersonDocument::from_contact(&contact, 0);
        assert_eq!(doc.contact_points.len(), 2);

        let home = &doc.contact_points[0];
        assert_eq!(home.label, "home");
        assert_eq!(home.emails, vec!["ada@home"]);
        assert_eq!(home.phones, vec!["111"]);
        assert_eq!(home.addresses.len(), 1);

        let work = &doc.contact_points[1];
        assert_eq!(work.label, "work");
        assert_eq!(work.emails, vec!["ada@work"]);
        assert!(work.phones.is_empty());
    }

    #[test]
    fn test_names_notes_and_flags_copied() {
        let mut contact = ContactRecord::new("2", "Grace Hopper")
            .with_nickname("Amazing Grace")
            .with_organization("Rear Admiral, US Navy")
            .with_note("COBOL")
            .starred(true);
        contact.given_name = Some("Grace".into());
        contact.family_name = Some("Hopper".into());
        contact.phonetic_name = Some("grays hopper".into());

        let doc = PersonDocument::from_contact(&contact, 5);
        assert_eq!(doc.id, "2");
        assert_eq!(doc.given_name.as_deref(), Some("Grace"));
        assert_eq!(doc.additional_names, vec!["Amazing Grace", "grays hopper"]);
        assert_eq!(doc.affiliations, vec!["Rear Admiral, US Navy"]);
        assert_eq!(doc.notes, vec!["COBOL"]);
        assert!(doc.is_important);
    }

    #[test]
    fn test_provider_timestamp_not_fingerprinted() {
        let mut a = ContactRecord::new("3", "Linus");
        a.last_updated_millis = 1;
        let mut b = a.clone();
        b.last_updated_millis = 2;
        assert_eq!(
            PersonDocument::from_contact(&a, 0).fingerprint,
            PersonDocument::from_contact(&b, 0).fingerprint
        );
    }

    #[test]
    fn test_refresh_fingerprint_after_edit() {
        let mut doc = PersonDocument::from_contact(&ContactRecord::new("4", "Ken"), 0);
        let before = doc.fingerprint;
        doc.name = "Ken Thompson".into();
        doc.refresh_fingerprint();
        assert_ne!(before, doc.fingerprint);
    }
}
