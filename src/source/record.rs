// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Contact rows as read from the contacts provider.

use serde::{Deserialize, Serialize};

/// A value with a type label ("home", "work", "mobile", or a custom label).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledValue {
    pub label: String,
    pub value: String,
}

impl LabeledValue {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self { label: label.into(), value: value.into() }
    }
}

/// One aggregated contact.
///
/// # Example
///
/// ```
/// use contacts_indexer::{ContactRecord, LabeledValue};
///
/// let contact = ContactRecord::new("42", "Grace Hopper")
///     .with_email(LabeledValue::new("work", "grace@navy.mil"))
///     .with_phone(LabeledValue::new("mobile", "+1 555 0100"));
///
/// assert_eq!(contact.id, "42");
/// assert_eq!(contact.emails.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContactRecord {
    pub id: String,
    pub display_name: String,
    pub given_name: Option<String>,
    pub middle_name: Option<String>,
    pub family_name: Option<String>,
    pub phonetic_name: Option<String>,
    pub nicknames: Vec<String>,
    pub emails: Vec<LabeledValue>,
    pub phones: Vec<LabeledValue>,
    pub postal_addresses: Vec<LabeledValue>,
    /// "Title, Company" style strings
    pub organizations: Vec<String>,
    pub relations: Vec<String>,
    pub note: Option<String>,
    pub photo_uri: Option<String>,
    pub starred: bool,
    /// Provider's last-updated timestamp (epoch millis). Volatile: never
    /// part of the indexed document.
    pub last_updated_millis: i64,
}

impl ContactRecord {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: LabeledValue) -> Self {
        self.emails.push(email);
        self
    }

    #[must_use]
    pub fn with_phone(mut self, phone: LabeledValue) -> Self {
        self.phones.push(phone);
        self
    }

    #[must_use]
    pub fn with_address(mut self, address: LabeledValue) -> Self {
        self.postal_addresses.push(address);
        self
    }

    #[must_use]
    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nicknames.push(nickname.into());
        self
    }

    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organizations.push(organization.into());
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn starred(mut self, starred: bool) -> Self {
        self.starred = starred;
        self
    }
}
