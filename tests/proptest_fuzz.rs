// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Property-based tests (fuzzing) for the settings codec and fingerprints.
//!
//! Uses proptest to generate random/malformed inputs and verify the codec
//! never panics, and that fingerprints only react to semantic changes.
//!
//! Run with: `cargo test --test proptest_fuzz`

use proptest::prelude::*;

use contacts_indexer::fingerprint::{fingerprint_of, normalize};
use contacts_indexer::settings::codec::{decode, encode};
use contacts_indexer::{ContactRecord, IndexerSettings, LabeledValue, PersonDocument};

// =============================================================================
// Strategies for generating test data
// =============================================================================

fn settings_strategy() -> impl Strategy<Value = IndexerSettings> {
    (any::<i64>(), any::<i64>(), any::<i64>(), any::<i64>()).prop_map(|(full, delta, update, delete)| {
        let mut settings = IndexerSettings::default();
        settings.set_last_full_update_timestamp_millis(full);
        settings.set_last_delta_update_timestamp_millis(delta);
        settings.advance_last_contact_update_timestamp_millis(update);
        settings.advance_last_contact_delete_timestamp_millis(delete);
        settings
    })
}

/// Text with runs of spaces, tabs and newlines around and between words
fn spaced_text() -> impl Strategy<Value = String> {
    prop::collection::vec(("[a-zA-Z0-9@.+]{1,8}", "[ \t\n]{1,3}"), 1..5).prop_map(|parts| {
        parts.into_iter().map(|(word, gap)| format!("{gap}{word}")).collect::<String>()
    })
}

fn contact_strategy() -> impl Strategy<Value = ContactRecord> {
    (
        "[a-z0-9]{1,6}",
        "[A-Za-z ]{1,20}",
        prop::collection::vec("[a-z]{1,8}", 0..4),
        prop::collection::vec("[a-z]{1,6}@[a-z]{1,6}\\.com", 0..4),
        any::<bool>(),
    )
        .prop_map(|(id, name, nicknames, emails, starred)| {
            let mut record = ContactRecord::new(id, name).starred(starred);
            record.nicknames = nicknames;
            record.emails = emails.into_iter().map(|e| LabeledValue::new("home", e)).collect();
            record
        })
}

// =============================================================================
// Settings codec
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Decoding random bytes never panics
    #[test]
    fn decode_arbitrary_bytes_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
        let _ = decode(&bytes);
    }

    /// Decoding random bytes after a valid header never panics
    #[test]
    fn decode_garbage_fields_never_panics(tail in prop::collection::vec(any::<u8>(), 0..96)) {
        let mut bytes = b"CIXS".to_vec();
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&tail);
        let _ = decode(&bytes);
    }

    /// Every strict prefix of a valid file is rejected or decodes cleanly
    #[test]
    fn truncated_file_never_panics(settings in settings_strategy(), cut in 0usize..64) {
        let bytes = encode(&settings);
        let cut = cut.min(bytes.len().saturating_sub(1));
        let _ = decode(&bytes[..cut]);
    }

    #[test]
    fn encoded_settings_decode_to_same_watermarks(settings in settings_strategy()) {
        let decoded = decode(&encode(&settings)).unwrap();
        prop_assert_eq!(decoded, settings);
    }
}

// =============================================================================
// Fingerprints
// =============================================================================

proptest! {
    #[test]
    fn normalize_is_idempotent(text in ".{0,40}") {
        let once = normalize(&text);
        prop_assert_eq!(normalize(&once), once.clone());
        prop_assert!(!once.contains("  "));
        prop_assert_eq!(once.trim(), once.as_str());
    }

    /// Whitespace layout of text fields never changes the fingerprint
    #[test]
    fn fingerprint_ignores_whitespace(name in spaced_text()) {
        let padded = PersonDocument::from_contact(&ContactRecord::new("1", name.clone()), 0);
        let tidy = PersonDocument::from_contact(&ContactRecord::new("1", normalize(&name)), 0);
        prop_assert_eq!(padded.fingerprint, tidy.fingerprint);
    }

    /// Order of repeated values never changes the fingerprint
    #[test]
    fn fingerprint_ignores_value_order(record in contact_strategy()) {
        let mut reversed = record.clone();
        reversed.nicknames.reverse();
        reversed.emails.reverse();
        let a = PersonDocument::from_contact(&record, 0);
        let b = PersonDocument::from_contact(&reversed, 0);
        prop_assert_eq!(a.fingerprint, b.fingerprint);
    }

    /// The creation timestamp is bookkeeping, not content
    #[test]
    fn fingerprint_ignores_creation_timestamp(record in contact_strategy(), ts in any::<i64>()) {
        let doc = PersonDocument::from_contact(&record, 0);
        let restamped = doc.clone().with_creation_timestamp(ts);
        prop_assert_eq!(fingerprint_of(&restamped), doc.fingerprint);
    }

    /// Starring a contact is a content change
    #[test]
    fn fingerprint_tracks_starred(record in contact_strategy()) {
        let mut flipped = record.clone();
        flipped.starred = !record.starred;
        let a = PersonDocument::from_contact(&record, 0);
        let b = PersonDocument::from_contact(&flipped, 0);
        prop_assert_ne!(a.fingerprint, b.fingerprint);
    }
}
