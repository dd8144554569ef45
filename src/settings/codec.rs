// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Binary encoding of [`IndexerSettings`].
//!
//! ```text
//! "CIXS" | u16 version | field*
//! field = u16 tag | u32 len | len bytes        (little endian)
//! ```
//!
//! Tags 1..=4 carry an `i64` each. Unknown tags are skipped by length so
//! older builds can read files written by newer ones.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{IndexerSettings, SettingsError};

pub const MAGIC: &[u8; 4] = b"CIXS";
pub const FORMAT_VERSION: u16 = 1;

const TAG_LAST_FULL_UPDATE: u16 = 1;
const TAG_LAST_DELTA_UPDATE: u16 = 2;
const TAG_LAST_CONTACT_UPDATE: u16 = 3;
const TAG_LAST_CONTACT_DELETE: u16 = 4;

const HEADER_LEN: usize = 4 + 2;
const FIELD_HEADER_LEN: usize = 2 + 4;

#[must_use]
pub fn encode(settings: &IndexerSettings) -> Bytes {
    let fields = [
        (TAG_LAST_FULL_UPDATE, settings.last_full_update_timestamp_millis()),
        (TAG_LAST_DELTA_UPDATE, settings.last_delta_update_timestamp_millis()),
        (TAG_LAST_CONTACT_UPDATE, settings.last_contact_update_timestamp_millis()),
        (TAG_LAST_CONTACT_DELETE, settings.last_contact_delete_timestamp_millis()),
    ];
    let mut buf = BytesMut::with_capacity(HEADER_LEN + fields.len() * (FIELD_HEADER_LEN + 8));
    buf.put_slice(MAGIC);
    buf.put_u16_le(FORMAT_VERSION);
    for (tag, value) in fields {
        buf.put_u16_le(tag);
        buf.put_u32_le(8);
        buf.put_i64_le(value);
    }
    buf.freeze()
}

pub fn decode(mut buf: &[u8]) -> Result<IndexerSettings, SettingsError> {
    if buf.remaining() < HEADER_LEN {
        return Err(SettingsError::Truncated { needed: HEADER_LEN, available: buf.remaining() });
    }
    let mut magic = [0u8; 4];
    buf.copy_to_slice(&mut magic);
    if &magic != MAGIC {
        return Err(SettingsError::BadMagic(magic));
    }
    let version = buf.get_u16_le();
    if version == 0 {
        return Err(SettingsError::UnsupportedVersion(version));
    }

    let mut settings = IndexerSettings::default();
    while buf.has_remaining() {
        if buf.remaining() < FIELD_HEADER_LEN {
            return Err(SettingsError::Truncated { needed: FIELD_HEADER_LEN, available: buf.remaining() });
        }
        let tag = buf.get_u16_le();
        let len = buf.get_u32_le() as usize;
        if buf.remaining() < len {
            return Err(SettingsError::Truncated { needed: len, available: buf.remaining() });
        }
        let (payload, rest) = buf.split_at(len);
        buf = rest;

        let slot = match tag {
            TAG_LAST_FULL_UPDATE => &mut settings.last_full_update_timestamp_millis,
            TAG_LAST_DELTA_UPDATE => &mut settings.last_delta_update_timestamp_millis,
            TAG_LAST_CONTACT_UPDATE => &mut settings.last_contact_update_timestamp_millis,
            TAG_LAST_CONTACT_DELETE => &mut settings.last_contact_delete_timestamp_millis,
            _ => continue,
        };
        *slot = read_i64(tag, payload)?;
    }
    Ok(settings)
}

fn read_i64(tag: u16, mut payload: &[u8]) -> Result<i64, SettingsError> {
    if payload.len() != 8 {
        return Err(SettingsError::BadFieldLength { tag, len: payload.len() });
    }
    Ok(payload.get_i64_le())
}
