//! RFC 3339 (de)serialization for optional message timestamps.
//!
//! Use with `#[serde(default, with = "crate::utils::time", skip_serializing_if = "Option::is_none")]`.

use serde::{Deserialize, Deserializer, Serializer};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Deserialize an optional RFC 3339 formatted string into an `OffsetDateTime`.
///
/// `null` and a missing field both yield `None`; an empty string is treated the same way because
/// some message stores write it for records that were never stamped.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(s) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if s.trim().is_empty() {
        return Ok(None);
    }
    OffsetDateTime::parse(&s, &Rfc3339)
        .map(Some)
        .map_err(serde::de::Error::custom)
}

/// Serialize an optional `OffsetDateTime` into an RFC 3339 formatted string.
pub fn serialize<S>(datetime: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match datetime {
        Some(datetime) => {
            let s = datetime
                .format(&Rfc3339)
                .map_err(serde::ser::Error::custom)?;
            serializer.serialize_str(&s)
        }
        None => serializer.serialize_none(),
    }
}
