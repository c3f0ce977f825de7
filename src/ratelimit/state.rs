//! Decoding of stored per-identifier state.

use std::str::FromStr;
use tracing::warn;

use crate::error::{LimitError, Result};

/// Parse a raw stored value. `None` stays `None`; an unparseable value is
/// [`LimitError::MalformedState`].
pub(crate) fn decode<T: FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>> {
    match raw {
        None => Ok(None),
        Some(value) => match value.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(LimitError::MalformedState {
                key: key.to_string(),
                value,
            }),
        },
    }
}

/// Like [`decode`], but malformed values are logged and read as absent, so
/// the strategy starts that identifier from fresh state.
pub(crate) fn decode_or_absent<T: FromStr>(key: &str, raw: Option<String>) -> Option<T> {
    decode(key, raw).unwrap_or_else(|err| {
        warn!(key = %key, error = %err, "Discarding malformed rate limit state");
        None
    })
}
