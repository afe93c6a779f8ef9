//! Object handles, i.e. the UUIDs stored in the first field of every `OS:` object.
use anyhow::{Context, Result};
use derive_more::Display;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for an object in a model file, printed as `{xxxxxxxx-xxxx-...}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("{{{_0}}}")]
pub struct Handle(Uuid);

impl Handle {
    /// Create a new random handle
    pub fn new() -> Self {
        Handle(Uuid::new_v4())
    }

    /// Whether the given field value looks like a handle
    pub fn is_handle_like(value: &str) -> bool {
        let value = value.trim();
        value.starts_with('{') && value.ends_with('}') && value.parse::<Handle>().is_ok()
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for Handle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let inner = trimmed
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .unwrap_or(trimmed);
        let uuid = Uuid::parse_str(inner).with_context(|| format!("Invalid handle: {s}"))?;

        Ok(Handle(uuid))
    }
}
