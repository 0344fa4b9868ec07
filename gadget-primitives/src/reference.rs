//! Gadget image references.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Image reference naming a gadget, e.g. `ghcr.io/inspektor-gadget/gadget/trace_dns:latest`.
///
/// The reference is the identity key for descriptors, cache entries, and
/// tools derived from the gadget.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GadgetRef(String);

impl GadgetRef {
    /// Creates a reference after trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGadgetRef`] if the reference is empty or
    /// contains inner whitespace.
    pub fn new(reference: impl Into<String>) -> Result<Self> {
        let reference = reference.into();
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidGadgetRef {
                reference,
                reason: "reference cannot be empty".into(),
            });
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(Error::InvalidGadgetRef {
                reference,
                reason: "reference cannot contain whitespace".into(),
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the last path segment of the repository, without registry,
    /// tag, or digest: `ghcr.io/ig/gadget/trace_dns:v1` yields `trace_dns`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGadgetRef`] when the repository name is empty
    /// or contains characters outside `[a-z0-9._-]`.
    pub fn repository_name(&self) -> Result<&str> {
        let without_digest = self.0.split('@').next().unwrap_or_default();
        let last_segment = without_digest.rsplit('/').next().unwrap_or_default();
        // A colon in the last segment always introduces the tag; a registry
        // port can only appear before the first slash.
        let name = last_segment.split(':').next().unwrap_or_default();

        if name.is_empty() {
            return Err(Error::InvalidGadgetRef {
                reference: self.0.clone(),
                reason: "repository name cannot be empty".into(),
            });
        }
        if !name
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '_' | '-'))
        {
            return Err(Error::InvalidGadgetRef {
                reference: self.0.clone(),
                reason: "repository name must contain lowercase alphanumeric, dot, underscore, or dash"
                    .into(),
            });
        }
        Ok(name)
    }
}

impl Display for GadgetRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for GadgetRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl AsRef<str> for GadgetRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<GadgetRef> for String {
    fn from(value: GadgetRef) -> Self {
        value.0
    }
}
