//! Read-only capability marker.

use serde::{Deserialize, Serialize};

/// Whether invoking a tool changes state outside the server.
///
/// Only [`ReadOnlyHint::Mutating`] tools are hidden from a read-only
/// registry; unmarked tools stay visible.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadOnlyHint {
    /// The tool only observes.
    ReadOnly,
    /// The tool changes cluster or backend state.
    Mutating,
    /// The tool makes no claim either way.
    #[default]
    Unspecified,
}

impl ReadOnlyHint {
    /// Returns the protocol annotation value, `None` when unspecified.
    #[must_use]
    pub const fn as_annotation(self) -> Option<bool> {
        match self {
            Self::ReadOnly => Some(true),
            Self::Mutating => Some(false),
            Self::Unspecified => None,
        }
    }

    /// Returns `true` if a read-only registry may expose the tool.
    #[must_use]
    pub const fn visible_in_read_only(self) -> bool {
        !matches!(self, Self::Mutating)
    }
}

impl From<Option<bool>> for ReadOnlyHint {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Self::ReadOnly,
            Some(false) => Self::Mutating,
            None => Self::Unspecified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_round_trips_through_option() {
        for hint in [ReadOnlyHint::ReadOnly, ReadOnlyHint::Mutating, ReadOnlyHint::Unspecified] {
            assert_eq!(ReadOnlyHint::from(hint.as_annotation()), hint);
        }
        assert!(ReadOnlyHint::Unspecified.visible_in_read_only());
        assert!(!ReadOnlyHint::Mutating.visible_in_read_only());
    }
}
