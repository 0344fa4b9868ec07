//! Truncation policy applied to captured gadget output.

use std::fmt;

use bytes::Bytes;

/// Maximum number of output bytes handed back to a caller.
pub const MAX_RESULT_LEN: usize = 64 * 1024;

const ELLIPSIS: &str = "…";

/// Which end of an oversized output is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncationMode {
    /// Keep the most recent bytes; used when sampling a live execution.
    Latest,
    /// Keep the earliest bytes; used for a completed bounded run.
    Full,
}

/// Bounds captured output to a fixed byte limit.
#[derive(Debug, Clone, Copy)]
pub struct ResultGovernor {
    limit: usize,
}

impl ResultGovernor {
    /// Creates a governor with a custom limit.
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// Returns the configured limit in bytes.
    #[must_use]
    pub const fn limit(self) -> usize {
        self.limit
    }

    /// Applies the policy to `output`.
    #[must_use]
    pub fn govern(self, output: Bytes, mode: TruncationMode) -> ExecutionResult {
        if output.len() <= self.limit {
            return ExecutionResult {
                content: output,
                truncation: None,
            };
        }

        let content = match mode {
            TruncationMode::Latest => output.slice(output.len() - self.limit..),
            TruncationMode::Full => output.slice(..self.limit),
        };
        ExecutionResult {
            content,
            truncation: Some(mode),
        }
    }
}

impl Default for ResultGovernor {
    fn default() -> Self {
        Self::new(MAX_RESULT_LEN)
    }
}

/// Output of an execution after the governor has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    content: Bytes,
    truncation: Option<TruncationMode>,
}

impl ExecutionResult {
    /// Returns the retained output bytes.
    #[must_use]
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Returns `true` when output was dropped.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.truncation.is_some()
    }

    /// Returns which end was kept, if output was dropped.
    #[must_use]
    pub fn truncation(&self) -> Option<TruncationMode> {
        self.truncation
    }

    /// Renders the result wrapped in result markers for the caller.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = String::from_utf8_lossy(&self.content);
        match self.truncation {
            None => write!(f, "\n<results>{text}</results>\n"),
            Some(TruncationMode::Latest) => {
                write!(f, "\n<isTruncated>true</isTruncated>\n<results>{text}</results>\n")
            }
            Some(TruncationMode::Full) => write!(
                f,
                "\n<isTruncated>true</isTruncated>\n<results>{text}{ELLIPSIS}</results>\n"
            ),
        }
    }
}
