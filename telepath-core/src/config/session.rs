//! Paired session configuration.

use compact_str::CompactString;

pub const DEFAULT_TERMINAL_TYPE: &str = "final";
pub const DEFAULT_ARTIFACT_FIELD: &str = "artifact";

/// Static configuration of one paired session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub id: CompactString,
    /// `type` value that marks a message as terminal.
    pub terminal_type: CompactString,
    /// Field of a terminal message holding the artifact handed to the
    /// notification sink.
    pub artifact_field: CompactString,
}

impl SessionConfig {
    pub fn new(id: impl Into<CompactString>) -> Self {
        Self {
            id: id.into(),
            terminal_type: DEFAULT_TERMINAL_TYPE.into(),
            artifact_field: DEFAULT_ARTIFACT_FIELD.into(),
        }
    }

    pub fn with_terminal_type(mut self, terminal_type: impl Into<CompactString>) -> Self {
        self.terminal_type = terminal_type.into();
        self
    }

    pub fn with_artifact_field(mut self, field: impl Into<CompactString>) -> Self {
        self.artifact_field = field.into();
        self
    }
}
