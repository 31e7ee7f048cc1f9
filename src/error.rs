//! Error types for the Gossamer scripting runtime

use std::fmt;
use thiserror::Error;

/// Source location in script code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// Line number (1-indexed)
    pub line: u32,
    /// Column number (1-indexed)
    pub column: u32,
}

impl SourceLocation {
    /// Create a new source location
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Main error type for Gossamer
#[derive(Error, Debug)]
pub enum Error {
    /// Host-class descriptor table error - duplicate members, ambiguous
    /// exposed names, unresolvable parent links. Fatal to the binding build
    /// that discovered it.
    #[error("ConfigurationError: class '{class}': {message}")]
    Configuration { class: String, message: String },

    /// Script compilation error
    #[error("CompileError: {message} in {source_name}{}", location.map(|l| format!(" at {}", l)).unwrap_or_default())]
    Compile {
        message: String,
        source_name: String,
        location: Option<SourceLocation>,
    },

    /// Script runtime error - thrown values, reference faults and the like
    #[error("ScriptError: {message} in {source_name}{}", location.map(|l| format!(" at {}", l)).unwrap_or_default())]
    Script {
        message: String,
        source_name: String,
        location: Option<SourceLocation>,
    },

    /// Cooperative script timeout. Raised at an interpreter step boundary,
    /// never catchable by script code, fatal to the triggering top-level
    /// call only.
    #[error("ScriptTimeout: execution time of {elapsed_ms}ms exceeds the {limit_ms}ms limit")]
    Timeout { elapsed_ms: u64, limit_ms: u64 },

    /// Failure inside a native getter, setter, method or constructor
    #[error("HostError: {0}")]
    Host(String),
}

impl Error {
    /// Create a configuration error for a host class
    pub fn configuration(class: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Configuration {
            class: class.into(),
            message: message.into(),
        }
    }

    /// Create a compilation error without location information
    pub fn compile(message: impl Into<String>, source_name: impl Into<String>) -> Self {
        Error::Compile {
            message: message.into(),
            source_name: source_name.into(),
            location: None,
        }
    }

    /// Create a compilation error pinned to a source location
    pub fn compile_at(
        message: impl Into<String>,
        source_name: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        Error::Compile {
            message: message.into(),
            source_name: source_name.into(),
            location: Some(location),
        }
    }

    /// Create a script runtime error without location information
    pub fn script(message: impl Into<String>, source_name: impl Into<String>) -> Self {
        Error::Script {
            message: message.into(),
            source_name: source_name.into(),
            location: None,
        }
    }

    /// Create a script runtime error pinned to a source location
    pub fn script_at(
        message: impl Into<String>,
        source_name: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        Error::Script {
            message: message.into(),
            source_name: source_name.into(),
            location: Some(location),
        }
    }

    /// Create a script timeout error
    pub fn timeout(elapsed_ms: u64, limit_ms: u64) -> Self {
        Error::Timeout {
            elapsed_ms,
            limit_ms,
        }
    }

    /// Create a native host-operation error
    pub fn host(message: impl Into<String>) -> Self {
        Error::Host(message.into())
    }

    /// True for configuration errors
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }

    /// True for script timeouts
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// True for compile and runtime script faults (the embedder-policy
    /// recoverable category; timeouts are not part of it)
    pub fn is_script_fault(&self) -> bool {
        matches!(self, Error::Compile { .. } | Error::Script { .. })
    }
}

/// Result type alias for Gossamer
pub type Result<T> = std::result::Result<T, Error>;

/// Standardized error message templates
///
/// These constants keep descriptor-table diagnostics consistent across the
/// registry. Use the helper functions below to generate formatted messages.
pub mod messages {
    // Configuration errors
    pub const DUPLICATE_MEMBER: &str = "is exposed by two applicable descriptors";
    pub const NO_APPLICABLE_NAME: &str = "declares alternate exposed names but none is applicable";
    pub const AMBIGUOUS_NAME: &str = "has more than one applicable exposed name";
    pub const UNKNOWN_PARENT: &str = "names an unregistered parent class";
    pub const PARENT_CYCLE: &str = "participates in a parent-class cycle";
    pub const INVALID_IDENTIFIER: &str = "is not a valid script identifier";
    pub const ALREADY_REGISTERED: &str = "is already registered";

    /// Format a duplicate-member message naming the offending member
    pub fn duplicate_member(member: &str) -> String {
        format!("member '{}' {}", member, DUPLICATE_MEMBER)
    }

    /// Format an ambiguous-exposed-name message listing the candidates
    pub fn ambiguous_name(first: &str, second: &str) -> String {
        format!("{} ('{}' and '{}')", AMBIGUOUS_NAME, first, second)
    }

    /// Format an unknown-parent message naming the missing class
    pub fn unknown_parent(parent: &str) -> String {
        format!("{} ('{}')", UNKNOWN_PARENT, parent)
    }

    /// Format an invalid-identifier message for a rejected name
    pub fn invalid_identifier(name: &str) -> String {
        format!("name '{}' {}", name, INVALID_IDENTIFIER)
    }
}
