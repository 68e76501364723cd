//! Error types for the quarry-core library.
//!
//! This module provides comprehensive error handling using the `thiserror` crate.
//! Errors fall into two families: fatal scheduling-configuration errors that
//! abort a run before any pass executes, and per-pass analysis errors that the
//! scheduler isolates and degrades into diagnostics.

use thiserror::Error;

/// Result type alias for quarry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all quarry operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The pass dependency graph contains a cycle
    #[error("dependency cycle among extraction passes: {remaining:?}")]
    DependencyCycle {
        /// Identifiers of the passes stuck in the cycle
        remaining: Vec<String>,
    },

    /// A pass declares a dependency that no registered pass provides
    #[error("pass '{pass}' depends on '{capability}' but no pass provides it")]
    UnknownCapability {
        /// Identifier of the dependent pass
        pass: String,
        /// The unsatisfiable capability name
        capability: String,
    },

    /// Two passes claim to produce the same capability
    #[error("capability '{capability}' is provided by both '{first}' and '{second}'")]
    DuplicateProvider {
        /// The doubly-provided capability name
        capability: String,
        /// Identifier of the first provider
        first: String,
        /// Identifier of the second provider
        second: String,
    },

    /// A class lookup against the repository came back empty
    #[error("class '{name}' not found in repository")]
    ClassNotFound {
        /// Internal name of the missing class
        name: String,
    },

    /// A method lookup inside a loaded class came back empty
    #[error("method '{method}' not found in class '{class}'")]
    MethodNotFound {
        /// Internal name of the class searched
        class: String,
        /// Name of the missing method
        method: String,
    },

    /// A bytecode landmark a pass relies on could not be located
    #[error("couldn't find {landmark} in '{class}'")]
    LandmarkNotFound {
        /// Internal name of the class searched
        class: String,
        /// Description of the expected landmark
        landmark: String,
    },

    /// The simulated operand stack ran dry mid-walk
    #[error("operand stack underflow while walking {class}.{method}")]
    StackUnderflow {
        /// Internal name of the class being walked
        class: String,
        /// Name of the method being walked
        method: String,
    },

    /// A JVM type or method descriptor failed to parse
    #[error("invalid descriptor '{descriptor}' at offset {offset}")]
    InvalidDescriptor {
        /// The malformed descriptor string
        descriptor: String,
        /// Byte offset where parsing failed
        offset: usize,
    },

    /// A callback received an `invokedynamic` it does not model
    #[error("unhandled invokedynamic targeting {class}.{method}")]
    UnhandledInvokeDynamic {
        /// Class named by the call site descriptor
        class: String,
        /// Method named by the call site descriptor
        method: String,
    },

    /// Aggregate data a pass requires is missing or has the wrong shape
    #[error("aggregate is missing '{key}' (expected from an earlier pass)")]
    MissingAggregateKey {
        /// Dotted path of the absent entry
        key: String,
    },

    /// Generic internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new missing-class error
    pub fn class_not_found(name: impl Into<String>) -> Self {
        Self::ClassNotFound { name: name.into() }
    }

    /// Creates a new missing-method error
    pub fn method_not_found(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            class: class.into(),
            method: method.into(),
        }
    }

    /// Creates a new missing-landmark error
    pub fn landmark(class: impl Into<String>, landmark: impl Into<String>) -> Self {
        Self::LandmarkNotFound {
            class: class.into(),
            landmark: landmark.into(),
        }
    }

    /// Creates a new stack underflow error
    pub fn stack_underflow(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self::StackUnderflow {
            class: class.into(),
            method: method.into(),
        }
    }

    /// Creates a new descriptor parse error
    pub fn invalid_descriptor(descriptor: impl Into<String>, offset: usize) -> Self {
        Self::InvalidDescriptor {
            descriptor: descriptor.into(),
            offset,
        }
    }

    /// Creates a new missing-aggregate-key error
    pub fn missing_aggregate_key(key: impl Into<String>) -> Self {
        Self::MissingAggregateKey { key: key.into() }
    }

    /// Creates a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true if this error is a scheduling-configuration error.
    ///
    /// Fatal errors abort the whole pipeline before any pass runs; everything
    /// else is confined to the failing pass and degrades to partial output.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DependencyCycle { .. }
                | Self::UnknownCapability { .. }
                | Self::DuplicateProvider { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::landmark("abc", "the friction setter");
        assert!(err.to_string().contains("friction setter"));
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_is_fatal() {
        let cycle = Error::DependencyCycle {
            remaining: vec!["a".into(), "b".into()],
        };
        assert!(cycle.is_fatal());
        assert!(!Error::class_not_found("xyz").is_fatal());
        assert!(!Error::stack_underflow("xyz", "<clinit>").is_fatal());
    }
}
