//! Error and warning types.
//!
//! Construction problems are fatal ([`VmError`]); authoring problems inside a
//! template are recoverable and reported as [`Warning`]s while the rest of the
//! template keeps compiling.

use thiserror::Error;

use crate::types::Path;

// =============================================================================
// VmError
// =============================================================================

/// Reasons a [`Vm`](crate::Vm) refuses to initialize. Nothing is compiled when
/// one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    #[error("element must be a live element node")]
    NotAnElement,

    #[error("model must be an object, got {0}")]
    ModelNotObject(&'static str),

    #[error("model key `{0}` cannot contain the path separator '.'")]
    IllegalKey(String),
}

// =============================================================================
// Warning
// =============================================================================

/// A recoverable authoring or structural problem. The binding it concerns is
/// left inert; everything else proceeds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    #[error("{0} is an unknown directive")]
    UnknownDirective(String),

    #[error("malformed {directive} expression `{expression}`")]
    MalformedExpression { directive: String, expression: String },

    #[error("`{0}` for binding class must be an object, string or boolean")]
    ClassSource(Path),

    #[error("`{0}` for binding style must be an object or string")]
    StyleSource(Path),

    #[error("v-model is only for input, select and textarea, not <{0}>")]
    ModelControl(String),

    #[error("checkbox v-model `{0}` must be a boolean or an array")]
    CheckboxSource(Path),

    #[error("select v-model `{0}` must be a string or an array")]
    SelectSource(Path),

    #[error("select v-model `{path}` does not match the multiple attribute (multiple: {multiple})")]
    SelectMultiple { path: Path, multiple: bool },

    #[error("v-for source `{0}` is not an array")]
    ListSource(Path),

    #[error("no value at `{0}` to write into")]
    Unreachable(Path),
}
