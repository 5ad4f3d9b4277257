//! Error types for the protocol layer.
//!
//! Each crate in Mindtable defines its own error enum. A `ProtocolError`
//! always means "the request itself was malformed", never "the user
//! isn't allowed" or "the room is full".

/// Errors raised while reading client parameters.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A required field was absent or blank.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field was present but could not be parsed
    /// (e.g. a non-numeric room id).
    #[error("invalid value for {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
}
