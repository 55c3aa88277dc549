use thiserror::Error;

/// A name that doesn't match any variant of a closed enumeration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind} `{value}`")]
pub struct ParseVariantError {
    /// What was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl ParseVariantError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
