//! Error types for the profile engine

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("line {cursor}: invalid line: {description}")]
    InvalidLine { cursor: usize, description: String },

    #[error("line {cursor}: unknown policy: {name}")]
    UnknownPolicy { cursor: usize, name: String },

    #[error("profile is not shaped as expected: {0}")]
    DataCorrupted(String),

    #[error("unsupported rule: {0}")]
    UnsupportedRule(String),

    #[error("rule {label} requires at least {minimum} field(s) after the tag")]
    RuleFieldMissing { label: String, minimum: usize },

    #[error("expected rule kind {expected}, but description parses as {actual}")]
    FailedToParseAs { expected: String, actual: String },

    #[error("invalid external resource url: {0}")]
    InvalidExternalResources(String),
}

impl serde::Serialize for ProfileError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProfileError>;
