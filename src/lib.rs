//! A proxy-profile configuration engine: converts between a human-authored
//! INI-style profile text and a normalized tree of typed configuration
//! objects.
//!
//! The public surface is four functions: [`json_object`] and [`bytes`] move
//! between raw text and the generic intermediate [`Value`] tree (component
//! E); [`decode_profile`] and [`encode_profile`] move between that tree and
//! the strongly typed [`Profile`] (component F), with cross-reference
//! validation (component G) run on both paths.
//!
//! The networking/TLS/DNS runtime that would consume a validated
//! [`Profile`] is out of scope for this crate.

pub mod error;
pub mod keys;
pub mod profile;
pub mod registry;
pub mod resource;
pub mod rule;
pub mod serializer;
pub mod tokenizer;
pub mod tree;
pub mod validator;

pub use error::{ProfileError, Result};
pub use profile::Profile;
pub use registry::{Registry, RuleKind};
pub use rule::{Rule, RuleFields, RuleFormatStyle};
pub use tree::Value;

/// Parses raw profile bytes into the generic intermediate tree
/// (component E forward direction), validating cross-references
/// (component G) along the way.
pub fn json_object(input: &[u8]) -> Result<Value> {
    serializer::json_object(input, Registry::global())
}

/// Reconstructs canonical profile text from the intermediate tree
/// (component E reverse direction).
pub fn bytes(tree: &Value) -> Vec<u8> {
    serializer::bytes(tree)
}

/// Decodes a full [`Profile`] from raw profile bytes: tokenize, build the
/// tree and validate cross-references (component E/G), then map the tree
/// to typed entities (component F), then validate again over the typed
/// result (component G standalone).
pub fn decode_profile(input: &[u8]) -> Result<Profile> {
    let tree = json_object(input)?;
    let decoded = profile::decode_profile(&tree, Registry::global())?;
    validator::validate_profile(&decoded)?;
    Ok(decoded)
}

/// Encodes a [`Profile`] back to canonical profile bytes (component F then
/// component E reverse direction).
pub fn encode_profile(profile: &Profile) -> Vec<u8> {
    let tree = profile::encode_profile(profile);
    bytes(&tree)
}
