//! Rule registry (component B): maps a [`Label`] to a [`RuleKind`]
//! descriptor (minimum arity, validator, constructor, external-resource
//! flag). Registrations happen once at startup in the common case but the
//! registry itself is read-many/write-rare process-wide state guarded by an
//! `RwLock`.
//!
//! Tests that register custom kinds use a fresh [`Registry::with_builtins`]
//! instance rather than [`Registry::global`] so state never leaks across
//! test cases.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use crate::error::{ProfileError, Result};
use crate::rule::{self, Rule, RuleFields};

/// A rule-kind descriptor. `validator` re-verifies a description parses as
/// this kind (used to produce precise [`ProfileError::FailedToParseAs`]
/// messages); `constructor` builds the typed [`Rule`] from a parsed
/// description.
#[derive(Clone)]
pub struct RuleKind {
    pub label: String,
    pub min_fields: usize,
    pub has_external_resource: bool,
    validator: fn(&str, &str, usize) -> Result<RuleFields>,
    constructor: fn(&str, RuleFields) -> Result<Rule>,
}

impl RuleKind {
    pub fn new(label: impl Into<String>, min_fields: usize, has_external_resource: bool) -> Self {
        RuleKind {
            label: label.into(),
            min_fields,
            has_external_resource,
            validator: rule::parse_fields,
            constructor: Rule::construct,
        }
    }

    fn validate(&self, description: &str) -> Result<RuleFields> {
        (self.validator)(description, &self.label, self.min_fields)
    }

    fn construct(&self, _description: &str, fields: RuleFields) -> Result<Rule> {
        (self.constructor)(&self.label, fields)
    }
}

/// Process-wide rule registry. Reads take a shared lock; registrations take
/// an exclusive lock. Registration is idempotent: registering the same
/// label twice replaces the prior descriptor (last-writer-wins).
pub struct Registry {
    kinds: RwLock<HashMap<String, RuleKind>>,
}

impl Registry {
    /// An empty registry with no kinds registered — only useful as a base
    /// for tests that want full control over what's registered.
    pub fn empty() -> Self {
        Registry {
            kinds: RwLock::new(HashMap::new()),
        }
    }

    /// A fresh registry pre-populated with the seven built-in rule kinds.
    /// Every test that needs an isolated registry should start here.
    pub fn with_builtins() -> Self {
        let registry = Registry::empty();
        for (label, min_fields, has_resource) in [
            ("DOMAIN", 2, false),
            ("DOMAIN-SUFFIX", 2, false),
            ("DOMAIN-KEYWORD", 2, false),
            ("DOMAIN-SET", 2, true),
            ("RULE-SET", 2, true),
            ("GEOIP", 2, false),
            ("FINAL", 1, false),
        ] {
            registry.register(RuleKind::new(label, min_fields, has_resource));
        }
        registry
    }

    /// The process-wide default registry, lazily initialized with the
    /// built-in kinds on first access.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::with_builtins)
    }

    /// Registers (or re-registers) a rule kind. Idempotent: a second
    /// registration under the same label overwrites the first.
    pub fn register(&self, kind: RuleKind) {
        let mut guard = self.kinds.write().expect("registry lock poisoned");
        if guard.contains_key(&kind.label) {
            tracing::debug!(label = %kind.label, "rule kind re-registered, replacing prior descriptor");
        }
        guard.insert(kind.label.clone(), kind);
    }

    pub fn lookup(&self, label: &str) -> Option<RuleKind> {
        self.kinds
            .read()
            .expect("registry lock poisoned")
            .get(label)
            .cloned()
    }

    /// Parses a raw description string into a typed [`Rule`] by extracting
    /// its tag and dispatching to the matching registered kind.
    ///
    /// Errors: [`ProfileError::UnsupportedRule`] if the tag isn't
    /// registered; [`ProfileError::RuleFieldMissing`] if the description has
    /// fewer fields than the kind requires.
    pub fn parse(&self, description: &str) -> Result<Rule> {
        let label = rule::peek_label(description)
            .ok_or_else(|| ProfileError::DataCorrupted(format!("empty rule line: {description:?}")))?;
        let kind = self
            .lookup(&label)
            .ok_or_else(|| ProfileError::UnsupportedRule(label.clone()))?;
        let fields = kind.validate(description)?;
        kind.construct(description, fields)
    }

    /// Parses `description`, requiring it to be of kind `expected_label`.
    /// If the tag is registered but names a *different* kind, returns
    /// [`ProfileError::FailedToParseAs`]; if the tag isn't registered at
    /// all, returns [`ProfileError::UnsupportedRule`].
    pub fn parse_as(&self, expected_label: &str, description: &str) -> Result<Rule> {
        let actual_label = rule::peek_label(description)
            .ok_or_else(|| ProfileError::DataCorrupted(format!("empty rule line: {description:?}")))?;
        if actual_label != expected_label {
            if self.lookup(&actual_label).is_some() {
                return Err(ProfileError::FailedToParseAs {
                    expected: expected_label.to_string(),
                    actual: actual_label,
                });
            }
            return Err(ProfileError::UnsupportedRule(actual_label));
        }
        self.parse(description)
    }
}
