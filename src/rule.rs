//! Rule data model, parser, and formatter (component C).
//!
//! A `Rule` is parsed from and formatted back to a single "description"
//! line: `[# ]<TAG>,[<expression>,]<policy>[ // <comment>]`. Parsing and
//! formatting are kept free of the registry (component B) so they can be
//! unit-tested per kind without touching process-wide state; the registry
//! wires a [`Label`] to the right constructor/validator pair.

use crate::error::{ProfileError, Result};
use crate::resource::ExternalResource;

/// The uppercase rule-kind tag, e.g. `DOMAIN-SUFFIX`, `GEOIP`.
pub type Label = String;

/// Fields every rule kind carries (all carry `expression`, `policy`,
/// `disabled` flag, optional `comment`). `expression` is `None` only for
/// `FINAL`, which has arity 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFields {
    pub expression: Option<String>,
    pub policy: String,
    pub disabled: bool,
    pub comment: Option<String>,
}

/// The seven built-in rule kinds. `DomainSet`/`RuleSet` additionally
/// carry a lazily-loaded [`ExternalResource`] of child lines.
#[derive(Debug, Clone)]
pub enum Rule {
    Domain(RuleFields),
    DomainSuffix(RuleFields),
    DomainKeyword(RuleFields),
    DomainSet(RuleFields, ExternalResource),
    RuleSet(RuleFields, ExternalResource),
    Geoip(RuleFields),
    Final(RuleFields),
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.label() == other.label() && self.fields() == other.fields()
    }
}

impl Rule {
    pub fn label(&self) -> &'static str {
        match self {
            Rule::Domain(_) => "DOMAIN",
            Rule::DomainSuffix(_) => "DOMAIN-SUFFIX",
            Rule::DomainKeyword(_) => "DOMAIN-KEYWORD",
            Rule::DomainSet(_, _) => "DOMAIN-SET",
            Rule::RuleSet(_, _) => "RULE-SET",
            Rule::Geoip(_) => "GEOIP",
            Rule::Final(_) => "FINAL",
        }
    }

    pub fn fields(&self) -> &RuleFields {
        match self {
            Rule::Domain(f)
            | Rule::DomainSuffix(f)
            | Rule::DomainKeyword(f)
            | Rule::DomainSet(f, _)
            | Rule::RuleSet(f, _)
            | Rule::Geoip(f)
            | Rule::Final(f) => f,
        }
    }

    pub fn policy(&self) -> &str {
        &self.fields().policy
    }

    /// `None` for `FINAL`; the kind's expression text otherwise (literal
    /// domain/geoip/keyword, or the external-resource URL for
    /// `DOMAIN-SET`/`RULE-SET`).
    pub fn expression(&self) -> Option<&str> {
        self.fields().expression.as_deref()
    }

    pub fn disabled(&self) -> bool {
        self.fields().disabled
    }

    pub fn comment(&self) -> Option<&str> {
        self.fields().comment.as_deref()
    }

    /// The external-resource holder for `DOMAIN-SET`/`RULE-SET`, `None` for
    /// every other kind.
    pub fn external_resource(&self) -> Option<&ExternalResource> {
        match self {
            Rule::DomainSet(_, r) | Rule::RuleSet(_, r) => Some(r),
            _ => None,
        }
    }

    /// Minimum field count after the tag.
    pub fn min_fields_for(label: &str) -> usize {
        if label == "FINAL" {
            1
        } else {
            2
        }
    }

    pub fn has_external_resource(label: &str) -> bool {
        matches!(label, "DOMAIN-SET" | "RULE-SET")
    }

    /// Construct a `Rule` of the kind named by `label` from its fields.
    /// Used by the registry's per-kind constructor closures.
    pub fn construct(label: &str, fields: RuleFields) -> Result<Rule> {
        match label {
            "DOMAIN" => Ok(Rule::Domain(fields)),
            "DOMAIN-SUFFIX" => Ok(Rule::DomainSuffix(fields)),
            "DOMAIN-KEYWORD" => Ok(Rule::DomainKeyword(fields)),
            "DOMAIN-SET" => {
                let url = fields.expression.clone().unwrap_or_default();
                validate_external_url(&url)?;
                Ok(Rule::DomainSet(fields, ExternalResource::new(url)))
            }
            "RULE-SET" => {
                let url = fields.expression.clone().unwrap_or_default();
                validate_external_url(&url)?;
                Ok(Rule::RuleSet(fields, ExternalResource::new(url)))
            }
            "GEOIP" => Ok(Rule::Geoip(fields)),
            "FINAL" => Ok(Rule::Final(fields)),
            other => Err(ProfileError::UnsupportedRule(other.to_string())),
        }
    }

    /// Format this rule back to its canonical description text, honoring
    /// `style`'s field subset selection.
    pub fn format(&self, style: &RuleFormatStyle) -> String {
        let fields = self.fields();
        let mut out = String::new();

        if style.flag && fields.disabled {
            out.push_str("# ");
        }
        if style.symbols {
            out.push_str(self.label());
        }
        if style.expression {
            if let Some(expr) = &fields.expression {
                if style.symbols {
                    out.push(',');
                }
                out.push_str(expr);
            }
        }
        if style.policy {
            if style.symbols || style.expression {
                out.push(',');
            }
            out.push_str(&fields.policy);
        }
        if style.comment {
            if let Some(comment) = &fields.comment {
                out.push_str(" // ");
                out.push_str(comment);
            }
        }
        out
    }
}

/// Selects which fields [`Rule::format`] emits. When no field is toggled
/// on, all fields are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleFormatStyle {
    pub flag: bool,
    pub symbols: bool,
    pub expression: bool,
    pub policy: bool,
    pub comment: bool,
}

impl RuleFormatStyle {
    /// All fields, including the expression. The default canonical form
    /// for every kind except `FINAL`.
    pub fn complete() -> Self {
        RuleFormatStyle {
            flag: true,
            symbols: true,
            expression: true,
            policy: true,
            comment: true,
        }
    }

    /// All fields except the expression — used for `FINAL`, which has no
    /// expression slot.
    pub fn omitted() -> Self {
        RuleFormatStyle {
            expression: false,
            ..RuleFormatStyle::complete()
        }
    }

    pub fn with_flag(mut self, value: bool) -> Self {
        self.flag = value;
        self
    }
    pub fn with_symbols(mut self, value: bool) -> Self {
        self.symbols = value;
        self
    }
    pub fn with_expression(mut self, value: bool) -> Self {
        self.expression = value;
        self
    }
    pub fn with_policy(mut self, value: bool) -> Self {
        self.policy = value;
        self
    }
    pub fn with_comment(mut self, value: bool) -> Self {
        self.comment = value;
        self
    }
}

impl Default for RuleFormatStyle {
    fn default() -> Self {
        RuleFormatStyle::complete()
    }
}

/// Strips the disabled-rule marker the formatter emits (a literal `# `
/// prefix directly before the tag, canonical form `[# ]<tag>,...` —
/// note this is a prefix, not a comma-separated component, unlike the rest
/// of the description). Returns `(disabled, remainder)`.
fn strip_disabled_marker(body: &str) -> (bool, &str) {
    match body.strip_prefix('#') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, body),
    }
}

/// Extracts the leading tag from a raw description, after stripping an
/// optional `# ` disabled marker. Returns `None` for a blank description.
pub fn peek_label(description: &str) -> Option<String> {
    let trimmed = strip_comment(description.trim()).0.trim();
    let (_, body) = strip_disabled_marker(trimmed);
    let first = body.splitn(2, ',').next()?.trim();
    if first.is_empty() {
        None
    } else {
        Some(first.to_string())
    }
}

/// Parses `description` as a rule of kind `label`, requiring at least
/// `min_fields` non-empty fields after the tag.
pub fn parse_fields(description: &str, label: &str, min_fields: usize) -> Result<RuleFields> {
    let trimmed = description.trim();
    let (body, comment) = strip_comment(trimmed);
    let (disabled, body) = strip_disabled_marker(body.trim());

    let mut parts: Vec<&str> = if body.is_empty() {
        Vec::new()
    } else {
        body.split(',').map(str::trim).collect()
    };

    if parts.is_empty() || parts[0] != label {
        let actual = parts.first().copied().unwrap_or("").to_string();
        return Err(ProfileError::FailedToParseAs {
            expected: label.to_string(),
            actual,
        });
    }
    parts.remove(0);

    // A trailing comma with nothing after it (`FINAL,`) splits into one
    // empty-string field rather than zero fields; treat it as missing.
    if parts.len() < min_fields || parts.iter().any(|p| p.is_empty()) {
        return Err(ProfileError::RuleFieldMissing {
            label: label.to_string(),
            minimum: min_fields,
        });
    }

    let (expression, policy) = if min_fields == 1 {
        (None, parts[0].to_string())
    } else {
        (Some(parts[0].to_string()), parts[1].to_string())
    };

    Ok(RuleFields {
        expression,
        policy,
        disabled,
        comment,
    })
}

/// Splits off a trailing ` // comment` (exactly two slashes, surrounded by
/// spaces) from `text`. Returns the remaining body (trimmed) and the
/// comment text, if any.
fn strip_comment(text: &str) -> (&str, Option<String>) {
    match text.rfind(" // ") {
        Some(idx) => (text[..idx].trim_end(), Some(text[idx + 4..].trim().to_string())),
        None => (text, None),
    }
}

fn validate_external_url(url: &str) -> Result<()> {
    url::Url::parse(url)
        .map(|_| ())
        .map_err(|e| ProfileError::InvalidExternalResources(format!("{url}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(expr: Option<&str>, policy: &str, disabled: bool, comment: Option<&str>) -> RuleFields {
        RuleFields {
            expression: expr.map(str::to_string),
            policy: policy.to_string(),
            disabled,
            comment: comment.map(str::to_string),
        }
    }

    #[test]
    fn parses_simple_domain_rule() {
        let f = parse_fields("DOMAIN,example.com,DIRECT", "DOMAIN", 2).unwrap();
        assert_eq!(f, fields(Some("example.com"), "DIRECT", false, None));
    }

    #[test]
    fn parses_disabled_rule_with_comment() {
        let f = parse_fields("# DOMAIN,example.com,DIRECT // note", "DOMAIN", 2).unwrap();
        assert_eq!(f, fields(Some("example.com"), "DIRECT", true, Some("note")));
    }

    #[test]
    fn final_rule_has_no_expression() {
        let f = parse_fields("FINAL,PROXY", "FINAL", 1).unwrap();
        assert_eq!(f, fields(None, "PROXY", false, None));
    }

    #[test]
    fn final_without_policy_fails_with_field_missing() {
        let err = parse_fields("FINAL,", "FINAL", 1).unwrap_err();
        assert_eq!(
            err,
            ProfileError::RuleFieldMissing {
                label: "FINAL".to_string(),
                minimum: 1
            }
        );
    }

    #[test]
    fn mismatched_tag_fails_with_failed_to_parse_as() {
        let err = parse_fields("GEOIP,CN,DIRECT", "DOMAIN", 2).unwrap_err();
        assert_eq!(
            err,
            ProfileError::FailedToParseAs {
                expected: "DOMAIN".to_string(),
                actual: "GEOIP".to_string()
            }
        );
    }

    #[test]
    fn format_round_trips_disabled_rule_with_comment() {
        let rule = Rule::Domain(fields(Some("example.com"), "DIRECT", true, Some("note")));
        let text = rule.format(&RuleFormatStyle::complete());
        assert_eq!(text, "# DOMAIN,example.com,DIRECT // note");
        let reparsed = parse_fields(&text, "DOMAIN", 2).unwrap();
        assert_eq!(reparsed, *rule.fields());
    }

    #[test]
    fn final_formats_without_expression_using_omitted_style() {
        let rule = Rule::Final(fields(None, "DIRECT", false, None));
        assert_eq!(rule.format(&RuleFormatStyle::omitted()), "FINAL,DIRECT");
    }

    #[test]
    fn peek_label_sees_through_disabled_marker() {
        assert_eq!(peek_label("# FINAL,DIRECT // note").as_deref(), Some("FINAL"));
        assert_eq!(
            peek_label("DOMAIN-SUFFIX,example.com,PROXY").as_deref(),
            Some("DOMAIN-SUFFIX")
        );
    }

    #[test]
    fn domain_set_rejects_invalid_url() {
        let f = fields(Some("not a url"), "PROXY", false, None);
        let err = Rule::construct("DOMAIN-SET", f).unwrap_err();
        assert!(matches!(err, ProfileError::InvalidExternalResources(_)));
    }

    #[test]
    fn rule_set_carries_unloaded_external_resource() {
        let f = fields(Some("https://example.com/set.list"), "PROXY", false, None);
        let rule = Rule::construct("RULE-SET", f).unwrap();
        let resource = rule.external_resource().expect("rule-set carries a resource");
        assert!(!resource.is_loaded());
        assert_eq!(resource.url(), "https://example.com/set.list");
    }
}
