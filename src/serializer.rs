//! Profile serializer (component E): drives the tokenizer over the byte
//! stream and builds the intermediate tree (forward), and reconstructs
//! canonical profile text from the tree (reverse). The forward direction
//! also runs the cross-reference validator (component G) as its final
//! phase, so a successfully-returned tree is always reference-complete.

use indexmap::IndexMap;

use crate::error::{ProfileError, Result};
use crate::keys::{camel_to_kebab, kebab_to_camel};
use crate::profile::BUILTIN_NAMES;
use crate::registry::Registry;
use crate::tokenizer::{Token, Tokenizer};
use crate::tree::Value;

/// Parses raw profile bytes into the intermediate [`Value`] tree
/// (forward direction of component E), validating cross-references
/// (component G) as the final phase.
pub fn json_object(input: &[u8], registry: &Registry) -> Result<Value> {
    let text = std::str::from_utf8(input)
        .map_err(|e| ProfileError::DataCorrupted(format!("input is not valid utf-8: {e}")))?;

    let mut current_section: Option<String> = None;
    let mut root: IndexMap<String, Value> = IndexMap::new();

    // `declared_policies` is seeded with the built-ins so the validation
    // phase below always accepts them — the pre-validation policy set
    // therefore always includes the three built-ins.
    let mut declared_policies: Vec<String> = BUILTIN_NAMES.iter().map(|s| s.to_string()).collect();
    let mut groups: Vec<(usize, String, Vec<String>)> = Vec::new();
    let mut rule_lines: Vec<(usize, String)> = Vec::new();

    for (cursor, token, raw) in Tokenizer::new(text) {
        if let Token::Section(marker) = &token {
            current_section = Some(marker.clone());
            continue;
        }
        if matches!(token, Token::Blank) {
            continue;
        }
        // A disabled rule line (`# TAG,...`) tokenizes as Comment at the
        // line-tokenizer level (component A has no section awareness), but
        // inside [Rule] it is a rule, not a comment to discard. Outside
        // [Rule], Comment tokens are genuinely ignorable — any line inside
        // [Rule] is a raw string regardless of token shape, and that
        // extends to this ambiguity too.
        if matches!(token, Token::Comment) && current_section.as_deref() != Some("[Rule]") {
            continue;
        }

        let section = current_section.clone().ok_or_else(|| ProfileError::DataCorrupted(
            format!("line {cursor}: content before any [Section] header"),
        ))?;

        match section.as_str() {
            "[Rule]" => {
                // Open Question 2: every non-blank line inside [Rule] is the
                // raw line text, regardless of whether it happened to
                // tokenize as KeyValue (an expression containing `=` must
                // not lose its `=`) or Comment (a disabled rule's `# ` marker
                // reads like a comment to the tokenizer).
                rule_lines.push((cursor, raw.clone()));
                push_list(&mut root, "rules", Value::String(raw));
            }
            "[Policies]" => {
                let (name, value) = expect_key_value(&token, cursor, "[Policies]")?;
                let (type_tag, kvs) = parse_policy_value(value);
                reject_mismatched_builtin(cursor, name, &type_tag)?;
                if !declared_policies.iter().any(|p| p == name) {
                    declared_policies.push(name.to_string());
                }

                let mut entry = IndexMap::new();
                entry.insert("name".to_string(), Value::String(name.to_string()));
                entry.insert("type".to_string(), Value::String(type_tag.clone()));
                if !kvs.is_empty() {
                    let mut proxy = IndexMap::new();
                    proxy.insert("protocol".to_string(), Value::String(type_tag));
                    for (k, v) in kvs {
                        proxy.insert(kebab_to_camel(&k), Value::coerce_by_key(&k, &v));
                    }
                    entry.insert("proxy".to_string(), Value::Map(proxy));
                }
                // A repeated policy name overwrites the prior declaration
                // rather than adding a second entry (invariant 1: policy
                // names are unique across a profile).
                replace_or_push_by_name(&mut root, "policies", name, Value::Map(entry));
            }
            "[Policy Group]" => {
                let (name, value) = expect_key_value(&token, cursor, "[Policy Group]")?;
                let (kind, members) = parse_group_value(value);
                if let Some(existing) = groups.iter_mut().find(|(_, n, _)| n == name) {
                    *existing = (cursor, name.to_string(), members.clone());
                } else {
                    groups.push((cursor, name.to_string(), members.clone()));
                }

                let mut entry = IndexMap::new();
                entry.insert("name".to_string(), Value::String(name.to_string()));
                entry.insert("type".to_string(), Value::String(kind));
                entry.insert(
                    "policies".to_string(),
                    Value::List(members.into_iter().map(Value::String).collect()),
                );
                // A repeated group name overwrites the prior declaration
                // rather than adding a second entry (invariant 2: group
                // names are unique).
                replace_or_push_by_name(&mut root, "policyGroups", name, Value::Map(entry));
            }
            other => {
                let top_key = kebab_to_camel(other);
                let entry = root.entry(top_key).or_insert(Value::Null);
                match &token {
                    Token::KeyValue(key, value) => {
                        if matches!(entry, Value::Null) {
                            *entry = Value::map();
                        }
                        if let Value::Map(map) = entry {
                            map.insert(kebab_to_camel(key), Value::coerce_by_key(key, value));
                        }
                    }
                    Token::BareString(s) => {
                        if matches!(entry, Value::Null) {
                            *entry = Value::List(Vec::new());
                        }
                        if let Value::List(list) = entry {
                            list.push(Value::String(s.clone()));
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    validate_group_members(&groups, &declared_policies)?;
    validate_rule_lines(&rule_lines, &declared_policies, &groups, registry)?;

    Ok(Value::Map(root))
}

fn push_list(root: &mut IndexMap<String, Value>, key: &str, item: Value) {
    match root.entry(key.to_string()).or_insert_with(|| Value::List(Vec::new())) {
        Value::List(list) => list.push(item),
        _ => unreachable!("{key} is always initialized as a list"),
    }
}

/// Inserts `item` (a `Map` with a `"name"` field) into the list at `key`,
/// replacing any existing entry whose `"name"` matches rather than
/// appending a duplicate — `[Policies]`/`[Policy Group]` entries are
/// keyed by name even though they're stored as a list, and a repeated name
/// assigns in place rather than declaring a second policy/group.
fn replace_or_push_by_name(root: &mut IndexMap<String, Value>, key: &str, name: &str, item: Value) {
    match root.entry(key.to_string()).or_insert_with(|| Value::List(Vec::new())) {
        Value::List(list) => {
            let existing = list.iter().position(|entry| {
                entry
                    .as_map()
                    .and_then(|m| m.get("name"))
                    .and_then(Value::as_str)
                    == Some(name)
            });
            match existing {
                Some(idx) => list[idx] = item,
                None => list.push(item),
            }
        }
        _ => unreachable!("{key} is always initialized as a list"),
    }
}

fn expect_key_value<'a>(token: &'a Token, cursor: usize, section: &str) -> Result<(&'a str, &'a str)> {
    match token {
        Token::KeyValue(k, v) => Ok((k.as_str(), v.as_str())),
        _ => Err(ProfileError::InvalidLine {
            cursor,
            description: format!("expected `name = value` inside {section}"),
        }),
    }
}

fn reject_mismatched_builtin(cursor: usize, name: &str, type_tag: &str) -> Result<()> {
    if let Some(builtin) = BUILTIN_NAMES.iter().find(|n| **n == name) {
        let expected = builtin_type_tag(builtin);
        if type_tag != expected {
            return Err(ProfileError::InvalidLine {
                cursor,
                description: format!(
                    "{builtin} is used as built-in policy type \"{type_tag}\", but must be used with type \"{expected}\""
                ),
            });
        }
    }
    Ok(())
}

fn builtin_type_tag(name: &str) -> &'static str {
    match name {
        "DIRECT" => "direct",
        "REJECT" => "reject",
        "REJECT-TINYGIF" => "reject-tinygif",
        _ => unreachable!("builtin_type_tag called with a non-builtin name"),
    }
}

/// `name = <type>[, k = v, …]` -> (type, [(k, v), …]).
fn parse_policy_value(value: &str) -> (String, Vec<(String, String)>) {
    let mut parts = value.split(',').map(str::trim);
    let type_tag = parts.next().unwrap_or("").to_string();
    let kvs = parts
        .filter_map(|part| {
            part.find('=').map(|eq| {
                (part[..eq].trim().to_string(), part[eq + 1..].trim().to_string())
            })
        })
        .collect();
    (type_tag, kvs)
}

/// `name = <kind>, policies = a, b, c` -> (kind, [a, b, c]).
fn parse_group_value(value: &str) -> (String, Vec<String>) {
    let (kind, rest) = value.split_once(',').unwrap_or((value, ""));
    let kind = kind.trim().to_string();
    let rest = rest.trim();
    let members = match rest.find('=') {
        Some(eq) if rest[..eq].trim() == "policies" => rest[eq + 1..]
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    (kind, members)
}

fn validate_group_members(
    groups: &[(usize, String, Vec<String>)],
    declared_policies: &[String],
) -> Result<()> {
    for (cursor, _name, members) in groups {
        for member in members {
            if !declared_policies.iter().any(|p| p == member) {
                return Err(ProfileError::UnknownPolicy {
                    cursor: *cursor,
                    name: member.clone(),
                });
            }
        }
    }
    Ok(())
}

fn validate_rule_lines(
    rule_lines: &[(usize, String)],
    declared_policies: &[String],
    groups: &[(usize, String, Vec<String>)],
    registry: &Registry,
) -> Result<()> {
    for (cursor, raw) in rule_lines {
        let rule = registry
            .parse(raw)
            .map_err(|e| ProfileError::InvalidLine {
                cursor: *cursor,
                description: format!("{raw}: {e}"),
            })?;
        let policy = rule.policy();
        let resolves = declared_policies.iter().any(|p| p == policy)
            || groups.iter().any(|(_, name, _)| name == policy);
        if !resolves {
            return Err(ProfileError::UnknownPolicy {
                cursor: *cursor,
                name: policy.to_string(),
            });
        }
    }
    Ok(())
}

/// Reconstructs canonical profile text from the intermediate tree (reverse
/// direction of component E). Top-level keys are sorted lexicographically;
/// each maps back to its section marker via [`camel_to_kebab`].
pub fn bytes(tree: &Value) -> Vec<u8> {
    let empty = IndexMap::new();
    let root = tree.as_map().unwrap_or(&empty);
    let mut keys: Vec<&String> = root.keys().collect();
    keys.sort();

    let mut out = String::new();
    for key in keys {
        let value = &root[key];
        let marker = section_marker(key);
        out.push_str(&marker);
        out.push('\n');
        match key.as_str() {
            "policyGroups" => emit_policy_groups(value, &mut out),
            "policies" => emit_policies(value, &mut out),
            _ => emit_generic(value, &mut out),
        }
        out.push('\n');
    }

    collapse_blank_lines(out.trim_end_matches('\n')).into_bytes()
}

fn section_marker(camel_key: &str) -> String {
    let kebab = camel_to_kebab(camel_key);
    if kebab.starts_with('[') {
        kebab
    } else {
        format!("[{kebab}]")
    }
}

fn emit_generic(value: &Value, out: &mut String) {
    match value {
        Value::Map(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for k in keys {
                let kebab = camel_to_kebab(k);
                out.push_str(&kebab);
                out.push_str(" = ");
                out.push_str(&map[k].to_string());
                out.push('\n');
            }
        }
        Value::List(items) => {
            for item in items {
                out.push_str(&item.to_string());
                out.push('\n');
            }
        }
        _ => {}
    }
}

fn emit_policies(value: &Value, out: &mut String) {
    let Value::List(items) = value else { return };
    for item in items {
        let Value::Map(map) = item else { continue };
        let name = map.get("name").and_then(Value::as_str).unwrap_or("");
        let type_tag = map.get("type").and_then(Value::as_str).unwrap_or("");
        out.push_str(name);
        out.push_str(" = ");
        out.push_str(type_tag);
        if let Some(Value::Map(proxy)) = map.get("proxy") {
            let mut keys: Vec<&String> = proxy.keys().filter(|k| *k != "protocol").collect();
            keys.sort();
            for k in keys {
                out.push_str(", ");
                out.push_str(&camel_to_kebab(k));
                out.push_str(" = ");
                out.push_str(&proxy[k].to_string());
            }
        }
        out.push('\n');
    }
}

fn emit_policy_groups(value: &Value, out: &mut String) {
    let Value::List(items) = value else { return };
    for item in items {
        let Value::Map(map) = item else { continue };
        let name = map.get("name").and_then(Value::as_str).unwrap_or("");
        let kind = map.get("type").and_then(Value::as_str).unwrap_or("select");
        let policies = map
            .get("policies")
            .and_then(Value::as_list)
            .map(|l| l.iter().filter_map(Value::as_str).collect::<Vec<_>>().join(", "))
            .unwrap_or_default();
        out.push_str(name);
        out.push_str(" = ");
        out.push_str(kind);
        out.push_str(", policies = ");
        out.push_str(&policies);
        out.push('\n');
    }
}

/// Collapses any run of 3+ consecutive newlines (2+ blank lines) down to a
/// single blank line.
fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = 0;
    for ch in text.chars() {
        if ch == '\n' {
            run += 1;
            if run <= 2 {
                out.push(ch);
            }
        } else {
            run = 0;
            out.push(ch);
        }
    }
    out.push('\n');
    out
}
