//! Generic tagged-union intermediate tree shared by the serializer and the
//! typed mapper. Parsing and emission never touch native representations
//! directly; everything is staged through a [`Value`] first.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use rust_decimal::Decimal;

/// A recursive tagged union: null / bool / number-as-text / string / ordered
/// map / list. Numbers keep their original textual form so that exact
/// integer-width decisions are deferred to the boundary that actually needs
/// a native type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    /// Stored as the exact text that appeared in the source; never
    /// normalized until converted to a native numeric type.
    Number(String),
    String(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    pub fn map() -> Self {
        Value::Map(IndexMap::new())
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extracts textual content from either a `Number` or a `String`
    /// variant. Ports and other numeric fields are stored as `Number` via
    /// [`Value::coerce_by_key`]; callers parsing them into a native integer
    /// should use this rather than [`Value::as_str`].
    pub fn as_number_text(&self) -> Option<&str> {
        match self {
            Value::Number(s) => Some(s),
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Entry point for the boolean coercion rule in 4.D: `"true"`/`"false"`
    /// become native bools, everything else stays a string.
    pub fn coerce_bool(raw: &str) -> Value {
        match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        }
    }

    /// Key-directed coercion used while ingesting `key = value` lines inside
    /// a generic section (4.D):
    /// - `dns-servers` / `exceptions` / `hostnames` split on `,` into a list
    ///   of trimmed strings.
    /// - keys ending in `port` become a `Number`.
    /// - everything else runs through [`Value::coerce_bool`].
    pub fn coerce_by_key(key: &str, raw: &str) -> Value {
        if matches!(key, "dns-servers" | "exceptions" | "hostnames") {
            let items = raw
                .split(',')
                .map(|s| Value::String(s.trim().to_string()))
                .collect();
            return Value::List(items);
        }
        if key.ends_with("port") {
            return Value::Number(raw.trim().to_string());
        }
        Value::coerce_bool(raw)
    }

    /// Convert the tree to a native `serde_json::Value`, converting numbers
    /// to their native form via [`native_number`]. `Map` keys are carried
    /// over unchanged: by the time a key reaches the tree it has already
    /// been converted from kebab-case to camelCase at the point of
    /// insertion (the serializer's forward pass and the typed mapper both
    /// insert camelCase keys directly), so converting again here would
    /// double-apply the conversion and corrupt any key with no more `-`
    /// left to split on.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(text) => native_number(text),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(out)
            }
        }
    }

    /// Inverse of [`Value::to_json`] for the subset of JSON shapes this
    /// engine produces/consumes (object keys already camelCase, numbers
    /// already native). Used by the typed mapper when decoding from raw
    /// JSON input rather than from a freshly-serialized profile.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.to_string()),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                let mut out = IndexMap::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), Value::from_json(v));
                }
                Value::Map(out)
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, ""),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s}"),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(", "))
            }
            Value::Map(_) => write!(f, ""),
        }
    }
}

/// Convert a textual number into its native `serde_json::Value`
/// representation, following the ladder from 4.D:
/// signed 64-bit (<=19 digits) -> unsigned 64-bit (<=20 digits) ->
/// arbitrary-precision decimal (exponent fits, >17 digits) -> double ->
/// zero.
fn native_number(text: &str) -> serde_json::Value {
    let trimmed = text.trim();
    let digit_count = trimmed.chars().filter(|c| c.is_ascii_digit()).count();

    if digit_count <= 19 {
        if let Ok(v) = trimmed.parse::<i64>() {
            return serde_json::Value::Number(v.into());
        }
    }
    if digit_count <= 20 {
        if let Ok(v) = trimmed.parse::<u64>() {
            return serde_json::Value::Number(v.into());
        }
    }
    if digit_count > 17 {
        if let Ok(d) = Decimal::from_str(trimmed) {
            if let Some(n) = serde_json::Number::from_str(&d.to_string()).ok() {
                return serde_json::Value::Number(n);
            }
            return serde_json::Value::String(d.to_string());
        }
    }
    if let Ok(v) = trimmed.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(v) {
            return serde_json::Value::Number(n);
        }
    }
    serde_json::Value::Number(0.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_bool_recognizes_literals() {
        assert_eq!(Value::coerce_bool("true"), Value::Bool(true));
        assert_eq!(Value::coerce_bool("false"), Value::Bool(false));
        assert_eq!(
            Value::coerce_bool("maybe"),
            Value::String("maybe".to_string())
        );
    }

    #[test]
    fn coerce_by_key_splits_list_keys() {
        let v = Value::coerce_by_key("dns-servers", "223.5.5.5, 114.114.114.114");
        match v {
            Value::List(items) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0], Value::String("223.5.5.5".to_string()));
            }
            _ => panic!("expected a list"),
        }
    }

    #[test]
    fn coerce_by_key_treats_port_keys_as_numbers() {
        assert_eq!(
            Value::coerce_by_key("http-listen-port", "6152"),
            Value::Number("6152".to_string())
        );
    }

    #[test]
    fn native_number_ladder_prefers_i64() {
        assert_eq!(native_number("6152"), serde_json::json!(6152));
    }

    #[test]
    fn native_number_falls_back_to_double_for_decimals() {
        assert_eq!(native_number("3.5"), serde_json::json!(3.5));
    }

    #[test]
    fn to_json_passes_through_keys_unchanged() {
        // Keys arrive at the tree already camelCase (the serializer and the
        // typed mapper both convert at insertion time), so `to_json` must
        // not touch them again.
        let mut map = IndexMap::new();
        map.insert("excludeSimpleHostnames".to_string(), Value::Bool(true));
        let tree = Value::Map(map);
        let json = tree.to_json();
        assert_eq!(json["excludeSimpleHostnames"], serde_json::json!(true));
    }

    #[test]
    fn to_json_does_not_double_convert_multi_segment_camel_keys() {
        // Regression test: re-running kebab_to_camel on an already-camelCase
        // key with no `-` left to split on used to lowercase the whole key
        // (`dnsServers` -> `dnsservers`).
        let mut map = IndexMap::new();
        map.insert("dnsServers".to_string(), Value::List(Vec::new()));
        map.insert("httpListenPort".to_string(), Value::Number("6152".to_string()));
        let tree = Value::Map(map);
        let json = tree.to_json();
        assert!(json.get("dnsServers").is_some());
        assert!(json.get("httpListenPort").is_some());
        assert!(json.get("dnsservers").is_none());
        assert!(json.get("httplistenport").is_none());
    }
}
