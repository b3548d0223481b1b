//! Typed configuration entities and the typed mapper
//! (component F) that encodes/decodes them over the intermediate
//! [`Value`] tree. The mapper never touches raw text or the tokenizer —
//! only [`Value`].

use base64::Engine as _;
use indexmap::IndexMap;

use crate::error::{ProfileError, Result};
use crate::registry::Registry;
use crate::rule::{Rule, RuleFormatStyle};
use crate::tree::Value;

/// Validates that `text` is well-formed standard base64 (the MitM `p12`
/// blob and a proxy's `certificate_pinning` are both base64-encoded). The
/// engine never decodes the PKCS12 bytes themselves — certificate issuance
/// is out of scope — it only guards against a corrupted profile value.
fn validate_base64(field: &str, text: &str) -> Result<()> {
    base64::engine::general_purpose::STANDARD
        .decode(text)
        .map(|_| ())
        .map_err(|e| ProfileError::DataCorrupted(format!("{field} is not valid base64: {e}")))
}

pub const DIRECT_NAME: &str = "DIRECT";
pub const REJECT_NAME: &str = "REJECT";
pub const REJECT_TINYGIF_NAME: &str = "REJECT-TINYGIF";

/// The three built-in policies, in the order they are prepended on decode
/// when absent from user input.
pub const BUILTIN_NAMES: [&str; 3] = [DIRECT_NAME, REJECT_NAME, REJECT_TINYGIF_NAME];

/// `[General]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicSettings {
    pub log_level: String,
    pub dns_servers: Vec<String>,
    pub exceptions: Vec<String>,
    pub http_listen_address: Option<String>,
    pub http_listen_port: Option<u16>,
    pub socks_listen_address: Option<String>,
    pub socks_listen_port: Option<u16>,
    pub exclude_simple_hostnames: bool,
}

impl Default for BasicSettings {
    fn default() -> Self {
        BasicSettings {
            log_level: "info".to_string(),
            dns_servers: Vec::new(),
            exceptions: Vec::new(),
            http_listen_address: None,
            http_listen_port: None,
            socks_listen_address: None,
            socks_listen_port: None,
            exclude_simple_hostnames: false,
        }
    }
}

/// `[MitM]` section.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ManInTheMiddleSettings {
    pub skip_certificate_verification: bool,
    pub hostnames: Vec<String>,
    pub p12: Option<String>,
    pub passphrase: Option<String>,
}

/// The cipher suite a `ss` proxy speaks. Defaults to `aes-128-gcm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Aes128Gcm,
    Aes256Gcm,
    Chacha20Poly1305,
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::Aes128Gcm
    }
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Aes128Gcm => "aes-128-gcm",
            Algorithm::Aes256Gcm => "aes-256-gcm",
            Algorithm::Chacha20Poly1305 => "chacha20-poly1305",
        }
    }

    pub fn parse(text: &str) -> Result<Algorithm> {
        match text {
            "aes-128-gcm" => Ok(Algorithm::Aes128Gcm),
            "aes-256-gcm" => Ok(Algorithm::Aes256Gcm),
            "chacha20-poly1305" => Ok(Algorithm::Chacha20Poly1305),
            other => Err(ProfileError::DataCorrupted(format!(
                "unknown algorithm: {other}"
            ))),
        }
    }
}

/// A remote proxy endpoint. All optional fields default to
/// empty/`false`; [`Proxy::encode`] omits any field equal to its default.
#[derive(Debug, Clone, PartialEq)]
pub struct Proxy {
    pub server_address: String,
    pub port: u16,
    pub protocol: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub authentication_required: bool,
    pub prefer_http_tunneling: bool,
    pub over_tls: bool,
    pub over_websocket: bool,
    pub web_socket_path: String,
    pub skip_certificate_verification: bool,
    pub sni: String,
    pub certificate_pinning: String,
    pub algorithm: Algorithm,
}

impl Proxy {
    fn decode(protocol: &str, map: &IndexMap<String, Value>) -> Result<Proxy> {
        let get_str = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
        let get_bool = |key: &str| map.get(key).and_then(Value::as_bool).unwrap_or(false);
        let server_address = get_str("serverAddress").unwrap_or_default();
        let port = map
            .get("port")
            .and_then(Value::as_number_text)
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(0);
        let algorithm = match get_str("algorithm") {
            Some(text) => Algorithm::parse(&text)?,
            None => Algorithm::default(),
        };
        let certificate_pinning = get_str("certificatePinning").unwrap_or_default();
        if !certificate_pinning.is_empty() {
            validate_base64("certificate-pinning", &certificate_pinning)?;
        }

        Ok(Proxy {
            server_address,
            port,
            protocol: protocol.to_string(),
            username: get_str("username"),
            password: get_str("password"),
            authentication_required: get_bool("authenticationRequired"),
            prefer_http_tunneling: get_bool("preferHttpTunneling"),
            over_tls: get_bool("overTls"),
            over_websocket: get_bool("overWebsocket"),
            web_socket_path: get_str("webSocketPath").unwrap_or_default(),
            skip_certificate_verification: get_bool("skipCertificateVerification"),
            sni: get_str("sni").unwrap_or_default(),
            certificate_pinning,
            algorithm,
        })
    }

    fn encode(&self) -> IndexMap<String, Value> {
        let mut map = IndexMap::new();
        map.insert(
            "serverAddress".to_string(),
            Value::String(self.server_address.clone()),
        );
        map.insert("port".to_string(), Value::Number(self.port.to_string()));
        map.insert(
            "protocol".to_string(),
            Value::String(self.protocol.clone()),
        );
        if let Some(username) = &self.username {
            map.insert("username".to_string(), Value::String(username.clone()));
        }
        if let Some(password) = &self.password {
            map.insert("password".to_string(), Value::String(password.clone()));
        }
        if self.authentication_required {
            map.insert(
                "authenticationRequired".to_string(),
                Value::Bool(true),
            );
        }
        if self.prefer_http_tunneling {
            map.insert("preferHttpTunneling".to_string(), Value::Bool(true));
        }
        if self.over_tls {
            map.insert("overTls".to_string(), Value::Bool(true));
        }
        if self.over_websocket {
            map.insert("overWebsocket".to_string(), Value::Bool(true));
        }
        if !self.web_socket_path.is_empty() {
            map.insert(
                "webSocketPath".to_string(),
                Value::String(self.web_socket_path.clone()),
            );
        }
        if self.skip_certificate_verification {
            map.insert(
                "skipCertificateVerification".to_string(),
                Value::Bool(true),
            );
        }
        if !self.sni.is_empty() {
            map.insert("sni".to_string(), Value::String(self.sni.clone()));
        }
        if !self.certificate_pinning.is_empty() {
            map.insert(
                "certificatePinning".to_string(),
                Value::String(self.certificate_pinning.clone()),
            );
        }
        if !matches!(self.algorithm, Algorithm::Aes128Gcm) {
            map.insert(
                "algorithm".to_string(),
                Value::String(self.algorithm.as_str().to_string()),
            );
        }
        map
    }
}

/// A named, polymorphic endpoint behavior. `Direct`/`Reject`/
/// `RejectTinygif` are value-less beyond their name; `Proxy` carries a full
/// [`Proxy`] sub-object.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionPolicy {
    Direct { name: String },
    Reject { name: String },
    RejectTinygif { name: String },
    Proxy { name: String, proxy: Proxy },
}

impl ConnectionPolicy {
    pub fn name(&self) -> &str {
        match self {
            ConnectionPolicy::Direct { name }
            | ConnectionPolicy::Reject { name }
            | ConnectionPolicy::RejectTinygif { name }
            | ConnectionPolicy::Proxy { name, .. } => name,
        }
    }

    pub fn type_tag(&self) -> &str {
        match self {
            ConnectionPolicy::Direct { .. } => "direct",
            ConnectionPolicy::Reject { .. } => "reject",
            ConnectionPolicy::RejectTinygif { .. } => "reject-tinygif",
            ConnectionPolicy::Proxy { proxy, .. } => &proxy.protocol,
        }
    }

    pub fn builtin(name: &str) -> ConnectionPolicy {
        match name {
            DIRECT_NAME => ConnectionPolicy::Direct {
                name: DIRECT_NAME.to_string(),
            },
            REJECT_NAME => ConnectionPolicy::Reject {
                name: REJECT_NAME.to_string(),
            },
            REJECT_TINYGIF_NAME => ConnectionPolicy::RejectTinygif {
                name: REJECT_TINYGIF_NAME.to_string(),
            },
            other => panic!("{other} is not a built-in policy name"),
        }
    }

    /// Decodes one `{name, type, [proxy]}` envelope. `type` is either a
    /// built-in tag (`direct`/`reject`/`reject-tinygif`) or a proxy
    /// protocol name. Fails with [`ProfileError::InvalidLine`] if a
    /// built-in name is paired with a mismatched type tag (invariant 5).
    pub fn decode(map: &IndexMap<String, Value>) -> Result<ConnectionPolicy> {
        let name = map
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ProfileError::DataCorrupted("policy missing name".to_string()))?
            .to_string();
        let type_tag = map
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ProfileError::DataCorrupted("policy missing type".to_string()))?;

        let policy = match type_tag {
            "direct" => ConnectionPolicy::Direct { name },
            "reject" => ConnectionPolicy::Reject { name },
            "reject-tinygif" => ConnectionPolicy::RejectTinygif { name },
            protocol => {
                let proxy_map = map
                    .get("proxy")
                    .and_then(Value::as_map)
                    .cloned()
                    .unwrap_or_default();
                ConnectionPolicy::Proxy {
                    name,
                    proxy: Proxy::decode(protocol, &proxy_map)?,
                }
            }
        };

        if let Some(builtin_name) = BUILTIN_NAMES.iter().find(|n| **n == policy.name()) {
            if policy.type_tag() != ConnectionPolicy::builtin(builtin_name).type_tag() {
                return Err(ProfileError::InvalidLine {
                    cursor: 0,
                    description: format!(
                        "{builtin_name} is used as built-in policy type \"{}\", but must be used with type \"{}\"",
                        policy.type_tag(),
                        ConnectionPolicy::builtin(builtin_name).type_tag()
                    ),
                });
            }
        }

        Ok(policy)
    }

    pub fn encode(&self) -> Value {
        let mut map = IndexMap::new();
        map.insert("name".to_string(), Value::String(self.name().to_string()));
        map.insert(
            "type".to_string(),
            Value::String(self.type_tag().to_string()),
        );
        if let ConnectionPolicy::Proxy { proxy, .. } = self {
            map.insert("proxy".to_string(), Value::Map(proxy.encode()));
        }
        Value::Map(map)
    }
}

/// A named selector over one or more policies.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyGroup {
    pub name: String,
    pub kind: String,
    pub policies: Vec<String>,
}

impl PolicyGroup {
    pub fn decode(map: &IndexMap<String, Value>) -> Result<PolicyGroup> {
        let name = map
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ProfileError::DataCorrupted("policy group missing name".to_string()))?
            .to_string();
        let kind = map
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("select")
            .to_string();
        let policies = map
            .get("policies")
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(PolicyGroup {
            name,
            kind,
            policies,
        })
    }

    pub fn encode(&self) -> Value {
        let mut map = IndexMap::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert("type".to_string(), Value::String(self.kind.clone()));
        map.insert(
            "policies".to_string(),
            Value::List(self.policies.iter().cloned().map(Value::String).collect()),
        );
        Value::Map(map)
    }
}

/// The root entity: settings, the policy/group/rule lists.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub basic_settings: BasicSettings,
    pub man_in_the_middle_settings: ManInTheMiddleSettings,
    pub policies: Vec<ConnectionPolicy>,
    pub policy_groups: Vec<PolicyGroup>,
    pub rules: Vec<Rule>,
}

impl Default for Profile {
    fn default() -> Self {
        Profile {
            basic_settings: BasicSettings::default(),
            man_in_the_middle_settings: ManInTheMiddleSettings::default(),
            policies: BUILTIN_NAMES.iter().map(|n| ConnectionPolicy::builtin(n)).collect(),
            policy_groups: Vec::new(),
            rules: Vec::new(),
        }
    }
}

/// Prepends any of [`BUILTIN_NAMES`] missing from `declared`, in builtin
/// order, ahead of whatever was explicitly declared.
fn with_missing_builtins_prepended(declared: Vec<ConnectionPolicy>) -> Vec<ConnectionPolicy> {
    let missing: Vec<ConnectionPolicy> = BUILTIN_NAMES
        .iter()
        .filter(|name| !declared.iter().any(|p| p.name() == **name))
        .map(|name| ConnectionPolicy::builtin(name))
        .collect();
    missing.into_iter().chain(declared).collect()
}

/// Decodes a full [`Profile`] from the intermediate tree (component F).
/// `rules` are canonical description strings parsed through `registry`.
pub fn decode_profile(tree: &Value, registry: &Registry) -> Result<Profile> {
    let root = tree
        .as_map()
        .ok_or_else(|| ProfileError::DataCorrupted("profile root is not a map".to_string()))?;

    let basic_settings = match root.get("basicSettings").and_then(Value::as_map) {
        Some(map) => decode_basic_settings(map),
        None => BasicSettings::default(),
    };

    let man_in_the_middle_settings = match root.get("manInTheMiddleSettings").and_then(Value::as_map) {
        Some(map) => decode_mitm_settings(map)?,
        None => ManInTheMiddleSettings::default(),
    };

    let declared_policies = match root.get("policies").and_then(Value::as_list) {
        Some(items) => items
            .iter()
            .filter_map(Value::as_map)
            .map(ConnectionPolicy::decode)
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };
    let policies = with_missing_builtins_prepended(declared_policies);

    let policy_groups = match root.get("policyGroups").and_then(Value::as_list) {
        Some(items) => items
            .iter()
            .filter_map(Value::as_map)
            .map(PolicyGroup::decode)
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    let rules = match root.get("rules").and_then(Value::as_list) {
        Some(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| registry.parse(s))
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    Ok(Profile {
        basic_settings,
        man_in_the_middle_settings,
        policies,
        policy_groups,
        rules,
    })
}

/// Encodes a [`Profile`] back to the intermediate tree (component F). The
/// reverse of [`decode_profile`]; rule encoding always uses
/// [`RuleFormatStyle::complete`] except for `FINAL`, which has no
/// expression slot.
pub fn encode_profile(profile: &Profile) -> Value {
    let mut root = IndexMap::new();

    root.insert(
        "basicSettings".to_string(),
        Value::Map(encode_basic_settings(&profile.basic_settings)),
    );
    root.insert(
        "manInTheMiddleSettings".to_string(),
        Value::Map(encode_mitm_settings(&profile.man_in_the_middle_settings)),
    );
    root.insert(
        "policies".to_string(),
        Value::List(profile.policies.iter().map(ConnectionPolicy::encode).collect()),
    );
    root.insert(
        "policyGroups".to_string(),
        Value::List(profile.policy_groups.iter().map(PolicyGroup::encode).collect()),
    );
    root.insert(
        "rules".to_string(),
        Value::List(
            profile
                .rules
                .iter()
                .map(|r| {
                    let style = if r.label() == "FINAL" {
                        RuleFormatStyle::omitted()
                    } else {
                        RuleFormatStyle::complete()
                    };
                    Value::String(r.format(&style))
                })
                .collect(),
        ),
    );

    Value::Map(root)
}

fn decode_basic_settings(map: &IndexMap<String, Value>) -> BasicSettings {
    let mut settings = BasicSettings::default();
    if let Some(level) = map.get("loglevel").and_then(Value::as_str) {
        settings.log_level = level.to_string();
    }
    if let Some(items) = map.get("dnsServers").and_then(Value::as_list) {
        settings.dns_servers = items.iter().filter_map(Value::as_str).map(str::to_string).collect();
    }
    if let Some(items) = map.get("exceptions").and_then(Value::as_list) {
        settings.exceptions = items.iter().filter_map(Value::as_str).map(str::to_string).collect();
    }
    settings.http_listen_address = map
        .get("httpListenAddress")
        .and_then(Value::as_str)
        .map(str::to_string);
    settings.http_listen_port = map
        .get("httpListenPort")
        .and_then(Value::as_number_text)
        .and_then(|s| s.parse().ok());
    settings.socks_listen_address = map
        .get("socksListenAddress")
        .and_then(Value::as_str)
        .map(str::to_string);
    settings.socks_listen_port = map
        .get("socksListenPort")
        .and_then(Value::as_number_text)
        .and_then(|s| s.parse().ok());
    if let Some(b) = map.get("excludeSimpleHostnames").and_then(Value::as_bool) {
        settings.exclude_simple_hostnames = b;
    }
    settings
}

fn encode_basic_settings(settings: &BasicSettings) -> IndexMap<String, Value> {
    let mut map = IndexMap::new();
    map.insert(
        "loglevel".to_string(),
        Value::String(settings.log_level.clone()),
    );
    if !settings.dns_servers.is_empty() {
        map.insert(
            "dnsServers".to_string(),
            Value::List(settings.dns_servers.iter().cloned().map(Value::String).collect()),
        );
    }
    if !settings.exceptions.is_empty() {
        map.insert(
            "exceptions".to_string(),
            Value::List(settings.exceptions.iter().cloned().map(Value::String).collect()),
        );
    }
    if let Some(address) = &settings.http_listen_address {
        map.insert("httpListenAddress".to_string(), Value::String(address.clone()));
    }
    if let Some(port) = settings.http_listen_port {
        map.insert("httpListenPort".to_string(), Value::Number(port.to_string()));
    }
    if let Some(address) = &settings.socks_listen_address {
        map.insert("socksListenAddress".to_string(), Value::String(address.clone()));
    }
    if let Some(port) = settings.socks_listen_port {
        map.insert("socksListenPort".to_string(), Value::Number(port.to_string()));
    }
    if settings.exclude_simple_hostnames {
        map.insert("excludeSimpleHostnames".to_string(), Value::Bool(true));
    }
    map
}

fn decode_mitm_settings(map: &IndexMap<String, Value>) -> Result<ManInTheMiddleSettings> {
    let p12 = map.get("p12").and_then(Value::as_str).map(str::to_string);
    if let Some(blob) = &p12 {
        validate_base64("p12", blob)?;
    }
    Ok(ManInTheMiddleSettings {
        skip_certificate_verification: map
            .get("skipCertificateVerification")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        hostnames: map
            .get("hostnames")
            .and_then(Value::as_list)
            .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default(),
        p12,
        passphrase: map
            .get("passphrase")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn encode_mitm_settings(settings: &ManInTheMiddleSettings) -> IndexMap<String, Value> {
    let mut map = IndexMap::new();
    if settings.skip_certificate_verification {
        map.insert(
            "skipCertificateVerification".to_string(),
            Value::Bool(true),
        );
    }
    if !settings.hostnames.is_empty() {
        map.insert(
            "hostnames".to_string(),
            Value::List(settings.hostnames.iter().cloned().map(Value::String).collect()),
        );
    }
    if let Some(p12) = &settings.p12 {
        map.insert("p12".to_string(), Value::String(p12.clone()));
    }
    if let Some(passphrase) = &settings.passphrase {
        map.insert("passphrase".to_string(), Value::String(passphrase.clone()));
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_profile_tree_uses_camel_case_keys_throughout_not_just_at_the_top_level() {
        // Regression test: encode_basic_settings/encode_mitm_settings/
        // Proxy::encode used to insert kebab-case keys directly, leaving the
        // tree internally inconsistent (camelCase at the top level, kebab
        // underneath) even though text re-emission happened to look right.
        let mut profile = Profile::default();
        profile.basic_settings.http_listen_port = Some(6152);
        profile.basic_settings.exclude_simple_hostnames = true;
        profile.policies.push(ConnectionPolicy::Proxy {
            name: "HTTP".to_string(),
            proxy: Proxy {
                server_address: "127.0.0.1".to_string(),
                port: 8310,
                protocol: "http".to_string(),
                username: None,
                password: None,
                authentication_required: false,
                prefer_http_tunneling: true,
                over_tls: false,
                over_websocket: false,
                web_socket_path: String::new(),
                skip_certificate_verification: false,
                sni: String::new(),
                certificate_pinning: String::new(),
                algorithm: Algorithm::default(),
            },
        });

        let tree = encode_profile(&profile);
        let basic = tree.as_map().unwrap().get("basicSettings").unwrap().as_map().unwrap();
        assert!(basic.contains_key("httpListenPort"));
        assert!(basic.contains_key("excludeSimpleHostnames"));
        assert!(!basic.contains_key("http-listen-port"));

        let policies = tree.as_map().unwrap().get("policies").unwrap().as_list().unwrap();
        let http = policies
            .iter()
            .find(|p| p.as_map().unwrap().get("name").and_then(Value::as_str) == Some("HTTP"))
            .unwrap();
        let proxy = http.as_map().unwrap().get("proxy").unwrap().as_map().unwrap();
        assert!(proxy.contains_key("serverAddress"));
        assert!(proxy.contains_key("preferHttpTunneling"));
        assert!(!proxy.contains_key("server-address"));

        // Decoding this tree directly, with no text round trip in between,
        // must recover what was encoded.
        let decoded = decode_basic_settings(basic);
        assert_eq!(decoded.http_listen_port, Some(6152));
        assert!(decoded.exclude_simple_hostnames);
    }

    #[test]
    fn decode_basic_settings_reads_listen_ports_stored_as_numbers() {
        let mut map = IndexMap::new();
        map.insert("httpListenPort".to_string(), Value::Number("6152".to_string()));
        map.insert("socksListenPort".to_string(), Value::Number("6153".to_string()));
        let settings = decode_basic_settings(&map);
        assert_eq!(settings.http_listen_port, Some(6152));
        assert_eq!(settings.socks_listen_port, Some(6153));
    }

    #[test]
    fn default_profile_has_only_the_three_builtins() {
        let profile = Profile::default();
        let names: Vec<&str> = profile.policies.iter().map(ConnectionPolicy::name).collect();
        assert_eq!(names, vec![DIRECT_NAME, REJECT_NAME, REJECT_TINYGIF_NAME]);
    }

    #[test]
    fn missing_builtins_are_prepended_in_order() {
        let custom = vec![ConnectionPolicy::Proxy {
            name: "HTTP".to_string(),
            proxy: Proxy {
                server_address: "127.0.0.1".to_string(),
                port: 8310,
                protocol: "http".to_string(),
                username: None,
                password: None,
                authentication_required: false,
                prefer_http_tunneling: false,
                over_tls: false,
                over_websocket: false,
                web_socket_path: String::new(),
                skip_certificate_verification: false,
                sni: String::new(),
                certificate_pinning: String::new(),
                algorithm: Algorithm::default(),
            },
        }];
        let result = with_missing_builtins_prepended(custom);
        let names: Vec<&str> = result.iter().map(ConnectionPolicy::name).collect();
        assert_eq!(
            names,
            vec![DIRECT_NAME, REJECT_NAME, REJECT_TINYGIF_NAME, "HTTP"]
        );
    }

    #[test]
    fn already_declared_builtins_are_not_duplicated() {
        let declared = vec![ConnectionPolicy::builtin(DIRECT_NAME)];
        let result = with_missing_builtins_prepended(declared);
        let names: Vec<&str> = result.iter().map(ConnectionPolicy::name).collect();
        assert_eq!(names, vec![DIRECT_NAME, REJECT_NAME, REJECT_TINYGIF_NAME]);
    }

    #[test]
    fn proxy_encode_omits_default_valued_fields() {
        let proxy = Proxy {
            server_address: "127.0.0.1".to_string(),
            port: 8310,
            protocol: "http".to_string(),
            username: None,
            password: None,
            authentication_required: false,
            prefer_http_tunneling: false,
            over_tls: false,
            over_websocket: false,
            web_socket_path: String::new(),
            skip_certificate_verification: false,
            sni: String::new(),
            certificate_pinning: String::new(),
            algorithm: Algorithm::default(),
        };
        let map = proxy.encode();
        assert!(!map.contains_key("algorithm"));
        assert!(!map.contains_key("sni"));
        assert!(!map.contains_key("username"));
        assert_eq!(map.get("port"), Some(&Value::Number("8310".to_string())));
    }

    #[test]
    fn decode_policy_scenario_2_from_spec() {
        let mut proxy_map = IndexMap::new();
        proxy_map.insert("port".to_string(), Value::Number("8310".to_string()));
        proxy_map.insert(
            "serverAddress".to_string(),
            Value::String("127.0.0.1".to_string()),
        );
        let mut envelope = IndexMap::new();
        envelope.insert("name".to_string(), Value::String("HTTP".to_string()));
        envelope.insert("type".to_string(), Value::String("http".to_string()));
        envelope.insert("proxy".to_string(), Value::Map(proxy_map));

        let policy = ConnectionPolicy::decode(&envelope).unwrap();
        match policy {
            ConnectionPolicy::Proxy { name, proxy } => {
                assert_eq!(name, "HTTP");
                assert_eq!(proxy.protocol, "http");
                assert_eq!(proxy.port, 8310);
                assert_eq!(proxy.server_address, "127.0.0.1");
            }
            _ => panic!("expected a proxy policy"),
        }
    }

    #[test]
    fn builtin_name_with_mismatched_type_is_rejected() {
        let mut envelope = IndexMap::new();
        envelope.insert("name".to_string(), Value::String(DIRECT_NAME.to_string()));
        envelope.insert("type".to_string(), Value::String("reject".to_string()));
        let err = ConnectionPolicy::decode(&envelope).unwrap_err();
        assert!(matches!(err, ProfileError::InvalidLine { .. }));
    }

    #[test]
    fn mitm_p12_must_be_valid_base64() {
        let mut map = IndexMap::new();
        map.insert("p12".to_string(), Value::String("not base64!!".to_string()));
        let err = decode_mitm_settings(&map).unwrap_err();
        assert!(matches!(err, ProfileError::DataCorrupted(_)));
    }

    #[test]
    fn mitm_p12_accepts_valid_base64() {
        let mut map = IndexMap::new();
        map.insert("p12".to_string(), Value::String("aGVsbG8=".to_string()));
        let settings = decode_mitm_settings(&map).unwrap();
        assert_eq!(settings.p12.as_deref(), Some("aGVsbG8="));
    }

    #[test]
    fn proxy_certificate_pinning_must_be_valid_base64() {
        let mut proxy_map = IndexMap::new();
        proxy_map.insert(
            "certificatePinning".to_string(),
            Value::String("not base64!!".to_string()),
        );
        let err = Proxy::decode("http", &proxy_map).unwrap_err();
        assert!(matches!(err, ProfileError::DataCorrupted(_)));
    }
}
