//! Bidirectional conversion between the INI dialect's kebab-case keys /
//! bracketed section markers and the intermediate tree's camelCase keys
//! (component H).
//!
//! Six section markers have a hard-coded mapping; every other key follows
//! the generic kebab<->camel rule.

/// `[General]`, `[Rule]`, `[Policies]`, `[Policy Group]`, `[MitM]` each map
/// to a fixed top-level tree key. Order matters only for readability here;
/// lookups are linear over five entries.
const SECTION_MARKERS: &[(&str, &str)] = &[
    ("[General]", "basicSettings"),
    ("[Rule]", "rules"),
    ("[Policies]", "policies"),
    ("[Policy Group]", "policyGroups"),
    ("[MitM]", "manInTheMiddleSettings"),
];

/// Convert a section marker or a generic kebab-case key to its camelCase
/// tree key. Section markers take the hard-coded mapping; anything else is
/// split on `-`, the first segment lowercased, later segments title-cased.
/// Leading/trailing `-` runs are preserved as-is (they never occur in
/// practice but the rule must not panic on them).
pub fn kebab_to_camel(key: &str) -> String {
    if let Some((_, camel)) = SECTION_MARKERS.iter().find(|(marker, _)| *marker == key) {
        return camel.to_string();
    }

    let leading_dashes = key.chars().take_while(|c| *c == '-').count();
    let trailing_dashes = key.chars().rev().take_while(|c| *c == '-').count();
    let core = &key[leading_dashes..key.len() - trailing_dashes];
    if core.is_empty() {
        return key.to_string();
    }

    let mut segments = core.split('-').filter(|s| !s.is_empty());
    let mut out = String::from(&"-".repeat(leading_dashes));
    if let Some(first) = segments.next() {
        out.push_str(&first.to_lowercase());
    }
    for segment in segments {
        out.push_str(&title_case(segment));
    }
    out.push_str(&"-".repeat(trailing_dashes));
    out
}

/// Inverse of [`kebab_to_camel`]: section markers map back from their
/// camelCase tree key; anything else lowercases the first character and
/// inserts a `-` before every uppercase letter, which is itself lowercased.
pub fn camel_to_kebab(key: &str) -> String {
    if let Some((marker, _)) = SECTION_MARKERS.iter().find(|(_, camel)| *camel == key) {
        return marker.to_string();
    }

    let mut out = String::with_capacity(key.len() + 4);
    for (i, ch) in key.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
        } else if i == 0 {
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn title_case(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// All recognized section markers, in the order the forward serializer
/// should be willing to recognize them. Used by the tokenizer/serializer to
/// validate a `[Name]` line corresponds to a known section.
pub fn recognized_section_markers() -> impl Iterator<Item = &'static str> {
    SECTION_MARKERS.iter().map(|(marker, _)| *marker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_markers_round_trip() {
        for (marker, camel) in SECTION_MARKERS {
            assert_eq!(kebab_to_camel(marker), *camel);
            assert_eq!(camel_to_kebab(camel), *marker);
        }
    }

    #[test]
    fn generic_kebab_to_camel() {
        assert_eq!(kebab_to_camel("exclude-simple-hostnames"), "excludeSimpleHostnames");
        assert_eq!(kebab_to_camel("http-listen-port"), "httpListenPort");
        assert_eq!(kebab_to_camel("server-address"), "serverAddress");
    }

    #[test]
    fn generic_camel_to_kebab() {
        assert_eq!(camel_to_kebab("excludeSimpleHostnames"), "exclude-simple-hostnames");
        assert_eq!(camel_to_kebab("httpListenPort"), "http-listen-port");
        assert_eq!(camel_to_kebab("serverAddress"), "server-address");
    }

    #[test]
    fn bijection_on_generic_keys() {
        for key in ["dns-servers", "skip-certificate-verification", "over-websocket"] {
            assert_eq!(camel_to_kebab(&kebab_to_camel(key)), key);
        }
    }
}
