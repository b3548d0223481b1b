//! Cross-reference validator (component G), standalone entry point.
//!
//! The forward direction of the serializer (component E) already runs this
//! check against raw text with precise cursors; this module re-runs the
//! same invariant over an already-decoded [`Profile`], as a standalone
//! check after the typed mapper (component F) has run. Cursor information
//! isn't available at this layer, so errors carry `cursor: 0`.

use crate::error::{ProfileError, Result};
use crate::profile::Profile;

/// Checks that every rule's policy and every group member resolves to a
/// declared policy name or a declared group name (rules only; group
/// members may only resolve to a declared policy name).
pub fn validate_profile(profile: &Profile) -> Result<()> {
    let policy_names: Vec<&str> = profile.policies.iter().map(|p| p.name()).collect();
    let group_names: Vec<&str> = profile.policy_groups.iter().map(|g| g.name.as_str()).collect();

    for group in &profile.policy_groups {
        for member in &group.policies {
            if !policy_names.contains(&member.as_str()) {
                return Err(ProfileError::UnknownPolicy {
                    cursor: 0,
                    name: member.clone(),
                });
            }
        }
    }

    for rule in &profile.rules {
        let policy = rule.policy();
        if !policy_names.contains(&policy) && !group_names.contains(&policy) {
            return Err(ProfileError::UnknownPolicy {
                cursor: 0,
                name: policy.to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::PolicyGroup;
    use crate::rule::{Rule, RuleFields};

    #[test]
    fn accepts_a_default_profile() {
        let profile = Profile::default();
        assert!(validate_profile(&profile).is_ok());
    }

    #[test]
    fn rejects_a_rule_targeting_an_undeclared_policy() {
        let mut profile = Profile::default();
        profile.rules.push(Rule::Final(RuleFields {
            expression: None,
            policy: "GHOST".to_string(),
            disabled: false,
            comment: None,
        }));
        let err = validate_profile(&profile).unwrap_err();
        assert_eq!(
            err,
            ProfileError::UnknownPolicy {
                cursor: 0,
                name: "GHOST".to_string()
            }
        );
    }

    #[test]
    fn accepts_a_rule_targeting_a_group() {
        let mut profile = Profile::default();
        profile.policy_groups.push(PolicyGroup {
            name: "PROXY".to_string(),
            kind: "select".to_string(),
            policies: vec!["DIRECT".to_string()],
        });
        profile.rules.push(Rule::Final(RuleFields {
            expression: None,
            policy: "PROXY".to_string(),
            disabled: false,
            comment: None,
        }));
        assert!(validate_profile(&profile).is_ok());
    }

    #[test]
    fn rejects_a_group_member_that_is_not_a_declared_policy() {
        let mut profile = Profile::default();
        profile.policy_groups.push(PolicyGroup {
            name: "PROXY".to_string(),
            kind: "select".to_string(),
            policies: vec!["GHOST".to_string()],
        });
        let err = validate_profile(&profile).unwrap_err();
        assert_eq!(
            err,
            ProfileError::UnknownPolicy {
                cursor: 0,
                name: "GHOST".to_string()
            }
        );
    }
}
