/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 */

//! Declarative claim-to-attribute and claim-to-role mapping.
//!
//! Mappings are configured as pipe lists, one `source|target` pair per line:
//!
//! ```text
//! given_name|field_first_name
//! family_name|field_last_name
//! ```
//!
//! Role mapping only ever grants or revokes roles that appear as a target in
//! its own rule list. Every other role on the account is left alone.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;

use super::account::{AccountEdit, LocalAccount};
use super::profile::ExternalProfile;

/// Account fields the login flow manages itself. Mappings onto them are skipped.
pub const RESERVED_TARGETS: [&str; 7] = ["uid", "name", "mail", "init", "is_new", "status", "pass"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRule {
    pub source: String,
    pub target: String,
}

/// Parse a pipe list. Each line splits on its first `|`; lines without two
/// non-empty fields are skipped.
pub fn parse_mapping_list(text: &str) -> Vec<MappingRule> {
    text.split(['\r', '\n'])
        .filter_map(|line| {
            let (source, target) = line.split_once('|')?;
            let (source, target) = (source.trim(), target.trim());
            (!source.is_empty() && !target.is_empty()).then(|| MappingRule {
                source: source.to_string(),
                target: target.to_string(),
            })
        })
        .collect()
}

/// Attribute and role mapping rules, parsed once from configuration.
#[derive(Debug, Clone, Default)]
pub struct ClaimMapper {
    attribute_rules: Vec<MappingRule>,
    role_claim: Option<String>,
    role_rules: Vec<MappingRule>,
}

impl ClaimMapper {
    pub fn new(attribute_mapping: &str, role_claim: Option<&str>, role_mapping: &str) -> Self {
        Self {
            attribute_rules: parse_mapping_list(attribute_mapping),
            role_claim: role_claim
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            role_rules: parse_mapping_list(role_mapping),
        }
    }

    /// Apply both mappings, mutating `account` and returning the staged edit.
    pub fn apply(&self, profile: &ExternalProfile, account: &mut LocalAccount) -> AccountEdit {
        let mut edit = AccountEdit::default();
        apply_attribute_mapping(profile, &self.attribute_rules, account, &mut edit);
        if let Some(claim) = &self.role_claim {
            apply_role_mapping(profile, claim, &self.role_rules, account, &mut edit);
        }
        edit
    }
}

/// Copy mapped claims onto account attributes. Unchanged values are not staged.
pub fn apply_attribute_mapping(
    profile: &ExternalProfile,
    rules: &[MappingRule],
    account: &mut LocalAccount,
    edit: &mut AccountEdit,
) {
    for rule in rules {
        if RESERVED_TARGETS.contains(&rule.target.as_str()) {
            debug!(target_field = %rule.target, "skipping mapping onto a managed field");
            continue;
        }
        let value = profile
            .claim(&rule.source)
            .unwrap_or_else(|| Value::String(String::new()));
        if account.attribute(&rule.target) == value {
            debug!(target_field = %rule.target, "mapped value is unchanged");
            continue;
        }
        debug!(source = %rule.source, target_field = %rule.target, "mapped value changed");
        edit.attributes.insert(rule.target.clone(), value.clone());
        account.attributes.insert(rule.target.clone(), value);
    }
}

/// Grant roles whose source value is present in the role claim and revoke the
/// other roles this rule list manages.
pub fn apply_role_mapping(
    profile: &ExternalProfile,
    role_claim: &str,
    rules: &[MappingRule],
    account: &mut LocalAccount,
    edit: &mut AccountEdit,
) {
    let claim_values = role_claim_values(profile.claim(role_claim));

    let managed: BTreeSet<&str> = rules.iter().map(|r| r.target.as_str()).collect();
    let granted: BTreeSet<&str> = rules
        .iter()
        .filter(|r| claim_values.contains(&r.source))
        .map(|r| r.target.as_str())
        .collect();

    let current: BTreeSet<String> = account.roles.clone();
    let desired: BTreeSet<String> = current
        .iter()
        .filter(|role| granted.contains(role.as_str()) || !managed.contains(role.as_str()))
        .cloned()
        .chain(granted.iter().map(|r| r.to_string()))
        .collect();

    if desired == current {
        debug!(account_id = account.id, "no changes to roles detected");
        return;
    }

    for role in desired.difference(&current) {
        edit.roles_revoked.remove(role);
        edit.roles_granted.insert(role.clone());
    }
    for role in current.difference(&desired) {
        edit.roles_granted.remove(role);
        edit.roles_revoked.insert(role.clone());
    }
    debug!(
        account_id = account.id,
        granted = ?edit.roles_granted,
        revoked = ?edit.roles_revoked,
        "changes to roles detected"
    );
    account.roles = desired;
}

/// The role claim may be a single string or a list of strings.
fn role_claim_values(claim: Option<Value>) -> BTreeSet<String> {
    match claim {
        Some(Value::String(s)) => BTreeSet::from([s]),
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => BTreeSet::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::login::account::AccountStatus;

    fn account(roles: &[&str]) -> LocalAccount {
        LocalAccount {
            id: 7,
            username: "alice".into(),
            email: "a@x.com".into(),
            status: AccountStatus::Active,
            attributes: BTreeMap::new(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn profile(value: Value) -> ExternalProfile {
        ExternalProfile::from_value(value).unwrap()
    }

    fn roles(account: &LocalAccount) -> Vec<&str> {
        account.roles.iter().map(String::as_str).collect()
    }

    #[test]
    fn parse_skips_malformed_lines() {
        let rules = parse_mapping_list(
            "given_name|field_first\r\n\n  nickname | field_nick  \nbroken\n|empty\nempty|\n",
        );
        assert_eq!(
            rules,
            vec![
                MappingRule {
                    source: "given_name".into(),
                    target: "field_first".into()
                },
                MappingRule {
                    source: "nickname".into(),
                    target: "field_nick".into()
                },
            ]
        );
    }

    #[test]
    fn parse_splits_on_first_pipe() {
        let rules = parse_mapping_list("groups|editor|admin");
        assert_eq!(
            rules,
            vec![MappingRule {
                source: "groups".into(),
                target: "editor|admin".into()
            }]
        );
    }

    #[test]
    fn parse_keeps_duplicate_targets_in_order() {
        let rules = parse_mapping_list("a|field\nb|field");
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].source, "b");
    }

    #[test]
    fn attribute_mapping_stages_only_changes() {
        let mapper = ClaimMapper::new("given_name|field_first\nnickname|field_nick", None, "");
        let mut acct = account(&[]);
        acct.attributes
            .insert("field_nick".into(), Value::String("ally".into()));
        let p = profile(json!({ "sub": "x", "given_name": "Alice", "nickname": "ally" }));

        let edit = mapper.apply(&p, &mut acct);

        assert_eq!(edit.attributes.len(), 1);
        assert_eq!(edit.attributes["field_first"], json!("Alice"));
        assert_eq!(acct.attribute("field_first"), json!("Alice"));
    }

    #[test]
    fn missing_claim_maps_to_empty_string() {
        let mapper = ClaimMapper::new("department|field_dept", None, "");
        let mut acct = account(&[]);
        acct.attributes
            .insert("field_dept".into(), Value::String("sales".into()));
        let edit = mapper.apply(&profile(json!({ "sub": "x" })), &mut acct);
        assert_eq!(edit.attributes["field_dept"], json!(""));

        let mut fresh = account(&[]);
        let edit = mapper.apply(&profile(json!({ "sub": "x" })), &mut fresh);
        assert!(edit.is_empty(), "absent attribute already reads as empty");
    }

    #[test]
    fn reserved_targets_are_skipped() {
        let mapper = ClaimMapper::new("email|mail\nnickname|name\nsub|uid", None, "");
        let mut acct = account(&[]);
        let p = profile(json!({ "sub": "x", "email": "evil@x.com", "nickname": "root" }));
        let edit = mapper.apply(&p, &mut acct);
        assert!(edit.is_empty());
        assert!(acct.attributes.is_empty());
    }

    #[test]
    fn duplicate_targets_last_write_wins() {
        let mapper = ClaimMapper::new("a|field\nb|field", None, "");
        let mut acct = account(&[]);
        let edit = mapper.apply(&profile(json!({ "sub": "x", "a": "first", "b": "second" })), &mut acct);
        assert_eq!(edit.attributes["field"], json!("second"));
        assert_eq!(acct.attribute("field"), json!("second"));
    }

    #[test]
    fn unmanaged_roles_are_untouched() {
        let mapper = ClaimMapper::new("", Some("role"), "admin|administrator");
        let mut acct = account(&["editor"]);
        let edit = mapper.apply(&profile(json!({ "sub": "x", "role": "admin" })), &mut acct);

        assert_eq!(roles(&acct), vec!["administrator", "editor"]);
        assert_eq!(
            edit.roles_granted.iter().collect::<Vec<_>>(),
            vec!["administrator"]
        );
        assert!(edit.roles_revoked.is_empty());
    }

    #[test]
    fn managed_role_is_revoked_when_claim_drops_it() {
        let mapper = ClaimMapper::new("", Some("groups"), "admin|administrator\nstaff|editor");
        let mut acct = account(&["administrator", "editor", "subscriber"]);
        let edit = mapper.apply(&profile(json!({ "sub": "x", "groups": ["staff"] })), &mut acct);

        assert_eq!(roles(&acct), vec!["editor", "subscriber"]);
        assert!(edit.roles_granted.is_empty());
        assert_eq!(
            edit.roles_revoked.iter().collect::<Vec<_>>(),
            vec!["administrator"]
        );
    }

    #[test]
    fn absent_role_claim_revokes_every_managed_role() {
        let mapper = ClaimMapper::new("", Some("groups"), "admin|administrator");
        let mut acct = account(&["administrator", "editor"]);
        mapper.apply(&profile(json!({ "sub": "x" })), &mut acct);
        assert_eq!(roles(&acct), vec!["editor"]);
    }

    #[test]
    fn role_mapping_is_idempotent() {
        let mapper = ClaimMapper::new(
            "",
            Some("groups"),
            "admin|administrator\nstaff|editor\nguest|viewer",
        );
        let p = profile(json!({ "sub": "x", "groups": ["admin", "guest"] }));
        let mut acct = account(&["editor", "subscriber"]);

        let first = mapper.apply(&p, &mut acct);
        assert!(!first.is_empty());
        let second = mapper.apply(&p, &mut acct);
        assert!(second.is_empty());
        assert_eq!(roles(&acct), vec!["administrator", "subscriber", "viewer"]);
    }

    #[test]
    fn shared_target_stays_granted_if_any_source_matches() {
        let mapper = ClaimMapper::new("", Some("groups"), "a|editor\nb|editor");
        let mut acct = account(&["editor"]);
        let edit = mapper.apply(&profile(json!({ "sub": "x", "groups": ["b"] })), &mut acct);
        assert!(edit.is_empty());
        assert_eq!(roles(&acct), vec!["editor"]);
    }

    #[test]
    fn role_mapping_disabled_without_role_claim() {
        let mapper = ClaimMapper::new("", None, "admin|administrator");
        let mut acct = account(&["administrator"]);
        let edit = mapper.apply(&profile(json!({ "sub": "x" })), &mut acct);
        assert!(edit.is_empty());
        assert_eq!(roles(&acct), vec!["administrator"]);
    }
}
