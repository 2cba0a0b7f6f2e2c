// fmctl - CLI for the Cisco Firepower Management Center API
// Copyright (C) 2026 The fmctl authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Access-rule rewrites: IPS/file policy assignment, prefilter migration and
//! CSV export.

use crate::model::PolicyRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Write;
use tracing::warn;

/// Most rules the FMC accepts in one bulk request.
pub const BULK_LIMIT: usize = 1000;
/// Longest rule name the FMC accepts.
pub const MAX_RULE_NAME: usize = 50;
pub const DEFAULT_VARIABLE_SET: &str = "Default-Set";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicy {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub prefilter_policy_setting: Option<PolicyRef>,
}

/// Named policy or variable set as listed by the FMC.
#[derive(Debug, Clone, Deserialize)]
pub struct NamedItem {
    pub id: String,
    pub name: String,
}

impl From<&NamedItem> for PolicyRef {
    fn from(item: &NamedItem) -> Self {
        Self {
            id: item.id.clone(),
            name: Some(item.name.clone()),
            kind: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub action: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ips_policy: Option<PolicyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_set: Option<PolicyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_policy: Option<PolicyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_files: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_begin: Option<bool>,
    #[serde(
        rename = "sendEventsToFMC",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub send_events_to_fmc: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_comments: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_zones: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_zones: Option<Value>,
    #[allow(dead_code)]
    #[serde(default, skip_serializing)]
    pub links: Option<Value>,
    #[allow(dead_code)]
    #[serde(default, skip_serializing)]
    pub metadata: Option<Value>,
    #[allow(dead_code)]
    #[serde(default, skip_serializing)]
    pub comment_history_list: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefilterRule {
    pub name: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub rule_type: Option<String>,
    #[serde(default)]
    pub source_interfaces: Option<Value>,
    #[serde(default)]
    pub destination_interfaces: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Prefilter-only or server-owned keys with no access rule counterpart.
const PREFILTER_ONLY_KEYS: [&str; 5] = ["id", "type", "links", "metadata", "bidirectional"];

impl PrefilterRule {
    pub fn is_tunnel(&self) -> bool {
        self.rule_type.as_deref() == Some("TUNNEL")
    }
}

/// Inspection settings to stamp onto rules. `ips` without `variable_set`
/// leaves the rule's variable set untouched.
#[derive(Debug, Clone, Default)]
pub struct PolicySelection {
    pub ips: Option<PolicyRef>,
    pub variable_set: Option<PolicyRef>,
    pub file_policy: Option<PolicyRef>,
}

impl PolicySelection {
    fn ips(&self) -> Option<PolicyRef> {
        self.ips.as_ref().map(|p| p.typed("IntrusionPolicy"))
    }

    fn variable_set(&self) -> Option<PolicyRef> {
        self.variable_set.as_ref().map(|p| p.typed("VariableSet"))
    }

    fn file_policy(&self) -> Option<PolicyRef> {
        self.file_policy.as_ref().map(|p| p.typed("FilePolicy"))
    }
}

/// Applies `selection` to ALLOW rules. Unless `all_rules` is set, only rules
/// already carrying an IPS or file policy are touched, and each policy only
/// replaces one the rule already has.
pub fn apply_policies(
    rules: Vec<AccessRule>,
    selection: &PolicySelection,
    all_rules: bool,
) -> Vec<AccessRule> {
    rules
        .into_iter()
        .filter(|rule| rule.action == "ALLOW")
        .filter(|rule| all_rules || rule.ips_policy.is_some() || rule.file_policy.is_some())
        .map(|mut rule| {
            if let Some(ips) = selection.ips()
                && (all_rules || rule.ips_policy.is_some())
            {
                rule.ips_policy = Some(ips);
                if let Some(vset) = selection.variable_set() {
                    rule.variable_set = Some(vset);
                }
            }
            if let Some(file) = selection.file_policy()
                && (all_rules || rule.file_policy.is_some())
            {
                rule.file_policy = Some(file);
            }
            if rule.file_policy.is_none() {
                rule.log_files = None;
            }
            rule
        })
        .collect()
}

/// Converts prefilter rules into access rules. `stamp` is appended to every
/// name; tunnel rules and unknown actions are skipped.
pub fn convert_prefilter(
    rules: Vec<PrefilterRule>,
    selection: &PolicySelection,
    default_vset: Option<&PolicyRef>,
    stamp: &str,
) -> Vec<AccessRule> {
    rules
        .into_iter()
        .filter(|rule| !rule.is_tunnel())
        .filter_map(|mut rule| {
            for key in PREFILTER_ONLY_KEYS {
                rule.extra.remove(key);
            }
            let mut converted = AccessRule {
                kind: Some("AccessRule".into()),
                source_zones: rule.source_interfaces,
                destination_zones: rule.destination_interfaces,
                log_files: Some(false),
                extra: rule.extra,
                ..AccessRule::default()
            };
            let name = format!("Prefilter_{}_{stamp}", rule.name);
            if name.chars().count() > MAX_RULE_NAME {
                converted.name = name.chars().take(MAX_RULE_NAME).collect();
                converted.new_comments = Some(vec![name]);
            } else {
                converted.name = name;
            }

            match rule.action.as_str() {
                "ANALYZE" => {
                    converted.action = "ALLOW".into();
                    if let Some(ips) = selection.ips() {
                        converted.ips_policy = Some(ips);
                        converted.variable_set = selection.variable_set();
                    }
                    if let Some(file) = selection.file_policy() {
                        converted.file_policy = Some(file);
                        converted.log_files = Some(true);
                        converted.send_events_to_fmc = Some(true);
                    }
                }
                "BLOCK" => {
                    converted.action = "BLOCK".into();
                    converted.variable_set = default_vset.map(|v| v.typed("VariableSet"));
                }
                "FASTPATH" => {
                    converted.action = "TRUST".into();
                    converted.log_begin = Some(false);
                }
                other => {
                    warn!(rule = %rule.name, action = other, "skipping prefilter rule with unsupported action");
                    return None;
                }
            }
            Some(converted)
        })
        .collect()
}

/// One line of the rule export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    #[serde(rename = "FMC_NAME")]
    pub fmc_name: String,
    #[serde(rename = "ACP_NAME")]
    pub acp_name: String,
    #[serde(rename = "ACP_TYPE")]
    pub acp_type: String,
    #[serde(rename = "ACP_ID")]
    pub acp_id: String,
    #[serde(rename = "R_NAME")]
    pub name: String,
    #[serde(rename = "R_ID")]
    pub id: String,
    #[serde(rename = "R_ACTION")]
    pub action: String,
    #[serde(rename = "R_SRC_ZN")]
    pub source_zones: String,
    #[serde(rename = "R_DST_ZN")]
    pub destination_zones: String,
    #[serde(rename = "R_SRC_IP")]
    pub source_networks: String,
    #[serde(rename = "R_DST_IP")]
    pub destination_networks: String,
    #[serde(rename = "R_VLAN")]
    pub vlans: String,
    #[serde(rename = "R_USERS")]
    pub users: String,
    #[serde(rename = "R_APP")]
    pub applications: String,
    #[serde(rename = "R_URL")]
    pub urls: String,
    #[serde(rename = "R_SRC_P")]
    pub source_ports: String,
    #[serde(rename = "R_DST_P")]
    pub destination_ports: String,
    #[serde(rename = "R_SRC_SGT")]
    pub source_sgts: String,
    #[serde(rename = "R_DST_SGT")]
    pub destination_sgts: String,
    #[serde(rename = "R_IPS")]
    pub ips: String,
    #[serde(rename = "R_FILE")]
    pub file: String,
}

impl ExportRow {
    /// Flattens an access or prefilter rule. The owning policy comes from the
    /// rule's metadata when present, else from `policy`.
    pub fn from_rule(fmc_name: &str, policy: &AccessPolicy, rule: &Value) -> Self {
        let owner = rule
            .pointer("/metadata/accessPolicy")
            .or_else(|| rule.pointer("/metadata/prefilterPolicy"));
        let owner_field = |key: &str, fallback: &str| {
            owner
                .and_then(|o| o.get(key))
                .and_then(Value::as_str)
                .unwrap_or(fallback)
                .to_string()
        };
        let zones = |zone_key: &str, interface_key: &str| {
            let cell = members(rule, zone_key);
            if cell.is_empty() {
                members(rule, interface_key)
            } else {
                cell
            }
        };

        Self {
            fmc_name: fmc_name.to_string(),
            acp_name: owner_field("name", &policy.name),
            acp_type: owner_field("type", policy.kind.as_deref().unwrap_or("AccessPolicy")),
            acp_id: owner_field("id", &policy.id),
            name: str_field(rule, "/name"),
            id: str_field(rule, "/id"),
            action: str_field(rule, "/action"),
            source_zones: zones("sourceZones", "sourceInterfaces"),
            destination_zones: zones("destinationZones", "destinationInterfaces"),
            source_networks: members(rule, "sourceNetworks"),
            destination_networks: members(rule, "destinationNetworks"),
            vlans: members(rule, "vlanTags"),
            users: members(rule, "users"),
            applications: members(rule, "applications"),
            urls: members(rule, "urls"),
            source_ports: members(rule, "sourcePorts"),
            destination_ports: members(rule, "destinationPorts"),
            source_sgts: members(rule, "sourceSecurityGroupTags"),
            destination_sgts: members(rule, "destinationSecurityGroupTags"),
            ips: str_field(rule, "/ipsPolicy/name"),
            file: str_field(rule, "/filePolicy/name"),
        }
    }
}

fn str_field(rule: &Value, pointer: &str) -> String {
    rule.pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Names of referenced objects and values of literals in a rule condition,
/// joined with `;`.
fn members(rule: &Value, key: &str) -> String {
    let Some(condition) = rule.get(key) else {
        return String::new();
    };
    let mut cells: Vec<String> = Vec::new();
    for list in ["objects", "applications", "inlineApplicationFilters"] {
        if let Some(items) = condition.get(list).and_then(Value::as_array) {
            cells.extend(
                items
                    .iter()
                    .filter_map(|item| item.get("name").and_then(Value::as_str))
                    .map(str::to_string),
            );
        }
    }
    if let Some(literals) = condition.get("literals").and_then(Value::as_array) {
        cells.extend(literals.iter().filter_map(literal_text));
    }
    cells.join(";")
}

fn literal_text(literal: &Value) -> Option<String> {
    let text = |key: &str| literal.get(key).and_then(Value::as_str).map(str::to_string);
    if let Some(value) = text("value").or_else(|| text("url")) {
        return Some(value);
    }
    if let (Some(start), Some(end)) = (literal.get("startTag"), literal.get("endTag")) {
        return Some(format!("{start}-{end}"));
    }
    match (text("protocol"), text("port")) {
        (Some(protocol), Some(port)) => Some(format!("{protocol}/{port}")),
        (Some(protocol), None) => Some(protocol),
        (None, port) => port,
    }
}

pub fn write_export<W: Write>(writer: W, rows: &[ExportRow]) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
