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

//! Typed shapes of the FMC payloads shared across commands.

use crate::address::AddressEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Host,
    Network,
    Range,
    #[serde(rename = "FQDN")]
    Fqdn,
    NetworkGroup,
    /// Any member type this tool does not manage (interfaces, continents, ...).
    #[serde(other)]
    Unsupported,
}

impl ObjectKind {
    /// Collection name under `/object/`.
    pub fn resource(&self) -> Option<&'static str> {
        match self {
            Self::Host => Some("hosts"),
            Self::Network => Some("networks"),
            Self::Range => Some("ranges"),
            Self::Fqdn => Some("fqdns"),
            Self::NetworkGroup => Some("networkgroups"),
            Self::Unsupported => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub uuid: String,
}

/// A stored address object (host, network, range or FQDN).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedObject {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    #[serde(default)]
    pub value: String,
}

impl NamedObject {
    /// Canonical address of a host or network object.
    ///
    /// Network objects stored without a prefix are treated as `/32`.
    pub fn address(&self) -> Option<Result<AddressEntry, crate::error::FmcError>> {
        match self.kind {
            ObjectKind::Host => Some(AddressEntry::parse(&self.value)),
            ObjectKind::Network if self.value.contains('/') => {
                Some(AddressEntry::parse(&self.value))
            }
            ObjectKind::Network => Some(AddressEntry::parse(&format!("{}/32", self.value.trim()))),
            _ => None,
        }
    }
}

/// Body of a create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewObject {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    pub description: String,
    pub value: String,
}

impl NewObject {
    pub fn new(name: impl Into<String>, kind: ObjectKind, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: String::new(),
            value: value.into(),
        }
    }

    pub fn for_address(entry: &AddressEntry) -> Self {
        Self::new(entry.object_name(), entry.kind(), entry.to_string())
    }
}

/// An address embedded directly in a group document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Literal {
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    pub value: String,
}

/// A group member pointing at a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<&NamedObject> for ObjectRef {
    fn from(object: &NamedObject) -> Self {
        Self {
            kind: object.kind,
            id: object.id.clone(),
            name: Some(object.name.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GroupMember {
    Literal(Literal),
    Reference(ObjectRef),
}

/// A network object-group. Server bookkeeping (`links`, `metadata`) is
/// accepted on read and never written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type", default = "network_group_kind")]
    pub kind: ObjectKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overridable: Option<bool>,
    #[serde(default)]
    pub literals: Vec<Literal>,
    #[serde(default)]
    pub objects: Vec<ObjectRef>,
    #[allow(dead_code)]
    #[serde(default, skip_serializing)]
    pub links: Option<Value>,
    #[allow(dead_code)]
    #[serde(default, skip_serializing)]
    pub metadata: Option<Value>,
}

fn network_group_kind() -> ObjectKind {
    ObjectKind::NetworkGroup
}

impl NetworkGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            kind: ObjectKind::NetworkGroup,
            description: None,
            overridable: None,
            literals: Vec::new(),
            objects: Vec::new(),
            links: None,
            metadata: None,
        }
    }

    pub fn members(&self) -> Vec<GroupMember> {
        self.literals
            .iter()
            .cloned()
            .map(GroupMember::Literal)
            .chain(self.objects.iter().cloned().map(GroupMember::Reference))
            .collect()
    }
}

/// Minimal `{id, name, type}` reference used by policies and rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl PolicyRef {
    pub fn typed(&self, kind: &str) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: Some(kind.to_string()),
        }
    }
}

/// One page of a collection listing.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub next: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn group_update_body_drops_bookkeeping() {
        let group: NetworkGroup = serde_json::from_value(json!({
            "id": "g1",
            "name": "Allowed",
            "type": "NetworkGroup",
            "overridable": false,
            "literals": [{"type": "Host", "value": "10.0.0.1"}],
            "objects": [{"type": "Network", "id": "n1", "name": "Net-10-1-0-0-24"}],
            "links": {"self": "https://fmc/x"},
            "metadata": {"timestamp": 1}
        }))
        .unwrap();

        let body = serde_json::to_value(&group).unwrap();
        assert!(body.get("links").is_none());
        assert!(body.get("metadata").is_none());
        assert!(body.get("description").is_none());
        assert_eq!(body["overridable"], false);
        assert_eq!(body["literals"][0]["value"], "10.0.0.1");
        assert_eq!(body["objects"][0]["id"], "n1");
        assert_eq!(group.members().len(), 2);
    }

    #[test]
    fn unknown_member_types_still_deserialize() {
        let group: NetworkGroup = serde_json::from_value(json!({
            "id": "g1",
            "name": "Mixed",
            "objects": [{"type": "Continent", "id": "c1"}]
        }))
        .unwrap();
        assert_eq!(group.kind, ObjectKind::NetworkGroup);
        assert_eq!(group.objects[0].kind, ObjectKind::Unsupported);
        assert!(group.literals.is_empty());
    }

    #[test]
    fn bare_network_values_are_host_routes() {
        let object = NamedObject {
            id: "n1".into(),
            name: "single".into(),
            kind: ObjectKind::Network,
            value: "10.9.9.9".into(),
        };
        let address = object.address().unwrap().unwrap();
        assert_eq!(address.to_string(), "10.9.9.9/32");
    }
}
