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

//! Converts ASA `show run object network` / `show run object-group network`
//! output into FMC objects and network groups.

use crate::address::AddressEntry;
use crate::error::FmcError;
use crate::model::{Literal, NamedObject, NetworkGroup, NewObject, ObjectKind, ObjectRef};
use crate::store::ObjectStore;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsaObject {
    pub name: String,
    pub kind: ObjectKind,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupEntry {
    Literal(Literal),
    Object(String),
    Group(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsaGroup {
    pub name: String,
    pub entries: Vec<GroupEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AsaConfig {
    pub objects: Vec<AsaObject>,
    pub groups: Vec<AsaGroup>,
}

enum Block {
    Object(String),
    Group(AsaGroup),
}

/// Parses the configuration text. Lines that cannot be understood are
/// skipped and returned as anomalies.
pub fn parse(text: &str) -> (AsaConfig, Vec<FmcError>) {
    let mut config = AsaConfig::default();
    let mut anomalies = Vec::new();
    let mut block: Option<Block> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('!') {
            continue;
        }
        let Some(keyword) = trimmed.split_whitespace().next() else {
            continue;
        };

        if keyword == "object" || keyword == "object-group" {
            if let Some(Block::Group(group)) = block.take() {
                config.groups.push(group);
            }
            let name = trimmed.split_whitespace().last().unwrap_or_default().to_string();
            block = Some(if keyword == "object" {
                Block::Object(name)
            } else {
                Block::Group(AsaGroup {
                    name,
                    entries: Vec::new(),
                })
            });
            continue;
        }

        match block.as_mut() {
            Some(Block::Object(name)) => match parse_object_line(trimmed) {
                Ok(Some((kind, value))) => {
                    config.objects.push(AsaObject {
                        name: name.clone(),
                        kind,
                        value,
                    });
                    // one definition per object; later lines are descriptions and such
                    block = None;
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(object = %name, %err, "skipping object");
                    anomalies.push(err);
                    block = None;
                }
            },
            Some(Block::Group(group)) => match parse_group_line(trimmed) {
                Ok(Some(entry)) => group.entries.push(entry),
                Ok(None) => {}
                Err(err) => {
                    warn!(group = %group.name, %err, "skipping group entry");
                    anomalies.push(err);
                }
            },
            None => {}
        }
    }
    if let Some(Block::Group(group)) = block {
        config.groups.push(group);
    }
    (config, anomalies)
}

fn parse_object_line(line: &str) -> Result<Option<(ObjectKind, String)>, FmcError> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        ["host", addr] => Ok(Some((ObjectKind::Host, host(addr)?))),
        ["subnet", addr, mask] => Ok(Some((ObjectKind::Network, network(addr, mask)?))),
        ["range", first, last] => Ok(Some((
            ObjectKind::Range,
            format!("{}-{}", host(first)?, host(last)?),
        ))),
        ["fqdn", .., name] => Ok(Some((ObjectKind::Fqdn, (*name).to_string()))),
        ["host" | "subnet" | "range", ..] => Err(FmcError::parse(line, "unexpected arguments")),
        _ => Ok(None),
    }
}

fn parse_group_line(line: &str) -> Result<Option<GroupEntry>, FmcError> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let entry = match words.as_slice() {
        ["network-object", "host", addr] => GroupEntry::Literal(Literal {
            kind: ObjectKind::Host,
            value: host(addr)?,
        }),
        ["network-object", "object", name] => GroupEntry::Object((*name).to_string()),
        ["network-object", addr, mask] => GroupEntry::Literal(Literal {
            kind: ObjectKind::Network,
            value: network(addr, mask)?,
        }),
        ["group-object", name] => GroupEntry::Group((*name).to_string()),
        ["network-object" | "group-object", ..] => {
            return Err(FmcError::parse(line, "unexpected arguments"));
        }
        _ => return Ok(None),
    };
    Ok(Some(entry))
}

fn host(addr: &str) -> Result<String, FmcError> {
    match AddressEntry::parse(addr)? {
        AddressEntry::Host(ip) => Ok(ip.to_string()),
        AddressEntry::Network(_) => Err(FmcError::parse(addr, "expected a host address")),
    }
}

/// `10.0.0.0 255.255.255.0` becomes `10.0.0.0/24`.
fn network(addr: &str, mask: &str) -> Result<String, FmcError> {
    let bits = u32::from(
        mask.parse::<Ipv4Addr>()
            .map_err(|e| FmcError::parse(mask, e))?,
    );
    let prefix = bits.leading_ones();
    if bits.count_ones() != prefix {
        return Err(FmcError::parse(mask, "netmask is not contiguous"));
    }
    AddressEntry::parse(&format!("{addr}/{prefix}")).map(|entry| entry.to_string())
}

#[derive(Debug, Default)]
pub struct ImportSummary {
    pub objects: Vec<NamedObject>,
    pub groups: Vec<NetworkGroup>,
    /// Group entries naming objects or groups that were never created.
    pub unresolved: Vec<String>,
}

/// Creates all objects (one bulk call per kind), then every group in file
/// order. Nested groups must precede the groups that use them.
pub fn import<S: ObjectStore + ?Sized>(
    store: &S,
    domain: &str,
    config: &AsaConfig,
) -> Result<ImportSummary, FmcError> {
    let mut summary = ImportSummary::default();

    for kind in [ObjectKind::Host, ObjectKind::Network, ObjectKind::Range, ObjectKind::Fqdn] {
        let items: Vec<NewObject> = config
            .objects
            .iter()
            .filter(|o| o.kind == kind)
            .map(|o| NewObject::new(o.name.clone(), o.kind, o.value.clone()))
            .collect();
        let created = store.bulk_create(domain, kind, &items)?;
        summary.objects.extend(created);
    }

    let objects: HashMap<String, ObjectRef> = summary
        .objects
        .iter()
        .map(|o| (o.name.clone(), ObjectRef::from(o)))
        .collect();
    let mut groups: HashMap<String, ObjectRef> = HashMap::new();
    let mut created_groups = Vec::new();

    for asa_group in &config.groups {
        let mut group = NetworkGroup::new(asa_group.name.clone());
        for entry in &asa_group.entries {
            match entry {
                GroupEntry::Literal(literal) => group.literals.push(literal.clone()),
                GroupEntry::Object(name) => match objects.get(name) {
                    Some(reference) => group.objects.push(reference.clone()),
                    None => unresolved(&mut summary, &asa_group.name, name),
                },
                GroupEntry::Group(name) => match groups.get(name) {
                    Some(reference) => group.objects.push(reference.clone()),
                    None => unresolved(&mut summary, &asa_group.name, name),
                },
            }
        }

        let created = store.create_group(domain, &group)?;
        if let Some(id) = created.id.clone() {
            groups.insert(
                created.name.clone(),
                ObjectRef {
                    kind: ObjectKind::NetworkGroup,
                    id,
                    name: Some(created.name.clone()),
                },
            );
        }
        created_groups.push(created);
    }
    summary.groups = created_groups;

    info!(
        objects = summary.objects.len(),
        groups = summary.groups.len(),
        unresolved = summary.unresolved.len(),
        "ASA import finished"
    );
    Ok(summary)
}

fn unresolved(summary: &mut ImportSummary, group: &str, name: &str) {
    warn!(group, name, "group entry refers to an unknown object; skipping");
    summary.unresolved.push(format!("{group}: {name}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    const SAMPLE: &str = "\
object network WEB-01
 host 10.0.0.10
object network DMZ
 subnet 172.16.10.0 255.255.255.0
 description dmz segment
object network POOL
 range 10.0.1.10 10.0.1.20
object network UPDATES
 fqdn v4 updates.example.com
object-group network SERVERS
 network-object object WEB-01
 network-object host 10.0.0.11
object-group network ALL
 description everything
 network-object object DMZ
 network-object 192.168.0.0 255.255.0.0
 group-object SERVERS
 network-object object MISSING
";

    #[test]
    fn parses_objects_and_groups() {
        let (config, anomalies) = parse(SAMPLE);
        assert!(anomalies.is_empty(), "{anomalies:?}");

        let objects: Vec<(&str, ObjectKind, &str)> = config
            .objects
            .iter()
            .map(|o| (o.name.as_str(), o.kind, o.value.as_str()))
            .collect();
        assert_eq!(
            objects,
            [
                ("WEB-01", ObjectKind::Host, "10.0.0.10"),
                ("DMZ", ObjectKind::Network, "172.16.10.0/24"),
                ("POOL", ObjectKind::Range, "10.0.1.10-10.0.1.20"),
                ("UPDATES", ObjectKind::Fqdn, "updates.example.com"),
            ]
        );

        assert_eq!(config.groups.len(), 2);
        assert_eq!(
            config.groups[1].entries,
            [
                GroupEntry::Object("DMZ".into()),
                GroupEntry::Literal(Literal {
                    kind: ObjectKind::Network,
                    value: "192.168.0.0/16".into()
                }),
                GroupEntry::Group("SERVERS".into()),
                GroupEntry::Object("MISSING".into()),
            ]
        );
    }

    #[test]
    fn bad_masks_are_reported() {
        let (config, anomalies) = parse("object network X\n subnet 10.0.0.0 255.0.255.0\n");
        assert!(config.objects.is_empty());
        assert_eq!(anomalies.len(), 1);
    }

    #[test]
    fn import_links_groups_to_created_objects() {
        let (config, _) = parse(SAMPLE);
        let store = MemoryStore::default();

        let summary = import(&store, "d", &config).unwrap();

        assert_eq!(summary.objects.len(), 4);
        assert_eq!(summary.groups.len(), 2);
        assert_eq!(summary.unresolved, ["ALL: MISSING"]);

        let servers = &summary.groups[0];
        assert_eq!(servers.objects[0].name.as_deref(), Some("WEB-01"));
        assert_eq!(servers.literals[0].value, "10.0.0.11");

        let all = &summary.groups[1];
        let kinds: Vec<ObjectKind> = all.objects.iter().map(|o| o.kind).collect();
        assert_eq!(kinds, [ObjectKind::Network, ObjectKind::NetworkGroup]);
        assert_eq!(all.objects[1].id, servers.id.clone().unwrap());
    }
}
