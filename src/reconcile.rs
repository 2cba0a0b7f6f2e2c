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

//! Reconciles a network group's membership against an allow-list.
//!
//! Planning is pure: it compares the group with the known host and network
//! objects and decides which literals to keep, which objects to reference and
//! which objects to create. [`apply`] then drives an [`ObjectStore`] to create
//! the missing objects and replace the group's membership in a single update.
//!
//! When several stored objects share an address, the first one in server
//! order is referenced.

use crate::address::AddressEntry;
use crate::error::FmcError;
use crate::model::{Literal, NamedObject, NetworkGroup, NewObject, ObjectKind, ObjectRef};
use crate::store::ObjectStore;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Ordered, de-duplicated set of addresses a group should contain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    entries: Vec<AddressEntry>,
    keys: HashSet<String>,
}

impl AllowList {
    /// Parses one address per line. Blank lines are ignored; malformed
    /// lines are skipped and returned alongside the list.
    pub fn parse(text: &str) -> (Self, Vec<FmcError>) {
        let mut list = Self::default();
        let mut anomalies = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match AddressEntry::parse(line) {
                Ok(entry) => list.push(entry),
                Err(err) => {
                    warn!(line = idx + 1, %err, "skipping allow-list entry");
                    anomalies.push(err);
                }
            }
        }
        (list, anomalies)
    }

    pub fn push(&mut self, entry: AddressEntry) {
        if self.keys.insert(entry.to_string()) {
            self.entries.push(entry);
        }
    }

    pub fn entries(&self) -> &[AddressEntry] {
        &self.entries
    }

    pub fn contains(&self, canonical: &str) -> bool {
        self.keys.contains(canonical)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a reconciliation run is going to do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcilePlan {
    /// Allow-listed addresses the group lacks today.
    pub diff_missing: Vec<String>,
    /// Addresses the group has today that are not allow-listed.
    pub diff_extra: Vec<String>,
    pub literals: Vec<Literal>,
    pub objects: Vec<ObjectRef>,
    /// Allow-list entries with no stored object, in allow-list order.
    #[serde(serialize_with = "as_strings")]
    pub to_create: Vec<AddressEntry>,
    /// Current references that resolve to no known host or network.
    pub dropped: Vec<ObjectRef>,
}

fn as_strings<S: serde::Serializer>(
    entries: &[AddressEntry],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(entries.iter().map(ToString::to_string))
}

impl ReconcilePlan {
    pub fn new_objects(&self, kind: ObjectKind) -> Vec<NewObject> {
        self.to_create
            .iter()
            .filter(|entry| entry.kind() == kind)
            .map(NewObject::for_address)
            .collect()
    }
}

/// Outcome of an applied plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub group: NetworkGroup,
    pub diff_missing: Vec<String>,
    pub diff_extra: Vec<String>,
    pub created: Vec<NamedObject>,
}

/// Address index over the known host and network objects.
pub struct GroupReconciler<'a> {
    networks: HashMap<String, &'a NamedObject>,
    hosts: HashMap<String, &'a NamedObject>,
    by_id: HashMap<&'a str, String>,
}

impl<'a> GroupReconciler<'a> {
    pub fn new(networks: &'a [NamedObject], hosts: &'a [NamedObject]) -> Self {
        let mut reconciler = Self {
            networks: HashMap::new(),
            hosts: HashMap::new(),
            by_id: HashMap::new(),
        };
        for object in networks.iter().chain(hosts) {
            let address = match object.address() {
                Some(Ok(address)) => address,
                Some(Err(err)) => {
                    warn!(id = %object.id, name = %object.name, %err, "ignoring object with unparseable value");
                    continue;
                }
                None => continue,
            };
            let key = address.to_string();
            let index = match address {
                AddressEntry::Host(_) if object.kind == ObjectKind::Host => &mut reconciler.hosts,
                AddressEntry::Network(_) if object.kind == ObjectKind::Network => {
                    &mut reconciler.networks
                }
                _ => continue,
            };
            index.entry(key.clone()).or_insert(object);
            reconciler.by_id.insert(object.id.as_str(), key);
        }
        reconciler
    }

    /// Canonical addresses of the group's current members, literals first.
    /// References to objects that are not known hosts or networks are
    /// returned separately.
    pub fn current_addresses(&self, group: &NetworkGroup) -> (Vec<String>, Vec<ObjectRef>) {
        let mut seen = HashSet::new();
        let mut addresses = Vec::new();
        let mut unresolved = Vec::new();

        for literal in &group.literals {
            let key = literal_key(literal);
            if seen.insert(key.clone()) {
                addresses.push(key);
            }
        }
        for reference in &group.objects {
            match self.by_id.get(reference.id.as_str()) {
                Some(key) => {
                    if seen.insert(key.clone()) {
                        addresses.push(key.clone());
                    }
                }
                None => unresolved.push(reference.clone()),
            }
        }
        (addresses, unresolved)
    }

    pub fn plan(&self, allow: &AllowList, group: &NetworkGroup) -> ReconcilePlan {
        let (current, dropped) = self.current_addresses(group);
        for reference in &dropped {
            warn!(group = %group.name, id = %reference.id, kind = ?reference.kind, "dropping reference to an object that is not a known host or network");
        }
        let current_keys: HashSet<&str> = current.iter().map(String::as_str).collect();

        let diff_missing = allow
            .entries()
            .iter()
            .map(ToString::to_string)
            .filter(|key| !current_keys.contains(key.as_str()))
            .collect();
        let diff_extra = current
            .iter()
            .filter(|key| !allow.contains(key))
            .cloned()
            .collect();

        let mut covered = HashSet::new();
        let mut literals = Vec::new();
        for literal in &group.literals {
            let key = literal_key(literal);
            if allow.contains(&key) && covered.insert(key) {
                literals.push(literal.clone());
            }
        }

        let mut objects = Vec::new();
        let mut to_create = Vec::new();
        for entry in allow.entries() {
            let key = entry.to_string();
            if covered.contains(&key) {
                continue;
            }
            let index = match entry {
                AddressEntry::Host(_) => &self.hosts,
                AddressEntry::Network(_) => &self.networks,
            };
            match index.get(&key) {
                Some(object) => objects.push(ObjectRef::from(*object)),
                None => to_create.push(*entry),
            }
            covered.insert(key);
        }

        ReconcilePlan {
            diff_missing,
            diff_extra,
            literals,
            objects,
            to_create,
            dropped,
        }
    }
}

/// Canonical key of a literal. Values that do not parse are kept verbatim
/// so they surface as extras instead of disappearing silently.
fn literal_key(literal: &Literal) -> String {
    let parsed = match literal.kind {
        ObjectKind::Network if !literal.value.contains('/') => {
            AddressEntry::parse(&format!("{}/32", literal.value.trim()))
        }
        _ => AddressEntry::parse(&literal.value),
    };
    match parsed {
        Ok(entry) => entry.to_string(),
        Err(err) => {
            warn!(value = %literal.value, %err, "group literal is not a valid IPv4 address");
            literal.value.trim().to_string()
        }
    }
}

/// Creates the missing objects and commits the new membership.
///
/// A failure after any object was created is reported as
/// [`FmcError::PartialCommit`]; the created objects stay on the server.
pub fn apply<S: ObjectStore + ?Sized>(
    store: &S,
    domain: &str,
    mut group: NetworkGroup,
    plan: ReconcilePlan,
) -> Result<Reconciled, FmcError> {
    let mut objects = plan.objects.clone();
    let mut created: Vec<NamedObject> = Vec::new();

    for kind in [ObjectKind::Network, ObjectKind::Host] {
        let items = plan.new_objects(kind);
        if items.is_empty() {
            continue;
        }
        match store.bulk_create(domain, kind, &items) {
            Ok(made) => {
                let (requested, returned) = (items.len(), made.len());
                objects.extend(made.iter().map(ObjectRef::from));
                created.extend(made);
                if returned != requested {
                    warn!(?kind, requested, returned, "bulk create returned a different object count");
                    let err = FmcError::ShortCreate {
                        resource: kind.resource().unwrap_or("objects"),
                        requested,
                        created: returned,
                    };
                    return Err(partial(&group.name, &created, err));
                }
            }
            Err(err) => return Err(partial(&group.name, &created, err)),
        }
    }

    group.literals = plan.literals;
    group.objects = objects;
    let updated = store
        .update_group(domain, &group)
        .map_err(|err| partial(&group.name, &created, err))?;
    info!(group = %updated.name, literals = updated.literals.len(), objects = updated.objects.len(), "group updated");

    Ok(Reconciled {
        group: updated,
        diff_missing: plan.diff_missing,
        diff_extra: plan.diff_extra,
        created,
    })
}

fn partial(group: &str, created: &[NamedObject], err: FmcError) -> FmcError {
    if created.is_empty() {
        return err;
    }
    FmcError::PartialCommit {
        group: group.to_string(),
        created: created.iter().map(|o| o.name.clone()).collect(),
        source: Box::new(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn object(id: &str, kind: ObjectKind, value: &str) -> NamedObject {
        NamedObject {
            id: id.into(),
            name: format!("obj-{id}"),
            kind,
            value: value.into(),
        }
    }

    fn literal(kind: ObjectKind, value: &str) -> Literal {
        Literal {
            kind,
            value: value.into(),
        }
    }

    fn reference(kind: ObjectKind, id: &str) -> ObjectRef {
        ObjectRef {
            kind,
            id: id.into(),
            name: None,
        }
    }

    fn group(literals: Vec<Literal>, objects: Vec<ObjectRef>) -> NetworkGroup {
        let mut group = NetworkGroup::new("Allowed");
        group.id = Some("g1".into());
        group.literals = literals;
        group.objects = objects;
        group
    }

    fn allow(text: &str) -> AllowList {
        let (list, anomalies) = AllowList::parse(text);
        assert!(anomalies.is_empty(), "{anomalies:?}");
        list
    }

    fn run(store: &MemoryStore, list: &AllowList) -> Result<Reconciled, FmcError> {
        let networks = store.list_objects("d", ObjectKind::Network)?;
        let hosts = store.list_objects("d", ObjectKind::Host)?;
        let current = store.find_group("d", "Allowed")?;
        let plan = GroupReconciler::new(&networks, &hosts).plan(list, &current);
        apply(store, "d", current, plan)
    }

    /// Canonical address of every member, resolved against the store.
    fn member_addresses(store: &MemoryStore, group: &NetworkGroup) -> Vec<String> {
        let objects = store.objects.borrow();
        let reconciler = GroupReconciler::new(&objects, &[]);
        let (addresses, unresolved) = reconciler.current_addresses(group);
        assert!(unresolved.is_empty());
        assert_eq!(addresses.len(), group.literals.len() + group.objects.len());
        addresses
    }

    #[test]
    fn adds_missing_network_next_to_kept_literal() {
        let store = MemoryStore::with(
            vec![],
            vec![group(vec![literal(ObjectKind::Host, "10.0.0.1")], vec![])],
        );

        let result = run(&store, &allow("10.0.0.1\n10.1.0.0/24\n")).unwrap();

        assert_eq!(result.diff_missing, ["10.1.0.0/24"]);
        assert!(result.diff_extra.is_empty());
        assert_eq!(result.created.len(), 1);
        assert_eq!(result.created[0].name, "Net-10-1-0-0-24");
        assert_eq!(result.group.literals, [literal(ObjectKind::Host, "10.0.0.1")]);
        assert_eq!(result.group.objects.len(), 1);
        assert_eq!(result.group.objects[0].id, result.created[0].id);
        assert_eq!(*store.create_calls.borrow(), [(ObjectKind::Network, 1)]);
    }

    #[test]
    fn removes_reference_that_left_the_allow_list() {
        let store = MemoryStore::with(
            vec![
                object("h1", ObjectKind::Host, "192.168.1.5"),
                object("h2", ObjectKind::Host, "192.168.1.6"),
            ],
            vec![group(
                vec![],
                vec![reference(ObjectKind::Host, "h1"), reference(ObjectKind::Host, "h2")],
            )],
        );

        let result = run(&store, &allow("192.168.1.6")).unwrap();

        assert_eq!(result.diff_extra, ["192.168.1.5"]);
        assert!(result.diff_missing.is_empty());
        let ids: Vec<_> = result.group.objects.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, ["h2"]);
        assert!(result.created.is_empty());
    }

    #[test]
    fn second_run_is_a_no_op() {
        let store = MemoryStore::with(
            vec![object("n1", ObjectKind::Network, "172.16.0.0/12")],
            vec![group(
                vec![literal(ObjectKind::Network, "10.9.0.0/16")],
                vec![],
            )],
        );
        let list = allow("10.0.0.1\n10.1.0.0/24\n172.16.0.0/12\n10.9.0.0/16\n");

        let first = run(&store, &list).unwrap();
        assert_eq!(first.diff_missing.len(), 3);
        let created_after_first = store.objects.borrow().len();

        let second = run(&store, &list).unwrap();
        assert!(second.diff_missing.is_empty());
        assert!(second.diff_extra.is_empty());
        assert!(second.created.is_empty());
        assert_eq!(store.objects.borrow().len(), created_after_first);
        assert_eq!(second.group.literals, first.group.literals);
        let ids = |g: &NetworkGroup| {
            let mut ids: Vec<String> = g.objects.iter().map(|o| o.id.clone()).collect();
            ids.sort();
            ids
        };
        assert_eq!(ids(&second.group), ids(&first.group));
    }

    #[test]
    fn every_allow_listed_address_appears_exactly_once() {
        let store = MemoryStore::with(
            vec![
                object("h1", ObjectKind::Host, "10.0.0.5"),
                object("n1", ObjectKind::Network, "10.2.0.0/16"),
                object("n2", ObjectKind::Network, "10.3.0.0/16"),
            ],
            vec![group(
                vec![
                    literal(ObjectKind::Host, "10.0.0.5"),
                    literal(ObjectKind::Network, "10.2.0.0/16"),
                    literal(ObjectKind::Host, "10.7.7.7"),
                ],
                vec![reference(ObjectKind::Network, "n2"), reference(ObjectKind::Host, "h1")],
            )],
        );
        let list = allow("10.0.0.5\n10.2.0.0/16\n10.4.0.0/24\n10.0.0.6\n10.0.0.5\n");

        let result = run(&store, &list).unwrap();

        let mut members = member_addresses(&store, &result.group);
        members.sort();
        let mut expected: Vec<String> = list.entries().iter().map(ToString::to_string).collect();
        expected.sort();
        assert_eq!(members, expected);
        assert_eq!(result.diff_extra, ["10.7.7.7", "10.3.0.0/16"]);
        // literal 10.0.0.5 wins over the host object with the same address
        assert!(!result.group.objects.iter().any(|o| o.id == "h1"));
    }

    #[test]
    fn reuses_existing_objects_instead_of_creating() {
        let store = MemoryStore::with(
            vec![
                object("n1", ObjectKind::Network, "10.1.0.0/24"),
                object("h1", ObjectKind::Host, "10.0.0.1"),
            ],
            vec![group(vec![], vec![])],
        );

        let result = run(&store, &allow("10.1.0.0/24\n10.0.0.1")).unwrap();

        assert!(result.created.is_empty());
        assert!(store.create_calls.borrow().is_empty());
        let ids: Vec<_> = result.group.objects.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, ["n1", "h1"]);
    }

    #[test]
    fn first_matching_object_wins() {
        let networks = vec![
            object("n-a", ObjectKind::Network, "10.1.0.0/24"),
            object("n-b", ObjectKind::Network, "10.1.0.0/24"),
        ];
        let plan = GroupReconciler::new(&networks, &[])
            .plan(&allow("10.1.0.0/24"), &group(vec![], vec![]));
        assert_eq!(plan.objects[0].id, "n-a");
    }

    #[test]
    fn objects_with_bad_values_are_skipped_not_fatal() {
        let networks = vec![
            object("bad", ObjectKind::Network, "10.1.0.0/99"),
            object("good", ObjectKind::Network, "10.1.0.0/24"),
        ];
        let plan = GroupReconciler::new(&networks, &[])
            .plan(&allow("10.1.0.0/24\n10.2.0.0/24"), &group(vec![], vec![]));
        assert_eq!(plan.objects[0].id, "good");
        assert_eq!(plan.to_create.len(), 1);
        assert_eq!(plan.to_create[0].to_string(), "10.2.0.0/24");
    }

    #[test]
    fn host_and_network_indexes_stay_separate() {
        let networks = vec![object("n1", ObjectKind::Network, "10.0.0.1/32")];
        let hosts = vec![object("h1", ObjectKind::Host, "10.0.0.1")];
        let reconciler = GroupReconciler::new(&networks, &hosts);

        let plan = reconciler.plan(&allow("10.0.0.1\n10.0.0.1/32"), &group(vec![], vec![]));
        let ids: Vec<_> = plan.objects.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, ["h1", "n1"]);
    }

    #[test]
    fn network_literals_compare_in_canonical_form() {
        let plan = GroupReconciler::new(&[], &[]).plan(
            &allow("10.5.0.0/16"),
            &group(vec![literal(ObjectKind::Network, "10.5.3.1/16")], vec![]),
        );
        assert!(plan.diff_missing.is_empty());
        assert!(plan.diff_extra.is_empty());
        assert_eq!(plan.literals.len(), 1);
        assert!(plan.to_create.is_empty());
    }

    #[test]
    fn unresolvable_references_are_dropped() {
        let plan = GroupReconciler::new(&[], &[]).plan(
            &allow("10.0.0.1"),
            &group(vec![], vec![reference(ObjectKind::NetworkGroup, "nested")]),
        );
        assert_eq!(plan.dropped.len(), 1);
        assert!(plan.objects.is_empty());
        assert!(plan.diff_extra.is_empty());
        assert_eq!(plan.diff_missing, ["10.0.0.1"]);
    }

    #[test]
    fn malformed_lines_are_reported_and_skipped() {
        let (list, anomalies) = AllowList::parse("10.0.0.1\n\nnot-an-ip\n10.0.0.0/40\n10.0.0.1\n");
        assert_eq!(list.len(), 1);
        assert_eq!(anomalies.len(), 2);
        assert!(anomalies.iter().all(|e| matches!(e, FmcError::Parse { .. })));
    }

    #[test]
    fn failed_commit_after_creation_is_partial() {
        let store = MemoryStore::with(vec![], vec![group(vec![], vec![])]);
        store.fail_update.set(true);

        let err = run(&store, &allow("10.1.0.0/24\n10.0.0.9")).unwrap_err();

        match err {
            FmcError::PartialCommit { created, .. } => {
                assert_eq!(created, ["Net-10-1-0-0-24", "Host-10.0.0.9"]);
            }
            other => panic!("expected partial commit, got {other:?}"),
        }
        // created objects stay behind
        assert_eq!(store.objects.borrow().len(), 2);
    }

    #[test]
    fn failed_host_creation_after_networks_is_partial() {
        let store = MemoryStore::with(vec![], vec![group(vec![], vec![])]);
        store.fail_create.set(Some(ObjectKind::Host));

        let err = run(&store, &allow("10.1.0.0/24\n10.0.0.9")).unwrap_err();
        assert!(matches!(err, FmcError::PartialCommit { .. }));
    }

    #[test]
    fn short_bulk_create_stops_before_group_update() {
        let store = MemoryStore::with(vec![], vec![group(vec![], vec![])]);
        store.short_create.set(Some(ObjectKind::Network));

        let err = run(&store, &allow("10.1.0.0/24\n10.2.0.0/24\n10.0.0.9")).unwrap_err();

        match err {
            FmcError::PartialCommit { created, source, .. } => {
                assert_eq!(created, ["Net-10-1-0-0-24"]);
                assert!(matches!(
                    *source,
                    FmcError::ShortCreate { requested: 2, created: 1, .. }
                ));
            }
            other => panic!("expected partial commit, got {other:?}"),
        }
        // hosts never created, group untouched
        assert_eq!(*store.create_calls.borrow(), [(ObjectKind::Network, 2)]);
        let stored = &store.groups.borrow()[0];
        assert!(stored.literals.is_empty());
        assert!(stored.objects.is_empty());
    }

    #[test]
    fn failed_commit_without_creation_is_plain_transport() {
        let store = MemoryStore::with(
            vec![],
            vec![group(vec![literal(ObjectKind::Host, "10.0.0.1")], vec![])],
        );
        store.fail_update.set(true);

        let err = run(&store, &allow("10.0.0.1")).unwrap_err();
        assert!(matches!(err, FmcError::Transport { .. }));
    }
}
