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

//! Object and group persistence, kept behind a trait so the reconciler can
//! run against an in-memory store in tests.

use crate::client::{FmcClient, config_path};
use crate::error::FmcError;
use crate::model::{NamedObject, NetworkGroup, NewObject, ObjectKind, Page};
use tracing::info;

pub trait ObjectStore {
    /// Every object of `kind` in server order.
    fn list_objects(&self, domain: &str, kind: ObjectKind) -> Result<Vec<NamedObject>, FmcError>;

    fn list_groups(&self, domain: &str) -> Result<Vec<NetworkGroup>, FmcError>;

    /// Creates all `items` in one call; the server accepts or rejects the batch as a whole.
    fn bulk_create(
        &self,
        domain: &str,
        kind: ObjectKind,
        items: &[NewObject],
    ) -> Result<Vec<NamedObject>, FmcError>;

    fn create_group(&self, domain: &str, group: &NetworkGroup) -> Result<NetworkGroup, FmcError>;

    /// Replaces the stored group's membership with `group`'s.
    fn update_group(&self, domain: &str, group: &NetworkGroup) -> Result<NetworkGroup, FmcError>;

    /// Case-sensitive exact match on the group name; the first match wins.
    fn find_group(&self, domain: &str, name: &str) -> Result<NetworkGroup, FmcError> {
        self.list_groups(domain)?
            .into_iter()
            .find(|g| g.name == name)
            .ok_or_else(|| FmcError::Lookup {
                kind: "network group",
                name: name.to_string(),
            })
    }
}

impl ObjectStore for FmcClient {
    fn list_objects(&self, domain: &str, kind: ObjectKind) -> Result<Vec<NamedObject>, FmcError> {
        let path = config_path(domain, &format!("object/{}", resource(kind)?));
        self.get_items(&path, true)
    }

    fn list_groups(&self, domain: &str) -> Result<Vec<NetworkGroup>, FmcError> {
        self.get_items(&config_path(domain, "object/networkgroups"), true)
    }

    fn bulk_create(
        &self,
        domain: &str,
        kind: ObjectKind,
        items: &[NewObject],
    ) -> Result<Vec<NamedObject>, FmcError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let path = config_path(domain, &format!("object/{}", resource(kind)?));
        let page: Page<NamedObject> =
            self.post_json(&path, &[("bulk", "true".to_string())], items)?;
        info!(?kind, requested = items.len(), created = page.items.len(), "bulk create");
        Ok(page.items)
    }

    fn create_group(&self, domain: &str, group: &NetworkGroup) -> Result<NetworkGroup, FmcError> {
        let created: NetworkGroup =
            self.post_json(&config_path(domain, "object/networkgroups"), &[], group)?;
        info!(name = %created.name, "created network group");
        Ok(created)
    }

    fn update_group(&self, domain: &str, group: &NetworkGroup) -> Result<NetworkGroup, FmcError> {
        let id = group.id.as_deref().ok_or_else(|| FmcError::Lookup {
            kind: "network group id for",
            name: group.name.clone(),
        })?;
        let path = config_path(domain, &format!("object/networkgroups/{id}"));
        self.put_json(&path, &[], group)
    }
}

fn resource(kind: ObjectKind) -> Result<&'static str, FmcError> {
    kind.resource()
        .ok_or_else(|| FmcError::parse(format!("{kind:?}"), "not a manageable object type"))
}
