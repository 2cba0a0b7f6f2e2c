//! Domain-scoped policy and device calls.

use crate::client::{FmcClient, config_path};
use crate::devices::{DeviceCluster, DeviceRecord, DeviceRegistration, HaPair, Inventory};
use crate::error::FmcError;
use crate::model::Domain;
use crate::rules::{AccessPolicy, AccessRule, BULK_LIMIT, NamedItem};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;

/// An authenticated client bound to one domain.
pub struct Session {
    pub client: FmcClient,
    pub domain: Domain,
}

impl Session {
    pub fn new(client: FmcClient, domain: Domain) -> Self {
        Self { client, domain }
    }

    pub fn domain_id(&self) -> &str {
        &self.domain.uuid
    }

    pub fn path(&self, resource: &str) -> String {
        config_path(&self.domain.uuid, resource)
    }

    pub fn items<T: DeserializeOwned>(&self, resource: &str, expanded: bool) -> Result<Vec<T>, FmcError> {
        self.client.get_items(&self.path(resource), expanded)
    }

    pub fn access_policies(&self) -> Result<Vec<AccessPolicy>, FmcError> {
        self.items("policy/accesspolicies", true)
    }

    pub fn access_rules<T: DeserializeOwned>(&self, policy_id: &str) -> Result<Vec<T>, FmcError> {
        self.items(&format!("policy/accesspolicies/{policy_id}/accessrules"), true)
    }

    pub fn prefilter_rules<T: DeserializeOwned>(&self, prefilter_id: &str) -> Result<Vec<T>, FmcError> {
        self.items(&format!("policy/prefilterpolicies/{prefilter_id}/prefilterrules"), true)
    }

    pub fn intrusion_policies(&self) -> Result<Vec<NamedItem>, FmcError> {
        self.items("policy/intrusionpolicies", false)
    }

    pub fn variable_sets(&self) -> Result<Vec<NamedItem>, FmcError> {
        self.items("object/variablesets", false)
    }

    pub fn file_policies(&self) -> Result<Vec<NamedItem>, FmcError> {
        self.items("policy/filepolicies", false)
    }

    /// Replaces existing rules, at most [`BULK_LIMIT`] per request.
    pub fn update_rules(&self, policy_id: &str, rules: &[AccessRule]) -> Result<usize, FmcError> {
        let path = self.path(&format!("policy/accesspolicies/{policy_id}/accessrules"));
        for (idx, chunk) in rules.chunks(BULK_LIMIT).enumerate() {
            let _: Value = self.client.put_json(&path, &[("bulk", "true".to_string())], chunk)?;
            info!(policy_id, chunk = idx + 1, rules = chunk.len(), "updated access rules");
        }
        Ok(rules.len())
    }

    /// Appends new rules, at most [`BULK_LIMIT`] per request.
    pub fn create_rules(&self, policy_id: &str, rules: &[AccessRule]) -> Result<usize, FmcError> {
        let path = self.path(&format!("policy/accesspolicies/{policy_id}/accessrules"));
        for (idx, chunk) in rules.chunks(BULK_LIMIT).enumerate() {
            let _: Value = self.client.post_json(&path, &[("bulk", "true".to_string())], chunk)?;
            info!(policy_id, chunk = idx + 1, rules = chunk.len(), "created access rules");
        }
        Ok(rules.len())
    }

    pub fn inventory(&self) -> Result<Inventory, FmcError> {
        let devices: Vec<DeviceRecord> = self.items("devices/devicerecords", true)?;
        let clusters: Vec<DeviceCluster> = self.items("deviceclusters/ftddevicecluster", true)?;
        let pairs: Vec<HaPair> = self.items("devicehapairs/ftddevicehapairs", true)?;
        info!(
            devices = devices.len(),
            clusters = clusters.len(),
            ha_pairs = pairs.len(),
            "collected inventory"
        );
        Ok(Inventory::build(&devices, &clusters, &pairs))
    }

    pub fn register_device(&self, registration: &DeviceRegistration) -> Result<Value, FmcError> {
        self.client
            .post_json(&self.path("devices/devicerecords"), &[], registration)
    }
}
