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

//! Device inventory flattening and FTD registration payloads.

use crate::model::PolicyRef;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use tracing::warn;

/// Licenses requested for newly registered devices.
pub const DEFAULT_LICENSES: [&str; 4] = ["BASE", "MALWARE", "URLFilter", "THREAT"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub host_name: String,
    #[serde(default)]
    pub health_status: String,
    #[serde(default, rename = "sw_version")]
    pub sw_version: String,
    #[serde(default, rename = "license_caps")]
    pub license_caps: Vec<String>,
    #[serde(default)]
    pub ftd_mode: Option<String>,
    #[serde(default)]
    pub metadata: DeviceMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMetadata {
    pub device_serial_number: Option<String>,
    pub sru_version: Option<String>,
    pub vdb_version: Option<String>,
    pub snort_version: Option<String>,
    pub chassis_data: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCluster {
    pub name: String,
    pub master_device: IdRef,
    #[serde(default)]
    pub slave_devices: Vec<IdRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HaPair {
    pub name: String,
    pub primary: IdRef,
    pub secondary: IdRef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    pub name: String,
    pub model: String,
    pub hostname: String,
    pub health_status: String,
    #[serde(rename = "sw_version")]
    pub sw_version: String,
    #[serde(rename = "license_caps")]
    pub license_caps: Vec<String>,
    pub ftd_mode: String,
    pub device_serial_number: String,
    #[serde(rename = "sru_version", skip_serializing_if = "Option::is_none")]
    pub sru_version: Option<String>,
    #[serde(rename = "vdb_version", skip_serializing_if = "Option::is_none")]
    pub vdb_version: Option<String>,
    #[serde(rename = "snort_version", skip_serializing_if = "Option::is_none")]
    pub snort_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chassis_data: Option<Value>,
}

impl From<&DeviceRecord> for DeviceSummary {
    fn from(device: &DeviceRecord) -> Self {
        let meta = &device.metadata;
        Self {
            name: device.name.clone(),
            model: device.model.clone(),
            hostname: device.host_name.clone(),
            health_status: device.health_status.clone(),
            sw_version: device.sw_version.clone(),
            license_caps: device.license_caps.clone(),
            ftd_mode: device.ftd_mode.clone().unwrap_or_default(),
            device_serial_number: meta.device_serial_number.clone().unwrap_or_default(),
            sru_version: meta.sru_version.clone(),
            vdb_version: meta.vdb_version.clone(),
            snort_version: meta.snort_version.clone(),
            chassis_data: meta.chassis_data.clone(),
        }
    }
}

impl DeviceSummary {
    /// Chassis serial when the device reports one, else the device serial.
    pub fn serial(&self) -> &str {
        self.chassis_data
            .as_ref()
            .and_then(|c| c.get("chassisSerialNo"))
            .and_then(Value::as_str)
            .unwrap_or(self.device_serial_number.as_str())
    }

    fn csv_row(&self) -> InventoryRow<'_> {
        InventoryRow {
            name: &self.name,
            model: &self.model,
            version: &self.sw_version,
            status: &self.health_status,
            serial: self.serial(),
            mode: &self.ftd_mode,
            license: self.license_caps.join(";"),
            sru: self.sru_version.as_deref().unwrap_or_default(),
            vdb: self.vdb_version.as_deref().unwrap_or_default(),
            snort: self.snort_version.as_deref().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub name: String,
    pub master_device: DeviceSummary,
    pub slave_devices: Vec<DeviceSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HaSummary {
    pub name: String,
    pub primary: DeviceSummary,
    pub secondary: DeviceSummary,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub device_clusters: Vec<ClusterSummary>,
    #[serde(rename = "deviceHAPairs")]
    pub device_ha_pairs: Vec<HaSummary>,
    pub devices: Vec<DeviceSummary>,
}

#[derive(Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct InventoryRow<'a> {
    name: &'a str,
    model: &'a str,
    version: &'a str,
    status: &'a str,
    serial: &'a str,
    mode: &'a str,
    license: String,
    sru: &'a str,
    vdb: &'a str,
    snort: &'a str,
}

impl Inventory {
    pub fn build(devices: &[DeviceRecord], clusters: &[DeviceCluster], pairs: &[HaPair]) -> Self {
        let lookup = |id: &IdRef| -> Option<DeviceSummary> {
            let found = devices.iter().find(|d| d.id == id.id).map(DeviceSummary::from);
            if found.is_none() {
                warn!(id = %id.id, "device referenced by a cluster or HA pair is not in the device list");
            }
            found
        };

        let device_clusters = clusters
            .iter()
            .filter_map(|cluster| {
                Some(ClusterSummary {
                    name: cluster.name.clone(),
                    master_device: lookup(&cluster.master_device)?,
                    slave_devices: cluster.slave_devices.iter().filter_map(lookup).collect(),
                })
            })
            .collect();

        let device_ha_pairs = pairs
            .iter()
            .filter_map(|pair| {
                Some(HaSummary {
                    name: pair.name.clone(),
                    primary: lookup(&pair.primary)?,
                    secondary: lookup(&pair.secondary)?,
                })
            })
            .collect();

        Self {
            device_clusters,
            device_ha_pairs,
            devices: devices.iter().map(DeviceSummary::from).collect(),
        }
    }

    /// Writes cluster members, HA members, then every device.
    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for cluster in &self.device_clusters {
            wtr.serialize(cluster.master_device.csv_row())?;
            for slave in &cluster.slave_devices {
                wtr.serialize(slave.csv_row())?;
            }
        }
        for pair in &self.device_ha_pairs {
            wtr.serialize(pair.primary.csv_row())?;
            wtr.serialize(pair.secondary.csv_row())?;
        }
        for device in &self.devices {
            wtr.serialize(device.csv_row())?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Device record posted to start registration of an FTD.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistration {
    pub name: String,
    pub host_name: String,
    #[serde(rename = "natID")]
    pub nat_id: String,
    pub reg_key: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "license_caps")]
    pub license_caps: Vec<String>,
    pub access_policy: PolicyRef,
}

impl DeviceRegistration {
    pub fn new(
        name: &str,
        host: &str,
        nat_id: &str,
        reg_key: &str,
        access_policy: &PolicyRef,
    ) -> Self {
        Self {
            name: name.to_string(),
            host_name: host.to_string(),
            nat_id: nat_id.to_string(),
            reg_key: reg_key.to_string(),
            kind: "Device".into(),
            license_caps: DEFAULT_LICENSES.iter().map(|s| s.to_string()).collect(),
            access_policy: PolicyRef {
                id: access_policy.id.clone(),
                name: None,
                kind: Some("AccessPolicy".into()),
            },
        }
    }

    /// Command to run on the device to finish registration.
    pub fn manager_command(&self, fmc_host: &str) -> String {
        format!(
            "configure manager add {fmc_host} {} {}",
            self.reg_key, self.nat_id
        )
    }
}

/// Six random lowercase letters.
pub fn registration_key() -> String {
    let mut rng = rand::rng();
    (0..6)
        .map(|_| char::from(rng.random_range(b'a'..=b'z')))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn devices() -> Vec<DeviceRecord> {
        serde_json::from_value(json!([
            {
                "id": "d1", "name": "ftd-a", "model": "Cisco Firepower 2130",
                "hostName": "10.0.0.1", "healthStatus": "green", "sw_version": "7.2.5",
                "license_caps": ["BASE", "THREAT"], "ftdMode": "ROUTED",
                "metadata": {"deviceSerialNumber": "JAD1", "sruVersion": "2023-01-01", "chassisData": {"chassisSerialNo": "CH-1"}}
            },
            {
                "id": "d2", "name": "ftd-b", "model": "Cisco Firepower 2130",
                "hostName": "10.0.0.2", "healthStatus": "yellow", "sw_version": "7.2.5",
                "license_caps": [], "metadata": {"deviceSerialNumber": "JAD2"}
            },
            {
                "id": "d3", "name": "ftd-c", "hostName": "10.0.0.3", "metadata": {}
            }
        ]))
        .unwrap()
    }

    #[test]
    fn builds_inventory_from_records() {
        let clusters: Vec<DeviceCluster> = serde_json::from_value(json!([
            {"name": "cl1", "masterDevice": {"id": "d1"}, "slaveDevices": [{"id": "d2"}, {"id": "gone"}]}
        ]))
        .unwrap();
        let pairs: Vec<HaPair> = serde_json::from_value(json!([
            {"name": "ha1", "primary": {"id": "d2"}, "secondary": {"id": "d3"}},
            {"name": "broken", "primary": {"id": "missing"}, "secondary": {"id": "d3"}}
        ]))
        .unwrap();

        let inventory = Inventory::build(&devices(), &clusters, &pairs);

        assert_eq!(inventory.devices.len(), 3);
        assert_eq!(inventory.device_clusters[0].slave_devices.len(), 1);
        assert_eq!(inventory.device_ha_pairs.len(), 1);

        let json = serde_json::to_value(&inventory).unwrap();
        let first = &json["devices"][0];
        assert_eq!(first["hostname"], "10.0.0.1");
        assert_eq!(first["sru_version"], "2023-01-01");
        assert!(json["devices"][1].get("sru_version").is_none());
        assert_eq!(json["deviceHAPairs"][0]["primary"]["name"], "ftd-b");
    }

    #[test]
    fn csv_prefers_chassis_serial() {
        let inventory = Inventory::build(&devices(), &[], &[]);
        let mut out = Vec::new();
        inventory.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "NAME,MODEL,VERSION,STATUS,SERIAL,MODE,LICENSE,SRU,VDB,SNORT");
        assert_eq!(
            lines[1],
            "ftd-a,Cisco Firepower 2130,7.2.5,green,CH-1,ROUTED,BASE;THREAT,2023-01-01,,"
        );
        assert!(lines[2].contains(",JAD2,"));
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn registration_payload_matches_fmc_shape() {
        let policy = PolicyRef {
            id: "acp-1".into(),
            name: Some("Default".into()),
            kind: Some("AccessPolicy".into()),
        };
        let reg = DeviceRegistration::new("edge-1", "10.1.1.1", "cisco123", "abcdef", &policy);
        let body = serde_json::to_value(&reg).unwrap();

        assert_eq!(body["hostName"], "10.1.1.1");
        assert_eq!(body["natID"], "cisco123");
        assert_eq!(body["regKey"], "abcdef");
        assert_eq!(body["type"], "Device");
        assert_eq!(body["license_caps"], json!(["BASE", "MALWARE", "URLFilter", "THREAT"]));
        assert_eq!(body["accessPolicy"], json!({"id": "acp-1", "type": "AccessPolicy"}));
        assert_eq!(
            reg.manager_command("fmc.example.com"),
            "configure manager add fmc.example.com abcdef cisco123"
        );
    }

    #[test]
    fn registration_keys_are_lowercase_letters() {
        let key = registration_key();
        assert_eq!(key.len(), 6);
        assert!(key.chars().all(|c| c.is_ascii_lowercase()));
    }
}
