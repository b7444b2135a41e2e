//! The node's own config file: which volumes to mount, how to back
//! metadata, and where the node's RSA identity lives. Tagged-enum
//! dispatch mirrors how the teacher's own node config picks a store
//! backend per entry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use varasto_disk::VolumeId;
use varasto_store_gdrive::GoogleDriveDriverConfig;
use varasto_store_local::LocalDriverConfig;
use varasto_store_s3::S3DriverConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarastoNodeConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub identity: NodeConfigIdentity,
    pub metadata: NodeConfigMetadata,
    /// Keyed by a human-readable volume name; TOML tables need string
    /// keys, so the numeric `VolumeId` the controller actually uses
    /// lives inside each entry instead.
    pub volume: BTreeMap<String, NodeConfigVolumeEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfigVolumeEntry {
    pub id: VolumeId,
    #[serde(flatten)]
    pub driver: NodeConfigVolume,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfigIdentity {
    /// Path to a PKCS#8 PEM file holding the node's RSA private key.
    /// Generated on first `Init` if absent.
    pub secret_key_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum NodeConfigMetadata {
    Memory,
    Redb { path: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum NodeConfigVolume {
    Local(LocalDriverConfig),
    Memory,
    S3(S3DriverConfig),
    GoogleDrive(GoogleDriveDriverConfig),
}
