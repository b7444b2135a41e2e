mod config;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use tracing::info;
use varasto_disk::{Controller, VolumeDriver};
use varasto_metadata_memory::InMemoryMetadataPort;
use varasto_metadata_redb::RedbMetadataPort;
use varasto_store_gdrive::GoogleDriveDriver;
use varasto_store_local::LocalDriver;
use varasto_store_memory::MemoryDriver;
use varasto_store_s3::S3Driver;

use config::{NodeConfigMetadata, NodeConfigVolume, VarastoNodeConfig};

fn load_or_generate_identity(secret_key_file: &Path) -> anyhow::Result<RsaPrivateKey> {
    if secret_key_file.exists() {
        let pem = fs::read_to_string(secret_key_file)
            .with_context(|| format!("reading {}", secret_key_file.display()))?;
        return RsaPrivateKey::from_pkcs8_pem(&pem).context("parsing node identity key");
    }

    info!("generating node RSA identity at {}", secret_key_file.display());
    let key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048)?;
    if let Some(parent) = secret_key_file.parent() {
        fs::create_dir_all(parent)?;
    }
    let pem = key
        .to_pkcs8_pem(LineEnding::LF)
        .context("encoding node identity key")?;
    fs::write(secret_key_file, pem.as_str())?;
    Ok(key)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("varasto-node.toml"));

    let config_text = fs::read_to_string(&config_path)
        .with_context(|| format!("reading node config {}", config_path.display()))?;
    let config: VarastoNodeConfig = toml::from_str(&config_text)
        .with_context(|| format!("parsing node config {}", config_path.display()))?;

    let node_key = load_or_generate_identity(Path::new(&config.identity.secret_key_file))?;

    let metadata: Arc<dyn varasto_disk::MetadataPort> = match &config.metadata {
        NodeConfigMetadata::Memory => Arc::new(InMemoryMetadataPort::new(node_key)),
        NodeConfigMetadata::Redb { path } => Arc::new(RedbMetadataPort::open(path, node_key)?),
    };

    let controller = Controller::new(metadata);

    for (name, entry) in &config.volume {
        let driver: Arc<dyn VolumeDriver> = match &entry.driver {
            NodeConfigVolume::Local(cfg) => Arc::new(LocalDriver::new(cfg.clone())),
            NodeConfigVolume::Memory => Arc::new(MemoryDriver::new()),
            NodeConfigVolume::S3(cfg) => Arc::new(S3Driver::new(cfg.clone())?),
            NodeConfigVolume::GoogleDrive(cfg) => Arc::new(GoogleDriveDriver::new(cfg.clone())),
        };
        driver
            .mountable()
            .await
            .with_context(|| format!("volume {name} (id {}) failed its mount check", entry.id))?;
        controller.define(entry.id, driver);
        info!(volume = name.as_str(), id = entry.id, "volume mounted");
    }

    info!(
        name = config.name.as_deref().unwrap_or("unnamed"),
        volumes = config.volume.len(),
        "varasto node ready"
    );

    // This binary exists to assemble and integration-test the controller;
    // the HTTP/RPC surface that would keep a real node alive is out of
    // scope, so there is nothing further to run once wiring succeeds.
    Ok(())
}
