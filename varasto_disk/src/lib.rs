//! The disk access controller: hash/compress/encrypt on write,
//! fetch/decrypt/decompress/verify on read, plus replication and scrub
//! operations over pluggable volume drivers and a metadata port.

pub mod controller;
pub mod driver;
pub mod error;
pub mod metadata_port;
pub mod singleflight;

#[cfg(feature = "testutil")]
pub mod testutil;

pub use controller::Controller;
pub use driver::{ByteStream, VolumeDriver};
pub use error::{DiskError, VolumeId};
pub use metadata_port::{BlobMeta, MetadataPort};
