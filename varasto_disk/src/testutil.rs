//! A conformance suite runnable against any [`VolumeDriver`]
//! implementation, in the shape of the teacher's `StoreTests`: one
//! struct wrapping a driver reference, one method per behavior, and a
//! `run_all` that exercises the whole contract.
//!
//! ```ignore
//! use varasto_disk::testutil::DriverTests;
//!
//! #[tokio::test]
//! async fn conforms() {
//!     let driver = MyDriver::new(..);
//!     DriverTests::new(&driver).run_all().await;
//! }
//! ```

use std::io::Cursor;

use tokio::io::AsyncReadExt;
use varasto_crypto::BlobRef;

use crate::driver::VolumeDriver;
use crate::error::DiskError;

pub struct DriverTests<'a, D> {
    driver: &'a D,
}

impl<'a, D: VolumeDriver> DriverTests<'a, D> {
    pub fn new(driver: &'a D) -> Self {
        Self { driver }
    }

    pub async fn run_all(&self) {
        self.test_mountable().await;
        self.test_store_then_fetch_round_trips().await;
        self.test_fetch_missing_is_not_found().await;
        self.test_store_is_idempotent().await;
    }

    pub async fn test_mountable(&self) {
        self.driver.mountable().await.expect("driver should be mountable");
    }

    pub async fn test_store_then_fetch_round_trips(&self) {
        let data = b"The quick brown fox jumps over the lazy dog".repeat(3);
        let ref_ = BlobRef::from_sha256(&data);

        self.driver
            .raw_store(ref_, Box::pin(Cursor::new(data.clone())))
            .await
            .expect("raw_store should succeed");

        let mut reader = self.driver.raw_fetch(ref_).await.expect("raw_fetch should succeed");
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.expect("reading fetched stream should succeed");

        assert_eq!(out, data, "fetched bytes should match what was stored");
    }

    pub async fn test_fetch_missing_is_not_found(&self) {
        let ref_ = BlobRef::from_sha256(b"never stored, conformance suite sentinel");

        let result = self.driver.raw_fetch(ref_).await;
        assert!(
            matches!(result, Err(DiskError::NotFound(_))),
            "fetching an absent ref should yield DiskError::NotFound"
        );
    }

    pub async fn test_store_is_idempotent(&self) {
        let data = b"idempotent storage probe".to_vec();
        let ref_ = BlobRef::from_sha256(&data);

        self.driver
            .raw_store(ref_, Box::pin(Cursor::new(data.clone())))
            .await
            .expect("first store should succeed");
        self.driver
            .raw_store(ref_, Box::pin(Cursor::new(data.clone())))
            .await
            .expect("second store of identical bytes should also succeed");

        let mut reader = self.driver.raw_fetch(ref_).await.expect("raw_fetch should succeed");
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, data);
    }
}
