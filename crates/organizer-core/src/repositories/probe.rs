//! Connectivity probe (port)

use async_trait::async_trait;

use crate::error::StoreError;

#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Cheap round trip to the store.
    async fn ping(&self) -> Result<(), StoreError>;
}
