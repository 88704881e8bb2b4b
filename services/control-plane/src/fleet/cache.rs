//! Fleet snapshot repository.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::ContainerRecord;
use crate::store::{JsonFile, StoreError};

/// In-memory fleet snapshot mirrored to a JSON document.
///
/// The lock is held across the durable write, so writes land in the order
/// merges were made.
pub struct FleetCache {
    file: JsonFile,
    records: Mutex<Vec<ContainerRecord>>,
}

impl FleetCache {
    /// Open the snapshot at `file`. A missing or unreadable file starts empty.
    pub async fn open(file: JsonFile) -> Self {
        let records = match file.load::<Vec<ContainerRecord>>().await {
            Ok(Some(records)) => {
                debug!(count = records.len(), "Loaded fleet snapshot");
                records
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable fleet snapshot");
                Vec::new()
            }
        };

        Self {
            file,
            records: Mutex::new(records),
        }
    }

    /// Every snapshot entry, empty if there is none.
    pub async fn get_all(&self) -> Vec<ContainerRecord> {
        self.records.lock().await.clone()
    }

    /// Merge `batch` into the snapshot by identity and persist the result.
    ///
    /// Matching entries are replaced in place, new ones appended. The merge
    /// stays in memory even if the write fails.
    pub async fn save_containers(
        &self,
        batch: Vec<ContainerRecord>,
    ) -> Result<Vec<ContainerRecord>, StoreError> {
        let mut records = self.records.lock().await;

        let mut index: HashMap<String, usize> = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.identity().to_string(), i))
            .collect();

        for record in batch {
            match index.get(record.identity()) {
                Some(&i) => records[i] = record,
                None => {
                    index.insert(record.identity().to_string(), records.len());
                    records.push(record);
                }
            }
        }

        let merged = records.clone();
        self.file.save(&merged).await?;
        Ok(merged)
    }

    /// Empty the snapshot and persist immediately.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        records.clear();
        self.file.save(&*records).await
    }
}
