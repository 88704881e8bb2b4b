//! Operator-saved node positions.

use std::collections::BTreeMap;

use fleetdeck_depgraph::Position;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::store::{JsonFile, StoreError};

/// Positions keyed by container display name.
pub type Positions = BTreeMap<String, Position>;

/// Layout repository mirrored to its own JSON document.
pub struct LayoutStore {
    file: JsonFile,
    positions: Mutex<Positions>,
}

impl LayoutStore {
    /// Open the layout at `file`. A missing or unreadable file starts empty.
    pub async fn open(file: JsonFile) -> Self {
        let positions = match file.load::<Positions>().await {
            Ok(saved) => saved.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable layout file");
                Positions::new()
            }
        };

        Self {
            file,
            positions: Mutex::new(positions),
        }
    }

    pub async fn get(&self) -> Positions {
        self.positions.lock().await.clone()
    }

    /// Replace the saved layout.
    pub async fn save(&self, positions: Positions) -> Result<(), StoreError> {
        let mut current = self.positions.lock().await;
        *current = positions;
        self.file.save(&*current).await?;
        info!(count = current.len(), "Node positions saved");
        Ok(())
    }

    /// Forget every saved position. Resetting an empty layout succeeds.
    pub async fn reset(&self) -> Result<(), StoreError> {
        let mut current = self.positions.lock().await;
        current.clear();
        self.file.save(&*current).await?;
        info!("Node positions reset");
        Ok(())
    }
}
