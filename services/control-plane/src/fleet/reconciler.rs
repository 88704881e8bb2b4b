//! Fleet reconciler.
//!
//! Merges a live engine listing with the snapshot so containers that
//! vanished from the engine (or an engine that is down) still show up,
//! marked `unavailable`. New containers are inspected in the background to
//! capture their dependency-marker environment.

use std::collections::HashSet;
use std::sync::Arc;

use fleetdeck_depgraph::DependencyRules;
use futures_util::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{ContainerRecord, FleetCache, STATUS_CACHED, STATUS_ENGINE_DOWN};
use crate::engine::{Engine, EngineError};

/// The fleet could not be produced from either source.
#[derive(Debug, Error)]
pub enum FleetError {
    /// Engine unreachable and nothing cached.
    #[error("engine unavailable and no cached fleet: {0}")]
    Unavailable(#[source] EngineError),
}

/// Live listing plus snapshot-only entries, and the live entries the
/// snapshot has never seen.
///
/// Snapshot-only entries keep their cached fields except state and status.
pub fn merge_view(
    live: Vec<ContainerRecord>,
    cached: Vec<ContainerRecord>,
) -> (Vec<ContainerRecord>, Vec<ContainerRecord>) {
    let live_ids: HashSet<&str> = live.iter().map(|r| r.identity()).collect();
    let cached_ids: HashSet<&str> = cached.iter().map(|r| r.identity()).collect();

    let unseen: Vec<ContainerRecord> = live
        .iter()
        .filter(|r| !cached_ids.contains(r.identity()))
        .cloned()
        .collect();

    let missing: Vec<ContainerRecord> = cached
        .iter()
        .filter(|r| !live_ids.contains(r.identity()))
        .cloned()
        .collect();

    let mut view = live;
    view.extend(
        missing
            .into_iter()
            .map(|r| r.into_unavailable(STATUS_CACHED)),
    );
    (view, unseen)
}

/// Reconciles engine state against the fleet snapshot.
#[derive(Clone)]
pub struct Reconciler {
    engine: Arc<dyn Engine>,
    cache: Arc<FleetCache>,
    rules: Arc<DependencyRules>,
}

impl Reconciler {
    pub fn new(engine: Arc<dyn Engine>, cache: Arc<FleetCache>, rules: Arc<DependencyRules>) -> Self {
        Self {
            engine,
            cache,
            rules,
        }
    }

    /// Merge `live` with the snapshot.
    ///
    /// Always returns a superset of `live`. Identities the snapshot lacks are
    /// inspected and cached by a background task whose failures are only
    /// logged.
    pub async fn reconcile(&self, live: Vec<ContainerRecord>) -> Vec<ContainerRecord> {
        let cached = self.cache.get_all().await;
        let (view, unseen) = merge_view(live, cached);

        if !unseen.is_empty() {
            debug!(count = unseen.len(), "Caching newly seen containers");
            let this = self.clone();
            tokio::spawn(async move {
                this.refresh(unseen).await;
            });
        }

        view
    }

    /// Fleet for the read API: live when possible, else the snapshot.
    ///
    /// Every snapshot entry is marked unavailable when the engine cannot be
    /// listed. Fails only if the engine is down and the snapshot is empty.
    pub async fn current_fleet(&self) -> Result<Vec<ContainerRecord>, FleetError> {
        match self.engine.list_containers().await {
            Ok(live) => Ok(self.reconcile(live).await),
            Err(e) => {
                let cached = self.cache.get_all().await;
                if cached.is_empty() {
                    return Err(FleetError::Unavailable(e));
                }
                warn!(error = %e, count = cached.len(), "Engine unreachable, serving cached fleet");
                Ok(cached
                    .into_iter()
                    .map(|r| r.into_unavailable(STATUS_ENGINE_DOWN))
                    .collect())
            }
        }
    }

    /// Inspect `records` and merge them, with filtered environment, into the
    /// snapshot.
    ///
    /// A failed inspect keeps whatever environment the snapshot already had
    /// for that container. Returns how many records were stored.
    pub async fn refresh(&self, records: Vec<ContainerRecord>) -> usize {
        let cached = self.cache.get_all().await;

        let inspected = join_all(records.into_iter().map(|mut record| {
            let engine = Arc::clone(&self.engine);
            let rules = Arc::clone(&self.rules);
            let previous_env = cached
                .iter()
                .find(|c| c.identity() == record.identity())
                .map(|c| c.env.clone());
            async move {
                match engine.inspect_container(&record.id).await {
                    Ok(details) => record.env = rules.filter_env(&details.env()),
                    Err(e) => {
                        debug!(container_id = %record.id, error = %e, "Inspect failed, keeping cached env");
                        if let Some(env) = previous_env {
                            record.env = env;
                        }
                    }
                }
                record
            }
        }))
        .await;

        let count = inspected.len();
        match self.cache.save_containers(inspected).await {
            Ok(_) => count,
            Err(e) => {
                warn!(error = %e, "Failed to persist fleet snapshot");
                0
            }
        }
    }

    /// Cache every container the engine knows about. Best effort.
    pub async fn warm_up(&self) {
        match self.engine.list_containers().await {
            Ok(live) => {
                let stored = self.refresh(live).await;
                info!(count = stored, "Fleet cache warmed up");
            }
            Err(e) => warn!(error = %e, "Fleet warm-up skipped, engine unreachable"),
        }
    }
}
