//! Application state shared across request handlers.

use std::sync::Arc;

use fleetdeck_depgraph::DependencyRules;

use crate::bus::EventBus;
use crate::config::Config;
use crate::engine::Engine;
use crate::fleet::{FleetCache, Reconciler};
use crate::layout::LayoutStore;
use crate::logs::LogHub;
use crate::rebuild::{HostLauncher, RebuildOrchestrator, RebuildRegistry};
use crate::scripts::ScriptDir;
use crate::store::JsonFile;

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    engine: Arc<dyn Engine>,
    cache: Arc<FleetCache>,
    reconciler: Reconciler,
    layout: LayoutStore,
    rules: Arc<DependencyRules>,
    bus: EventBus,
    logs: LogHub,
    scripts: ScriptDir,
    rebuilds: RebuildOrchestrator,
}

impl AppState {
    /// Open the snapshot stores and wire the services around `engine`.
    pub async fn new(config: &Config, engine: Arc<dyn Engine>) -> Self {
        let rules = Arc::new(config.rules.clone());
        let cache = Arc::new(FleetCache::open(JsonFile::new(config.containers_file())).await);
        let layout = LayoutStore::open(JsonFile::new(config.positions_file())).await;
        let reconciler = Reconciler::new(Arc::clone(&engine), Arc::clone(&cache), Arc::clone(&rules));

        let bus = EventBus::new();
        let scripts = ScriptDir::new(&config.scripts_dir);
        let launcher = HostLauncher {
            mode: config.launch_mode,
            scripts_dir: config.scripts_dir.clone(),
            host_scripts_dir: config.host_scripts_dir.clone(),
            host_user: config.host_user.clone(),
            shell: config.shell.clone(),
        };
        let rebuilds = RebuildOrchestrator::new(
            RebuildRegistry::new(),
            bus.clone(),
            scripts.clone(),
            launcher,
            config.rebuild_timeout,
        );
        let logs = LogHub::new(Arc::clone(&engine), config.log_idle_timeout);

        Self {
            inner: Arc::new(AppStateInner {
                engine,
                cache,
                reconciler,
                layout,
                rules,
                bus,
                logs,
                scripts,
                rebuilds,
            }),
        }
    }

    pub fn engine(&self) -> &dyn Engine {
        self.inner.engine.as_ref()
    }

    pub fn cache(&self) -> &FleetCache {
        &self.inner.cache
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.inner.reconciler
    }

    pub fn layout(&self) -> &LayoutStore {
        &self.inner.layout
    }

    pub fn rules(&self) -> &DependencyRules {
        &self.inner.rules
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn logs(&self) -> &LogHub {
        &self.inner.logs
    }

    pub fn scripts(&self) -> &ScriptDir {
        &self.inner.scripts
    }

    pub fn rebuilds(&self) -> &RebuildOrchestrator {
        &self.inner.rebuilds
    }
}
