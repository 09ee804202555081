use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::config::CrlConfig;

use super::errors::{CrlResult, UpdateResult};
use super::http::HttpNetProvider;
use super::ports::{DistributionPointSource, NetProvider};
use super::store::MemoryRevocationList;
use super::timer::{WatchTimer, spawn_refresh_loop};
use super::updater::CrlUpdater;

/// Keeps a [`MemoryRevocationList`] up to date in the background.
pub struct CrlService {
    updater: Arc<CrlUpdater>,
    store: Arc<MemoryRevocationList>,
    refresh_loop: JoinHandle<()>,
}

impl CrlService {
    /// Starts the service with the HTTP transport. The first update runs
    /// right away.
    pub fn start(config: &CrlConfig) -> CrlResult<Self> {
        let net = HttpNetProvider::new(&config.http.net_config())?;
        let service = Self::with_net_provider(
            Arc::new(net),
            &config.default_url,
            config.retry_interval(),
        );
        service.merge_distribution_points(&config.distribution_points);
        Ok(service)
    }

    /// Must be called from within a tokio runtime.
    pub fn with_net_provider(
        net: Arc<dyn NetProvider>,
        default_url: &str,
        retry_interval: Duration,
    ) -> Self {
        let store = Arc::new(MemoryRevocationList::new());
        let (timer, deadlines) = WatchTimer::new();
        timer.fire_now();

        let updater = Arc::new(CrlUpdater::new(
            net,
            store.clone(),
            Arc::new(timer),
            default_url,
        ));
        let refresh_loop = spawn_refresh_loop(Arc::downgrade(&updater), deadlines, retry_interval);
        info!("CRL service started with {} distribution points", updater.urls().len());

        Self {
            updater,
            store,
            refresh_loop,
        }
    }

    pub fn updater(&self) -> &Arc<CrlUpdater> {
        &self.updater
    }

    pub fn store(&self) -> &Arc<MemoryRevocationList> {
        &self.store
    }

    pub fn merge_distribution_points(&self, source: &dyn DistributionPointSource) -> usize {
        self.updater.merge_distribution_points(Some(source))
    }

    /// Runs an update cycle now, queueing behind a running one.
    pub async fn update_now(&self) -> UpdateResult<String> {
        self.updater.run_update_cycle().await
    }

    pub fn cancel(&self) -> bool {
        self.updater.cancel()
    }

    /// Stops scheduled updates and cancels the transfer in flight.
    pub fn shutdown(self) {
        self.updater.cancel();
        self.refresh_loop.abort();
        info!("CRL service stopped");
    }
}
