use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as CycleLock, mpsc::UnboundedReceiver};
use tracing::{debug, info, trace, warn};

use super::errors::{FetchError, UpdateError, UpdateResult};
use super::ports::{DistributionPointSource, NetProvider, RefreshTimer, RevocationListStore};
use super::registry::UrlRegistry;
use super::request::{FetchEvent, FetchEventSink, FetchRequest};
use super::schedule;

/// Keeps the installed CRL fresh by fetching it from a list of candidate
/// distribution points.
///
/// An update cycle tries the registered URLs one at a time, in registration
/// order, and stops at the first CRL that is installed, at the end of the
/// list, or when the current transfer was cancelled. Only one cycle runs at a
/// time; concurrent callers of [`CrlUpdater::run_update_cycle`] queue up
/// behind it.
///
/// There is no per-fetch timeout: a network layer that keeps its sink alive
/// without ever reporting an outcome stalls the cycle.
pub struct CrlUpdater {
    net: Arc<dyn NetProvider>,
    store: Arc<dyn RevocationListStore>,
    timer: Arc<dyn RefreshTimer>,
    /// Held for the full duration of a cycle.
    cycle: CycleLock<()>,
    state: Mutex<UpdateState>,
}

#[derive(Default)]
struct UpdateState {
    registry: UrlRegistry,
    /// Request of the running cycle, `None` while idle.
    request: Option<Arc<FetchRequest>>,
    last_status: Option<UpdateResult<String>>,
}

impl CrlUpdater {
    pub fn new(
        net: Arc<dyn NetProvider>,
        store: Arc<dyn RevocationListStore>,
        timer: Arc<dyn RefreshTimer>,
        default_url: &str,
    ) -> Self {
        Self {
            net,
            store,
            timer,
            cycle: CycleLock::new(()),
            state: Mutex::new(UpdateState {
                registry: UrlRegistry::new(default_url),
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, UpdateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds the distribution points of `source` that are not known yet.
    /// URLs added while a cycle runs are tried from the next cycle on.
    pub fn merge_distribution_points(&self, source: Option<&dyn DistributionPointSource>) -> usize {
        let Some(source) = source.filter(|source| source.has_urls()) else {
            return 0;
        };
        let added = self.state().registry.merge(source.urls());
        if added > 0 {
            info!("Added {} CRL distribution points", added);
        }
        added
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.state().registry.contains(url)
    }

    pub fn contains_any_url(&self) -> bool {
        !self.state().registry.is_empty()
    }

    pub fn urls(&self) -> Vec<String> {
        self.state().registry.urls().to_vec()
    }

    /// Whether a transfer is currently outstanding
    pub fn is_fetching(&self) -> bool {
        self.state().request.is_some()
    }

    /// Status recorded by the most recent cycle, `None` before the first one.
    pub fn last_status(&self) -> Option<UpdateResult<String>> {
        self.state().last_status.clone()
    }

    /// Asks the running cycle to stop. The transfer itself is not interrupted;
    /// the cycle ends once the network layer reports the transfer's outcome,
    /// without moving on to the next URL. Returns `false` when idle.
    pub fn cancel(&self) -> bool {
        match &self.state().request {
            Some(request) => {
                info!("Cancelling CRL update from {}", request.url());
                request.set_canceled(true);
                true
            }
            None => false,
        }
    }

    /// Runs one update cycle and returns the URL of the installed CRL.
    pub async fn run_update_cycle(&self) -> UpdateResult<String> {
        let _cycle = self.cycle.lock().await;
        let _in_flight = InFlightGuard(&self.state);

        let (mut urls, mut request) = {
            let mut state = self.state();
            state.last_status = Some(Err(UpdateError::NoCandidates));
            let mut urls = state.registry.urls().to_vec().into_iter();
            let request = urls.next().map(|url| Arc::new(FetchRequest::new(url)));
            state.request = request.clone();
            (urls, request)
        };
        if request.is_none() {
            warn!("No CRL distribution points registered, nothing to update");
        }

        let mut status = Err(UpdateError::NoCandidates);
        while let Some(current) = request {
            let (sink, events) = FetchEventSink::channel();
            debug!("Requesting CRL from {}", current.url());
            self.net.start_fetch(Arc::clone(&current), sink);
            let outcome = wait_for_outcome(current.url(), events).await;

            // The outcome is applied and the next request published under one
            // lock, so `cancel` always flags a request this cycle still checks.
            let mut state = self.state();
            status = self.finish_fetch(&current, outcome);
            state.last_status = Some(status.clone());
            request = if status.is_ok() || current.canceled() {
                None
            } else {
                urls.next().map(|url| Arc::new(FetchRequest::new(url)))
            };
            state.request = request.clone();
        }

        status
    }

    /// Applies the terminal event of `request`. Called with the state locked.
    fn finish_fetch(&self, request: &FetchRequest, outcome: FetchEvent) -> UpdateResult<String> {
        let url = request.url().to_string();
        let status = match outcome {
            FetchEvent::Ended(Ok(())) => {
                let contents = request.take_contents();
                info!("Installing CRL from {} ({} bytes)", url, contents.len());
                self.store.update_revocation_list(contents);
                schedule::reschedule(self.store.as_ref(), self.timer.as_ref());
                return Ok(url);
            }
            FetchEvent::Ended(Err(source)) => source,
            FetchEvent::Canceled => FetchError::Aborted,
            FetchEvent::Started | FetchEvent::Progressed(_) => FetchError::Abandoned,
        };

        if request.canceled() {
            debug!("CRL transfer from {} stopped after cancellation", url);
            return Err(UpdateError::Cancelled { url });
        }
        warn!("Failed to fetch CRL from {}: {}", url, status);
        Err(UpdateError::NetworkFailure {
            url,
            source: status,
        })
    }
}

/// Releases the request of a cycle whose future is dropped mid-fetch. The
/// transfer is told to stop before the cycle gate opens for the next cycle.
struct InFlightGuard<'a>(&'a Mutex<UpdateState>);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(request) = state.request.take() {
            debug!("Update cycle dropped, stopping CRL transfer from {}", request.url());
            request.set_canceled(true);
        }
    }
}

/// Waits for the canceled or ended notification of one transfer.
async fn wait_for_outcome(url: &str, mut events: UnboundedReceiver<FetchEvent>) -> FetchEvent {
    while let Some(event) = events.recv().await {
        match event {
            FetchEvent::Started => debug!("CRL transfer from {} started", url),
            FetchEvent::Progressed(progress) => {
                trace!("CRL transfer from {}: {:.0}%", url, progress * 100.0)
            }
            terminal => return terminal,
        }
    }
    FetchEvent::Ended(Err(FetchError::Abandoned))
}
