//! Interfaces of the collaborators the update coordinator drives.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::request::{FetchEventSink, FetchRequest};

/// Transport that downloads a CRL into the request's buffer.
pub trait NetProvider: Send + Sync {
    /// Begins an asynchronous transfer and returns immediately. Progress and
    /// the outcome are reported through `sink`.
    fn start_fetch(&self, request: Arc<FetchRequest>, sink: FetchEventSink);
}

/// Holder of the currently installed revocation list.
pub trait RevocationListStore: Send + Sync {
    /// Replaces the installed list with `contents`.
    fn update_revocation_list(&self, contents: Vec<u8>);

    /// Point in time at which the installed list should be refreshed.
    fn next_update(&self) -> Option<DateTime<Utc>>;

    fn has_next_update(&self) -> bool {
        self.next_update().is_some()
    }
}

/// Single pending deadline; each call replaces the previous one.
pub trait RefreshTimer: Send + Sync {
    fn schedule_at(&self, at: DateTime<Utc>);

    fn schedule_after(&self, after: Duration);
}

/// Anything that can name CRL distribution points.
pub trait DistributionPointSource {
    fn has_urls(&self) -> bool;

    fn urls(&self) -> Vec<String>;
}

impl<S: AsRef<str>> DistributionPointSource for [S] {
    fn has_urls(&self) -> bool {
        !self.is_empty()
    }

    fn urls(&self) -> Vec<String> {
        self.iter().map(|url| url.as_ref().to_string()).collect()
    }
}

impl<S: AsRef<str>> DistributionPointSource for Vec<S> {
    fn has_urls(&self) -> bool {
        self.as_slice().has_urls()
    }

    fn urls(&self) -> Vec<String> {
        self.as_slice().urls()
    }
}
