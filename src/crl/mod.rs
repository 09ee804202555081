//! Certificate Revocation List (CRL) updates
//!
//! # Features
//! - Ordered, duplicate-free list of distribution points, seeded from a
//!   default URL and extended from certificates
//! - Update cycles trying one distribution point at a time, cancellable
//! - Next update scheduled from the CRL's next-update date
//! - HTTP transport, in-memory store and timer for running as a service

mod distribution_points;
mod errors;
mod http;
mod ports;
mod registry;
mod request;
mod schedule;
mod service;
mod store;
mod timer;
mod updater;

// Re-export public types
pub use distribution_points::CertificateDistributionPoints;
pub use errors::{CrlError, CrlResult, FetchError, FetchStatus, UpdateError, UpdateResult};
pub use http::{HttpNetConfig, HttpNetProvider};
pub use ports::{DistributionPointSource, NetProvider, RefreshTimer, RevocationListStore};
pub use registry::UrlRegistry;
pub use request::{FetchEvent, FetchEventSink, FetchRequest};
pub use schedule::{FALLBACK_REFRESH_INTERVAL, NextRefresh, reschedule};
pub use service::CrlService;
pub use store::{InstalledCrl, MemoryRevocationList, check_crl_der};
pub use timer::{Deadline, WatchTimer, spawn_refresh_loop};
pub use updater::CrlUpdater;
