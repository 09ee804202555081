#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crl_updater::crl::{
    FetchError, FetchEventSink, FetchRequest, NetProvider, RefreshTimer, RevocationListStore,
};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// How the scripted network answers a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Writes `crl:<url>` and reports success from a spawned task.
    Succeed,
    /// Reports a transport error from a spawned task.
    Fail,
    /// Acknowledges a cancellation nobody asked for.
    Abort,
    /// Drops the sink without reporting anything.
    Drop,
    /// Hands the fetch to the test, see [`HeldFetch`].
    Hold,
}

pub fn payload_for(url: &str) -> Vec<u8> {
    format!("crl:{url}").into_bytes()
}

#[derive(Default)]
pub struct Counters {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Counters {
    fn begin(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn end(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A fetch the test completes by hand
pub struct HeldFetch {
    pub request: Arc<FetchRequest>,
    pub sink: FetchEventSink,
    counters: Arc<Counters>,
}

impl HeldFetch {
    pub fn succeed(self) {
        self.request.append(&payload_for(self.request.url()));
        self.counters.end();
        self.sink.on_ended(Ok(()));
    }

    pub fn fail(self) {
        self.counters.end();
        self.sink
            .on_ended(Err(FetchError::Http("connection reset".to_string())));
    }

    pub fn acknowledge_cancel(self) {
        self.counters.end();
        self.sink.on_canceled();
    }
}

/// Network double answering each URL as scripted; unknown URLs fail.
pub struct ScriptedNet {
    replies: HashMap<String, Reply>,
    started: Mutex<Vec<String>>,
    counters: Arc<Counters>,
    held: UnboundedSender<HeldFetch>,
}

impl ScriptedNet {
    pub fn new(replies: &[(&str, Reply)]) -> (Arc<Self>, UnboundedReceiver<HeldFetch>) {
        let (held, held_rx) = unbounded_channel();
        let net = Self {
            replies: replies
                .iter()
                .map(|(url, reply)| (url.to_string(), *reply))
                .collect(),
            started: Mutex::new(Vec::new()),
            counters: Arc::new(Counters::default()),
            held,
        };
        (Arc::new(net), held_rx)
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }
}

impl NetProvider for ScriptedNet {
    fn start_fetch(&self, request: Arc<FetchRequest>, sink: FetchEventSink) {
        self.started.lock().unwrap().push(request.url().to_string());
        self.counters.begin();

        let reply = self
            .replies
            .get(request.url())
            .copied()
            .unwrap_or(Reply::Fail);
        let fetch = HeldFetch {
            request,
            sink,
            counters: self.counters.clone(),
        };

        match reply {
            Reply::Hold => {
                fetch.sink.on_started();
                self.held.send(fetch).unwrap_or_else(|_| panic!("test dropped the held fetch receiver"));
            }
            Reply::Drop => {
                fetch.counters.end();
                drop(fetch);
            }
            Reply::Abort => fetch.acknowledge_cancel(),
            Reply::Succeed | Reply::Fail => {
                tokio::spawn(async move {
                    fetch.sink.on_started();
                    fetch.sink.on_progressed(0.5);
                    tokio::task::yield_now().await;
                    if reply == Reply::Succeed {
                        fetch.succeed();
                    } else {
                        fetch.fail();
                    }
                });
            }
        }
    }
}

/// Store double recording every installed payload
#[derive(Default)]
pub struct RecordingStore {
    installed: Mutex<Vec<Vec<u8>>>,
}

impl RecordingStore {
    pub fn installed(&self) -> Vec<Vec<u8>> {
        self.installed.lock().unwrap().clone()
    }
}

impl RevocationListStore for RecordingStore {
    fn update_revocation_list(&self, contents: Vec<u8>) {
        self.installed.lock().unwrap().push(contents);
    }

    fn next_update(&self) -> Option<DateTime<Utc>> {
        None
    }
}

/// Timer double that ignores every deadline
pub struct IdleTimer;

impl RefreshTimer for IdleTimer {
    fn schedule_at(&self, _at: DateTime<Utc>) {}

    fn schedule_after(&self, _after: Duration) {}
}

mockall::mock! {
    pub Store {}

    impl RevocationListStore for Store {
        fn update_revocation_list(&self, contents: Vec<u8>);
        fn next_update(&self) -> Option<DateTime<Utc>>;
    }
}

mockall::mock! {
    pub Timer {}

    impl RefreshTimer for Timer {
        fn schedule_at(&self, at: DateTime<Utc>);
        fn schedule_after(&self, after: Duration);
    }
}
