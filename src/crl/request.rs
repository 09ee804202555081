use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use super::errors::FetchStatus;

/// One transfer of a CRL into an in-memory buffer.
///
/// The network layer writes the payload with [`FetchRequest::append`] and
/// polls [`FetchRequest::canceled`] to notice a cancellation request.
#[derive(Debug)]
pub struct FetchRequest {
    url: String,
    buffer: Mutex<Vec<u8>>,
    canceled: AtomicBool,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            buffer: Mutex::new(Vec::new()),
            canceled: AtomicBool::new(false),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_canceled(&self, canceled: bool) {
        self.canceled.store(canceled, Ordering::SeqCst);
    }

    pub fn canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Appends a chunk of the downloaded payload.
    pub fn append(&self, chunk: &[u8]) {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(chunk);
    }

    pub fn len(&self) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn with_contents<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        f(buffer.as_slice())
    }

    /// Moves the payload out, leaving the buffer empty.
    pub fn take_contents(&self) -> Vec<u8> {
        std::mem::take(&mut *self.buffer.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Lifecycle notifications of one transfer
#[derive(Debug, Clone, PartialEq)]
pub enum FetchEvent {
    Started,
    Progressed(f32),
    Canceled,
    Ended(FetchStatus),
}

impl FetchEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FetchEvent::Canceled | FetchEvent::Ended(_))
    }
}

/// Handed to the network layer with every request. Each call queues an event
/// for the update cycle waiting on that request; it never blocks and may be
/// called from any thread.
///
/// The network layer must report exactly one of `on_canceled` or `on_ended`
/// per request.
#[derive(Debug, Clone)]
pub struct FetchEventSink {
    tx: UnboundedSender<FetchEvent>,
}

impl FetchEventSink {
    pub fn channel() -> (Self, UnboundedReceiver<FetchEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn on_started(&self) {
        self.send(FetchEvent::Started);
    }

    pub fn on_progressed(&self, progress: f32) {
        self.send(FetchEvent::Progressed(progress));
    }

    pub fn on_canceled(&self) {
        self.send(FetchEvent::Canceled);
    }

    pub fn on_ended(&self, status: FetchStatus) {
        self.send(FetchEvent::Ended(status));
    }

    fn send(&self, event: FetchEvent) {
        // The cycle stops listening after the first terminal event.
        let _ = self.tx.send(event);
    }
}
