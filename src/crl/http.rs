use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Url};
use tokio::runtime::Handle;
use tracing::debug;

use super::errors::{CrlResult, FetchError, FetchStatus};
use super::ports::NetProvider;
use super::request::{FetchEventSink, FetchRequest};
use super::store::check_crl_der;

/// Settings of the HTTP transport
#[derive(Debug, Clone)]
pub struct HttpNetConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Reject payloads that do not parse as a DER CRL.
    pub validate_payload: bool,
}

impl Default for HttpNetConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            validate_payload: true,
        }
    }
}

/// Downloads CRLs over HTTP(S), one tokio task per request.
#[derive(Clone)]
pub struct HttpNetProvider {
    client: Client,
    runtime: Handle,
    validate_payload: bool,
}

enum Transfer {
    Complete,
    Canceled,
}

impl HttpNetProvider {
    /// Must be called from within a tokio runtime; transfers are spawned on it.
    pub fn new(config: &HttpNetConfig) -> CrlResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            runtime: Handle::try_current()?,
            validate_payload: config.validate_payload,
        })
    }

    async fn download(self, request: Arc<FetchRequest>, sink: FetchEventSink) {
        sink.on_started();
        let status: FetchStatus = match self.transfer(&request, &sink).await {
            Ok(Transfer::Complete) => self.validate(&request),
            Ok(Transfer::Canceled) => {
                debug!("Stopped CRL transfer from {}", request.url());
                sink.on_canceled();
                return;
            }
            Err(e) => Err(e),
        };
        sink.on_ended(status);
    }

    async fn transfer(
        &self,
        request: &FetchRequest,
        sink: &FetchEventSink,
    ) -> Result<Transfer, FetchError> {
        let url = Url::parse(request.url())
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", request.url(), e)))?;

        let mut response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus {
                status: response.status().as_u16(),
            });
        }

        let total = response.content_length().filter(|len| *len > 0);
        let mut received: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            if request.canceled() {
                return Ok(Transfer::Canceled);
            }
            request.append(&chunk);
            received += chunk.len() as u64;
            if let Some(total) = total {
                sink.on_progressed((received as f64 / total as f64).min(1.0) as f32);
            }
        }

        if request.canceled() {
            return Ok(Transfer::Canceled);
        }
        Ok(Transfer::Complete)
    }

    fn validate(&self, request: &FetchRequest) -> FetchStatus {
        if !self.validate_payload {
            return Ok(());
        }
        request
            .with_contents(check_crl_der)
            .map_err(|e| FetchError::InvalidPayload(e.to_string()))
    }
}

impl NetProvider for HttpNetProvider {
    fn start_fetch(&self, request: Arc<FetchRequest>, sink: FetchEventSink) {
        debug!("Starting CRL transfer from {}", request.url());
        let provider = self.clone();
        self.runtime.spawn(provider.download(request, sink));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crl::request::FetchEvent;
    use crate::crl::store::test_support::crl_der;
    use tokio::sync::mpsc::UnboundedReceiver;

    async fn terminal(mut events: UnboundedReceiver<FetchEvent>) -> (Vec<FetchEvent>, FetchEvent) {
        let mut seen = Vec::new();
        while let Some(event) = events.recv().await {
            if event.is_terminal() {
                return (seen, event);
            }
            seen.push(event);
        }
        panic!("transfer ended without a terminal event");
    }

    fn provider(validate_payload: bool) -> HttpNetProvider {
        HttpNetProvider::new(&HttpNetConfig {
            validate_payload,
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_download_into_request_buffer() {
        let mut server = mockito::Server::new_async().await;
        let body = crl_der(Some("491231235959Z"), &[0x07]);
        let mock = server
            .mock("GET", "/root.crl")
            .with_status(200)
            .with_body(body.clone())
            .create_async()
            .await;

        let request = Arc::new(FetchRequest::new(format!("{}/root.crl", server.url())));
        let (sink, events) = FetchEventSink::channel();
        provider(true).start_fetch(request.clone(), sink);

        let (seen, outcome) = terminal(events).await;
        assert_eq!(outcome, FetchEvent::Ended(Ok(())));
        assert_eq!(seen.first(), Some(&FetchEvent::Started));
        assert_eq!(seen.last(), Some(&FetchEvent::Progressed(1.0)));
        assert_eq!(request.take_contents(), body);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_error_status_fails_the_fetch() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing.crl")
            .with_status(404)
            .create_async()
            .await;

        let request = Arc::new(FetchRequest::new(format!("{}/missing.crl", server.url())));
        let (sink, events) = FetchEventSink::channel();
        provider(false).start_fetch(request, sink);

        let (_, outcome) = terminal(events).await;
        assert_eq!(
            outcome,
            FetchEvent::Ended(Err(FetchError::HttpStatus { status: 404 }))
        );
    }

    #[tokio::test]
    async fn test_invalid_payload_is_reported_as_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/garbage.crl")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let request = Arc::new(FetchRequest::new(format!("{}/garbage.crl", server.url())));
        let (sink, events) = FetchEventSink::channel();
        provider(true).start_fetch(request, sink);

        let (_, outcome) = terminal(events).await;
        assert!(matches!(
            outcome,
            FetchEvent::Ended(Err(FetchError::InvalidPayload(_)))
        ));
    }

    #[tokio::test]
    async fn test_invalid_url_fails_without_request() {
        let request = Arc::new(FetchRequest::new("not a url"));
        let (sink, events) = FetchEventSink::channel();
        provider(true).start_fetch(request, sink);

        let (_, outcome) = terminal(events).await;
        assert!(matches!(
            outcome,
            FetchEvent::Ended(Err(FetchError::InvalidUrl(_)))
        ));
    }

    #[tokio::test]
    async fn test_canceled_request_is_acknowledged() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/root.crl")
            .with_status(200)
            .with_body(crl_der(None, &[]))
            .create_async()
            .await;

        let request = Arc::new(FetchRequest::new(format!("{}/root.crl", server.url())));
        request.set_canceled(true);
        let (sink, events) = FetchEventSink::channel();
        provider(true).start_fetch(request.clone(), sink);

        let (_, outcome) = terminal(events).await;
        assert_eq!(outcome, FetchEvent::Canceled);
        assert!(request.is_empty());
    }
}
