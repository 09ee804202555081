use thiserror::Error;

/// Why a single transfer did not produce a CRL
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP error {status}")]
    HttpStatus { status: u16 },

    #[error("Invalid CRL URL: {0}")]
    InvalidUrl(String),

    #[error("Downloaded payload is not a CRL: {0}")]
    InvalidPayload(String),

    #[error("Transfer aborted by the network layer")]
    Aborted,

    #[error("Network layer dropped the request without reporting an outcome")]
    Abandoned,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::HttpStatus {
                status: status.as_u16(),
            },
            None => FetchError::Http(err.to_string()),
        }
    }
}

/// Terminal status of one transfer
pub type FetchStatus = Result<(), FetchError>;

/// Non-success outcome of an update cycle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    /// Nothing was installed and no candidate reported a failure of its own,
    /// e.g. the registry is empty.
    #[error("No CRL distribution point produced a revocation list")]
    NoCandidates,

    /// Last failure recorded before the candidates ran out
    #[error("Failed to fetch CRL from {url}: {source}")]
    NetworkFailure {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("CRL update cancelled while fetching {url}")]
    Cancelled { url: String },
}

/// Outcome of an update cycle: the URL the installed CRL came from
pub type UpdateResult<T> = Result<T, UpdateError>;

/// Errors raised while setting up the default collaborators
#[derive(Error, Debug)]
pub enum CrlError {
    #[error("HTTP client setup failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Certificate parsing failed: {0}")]
    Parse(String),

    #[error("No tokio runtime available: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),
}

pub type CrlResult<T> = Result<T, CrlError>;
