use tracing::{debug, warn};
use x509_parser::extensions::{DistributionPointName, GeneralName, ParsedExtension};
use x509_parser::prelude::*;

use super::errors::{CrlError, CrlResult};
use super::ports::DistributionPointSource;

/// CRL distribution point URLs named by a certificate's
/// CRL Distribution Points extension (OID 2.5.29.31).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateDistributionPoints {
    urls: Vec<String>,
}

impl CertificateDistributionPoints {
    pub fn from_der(cert_der: &[u8]) -> CrlResult<Self> {
        let (_, cert) =
            X509Certificate::from_der(cert_der).map_err(|e| CrlError::Parse(e.to_string()))?;
        Ok(Self::from_certificate(&cert))
    }

    pub fn from_certificate(cert: &X509Certificate<'_>) -> Self {
        let mut urls: Vec<String> = Vec::new();

        for ext in cert.extensions() {
            let ParsedExtension::CRLDistributionPoints(points) = ext.parsed_extension() else {
                continue;
            };
            for point in &points.points {
                let Some(DistributionPointName::FullName(names)) = &point.distribution_point
                else {
                    continue;
                };
                for name in names {
                    match name {
                        GeneralName::URI(uri) if is_fetchable(uri) => {
                            if !urls.iter().any(|known| known == uri) {
                                urls.push(uri.to_string());
                            }
                        }
                        GeneralName::URI(uri) => {
                            warn!("Unsupported CRL distribution point: {}", uri)
                        }
                        _ => {}
                    }
                }
            }
        }

        debug!(
            "Found {} CRL distribution points in certificate {}",
            urls.len(),
            cert.subject()
        );
        Self { urls }
    }
}

fn is_fetchable(uri: &str) -> bool {
    uri.starts_with("http://") || uri.starts_with("https://")
}

impl DistributionPointSource for CertificateDistributionPoints {
    fn has_urls(&self) -> bool {
        !self.urls.is_empty()
    }

    fn urls(&self) -> Vec<String> {
        self.urls.clone()
    }
}
