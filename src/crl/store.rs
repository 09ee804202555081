use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use x509_parser::prelude::*;

use super::errors::{CrlError, CrlResult};
use super::ports::RevocationListStore;

fn asn1_time_to_chrono(time: ASN1Time) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.timestamp(), 0)
}

/// Parses `der_data` as a CRL without keeping the parsed form.
pub fn check_crl_der(der_data: &[u8]) -> CrlResult<()> {
    CertificateRevocationList::from_der(der_data)
        .map(|_| ())
        .map_err(|e| CrlError::Parse(e.to_string()))
}

/// A revocation list as installed in the store
#[derive(Debug, Clone)]
pub struct InstalledCrl {
    /// The raw CRL data in DER format
    pub der_data: Vec<u8>,
    pub installed_at: DateTime<Utc>,
    pub issuer: Option<String>,
    pub this_update: Option<DateTime<Utc>>,
    pub next_update: Option<DateTime<Utc>>,
    revoked_serials: HashSet<Vec<u8>>,
}

impl InstalledCrl {
    pub fn from_der(der_data: Vec<u8>) -> CrlResult<Self> {
        let (issuer, this_update, next_update, revoked_serials) = {
            let (_, crl) = CertificateRevocationList::from_der(&der_data)
                .map_err(|e| CrlError::Parse(e.to_string()))?;
            let revoked_serials: HashSet<Vec<u8>> = crl
                .iter_revoked_certificates()
                .map(|revoked| revoked.user_certificate.to_bytes_be())
                .collect();
            (
                crl.issuer().to_string(),
                asn1_time_to_chrono(crl.last_update()),
                crl.next_update().and_then(asn1_time_to_chrono),
                revoked_serials,
            )
        };

        Ok(Self {
            der_data,
            installed_at: Utc::now(),
            issuer: Some(issuer),
            this_update,
            next_update,
            revoked_serials,
        })
    }

    /// Keeps contents that could not be parsed; such a list revokes nothing
    /// and has no next-update date.
    fn unparsed(der_data: Vec<u8>) -> Self {
        Self {
            der_data,
            installed_at: Utc::now(),
            issuer: None,
            this_update: None,
            next_update: None,
            revoked_serials: HashSet::new(),
        }
    }

    /// Checks a big-endian certificate serial number against this list.
    pub fn is_revoked(&self, serial_number: &[u8]) -> bool {
        self.revoked_serials.contains(serial_number)
    }

    pub fn revoked_count(&self) -> usize {
        self.revoked_serials.len()
    }
}

/// In-memory revocation list store
#[derive(Debug, Default)]
pub struct MemoryRevocationList {
    current: RwLock<Option<InstalledCrl>>,
}

impl MemoryRevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<InstalledCrl> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_installed(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// `false` when no list is installed.
    pub fn is_revoked(&self, serial_number: &[u8]) -> bool {
        let revoked = self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|crl| crl.is_revoked(serial_number));
        if revoked {
            info!(
                "Certificate with serial {} is revoked",
                hex::encode(serial_number)
            );
        }
        revoked
    }
}

impl RevocationListStore for MemoryRevocationList {
    fn update_revocation_list(&self, contents: Vec<u8>) {
        let crl = match InstalledCrl::from_der(contents.clone()) {
            Ok(crl) => {
                debug!(
                    "Parsed CRL with {} revoked certificates, next update {:?}",
                    crl.revoked_count(),
                    crl.next_update
                );
                crl
            }
            Err(e) => {
                warn!("Installed CRL could not be parsed: {}", e);
                InstalledCrl::unparsed(contents)
            }
        };
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(crl);
    }

    fn next_update(&self) -> Option<DateTime<Utc>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|crl| crl.next_update)
    }
}
