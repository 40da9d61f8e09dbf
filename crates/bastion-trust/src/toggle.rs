//! Moving certificate authorities between active and deactivated storage.
//!
//! A deactivated authority is kept verbatim (signing keys included) under
//! `["authorities", "deactivated", <type>]` so that it can be restored later.
//!
//! Neither move is atomic. Each is a write followed by a delete; if the
//! delete fails the record exists in both locations and the error is
//! returned to the caller. Retrying the same move is safe.

use std::sync::Arc;

use bastion_types::{CertAuthId, CertAuthority};
use bytes::Bytes;
use tracing::{error, info};

use crate::backend::{self, Backend};
use crate::ca::Trust;
use crate::clock::{Clock, SystemClock};
use crate::error::{Result, TrustError};

/// Activates and deactivates certificate authorities.
#[derive(Debug)]
pub struct TrustToggle<B, T, C = SystemClock> {
    backend: Arc<B>,
    trust: Arc<T>,
    clock: C,
}

impl<B: Backend, T: Trust> TrustToggle<B, T, SystemClock> {
    pub fn new(backend: Arc<B>, trust: Arc<T>) -> Self {
        Self::with_clock(backend, trust, SystemClock)
    }
}

impl<B: Backend, T: Trust, C: Clock> TrustToggle<B, T, C> {
    pub fn with_clock(backend: Arc<B>, trust: Arc<T>, clock: C) -> Self {
        Self {
            backend,
            trust,
            clock,
        }
    }

    /// Moves an active authority to deactivated storage.
    ///
    /// The deactivated copy keeps the authority's remaining lifetime as its
    /// TTL. Fails with [`TrustError::NotActive`] if no such authority is
    /// active.
    pub fn deactivate_cert_authority(&self, id: &CertAuthId) -> Result<()> {
        let ca = match self.trust.get_cert_authority(id, true) {
            Err(err) if err.is_not_found() => return Err(TrustError::NotActive(id.clone())),
            result => result?,
        };

        let data = serde_json::to_vec(&ca)?;
        let ttl = backend::ttl(&self.clock, ca.metadata.expires);
        let path = backend::deactivated_path(id.auth_type);
        self.backend
            .upsert_val(&path, &id.domain_name, Bytes::from(data), ttl)?;

        if let Err(err) = self.trust.delete_cert_authority(id) {
            error!(
                authority = %id,
                active = %backend::active_path(id.auth_type).join("/"),
                deactivated = %path.join("/"),
                error = %err,
                "Authority copied to deactivated storage but still active"
            );
            return Err(err);
        }

        info!(authority = %id, ttl = ?ttl, "Certificate authority deactivated");
        Ok(())
    }

    /// Restores a deactivated authority.
    ///
    /// Fails with [`TrustError::NotDeactivated`] if no deactivated copy
    /// exists (including one whose TTL has run out).
    pub fn activate_cert_authority(&self, id: &CertAuthId) -> Result<()> {
        let path = backend::deactivated_path(id.auth_type);
        let data = match self.backend.get_val(&path, &id.domain_name) {
            Err(err) if err.is_not_found() => return Err(TrustError::NotDeactivated(id.clone())),
            result => result?,
        };

        let ca: CertAuthority = serde_json::from_slice(&data)?;
        self.trust.upsert_cert_authority(&ca)?;

        if let Err(err) = self.backend.delete_key(&path, &id.domain_name) {
            error!(
                authority = %id,
                active = %backend::active_path(id.auth_type).join("/"),
                deactivated = %path.join("/"),
                error = %err,
                "Authority restored but deactivated copy remains"
            );
            return Err(err.into());
        }

        info!(authority = %id, "Certificate authority activated");
        Ok(())
    }

    /// Returns the deactivated copy of an authority, signing keys included.
    pub fn get_deactivated_cert_authority(&self, id: &CertAuthId) -> Result<CertAuthority> {
        let data = match self
            .backend
            .get_val(&backend::deactivated_path(id.auth_type), &id.domain_name)
        {
            Err(err) if err.is_not_found() => return Err(TrustError::NotDeactivated(id.clone())),
            result => result?,
        };
        Ok(serde_json::from_slice(&data)?)
    }
}
