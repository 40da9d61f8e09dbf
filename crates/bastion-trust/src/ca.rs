//! Certificate authority storage.

use std::sync::Arc;

use bastion_types::{CertAuthId, CertAuthType, CertAuthority};
use bytes::Bytes;

use crate::backend::{self, Backend};
use crate::clock::{Clock, SystemClock};
use crate::error::Result;

/// Operations on active certificate authorities.
pub trait Trust: Send + Sync {
    /// Returns an active authority. Signing keys are stripped unless
    /// `load_signing_keys` is set.
    fn get_cert_authority(&self, id: &CertAuthId, load_signing_keys: bool) -> Result<CertAuthority>;

    /// Validates and stores an authority, replacing any previous one.
    fn upsert_cert_authority(&self, ca: &CertAuthority) -> Result<()>;

    fn delete_cert_authority(&self, id: &CertAuthId) -> Result<()>;

    /// Returns every active authority of one type, ordered by domain.
    fn get_cert_authorities(
        &self,
        auth_type: CertAuthType,
        load_signing_keys: bool,
    ) -> Result<Vec<CertAuthority>>;
}

/// [`Trust`] implementation on top of any [`Backend`].
///
/// Authorities are stored as JSON under `["authorities", <type>]`, keyed by
/// domain name. A record with `metadata.expires` in the future is written
/// with the matching TTL.
#[derive(Debug)]
pub struct CaService<B, C = SystemClock> {
    backend: Arc<B>,
    clock: C,
}

impl<B: Backend> CaService<B, SystemClock> {
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_clock(backend, SystemClock)
    }
}

impl<B: Backend, C: Clock> CaService<B, C> {
    pub fn with_clock(backend: Arc<B>, clock: C) -> Self {
        Self { backend, clock }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }
}

fn decode(data: &[u8], load_signing_keys: bool) -> Result<CertAuthority> {
    let ca: CertAuthority = serde_json::from_slice(data)?;
    Ok(if load_signing_keys {
        ca
    } else {
        ca.without_secrets()
    })
}

impl<B: Backend, C: Clock> Trust for CaService<B, C> {
    fn get_cert_authority(&self, id: &CertAuthId, load_signing_keys: bool) -> Result<CertAuthority> {
        let data = self
            .backend
            .get_val(&backend::active_path(id.auth_type), &id.domain_name)?;
        decode(&data, load_signing_keys)
    }

    fn upsert_cert_authority(&self, ca: &CertAuthority) -> Result<()> {
        let mut ca = ca.clone();
        ca.check_and_set_defaults()?;

        let data = serde_json::to_vec(&ca)?;
        let ttl = backend::ttl(&self.clock, ca.metadata.expires);
        self.backend.upsert_val(
            &backend::active_path(ca.spec.auth_type),
            &ca.spec.cluster_name,
            Bytes::from(data),
            ttl,
        )?;
        Ok(())
    }

    fn delete_cert_authority(&self, id: &CertAuthId) -> Result<()> {
        self.backend
            .delete_key(&backend::active_path(id.auth_type), &id.domain_name)?;
        Ok(())
    }

    fn get_cert_authorities(
        &self,
        auth_type: CertAuthType,
        load_signing_keys: bool,
    ) -> Result<Vec<CertAuthority>> {
        let path = backend::active_path(auth_type);
        let mut authorities = Vec::new();

        for domain in self.backend.get_keys(&path)? {
            match self.backend.get_val(&path, &domain) {
                Ok(data) => authorities.push(decode(&data, load_signing_keys)?),
                // Expired between listing and reading.
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err.into()),
            }
        }

        Ok(authorities)
    }
}
