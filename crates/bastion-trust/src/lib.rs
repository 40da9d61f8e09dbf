//! # bastion-trust: Certificate Authority Trust
//!
//! Stores certificate authorities in a key/value [`Backend`] and moves them
//! between two locations:
//!
//! ```text
//! authorities/<type>/<domain>               active, trusted
//! authorities/deactivated/<type>/<domain>   kept for later, not trusted
//! ```
//!
//! [`TrustToggle`] drives the moves through explicit collaborators: a
//! [`Backend`] for the deactivated location, a [`Trust`] service for the
//! active one, and a [`Clock`] for expiry.

mod backend;
mod ca;
mod clock;
mod error;
mod memory;
mod toggle;

pub use backend::{
    AUTHORITIES_PREFIX, Backend, DEACTIVATED_PREFIX, active_path, deactivated_path, ttl,
};
pub use ca::{CaService, Trust};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{BackendError, Result, TrustError};
pub use memory::MemoryBackend;
pub use toggle::TrustToggle;
