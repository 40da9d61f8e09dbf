//! In-memory implementation of the [`Backend`] contract.
//!
//! Entries are kept in a `BTreeMap` guarded by `std::sync::RwLock`:
//! - **Not durable**: all state is lost on process restart.
//! - **Expiry on read**: expired entries are invisible to reads and are
//!   dropped on the next write.

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};

use crate::backend::Backend;
use crate::clock::{Clock, SystemClock};
use crate::error::BackendError;

const SEPARATOR: char = '/';

#[derive(Debug, Clone)]
struct Entry {
    value: Bytes,
    expires: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_none_or(|expires| expires > now)
    }
}

/// Backend that keeps every value in process memory.
#[derive(Debug, Default)]
pub struct MemoryBackend<C = SystemClock> {
    entries: RwLock<BTreeMap<String, Entry>>,
    clock: C,
}

impl MemoryBackend<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<C: Clock> MemoryBackend<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            clock,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> Result<usize, BackendError> {
        let now = self.clock.now();
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.values().filter(|entry| entry.is_live(now)).count())
    }

    pub fn is_empty(&self) -> Result<bool, BackendError> {
        Ok(self.len()? == 0)
    }
}

fn full_key(path: &[&str], key: &str) -> String {
    let mut full = prefix(path);
    full.push_str(key);
    full
}

fn prefix(path: &[&str]) -> String {
    let mut prefix = path.join("/");
    prefix.push(SEPARATOR);
    prefix
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> BackendError {
    BackendError::Unavailable("memory backend lock poisoned".to_string())
}

impl<C: Clock> Backend for MemoryBackend<C> {
    fn get_val(&self, path: &[&str], key: &str) -> Result<Bytes, BackendError> {
        let full = full_key(path, key);
        let now = self.clock.now();
        let entries = self.entries.read().map_err(poisoned)?;
        entries
            .get(&full)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
            .ok_or_else(|| BackendError::not_found(full.clone()))
    }

    fn get_keys(&self, path: &[&str]) -> Result<Vec<String>, BackendError> {
        let prefix = prefix(path);
        let now = self.clock.now();
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries
            .range(prefix.clone()..)
            .take_while(|(full, _)| full.starts_with(&prefix))
            .filter(|(_, entry)| entry.is_live(now))
            .filter_map(|(full, _)| {
                let key = &full[prefix.len()..];
                (!key.contains(SEPARATOR)).then(|| key.to_string())
            })
            .collect())
    }

    fn upsert_val(
        &self,
        path: &[&str],
        key: &str,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> Result<(), BackendError> {
        let now = self.clock.now();
        let expires = ttl
            .and_then(|ttl| TimeDelta::from_std(ttl).ok())
            .and_then(|delta| now.checked_add_signed(delta));

        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.retain(|_, entry| entry.is_live(now));
        entries.insert(full_key(path, key), Entry { value, expires });
        Ok(())
    }

    fn delete_key(&self, path: &[&str], key: &str) -> Result<(), BackendError> {
        let full = full_key(path, key);
        let now = self.clock.now();
        let mut entries = self.entries.write().map_err(poisoned)?;
        match entries.remove(&full) {
            Some(entry) if entry.is_live(now) => Ok(()),
            _ => Err(BackendError::not_found(full)),
        }
    }
}
