//! Provider registry.
//!
//! # Responsibilities
//! - Keep the ordered set of registered providers and their liveness streaks
//! - Hand out consistent point-in-time snapshots to strategies and the prober
//! - Reject duplicate identities and unknown removals
//!
//! # Design Decisions
//! - Readers load an `Arc` snapshot without locking; writers copy, modify and
//!   swap under a short mutex
//! - Each entry owns its streak atomically, so a probe that finishes after its
//!   provider was removed writes into a detached entry and changes nothing

use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{BalancerError, Result};
use crate::provider::ProviderRef;

/// Streak value after a failed probe. Two successes bring it back to zero.
pub const UNAVAILABLE: i64 = -2;

/// A registered provider together with its liveness streak.
#[derive(Debug)]
pub struct ProviderEntry {
    provider: ProviderRef,
    streak: AtomicI64,
}

impl ProviderEntry {
    fn new(provider: ProviderRef) -> Self {
        Self {
            provider,
            streak: AtomicI64::new(0),
        }
    }

    pub fn id(&self) -> &str {
        self.provider.id()
    }

    pub fn provider(&self) -> &ProviderRef {
        &self.provider
    }

    /// Consecutive successful probes, or a negative value while recovering.
    pub fn streak(&self) -> i64 {
        self.streak.load(Ordering::Acquire)
    }

    pub fn is_alive(&self) -> bool {
        self.streak() >= 0
    }

    /// Alive and with spare capacity.
    pub fn is_eligible(&self) -> bool {
        self.is_alive() && self.provider.current_load() < 1.0
    }

    /// Record a successful probe and return the new streak.
    pub fn record_success(&self) -> i64 {
        let prev = match self
            .streak
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                Some(s.saturating_add(1))
            }) {
            Ok(prev) | Err(prev) => prev,
        };
        prev.saturating_add(1)
    }

    /// Record a failed probe and return the previous streak.
    pub fn record_failure(&self) -> i64 {
        self.streak.swap(UNAVAILABLE, Ordering::AcqRel)
    }
}

/// Ordered, point-in-time view of the registry.
pub type Snapshot = Arc<Vec<Arc<ProviderEntry>>>;

/// Shared provider table.
#[derive(Debug)]
pub struct Registry {
    entries: ArcSwap<Vec<Arc<ProviderEntry>>>,
    /// Serializes writers; readers never take it.
    writer: Mutex<()>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
            writer: Mutex::new(()),
        }
    }

    /// Current entries in registration order.
    pub fn snapshot(&self) -> Snapshot {
        self.entries.load_full()
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    pub fn get(&self, id: &str) -> Option<Arc<ProviderEntry>> {
        self.entries.load().iter().find(|e| e.id() == id).cloned()
    }

    /// Replace every provider. All streaks start at zero.
    pub fn replace(&self, providers: Vec<ProviderRef>) -> Result<()> {
        let mut entries: Vec<Arc<ProviderEntry>> = Vec::with_capacity(providers.len());
        for provider in providers {
            if entries.iter().any(|e| e.id() == provider.id()) {
                return Err(BalancerError::ProviderAlreadyRegistered(
                    provider.id().to_string(),
                ));
            }
            entries.push(Arc::new(ProviderEntry::new(provider)));
        }

        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.entries.store(Arc::new(entries));
        Ok(())
    }

    /// Append a provider with a zero streak.
    pub fn add(&self, provider: ProviderRef) -> Result<()> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.entries.load();
        if current.iter().any(|e| e.id() == provider.id()) {
            return Err(BalancerError::ProviderAlreadyRegistered(
                provider.id().to_string(),
            ));
        }

        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(Arc::new(ProviderEntry::new(provider)));
        self.entries.store(Arc::new(next));
        Ok(())
    }

    /// Remove a provider by identity and return it.
    pub fn remove(&self, id: &str) -> Result<ProviderRef> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.entries.load();
        let position = current
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| BalancerError::ProviderNotFound(id.to_string()))?;

        let mut next: Vec<Arc<ProviderEntry>> = current.iter().cloned().collect();
        let removed = next.remove(position);
        self.entries.store(Arc::new(next));
        Ok(removed.provider.clone())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
