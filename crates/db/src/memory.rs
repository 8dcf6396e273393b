//! In-process store used by tests and local dry runs.
//!
//! Counts opened and closed sessions and database mutations, and can be told
//! to fail the next calls in a specific way.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::ProvisionError;
use crate::profile::ConnectionProfile;
use crate::session::{ClientSession, DatabaseState, SessionFactory};
use crate::transport::TransportPolicy;

/// Failure injected into sessions opened from a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// `open` fails as if the endpoint could not be reached.
    Unreachable,
    /// The create call is refused with this status.
    Reject { status: u16, message: String },
    /// The create call never answers.
    Hang,
    /// The create call panics.
    Panic,
}

#[derive(Default)]
struct Inner {
    databases: Mutex<BTreeSet<String>>,
    fault: Mutex<Option<Fault>>,
    policies: Mutex<Vec<TransportPolicy>>,
    opens: AtomicUsize,
    closes: AtomicUsize,
    mutations: AtomicUsize,
}

/// Cloneable handle to a shared in-memory account.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a fault for every following call, or clear it with `None`.
    pub fn set_fault(&self, fault: Option<Fault>) {
        *lock(&self.inner.fault) = fault;
    }

    pub fn contains(&self, id: &str) -> bool {
        lock(&self.inner.databases).contains(id)
    }

    pub fn databases(&self) -> Vec<String> {
        lock(&self.inner.databases).iter().cloned().collect()
    }

    pub fn opens(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }

    /// Number of create calls that actually changed the store.
    pub fn mutations(&self) -> usize {
        self.inner.mutations.load(Ordering::SeqCst)
    }

    /// Policies passed to every `open`, in call order.
    pub fn policies(&self) -> Vec<TransportPolicy> {
        lock(&self.inner.policies).clone()
    }

    fn fault(&self) -> Option<Fault> {
        lock(&self.inner.fault).clone()
    }
}

#[async_trait]
impl SessionFactory for MemoryStore {
    async fn open(
        &self,
        _profile: &ConnectionProfile,
        policy: &TransportPolicy,
    ) -> Result<Box<dyn ClientSession>, ProvisionError> {
        lock(&self.inner.policies).push(*policy);

        if self.fault() == Some(Fault::Unreachable) {
            return Err(ProvisionError::TransportFailure {
                message: "error sending request".to_string(),
                cause: Some("connection refused".to_string()),
            });
        }

        self.inner.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            store: self.clone(),
            closed: false,
        }))
    }
}

struct MemorySession {
    store: MemoryStore,
    closed: bool,
}

#[async_trait]
impl ClientSession for MemorySession {
    async fn create_database_if_not_exists(
        &mut self,
        id: &str,
    ) -> Result<DatabaseState, ProvisionError> {
        if self.closed {
            return Err(ProvisionError::transport("session is closed"));
        }

        match self.store.fault() {
            Some(Fault::Reject { status, message }) => {
                return Err(ProvisionError::rejected(Some(status), message, None));
            }
            Some(Fault::Hang) => std::future::pending::<()>().await,
            Some(Fault::Panic) => panic!("memory store session panicked"),
            Some(Fault::Unreachable) | None => {}
        }

        if lock(&self.store.inner.databases).insert(id.to_string()) {
            self.store.inner.mutations.fetch_add(1, Ordering::SeqCst);
            Ok(DatabaseState::Created)
        } else {
            Ok(DatabaseState::Existing)
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.store.inner.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// A panicking session must not poison the store for later calls.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
