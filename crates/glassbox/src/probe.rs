//! Protocol-event observation for instrumented structures.
//!
//! Structures like [`SettingsRegistry`](crate::registry::SettingsRegistry) and
//! [`RecordBook`](crate::records::RecordBook) report every protocol-level
//! operation (lookups, writes, iteration, rendering) through a [`Probe`].
//! Events are kept in order, mirrored to TRACE-level log output, and can be
//! asserted on in tests or printed by the CLI.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::trace;

/// An observable operation on an instrumented structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOp {
    /// A new entry was created and stored under a key.
    Intern,
    /// An existing entry was handed out instead of creating a new one.
    Reuse,
    /// An entry's fields were populated for the first time.
    Init,
    /// An entry became immutable.
    Freeze,
    /// A write to a frozen entry was rejected.
    RejectWrite,
    /// A value was read by key.
    Get,
    /// A value was written by key.
    Set,
    /// A value was removed by key.
    Remove,
    /// The element count was queried.
    Len,
    /// An iterator over the structure was created.
    Iter,
    /// The structure was rendered for display or debugging.
    Render,
    /// The structure was compared against another.
    Compare,
}

impl fmt::Display for ProbeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Intern => "intern",
            Self::Reuse => "reuse",
            Self::Init => "init",
            Self::Freeze => "freeze",
            Self::RejectWrite => "reject_write",
            Self::Get => "get",
            Self::Set => "set",
            Self::Remove => "remove",
            Self::Len => "len",
            Self::Iter => "iter",
            Self::Render => "render",
            Self::Compare => "compare",
        };
        write!(f, "{name}")
    }
}

/// A single recorded observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeEvent {
    /// What happened.
    pub op: ProbeOp,
    /// The structure (and usually the key) the operation touched.
    pub subject: String,
    /// Free-form detail, such as the value involved.
    pub detail: String,
}

impl fmt::Display for ProbeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            write!(f, "{} {}", self.op, self.subject)
        } else {
            write!(f, "{} {} ({})", self.op, self.subject, self.detail)
        }
    }
}

/// A shared, append-only log of protocol events.
///
/// Cloning a `Probe` yields a handle to the same underlying log, so an
/// instrumented structure and its observer see a single ordered sequence.
/// A probe created with [`Probe::disabled`] records nothing, which lets
/// instrumentation be switched off without changing any call sites.
#[derive(Debug, Clone, Default)]
pub struct Probe {
    inner: Option<Arc<Mutex<Vec<ProbeEvent>>>>,
}

impl Probe {
    /// Create a recording probe.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Some(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    /// Create a probe that ignores every event.
    #[must_use]
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Check whether this probe records events.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Record one event.
    ///
    /// The event is appended to the shared log and mirrored to TRACE-level
    /// output. Disabled probes drop the event.
    pub fn record(&self, op: ProbeOp, subject: impl Into<String>, detail: impl Into<String>) {
        let Some(inner) = &self.inner else {
            return;
        };
        let event = ProbeEvent {
            op,
            subject: subject.into(),
            detail: detail.into(),
        };
        trace!(op = %event.op, subject = %event.subject, detail = %event.detail, "probe event");
        Self::log(inner).push(event);
    }

    /// Snapshot the recorded events in observation order.
    #[must_use]
    pub fn events(&self) -> Vec<ProbeEvent> {
        self.inner
            .as_ref()
            .map(|inner| Self::log(inner).clone())
            .unwrap_or_default()
    }

    /// Snapshot only the operation sequence, without subjects and details.
    ///
    /// Convenient for asserting on protocol order in tests.
    #[must_use]
    pub fn ops(&self) -> Vec<ProbeOp> {
        self.inner
            .as_ref()
            .map(|inner| Self::log(inner).iter().map(|e| e.op).collect())
            .unwrap_or_default()
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, |inner| Self::log(inner).len())
    }

    /// Check whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discard all recorded events.
    pub fn clear(&self) {
        if let Some(inner) = &self.inner {
            Self::log(inner).clear();
        }
    }

    /// Lock the event log, recovering from a poisoned lock.
    ///
    /// The log is plain data, so observations made before a panic elsewhere
    /// are still valid and worth keeping.
    fn log(inner: &Arc<Mutex<Vec<ProbeEvent>>>) -> MutexGuard<'_, Vec<ProbeEvent>> {
        inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
