//! Interned immutable settings.
//!
//! A [`SettingsRegistry`] hands out shared handles to [`Setting`] values,
//! creating at most one setting per key. Settings are frozen the moment they
//! are created: interning an existing key returns the original handle and
//! ignores the new value, and the only write path (`try_update`) always
//! fails for a key that exists. Every step is reported through the
//! registry's [`Probe`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::probe::{Probe, ProbeOp};

/// An immutable configuration setting.
///
/// Two settings are equal when their key and value match, regardless of
/// which registry produced them. Whether two handles refer to the *same*
/// setting is a separate question, answered by [`Arc::ptr_eq`].
#[derive(Debug, Clone, Serialize)]
pub struct Setting {
    key: String,
    value: Value,
    created_at: DateTime<Utc>,
}

impl Setting {
    /// The setting's key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The setting's value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// When the setting was interned.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl PartialEq for Setting {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.value == other.value
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// A registry interning one immutable [`Setting`] per key.
#[derive(Debug, Default)]
pub struct SettingsRegistry {
    entries: Mutex<HashMap<String, Arc<Setting>>>,
    probe: Probe,
}

impl SettingsRegistry {
    /// Create an empty registry without instrumentation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry reporting to the given probe.
    #[must_use]
    pub fn with_probe(probe: Probe) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            probe,
        }
    }

    /// Intern a setting, returning a shared handle.
    ///
    /// The first intern for a key creates and freezes the setting. Any later
    /// intern for the same key returns a handle to the original setting and
    /// **ignores the supplied value**; callers can verify they received the
    /// original with [`Arc::ptr_eq`].
    pub fn intern(&self, key: impl Into<String>, value: impl Into<Value>) -> Arc<Setting> {
        let key = key.into();
        let subject = format!("settings[{key}]");
        let mut entries = Self::lock(&self.entries);

        if let Some(existing) = entries.get(&key) {
            debug!(key = %key, "setting already interned, reusing");
            self.probe
                .record(ProbeOp::Reuse, subject, "new value ignored");
            return Arc::clone(existing);
        }

        let value = value.into();
        self.probe.record(ProbeOp::Intern, &subject, "");
        self.probe
            .record(ProbeOp::Init, &subject, value.to_string());
        let setting = Arc::new(Setting {
            key: key.clone(),
            value,
            created_at: Utc::now(),
        });
        self.probe.record(ProbeOp::Freeze, subject, "");
        debug!(key = %key, "setting interned and frozen");

        entries.insert(key, Arc::clone(&setting));
        setting
    }

    /// Look up a setting by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<Setting>> {
        self.probe
            .record(ProbeOp::Get, format!("settings[{key}]"), "");
        Self::lock(&self.entries).get(key).map(Arc::clone)
    }

    /// Attempt to change a setting's value.
    ///
    /// Settings are frozen at creation, so this fails for every existing key
    /// with [`Error::SettingFrozen`]; an unknown key fails with
    /// [`Error::SettingMissing`]. The rejection is recorded on the probe.
    ///
    /// # Errors
    ///
    /// Always returns an error; see above for which one.
    pub fn try_update(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if Self::lock(&self.entries).contains_key(key) {
            self.probe.record(
                ProbeOp::RejectWrite,
                format!("settings[{key}]"),
                value.to_string(),
            );
            debug!(key = %key, "rejected write to frozen setting");
            return Err(Error::setting_frozen(key));
        }
        Err(Error::setting_missing(key))
    }

    /// Check whether a key has been interned.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        Self::lock(&self.entries).contains_key(key)
    }

    /// Number of interned settings.
    #[must_use]
    pub fn len(&self) -> usize {
        Self::lock(&self.entries).len()
    }

    /// Check whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        Self::lock(&self.entries).is_empty()
    }

    /// All interned keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Self::lock(&self.entries).keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Lock the entry map, recovering from a poisoned lock.
    fn lock(
        entries: &Mutex<HashMap<String, Arc<Setting>>>,
    ) -> MutexGuard<'_, HashMap<String, Arc<Setting>>> {
        entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
