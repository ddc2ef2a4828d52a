use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::iso_millis_opt;
use crate::metadata::BackupMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusCode {
    Idle,
    Initializing,
    Ready,
    NeedsPermission,
    NoHandle,
    Busy,
    Success,
    UpToDate,
    NoChange,
    Error,
    Unsupported,
    Disabled,
    Cancelled,
    Disconnected,
    Downloaded,
    Restored,
}

impl StatusCode {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusCode::Idle => "idle",
            StatusCode::Initializing => "initializing",
            StatusCode::Ready => "ready",
            StatusCode::NeedsPermission => "needs-permission",
            StatusCode::NoHandle => "no-handle",
            StatusCode::Busy => "busy",
            StatusCode::Success => "success",
            StatusCode::UpToDate => "up-to-date",
            StatusCode::NoChange => "no-change",
            StatusCode::Error => "error",
            StatusCode::Unsupported => "unsupported",
            StatusCode::Disabled => "disabled",
            StatusCode::Cancelled => "cancelled",
            StatusCode::Disconnected => "disconnected",
            StatusCode::Downloaded => "downloaded",
            StatusCode::Restored => "restored",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a backend reports after every transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub code: StatusCode,
    pub message: String,
    pub enabled: bool,
    /// A debounced backup is scheduled.
    pub pending: bool,
    pub metadata: BackupMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle_name: Option<String>,
    #[serde(with = "iso_millis_opt", skip_serializing_if = "Option::is_none")]
    pub last_backup_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusRecord {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            enabled: false,
            pending: false,
            metadata: BackupMetadata::default(),
            handle_name: None,
            last_backup_at: None,
            error: None,
        }
    }
}

/// Fields every status inherits unless a transition overrides them.
#[derive(Debug, Clone, Default)]
pub struct StatusBaseline {
    pub enabled: bool,
    pub pending: bool,
    pub metadata: BackupMetadata,
    pub handle_name: Option<String>,
}

/// Transition-specific part of a status record.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    code: StatusCode,
    message: String,
    enabled: Option<bool>,
    handle_name: Option<Option<String>>,
    last_backup_at: Option<DateTime<Utc>>,
    error: Option<String>,
}

impl StatusUpdate {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            enabled: None,
            handle_name: None,
            last_backup_at: None,
            error: None,
        }
    }

    /// `false` forces the record to report disabled; `true` cannot override a
    /// disabled baseline.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Override the handle name, `None` clears it.
    pub fn handle_name(mut self, name: Option<String>) -> Self {
        self.handle_name = Some(name);
        self
    }

    pub fn last_backup_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_backup_at = Some(at);
        self
    }

    pub fn error(mut self, err: impl fmt::Display) -> Self {
        self.error = Some(err.to_string());
        self
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    /// Merge onto the baseline. `last_backup_at` falls back to the metadata.
    pub fn merge(self, base: StatusBaseline) -> StatusRecord {
        let last_backup_at = self.last_backup_at.or(base.metadata.last_backup_at);
        StatusRecord {
            code: self.code,
            message: self.message,
            enabled: base.enabled && self.enabled != Some(false),
            pending: base.pending,
            handle_name: self.handle_name.unwrap_or(base.handle_name),
            last_backup_at,
            error: self.error,
            metadata: base.metadata,
        }
    }
}

/// Handle returned by [`StatusBroadcaster::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type StatusCallback = Arc<dyn Fn(&StatusRecord) + Send + Sync>;

/// Holds the current status and fans every new one out to subscribers.
///
/// Subscribers are called synchronously, in subscription order, outside of
/// any internal lock. A panicking subscriber is logged and skipped.
pub struct StatusBroadcaster {
    label: &'static str,
    current: Mutex<StatusRecord>,
    subscribers: Mutex<Vec<(SubscriptionId, StatusCallback)>>,
    next_id: AtomicU64,
}

impl StatusBroadcaster {
    pub fn new(label: &'static str, initial: StatusRecord) -> Self {
        Self {
            label,
            current: Mutex::new(initial),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn current(&self) -> StatusRecord {
        lock(&self.current).clone()
    }

    /// Register `callback` and immediately replay the current status to it.
    pub fn subscribe(&self, callback: StatusCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.subscribers).push((id, Arc::clone(&callback)));
        let current = self.current();
        self.deliver(&callback, &current);
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = lock(&self.subscribers);
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        subs.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    pub fn publish(&self, record: StatusRecord) {
        *lock(&self.current) = record.clone();
        let subs: Vec<StatusCallback> = lock(&self.subscribers)
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for cb in &subs {
            self.deliver(cb, &record);
        }
    }

    fn deliver(&self, callback: &StatusCallback, record: &StatusRecord) {
        if catch_unwind(AssertUnwindSafe(|| callback(record))).is_err() {
            tracing::error!(
                backend = self.label,
                code = %record.code,
                "status subscriber panicked"
            );
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (StatusCallback, Arc<Mutex<Vec<StatusCode>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let cb: StatusCallback = Arc::new(move |s: &StatusRecord| {
            sink.lock().unwrap().push(s.code);
        });
        (cb, seen)
    }

    #[test]
    fn subscribe_replays_current_status() {
        let b = StatusBroadcaster::new("test", StatusRecord::new(StatusCode::Idle, "idle"));
        let (cb, seen) = recorder();
        b.subscribe(cb);
        assert_eq!(*seen.lock().unwrap(), vec![StatusCode::Idle]);
    }

    #[test]
    fn publish_reaches_all_until_unsubscribed() {
        let b = StatusBroadcaster::new("test", StatusRecord::new(StatusCode::Idle, ""));
        let (cb1, seen1) = recorder();
        let (cb2, seen2) = recorder();
        let id1 = b.subscribe(cb1);
        b.subscribe(cb2);

        b.publish(StatusRecord::new(StatusCode::Busy, ""));
        assert!(b.unsubscribe(id1));
        assert!(!b.unsubscribe(id1));
        b.publish(StatusRecord::new(StatusCode::Success, ""));

        assert_eq!(*seen1.lock().unwrap(), vec![StatusCode::Idle, StatusCode::Busy]);
        assert_eq!(
            *seen2.lock().unwrap(),
            vec![StatusCode::Idle, StatusCode::Busy, StatusCode::Success]
        );
        assert_eq!(b.current().code, StatusCode::Success);
    }

    #[test]
    fn panicking_subscriber_does_not_block_others() {
        let b = StatusBroadcaster::new("test", StatusRecord::new(StatusCode::Idle, ""));
        let (first, seen_first) = recorder();
        b.subscribe(first);
        let bad: StatusCallback = Arc::new(|s: &StatusRecord| {
            if s.code == StatusCode::Error {
                panic!("subscriber failure");
            }
        });
        b.subscribe(bad);
        let (last, seen_last) = recorder();
        b.subscribe(last);

        b.publish(StatusRecord::new(StatusCode::Error, "boom"));

        assert_eq!(seen_first.lock().unwrap().last(), Some(&StatusCode::Error));
        assert_eq!(seen_last.lock().unwrap().last(), Some(&StatusCode::Error));
    }

    #[test]
    fn merge_respects_baseline_and_overrides() {
        let base = StatusBaseline {
            enabled: true,
            pending: true,
            metadata: BackupMetadata::default(),
            handle_name: Some("Backups".into()),
        };
        let record = StatusUpdate::new(StatusCode::Disabled, "off")
            .enabled(false)
            .merge(base.clone());
        assert!(!record.enabled);
        assert!(record.pending);
        assert_eq!(record.handle_name.as_deref(), Some("Backups"));

        let record = StatusUpdate::new(StatusCode::Disconnected, "bye")
            .handle_name(None)
            .merge(base.clone());
        assert!(record.enabled);
        assert_eq!(record.handle_name, None);

        let disabled_base = StatusBaseline {
            enabled: false,
            ..base
        };
        let record = StatusUpdate::new(StatusCode::Idle, "").enabled(true).merge(disabled_base);
        assert!(!record.enabled);
    }

    #[test]
    fn codes_serialize_kebab_case() {
        let json = serde_json::to_value(StatusRecord::new(StatusCode::NeedsPermission, "x")).unwrap();
        assert_eq!(json["code"], "needs-permission");
        assert!(json.get("handleName").is_none());
    }
}
