//! Notification surface: ephemeral operator notices with auto-expiry.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use vigil_core::{current_unix_timestamp_ms, is_expired_unix_ms};

const DEFAULT_TOAST_TTL: Duration = Duration::from_secs(5);
const DEFAULT_TOAST_MAX_VISIBLE: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Warning,
    Info,
    Error,
}

impl NoticeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
    pub title: String,
    pub body: String,
    pub raised_unix_ms: u64,
    pub expires_unix_ms: u64,
}

/// Trait contract for surfaces that display controller notices.
pub trait NotificationSurface: Send + Sync {
    fn raise(&self, kind: NoticeKind, title: &str, body: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastQueueConfig {
    pub ttl: Duration,
    pub max_visible: usize,
}

impl Default for ToastQueueConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TOAST_TTL,
            max_visible: DEFAULT_TOAST_MAX_VISIBLE,
        }
    }
}

#[derive(Debug, Default)]
struct ToastQueueState {
    next_id: u64,
    notices: VecDeque<Notice>,
}

#[derive(Debug, Default)]
/// In-memory toast queue. Oldest notices are dropped once `max_visible` is
/// exceeded; expired notices are pruned on read.
pub struct ToastQueue {
    config: ToastQueueConfig,
    state: Mutex<ToastQueueState>,
}

impl ToastQueue {
    pub fn new(config: ToastQueueConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ToastQueueState::default()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ToastQueueState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Returns notices still visible at `now_unix_ms`, pruning expired ones.
    pub fn active(&self, now_unix_ms: u64) -> Vec<Notice> {
        let mut state = self.lock_state();
        state
            .notices
            .retain(|notice| !is_expired_unix_ms(Some(notice.expires_unix_ms), now_unix_ms));
        state.notices.iter().cloned().collect()
    }

    /// Returns every retained notice without pruning.
    pub fn snapshot(&self) -> Vec<Notice> {
        self.lock_state().notices.iter().cloned().collect()
    }

    /// Removes a notice early (operator closed it). Returns false when absent.
    pub fn remove(&self, notice_id: u64) -> bool {
        let mut state = self.lock_state();
        let before = state.notices.len();
        state.notices.retain(|notice| notice.id != notice_id);
        state.notices.len() != before
    }

    fn push_at(&self, kind: NoticeKind, title: &str, body: &str, now_unix_ms: u64) -> u64 {
        let ttl_ms = u64::try_from(self.config.ttl.as_millis()).unwrap_or(u64::MAX);
        let mut state = self.lock_state();
        state.next_id = state.next_id.saturating_add(1);
        let id = state.next_id;
        state.notices.push_back(Notice {
            id,
            kind,
            title: title.to_string(),
            body: body.to_string(),
            raised_unix_ms: now_unix_ms,
            expires_unix_ms: now_unix_ms.saturating_add(ttl_ms),
        });
        let max_visible = self.config.max_visible.max(1);
        while state.notices.len() > max_visible {
            state.notices.pop_front();
        }
        id
    }
}

impl NotificationSurface for ToastQueue {
    fn raise(&self, kind: NoticeKind, title: &str, body: &str) {
        let id = self.push_at(kind, title, body, current_unix_timestamp_ms());
        tracing::debug!(notice_id = id, kind = kind.as_str(), title, "notice raised");
    }
}
