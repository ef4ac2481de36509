use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::display::{RenderEvent, RenderSink};

pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorNotice {
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct NoticeSlot {
    current: Option<ErrorNotice>,
    /// Bumped on every report so a stale expiry timer never clears a newer notice.
    generation: u64,
    expiry: Option<JoinHandle<()>>,
}

/// Single-slot, self-expiring error surface. A newer report always replaces
/// the visible notice; nothing is queued.
#[derive(Clone)]
pub struct ErrorChannel {
    slot: Arc<Mutex<NoticeSlot>>,
    ttl: Duration,
    renderer: Arc<dyn RenderSink>,
}

impl ErrorChannel {
    pub fn new(ttl: Duration, renderer: Arc<dyn RenderSink>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(NoticeSlot::default())),
            ttl,
            renderer,
        }
    }

    /// Shows `message` and schedules its dismissal. Must be called from
    /// inside a tokio runtime.
    pub fn report(&self, message: impl Into<String>) -> ErrorNotice {
        let message = message.into();
        warn!("surfacing error notice: {message}");

        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::zero());
        let notice = ErrorNotice {
            message,
            expires_at,
        };

        {
            let mut slot = self.lock_slot();
            slot.generation = slot.generation.wrapping_add(1);
            if let Some(handle) = slot.expiry.take() {
                handle.abort();
            }
            slot.current = Some(notice.clone());

            let generation = slot.generation;
            let channel = self.clone();
            slot.expiry = Some(tokio::spawn(async move {
                tokio::time::sleep(channel.ttl).await;
                channel.expire(generation);
            }));
        }

        self.renderer
            .emit(RenderEvent::ErrorNoticeChanged(Some(notice.clone())));
        notice
    }

    /// Clears the visible notice right away. Returns whether one was showing.
    pub fn dismiss(&self) -> bool {
        let dismissed = {
            let mut slot = self.lock_slot();
            if let Some(handle) = slot.expiry.take() {
                handle.abort();
            }
            slot.current.take().is_some()
        };

        if dismissed {
            self.renderer.emit(RenderEvent::ErrorNoticeChanged(None));
        }
        dismissed
    }

    pub fn current(&self) -> Option<ErrorNotice> {
        self.lock_slot().current.clone()
    }

    fn expire(&self, generation: u64) {
        let expired = {
            let mut slot = self.lock_slot();
            if slot.generation != generation || slot.current.is_none() {
                return;
            }
            slot.expiry = None;
            slot.current.take().is_some()
        };

        if expired {
            self.renderer.emit(RenderEvent::ErrorNoticeChanged(None));
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, NoticeSlot> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
