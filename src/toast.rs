//! Action toasts with auto-dismiss.
//!
//! A toast carries a payload (for example a follow-on offer) and resolves
//! exactly once: accepted or dismissed by the user, or timed out. A user
//! action before the deadline aborts the timer task.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::db::CrmDb;
use crate::error::CrmError;
use crate::status::{accept_follow_on, FollowOnOffer};
use crate::types::Appointment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastResolution {
    Accepted,
    Dismissed,
    TimedOut,
}

struct ToastInner {
    sender: Mutex<Option<oneshot::Sender<ToastResolution>>>,
    timer: Mutex<Option<AbortHandle>>,
}

/// Handle the UI uses to resolve a toast. Cheap to clone.
#[derive(Clone)]
pub struct ToastHandle {
    inner: Arc<ToastInner>,
}

impl ToastHandle {
    /// Resolve the toast. Returns false if it was already resolved.
    pub fn resolve(&self, resolution: ToastResolution) -> bool {
        let Some(sender) = self.inner.sender.lock().take() else {
            return false;
        };
        if let Some(timer) = self.inner.timer.lock().take() {
            if resolution != ToastResolution::TimedOut {
                timer.abort();
            }
        }
        let _ = sender.send(resolution);
        true
    }

    pub fn accept(&self) -> bool {
        self.resolve(ToastResolution::Accepted)
    }

    pub fn dismiss(&self) -> bool {
        self.resolve(ToastResolution::Dismissed)
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.sender.lock().is_none()
    }
}

/// The waiting side of a toast.
pub struct PendingToast<T> {
    payload: T,
    receiver: oneshot::Receiver<ToastResolution>,
}

impl<T> PendingToast<T> {
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Wait for the resolution. A dropped handle counts as a dismissal.
    pub async fn wait(self) -> (T, ToastResolution) {
        let resolution = self.receiver.await.unwrap_or(ToastResolution::Dismissed);
        (self.payload, resolution)
    }
}

/// Show a toast that times out after `auto_dismiss`. Must be called from
/// within a tokio runtime.
pub fn show_toast<T>(payload: T, auto_dismiss: Duration) -> (ToastHandle, PendingToast<T>) {
    let (sender, receiver) = oneshot::channel();
    let handle = ToastHandle {
        inner: Arc::new(ToastInner {
            sender: Mutex::new(Some(sender)),
            timer: Mutex::new(None),
        }),
    };

    let timer_handle = handle.clone();
    let task = tokio::spawn(async move {
        tokio::time::sleep(auto_dismiss).await;
        if timer_handle.resolve(ToastResolution::TimedOut) {
            log::debug!("Toast timed out after {:?}", auto_dismiss);
        }
    });
    *handle.inner.timer.lock() = Some(task.abort_handle());

    (handle, PendingToast { payload, receiver })
}

/// Create the offered appointment only if the toast was accepted.
pub fn settle_follow_on(
    db: &CrmDb,
    offer: FollowOnOffer,
    resolution: ToastResolution,
) -> Result<Option<Appointment>, CrmError> {
    match resolution {
        ToastResolution::Accepted => accept_follow_on(db, offer).map(Some),
        ToastResolution::Dismissed | ToastResolution::TimedOut => {
            log::debug!("Follow-on for {} not taken ({:?})", offer.origin_id, resolution);
            Ok(None)
        }
    }
}
