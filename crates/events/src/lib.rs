#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for async progress reporting in ipaforge
//!
//! Pipeline phases report fine-grained progress through an unbounded
//! channel of domain events. The job orchestrator owns the coarse job
//! record; events carry everything in between (per-chunk download
//! progress, retry notices, upload lifecycle).

pub mod events;
pub use events::{AppEvent, DownloadEvent, GeneralEvent, JobEvent, PublishEvent, StoreEvent};

use tokio::sync::mpsc::UnboundedSender;

/// Type alias for the event sender
pub type EventSender = UnboundedSender<AppEvent>;

/// Type alias for the event receiver
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<AppEvent>;

/// Create a new event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// Unified trait for emitting events
///
/// Implemented by anything that carries an optional `EventSender`; a
/// dropped receiver never fails the pipeline.
pub trait EventEmitter {
    fn event_sender(&self) -> Option<&EventSender>;

    fn emit(&self, event: AppEvent) {
        if let Some(sender) = self.event_sender() {
            let _ = sender.send(event);
        }
    }

    fn emit_debug(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::Debug {
            message: message.into(),
        }));
    }

    fn emit_warning(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::Warning {
            message: message.into(),
        }));
    }
}

impl EventEmitter for EventSender {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(self)
    }
}

impl EventEmitter for Option<EventSender> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropped_receiver_does_not_fail_emit() {
        let (tx, rx) = channel();
        drop(rx);
        tx.emit_debug("into the void");
    }

    #[tokio::test]
    async fn events_arrive_in_order() {
        let (tx, mut rx) = channel();
        tx.emit(AppEvent::Download(DownloadEvent::ChunkCompleted {
            url: "u".into(),
            index: 0,
            total: 3,
        }));
        tx.emit(AppEvent::Download(DownloadEvent::ChunkCompleted {
            url: "u".into(),
            index: 1,
            total: 3,
        }));

        let first = rx.recv().await.unwrap();
        let AppEvent::Download(DownloadEvent::ChunkCompleted { index, .. }) = first else {
            panic!("unexpected event: {first:?}");
        };
        assert_eq!(index, 0);
    }
}
