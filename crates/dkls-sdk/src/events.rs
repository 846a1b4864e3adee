//! The typed event channel the Facade exposes to a host UI (§9 "Cyclic
//! references in the original" / "Design notes"): the SDK owns no
//! reference back into a UI event bus, it only ever emits into this
//! channel and the UI subscribes.

use dkls_types::group::GroupId;
use dkls_types::session::ProtocolKind;
use dkls_types::share::PublicKeyBytes;
use tokio::sync::broadcast;

/// Default event channel capacity. A slow or absent subscriber never
/// blocks the SDK; it simply misses events once the ring buffer wraps
/// (`tokio::sync::broadcast`'s lagged-receiver semantics).
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// A lifecycle event emitted by the SDK core.
#[derive(Debug, Clone)]
pub enum SdkEvent {
    /// The relay envelope channel for `group_id` came up.
    Connected { group_id: GroupId },
    /// The relay envelope channel for `group_id` went down.
    Disconnected { group_id: GroupId },
    /// A DKG/Rotation round advanced without yet reaching an artifact.
    KeygenProgress { group_id: GroupId, round: u32 },
    /// DKG (or Rotation, which reuses this event) produced a share.
    KeygenComplete {
        group_id: GroupId,
        public_key: PublicKeyBytes,
    },
    /// DSG produced a verifiable `(r, s)` signature.
    SignComplete {
        group_id: GroupId,
        r: [u8; 32],
        s: [u8; 32],
    },
    /// Any protocol's round advanced; finer-grained than
    /// `KeygenProgress`, useful for a generic progress bar.
    RoundComplete {
        group_id: GroupId,
        protocol: ProtocolKind,
        round: u32,
    },
    /// A session failed, or a non-fatal operational problem occurred.
    Error {
        group_id: Option<GroupId>,
        message: String,
    },
}

/// Broadcasts [`SdkEvent`] values to every current subscriber.
///
/// Mirrors the teacher daemon's `EventBus`: one `broadcast::Sender`,
/// no per-subscriber bookkeeping beyond what `tokio::sync::broadcast`
/// already provides.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SdkEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event. Silently dropped if there are no subscribers.
    pub fn emit(&self, event: SdkEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<SdkEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gid() -> GroupId {
        GroupId::from_bytes([7u8; 32])
    }

    #[test]
    fn emit_then_subscribe_receives_it() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        bus.emit(SdkEvent::Connected { group_id: gid() });
        let event = rx.try_recv().expect("receive event");
        assert!(matches!(event, SdkEvent::Connected { .. }));
    }

    #[test]
    fn emit_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new(16);
        bus.emit(SdkEvent::Disconnected { group_id: gid() });
    }
}
