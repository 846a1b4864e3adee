//! The Protocol Manager (§4.6): single-flight session ownership per
//! group, and envelope routing from `(group_id, protocol_kind)` down to
//! the right [`RoundProcessor`].

use std::collections::HashMap;
use std::time::Duration;

use dkls_engine::{Artifact, EngineFactory, EngineMessage};
use dkls_types::group::GroupId;
use dkls_types::party::PartyIndex;
use dkls_types::session::ProtocolKind;

use dkls_engine::SessionParams;

use crate::processor::{ProcessorState, RoundProcessor, DEFAULT_ROUND_TIMEOUT};
use crate::{ProtocolError, Result};

struct ActiveSession {
    protocol_kind: ProtocolKind,
    processor: RoundProcessor,
}

/// What happened to a routed inbound message.
#[derive(Debug)]
pub enum RoutedOutcome {
    /// The message was buffered; these messages (if any) should now be
    /// sealed and sent out.
    Continue { messages: Vec<EngineMessage> },
    /// The session reached its artifact. The manager has already
    /// forgotten the session; the group is free for a new `start_*`.
    Completed {
        messages: Vec<EngineMessage>,
        artifact: Artifact,
    },
    /// The session failed. The manager has already forgotten it.
    Failed { reason: String },
    /// No active session matched `(group_id, protocol_kind)` — an
    /// unknown or already-finished session. Dropped, not an error.
    Dropped,
}

/// Owns at most one active session per group (§4.6 "single-flight"),
/// and fans inbound envelopes into whichever [`RoundProcessor`] they
/// belong to.
pub struct ProtocolManager {
    factory: Box<dyn EngineFactory>,
    sessions: HashMap<GroupId, ActiveSession>,
    round_timeout: Duration,
}

impl ProtocolManager {
    pub fn new(factory: Box<dyn EngineFactory>) -> Self {
        Self {
            factory,
            sessions: HashMap::new(),
            round_timeout: DEFAULT_ROUND_TIMEOUT,
        }
    }

    pub fn with_round_timeout(factory: Box<dyn EngineFactory>, round_timeout: Duration) -> Self {
        Self {
            factory,
            sessions: HashMap::new(),
            round_timeout,
        }
    }

    /// Whether a session is currently active for `group_id`.
    pub fn is_busy(&self, group_id: &GroupId) -> bool {
        self.sessions.contains_key(group_id)
    }

    /// Start a new session for `group_id`. Fails with
    /// [`ProtocolError::Busy`] if one is already active.
    pub fn start(&mut self, group_id: GroupId, params: SessionParams) -> Result<Vec<EngineMessage>> {
        if self.sessions.contains_key(&group_id) {
            return Err(ProtocolError::Busy);
        }
        let protocol_kind = params.protocol_kind;
        let (processor, first_messages) =
            RoundProcessor::start(self.factory.as_ref(), params, self.round_timeout)?;
        tracing::info!(group_id = %group_id, protocol = %protocol_kind, "session started");
        self.sessions.insert(
            group_id,
            ActiveSession {
                protocol_kind,
                processor,
            },
        );
        Ok(first_messages)
    }

    /// Route one inbound round payload to its session.
    ///
    /// A message whose `(group_id, protocol_kind)` does not match any
    /// active session — wrong protocol, already completed, or never
    /// started — is dropped with a warning rather than treated as an
    /// error, matching §4.6's tolerance for stray or duplicate relay
    /// deliveries.
    pub fn ingest(
        &mut self,
        group_id: GroupId,
        protocol_kind: ProtocolKind,
        round_index: u32,
        from: PartyIndex,
        payload: Vec<u8>,
    ) -> Result<RoutedOutcome> {
        let Some(session) = self.sessions.get_mut(&group_id) else {
            tracing::warn!(group_id = %group_id, protocol = %protocol_kind, "dropping message for unknown session");
            return Ok(RoutedOutcome::Dropped);
        };
        if session.protocol_kind != protocol_kind {
            tracing::warn!(
                group_id = %group_id,
                expected = %session.protocol_kind,
                got = %protocol_kind,
                "dropping message for mismatched protocol"
            );
            return Ok(RoutedOutcome::Dropped);
        }

        let messages = session.processor.ingest(round_index, from, payload)?;
        match session.processor.state() {
            ProcessorState::Completed(artifact) => {
                let artifact = artifact.clone();
                self.sessions.remove(&group_id);
                tracing::info!(group_id = %group_id, protocol = %protocol_kind, "session completed");
                Ok(RoutedOutcome::Completed { messages, artifact })
            }
            ProcessorState::Failed(reason) => {
                let reason = reason.clone();
                self.sessions.remove(&group_id);
                tracing::warn!(group_id = %group_id, protocol = %protocol_kind, reason = %reason, "session failed");
                Ok(RoutedOutcome::Failed { reason })
            }
            _ => Ok(RoutedOutcome::Continue { messages }),
        }
    }

    /// Cancel the active session for `group_id`, if any. Returns
    /// whether a session was actually cancelled.
    pub fn cancel(&mut self, group_id: &GroupId) -> bool {
        let removed = self.sessions.remove(group_id).is_some();
        if removed {
            tracing::info!(group_id = %group_id, "session cancelled");
        }
        removed
    }

    /// Sweep active sessions for round timeouts, failing and forgetting
    /// each one that has passed its deadline. Intended to be called
    /// periodically by the caller's own timer.
    pub fn sweep_timeouts(&mut self) -> Vec<(GroupId, ProtocolError)> {
        let timed_out: Vec<GroupId> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.processor.round_timed_out())
            .map(|(group_id, _)| *group_id)
            .collect();

        timed_out
            .into_iter()
            .map(|group_id| {
                self.sessions.remove(&group_id);
                tracing::warn!(group_id = %group_id, "session round timed out");
                (group_id, ProtocolError::Timeout { scope: "round".into() })
            })
            .collect()
    }
}
