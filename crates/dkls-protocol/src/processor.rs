//! The Round Processor (§4.5): drives one [`MpcEngine`] session to
//! completion, buffering inbound round payloads until fan-in and
//! retrying a round a bounded number of times before giving up.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use dkls_engine::{Artifact, EngineFactory, EngineMessage, InboundMessage, MpcEngine, SessionParams};
use dkls_types::party::PartyIndex;

use crate::{ProtocolError, Result};

/// At most this many engine errors are tolerated for a single round
/// before the session fails outright (§4.5 "attempt budget").
const MAX_ENGINE_ERRORS_PER_ROUND: u8 = 2;

/// Default per-round fan-in deadline, renewed at the start of every
/// round (§4.5).
pub const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_secs(30);

/// The processor's lifecycle (§4.5).
#[derive(Debug, Clone)]
pub enum ProcessorState {
    Idle,
    Running { round: u32 },
    Processing { round: u32 },
    Completed(Artifact),
    Failed(String),
}

impl ProcessorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessorState::Completed(_) | ProcessorState::Failed(_))
    }
}

/// Drives one `(group, protocol)` session's [`MpcEngine`] from buffered
/// inbound round payloads.
///
/// Ownership of transport, AEAD sealing, and cross-group routing stays
/// with the caller (`ProtocolManager` and above); this type only knows
/// about `PartyIndex`-addressed payloads and round numbers.
pub struct RoundProcessor {
    engine: Box<dyn MpcEngine>,
    peers: Vec<PartyIndex>,
    state: ProcessorState,
    current_round: u32,
    inbound: HashMap<u32, HashMap<PartyIndex, Vec<u8>>>,
    error_counts: HashMap<u32, u8>,
    round_timeout: Duration,
    round_deadline: Instant,
}

impl RoundProcessor {
    /// Construct the engine and produce its round-1 outbound messages.
    pub fn start(
        factory: &dyn EngineFactory,
        params: SessionParams,
        round_timeout: Duration,
    ) -> Result<(Self, Vec<EngineMessage>)> {
        let mut engine = factory.construct(&params)?;
        let first = engine.first_message()?;
        let peers = params
            .participants
            .iter()
            .copied()
            .filter(|p| *p != params.party_index)
            .collect();

        let processor = Self {
            engine,
            peers,
            state: ProcessorState::Running { round: 1 },
            current_round: 1,
            inbound: HashMap::new(),
            error_counts: HashMap::new(),
            round_timeout,
            round_deadline: Instant::now() + round_timeout,
        };
        Ok((processor, first))
    }

    pub fn state(&self) -> &ProcessorState {
        &self.state
    }

    /// Buffer one peer's payload for `round_index`, advancing the
    /// engine through as many rounds as the buffer now supports.
    ///
    /// Messages for a round below the current one are stale (the
    /// sender has not yet learned we advanced, or is retransmitting) and
    /// are dropped, matching the idempotence requirement in §4.5.
    pub fn ingest(
        &mut self,
        round_index: u32,
        from: PartyIndex,
        payload: Vec<u8>,
    ) -> Result<Vec<EngineMessage>> {
        if self.state.is_terminal() {
            return Ok(Vec::new());
        }
        if round_index < self.current_round {
            tracing::debug!(round_index, current_round = self.current_round, "dropping stale round message");
            return Ok(Vec::new());
        }
        self.inbound
            .entry(round_index)
            .or_default()
            .insert(from, payload);
        self.advance()
    }

    /// Whether the current round has been waiting past its deadline.
    /// Callers should poll this on a timer and, if `true`, treat the
    /// session as failed with [`ProtocolError::Timeout`].
    pub fn round_timed_out(&self) -> bool {
        !self.state.is_terminal() && Instant::now() >= self.round_deadline
    }

    fn advance(&mut self) -> Result<Vec<EngineMessage>> {
        loop {
            let have = self
                .inbound
                .get(&self.current_round)
                .map(HashMap::len)
                .unwrap_or(0);
            if have < self.peers.len() {
                return Ok(Vec::new());
            }

            let round = self.current_round;
            self.state = ProcessorState::Processing { round };

            let buffer = self.inbound.remove(&round).expect("just checked len");
            let messages: Vec<InboundMessage> = self
                .peers
                .iter()
                .map(|&p| InboundMessage {
                    from: p,
                    payload: buffer
                        .get(&p)
                        .cloned()
                        .expect("fan-in check guarantees every peer is present"),
                })
                .collect();

            match self.engine.handle(round, &messages) {
                Ok(outbound) => {
                    if let Some(artifact) = self.engine.completed() {
                        self.state = ProcessorState::Completed(artifact);
                        return Ok(outbound);
                    }
                    self.current_round = round + 1;
                    self.state = ProcessorState::Running {
                        round: self.current_round,
                    };
                    self.round_deadline = Instant::now() + self.round_timeout;
                    if outbound.is_empty() {
                        // No more work to send but no artifact either: keep
                        // looping, in case next round's messages already
                        // arrived early.
                        continue;
                    }
                    return Ok(outbound);
                }
                Err(e) => {
                    let attempts = self.error_counts.entry(round).or_insert(0);
                    *attempts += 1;
                    if *attempts >= MAX_ENGINE_ERRORS_PER_ROUND {
                        let reason = e.to_string();
                        self.state = ProcessorState::Failed(reason);
                        return Err(ProtocolError::Engine(e));
                    }
                    tracing::warn!(round, attempts = *attempts, error = %e, "engine round failed, awaiting retry");
                    self.state = ProcessorState::Running { round };
                    return Ok(Vec::new());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dkls_engine::fixture::FixtureEngineFactory;
    use dkls_types::session::ProtocolKind;

    fn params(party_index: PartyIndex, participants: Vec<PartyIndex>) -> SessionParams {
        SessionParams {
            protocol_kind: ProtocolKind::Dkg,
            party_index,
            participants,
            threshold: 2,
            digest: None,
            existing_share: None,
        }
    }

    #[test]
    fn completes_once_fan_in_is_reached() {
        let factory = FixtureEngineFactory;
        let participants = vec![PartyIndex(0), PartyIndex(1), PartyIndex(2)];

        let mut processors: HashMap<PartyIndex, (RoundProcessor, Vec<EngineMessage>)> = participants
            .iter()
            .map(|&p| {
                let (proc, first) =
                    RoundProcessor::start(&factory, params(p, participants.clone()), DEFAULT_ROUND_TIMEOUT)
                        .expect("start");
                (p, (proc, first))
            })
            .collect();

        for &p in &participants {
            for &q in &participants {
                if p == q {
                    continue;
                }
                let payload = processors[&q].1[0].payload.clone();
                let out = processors
                    .get_mut(&p)
                    .unwrap()
                    .0
                    .ingest(1, q, payload)
                    .expect("ingest");
                assert!(out.is_empty());
            }
            assert!(matches!(
                processors[&p].0.state(),
                ProcessorState::Completed(_)
            ));
        }
    }

    #[test]
    fn a_stale_round_message_is_dropped_without_advancing() {
        let factory = FixtureEngineFactory;
        let participants = vec![PartyIndex(0), PartyIndex(1)];
        let (mut proc, _first) =
            RoundProcessor::start(&factory, params(PartyIndex(0), participants), DEFAULT_ROUND_TIMEOUT)
                .expect("start");

        let out = proc.ingest(0, PartyIndex(1), vec![1, 2, 3]).expect("ingest");
        assert!(out.is_empty());
        assert!(matches!(proc.state(), ProcessorState::Running { round: 1 }));
    }

    #[test]
    fn an_unreached_deadline_is_not_yet_timed_out() {
        let factory = FixtureEngineFactory;
        let participants = vec![PartyIndex(0), PartyIndex(1)];
        let (proc, _first) =
            RoundProcessor::start(&factory, params(PartyIndex(0), participants), DEFAULT_ROUND_TIMEOUT)
                .expect("start");
        assert!(!proc.round_timed_out());
    }

    /// An engine whose `handle` always errors, used to exercise the
    /// attempt budget without depending on the fixture engine's own
    /// (non-erroring) round math.
    struct AlwaysErrorsEngine;

    impl MpcEngine for AlwaysErrorsEngine {
        fn first_message(&mut self) -> dkls_engine::Result<Vec<EngineMessage>> {
            Ok(vec![EngineMessage {
                to: dkls_engine::EngineRecipient::Broadcast,
                payload: vec![0],
            }])
        }

        fn handle(&mut self, _round_index: u32, _inbound: &[InboundMessage]) -> dkls_engine::Result<Vec<EngineMessage>> {
            Err(dkls_engine::EngineError::ComputationFailed("forced failure".into()))
        }

        fn completed(&self) -> Option<Artifact> {
            None
        }

        fn to_bytes(&self) -> dkls_engine::Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    struct AlwaysErrorsFactory;

    impl EngineFactory for AlwaysErrorsFactory {
        fn construct(&self, _params: &SessionParams) -> dkls_engine::Result<Box<dyn MpcEngine>> {
            Ok(Box::new(AlwaysErrorsEngine))
        }
    }

    #[test]
    fn a_second_engine_error_on_the_same_round_is_terminal() {
        let factory = AlwaysErrorsFactory;
        let participants = vec![PartyIndex(0), PartyIndex(1)];
        let (mut proc, _first) =
            RoundProcessor::start(&factory, params(PartyIndex(0), participants), DEFAULT_ROUND_TIMEOUT)
                .expect("start");

        // First engine error: tolerated, round is retried.
        let err = proc.ingest(1, PartyIndex(1), vec![1]);
        assert!(err.is_ok(), "first engine error must not be fatal");
        assert!(matches!(proc.state(), ProcessorState::Running { round: 1 }));

        // Second engine error on the same round: fatal.
        let err = proc.ingest(1, PartyIndex(1), vec![1]);
        assert!(err.is_err(), "second engine error on the same round must be fatal");
        assert!(matches!(proc.state(), ProcessorState::Failed(_)));
    }
}
