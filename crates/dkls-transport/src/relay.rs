//! [`RelayControlPlane`]: the capability boundary `dkls-bootstrap` and
//! `dkls-sdk` actually program against, rather than [`crate::RelayClient`]
//! directly.
//!
//! Mirroring how `dkls-engine::EngineFactory` and
//! `dkls-keystore::KeystoreBackend` keep the rest of the workspace from
//! depending on one concrete implementation, this trait lets
//! integration tests drive the bootstrap and protocol layers against an
//! in-process fake relay with no real sockets, while production code
//! wires up [`crate::RelayClient`] unchanged.

use async_trait::async_trait;

use dkls_types::envelope::Envelope;
use dkls_types::group::GroupId;
use dkls_types::party::BearerToken;

use crate::http::{CreatedGroup, GroupInfo, Registration};
use crate::Result;

/// The full C2 surface: control plane plus envelope channel.
#[async_trait]
pub trait RelayControlPlane: Send + Sync {
    async fn register(&self) -> Result<Registration>;

    async fn create_group(
        &self,
        token: &BearerToken,
        threshold: u8,
        participants: u8,
        timeout_secs: u64,
    ) -> Result<CreatedGroup>;

    async fn join_group(&self, token: &BearerToken, group_id: &str) -> Result<()>;

    async fn group_info(&self, token: &BearerToken, group_id: &str) -> Result<GroupInfo>;

    /// Open (or replace) the envelope channel for `group_id`.
    async fn connect(&mut self, token: BearerToken, group_id: GroupId) -> Result<()>;

    /// Enqueue a sealed envelope for transmission.
    fn send_envelope(&self, envelope: Envelope) -> Result<()>;

    /// Await the next inbound envelope.
    async fn recv_envelope(&self) -> Option<Envelope>;

    /// Close the envelope channel, if open.
    async fn disconnect(&mut self);
}

#[async_trait]
impl RelayControlPlane for crate::client::RelayClient {
    async fn register(&self) -> Result<Registration> {
        crate::client::RelayClient::register(self).await
    }

    async fn create_group(
        &self,
        token: &BearerToken,
        threshold: u8,
        participants: u8,
        timeout_secs: u64,
    ) -> Result<CreatedGroup> {
        crate::client::RelayClient::create_group(self, token, threshold, participants, timeout_secs).await
    }

    async fn join_group(&self, token: &BearerToken, group_id: &str) -> Result<()> {
        crate::client::RelayClient::join_group(self, token, group_id).await
    }

    async fn group_info(&self, token: &BearerToken, group_id: &str) -> Result<GroupInfo> {
        crate::client::RelayClient::group_info(self, token, group_id).await
    }

    async fn connect(&mut self, token: BearerToken, group_id: GroupId) -> Result<()> {
        crate::client::RelayClient::connect(self, token, group_id).await
    }

    fn send_envelope(&self, envelope: Envelope) -> Result<()> {
        crate::client::RelayClient::send_envelope(self, envelope)
    }

    async fn recv_envelope(&self) -> Option<Envelope> {
        crate::client::RelayClient::recv_envelope(self).await
    }

    async fn disconnect(&mut self) {
        crate::client::RelayClient::disconnect(self).await
    }
}
