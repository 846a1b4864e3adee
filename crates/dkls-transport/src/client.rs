//! [`RelayClient`]: the public C2 surface, combining the HTTP control
//! plane ([`crate::http::RelayHttpClient`]) with the persistent
//! WebSocket envelope channel ([`crate::ws::RelayConnection`]).
//!
//! A client is constructed unconnected (HTTP-only, for registration
//! and group setup) and gains a live socket once a group id is known,
//! mirroring the creator/joiner bootstrap flows in §4.7: both register
//! and create/join a group over HTTP before either party needs the
//! socket at all.

use dkls_types::envelope::Envelope;
use dkls_types::group::GroupId;
use dkls_types::party::BearerToken;

use crate::http::{CreatedGroup, GroupInfo, RelayHttpClient, Registration};
use crate::ws::RelayConnection;
use crate::{Result, TransportError};

/// A relay endpoint, reachable over both HTTP and WebSocket.
///
/// Both share one logical relay, so the WebSocket URL is derived from
/// the HTTP base URL by swapping the scheme (`http`/`https` ->
/// `ws`/`wss`) and appending the fixed `/ws` path, matching the single
/// base-URL configuration surface the SDK facade exposes (§4.8).
pub struct RelayClient {
    http: RelayHttpClient,
    ws_base: url::Url,
    socket: Option<RelayConnection>,
}

impl RelayClient {
    /// Build a client from the relay's HTTP base URL, e.g.
    /// `https://relay.example.com/`.
    pub fn new(http_base_url: url::Url) -> Result<Self> {
        let ws_base = derive_ws_url(&http_base_url)?;
        Ok(Self {
            http: RelayHttpClient::new(http_base_url),
            ws_base,
            socket: None,
        })
    }

    /// Build a client with an explicit WebSocket base URL rather than
    /// deriving one from the HTTP base (§4.8 construction takes both
    /// independently).
    pub fn with_ws_url(http_base_url: url::Url, ws_base_url: url::Url) -> Self {
        Self {
            http: RelayHttpClient::new(http_base_url),
            ws_base: ws_base_url,
            socket: None,
        }
    }

    /// `POST /party/register`.
    pub async fn register(&self) -> Result<Registration> {
        self.http.register().await
    }

    /// `POST /group/create`.
    pub async fn create_group(
        &self,
        token: &BearerToken,
        threshold: u8,
        participants: u8,
        timeout_secs: u64,
    ) -> Result<CreatedGroup> {
        self.http
            .create_group(token, threshold, participants, timeout_secs)
            .await
    }

    /// `POST /group/join`.
    pub async fn join_group(&self, token: &BearerToken, group_id: &str) -> Result<()> {
        self.http.join_group(token, group_id).await
    }

    /// `POST /group/info`.
    pub async fn group_info(&self, token: &BearerToken, group_id: &str) -> Result<GroupInfo> {
        self.http.group_info(token, group_id).await
    }

    /// Open (or replace) the WebSocket envelope channel for `group_id`.
    ///
    /// Only one socket is live per client, matching the "one
    /// authenticated WebSocket connection per SDK instance" contract
    /// (§4.2); bootstrapping a new group after dropping an old one
    /// replaces it outright.
    pub async fn connect(&mut self, token: BearerToken, group_id: GroupId) -> Result<()> {
        let connection =
            RelayConnection::connect(self.ws_base.clone(), token, Some(group_id.to_hex()))
                .await?;
        self.socket = Some(connection);
        Ok(())
    }

    /// Send a sealed envelope over the live socket.
    ///
    /// Returns [`TransportError::Invalid`] if [`connect`](Self::connect)
    /// has not been called yet.
    pub fn send_envelope(&self, envelope: Envelope) -> Result<()> {
        self.socket
            .as_ref()
            .ok_or_else(|| TransportError::Invalid("not connected".into()))?
            .send(envelope)
    }

    /// Await the next inbound envelope on the live socket.
    ///
    /// Returns `None` immediately if never connected, or once the
    /// socket is closed for good.
    pub async fn recv_envelope(&self) -> Option<Envelope> {
        match &self.socket {
            Some(socket) => socket.recv().await,
            None => None,
        }
    }

    /// Close the live socket, if any.
    pub async fn disconnect(&mut self) {
        if let Some(socket) = self.socket.take() {
            socket.close().await;
        }
    }
}

fn derive_ws_url(http_base_url: &url::Url) -> Result<url::Url> {
    let scheme = match http_base_url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(TransportError::Invalid(format!(
                "unsupported relay scheme {other:?}"
            )))
        }
    };
    let mut ws_url = http_base_url.clone();
    ws_url
        .set_scheme(scheme)
        .map_err(|_| TransportError::Invalid("failed to rewrite relay scheme".into()))?;
    ws_url.set_path("ws");
    Ok(ws_url)
}
