//! # dkls-sdk
//!
//! The Facade (C8, §4.8): the one public capability object a host
//! application constructs. Composes every other crate in the
//! workspace — Relay Client, Session Key Ring, Keystore, Protocol
//! Manager, Session Bootstrap — into `create_group`/`join_group`/
//! `start_keygen`/`start_signing`/`start_rotation`/`start_recovery`,
//! and exposes a typed event channel rather than holding any
//! reference back into a host UI (§9 "Cyclic references in the
//! original").
//!
//! ## Modules
//!
//! - [`client`] — [`client::SdkClient`], the Facade itself.
//! - [`config`] — [`config::SdkConfig`], loadable from TOML.
//! - [`events`] — [`events::SdkEvent`] and the broadcast channel it
//!   travels on.
//! - [`error`] — [`error::SdkError`], the facade-level error taxonomy.

pub mod client;
pub mod config;
pub mod error;
pub mod events;

pub use client::SdkClient;
pub use config::{KeystoreBackendKind, SdkConfig};
pub use error::{Result, SdkError};
pub use events::SdkEvent;
