//! Shared test fixtures for the end-to-end scenarios in `tests/`.
//!
//! [`fake_relay`] is an in-process stand-in for the real relay server
//! (§4.2/§6): a shared hub that every test's `SdkClient`s register
//! against, so a scenario exercises the real `dkls-bootstrap` /
//! `dkls-protocol` / `dkls-sdk` code paths with no sockets involved.

pub mod fake_relay;
