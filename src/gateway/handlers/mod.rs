//! HTTP handlers
//!
//! Every handler except health runs behind the principal middleware and
//! receives the caller as `Extension<Principal>`.

pub mod account;
pub mod health;
pub mod transfer;
