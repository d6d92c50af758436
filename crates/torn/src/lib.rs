//! Client for the game's public HTTP API.
//!
//! Provides the typed faction endpoint ([`api::TornApi`]), API key rotation
//! and request rate limiting ([`rate_limit`]), and [`source::TornSource`],
//! the [`warboard_core::source::StatusSource`] the status cache polls.

pub mod api;
pub mod payload;
pub mod rate_limit;
pub mod source;
