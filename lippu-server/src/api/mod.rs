//! HTTP API surface: payment webhook, customer order endpoints, the
//! public category listing, and the admin API.

pub mod admin;
pub mod categories;
pub mod extractors;
pub mod orders;
pub mod webhook;
