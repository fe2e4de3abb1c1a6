#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod checkout;
pub mod config;
pub mod entities;
pub mod framework;
pub mod processors;
pub mod providers;
pub mod token;
