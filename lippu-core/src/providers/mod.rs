//! Clients for the external payment collaborators.
//!
//! Both collaborators sit behind traits so the checkout logic can be
//! exercised with fakes: [`rates::RateSource`] quotes EUR/BTC and
//! [`address::AddressProvider`] generates per-order forwarding addresses.

pub mod address;
pub mod rates;
