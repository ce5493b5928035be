#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Storefront protocol client
//!
//! Authenticates an account against the storefront and resolves a
//! downloadable entitlement for a purchased package. One `StoreClient`
//! owns one cookie jar, so the authenticate and entitlement calls of a
//! job share session state and concurrent jobs never contaminate each
//! other.

mod classify;
mod client;
mod device;

pub use classify::{classify_failure, FailureKind};
pub use client::StoreClient;
pub use device::device_guid;
