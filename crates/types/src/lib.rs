#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Shared type definitions for ipaforge
//!
//! Domain types that cross crate boundaries: storefront sessions and
//! entitlements, job records, and published artifacts.

pub mod entitlement;
pub mod job;
pub mod session;

pub use entitlement::{Entitlement, PackageRequest, Sinf};
pub use job::{JobFailure, JobId, JobPhase, JobResult, JobSnapshot, JobStatus};
pub use session::{AuthOutcome, Credentials, Session};
