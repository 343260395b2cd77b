//! This crate contains the general types and pure functions that need to be shared across the
//! relayer crates: chain identifiers, the decoded attestation envelope, routes and dispatch
//! outcomes.
//!
//! It lies at the bottom of the crate-hierarchy in this workspace i.e., it does not depend on any
//! other crate in this workspace.

pub mod attestation;
pub mod chain;
pub mod constants;
pub mod outcome;
pub mod route;
pub mod vaa;
