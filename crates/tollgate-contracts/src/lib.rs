//! # tollgate-contracts
//!
//! Shared types, decisions, and error contracts for the Tollgate runtime.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions and error types.

pub mod agent;
pub mod approval;
pub mod capability;
pub mod error;
pub mod execution;
pub mod policy;
