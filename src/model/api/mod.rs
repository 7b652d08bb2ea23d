//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Field names are camelCase.

pub mod ballot;
pub mod candidate;
pub mod election;
pub mod id;
pub mod pagination;
pub mod voter;
