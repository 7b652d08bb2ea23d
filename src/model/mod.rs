//! Data types, and the stores that hold them.
//!
//! - [`api`] types are what clients send and receive.
//! - [`db`] types are what the stores persist.
//! - [`common`] types are shared by both.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
pub mod store;
