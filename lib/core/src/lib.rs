//! Core types for CyberTest Lab.
//!
//! This crate provides the identifier types shared by the access-control
//! library and the web server.

pub mod id;

pub use id::{IdentityId, ParseIdError};
