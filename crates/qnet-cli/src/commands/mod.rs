//! CLI command implementations.

pub mod common;
pub mod compare;
pub mod partition;
pub mod protocols;
pub mod run;
pub mod version;
