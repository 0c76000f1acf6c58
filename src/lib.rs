//! org-snapshot crate
//!
//! This crate is an implementation detail of the `org-snapshot` tool. It collects projects,
//! contributors and package download statistics for an organization and persists them as the
//! JSON snapshot files consumed by the organization's static website.
//!
//! The API is fluid and may change without warning and in a semver-incompatible way.

#[doc(hidden)]
pub mod cms;

#[doc(hidden)]
pub mod commands;

#[doc(hidden)]
pub mod config;

#[doc(hidden)]
pub mod fetch;

#[doc(hidden)]
pub mod github;

#[doc(hidden)]
pub mod packages;

#[doc(hidden)]
pub mod progress;

#[doc(hidden)]
pub mod snapshot;

#[doc(hidden)]
pub mod sync;

pub use crate::commands::{Host, run};
