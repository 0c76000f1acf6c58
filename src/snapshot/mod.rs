//! The JSON files the website is generated from.

mod artifact;
mod writer;

pub use artifact::Artifact;
pub use writer::SnapshotWriter;
