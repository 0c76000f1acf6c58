//! Project listings from the headless CMS.

mod client;
mod project;

pub use client::CmsClient;
pub use project::{Project, ProjectId, ProjectType};
