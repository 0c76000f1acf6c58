use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The registry a package is published to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Ecosystem {
    Npm,
    Pypi,
}

/// A package tracked for download statistics, as declared in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSpec {
    /// Registry name, e.g. `@acme/widgets` or `acme-widgets`.
    pub name: String,

    /// Display title; defaults to the name.
    #[serde(default)]
    pub title: Option<String>,

    #[serde(rename = "type")]
    pub ecosystem: Ecosystem,
}

/// The packages published by one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectPackages {
    pub project: String,
    #[serde(default)]
    pub packages: Vec<PackageSpec>,
}

/// One entry of `packages.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredPackage {
    pub name: String,
    pub title: String,
    #[serde(rename = "type")]
    pub ecosystem: Ecosystem,
    pub project: String,
}

/// Flatten per-project declarations, keeping declaration order.
#[must_use]
pub fn flatten_packages(projects: &[ProjectPackages]) -> Vec<DeclaredPackage> {
    projects
        .iter()
        .flat_map(|project| {
            project.packages.iter().map(|package| DeclaredPackage {
                name: package.name.clone(),
                title: package.title.clone().unwrap_or_else(|| package.name.clone()),
                ecosystem: package.ecosystem,
                project: project.project.clone(),
            })
        })
        .collect()
}
