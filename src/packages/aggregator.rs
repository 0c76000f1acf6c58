use super::npm::NpmProvider;
use super::pypi::PypiProvider;
use super::totals::TotalDownloadsSource;
use super::{DeclaredPackage, Ecosystem, PackageStats, sort_by_total};
use futures::future::join_all;
use std::collections::BTreeMap;

/// Log target for the package statistics aggregator
const LOG_TARGET: &str = "packages";

/// Produces one statistics record per declared package that has recent downloads.
#[derive(Debug)]
pub struct PackageStatsAggregator<S> {
    npm: NpmProvider,
    pypi: PypiProvider<S>,
}

impl<S: TotalDownloadsSource> PackageStatsAggregator<S> {
    #[must_use]
    pub const fn new(npm: NpmProvider, pypi: PypiProvider<S>) -> Self {
        Self { npm, pypi }
    }

    /// Collect statistics keyed by package name.
    ///
    /// The npm and PyPI families run concurrently, each throttled by its own queue. A package that
    /// fails is logged and left out; it never fails the batch.
    pub async fn collect(&self, packages: &[DeclaredPackage]) -> BTreeMap<String, PackageStats> {
        let npm = packages.iter().filter(|p| p.ecosystem == Ecosystem::Npm);
        let pypi = packages.iter().filter(|p| p.ecosystem == Ecosystem::Pypi);

        let (npm_results, pypi_results) = tokio::join!(
            join_all(npm.map(|package| async move { (package, self.npm.package_stats(&package.name).await) })),
            join_all(pypi.map(|package| async move { (package, self.pypi.package_stats(&package.name).await) })),
        );

        let mut stats = BTreeMap::new();
        for (package, result) in npm_results.into_iter().chain(pypi_results) {
            match result {
                Ok(Some(mut record)) => {
                    record.title.clone_from(&package.title);
                    _ = stats.insert(package.name.clone(), record);
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Leaving out {} package '{}': {e}", package.ecosystem, package.name);
                }
            }
        }

        log::info!(
            target: LOG_TARGET,
            "Collected statistics for {} of {} declared package(s)",
            stats.len(),
            packages.len()
        );
        stats
    }
}

/// Flatten collected statistics into the order used by `stats.json`.
#[must_use]
pub fn ranked(stats: BTreeMap<String, PackageStats>) -> Vec<PackageStats> {
    let mut records: Vec<_> = stats.into_values().collect();
    sort_by_total(&mut records);
    records
}
