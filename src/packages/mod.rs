//! Download statistics for the organization's npm and PyPI packages.

mod aggregator;
mod npm;
mod package_spec;
mod package_stats;
mod pypi;
mod totals;

pub use aggregator::{PackageStatsAggregator, ranked};
pub use npm::{DownloadWindow, NpmProvider};
pub use package_spec::{DeclaredPackage, Ecosystem, PackageSpec, ProjectPackages, flatten_packages};
pub use package_stats::{PackageStats, TotalSource, sort_by_total};
pub use pypi::{PypiProvider, RecentDownloads};
pub use totals::{PepyScraper, TotalDownloads, TotalDownloadsSource, parse_compact_number, scrape_total};
