use camino::Utf8PathBuf;
use core::fmt::{self, Display, Formatter};

/// What one sync run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub current_projects: usize,
    pub upcoming_projects: usize,

    /// Projects whose stars and tags could not be fetched
    pub unenriched_projects: usize,

    pub repositories: usize,
    pub archived_repositories: usize,

    /// Repositories whose contributors could not be collected
    pub failed_repositories: usize,

    pub contributors: usize,
    pub declared_packages: usize,
    pub package_stats: usize,
    pub written: Vec<Utf8PathBuf>,
}

impl SyncSummary {
    /// Units left out of the snapshot because an upstream failed.
    #[must_use]
    pub const fn degraded_units(&self) -> usize {
        self.unenriched_projects + self.failed_repositories
    }
}

impl Display for SyncSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} current and {} upcoming project(s), {} contributor(s) from {} repositories ({} archived, {} failed), \
             {} of {} package(s) with statistics, {} file(s) written",
            self.current_projects,
            self.upcoming_projects,
            self.contributors,
            self.repositories,
            self.archived_repositories,
            self.failed_repositories,
            self.package_stats,
            self.declared_packages,
            self.written.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let summary = SyncSummary {
            current_projects: 3,
            upcoming_projects: 1,
            repositories: 10,
            archived_repositories: 2,
            failed_repositories: 1,
            contributors: 42,
            declared_packages: 5,
            package_stats: 4,
            written: vec![Utf8PathBuf::from("assets/stats.json")],
            ..SyncSummary::default()
        };

        assert_eq!(
            summary.to_string(),
            "3 current and 1 upcoming project(s), 42 contributor(s) from 10 repositories (2 archived, 1 failed), \
             4 of 5 package(s) with statistics, 1 file(s) written"
        );
        assert_eq!(summary.degraded_units(), 1);
    }
}
