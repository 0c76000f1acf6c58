use clap::ValueEnum;
use strum::{Display, EnumIter};

/// The JSON snapshot files consumed by the website.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Display, EnumIter)]
#[value(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Artifact {
    /// Current projects, with stars and tags
    Projects,

    /// Upcoming projects
    UpcomingProjects,

    /// Contributors across the organization
    Contributors,

    /// Packages declared per project
    Packages,

    /// Download statistics per package
    Stats,
}

impl Artifact {
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Projects => "projects.json",
            Self::UpcomingProjects => "upcomingProjects.json",
            Self::Contributors => "contributors.json",
            Self::Packages => "packages.json",
            Self::Stats => "stats.json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_file_names_are_distinct() {
        let mut names: Vec<_> = Artifact::iter().map(Artifact::file_name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 5);
    }

    #[test]
    fn test_cli_names() {
        assert_eq!(Artifact::UpcomingProjects.to_string(), "upcoming-projects");
        assert_eq!(
            Artifact::from_str("upcoming-projects", false).unwrap(),
            Artifact::UpcomingProjects
        );
    }
}
