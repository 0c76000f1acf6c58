use core::fmt::{Display, Formatter, Result as FmtResult};
use url::Url;

/// An `owner/name` GitHub repository identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    owner: String,
    name: String,
}

impl RepoRef {
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Extract the repository from a `https://github.com/owner/name[.git][/...]` link.
    #[must_use]
    pub fn from_github_url(link: &str) -> Option<Self> {
        let url = Url::parse(link.trim()).ok()?;
        let host = url.host_str()?.trim_start_matches("www.");
        if !host.eq_ignore_ascii_case("github.com") {
            return None;
        }

        let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
        let owner = segments.next()?;
        let name = segments.next()?;
        let name = name.strip_suffix(".git").unwrap_or(name);
        if name.is_empty() {
            return None;
        }

        Some(Self::new(owner, name))
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        self.to_string()
    }
}

impl Display for RepoRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
