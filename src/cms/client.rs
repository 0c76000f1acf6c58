use super::{Project, ProjectType};
use crate::fetch::{HttpClient, Request};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::json;
use url::Url;

/// Log target for the CMS client
const LOG_TARGET: &str = "cms";

/// Label under which CMS requests are tracked
const SOURCE: &str = "CMS";

const PROJECTS_QUERY: &str = "query Projects($type: String!, $status: String!) {
  projects(filter: { project_type: { _eq: $type }, status: { _eq: $status } }) {
    id
    title
    short_description
    github_repository_link
    documentation_link
    project_type
    date_created
    date_updated
    status
  }
}";

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ProjectsData {
    projects: Vec<Project>,
}

/// Reads project listings from the headless CMS GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct CmsClient {
    http: HttpClient,
    endpoint: Url,
    token: Option<String>,
}

impl CmsClient {
    #[must_use]
    pub fn new(http: HttpClient, endpoint: Url, token: Option<String>) -> Self {
        Self {
            http,
            endpoint,
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    /// Projects of the given type whose status equals `status`.
    pub async fn projects(&self, project_type: ProjectType, status: &str) -> Result<Vec<Project>> {
        let body = json!({
            "query": PROJECTS_QUERY,
            "variables": { "type": project_type.to_string(), "status": status },
        });

        let mut request = Request::post_json(SOURCE, self.endpoint.as_str(), body).accept("application/json");
        if let Some(token) = &self.token {
            request = request.bearer(token);
        }

        let response = self
            .http
            .fetch(&request)
            .await
            .with_context(|| format!("querying {project_type} projects"))?;
        let envelope: GraphQlResponse<ProjectsData> = response.json()?;

        if !envelope.errors.is_empty() {
            let messages: Vec<_> = envelope.errors.into_iter().map(|e| e.message).collect();
            bail!("the CMS rejected the {project_type} projects query: {}", messages.join("; "));
        }

        let projects = envelope
            .data
            .with_context(|| format!("the CMS returned no data for {project_type} projects"))?
            .projects;

        log::info!(target: LOG_TARGET, "Fetched {} {project_type} project(s)", projects.len());
        Ok(projects)
    }
}
