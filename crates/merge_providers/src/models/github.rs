use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct GitHubPullRequest {
    pub number: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitHubCommit {
    pub sha: String,
    #[serde(default)]
    pub html_url: Option<String>,
}
