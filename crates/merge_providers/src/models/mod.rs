mod azure;
mod github;
mod jira;
mod links;

pub use azure::{AzureChangeset, AzureGitCommit, AzureWorkItem};
pub use github::{GitHubCommit, GitHubPullRequest};
pub use jira::{JiraIssue, JiraIssueFields};
pub use links::{Link, Links};
