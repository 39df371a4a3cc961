use serde::Deserialize;

/// Issue from `rest/api/2/issue/{key}?fields=summary`.
#[derive(Debug, Deserialize, Clone)]
pub struct JiraIssue {
    pub key: String,
    #[serde(default)]
    pub fields: JiraIssueFields,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct JiraIssueFields {
    #[serde(default)]
    pub summary: Option<String>,
}
