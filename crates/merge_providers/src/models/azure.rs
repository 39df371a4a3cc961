use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use super::links::Links;

pub const TITLE_FIELD: &str = "System.Title";

/// Work item as returned by `_apis/wit/workitems/{id}?$expand=links`.
#[derive(Debug, Deserialize, Clone)]
pub struct AzureWorkItem {
    pub id: u32,
    #[serde(default)]
    pub fields: HashMap<String, Value>,
    #[serde(rename = "_links", default)]
    pub links: Links,
}

impl AzureWorkItem {
    pub fn title(&self) -> Option<&str> {
        self.fields.get(TITLE_FIELD).and_then(Value::as_str)
    }

    pub fn html_url(&self) -> Option<&str> {
        self.links.html_href()
    }
}

/// TFVC changeset from `_apis/tfvc/changesets/{id}`.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AzureChangeset {
    pub changeset_id: u32,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(rename = "_links", default)]
    pub links: Links,
}

impl AzureChangeset {
    pub fn web_url(&self) -> Option<&str> {
        self.links.web_href()
    }
}

/// Git commit from `{project}/_apis/git/repositories/{repo}/commits/{id}`.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AzureGitCommit {
    pub commit_id: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(rename = "_links", default)]
    pub links: Links,
}

impl AzureGitCommit {
    pub fn web_url(&self) -> Option<&str> {
        self.links
            .web_href()
            .or_else(|| self.remote_url.as_deref().filter(|url| !url.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_item_reads_title_and_html_link() {
        let payload = r#"{
            "id": 42,
            "rev": 3,
            "fields": {"System.Title": "Crash on save", "System.State": "Active"},
            "_links": {"html": {"href": "https://tfs/Coll/_workitems/edit/42"}, "self": {"href": "x"}}
        }"#;
        let item: AzureWorkItem = serde_json::from_str(payload).unwrap();
        assert_eq!(item.title(), Some("Crash on save"));
        assert_eq!(item.html_url(), Some("https://tfs/Coll/_workitems/edit/42"));
    }

    #[test]
    fn work_item_without_links_has_no_url() {
        let item: AzureWorkItem = serde_json::from_str(r#"{"id": 1, "fields": {}}"#).unwrap();
        assert_eq!(item.html_url(), None);
        assert_eq!(item.title(), None);
    }

    #[test]
    fn commit_falls_back_to_remote_url() {
        let payload = r#"{"commitId": "ab34", "remoteUrl": "https://tfs/Coll/Proj/_git/Repo/commit/ab34"}"#;
        let commit: AzureGitCommit = serde_json::from_str(payload).unwrap();
        assert_eq!(commit.web_url(), Some("https://tfs/Coll/Proj/_git/Repo/commit/ab34"));
    }
}
