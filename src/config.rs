//! Persisted application configuration and the provider settings derived from it.

use std::collections::HashSet;
use std::time::Duration;

use merge_providers::config::DEFAULT_GITHUB_API_BASE;
use merge_providers::{ProviderOptions, ServerCatalog, ServerKind};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static URL_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s|]+$").expect("invalid url identifier regex"));
static DISTRIBUTED_IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://[^\s|]+\|[^|]+\|[^|]+$").expect("invalid distributed identifier regex")
});
static HOSTED_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^/\s]+/[^/\s]+/?$").expect("invalid hosted identifier regex"));

fn default_check_in_message() -> String {
    "Merge %o (%v) to %b, work item %t".to_string()
}

fn default_github_api_url() -> String {
    DEFAULT_GITHUB_API_BASE.to_string()
}

fn default_auto_save_interval_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_request_cooldown_ms() -> u64 {
    100
}

/// The single configuration record of the store.
///
/// Identifier lists are per provider kind. Secrets are not part of this record; they live in
/// the keyring.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct RootConfiguration {
    pub on_prem_work_item_servers: Vec<String>,
    pub cloud_work_item_servers: Vec<String>,
    pub git_hub_work_item_repositories: Vec<String>,
    pub jira_servers: Vec<String>,
    pub on_prem_source_control_servers: Vec<String>,
    pub on_prem_git_repositories: Vec<String>,
    pub git_hub_source_control_repositories: Vec<String>,
    pub on_prem_tfs_username: String,
    pub jira_username: String,
    #[serde(rename = "GitHubApiUrl")]
    pub git_hub_api_url: String,
    pub check_in_message: String,
    pub filter: String,
    pub not_completed_filter: bool,
    pub show_project_settings: bool,
    pub auto_save_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub request_cooldown_ms: u64,
}

impl Default for RootConfiguration {
    fn default() -> Self {
        Self {
            on_prem_work_item_servers: Vec::new(),
            cloud_work_item_servers: Vec::new(),
            git_hub_work_item_repositories: Vec::new(),
            jira_servers: Vec::new(),
            on_prem_source_control_servers: Vec::new(),
            on_prem_git_repositories: Vec::new(),
            git_hub_source_control_repositories: Vec::new(),
            on_prem_tfs_username: String::new(),
            jira_username: String::new(),
            git_hub_api_url: default_github_api_url(),
            check_in_message: default_check_in_message(),
            filter: String::new(),
            not_completed_filter: false,
            show_project_settings: false,
            auto_save_interval_secs: default_auto_save_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            request_cooldown_ms: default_request_cooldown_ms(),
        }
    }
}

impl RootConfiguration {
    /// Trims identifiers, drops blanks and duplicates, and restores defaults for blank settings.
    pub fn normalize(mut self) -> Self {
        for list in self.server_lists_mut() {
            let mut seen = HashSet::new();
            let cleaned: Vec<String> = list
                .iter()
                .map(|identifier| identifier.trim().to_string())
                .filter(|identifier| !identifier.is_empty() && seen.insert(identifier.clone()))
                .collect();
            *list = cleaned;
        }
        self.on_prem_tfs_username = self.on_prem_tfs_username.trim().to_string();
        self.jira_username = self.jira_username.trim().to_string();
        if self.git_hub_api_url.trim().is_empty() {
            self.git_hub_api_url = default_github_api_url();
        }
        if self.check_in_message.is_empty() {
            self.check_in_message = default_check_in_message();
        }
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = default_request_timeout_secs();
        }
        self
    }

    fn server_lists_mut(&mut self) -> [&mut Vec<String>; 7] {
        [
            &mut self.on_prem_work_item_servers,
            &mut self.cloud_work_item_servers,
            &mut self.git_hub_work_item_repositories,
            &mut self.jira_servers,
            &mut self.on_prem_source_control_servers,
            &mut self.on_prem_git_repositories,
            &mut self.git_hub_source_control_repositories,
        ]
    }

    fn server_lists(&self) -> [(ServerKind, &Vec<String>); 7] {
        [
            (ServerKind::OnPremIssueTracker, &self.on_prem_work_item_servers),
            (ServerKind::CloudIssueTracker, &self.cloud_work_item_servers),
            (ServerKind::GitHostIssueTracker, &self.git_hub_work_item_repositories),
            (ServerKind::ExternalTicketTracker, &self.jira_servers),
            (ServerKind::OnPremVcs, &self.on_prem_source_control_servers),
            (ServerKind::OnPremDistributedVcs, &self.on_prem_git_repositories),
            (ServerKind::GitHostVcs, &self.git_hub_source_control_repositories),
        ]
    }

    /// Tags every configured identifier with its provider kind.
    pub fn catalog(&self) -> ServerCatalog {
        self.server_lists()
            .into_iter()
            .fold(ServerCatalog::builder(), |builder, (kind, identifiers)| {
                builder.servers(kind, identifiers.iter().cloned())
            })
            .build()
    }

    pub fn provider_options(&self) -> ProviderOptions {
        ProviderOptions::default()
            .with_github_api_base(self.git_hub_api_url.trim().to_string())
            .with_timeout(Duration::from_secs(self.request_timeout_secs.max(1)))
            .with_cooldown(Duration::from_millis(self.request_cooldown_ms))
    }

    /// `None` disables periodic saving.
    pub fn auto_save_interval(&self) -> Option<Duration> {
        (self.auto_save_interval_secs > 0).then(|| Duration::from_secs(self.auto_save_interval_secs))
    }

    pub fn clear_filters(&mut self) {
        self.filter.clear();
        self.not_completed_filter = false;
    }

    /// Identifiers whose shape does not fit their kind. Lookups against them will fail.
    pub fn identifier_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for (kind, identifiers) in self.server_lists() {
            let pattern: &Regex = match kind {
                ServerKind::OnPremDistributedVcs => &DISTRIBUTED_IDENTIFIER,
                ServerKind::GitHostIssueTracker | ServerKind::GitHostVcs => &HOSTED_IDENTIFIER,
                _ => &URL_IDENTIFIER,
            };
            for identifier in identifiers {
                if !pattern.is_match(identifier.trim()) {
                    warnings.push(format!("'{}' does not look like a {} identifier", identifier, kind));
                }
            }
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merge_providers::ServerFamily;

    #[test]
    fn default_configuration_has_expected_values() {
        let config = RootConfiguration::default();
        assert_eq!(config.git_hub_api_url, "https://api.github.com");
        assert_eq!(config.auto_save_interval(), Some(Duration::from_secs(60)));
        assert!(config.check_in_message.contains("%o"));
        assert!(config.catalog().is_empty());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: RootConfiguration =
            serde_json::from_str(r#"{"OnPremTfsUsername": "dev", "Filter": "abc"}"#).unwrap();
        assert_eq!(config.on_prem_tfs_username, "dev");
        assert_eq!(config.filter, "abc");
        assert_eq!(config.auto_save_interval_secs, 60);
        assert_eq!(config.git_hub_api_url, "https://api.github.com");
    }

    #[test]
    fn normalize_trims_and_dedupes_identifiers() {
        let config = RootConfiguration {
            on_prem_work_item_servers: vec![
                " https://tfs/Coll ".into(),
                "https://tfs/Coll".into(),
                "".into(),
            ],
            git_hub_api_url: "  ".into(),
            request_timeout_secs: 0,
            ..RootConfiguration::default()
        }
        .normalize();

        assert_eq!(config.on_prem_work_item_servers, vec!["https://tfs/Coll"]);
        assert_eq!(config.git_hub_api_url, "https://api.github.com");
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn catalog_follows_priority_order() {
        let config = RootConfiguration {
            jira_servers: vec!["https://shared".into()],
            cloud_work_item_servers: vec!["https://shared".into()],
            on_prem_git_repositories: vec!["https://tfs|Proj|Repo".into()],
            ..RootConfiguration::default()
        };
        let catalog = config.catalog();
        assert_eq!(
            catalog.resolve(ServerFamily::WorkItems, "https://shared").unwrap(),
            ServerKind::CloudIssueTracker
        );
        assert_eq!(
            catalog.default_server(ServerFamily::SourceControl),
            Some("https://tfs|Proj|Repo")
        );
    }

    #[test]
    fn clear_filters_resets_text_and_flag() {
        let mut config = RootConfiguration {
            filter: "4821".into(),
            not_completed_filter: true,
            ..RootConfiguration::default()
        };
        config.clear_filters();
        assert!(config.filter.is_empty());
        assert!(!config.not_completed_filter);
    }

    #[test]
    fn zero_interval_disables_auto_save() {
        let config = RootConfiguration {
            auto_save_interval_secs: 0,
            ..RootConfiguration::default()
        };
        assert_eq!(config.auto_save_interval(), None);
    }

    #[test]
    fn identifier_warnings_flag_malformed_shapes() {
        let config = RootConfiguration {
            on_prem_work_item_servers: vec!["https://tfs/Coll".into()],
            on_prem_git_repositories: vec!["https://tfs|Proj".into()],
            git_hub_source_control_repositories: vec!["widgets".into()],
            ..RootConfiguration::default()
        };
        let warnings = config.identifier_warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("https://tfs|Proj"));
        assert!(warnings[1].contains("widgets"));
    }
}
