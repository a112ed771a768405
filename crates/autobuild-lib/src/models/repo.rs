// Repository target and credentials

use serde::{Deserialize, Serialize};

/// A GitHub repository plus the token used to act on it
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RepoCredentials {
    pub owner: String,
    pub repo: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub token: String,
}

impl RepoCredentials {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            token: token.into(),
        }
    }

    /// `owner/repo`
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Settings page where the workflow's secrets are configured
    pub fn secrets_url(&self) -> String {
        format!(
            "https://github.com/{}/{}/settings/secrets/actions",
            self.owner, self.repo
        )
    }
}

// Keep the token out of logs
impl std::fmt::Debug for RepoCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoCredentials")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &if self.token.is_empty() { "" } else { "***" })
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_and_secrets_url() {
        let creds = RepoCredentials::new("tomas95-lab", "autobuild_test", "ghp_x");
        assert_eq!(creds.slug(), "tomas95-lab/autobuild_test");
        assert_eq!(
            creds.secrets_url(),
            "https://github.com/tomas95-lab/autobuild_test/settings/secrets/actions"
        );
    }

    #[test]
    fn test_debug_hides_token() {
        let creds = RepoCredentials::new("o", "r", "ghp_secret");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("***"));
    }
}
