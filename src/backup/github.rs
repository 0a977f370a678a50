//! GitHub contents-API implementation of the backup sink/source.
//!
//! Pull reads the raw file from the default branch; push updates it through
//! the contents API, resolving the current blob sha first so the update is
//! accepted.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::StatusCode;
use serenity::async_trait;

use super::BackupStore;

const USER_AGENT: &str = concat!("verdant/", env!("CARGO_PKG_VERSION"));

pub(crate) struct GithubBackup {
    client: reqwest::Client,
    /// `owner/repo`.
    repo: String,
    token: String,
    /// Path of the snapshot file inside the repository.
    file_name: String,
}

impl GithubBackup {
    pub(crate) fn new(repo: String, token: String, file_name: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            repo,
            token,
            file_name,
        }
    }

    async fn current_sha(&self) -> crate::Result<Option<String>> {
        let url = format!(
            "https://api.github.com/repos/{}/contents/{}",
            self.repo, self.file_name
        );
        let resp = self
            .client
            .get(&url)
            .header("Authorization", format!("token {}", self.token))
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;
        if resp.status() != StatusCode::OK {
            return Ok(None);
        }
        let body: serde_json::Value = resp.json().await?;
        Ok(body
            .get("sha")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned))
    }
}

#[async_trait]
impl BackupStore for GithubBackup {
    async fn pull(&self) -> crate::Result<Option<Vec<u8>>> {
        let url = format!(
            "https://raw.githubusercontent.com/{}/main/{}",
            self.repo, self.file_name
        );
        let resp = self
            .client
            .get(&url)
            .header("Authorization", format!("token {}", self.token))
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;
        if resp.status() != StatusCode::OK {
            return Ok(None);
        }
        Ok(Some(resp.bytes().await?.to_vec()))
    }

    async fn push(&self, bytes: &[u8]) -> crate::Result<()> {
        let sha = self.current_sha().await?;
        let mut payload = serde_json::json!({
            "message": format!("Update {}", self.file_name),
            "content": BASE64.encode(bytes),
        });
        if let Some(sha) = sha {
            payload["sha"] = serde_json::Value::String(sha);
        }

        let url = format!(
            "https://api.github.com/repos/{}/contents/{}",
            self.repo, self.file_name
        );
        let resp = self
            .client
            .put(&url)
            .header("Authorization", format!("token {}", self.token))
            .header("User-Agent", USER_AGENT)
            .json(&payload)
            .send()
            .await?;
        match resp.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(crate::Error::Backup(format!(
                    "contents API returned {status}: {body}"
                )))
            }
        }
    }
}
