//! Project persistence: remote database first, local file as fallback.
//!
//! A record that could not reach the remote store lives only in the local
//! store. Ids created offline carry [`LOCAL_ID_PREFIX`], and every later
//! operation on such an id stays local. Local-only records are never pushed
//! back to the remote store.

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::models::{ContentJson, Project, ProjectPayload, ProjectRow, ProjectStatus};
use crate::utils::new_local_id;

/// Reserved key of the local project list.
pub const LOCAL_STORAGE_KEY: &str = "pro_ebook_kilat_local_projects";
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Remote `projects` table.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn insert(&self, payload: &ProjectPayload) -> Result<ProjectRow, StorageError>;
    async fn update(&self, id: &str, payload: &ProjectPayload) -> Result<ProjectRow, StorageError>;
    /// Rows of one user, newest first.
    async fn list(&self, user_id: &str) -> Result<Vec<ProjectRow>, StorageError>;
    async fn delete(&self, id: &str, user_id: &str) -> Result<(), StorageError>;
}

/// Supabase (PostgREST) implementation of [`RemoteStore`].
pub struct SupabaseStore {
    client: reqwest::Client,
    table_url: Option<String>,
    api_key: String,
}

impl SupabaseStore {
    pub fn new(config: &StorageConfig) -> Self {
        let table_url = match (&config.supabase_url, &config.supabase_key) {
            (Some(url), Some(_)) => Some(format!("{url}/rest/v1/projects")),
            _ => None,
        };

        SupabaseStore {
            client: reqwest::Client::new(),
            table_url,
            api_key: config.supabase_key.clone().unwrap_or_default(),
        }
    }

    fn request(
        &self,
        method: reqwest::Method,
        query: &[(&str, String)],
    ) -> Result<reqwest::RequestBuilder, StorageError> {
        let table_url = self.table_url.as_ref().ok_or(StorageError::NotConfigured)?;

        Ok(self
            .client
            .request(method, table_url)
            .query(query)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Prefer", "return=representation"))
    }

    async fn rows(response: reqwest::Response) -> Result<Vec<ProjectRow>, StorageError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            return Err(StorageError::Remote {
                status: status.as_u16(),
                message,
            });
        }
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn single(rows: Vec<ProjectRow>) -> Result<ProjectRow, StorageError> {
        rows.into_iter().next().ok_or(StorageError::EmptyResponse)
    }
}

#[async_trait]
impl RemoteStore for SupabaseStore {
    async fn insert(&self, payload: &ProjectPayload) -> Result<ProjectRow, StorageError> {
        let response = self
            .request(reqwest::Method::POST, &[])?
            .json(payload)
            .send()
            .await?;
        Self::single(Self::rows(response).await?)
    }

    async fn update(&self, id: &str, payload: &ProjectPayload) -> Result<ProjectRow, StorageError> {
        let response = self
            .request(reqwest::Method::PATCH, &[("id", format!("eq.{id}"))])?
            .json(payload)
            .send()
            .await?;
        Self::single(Self::rows(response).await?)
    }

    async fn list(&self, user_id: &str) -> Result<Vec<ProjectRow>, StorageError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &[
                    ("select", "*".to_string()),
                    ("user_id", format!("eq.{user_id}")),
                    ("order", "updated_at.desc".to_string()),
                ],
            )?
            .send()
            .await?;
        Self::rows(response).await
    }

    async fn delete(&self, id: &str, user_id: &str) -> Result<(), StorageError> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                &[("id", format!("eq.{id}")), ("user_id", format!("eq.{user_id}"))],
            )?
            .send()
            .await?;
        Self::rows(response).await.map(|_| ())
    }
}

/// On-device store: one JSON file per reserved key under the data directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        LocalStore { dir: dir.into() }
    }

    fn path(&self) -> PathBuf {
        self.dir.join(format!("{LOCAL_STORAGE_KEY}.json"))
    }

    /// Every local row. A missing or unreadable file reads as empty.
    pub async fn load(&self) -> Vec<ProjectRow> {
        let raw = match tokio::fs::read_to_string(self.path()).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Local storage access failed");
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Local storage holds invalid JSON, ignoring it");
            Vec::new()
        })
    }

    async fn persist(&self, rows: &[ProjectRow]) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_string_pretty(rows)?;
        tokio::fs::write(self.path(), json).await?;
        Ok(())
    }

    /// Replace the row with the same id, or put the new row first.
    pub async fn upsert(&self, row: ProjectRow) -> Result<(), StorageError> {
        let mut rows = self.load().await;
        match rows.iter_mut().find(|r| r.id == row.id) {
            Some(existing) => *existing = row,
            None => rows.insert(0, row),
        }
        self.persist(&rows).await
    }

    pub async fn remove(&self, id: &str) -> Result<(), StorageError> {
        let mut rows = self.load().await;
        let before = rows.len();
        rows.retain(|r| r.id != id);
        if rows.len() != before {
            self.persist(&rows).await?;
        }
        Ok(())
    }
}

pub fn is_local_id(id: &str) -> bool {
    id.starts_with(LOCAL_ID_PREFIX)
}

/// Dual-write project store.
pub struct ProjectStore<R> {
    remote: R,
    local: LocalStore,
}

impl ProjectStore<SupabaseStore> {
    /// Supabase when `SUPABASE_URL`/`SUPABASE_ANON_KEY` are set, local files
    /// under the data directory either way.
    pub fn from_config(config: &StorageConfig) -> Self {
        if config.supabase_url.is_none() || config.supabase_key.is_none() {
            tracing::info!(data_dir = %config.data_dir.display(), "Remote store not configured, projects stay local");
        }
        Self::new(SupabaseStore::new(config), LocalStore::new(config.data_dir.clone()))
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self::from_config(&StorageConfig::from_env()?))
    }
}

impl<R: RemoteStore> ProjectStore<R> {
    pub fn new(remote: R, local: LocalStore) -> Self {
        ProjectStore { remote, local }
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    pub async fn create_empty(&self, user_id: &str) -> Result<Project, StorageError> {
        let now = Utc::now();
        let payload = ProjectPayload {
            user_id: user_id.to_string(),
            title: "New Project".to_string(),
            description: "Draft".to_string(),
            content_json: ContentJson::default(),
            status: ProjectStatus::Draft,
            created_at: Some(now),
            updated_at: now,
        };

        match self.remote.insert(&payload).await {
            Ok(row) => {
                tracing::info!(project_id = %row.id, user_id, "Project created");
                Ok(row.into_project())
            }
            Err(e) => {
                tracing::warn!(error = %e, user_id, "Remote create failed, falling back to local storage");
                let row = payload.into_row(new_local_id(LOCAL_ID_PREFIX), true);
                self.local.upsert(row.clone()).await?;
                Ok(row.into_project())
            }
        }
    }

    pub async fn save(&self, user_id: &str, project: &Project) -> Result<Project, StorageError> {
        let now = Utc::now();
        let mut payload = ProjectPayload::from_project(user_id, project, now);

        if let Some(id) = project.id.as_deref().filter(|id| is_local_id(id)) {
            payload.created_at = Some(now);
            let row = payload.into_row(id.to_string(), true);
            self.local.upsert(row.clone()).await?;
            tracing::debug!(project_id = id, "Saved local-only project");
            return Ok(row.into_project());
        }

        let remote = match project.id.as_deref() {
            Some(id) => self.remote.update(id, &payload).await,
            None => {
                payload.created_at = Some(now);
                self.remote.insert(&payload).await
            }
        };

        match remote {
            Ok(row) => {
                // An earlier offline backup of this row is now stale.
                if let Err(e) = self.local.remove(&row.id).await {
                    tracing::warn!(error = %e, project_id = %row.id, "Could not drop local backup");
                }
                Ok(row.into_project())
            }
            Err(e) => {
                tracing::warn!(error = %e, user_id, "Remote save failed, saving to local storage as backup");
                // A remote row keeps its id so the backup shadows it in listings.
                let id = project
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("{LOCAL_ID_PREFIX}{}", now.timestamp_millis()));
                payload.created_at = Some(now);
                let row = payload.into_row(id, true);
                self.local.upsert(row.clone()).await?;
                Ok(row.into_project())
            }
        }
    }

    /// Local and remote projects of the user, newest first, one per id.
    pub async fn list(&self, user_id: &str) -> Result<Vec<Project>, StorageError> {
        let remote = self.remote.list(user_id).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, user_id, "Could not fetch remote projects, using local data");
            Vec::new()
        });

        let mut rows: Vec<ProjectRow> = self
            .local
            .load()
            .await
            .into_iter()
            .filter(|r| r.user_id == user_id)
            .chain(remote)
            .collect();

        // Stable sort: the newest copy of an id comes first, local on ties.
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let mut seen = HashSet::new();
        Ok(rows
            .into_iter()
            .filter(|r| seen.insert(r.id.clone()))
            .map(ProjectRow::into_project)
            .collect())
    }

    pub async fn delete(&self, user_id: &str, id: &str) -> Result<(), StorageError> {
        if is_local_id(id) {
            return self.local.remove(id).await;
        }

        if let Err(e) = self.remote.delete(id, user_id).await {
            tracing::warn!(error = %e, project_id = id, "Remote delete failed, removing local copy");
        }
        // A backup copy saved while offline would otherwise resurface in listings.
        self.local.remove(id).await
    }
}
