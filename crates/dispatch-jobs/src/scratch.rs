//! Per-session, per-job scratch directories and their cleanup.

use crate::error::{JobError, Result};
use dispatch_types::StateStore;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

pub const SCRATCH_PREFIX: &str = "scratch_";
pub const DOWNLOAD_PREFIX: &str = "download_";
pub const ALIASED_SUFFIX: &str = "_aliased";
/// Original request parameters, written when the directory is created.
pub const PARAMETERS_FILE: &str = "analysis_parameters.json";

/// Name of one scratch directory: `scratch_sid_<session>_jid_<job>[_aliased]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScratchDir {
    session_id: String,
    job_id: String,
    aliased: bool,
}

fn check_identifier(id: &str) -> Result<()> {
    if id.is_empty() || id.contains(|c: char| c == '/' || c == '\\') || id == "." || id == ".." {
        return Err(JobError::InvalidIdentifier(id.to_string()));
    }
    Ok(())
}

impl ScratchDir {
    pub fn new(session_id: &str, job_id: &str, aliased: bool) -> Result<Self> {
        check_identifier(session_id)?;
        check_identifier(job_id)?;
        Ok(Self {
            session_id: session_id.to_string(),
            job_id: job_id.to_string(),
            aliased,
        })
    }

    /// Inverse of [`ScratchDir::name`]; `None` for foreign directory names.
    pub fn parse(name: &str) -> Option<Self> {
        let rest = name.strip_prefix("scratch_sid_")?;
        let (rest, aliased) = match rest.strip_suffix(ALIASED_SUFFIX) {
            Some(r) => (r, true),
            None => (rest, false),
        };
        let idx = rest.rfind("_jid_")?;
        let (session_id, job_id) = (&rest[..idx], &rest[idx + "_jid_".len()..]);
        Self::new(session_id, job_id, aliased).ok()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn is_aliased(&self) -> bool {
        self.aliased
    }

    pub fn name(&self) -> String {
        format!(
            "scratch_sid_{}_jid_{}{}",
            self.session_id,
            self.job_id,
            if self.aliased { ALIASED_SUFFIX } else { "" }
        )
    }

    /// Store key of a file inside this directory.
    pub fn key(&self, file_name: &str) -> String {
        format!("{}/{}", self.name(), file_name)
    }
}

/// Owns scratch directory lifecycle on top of a [`StateStore`].
#[derive(Clone)]
pub struct ScratchSpaces {
    store: Arc<dyn StateStore>,
}

impl ScratchSpaces {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub async fn exists(&self, dir: &ScratchDir) -> Result<bool> {
        let keys = self.store.list(&format!("{}/", dir.name())).await?;
        Ok(!keys.is_empty())
    }

    /// Create the plain directory for a request and record its parameters.
    pub async fn create(
        &self,
        session_id: &str,
        job_id: &str,
        params: &Map<String, Value>,
    ) -> Result<ScratchDir> {
        let dir = ScratchDir::new(session_id, job_id, false)?;
        self.create_in(&dir, params).await?;
        Ok(dir)
    }

    pub async fn create_in(&self, dir: &ScratchDir, params: &Map<String, Value>) -> Result<()> {
        let body = serde_json::to_vec_pretty(params)?;
        self.store.put(&dir.key(PARAMETERS_FILE), &body).await?;
        tracing::debug!(dir = %dir.name(), "scratch directory created");
        Ok(())
    }

    /// Locate the directory of `(session_id, job_id)`: plain first, then aliased.
    pub async fn resolve(&self, session_id: &str, job_id: &str) -> Result<ScratchDir> {
        for aliased in [false, true] {
            let dir = ScratchDir::new(session_id, job_id, aliased)?;
            if self.exists(&dir).await? {
                return Ok(dir);
            }
        }
        Err(JobError::MissingScratchState {
            session_id: session_id.to_string(),
            job_id: job_id.to_string(),
        })
    }

    /// Every directory of `job_id`, across sessions, sorted by name.
    pub async fn find_by_job(&self, job_id: &str) -> Result<Vec<ScratchDir>> {
        let names = self.job_dirs(job_id).await?;
        Ok(names.iter().filter_map(|n| ScratchDir::parse(n)).collect())
    }

    /// Directory names belonging exactly to `job_id`, plain or aliased.
    async fn job_dirs(&self, job_id: &str) -> Result<Vec<String>> {
        check_identifier(job_id)?;
        let pattern = format!("scratch_*_jid_{}*", glob::Pattern::escape(job_id));
        let names = self.top_dirs(SCRATCH_PREFIX, &pattern).await?;
        Ok(names
            .into_iter()
            .filter(|n| ScratchDir::parse(n).is_some_and(|d| d.job_id() == job_id))
            .collect())
    }

    pub async fn load_parameters(&self, dir: &ScratchDir) -> Result<Option<Map<String, Value>>> {
        let key = dir.key(PARAMETERS_FILE);
        match self.store.get(&key).await? {
            Some(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
                JobError::UnreadableJobState {
                    key,
                    reason: e.to_string(),
                }
            }),
            None => Ok(None),
        }
    }

    /// Remove every scratch directory of one job; returns the number removed.
    pub async fn remove_job(&self, job_id: &str) -> Result<usize> {
        let dirs = self.job_dirs(job_id).await?;
        self.remove_dirs(&dirs).await
    }

    /// Remove every scratch directory.
    pub async fn remove_all(&self) -> Result<usize> {
        self.remove_matching(SCRATCH_PREFIX, "scratch_*").await
    }

    /// Remove `download_<id>`, or every download directory when `id` is `None`.
    pub async fn remove_downloads(&self, id: Option<&str>) -> Result<usize> {
        let pattern = match id {
            Some(id) => {
                check_identifier(id)?;
                format!("{}{}", DOWNLOAD_PREFIX, glob::Pattern::escape(id))
            }
            None => format!("{}*", DOWNLOAD_PREFIX),
        };
        self.remove_matching(DOWNLOAD_PREFIX, &pattern).await
    }

    async fn remove_matching(&self, prefix: &str, pattern: &str) -> Result<usize> {
        let dirs = self.top_dirs(prefix, pattern).await?;
        self.remove_dirs(&dirs).await
    }

    async fn remove_dirs(&self, dirs: &[String]) -> Result<usize> {
        for dir in dirs {
            let removed = self.store.remove_prefix(&format!("{}/", dir)).await?;
            tracing::info!(dir = %dir, files = removed, "scratch directory removed");
        }
        Ok(dirs.len())
    }

    /// Top-level directory names under `prefix` whose name matches `pattern`.
    async fn top_dirs(&self, prefix: &str, pattern: &str) -> Result<Vec<String>> {
        let matcher = glob::Pattern::new(pattern).map_err(|e| JobError::Pattern {
            pattern: pattern.to_string(),
            message: e.msg.to_string(),
        })?;
        let keys = self.store.list(prefix).await?;
        let names: BTreeSet<String> = keys
            .iter()
            .filter_map(|k| k.split_once('/').map(|(dir, _)| dir))
            .filter(|dir| matcher.matches(dir))
            .map(String::from)
            .collect();
        Ok(names.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_store::{FsStateStore, InMemoryStateStore};
    use serde_json::json;

    fn params() -> Map<String, Value> {
        json!({ "instrument": "isgri", "E1_keV": 20, "E2_keV": 40 })
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn directory_names_round_trip() {
        let dir = ScratchDir::new("S1", "ABC", false).unwrap();
        assert_eq!(dir.name(), "scratch_sid_S1_jid_ABC");
        assert_eq!(ScratchDir::parse(&dir.name()), Some(dir.clone()));
        let aliased = ScratchDir::new("S1", "ABC", true).unwrap();
        assert_eq!(aliased.name(), "scratch_sid_S1_jid_ABC_aliased");
        assert_eq!(ScratchDir::parse(&aliased.name()), Some(aliased));
        assert_eq!(ScratchDir::parse("download_1"), None);
    }

    #[test]
    fn identifiers_with_path_separators_are_rejected() {
        assert!(matches!(
            ScratchDir::new("../x", "J", false),
            Err(JobError::InvalidIdentifier(_))
        ));
        assert!(ScratchDir::new("", "J", false).is_err());
    }

    #[tokio::test]
    async fn create_then_resolve_and_load_parameters() {
        let spaces = ScratchSpaces::new(Arc::new(InMemoryStateStore::new()));
        let dir = spaces.create("S1", "J1", &params()).await.unwrap();
        assert_eq!(spaces.resolve("S1", "J1").await.unwrap(), dir);
        assert_eq!(spaces.load_parameters(&dir).await.unwrap(), Some(params()));
    }

    #[tokio::test]
    async fn resolve_falls_back_to_aliased_then_fails() {
        let spaces = ScratchSpaces::new(Arc::new(InMemoryStateStore::new()));
        let aliased = ScratchDir::new("S1", "J1", true).unwrap();
        spaces.create_in(&aliased, &params()).await.unwrap();
        assert_eq!(spaces.resolve("S1", "J1").await.unwrap(), aliased);

        let err = spaces.resolve("S2", "J1").await.unwrap_err();
        assert!(matches!(err, JobError::MissingScratchState { .. }));
    }

    #[tokio::test]
    async fn cleanup_by_job_all_and_downloads() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(FsStateStore::new(tmp.path()));
        let spaces = ScratchSpaces::new(store.clone());
        spaces.create("S1", "J1", &params()).await.unwrap();
        spaces.create("S2", "J1", &params()).await.unwrap();
        spaces.create("S1", "J2", &params()).await.unwrap();
        store.put("download_7/result.tar.gz", b"x").await.unwrap();
        store.put("download_8/result.tar.gz", b"y").await.unwrap();

        assert_eq!(spaces.find_by_job("J1").await.unwrap().len(), 2);
        assert_eq!(spaces.remove_job("J1").await.unwrap(), 2);
        assert!(spaces.find_by_job("J1").await.unwrap().is_empty());
        assert!(spaces.resolve("S1", "J2").await.is_ok());

        assert_eq!(spaces.remove_downloads(Some("7")).await.unwrap(), 1);
        assert!(!tmp.path().join("download_7").exists());
        assert!(tmp.path().join("download_8").exists());
        assert_eq!(spaces.remove_downloads(None).await.unwrap(), 1);

        assert_eq!(spaces.remove_all().await.unwrap(), 1);
        assert!(store.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn job_cleanup_matches_the_exact_job_id_only() {
        let spaces = ScratchSpaces::new(Arc::new(InMemoryStateStore::new()));
        spaces.create("S1", "ABCD", &params()).await.unwrap();
        spaces.create("S2", "EFGH", &params()).await.unwrap();
        spaces
            .create_in(&ScratchDir::new("S3", "AB", true).unwrap(), &params())
            .await
            .unwrap();

        for other in ["A", "?", "*", "[E]FGH", "ABC?"] {
            assert_eq!(spaces.remove_job(other).await.unwrap(), 0, "{other}");
            assert!(spaces.find_by_job(other).await.unwrap().is_empty(), "{other}");
        }
        assert_eq!(spaces.remove_job("AB").await.unwrap(), 1);
        assert!(spaces.resolve("S1", "ABCD").await.is_ok());
        assert!(spaces.resolve("S2", "EFGH").await.is_ok());
        assert!(spaces.resolve("S3", "AB").await.is_err());
    }
}
