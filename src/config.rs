use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalyzerConfig {
    pub pipeline: PipelineConfig,
    pub worker: WorkerConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Parent directory for per-run scratch clones
    pub scratch_root: PathBuf,
    pub clone_depth: u32,
    /// Most recent commits read from the default branch per run
    pub commit_limit: usize,
    pub file_batch_size: usize,
    /// Branch recorded as default when the clone reports none
    pub fallback_branch: String,
    #[serde(
        default,
        with = "optional_duration_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub analysis_timeout: Option<Duration>,
    /// Concurrent file reads while building the file tree
    pub read_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    pub max_concurrent: usize,
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub max_connections: u32,
    #[serde(with = "duration_string")]
    pub acquire_timeout: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            worker: WorkerConfig {
                max_concurrent: 4,
                queue_capacity: 256,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                acquire_timeout: Duration::from_secs(30),
            },
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scratch_root: std::env::temp_dir(),
            clone_depth: 500,
            commit_limit: 500,
            file_batch_size: 500,
            fallback_branch: "main".to_string(),
            analysis_timeout: None,
            read_concurrency: 16,
        }
    }
}

impl AnalyzerConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AnalyzerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Defaults with environment overrides applied
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `REPOLYZE_*` variables and `DATABASE_URL`
    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        if let Ok(root) = std::env::var("REPOLYZE_SCRATCH_ROOT") {
            self.pipeline.scratch_root = PathBuf::from(root);
        }
        if let Ok(depth) = std::env::var("REPOLYZE_CLONE_DEPTH") {
            self.pipeline.clone_depth = depth.parse()?;
        }
        if let Ok(limit) = std::env::var("REPOLYZE_COMMIT_LIMIT") {
            self.pipeline.commit_limit = limit.parse()?;
        }
        if let Ok(timeout) = std::env::var("REPOLYZE_ANALYSIS_TIMEOUT") {
            let timeout = duration_string::parse(&timeout).map_err(anyhow::Error::msg)?;
            self.pipeline.analysis_timeout = Some(timeout);
        }
        if let Ok(max) = std::env::var("REPOLYZE_MAX_CONCURRENT") {
            self.worker.max_concurrent = max.parse()?;
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = Some(url);
        }
        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.pipeline.clone_depth > 0, "clone_depth must be positive");
        anyhow::ensure!(self.pipeline.commit_limit > 0, "commit_limit must be positive");
        anyhow::ensure!(
            self.pipeline.file_batch_size > 0,
            "file_batch_size must be positive"
        );
        anyhow::ensure!(
            !self.pipeline.fallback_branch.trim().is_empty(),
            "fallback_branch must not be empty"
        );
        anyhow::ensure!(
            self.worker.max_concurrent > 0,
            "worker.max_concurrent must be positive"
        );
        anyhow::ensure!(
            self.worker.queue_capacity > 0,
            "worker.queue_capacity must be positive"
        );
        Ok(())
    }
}

// Helper module for duration serialization
mod duration_string {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn parse(s: &str) -> Result<Duration, String> {
        let stripped = s
            .strip_suffix('s')
            .ok_or_else(|| "Expected duration string ending with 's'".to_string())?;
        let secs: u64 = stripped.parse().map_err(|e| format!("{e}"))?;
        Ok(Duration::from_secs(secs))
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = format!("{}s", duration.as_secs());
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }
}

mod optional_duration_string {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(duration) => super::duration_string::serialize(duration, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| super::duration_string::parse(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalyzerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.pipeline.commit_limit, 500);
        assert_eq!(config.pipeline.file_batch_size, 500);
        assert_eq!(config.pipeline.fallback_branch, "main");
        assert!(config.pipeline.analysis_timeout.is_none());
    }

    #[test]
    fn test_parses_toml_with_durations() {
        let config: AnalyzerConfig = toml::from_str(
            r#"
            [pipeline]
            scratch_root = "/var/tmp/repolyze"
            clone_depth = 50
            commit_limit = 100
            file_batch_size = 200
            fallback_branch = "trunk"
            analysis_timeout = "900s"
            read_concurrency = 8

            [worker]
            max_concurrent = 2
            queue_capacity = 16

            [database]
            max_connections = 5
            acquire_timeout = "10s"
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline.clone_depth, 50);
        assert_eq!(config.pipeline.fallback_branch, "trunk");
        assert_eq!(
            config.pipeline.analysis_timeout,
            Some(Duration::from_secs(900))
        );
        assert_eq!(config.database.acquire_timeout, Duration::from_secs(10));
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_round_trips_through_toml() {
        let mut config = AnalyzerConfig::default();
        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("analysis_timeout"));
        let parsed: AnalyzerConfig = toml::from_str(&rendered).unwrap();
        assert!(parsed.pipeline.analysis_timeout.is_none());

        config.pipeline.analysis_timeout = Some(Duration::from_secs(60));
        let rendered = toml::to_string(&config).unwrap();
        assert!(rendered.contains("analysis_timeout = \"60s\""));
    }

    #[test]
    fn test_rejects_bad_duration() {
        assert!(duration_string::parse("15m").is_err());
        assert!(duration_string::parse("s").is_err());
        assert_eq!(
            duration_string::parse("42s").unwrap(),
            Duration::from_secs(42)
        );
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = AnalyzerConfig::default();
        config.worker.max_concurrent = 0;
        assert!(config.validate().is_err());
    }
}
