//! Bet record sources
//!
//! The client only needs the agency's records as ordered text lines; the file
//! format beyond "one bet per line" is not interpreted here.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

use shared::{AgencyId, BetRecord};

/// Yields the ordered bet records of one agency; may yield none
#[async_trait]
pub trait BetSource: Send + Sync {
    async fn load(&self, agency: &AgencyId) -> Result<Vec<BetRecord>>;
}

/// Reads `agency-<id>.csv` style files, one record per line
#[derive(Debug, Clone)]
pub struct CsvFileSource {
    path_template: String,
}

impl CsvFileSource {
    /// `{id}` in the template is replaced by the agency identifier
    pub fn new(path_template: impl Into<String>) -> Self {
        Self {
            path_template: path_template.into(),
        }
    }

    pub fn path_for(&self, agency: &AgencyId) -> PathBuf {
        PathBuf::from(self.path_template.replace("{id}", agency.as_str()))
    }
}

#[async_trait]
impl BetSource for CsvFileSource {
    async fn load(&self, agency: &AgencyId) -> Result<Vec<BetRecord>> {
        let path = self.path_for(agency);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read bets file {}", path.display()))?;

        let records = parse_records(&contents)
            .with_context(|| format!("Invalid bets file {}", path.display()))?;

        tracing::debug!(
            path = %path.display(),
            records = records.len(),
            "Loaded bet records"
        );

        Ok(records)
    }
}

/// Split file contents into records, skipping blank lines
pub fn parse_records(contents: &str) -> Result<Vec<BetRecord>> {
    contents
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(|line| BetRecord::new(line).map_err(anyhow::Error::from))
        .collect()
}
