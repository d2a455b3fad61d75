//! Job families
//!
//! One module per wrapped algorithm. A family owns its submit DTO, its
//! canonical request type, its runner, and its artifact layout; families
//! share nothing but the queue and the static-file builder. The canonical
//! request types here are the deduplication keys: their lists are sorted and
//! deduplicated, their defaults applied, and their field order fixed before
//! they ever reach the store.

pub mod bicon;
pub mod closeness;
pub mod diamond;
pub mod domino;
pub mod graph;
pub mod kpm;
pub mod must;
mod ranking;
pub mod robust;
pub mod trustrank;
pub mod validation;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use biograph_core::config::DirectoriesConfig;

use crate::domain::errors::ParameterError;
use crate::domain::job::Job;
use crate::domain::seeds::SeedType;
use crate::infrastructure::executor::{CommandExecutor, CommandOutput, ExecutorError};
use crate::infrastructure::static_files::{StaticFileBuilder, StaticFileError, StaticResource};

/// Shared dependencies handed to every family runner.
#[derive(Clone)]
pub struct RunnerContext {
    pub executor: Arc<dyn CommandExecutor>,
    pub static_files: Arc<StaticFileBuilder>,
    pub dirs: DirectoriesConfig,
}

/// A job family: canonical request schema plus execution logic.
#[async_trait]
pub trait JobFamily: Send + Sync + 'static {
    /// The canonical request. Serializing it must be deterministic; the
    /// store digests the JSON as the deduplication key.
    type Request: Serialize + DeserializeOwned + Clone + Send + Sync;

    /// Family name: store namespace, lock scope, queue tag and route prefix.
    fn name(&self) -> &'static str;

    /// Run the long-running computation. Returns the result payload to
    /// record on completion; artifact-only families return `None`.
    async fn execute(
        &self,
        job: &Job<Self::Request>,
        ctx: &RunnerContext,
    ) -> Result<Option<serde_json::Value>, ExecutionError>;
}

/// Asynchronous execution failures. These are recorded on the job as its
/// `error` field, never raised back to the submitting request.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("{tool} exited with return code {code} -- please check your inputs and contact the API developer if issues persist")]
    NonZeroExit { tool: &'static str, code: i32 },

    #[error("Network choice ({network}) and seed type ({seed_type}) are incompatible")]
    IncompatibleNetwork {
        network: &'static str,
        seed_type: &'static str,
    },

    #[error("Output artifact missing or malformed: {0}")]
    Malformed(String),

    #[error("I/O error during job execution: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    StaticFiles(#[from] StaticFileError),
}

/// Which derived network a request runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkChoice {
    #[serde(rename = "DEFAULT")]
    Default,
    #[serde(rename = "SHARED_DISORDER")]
    SharedDisorder,
}

impl NetworkChoice {
    /// Parse the optional `network` request field, defaulting to `DEFAULT`.
    pub fn parse(value: Option<&str>) -> Result<Self, ParameterError> {
        match value {
            None | Some("DEFAULT") => Ok(Self::Default),
            Some("SHARED_DISORDER") => Ok(Self::SharedDisorder),
            Some(other) => Err(ParameterError::invalid(
                "network",
                other,
                "`DEFAULT` or `SHARED_DISORDER`",
            )),
        }
    }
}

/// Edge-list format expected by a family's executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFormat {
    Tsv,
    Sif,
}

/// Map a (seed type, network choice) pair to the static resource holding the
/// input network. `SHARED_DISORDER` only exists as a gene-gene network.
pub fn input_network(
    seed_type: SeedType,
    network: NetworkChoice,
    format: NetworkFormat,
) -> Result<StaticResource, ExecutionError> {
    match (seed_type, network, format) {
        (SeedType::Gene, NetworkChoice::Default, NetworkFormat::Tsv) => {
            Ok(StaticResource::GgiDefault)
        }
        (SeedType::Gene, NetworkChoice::Default, NetworkFormat::Sif) => {
            Ok(StaticResource::GgiDefaultSif)
        }
        (SeedType::Gene, NetworkChoice::SharedDisorder, NetworkFormat::Tsv) => {
            Ok(StaticResource::GgiSharedDisorder)
        }
        (SeedType::Gene, NetworkChoice::SharedDisorder, NetworkFormat::Sif) => {
            Ok(StaticResource::GgiSharedDisorderSif)
        }
        (SeedType::Protein, NetworkChoice::Default, NetworkFormat::Tsv) => {
            Ok(StaticResource::PpiDefault)
        }
        (SeedType::Protein, NetworkChoice::Default, NetworkFormat::Sif) => {
            Ok(StaticResource::PpiDefaultSif)
        }
        (SeedType::Protein, NetworkChoice::SharedDisorder, _) => {
            Err(ExecutionError::IncompatibleNetwork {
                network: "SHARED_DISORDER",
                seed_type: "protein",
            })
        }
    }
}

/// Fail with [`ExecutionError::NonZeroExit`] unless the command succeeded.
/// Stderr is logged but deliberately kept out of the client-visible error.
pub fn check_success(tool: &'static str, output: &CommandOutput) -> Result<(), ExecutionError> {
    if output.success() {
        return Ok(());
    }
    let code = output.status_code.unwrap_or(-1);
    warn!(tool, code, stderr = %output.stderr, "External tool failed");
    Err(ExecutionError::NonZeroExit { tool, code })
}

/// Write one line per item.
pub async fn write_lines<I, S>(path: &Path, lines: I) -> std::io::Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut content = String::new();
    for line in lines {
        content.push_str(line.as_ref());
        content.push('\n');
    }
    tokio::fs::write(path, content).await
}

/// Parse a header-led TSV into one JSON object per row. Short rows are
/// padded with missing columns omitted.
pub fn tsv_records(content: &str) -> Vec<serde_json::Map<String, serde_json::Value>> {
    let mut lines = content.lines().filter(|line| !line.trim().is_empty());
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let columns: Vec<&str> = header.split('\t').collect();

    lines
        .map(|line| {
            let mut record = serde_json::Map::new();
            for (column, value) in columns.iter().zip(line.split('\t')) {
                record.insert(
                    column.to_string(),
                    serde_json::Value::String(value.to_string()),
                );
            }
            record
        })
        .collect()
}

/// Parse a two-plus-column edge list (TSV), yielding the first two columns.
pub fn edge_list(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some(a), Some(b)) => Some((a.to_string(), b.to_string())),
                _ => None,
            }
        })
        .collect()
}

/// Order a node pair lexicographically, as edges are stored undirected.
pub fn sorted_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_parse_defaults() {
        assert_eq!(NetworkChoice::parse(None).unwrap(), NetworkChoice::Default);
        assert_eq!(
            NetworkChoice::parse(Some("SHARED_DISORDER")).unwrap(),
            NetworkChoice::SharedDisorder
        );
        assert!(NetworkChoice::parse(Some("CUSTOM")).is_err());
    }

    #[test]
    fn shared_disorder_requires_gene_seeds() {
        let err = input_network(
            SeedType::Protein,
            NetworkChoice::SharedDisorder,
            NetworkFormat::Tsv,
        )
        .unwrap_err();
        assert!(matches!(err, ExecutionError::IncompatibleNetwork { .. }));
    }

    #[test]
    fn tsv_records_map_header_to_values() {
        let records = tsv_records("#rank\tnode\n1\t2717\n2\t673\n");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["#rank"], "1");
        assert_eq!(records[1]["node"], "673");
    }

    #[test]
    fn edge_list_skips_malformed_lines() {
        let edges = edge_list("a\tb\n\nc\td\nlonely\n");
        assert_eq!(edges, vec![
            ("a".to_string(), "b".to_string()),
            ("c".to_string(), "d".to_string()),
        ]);
    }

    #[test]
    fn sorted_pair_is_order_independent() {
        assert_eq!(sorted_pair("b", "a"), sorted_pair("a", "b"));
    }
}
