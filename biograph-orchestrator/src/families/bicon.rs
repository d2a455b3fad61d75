//! BiCoN: network-constrained biclustering of patients and omics data.
//!
//! The one family whose input is an uploaded expression matrix rather than a
//! seed list. The canonical request is the SHA-256 digest of the uploaded
//! bytes plus the clustering parameters, so re-uploading the same matrix
//! with the same parameters returns the existing job. The upload is stored
//! under a UID-scoped directory before the job is queued.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use biograph_core::config::DirectoriesConfig;

use crate::domain::errors::ParameterError;
use crate::domain::job::Job;
use crate::domain::seeds::SeedType;
use crate::infrastructure::executor::CommandSpec;

use super::{
    check_success, edge_list, input_network, sorted_pair, ExecutionError, JobFamily,
    NetworkChoice, NetworkFormat, RunnerContext,
};

pub const NAME: &str = "bicon";

/// Canonical request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiconParameters {
    /// SHA-256 of the uploaded expression file
    pub sha256: String,
    pub lg_min: u32,
    pub lg_max: u32,
    pub network: NetworkChoice,
}

/// Digest the uploaded expression bytes for the canonical request.
pub fn file_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Validate the upload parameters and produce the canonical form. Pure.
pub fn normalize(
    bytes: &[u8],
    lg_min: Option<u32>,
    lg_max: Option<u32>,
    network: Option<&str>,
) -> Result<BiconParameters, ParameterError> {
    if bytes.is_empty() {
        return Err(ParameterError::Missing("expression_file"));
    }
    Ok(BiconParameters {
        sha256: file_digest(bytes),
        lg_min: lg_min.unwrap_or(10),
        lg_max: lg_max.unwrap_or(15),
        network: NetworkChoice::parse(network)?,
    })
}

/// Per-job upload/working directory: `<data>/bicon/<uid>/`
pub fn upload_dir(dirs: &DirectoriesConfig, uid: Uuid) -> PathBuf {
    dirs.family_dir(NAME).join(uid.to_string())
}

/// Zipped-results artifact served by the download route.
pub fn zip_path(dirs: &DirectoriesConfig, uid: Uuid) -> PathBuf {
    dirs.family_dir(NAME).join(format!("{}.zip", uid))
}

/// Clustermap image served by the clustermap route.
pub fn clustermap_path(dirs: &DirectoriesConfig, uid: Uuid) -> PathBuf {
    dirs.family_dir(NAME).join(format!("{}_clustermap.png", uid))
}

/// Locate the stored expression file (named `<uid>.<original extension>`).
async fn expression_file(workdir: &Path, uid: Uuid) -> Result<PathBuf, ExecutionError> {
    let prefix = uid.to_string();
    let mut entries = tokio::fs::read_dir(workdir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            return Ok(entry.path());
        }
    }
    Err(ExecutionError::Malformed(
        "uploaded expression file is missing".into(),
    ))
}

pub struct BiconFamily;

#[async_trait]
impl JobFamily for BiconFamily {
    type Request = BiconParameters;

    fn name(&self) -> &'static str {
        NAME
    }

    async fn execute(
        &self,
        job: &Job<BiconParameters>,
        ctx: &RunnerContext,
    ) -> Result<Option<serde_json::Value>, ExecutionError> {
        let params = &job.request;
        let workdir = upload_dir(&ctx.dirs, job.uid);

        // BiCoN always clusters on the gene-gene network
        let resource = input_network(SeedType::Gene, params.network, NetworkFormat::Tsv)?;
        let network_source = ctx.static_files.ensure_built(resource).await?;
        let network_file = workdir.join("network.tsv");
        tokio::fs::copy(&network_source, &network_file).await?;

        let expression = expression_file(&workdir, job.uid).await?;

        let command = CommandSpec::new(ctx.dirs.scripts.join("run_bicon.py"))
            .arg("--expression")
            .arg(expression.display().to_string())
            .arg("--network")
            .arg("network.tsv")
            .arg("--lg_min")
            .arg(params.lg_min.to_string())
            .arg("--lg_max")
            .arg(params.lg_max.to_string())
            .arg("--outdir")
            .arg(".")
            .current_dir(&workdir);

        let output = ctx.executor.run(&command).await?;
        check_success("BiCoN", &output)?;

        let result = build_result(&workdir).await?;

        // Keep the clustermap outside the zip so it stays directly servable
        let clustermap = workdir.join("clustermap.png");
        if tokio::fs::try_exists(&clustermap).await? {
            tokio::fs::copy(&clustermap, clustermap_path(&ctx.dirs, job.uid)).await?;
        }

        let zip_command = CommandSpec::new("zip")
            .arg("-r")
            .arg("-D")
            .arg(format!("{}.zip", job.uid))
            .arg(job.uid.to_string())
            .current_dir(ctx.dirs.family_dir(NAME));
        let zip_output = ctx.executor.run(&zip_command).await?;
        check_success("zip", &zip_output)?;

        tokio::fs::remove_dir_all(&workdir).await?;

        Ok(Some(result))
    }
}

/// Assemble the result payload from the tool's `results.json` /
/// `results.csv` outputs and the module edges found in the input network.
async fn build_result(workdir: &Path) -> Result<serde_json::Value, ExecutionError> {
    let results_raw = tokio::fs::read_to_string(workdir.join("results.json"))
        .await
        .map_err(|e| ExecutionError::Malformed(format!("results.json: {}", e)))?;
    let mut results: serde_json::Value = serde_json::from_str(&results_raw)
        .map_err(|e| ExecutionError::Malformed(format!("results.json: {}", e)))?;

    let genes = |key: &str| -> Vec<String> {
        results[key]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|entry| entry["gene"].as_str().map(String::from))
            .collect()
    };
    let nodes: std::collections::BTreeSet<String> =
        genes("genes1").into_iter().chain(genes("genes2")).collect();

    let network_content = tokio::fs::read_to_string(workdir.join("network.tsv")).await?;
    let mut edges: std::collections::BTreeSet<(String, String)> = Default::default();
    for (a, b) in edge_list(&network_content) {
        if a == b {
            continue;
        }
        if nodes.contains(&a) && nodes.contains(&b) {
            edges.insert(sorted_pair(&a, &b));
        }
    }
    results["edges"] = serde_json::json!(edges
        .into_iter()
        .map(|(a, b)| vec![a, b])
        .collect::<Vec<_>>());

    // Patient groups live in the last two columns of the first data row
    let csv = tokio::fs::read_to_string(workdir.join("results.csv"))
        .await
        .map_err(|e| ExecutionError::Malformed(format!("results.csv: {}", e)))?;
    let row = csv
        .trim()
        .lines()
        .nth(1)
        .ok_or_else(|| ExecutionError::Malformed("results.csv has no data row".into()))?;
    let fields: Vec<&str> = row.split(',').collect();
    if fields.len() < 2 {
        return Err(ExecutionError::Malformed(
            "results.csv data row has too few columns".into(),
        ));
    }
    let patients1 = fields[fields.len() - 2];
    let patients2 = fields[fields.len() - 1];
    results["patients1"] = serde_json::json!(patients1.split('|').collect::<Vec<_>>());
    results["patients2"] = serde_json::json!(patients2.split('|').collect::<Vec<_>>());

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_and_content_sensitive() {
        let a = normalize(b"expression data", None, None, None).unwrap();
        let b = normalize(b"expression data", Some(10), Some(15), Some("DEFAULT")).unwrap();
        let c = normalize(b"other data", None, None, None).unwrap();

        // Explicit defaults canonicalize identically; different bytes do not
        assert_eq!(a, b);
        assert_ne!(a.sha256, c.sha256);
    }

    #[test]
    fn empty_upload_is_rejected() {
        assert!(matches!(
            normalize(b"", None, None, None).unwrap_err(),
            ParameterError::Missing("expression_file")
        ));
    }

    #[tokio::test]
    async fn result_assembly_joins_genes_edges_and_patients() {
        let workdir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            workdir.path().join("results.json"),
            r#"{"genes1": [{"gene": "673"}], "genes2": [{"gene": "2717"}]}"#,
        )
        .await
        .unwrap();
        tokio::fs::write(workdir.path().join("network.tsv"), "673\t2717\n673\t999\n")
            .await
            .unwrap();
        tokio::fs::write(
            workdir.path().join("results.csv"),
            "id,genes1,genes2,patients1,patients2\n0,a,b,p1|p2,p3\n",
        )
        .await
        .unwrap();

        let result = build_result(workdir.path()).await.unwrap();
        assert_eq!(result["edges"][0][0], "2717");
        assert_eq!(result["edges"][0][1], "673");
        assert_eq!(result["patients1"][0], "p1");
        assert_eq!(result["patients2"][0], "p3");
    }
}
