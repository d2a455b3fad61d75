//! Closeness-centrality drug ranking against the merged
//! protein-protein-drug network.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use biograph_core::config::DirectoriesConfig;

use crate::domain::errors::ParameterError;
use crate::domain::job::Job;
use crate::domain::seeds::strip_prefix_and_sort;
use crate::infrastructure::executor::CommandSpec;
use crate::infrastructure::static_files::StaticResource;

use super::ranking::{drug_seed_edges, top_ranked_drugs};
use super::{check_success, write_lines, ExecutionError, JobFamily, RunnerContext};

pub const NAME: &str = "closeness";

/// Raw submit request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ClosenessRequest {
    /// Protein seeds: UniProt accessions, optionally prefixed with `uniprot.`
    pub seeds: Option<Vec<String>>,
    /// Only rank drugs directly targeting a seed. Default: `true`
    pub only_direct_drugs: Option<bool>,
    /// Only rank approved drugs. Default: `true`
    pub only_approved_drugs: Option<bool>,
    /// Keep the top-N candidates (score ties included)
    #[serde(rename = "N")]
    pub n: Option<u32>,
}

/// Canonical request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosenessParameters {
    pub seed_proteins: Vec<String>,
    pub only_direct_drugs: bool,
    pub only_approved_drugs: bool,
    #[serde(rename = "N")]
    pub n: Option<u32>,
}

/// Validate a raw request and produce its canonical form. Pure.
pub fn normalize(request: ClosenessRequest) -> Result<ClosenessParameters, ParameterError> {
    let seeds = request.seeds.unwrap_or_default();
    if seeds.is_empty() {
        return Err(ParameterError::Missing("seeds"));
    }

    Ok(ClosenessParameters {
        seed_proteins: strip_prefix_and_sort(&seeds, "uniprot."),
        only_direct_drugs: request.only_direct_drugs.unwrap_or(true),
        only_approved_drugs: request.only_approved_drugs.unwrap_or(true),
        n: request.n,
    })
}

/// Full-ranking artifact served by the download route.
pub fn artifact_path(dirs: &DirectoriesConfig, uid: Uuid) -> PathBuf {
    dirs.family_dir(NAME).join(format!("{}.txt", uid))
}

pub struct ClosenessFamily;

#[async_trait]
impl JobFamily for ClosenessFamily {
    type Request = ClosenessParameters;

    fn name(&self) -> &'static str {
        NAME
    }

    async fn execute(
        &self,
        job: &Job<ClosenessParameters>,
        ctx: &RunnerContext,
    ) -> Result<Option<serde_json::Value>, ExecutionError> {
        let params = &job.request;

        let ranking_network = ctx
            .static_files
            .ensure_built(StaticResource::RankingNetwork)
            .await?;

        let workdir = tempfile::tempdir()?;
        let seed_file = workdir.path().join("seeds.txt");
        let prefixed_seeds: Vec<String> = params
            .seed_proteins
            .iter()
            .map(|seed| format!("uniprot.{}", seed))
            .collect();
        write_lines(&seed_file, &prefixed_seeds).await?;

        let outfile = artifact_path(&ctx.dirs, job.uid);
        if let Some(parent) = outfile.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut command = CommandSpec::new(ctx.dirs.scripts.join("run_closeness.py"))
            .arg("-n")
            .arg(ranking_network.display().to_string())
            .arg("-s")
            .arg(seed_file.display().to_string())
            .arg("-o")
            .arg(outfile.display().to_string());
        if params.only_direct_drugs {
            command = command.arg("--only_direct_drugs");
        }
        if params.only_approved_drugs {
            command = command.arg("--only_approved_drugs");
        }

        let output = ctx.executor.run(&command).await?;
        check_success("Closeness", &output)?;

        let Some(n) = params.n else {
            return Ok(None);
        };

        let ranking = tokio::fs::read_to_string(&outfile)
            .await
            .map_err(|e| ExecutionError::Malformed(format!("ranking output: {}", e)))?;
        let drugs = top_ranked_drugs(&ranking, n)?;

        let edges_file = ranking_network.with_file_name("PPDr-for-ranking-edges.tsv");
        let edges = drug_seed_edges(&edges_file, &drugs, &prefixed_seeds).await?;

        Ok(Some(serde_json::json!({
            "drugs": drugs,
            "edges": edges,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_seeds() {
        let err = normalize(ClosenessRequest::default()).unwrap_err();
        assert!(matches!(err, ParameterError::Missing("seeds")));
    }

    #[test]
    fn canonical_form_is_order_independent() {
        let a = normalize(ClosenessRequest {
            seeds: Some(vec!["uniprot.Q67890".to_string(), "P12345".to_string()]),
            ..Default::default()
        })
        .unwrap();
        let b = normalize(ClosenessRequest {
            seeds: Some(vec!["P12345".to_string(), "uniprot.Q67890".to_string()]),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.seed_proteins, vec!["P12345", "Q67890"]);
    }
}
