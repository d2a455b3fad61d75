//! TrustRank drug ranking: trust propagation from protein seeds over the
//! merged protein-protein-drug network.

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

pub const NAME: &str = "trustrank";

/// Raw submit request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TrustRankRequest {
    /// Protein seeds: UniProt accessions, optionally prefixed with `uniprot.`
    pub seeds: Option<Vec<String>>,
    /// Damping factor in 0..=1. Default: `0.85`
    pub damping_factor: Option<f64>,
    /// Only rank drugs directly targeting a seed. Default: `true`
    pub only_direct_drugs: Option<bool>,
    /// Only rank approved drugs. Default: `true`
    pub only_approved_drugs: Option<bool>,
    /// Keep the top-N candidates (score ties included). Omit to store the
    /// full ranking as an artifact only.
    #[serde(rename = "N")]
    pub n: Option<u32>,
}

/// Canonical request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustRankParameters {
    pub seed_proteins: Vec<String>,
    pub damping_factor: f64,
    pub only_direct_drugs: bool,
    pub only_approved_drugs: bool,
    #[serde(rename = "N")]
    pub n: Option<u32>,
}

/// Validate a raw request and produce its canonical form. Pure.
pub fn normalize(request: TrustRankRequest) -> Result<TrustRankParameters, ParameterError> {
    let seeds = request.seeds.unwrap_or_default();
    if seeds.is_empty() {
        return Err(ParameterError::Missing("seeds"));
    }
    let damping_factor = request.damping_factor.unwrap_or(0.85);
    if !(0.0..=1.0).contains(&damping_factor) {
        return Err(ParameterError::invalid(
            "damping_factor",
            damping_factor.to_string(),
            "a value in [0, 1]",
        ));
    }

    Ok(TrustRankParameters {
        seed_proteins: strip_prefix_and_sort(&seeds, "uniprot."),
        damping_factor,
        only_direct_drugs: request.only_direct_drugs.unwrap_or(true),
        only_approved_drugs: request.only_approved_drugs.unwrap_or(true),
        n: request.n,
    })
}

/// Full-ranking artifact served by the download route.
pub fn artifact_path(dirs: &DirectoriesConfig, uid: Uuid) -> PathBuf {
    dirs.family_dir(NAME).join(format!("{}.txt", uid))
}

pub struct TrustRankFamily;

#[async_trait]
impl JobFamily for TrustRankFamily {
    type Request = TrustRankParameters;

    fn name(&self) -> &'static str {
        NAME
    }

    async fn execute(
        &self,
        job: &Job<TrustRankParameters>,
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

        let mut command = CommandSpec::new(ctx.dirs.scripts.join("run_trustrank.py"))
            .arg("-n")
            .arg(ranking_network.display().to_string())
            .arg("-s")
            .arg(seed_file.display().to_string())
            .arg("-d")
            .arg(params.damping_factor.to_string())
            .arg("-o")
            .arg(outfile.display().to_string());
        if params.only_direct_drugs {
            command = command.arg("--only_direct_drugs");
        }
        if params.only_approved_drugs {
            command = command.arg("--only_approved_drugs");
        }

        let output = ctx.executor.run(&command).await?;
        check_success("TrustRank", &output)?;

        let Some(n) = params.n else {
            // Full ranking stays artifact-only
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

    fn request(seeds: &[&str]) -> TrustRankRequest {
        TrustRankRequest {
            seeds: Some(seeds.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }

    #[test]
    fn rejects_empty_seeds() {
        let err = normalize(TrustRankRequest::default()).unwrap_err();
        assert!(matches!(err, ParameterError::Missing("seeds")));
    }

    #[test]
    fn rejects_out_of_range_damping() {
        let mut raw = request(&["P12345"]);
        raw.damping_factor = Some(1.5);
        assert!(normalize(raw).is_err());
    }

    #[test]
    fn strips_uniprot_prefix_and_sorts() {
        let params = normalize(request(&["uniprot.Q67890", "P12345"])).unwrap();
        assert_eq!(params.seed_proteins, vec!["P12345", "Q67890"]);
    }

    #[test]
    fn defaults_match_documentation() {
        let params = normalize(request(&["P12345"])).unwrap();
        assert_eq!(params.damping_factor, 0.85);
        assert!(params.only_direct_drugs);
        assert!(params.only_approved_drugs);
        assert_eq!(params.n, None);
    }

    #[test]
    fn explicit_defaults_canonicalize_like_omitted_ones() {
        let mut explicit = request(&["P12345"]);
        explicit.damping_factor = Some(0.85);
        explicit.only_direct_drugs = Some(true);
        explicit.only_approved_drugs = Some(true);
        assert_eq!(
            normalize(explicit).unwrap(),
            normalize(request(&["P12345"])).unwrap()
        );
    }
}
