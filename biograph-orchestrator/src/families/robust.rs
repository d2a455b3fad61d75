//! ROBUST: robust disease-module mining via prize-collecting Steiner trees.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use biograph_core::config::DirectoriesConfig;

use crate::domain::errors::ParameterError;
use crate::domain::job::Job;
use crate::domain::seeds::{normalise_seeds, SeedType};
use crate::infrastructure::executor::CommandSpec;

use super::{
    check_success, input_network, write_lines, ExecutionError, JobFamily, NetworkChoice,
    NetworkFormat, RunnerContext,
};

pub const NAME: &str = "robust";

/// Raw submit request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RobustRequest {
    /// Seed genes/proteins
    pub seeds: Option<Vec<String>>,
    /// Graph-derived network to run against. Default: `DEFAULT`
    pub network: Option<String>,
    /// Default: `0.25`
    pub initial_fraction: Option<f64>,
    /// Default: `0.9`
    pub reduction_factor: Option<f64>,
    /// Number of Steiner trees to compute. Default: `30`
    pub num_trees: Option<u32>,
    /// Default: `0.1`
    pub threshold: Option<f64>,
}

/// Canonical request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustParameters {
    pub seeds: Vec<String>,
    pub seed_type: SeedType,
    pub network: NetworkChoice,
    pub initial_fraction: f64,
    pub reduction_factor: f64,
    pub num_trees: u32,
    pub threshold: f64,
}

/// Validate a raw request and produce its canonical form. Pure.
pub fn normalize(request: RobustRequest) -> Result<RobustParameters, ParameterError> {
    let raw_seeds = request.seeds.unwrap_or_default();
    if raw_seeds.is_empty() {
        return Err(ParameterError::Missing("seeds"));
    }
    let (seeds, seed_type) = normalise_seeds(&raw_seeds);
    let network = NetworkChoice::parse(request.network.as_deref())?;

    Ok(RobustParameters {
        seeds,
        seed_type,
        network,
        initial_fraction: request.initial_fraction.unwrap_or(0.25),
        reduction_factor: request.reduction_factor.unwrap_or(0.9),
        num_trees: request.num_trees.unwrap_or(30),
        threshold: request.threshold.unwrap_or(0.1),
    })
}

/// GraphML module artifact served by the results route.
pub fn artifact_path(dirs: &DirectoriesConfig, uid: Uuid) -> PathBuf {
    dirs.family_dir(NAME).join(format!("{}.graphml", uid))
}

pub struct RobustFamily;

#[async_trait]
impl JobFamily for RobustFamily {
    type Request = RobustParameters;

    fn name(&self) -> &'static str {
        NAME
    }

    async fn execute(
        &self,
        job: &Job<RobustParameters>,
        ctx: &RunnerContext,
    ) -> Result<Option<serde_json::Value>, ExecutionError> {
        let params = &job.request;

        let resource = input_network(params.seed_type, params.network, NetworkFormat::Tsv)?;
        let network_source = ctx.static_files.ensure_built(resource).await?;

        let workdir = tempfile::tempdir()?;
        let network_file = workdir.path().join("network.txt");
        tokio::fs::copy(&network_source, &network_file).await?;
        let seed_file = workdir.path().join("seeds.txt");
        write_lines(&seed_file, &params.seeds).await?;

        let outfile = artifact_path(&ctx.dirs, job.uid);
        if let Some(parent) = outfile.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let command = CommandSpec::new(ctx.dirs.scripts.join("run_robust.py"))
            .arg("--network_file")
            .arg(network_file.display().to_string())
            .arg("--seed_file")
            .arg(seed_file.display().to_string())
            .arg("--outfile")
            .arg(outfile.display().to_string())
            .arg("--initial_fraction")
            .arg(params.initial_fraction.to_string())
            .arg("--reduction_factor")
            .arg(params.reduction_factor.to_string())
            .arg("--num_trees")
            .arg(params.num_trees.to_string())
            .arg("--threshold")
            .arg(params.threshold.to_string());

        let output = ctx.executor.run(&command).await?;
        check_success("ROBUST", &output)?;

        // The module itself is the graphml artifact
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(seeds: &[&str]) -> RobustRequest {
        RobustRequest {
            seeds: Some(seeds.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }

    #[test]
    fn applies_all_four_tuned_defaults() {
        let params = normalize(request(&["2717"])).unwrap();
        assert_eq!(params.initial_fraction, 0.25);
        assert_eq!(params.reduction_factor, 0.9);
        assert_eq!(params.num_trees, 30);
        assert_eq!(params.threshold, 0.1);
    }

    #[test]
    fn explicit_defaults_deduplicate_with_omitted_ones() {
        let mut explicit = request(&["2717"]);
        explicit.num_trees = Some(30);
        explicit.threshold = Some(0.1);
        assert_eq!(
            normalize(explicit).unwrap(),
            normalize(request(&["2717"])).unwrap()
        );
    }

    #[test]
    fn rejects_empty_seed_list() {
        assert!(normalize(RobustRequest::default()).is_err());
    }
}
