//! DOMINO: detection of active network modules around the seeds.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::errors::ParameterError;
use crate::domain::job::Job;
use crate::domain::seeds::{normalise_seeds, SeedType};
use crate::infrastructure::executor::CommandSpec;

use super::{
    check_success, input_network, write_lines, ExecutionError, JobFamily, NetworkChoice,
    NetworkFormat, RunnerContext,
};

pub const NAME: &str = "domino";

/// Raw submit request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct DominoRequest {
    /// Seed genes/proteins
    pub seeds: Option<Vec<String>>,
    /// Graph-derived network to run against. Default: `DEFAULT`
    pub network: Option<String>,
}

/// Canonical request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DominoParameters {
    pub seeds: Vec<String>,
    pub seed_type: SeedType,
    pub network: NetworkChoice,
}

/// Validate a raw request and produce its canonical form. Pure.
pub fn normalize(request: DominoRequest) -> Result<DominoParameters, ParameterError> {
    let raw_seeds = request.seeds.unwrap_or_default();
    if raw_seeds.is_empty() {
        return Err(ParameterError::Missing("seeds"));
    }
    let (seeds, seed_type) = normalise_seeds(&raw_seeds);
    let network = NetworkChoice::parse(request.network.as_deref())?;

    Ok(DominoParameters {
        seeds,
        seed_type,
        network,
    })
}

/// Parse the `modules.out` format: one module per line, nodes in brackets.
fn parse_modules(content: &str) -> Vec<Vec<String>> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let inner = line
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
                .unwrap_or(line);
            Some(
                inner
                    .split(',')
                    .map(|node| node.trim().to_string())
                    .filter(|node| !node.is_empty())
                    .collect(),
            )
        })
        .collect()
}

pub struct DominoFamily;

#[async_trait]
impl JobFamily for DominoFamily {
    type Request = DominoParameters;

    fn name(&self) -> &'static str {
        NAME
    }

    async fn execute(
        &self,
        job: &Job<DominoParameters>,
        ctx: &RunnerContext,
    ) -> Result<Option<serde_json::Value>, ExecutionError> {
        let params = &job.request;

        let resource = input_network(params.seed_type, params.network, NetworkFormat::Sif)?;
        let network_source = ctx.static_files.ensure_built(resource).await?;

        let workdir = tempfile::tempdir()?;
        let network_file = workdir.path().join("network.sif");
        tokio::fs::copy(&network_source, &network_file).await?;
        let seed_file = workdir.path().join("seeds.txt");
        write_lines(&seed_file, &params.seeds).await?;

        let outdir = workdir.path().join("results");
        let command = CommandSpec::new(ctx.dirs.scripts.join("run_domino.py"))
            .arg("--network_file")
            .arg(network_file.display().to_string())
            .arg("--seed_file")
            .arg(seed_file.display().to_string())
            .arg("--outdir")
            .arg(outdir.display().to_string());

        let output = ctx.executor.run(&command).await?;
        check_success("DOMINO", &output)?;

        let modules_file = outdir.join("seeds/modules.out");
        let content = tokio::fs::read_to_string(&modules_file)
            .await
            .map_err(|e| ExecutionError::Malformed(format!("modules.out: {}", e)))?;

        Ok(Some(serde_json::json!({
            "modules": parse_modules(&content),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_seeds() {
        assert!(matches!(
            normalize(DominoRequest::default()).unwrap_err(),
            ParameterError::Missing("seeds")
        ));
    }

    #[test]
    fn parses_bracketed_modules() {
        let modules = parse_modules("[2717, 673]\n\n[999]\n");
        assert_eq!(
            modules,
            vec![
                vec!["2717".to_string(), "673".to_string()],
                vec!["999".to_string()],
            ]
        );
    }

    #[test]
    fn canonicalization_is_permutation_stable() {
        let a = normalize(DominoRequest {
            seeds: Some(vec!["673".to_string(), "2717".to_string()]),
            network: None,
        })
        .unwrap();
        let b = normalize(DominoRequest {
            seeds: Some(vec!["2717".to_string(), "673".to_string()]),
            network: Some("DEFAULT".to_string()),
        })
        .unwrap();
        assert_eq!(a, b);
    }
}
