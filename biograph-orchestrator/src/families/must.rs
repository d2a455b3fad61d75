//! MuST: multiple Steiner trees connecting the seeds in an input network.

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
    check_success, edge_list, input_network, tsv_records, write_lines, ExecutionError,
    JobFamily, NetworkChoice, NetworkFormat, RunnerContext,
};

pub const NAME: &str = "must";

/// Raw submit request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct MustRequest {
    /// Seed genes/proteins
    pub seeds: Option<Vec<String>>,
    /// Graph-derived network to run against. Default: `DEFAULT`
    pub network: Option<String>,
    /// Hub penalty in 0.0..=1.0
    pub hubpenalty: Option<f64>,
    /// Return multiple Steiner trees
    pub multiple: Option<bool>,
    /// Number of trees to return
    pub trees: Option<u32>,
    /// Maximum number of iterations
    pub maxit: Option<u32>,
}

/// Canonical request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MustParameters {
    pub seeds: Vec<String>,
    pub seed_type: SeedType,
    pub network: NetworkChoice,
    pub hub_penalty: f64,
    pub multiple: bool,
    pub trees: u32,
    pub maxit: u32,
}

/// Validate a raw request and produce its canonical form. Pure.
pub fn normalize(request: MustRequest) -> Result<MustParameters, ParameterError> {
    let raw_seeds = request.seeds.unwrap_or_default();
    if raw_seeds.is_empty() {
        return Err(ParameterError::Missing("seeds"));
    }
    let hub_penalty = request.hubpenalty.ok_or(ParameterError::Missing("hubpenalty"))?;
    if !(0.0..=1.0).contains(&hub_penalty) {
        return Err(ParameterError::invalid(
            "hubpenalty",
            hub_penalty.to_string(),
            "a value in [0, 1]",
        ));
    }
    let multiple = request.multiple.ok_or(ParameterError::Missing("multiple"))?;
    let trees = request.trees.ok_or(ParameterError::Missing("trees"))?;
    let maxit = request.maxit.ok_or(ParameterError::Missing("maxit"))?;

    let (seeds, seed_type) = normalise_seeds(&raw_seeds);
    let network = NetworkChoice::parse(request.network.as_deref())?;

    Ok(MustParameters {
        seeds,
        seed_type,
        network,
        hub_penalty,
        multiple,
        trees,
        maxit,
    })
}

/// Module-node artifact
pub fn nodes_artifact_path(dirs: &DirectoriesConfig, uid: Uuid) -> PathBuf {
    dirs.family_dir(NAME).join(format!("{}_nodes.txt", uid))
}

/// Module-edge artifact
pub fn edges_artifact_path(dirs: &DirectoriesConfig, uid: Uuid) -> PathBuf {
    dirs.family_dir(NAME).join(format!("{}_edges.txt", uid))
}

pub struct MustFamily;

#[async_trait]
impl JobFamily for MustFamily {
    type Request = MustParameters;

    fn name(&self) -> &'static str {
        NAME
    }

    async fn execute(
        &self,
        job: &Job<MustParameters>,
        ctx: &RunnerContext,
    ) -> Result<Option<serde_json::Value>, ExecutionError> {
        let params = &job.request;

        let resource = input_network(params.seed_type, params.network, NetworkFormat::Tsv)?;
        let network_source = ctx.static_files.ensure_built(resource).await?;

        let workdir = tempfile::tempdir()?;
        let network_file = workdir.path().join("network.tsv");
        tokio::fs::copy(&network_source, &network_file).await?;
        let seed_file = workdir.path().join("seeds.txt");
        write_lines(&seed_file, &params.seeds).await?;

        let nodes_artifact = nodes_artifact_path(&ctx.dirs, job.uid);
        let edges_artifact = edges_artifact_path(&ctx.dirs, job.uid);
        if let Some(parent) = nodes_artifact.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let jar = ctx.dirs.scripts.join("MultiSteinerBackend/MultiSteinerBackend.jar");
        let mut command = CommandSpec::new("java")
            .arg("-jar")
            .arg(jar.display().to_string())
            .arg("-hp")
            .arg(params.hub_penalty.to_string());
        if params.multiple {
            command = command.arg("-m");
        }
        command = command
            .arg("-mi")
            .arg(params.maxit.to_string())
            .arg("-nw")
            .arg(network_file.display().to_string())
            .arg("-s")
            .arg(seed_file.display().to_string())
            .arg("-t")
            .arg(params.trees.to_string())
            .arg("-oe")
            .arg(edges_artifact.display().to_string())
            .arg("-on")
            .arg(nodes_artifact.display().to_string());

        let output = ctx.executor.run(&command).await?;
        check_success("MuST", &output)?;

        let network_content = tokio::fs::read_to_string(&network_file).await?;
        let nodes_content = tokio::fs::read_to_string(&nodes_artifact)
            .await
            .map_err(|e| ExecutionError::Malformed(format!("node output: {}", e)))?;
        let edges_content = tokio::fs::read_to_string(&edges_artifact)
            .await
            .map_err(|e| ExecutionError::Malformed(format!("edge output: {}", e)))?;

        // Seeds count as "in network" only if they appear in the input edges
        let network_nodes: std::collections::BTreeSet<String> = edge_list(&network_content)
            .into_iter()
            .flat_map(|(a, b)| [a, b])
            .collect();
        let seeds_in_network: Vec<&String> = params
            .seeds
            .iter()
            .filter(|seed| network_nodes.contains(seed.as_str()))
            .collect();

        let nodes: Vec<serde_json::Value> = tsv_records(&nodes_content)
            .into_iter()
            .map(serde_json::Value::Object)
            .collect();
        let edges: Vec<serde_json::Value> = tsv_records(&edges_content)
            .into_iter()
            .map(serde_json::Value::Object)
            .collect();

        Ok(Some(serde_json::json!({
            "seeds_in_network": seeds_in_network,
            "nodes": nodes,
            "edges": edges,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> MustRequest {
        MustRequest {
            seeds: Some(vec!["2717".to_string(), "673".to_string()]),
            hubpenalty: Some(0.5),
            multiple: Some(true),
            trees: Some(5),
            maxit: Some(10),
            ..Default::default()
        }
    }

    #[test]
    fn all_tuning_parameters_are_required() {
        for missing in ["hubpenalty", "multiple", "trees", "maxit"] {
            let mut raw = request();
            match missing {
                "hubpenalty" => raw.hubpenalty = None,
                "multiple" => raw.multiple = None,
                "trees" => raw.trees = None,
                _ => raw.maxit = None,
            }
            let err = normalize(raw).unwrap_err();
            assert!(matches!(err, ParameterError::Missing(name) if name == missing));
        }
    }

    #[test]
    fn rejects_out_of_range_hub_penalty() {
        let mut raw = request();
        raw.hubpenalty = Some(1.2);
        assert!(normalize(raw).is_err());
    }

    #[test]
    fn canonical_form_sorts_seeds() {
        let params = normalize(request()).unwrap();
        assert_eq!(params.seeds, vec!["2717", "673"]);
        assert_eq!(params.seed_type, SeedType::Gene);
    }
}
