//! KeyPathwayMiner: condition-specific pathway extraction with up to `k`
//! exception nodes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::errors::ParameterError;
use crate::domain::job::Job;
use crate::domain::seeds::{normalise_seeds, SeedType};
use crate::infrastructure::executor::CommandSpec;

use super::{
    check_success, input_network, sorted_pair, write_lines, ExecutionError, JobFamily,
    NetworkChoice, NetworkFormat, RunnerContext,
};

pub const NAME: &str = "kpm";

/// Raw submit request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct KpmRequest {
    /// Seed genes/proteins
    pub seeds: Option<Vec<String>>,
    /// Number of permitted exception nodes
    pub k: Option<u32>,
    /// Graph-derived network to run against. Default: `DEFAULT`
    pub network: Option<String>,
}

/// Canonical request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpmParameters {
    pub seeds: Vec<String>,
    pub seed_type: SeedType,
    pub network: NetworkChoice,
    pub k: u32,
}

/// Validate a raw request and produce its canonical form. Pure.
pub fn normalize(request: KpmRequest) -> Result<KpmParameters, ParameterError> {
    let raw_seeds = request.seeds.unwrap_or_default();
    if raw_seeds.is_empty() {
        return Err(ParameterError::Missing("seeds"));
    }
    let k = request.k.ok_or(ParameterError::Missing("k"))?;

    let (seeds, seed_type) = normalise_seeds(&raw_seeds);
    let network = NetworkChoice::parse(request.network.as_deref())?;

    Ok(KpmParameters {
        seeds,
        seed_type,
        network,
        k,
    })
}

/// Parse the pathway blocks of a `pathways.txt` file.
///
/// A line with a single numeric field opens a pathway block; two-field lines
/// are `(node, is_exception)` rows and three-field lines are edges.
fn parse_pathways(content: &str) -> serde_json::Value {
    let mut results = serde_json::Map::new();
    let mut current: Option<String> = None;

    for line in content.lines() {
        let fields: Vec<&str> = line.trim().split('\t').collect();
        match fields.as_slice() {
            [pathway]
                if !pathway.is_empty()
                    && pathway.chars().all(|c| c.is_ascii_digit()) =>
            {
                current = Some(pathway.to_string());
                results.insert(
                    pathway.to_string(),
                    serde_json::json!({
                        "nodes": {"exceptions": [], "non-exceptions": []},
                        "edges": [],
                    }),
                );
            }
            [node, is_exception] if *node != "NODES" => {
                if let Some(pathway) = current.as_ref().and_then(|p| results.get_mut(p)) {
                    let bucket = if *is_exception == "true" {
                        "exceptions"
                    } else {
                        "non-exceptions"
                    };
                    if let Some(nodes) = pathway["nodes"][bucket].as_array_mut() {
                        nodes.push(serde_json::json!(node));
                    }
                }
            }
            [node_a, _, node_b] => {
                if let Some(pathway) = current.as_ref().and_then(|p| results.get_mut(p)) {
                    let (a, b) = sorted_pair(node_a, node_b);
                    if let Some(edges) = pathway["edges"].as_array_mut() {
                        edges.push(serde_json::json!([a, b]));
                    }
                }
            }
            _ => {}
        }
    }

    serde_json::Value::Object(results)
}

pub struct KpmFamily;

#[async_trait]
impl JobFamily for KpmFamily {
    type Request = KpmParameters;

    fn name(&self) -> &'static str {
        NAME
    }

    async fn execute(
        &self,
        job: &Job<KpmParameters>,
        ctx: &RunnerContext,
    ) -> Result<Option<serde_json::Value>, ExecutionError> {
        let params = &job.request;

        let resource = input_network(params.seed_type, params.network, NetworkFormat::Sif)?;
        let network_source = ctx.static_files.ensure_built(resource).await?;

        let workdir = tempfile::tempdir()?;
        let network_file = workdir.path().join("network.sif");
        tokio::fs::copy(&network_source, &network_file).await?;

        // KPM expects a seed matrix: identifier <tab> 1
        let seed_file = workdir.path().join("seeds.mat");
        write_lines(
            &seed_file,
            params.seeds.iter().map(|seed| format!("{}\t1", seed)),
        )
        .await?;

        let command = CommandSpec::new(ctx.dirs.scripts.join("run_kpm.py"))
            .arg("--network_file")
            .arg(network_file.display().to_string())
            .arg("--seed_file")
            .arg(seed_file.display().to_string())
            .arg("--outpath")
            .arg(workdir.path().display().to_string())
            .arg("-k")
            .arg(params.k.to_string());

        let output = ctx.executor.run(&command).await?;
        check_success("KPM", &output)?;

        // The tool prints its results directory on stdout
        let results_dir = std::path::PathBuf::from(output.stdout.trim());
        let mut pathway_file = None;
        let mut entries = tokio::fs::read_dir(&results_dir)
            .await
            .map_err(|e| ExecutionError::Malformed(format!("results directory: {}", e)))?;
        while let Some(entry) = entries.next_entry().await? {
            if entry
                .file_name()
                .to_string_lossy()
                .starts_with("pathways.txt")
            {
                pathway_file = Some(entry.path());
            }
        }
        let pathway_file = pathway_file
            .ok_or_else(|| ExecutionError::Malformed("no pathways.txt in results".into()))?;

        let content = tokio::fs::read_to_string(&pathway_file).await?;
        Ok(Some(parse_pathways(&content)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn k_is_required() {
        let err = normalize(KpmRequest {
            seeds: Some(vec!["2717".to_string()]),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ParameterError::Missing("k")));
    }

    #[test]
    fn parses_pathway_blocks() {
        let content = "1\nNODES\ttrue\n2717\tfalse\n673\ttrue\n2717\tpp\t673\n2\n999\tfalse\n";
        let parsed = parse_pathways(content);

        assert_eq!(parsed["1"]["nodes"]["non-exceptions"][0], "2717");
        assert_eq!(parsed["1"]["nodes"]["exceptions"][0], "673");
        assert_eq!(parsed["1"]["edges"][0][0], "2717");
        assert_eq!(parsed["1"]["edges"][0][1], "673");
        assert_eq!(parsed["2"]["nodes"]["non-exceptions"][0], "999");
    }
}
