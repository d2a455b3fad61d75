//! DIAMOnD: disease-module detection by iterative connectivity significance.
//!
//! Runs against a gene-gene or protein-protein input network, expanding the
//! seed set by `n` nodes. The result records the ranked module nodes, the
//! module edges (scope controlled by the `edges` mode) and which seeds were
//! present in the network at all.

use std::collections::BTreeSet;
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
    check_success, edge_list, input_network, sorted_pair, tsv_records, write_lines,
    ExecutionError, JobFamily, NetworkChoice, NetworkFormat, RunnerContext,
};

pub const NAME: &str = "diamond";

/// Which module edges to return: every edge between module nodes, or only
/// edges linking new nodes back to seeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeMode {
    All,
    Limited,
}

/// Raw submit request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct DiamondRequest {
    /// Seed genes/proteins. Entrez gene IDs or UniProt accessions,
    /// optionally namespace-prefixed.
    pub seeds: Option<Vec<String>>,
    /// Number of nodes at which to stop the algorithm
    pub n: Option<u32>,
    /// Weight given to seeds. Default: `1`
    pub alpha: Option<u32>,
    /// Graph-derived network to run against. Default: `DEFAULT`
    pub network: Option<String>,
    /// `all` or `limited`. Default: `all`
    pub edges: Option<String>,
}

/// Canonical request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiamondParameters {
    pub seeds: Vec<String>,
    pub seed_type: SeedType,
    pub n: u32,
    pub alpha: u32,
    pub network: NetworkChoice,
    pub edges: EdgeMode,
}

/// Validate a raw request and produce its canonical form. Pure.
pub fn normalize(request: DiamondRequest) -> Result<DiamondParameters, ParameterError> {
    let raw_seeds = request.seeds.unwrap_or_default();
    if raw_seeds.is_empty() {
        return Err(ParameterError::Missing("seeds"));
    }
    let n = request.n.ok_or(ParameterError::Missing("n"))?;

    let (seeds, seed_type) = normalise_seeds(&raw_seeds);
    let network = NetworkChoice::parse(request.network.as_deref())?;
    let edges = match request.edges.as_deref() {
        None | Some("all") => EdgeMode::All,
        Some("limited") => EdgeMode::Limited,
        Some(other) => {
            return Err(ParameterError::invalid("edges", other, "`all` or `limited`"));
        }
    };

    Ok(DiamondParameters {
        seeds,
        seed_type,
        n,
        alpha: request.alpha.unwrap_or(1),
        network,
        edges,
    })
}

/// Ranked-node artifact served by the download route.
pub fn artifact_path(dirs: &DirectoriesConfig, uid: Uuid) -> PathBuf {
    dirs.family_dir(NAME).join(format!("{}.txt", uid))
}

pub struct DiamondFamily;

#[async_trait]
impl JobFamily for DiamondFamily {
    type Request = DiamondParameters;

    fn name(&self) -> &'static str {
        NAME
    }

    async fn execute(
        &self,
        job: &Job<DiamondParameters>,
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

        let results_file = workdir.path().join("results.txt");
        let command = CommandSpec::new(ctx.dirs.scripts.join("run_diamond.py"))
            .arg("--network_file")
            .arg(network_file.display().to_string())
            .arg("--seed_file")
            .arg(seed_file.display().to_string())
            .arg("-n")
            .arg(params.n.to_string())
            .arg("--alpha")
            .arg(params.alpha.to_string())
            .arg("-o")
            .arg(results_file.display().to_string());

        let output = ctx.executor.run(&command).await?;
        check_success("DIAMOnD", &output)?;

        let ranked = tokio::fs::read_to_string(&results_file)
            .await
            .map_err(|e| ExecutionError::Malformed(format!("results.txt: {}", e)))?;
        let network_content = tokio::fs::read_to_string(&network_file).await?;

        let result = build_result(params, &ranked, &network_content);

        let dest = artifact_path(&ctx.dirs, job.uid);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&results_file, &dest).await?;

        Ok(Some(result))
    }
}

/// Assemble the result payload from the ranked-node output and the input
/// network. Pure, for testability.
fn build_result(
    params: &DiamondParameters,
    ranked: &str,
    network_content: &str,
) -> serde_json::Value {
    let mut nodes = Vec::new();
    let mut node_ids: BTreeSet<String> = BTreeSet::new();

    for mut record in tsv_records(ranked) {
        if let Some(rank) = record.remove("#rank") {
            record.insert("rank".to_string(), rank);
        }
        if let Some(serde_json::Value::String(node)) = record.get("DIAMOnD_node") {
            node_ids.insert(node.clone());
        }
        nodes.push(serde_json::Value::Object(record));
    }

    let seeds: BTreeSet<String> = params.seeds.iter().cloned().collect();
    let possible_edges: BTreeSet<(String, String)> = match params.edges {
        EdgeMode::All => {
            let module_nodes: Vec<&String> = node_ids.union(&seeds).collect();
            let mut pairs = BTreeSet::new();
            for (i, a) in module_nodes.iter().enumerate() {
                for b in module_nodes.iter().skip(i + 1) {
                    pairs.insert(sorted_pair(a.as_str(), b.as_str()));
                }
            }
            pairs
        }
        EdgeMode::Limited => node_ids
            .iter()
            .flat_map(|node| seeds.iter().map(move |seed| sorted_pair(node, seed)))
            .collect(),
    };

    let mut edges: BTreeSet<(String, String)> = BTreeSet::new();
    let mut seeds_in_network: BTreeSet<String> = BTreeSet::new();
    for (a, b) in edge_list(network_content) {
        let pair = sorted_pair(&a, &b);
        if possible_edges.contains(&pair) {
            edges.insert(pair.clone());
        }
        for node in [&pair.0, &pair.1] {
            if seeds.contains(node.as_str()) {
                seeds_in_network.insert(node.clone());
            }
        }
    }

    serde_json::json!({
        "diamond_nodes": nodes,
        "edges": edges.into_iter().map(|(a, b)| vec![a, b]).collect::<Vec<_>>(),
        "seeds_in_network": seeds_in_network,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(seeds: &[&str]) -> DiamondRequest {
        DiamondRequest {
            seeds: Some(seeds.iter().map(|s| s.to_string()).collect()),
            n: Some(10),
            ..Default::default()
        }
    }

    #[test]
    fn rejects_missing_seeds() {
        let err = normalize(DiamondRequest {
            n: Some(10),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ParameterError::Missing("seeds")));
    }

    #[test]
    fn rejects_missing_n() {
        let err = normalize(DiamondRequest {
            seeds: Some(vec!["2717".to_string()]),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ParameterError::Missing("n")));
    }

    #[test]
    fn rejects_unknown_edge_mode() {
        let mut raw = request(&["2717"]);
        raw.edges = Some("some".to_string());
        assert!(normalize(raw).is_err());
    }

    #[test]
    fn applies_documented_defaults() {
        let params = normalize(request(&["2717", "673"])).unwrap();
        assert_eq!(params.alpha, 1);
        assert_eq!(params.network, NetworkChoice::Default);
        assert_eq!(params.edges, EdgeMode::All);
        assert_eq!(params.seed_type, SeedType::Gene);
    }

    #[test]
    fn seed_order_does_not_change_the_canonical_form() {
        let a = normalize(request(&["2717", "673"])).unwrap();
        let b = normalize(request(&["673", "2717"])).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn explicit_defaults_equal_omitted_defaults() {
        let mut explicit = request(&["2717"]);
        explicit.alpha = Some(1);
        explicit.network = Some("DEFAULT".to_string());
        explicit.edges = Some("all".to_string());
        assert_eq!(
            normalize(explicit).unwrap(),
            normalize(request(&["2717"])).unwrap()
        );
    }

    #[test]
    fn result_includes_renamed_rank_and_limited_edges() {
        let params = DiamondParameters {
            seeds: vec!["673".to_string()],
            seed_type: SeedType::Gene,
            n: 2,
            alpha: 1,
            network: NetworkChoice::Default,
            edges: EdgeMode::Limited,
        };
        let ranked = "#rank\tDIAMOnD_node\tp_hyper\n1\t2717\t0.001\n";
        let network = "673\t2717\n2717\t999\n";

        let result = build_result(&params, ranked, network);
        assert_eq!(result["diamond_nodes"][0]["rank"], "1");
        assert_eq!(result["seeds_in_network"][0], "673");
        assert_eq!(result["edges"][0][0], "2717");
        assert_eq!(result["edges"][0][1], "673");
    }

    #[test]
    fn all_mode_includes_edges_between_new_nodes() {
        let params = DiamondParameters {
            seeds: vec!["673".to_string()],
            seed_type: SeedType::Gene,
            n: 2,
            alpha: 1,
            network: NetworkChoice::Default,
            edges: EdgeMode::All,
        };
        let ranked = "#rank\tDIAMOnD_node\n1\t2717\n2\t999\n";
        let network = "2717\t999\n673\t111\n";

        let result = build_result(&params, ranked, network);
        let edges = result["edges"].as_array().unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0][0], "2717");
        assert_eq!(edges[0][1], "999");
    }
}
