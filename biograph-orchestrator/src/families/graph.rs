//! Graph builder: customizable GraphML exports of the knowledge graph.
//!
//! Unlike the algorithm families this one wraps the database exporter, but
//! it is the same job shape: a canonical build request deduplicates against
//! previous builds (including the database version, so a data update
//! triggers fresh builds), and the build itself runs as a background job.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use biograph_core::config::{DirectoriesConfig, GraphConfig};

use crate::domain::errors::ParameterError;
use crate::domain::job::Job;
use crate::infrastructure::executor::CommandSpec;

use super::{check_success, ExecutionError, JobFamily, RunnerContext};

pub const NAME: &str = "graphs";

const DEFAULT_NODE_COLLECTIONS: &[&str] = &["disorder", "drug", "gene", "protein"];
const DEFAULT_EDGE_COLLECTIONS: &[&str] = &[
    "disorder_is_subtype_of_disorder",
    "drug_has_indication",
    "drug_has_target",
    "gene_associated_with_disorder",
    "protein_encoded_by_gene",
    "protein_interacts_with_protein",
];
const VALID_PPI_EVIDENCE: &[&str] = &["exp", "ortho", "pred"];
const VALID_TAXIDS: &[i64] = &[9606];
const VALID_DRUG_GROUPS: &[&str] = &[
    "approved",
    "experimental",
    "illicit",
    "investigational",
    "nutraceutical",
    "vet_approved",
    "withdrawn",
];

/// Raw submit request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct BuildRequest {
    /// Node collections to include. Default: `["disorder", "drug", "gene", "protein"]`
    pub nodes: Option<Vec<String>>,
    /// Edge collections to include
    pub edges: Option<Vec<String>>,
    /// PPI evidence types. Default: `["exp"]`
    pub ppi_evidence: Option<Vec<String>>,
    /// Include PPI self-loops. Default: `false`
    pub ppi_self_loops: Option<bool>,
    /// Taxonomy filter for proteins. Default: `[9606]`
    pub taxid: Option<Vec<i64>>,
    /// Drug-group filter. Default: `["approved"]`
    pub drug_groups: Option<Vec<String>>,
    /// Strip node/edge attributes down to identifiers and types. Default: `true`
    pub concise: Option<bool>,
    /// Include OMIM gene-disorder associations. Default: `true`
    pub include_omim: Option<bool>,
    /// Score threshold for DisGeNET gene-disorder associations. Default: `0`
    pub disgenet_threshold: Option<f64>,
    /// Prefer OMIM IDs on disorder nodes. Default: `false`
    pub use_omim_ids: Option<bool>,
    /// Split drugs into biotech/small-molecule subtypes. Default: `false`
    pub split_drug_types: Option<bool>,
}

/// Canonical request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphParameters {
    pub nodes: Vec<String>,
    pub edges: Vec<String>,
    pub ppi_evidence: Vec<String>,
    pub ppi_self_loops: bool,
    pub taxid: Vec<i64>,
    pub drug_groups: Vec<String>,
    pub concise: bool,
    pub include_omim: bool,
    pub disgenet_threshold: f64,
    pub use_omim_ids: bool,
    pub split_drug_types: bool,
    /// Database version the build ran against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

fn check_values<T: PartialEq + std::fmt::Debug + Clone>(
    supplied: &mut Vec<T>,
    valid: &[T],
    parameter: &'static str,
) -> Result<(), ParameterError> {
    let invalid: Vec<&T> = supplied.iter().filter(|v| !valid.contains(v)).collect();
    if !invalid.is_empty() {
        return Err(ParameterError::invalid(
            parameter,
            format!("{:?}", invalid),
            format!("{:?}", valid),
        ));
    }
    supplied.dedup();
    Ok(())
}

fn defaulted(values: Option<Vec<String>>, defaults: &[&str]) -> Vec<String> {
    values.unwrap_or_else(|| defaults.iter().map(|s| s.to_string()).collect())
}

/// Validate a raw build request against the configured vocabulary and
/// produce its canonical form. Pure.
pub fn normalize(
    request: BuildRequest,
    graph: &GraphConfig,
    version: Option<String>,
) -> Result<GraphParameters, ParameterError> {
    let mut nodes = defaulted(request.nodes, DEFAULT_NODE_COLLECTIONS);
    nodes.sort();
    check_values(&mut nodes, &graph.node_collections, "nodes")?;

    let mut edges = defaulted(request.edges, DEFAULT_EDGE_COLLECTIONS);
    edges.sort();
    check_values(&mut edges, &graph.edge_collections, "edges")?;

    let mut ppi_evidence = defaulted(request.ppi_evidence, &["exp"]);
    ppi_evidence.sort();
    let valid_evidence: Vec<String> = VALID_PPI_EVIDENCE.iter().map(|s| s.to_string()).collect();
    check_values(&mut ppi_evidence, &valid_evidence, "ppi_evidence")?;

    let mut taxid = request.taxid.unwrap_or_else(|| vec![9606]);
    taxid.sort_unstable();
    check_values(&mut taxid, VALID_TAXIDS, "taxid")?;

    let mut drug_groups = defaulted(request.drug_groups, &["approved"]);
    drug_groups.sort();
    let valid_groups: Vec<String> = VALID_DRUG_GROUPS.iter().map(|s| s.to_string()).collect();
    check_values(&mut drug_groups, &valid_groups, "drug_groups")?;

    // Out-of-range thresholds are clamped to sentinel values rather than
    // rejected: below range keeps everything, above range keeps nothing.
    let disgenet_threshold = match request.disgenet_threshold {
        None => 0.0,
        Some(t) if t < 0.0 => -1.0,
        Some(t) if t > 1.0 => 2.0,
        Some(t) => t,
    };

    Ok(GraphParameters {
        nodes,
        edges,
        ppi_evidence,
        ppi_self_loops: request.ppi_self_loops.unwrap_or(false),
        taxid,
        drug_groups,
        concise: request.concise.unwrap_or(true),
        include_omim: request.include_omim.unwrap_or(true),
        disgenet_threshold,
        use_omim_ids: request.use_omim_ids.unwrap_or(false),
        split_drug_types: request.split_drug_types.unwrap_or(false),
        version,
    })
}

/// GraphML artifact served by the download route.
pub fn artifact_path(dirs: &DirectoriesConfig, uid: Uuid) -> PathBuf {
    dirs.family_dir(NAME).join(format!("{}.graphml", uid))
}

pub struct GraphFamily;

#[async_trait]
impl JobFamily for GraphFamily {
    type Request = GraphParameters;

    fn name(&self) -> &'static str {
        NAME
    }

    async fn execute(
        &self,
        job: &Job<GraphParameters>,
        ctx: &RunnerContext,
    ) -> Result<Option<serde_json::Value>, ExecutionError> {
        let workdir = tempfile::tempdir()?;

        // The exporter takes the canonical build request as a JSON file
        let spec_file = workdir.path().join("build.json");
        let spec = serde_json::to_string(&job.request)
            .map_err(|e| ExecutionError::Malformed(format!("build request: {}", e)))?;
        tokio::fs::write(&spec_file, spec).await?;

        let outfile = artifact_path(&ctx.dirs, job.uid);
        if let Some(parent) = outfile.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let command = CommandSpec::new(ctx.dirs.scripts.join("build_graph.py"))
            .arg("--specification")
            .arg(spec_file.display().to_string())
            .arg("--outfile")
            .arg(outfile.display().to_string());

        let output = ctx.executor.run(&command).await?;
        check_success("Graph builder", &output)?;

        Ok(None)
    }
}
