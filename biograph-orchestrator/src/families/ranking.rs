//! Shared logic for the drug-ranking families (TrustRank, Closeness).
//!
//! Both rank candidate drugs against protein seeds on the merged
//! protein-protein-drug network and share the same output conventions: a
//! score-ordered TSV with `drug_name` and `score` columns, a top-N cut that
//! keeps score ties, and drug-seed edges looked up in the ranking network's
//! edge list.

use std::collections::BTreeSet;
use std::path::Path;

use super::{edge_list, sorted_pair, tsv_records, ExecutionError};

/// Take the top `n` ranked drugs, stopping early at a zero score and
/// extending past `n` while drugs tie with the lowest kept score.
pub(crate) fn top_ranked_drugs(
    content: &str,
    n: u32,
) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, ExecutionError> {
    let records = tsv_records(content);
    let mut keep = Vec::new();

    let mut rows = records.into_iter();
    for _ in 0..n {
        let Some(record) = rows.next() else {
            break;
        };
        if score_of(&record)? == 0.0 {
            break;
        }
        keep.push(record);
    }

    if let Some(last) = keep.last() {
        let lowest = last["score"].clone();
        if score_of(last)? != 0.0 {
            for record in rows {
                if record.get("score") != Some(&lowest) {
                    break;
                }
                keep.push(record);
            }
        }
    }

    Ok(keep)
}

fn score_of(
    record: &serde_json::Map<String, serde_json::Value>,
) -> Result<f64, ExecutionError> {
    record
        .get("score")
        .and_then(|score| score.as_str())
        .and_then(|score| score.parse::<f64>().ok())
        .ok_or_else(|| ExecutionError::Malformed("ranking output row without a numeric score".into()))
}

/// Edges between candidate drugs and (prefixed) seeds, looked up in the
/// ranking network's edge list.
pub(crate) async fn drug_seed_edges(
    edges_file: &Path,
    drugs: &[serde_json::Map<String, serde_json::Value>],
    prefixed_seeds: &[String],
) -> Result<Vec<Vec<String>>, ExecutionError> {
    let content = tokio::fs::read_to_string(edges_file)
        .await
        .map_err(|e| ExecutionError::Malformed(format!("ranking edge list: {}", e)))?;

    let network: BTreeSet<(String, String)> = edge_list(&content)
        .into_iter()
        .map(|(a, b)| sorted_pair(&a, &b))
        .collect();

    let drug_ids: BTreeSet<&str> = drugs
        .iter()
        .filter_map(|record| record.get("drug_name").and_then(|name| name.as_str()))
        .collect();

    let mut edges = Vec::new();
    for drug in &drug_ids {
        for seed in prefixed_seeds {
            if network.contains(&sorted_pair(drug, seed)) {
                edges.push(vec![drug.to_string(), seed.clone()]);
            }
        }
    }
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RANKING: &str = "drug_name\tscore\n\
        drugbank.DB01\t0.9\n\
        drugbank.DB02\t0.5\n\
        drugbank.DB03\t0.5\n\
        drugbank.DB04\t0.5\n\
        drugbank.DB05\t0.1\n";

    #[test]
    fn top_n_extends_through_ties() {
        let kept = top_ranked_drugs(RANKING, 2).unwrap();
        let names: Vec<_> = kept
            .iter()
            .map(|r| r["drug_name"].as_str().unwrap().to_string())
            .collect();
        // N = 2 lands on a 0.5 score shared by two more drugs
        assert_eq!(
            names,
            vec!["drugbank.DB01", "drugbank.DB02", "drugbank.DB03", "drugbank.DB04"]
        );
    }

    #[test]
    fn zero_scores_cut_the_list() {
        let kept = top_ranked_drugs("drug_name\tscore\nDB01\t0.4\nDB02\t0\nDB03\t0\n", 3).unwrap();
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn missing_score_column_is_malformed() {
        assert!(top_ranked_drugs("drug_name\nDB01\n", 1).is_err());
    }
}
