//! Seed identifier normalization
//!
//! Seeds arrive as gene or protein identifiers, optionally carrying an
//! `entrez.` / `uniprot.` namespace prefix and in arbitrary case and order.
//! Canonical requests store them uppercased, prefix-stripped, deduplicated
//! and sorted, together with the inferred identifier type, so permutations
//! and prefix variants of one seed list deduplicate to the same job.

use serde::{Deserialize, Serialize};

const GENE_PREFIX: &str = "ENTREZ.";
const PROTEIN_PREFIX: &str = "UNIPROT.";

/// Inferred type of a seed list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedType {
    Gene,
    Protein,
}

impl SeedType {
    /// Namespace prefix used when writing identifiers of this type back out
    /// to network files.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Gene => "entrez.",
            Self::Protein => "uniprot.",
        }
    }
}

/// Normalize a seed list and infer its identifier type.
///
/// Uppercases every entry; a list that is entirely `entrez.`-prefixed or
/// entirely numeric is a gene list, one that is entirely `uniprot.`-prefixed
/// is a protein list, and anything else defaults to proteins. Recognized
/// prefixes are stripped. The result is deduplicated and sorted.
pub fn normalise_seeds(seeds: &[String]) -> (Vec<String>, SeedType) {
    let upper: Vec<String> = seeds.iter().map(|s| s.to_uppercase()).collect();

    let (stripped, seed_type) = if upper.iter().all(|s| s.starts_with(GENE_PREFIX)) {
        (
            upper
                .iter()
                .map(|s| s.trim_start_matches(GENE_PREFIX).to_string())
                .collect(),
            SeedType::Gene,
        )
    } else if upper.iter().all(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())) {
        (upper, SeedType::Gene)
    } else if upper.iter().all(|s| s.starts_with(PROTEIN_PREFIX)) {
        (
            upper
                .iter()
                .map(|s| s.trim_start_matches(PROTEIN_PREFIX).to_string())
                .collect(),
            SeedType::Protein,
        )
    } else {
        (upper, SeedType::Protein)
    };

    let mut sorted: Vec<String> = stripped;
    sorted.sort();
    sorted.dedup();
    (sorted, seed_type)
}

/// Strip a single namespace prefix (case-sensitive, as supplied) and sort.
/// Used by the ranking families, whose seeds are always UniProt accessions.
pub fn strip_prefix_and_sort(seeds: &[String], prefix: &str) -> Vec<String> {
    let mut stripped: Vec<String> = seeds
        .iter()
        .map(|s| s.trim_start_matches(prefix).to_string())
        .collect();
    stripped.sort();
    stripped.dedup();
    stripped
}

/// Prefix every entry that does not already carry `prefix`, deduplicate and
/// sort. Used by the validation family's drug and module-member lists.
pub fn apply_prefix_and_sort(items: &[String], prefix: &str) -> Vec<String> {
    let mut prefixed: Vec<String> = items
        .iter()
        .map(|item| {
            if item.starts_with(prefix) {
                item.clone()
            } else {
                format!("{}{}", prefix, item)
            }
        })
        .collect();
    prefixed.sort();
    prefixed.dedup();
    prefixed
}
