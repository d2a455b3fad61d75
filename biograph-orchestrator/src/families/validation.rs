//! Statistical validation of modules and drug rankings against permutation
//! baselines.
//!
//! Three submission operations share one family store: `joint` (module and
//! drug list together), `module` (module alone) and `drug` (scored drug
//! ranking alone). The canonical record carries a `validation_type` tag, so
//! the variants deduplicate independently of each other.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::errors::ParameterError;
use crate::domain::job::Job;
use crate::domain::seeds::apply_prefix_and_sort;
use crate::infrastructure::executor::CommandSpec;
use crate::infrastructure::static_files::StaticResource;

use super::{check_success, write_lines, ExecutionError, JobFamily, RunnerContext};

pub const NAME: &str = "validation";

const PERMUTATION_RANGE: std::ops::RangeInclusive<u32> = 1_000..=10_000;

/// Whether a module is given as genes or proteins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleMemberType {
    Gene,
    Protein,
}

impl ModuleMemberType {
    fn parse(value: Option<&str>) -> Result<Self, ParameterError> {
        match value.map(|v| v.to_lowercase()).as_deref() {
            Some("gene") => Ok(Self::Gene),
            Some("protein") => Ok(Self::Protein),
            Some(other) => Err(ParameterError::invalid(
                "module_member_type",
                other,
                "`gene` or `protein`",
            )),
            None => Err(ParameterError::Missing("module_member_type")),
        }
    }

    fn member_prefix(&self) -> &'static str {
        match self {
            Self::Gene => "entrez.",
            Self::Protein => "uniprot.",
        }
    }

    /// The validation network matching the module's identifier namespace.
    fn network_file(&self, static_dir: &Path) -> PathBuf {
        match self {
            Self::Gene => static_dir.join("GGI.gt"),
            Self::Protein => static_dir.join("PPI-concise.gt"),
        }
    }
}

/// Raw `POST /validation/joint` request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct JointValidationRequest {
    /// Genes/proteins in the disease module
    pub module_members: Option<Vec<String>>,
    /// `gene` or `protein`
    pub module_member_type: Option<String>,
    /// Drugs to validate
    pub test_drugs: Option<Vec<String>>,
    /// Drugs indicated to treat the disease
    pub true_drugs: Option<Vec<String>>,
    /// Number of permutations, in [1000, 10000]
    pub permutations: Option<u32>,
    pub only_approved_drugs: Option<bool>,
}

/// Raw `POST /validation/module` request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ModuleValidationRequest {
    pub module_members: Option<Vec<String>>,
    pub module_member_type: Option<String>,
    pub true_drugs: Option<Vec<String>>,
    pub permutations: Option<u32>,
    pub only_approved_drugs: Option<bool>,
}

/// Raw `POST /validation/drug` request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct DrugValidationRequest {
    /// Scored ranking to validate: `(drug, score)` pairs
    #[schema(value_type = Option<Vec<Object>>)]
    pub test_drugs: Option<Vec<(String, f64)>>,
    pub true_drugs: Option<Vec<String>>,
    pub permutations: Option<u32>,
    pub only_approved_drugs: Option<bool>,
}

/// Canonical request, tagged by validation variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "validation_type", rename_all = "lowercase")]
pub enum ValidationParameters {
    Joint {
        module_members: Vec<String>,
        module_member_type: ModuleMemberType,
        test_drugs: Vec<String>,
        true_drugs: Vec<String>,
        permutations: u32,
        only_approved_drugs: Option<bool>,
    },
    Module {
        module_members: Vec<String>,
        module_member_type: ModuleMemberType,
        true_drugs: Vec<String>,
        permutations: u32,
        only_approved_drugs: Option<bool>,
    },
    Drug {
        test_drugs: Vec<(String, f64)>,
        true_drugs: Vec<String>,
        permutations: u32,
        only_approved_drugs: Option<bool>,
    },
}

fn check_permutations(permutations: Option<u32>) -> Result<u32, ParameterError> {
    let permutations = permutations.ok_or(ParameterError::Missing("permutations"))?;
    if !PERMUTATION_RANGE.contains(&permutations) {
        return Err(ParameterError::invalid(
            "permutations",
            permutations.to_string(),
            "a value in [1000, 10000]",
        ));
    }
    Ok(permutations)
}

fn check_nonempty(
    list: Option<Vec<String>>,
    name: &'static str,
) -> Result<Vec<String>, ParameterError> {
    let list = list.unwrap_or_default();
    if list.is_empty() {
        return Err(ParameterError::Missing(name));
    }
    Ok(list)
}

fn module_members(
    members: Option<Vec<String>>,
    member_type: ModuleMemberType,
) -> Result<Vec<String>, ParameterError> {
    let members = check_nonempty(members, "module_members")?;
    Ok(apply_prefix_and_sort(&members, member_type.member_prefix()))
}

/// Validate and canonicalize a joint validation request. Pure.
pub fn normalize_joint(
    request: JointValidationRequest,
) -> Result<ValidationParameters, ParameterError> {
    let test_drugs = check_nonempty(request.test_drugs, "test_drugs")?;
    let true_drugs = check_nonempty(request.true_drugs, "true_drugs")?;
    let permutations = check_permutations(request.permutations)?;
    let module_member_type = ModuleMemberType::parse(request.module_member_type.as_deref())?;

    Ok(ValidationParameters::Joint {
        module_members: module_members(request.module_members, module_member_type)?,
        module_member_type,
        test_drugs: apply_prefix_and_sort(&test_drugs, "drugbank."),
        true_drugs: apply_prefix_and_sort(&true_drugs, "drugbank."),
        permutations,
        only_approved_drugs: request.only_approved_drugs,
    })
}

/// Validate and canonicalize a module-based validation request. Pure.
pub fn normalize_module(
    request: ModuleValidationRequest,
) -> Result<ValidationParameters, ParameterError> {
    let true_drugs = check_nonempty(request.true_drugs, "true_drugs")?;
    let permutations = check_permutations(request.permutations)?;
    let module_member_type = ModuleMemberType::parse(request.module_member_type.as_deref())?;

    Ok(ValidationParameters::Module {
        module_members: module_members(request.module_members, module_member_type)?,
        module_member_type,
        true_drugs: apply_prefix_and_sort(&true_drugs, "drugbank."),
        permutations,
        only_approved_drugs: request.only_approved_drugs,
    })
}

/// Validate and canonicalize a drug-ranking validation request. Pure.
///
/// The scored list is sorted by `(score, drug)` so ranking submissions that
/// differ only in row order deduplicate.
pub fn normalize_drug(
    request: DrugValidationRequest,
) -> Result<ValidationParameters, ParameterError> {
    let mut test_drugs = request.test_drugs.unwrap_or_default();
    if test_drugs.is_empty() {
        return Err(ParameterError::Missing("test_drugs"));
    }
    let true_drugs = check_nonempty(request.true_drugs, "true_drugs")?;
    let permutations = check_permutations(request.permutations)?;

    test_drugs.sort_by(|(drug_a, score_a), (drug_b, score_b)| {
        score_a
            .partial_cmp(score_b)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| drug_a.cmp(drug_b))
    });
    let test_drugs = test_drugs
        .into_iter()
        .map(|(drug, score)| {
            if drug.starts_with("drugbank.") {
                (drug, score)
            } else {
                (format!("drugbank.{}", drug), score)
            }
        })
        .collect();

    Ok(ValidationParameters::Drug {
        test_drugs,
        true_drugs: apply_prefix_and_sort(&true_drugs, "drugbank."),
        permutations,
        only_approved_drugs: request.only_approved_drugs,
    })
}

/// Extract `(label, value)` p-value pairs from validation script output.
fn extract_pvalues(
    content: &str,
    expectations: &[(&str, &str)],
) -> Result<serde_json::Value, ExecutionError> {
    let mut result = serde_json::Map::new();
    for line in content.lines().map(str::trim) {
        for (prefix, label) in expectations {
            if line.starts_with(prefix) {
                let value = line
                    .rsplit(&[':', ' '][..])
                    .next()
                    .and_then(|v| v.trim().parse::<f64>().ok())
                    .ok_or_else(|| {
                        ExecutionError::Malformed(format!("unparseable p-value line: {}", line))
                    })?;
                result.insert(label.to_string(), serde_json::json!(value));
            }
        }
    }
    for (_, label) in expectations {
        if !result.contains_key(*label) {
            return Err(ExecutionError::Malformed(format!(
                "validation output missing {:?}",
                label
            )));
        }
    }
    Ok(serde_json::Value::Object(result))
}

pub struct ValidationFamily;

#[async_trait]
impl JobFamily for ValidationFamily {
    type Request = ValidationParameters;

    fn name(&self) -> &'static str {
        NAME
    }

    async fn execute(
        &self,
        job: &Job<ValidationParameters>,
        ctx: &RunnerContext,
    ) -> Result<Option<serde_json::Value>, ExecutionError> {
        ctx.static_files
            .ensure_built(StaticResource::ValidationNetworks)
            .await?;

        let workdir = tempfile::tempdir()?;
        let outfile = workdir.path().join("validation.out");
        let approved_flag = |only_approved: &Option<bool>| {
            if only_approved.unwrap_or(false) {
                "Y"
            } else {
                "N"
            }
        };
        let script =
            |name: &str| ctx.dirs.scripts.join("validation").join(name).display().to_string();

        let (command, tool, expectations): (_, _, &[(&str, &str)]) = match &job.request {
            ValidationParameters::Joint {
                module_members,
                module_member_type,
                test_drugs,
                true_drugs,
                permutations,
                only_approved_drugs,
            } => {
                let members_file = workdir.path().join("module_members.txt");
                write_lines(&members_file, module_members).await?;
                let test_file = workdir.path().join("test_drugs.txt");
                write_lines(&test_file, test_drugs).await?;
                let true_file = workdir.path().join("true_drugs.txt");
                write_lines(&true_file, true_drugs).await?;

                let command = CommandSpec::new("python")
                    .arg(script("joint_validation.py"))
                    .arg(
                        module_member_type
                            .network_file(&ctx.dirs.static_files)
                            .display()
                            .to_string(),
                    )
                    .arg(members_file.display().to_string())
                    .arg(test_file.display().to_string())
                    .arg(true_file.display().to_string())
                    .arg(permutations.to_string())
                    .arg(approved_flag(only_approved_drugs))
                    .arg(outfile.display().to_string());
                (
                    command,
                    "Joint validation",
                    &[
                        (
                            "The computed empirical p-value (precision-based) for",
                            "empirical (precision-based) p-value",
                        ),
                        ("The computed empirical p-value for", "empirical p-value"),
                    ],
                )
            }
            ValidationParameters::Module {
                module_members,
                module_member_type,
                true_drugs,
                permutations,
                only_approved_drugs,
            } => {
                let members_file = workdir.path().join("module_members.txt");
                write_lines(&members_file, module_members).await?;
                let true_file = workdir.path().join("true_drugs.txt");
                write_lines(&true_file, true_drugs).await?;

                let command = CommandSpec::new("python")
                    .arg(script("module_validation.py"))
                    .arg(
                        module_member_type
                            .network_file(&ctx.dirs.static_files)
                            .display()
                            .to_string(),
                    )
                    .arg(members_file.display().to_string())
                    .arg(true_file.display().to_string())
                    .arg(permutations.to_string())
                    .arg(approved_flag(only_approved_drugs))
                    .arg(outfile.display().to_string());
                (
                    command,
                    "Module validation",
                    &[
                        (
                            "The computed empirical p-value (precision-based) for",
                            "empirical (precision-based) p-value",
                        ),
                        ("The computed empirical p-value for", "empirical p-value"),
                    ],
                )
            }
            ValidationParameters::Drug {
                test_drugs,
                true_drugs,
                permutations,
                only_approved_drugs,
            } => {
                let test_file = workdir.path().join("test_drugs.txt");
                write_lines(
                    &test_file,
                    test_drugs
                        .iter()
                        .map(|(drug, score)| format!("{}\t{}", drug, score)),
                )
                .await?;
                let true_file = workdir.path().join("true_drugs.txt");
                write_lines(&true_file, true_drugs).await?;

                let command = CommandSpec::new("python")
                    .arg(script("drugs_validation.py"))
                    .arg(test_file.display().to_string())
                    .arg(true_file.display().to_string())
                    .arg(permutations.to_string())
                    .arg(approved_flag(only_approved_drugs))
                    .arg(outfile.display().to_string());
                (
                    command,
                    "Drug validation",
                    &[
                        (
                            "The computed empirical p-value based on DCG",
                            "empirical DCG-based p-value",
                        ),
                        (
                            "The computed empirical p-value without considering ranks",
                            "empirical p-value without considering ranks",
                        ),
                    ],
                )
            }
        };

        let output = ctx.executor.run(&command).await?;
        check_success(tool, &output)?;

        let content = tokio::fs::read_to_string(&outfile)
            .await
            .map_err(|e| ExecutionError::Malformed(format!("validation output: {}", e)))?;
        Ok(Some(extract_pvalues(&content, expectations)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joint_request() -> JointValidationRequest {
        JointValidationRequest {
            module_members: Some(vec!["2717".to_string(), "673".to_string()]),
            module_member_type: Some("gene".to_string()),
            test_drugs: Some(vec!["DB00001".to_string()]),
            true_drugs: Some(vec!["drugbank.DB00002".to_string()]),
            permutations: Some(1000),
            only_approved_drugs: None,
        }
    }

    #[test]
    fn joint_applies_namespace_prefixes() {
        let ValidationParameters::Joint {
            module_members,
            test_drugs,
            true_drugs,
            ..
        } = normalize_joint(joint_request()).unwrap()
        else {
            panic!("expected joint variant");
        };
        assert_eq!(module_members, vec!["entrez.2717", "entrez.673"]);
        assert_eq!(test_drugs, vec!["drugbank.DB00001"]);
        assert_eq!(true_drugs, vec!["drugbank.DB00002"]);
    }

    #[test]
    fn permutations_are_bounded() {
        let mut raw = joint_request();
        raw.permutations = Some(999);
        assert!(normalize_joint(raw.clone()).is_err());
        raw.permutations = Some(10_001);
        assert!(normalize_joint(raw).is_err());
    }

    #[test]
    fn member_type_is_validated() {
        let mut raw = joint_request();
        raw.module_member_type = Some("pathway".to_string());
        assert!(matches!(
            normalize_joint(raw).unwrap_err(),
            ParameterError::Invalid { .. }
        ));
    }

    #[test]
    fn drug_ranking_sorts_by_score_then_name() {
        let params = normalize_drug(DrugValidationRequest {
            test_drugs: Some(vec![
                ("DB2".to_string(), 0.9),
                ("DB1".to_string(), 0.9),
                ("DB3".to_string(), 0.1),
            ]),
            true_drugs: Some(vec!["DB4".to_string()]),
            permutations: Some(2000),
            only_approved_drugs: Some(true),
        })
        .unwrap();

        let ValidationParameters::Drug { test_drugs, .. } = params else {
            panic!("expected drug variant");
        };
        assert_eq!(
            test_drugs,
            vec![
                ("drugbank.DB3".to_string(), 0.1),
                ("drugbank.DB1".to_string(), 0.9),
                ("drugbank.DB2".to_string(), 0.9),
            ]
        );
    }

    #[test]
    fn variants_deduplicate_independently() {
        use crate::infrastructure::job_store::canonical_digest;

        let module = normalize_module(ModuleValidationRequest {
            module_members: Some(vec!["2717".to_string()]),
            module_member_type: Some("gene".to_string()),
            true_drugs: Some(vec!["DB00002".to_string()]),
            permutations: Some(1000),
            only_approved_drugs: None,
        })
        .unwrap();
        let joint = normalize_joint(joint_request()).unwrap();

        assert_ne!(
            canonical_digest(&module).unwrap(),
            canonical_digest(&joint).unwrap()
        );
    }

    #[test]
    fn extracts_labelled_pvalues() {
        let content = "\
            some preamble\n\
            The computed empirical p-value for the module is: 0.012\n\
            The computed empirical p-value (precision-based) for the module is: 0.034\n";
        let result = extract_pvalues(
            content,
            &[
                (
                    "The computed empirical p-value (precision-based) for",
                    "empirical (precision-based) p-value",
                ),
                ("The computed empirical p-value for", "empirical p-value"),
            ],
        )
        .unwrap();
        assert_eq!(result["empirical p-value"], 0.012);
        assert_eq!(result["empirical (precision-based) p-value"], 0.034);
    }

    #[test]
    fn missing_pvalue_is_malformed() {
        let err = extract_pvalues("nothing useful", &[("The computed", "p")]).unwrap_err();
        assert!(matches!(err, ExecutionError::Malformed(_)));
    }
}
