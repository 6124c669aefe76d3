use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::steps::{
  CLAIM_SCRUBBING, CLAIM_SUBMISSION, CLINICAL_DOC, ELIGIBILITY, MEDICAL_CODING, PRIOR_AUTH,
};

/// A named workflow preset.
///
/// Presets are pure configuration: each one maps to a fixed, ordered list of
/// step names. The tag strings are the values callers send as `workflow_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
  EligibilityOnly,
  ClinicalDocOnly,
  PriorAuthOnly,
  PreAuthClinicalDoc,
  Full,
}

/// The workflow type tag did not match any preset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown workflow type: {0}")]
pub struct UnknownWorkflowType(pub String);

impl WorkflowType {
  /// Every preset, in the order they are listed to users.
  pub const ALL: [WorkflowType; 5] = [
    WorkflowType::EligibilityOnly,
    WorkflowType::ClinicalDocOnly,
    WorkflowType::PriorAuthOnly,
    WorkflowType::PreAuthClinicalDoc,
    WorkflowType::Full,
  ];

  /// The tag used on the wire and in Pipeline State.
  pub fn as_str(&self) -> &'static str {
    match self {
      WorkflowType::EligibilityOnly => "eligibility_only",
      WorkflowType::ClinicalDocOnly => "clinical_doc_only",
      WorkflowType::PriorAuthOnly => "prior_auth_only",
      WorkflowType::PreAuthClinicalDoc => "pre_auth_clinical_doc",
      WorkflowType::Full => "full",
    }
  }

  /// The fixed step list for this preset.
  pub fn steps(&self) -> &'static [&'static str] {
    match self {
      WorkflowType::EligibilityOnly => &[ELIGIBILITY],
      WorkflowType::ClinicalDocOnly => &[CLINICAL_DOC],
      WorkflowType::PriorAuthOnly => &[PRIOR_AUTH],
      WorkflowType::PreAuthClinicalDoc => &[ELIGIBILITY, PRIOR_AUTH, CLINICAL_DOC],
      WorkflowType::Full => &[
        ELIGIBILITY,
        PRIOR_AUTH,
        CLINICAL_DOC,
        MEDICAL_CODING,
        CLAIM_SCRUBBING,
        CLAIM_SUBMISSION,
      ],
    }
  }

  /// The step list as owned strings, ready to hand to the workflow builder.
  pub fn step_names(&self) -> Vec<String> {
    self.steps().iter().map(|s| s.to_string()).collect()
  }
}

impl FromStr for WorkflowType {
  type Err = UnknownWorkflowType;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    WorkflowType::ALL
      .into_iter()
      .find(|preset| preset.as_str() == s)
      .ok_or_else(|| UnknownWorkflowType(s.to_string()))
  }
}

impl fmt::Display for WorkflowType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
