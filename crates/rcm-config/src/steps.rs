//! Canonical step names.
//!
//! Each name doubles as the Pipeline State key that holds the step's output.

pub const ELIGIBILITY: &str = "eligibility";
pub const PRIOR_AUTH: &str = "prior_auth";
pub const CLINICAL_DOC: &str = "clinical_doc";
pub const MEDICAL_CODING: &str = "medical_coding";
pub const CLAIM_SCRUBBING: &str = "claim_scrubbing";
pub const CLAIM_SUBMISSION: &str = "claim_submission";

/// Every known step, in full-pipeline order.
pub const ALL_STEPS: [&str; 6] = [
  ELIGIBILITY,
  PRIOR_AUTH,
  CLINICAL_DOC,
  MEDICAL_CODING,
  CLAIM_SCRUBBING,
  CLAIM_SUBMISSION,
];

/// Check whether a name is one of the known steps.
pub fn is_known(name: &str) -> bool {
  ALL_STEPS.contains(&name)
}
