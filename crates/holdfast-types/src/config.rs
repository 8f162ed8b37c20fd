//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::constants;

/// Tunable limits for the dispute and audit surfaces. The defaults match
/// the platform policy; deployments override via their own config loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum dispute description length, in characters.
    pub min_description_chars: usize,
    /// Maximum evidence URLs per dispute.
    pub max_evidence_urls: usize,
    /// Default audit-log query limit when the caller passes none.
    pub default_audit_limit: usize,
    /// Hard audit-log query limit.
    pub max_audit_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_description_chars: constants::MIN_DISPUTE_DESCRIPTION_CHARS,
            max_evidence_urls: constants::MAX_EVIDENCE_URLS,
            default_audit_limit: constants::DEFAULT_AUDIT_QUERY_LIMIT,
            max_audit_limit: constants::MAX_AUDIT_QUERY_LIMIT,
        }
    }
}
