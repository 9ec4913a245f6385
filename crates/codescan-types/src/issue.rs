//! Index document types.
//!
//! An [`IssueDoc`] is the denormalized projection of one issue row that the
//! search backend stores. Documents are always rebuilt from current
//! relational state, never patched in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::security::{SecurityCategory, VulnerabilityProbability};

/// Software quality affected by an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoftwareQuality {
    Maintainability,
    Reliability,
    Security,
}

impl std::fmt::Display for SoftwareQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SoftwareQuality::Maintainability => write!(f, "maintainability"),
            SoftwareQuality::Reliability => write!(f, "reliability"),
            SoftwareQuality::Security => write!(f, "security"),
        }
    }
}

/// Severity of an impact on a software quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactSeverity {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for ImpactSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImpactSeverity::High => write!(f, "high"),
            ImpactSeverity::Medium => write!(f, "medium"),
            ImpactSeverity::Low => write!(f, "low"),
        }
    }
}

/// One (software quality, severity) impact pair of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Impact {
    pub software_quality: SoftwareQuality,
    pub severity: ImpactSeverity,
}

impl Impact {
    pub fn new(software_quality: SoftwareQuality, severity: ImpactSeverity) -> Self {
        Self {
            software_quality,
            severity,
        }
    }

    /// Serialize a list of impacts to JSON bytes for row storage.
    pub fn encode_list(impacts: &[Impact]) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(impacts)
    }

    /// Deserialize a list of impacts from JSON bytes.
    pub fn decode_list(bytes: &[u8]) -> Result<Vec<Impact>, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Address of one document in the index: id plus routing key.
///
/// The routing key partitions documents by their owning project and scopes
/// every point delete and bulk delete.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocRef {
    pub id: String,
    pub routing: String,
}

impl DocRef {
    pub fn new(id: impl Into<String>, routing: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            routing: routing.into(),
        }
    }
}

/// A denormalized issue document.
///
/// `project_uuid` doubles as the routing key and is never empty: a row
/// without a computable routing key cannot be written and indicates an
/// upstream data-integrity fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueDoc {
    pub key: String,
    pub component_uuid: String,
    pub project_uuid: String,
    pub branch_uuid: String,
    pub is_main_branch: bool,
    pub rule_key: String,
    pub severity: String,
    pub status: String,
    pub resolution: Option<String>,
    pub language: Option<String>,
    pub line: Option<u32>,
    /// Remediation effort in minutes.
    pub effort: Option<i64>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub cwe: Vec<String>,
    pub owasp_top10: Vec<String>,
    pub owasp_asvs_40: Vec<String>,
    pub sans_top25: Vec<String>,
    pub sq_category: SecurityCategory,
    pub vulnerability_probability: VulnerabilityProbability,
    pub impacts: Vec<Impact>,
}

impl IssueDoc {
    /// The index address of this document.
    pub fn doc_ref(&self) -> DocRef {
        DocRef::new(self.key.clone(), self.project_uuid.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impact_list_roundtrip() {
        let impacts = vec![
            Impact::new(SoftwareQuality::Maintainability, ImpactSeverity::High),
            Impact::new(SoftwareQuality::Security, ImpactSeverity::Low),
        ];
        let bytes = Impact::encode_list(&impacts).unwrap();
        let decoded = Impact::decode_list(&bytes).unwrap();
        assert_eq!(decoded, impacts);
    }

    #[test]
    fn test_impact_decode_rejects_garbage() {
        assert!(Impact::decode_list(b"not json").is_err());
    }

    #[test]
    fn test_quality_display() {
        assert_eq!(SoftwareQuality::Reliability.to_string(), "reliability");
        assert_eq!(ImpactSeverity::Medium.to_string(), "medium");
    }
}
