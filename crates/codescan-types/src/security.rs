//! Security-standard taxonomy derived from rule metadata.
//!
//! Rules carry raw standard tags (`cwe:89`, `owaspTop10:a1`,
//! `owaspAsvs-4.0:2.1.1`). Documents expose them split per standard, plus
//! two derived classifications: SANS Top-25 buckets and a closed security
//! category with a fixed vulnerability probability.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Tag stored on rules that declare no standard at all.
pub const UNKNOWN_STANDARD: &str = "unknown";

const CWE_PREFIX: &str = "cwe:";
const OWASP_TOP10_PREFIX: &str = "owaspTop10:";
const OWASP_ASVS_40_PREFIX: &str = "owaspAsvs-4.0:";

/// SANS Top-25 bucket names, derived from fixed CWE sets.
pub const SANS_TOP_25_INSECURE_INTERACTION: &str = "insecure-interaction";
pub const SANS_TOP_25_RISKY_RESOURCE: &str = "risky-resource";
pub const SANS_TOP_25_POROUS_DEFENSES: &str = "porous-defenses";

const INSECURE_INTERACTION_CWES: &[&str] = &["78", "79", "89", "352", "434", "601"];
const RISKY_RESOURCE_CWES: &[&str] = &["22", "120", "131", "134", "190", "494", "676", "829"];
const POROUS_DEFENSES_CWES: &[&str] = &[
    "250", "306", "307", "311", "327", "732", "759", "798", "807", "862", "863",
];

/// Likelihood that an issue of a category is an exploitable vulnerability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VulnerabilityProbability {
    High,
    Medium,
    Low,
}

/// Closed security category of a rule, keyed by its CWEs.
///
/// Categories are matched in declaration order against the rule's CWE set;
/// the first category owning one of the CWEs wins, `Others` is the
/// fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecurityCategory {
    SqlInjection,
    CommandInjection,
    PathTraversalInjection,
    Rce,
    Xss,
    Dos,
    Ssrf,
    Csrf,
    Xxe,
    OpenRedirect,
    WeakCryptography,
    Auth,
    InsecureConf,
    Others,
}

impl SecurityCategory {
    /// All categories in matching priority order, with their CWE sets.
    const CWES_BY_CATEGORY: &'static [(SecurityCategory, &'static [&'static str])] = &[
        (SecurityCategory::SqlInjection, &["89", "564", "943"]),
        (SecurityCategory::CommandInjection, &["77", "78", "88", "214"]),
        (SecurityCategory::PathTraversalInjection, &["22"]),
        (SecurityCategory::Rce, &["94", "95"]),
        (
            SecurityCategory::Xss,
            &["79", "80", "81", "82", "83", "84", "85", "86", "87"],
        ),
        (SecurityCategory::Dos, &["400", "624"]),
        (SecurityCategory::Ssrf, &["918"]),
        (SecurityCategory::Csrf, &["352"]),
        (SecurityCategory::Xxe, &["611", "827"]),
        (SecurityCategory::OpenRedirect, &["601"]),
        (
            SecurityCategory::WeakCryptography,
            &["261", "295", "297", "321", "322", "323", "324", "325", "326", "327", "328", "330"],
        ),
        (
            SecurityCategory::Auth,
            &["259", "262", "263", "308", "521", "522", "549", "620", "640", "798"],
        ),
        (
            SecurityCategory::InsecureConf,
            &["102", "215", "311", "315", "346", "489", "614", "942"],
        ),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityCategory::SqlInjection => "sql-injection",
            SecurityCategory::CommandInjection => "command-injection",
            SecurityCategory::PathTraversalInjection => "path-traversal-injection",
            SecurityCategory::Rce => "rce",
            SecurityCategory::Xss => "xss",
            SecurityCategory::Dos => "dos",
            SecurityCategory::Ssrf => "ssrf",
            SecurityCategory::Csrf => "csrf",
            SecurityCategory::Xxe => "xxe",
            SecurityCategory::OpenRedirect => "open-redirect",
            SecurityCategory::WeakCryptography => "weak-cryptography",
            SecurityCategory::Auth => "auth",
            SecurityCategory::InsecureConf => "insecure-conf",
            SecurityCategory::Others => "others",
        }
    }

    /// Fixed probability associated with the category.
    pub fn vulnerability_probability(&self) -> VulnerabilityProbability {
        match self {
            SecurityCategory::SqlInjection
            | SecurityCategory::CommandInjection
            | SecurityCategory::PathTraversalInjection
            | SecurityCategory::Xss
            | SecurityCategory::Csrf
            | SecurityCategory::Auth => VulnerabilityProbability::High,
            SecurityCategory::Rce
            | SecurityCategory::Dos
            | SecurityCategory::Ssrf
            | SecurityCategory::Xxe
            | SecurityCategory::OpenRedirect
            | SecurityCategory::WeakCryptography => VulnerabilityProbability::Medium,
            SecurityCategory::InsecureConf | SecurityCategory::Others => {
                VulnerabilityProbability::Low
            }
        }
    }

    /// Classify a CWE set: first category in priority order owning one of
    /// the CWEs wins.
    fn from_cwes<'a>(cwes: impl IntoIterator<Item = &'a str> + Clone) -> SecurityCategory {
        for (category, owned) in Self::CWES_BY_CATEGORY {
            if cwes.clone().into_iter().any(|c| owned.contains(&c)) {
                return *category;
            }
        }
        SecurityCategory::Others
    }
}

impl std::fmt::Display for SecurityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw standard tags split per standard, plus derived classifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityStandards {
    pub cwe: Vec<String>,
    pub owasp_top10: Vec<String>,
    pub owasp_asvs_40: Vec<String>,
    pub sans_top25: Vec<String>,
    pub sq_category: SecurityCategory,
    pub vulnerability_probability: VulnerabilityProbability,
}

/// Split a rule's raw standard tags.
///
/// Rules without any CWE are treated as `cwe:unknown`, which maps to
/// `Others` / low probability. Tags with an unrecognized prefix are ignored.
pub fn split_security_standards<'a>(
    raw: impl IntoIterator<Item = &'a str>,
) -> SecurityStandards {
    let mut cwe: BTreeSet<String> = BTreeSet::new();
    let mut owasp_top10: BTreeSet<String> = BTreeSet::new();
    let mut owasp_asvs_40: BTreeSet<String> = BTreeSet::new();

    for tag in raw {
        if let Some(id) = tag.strip_prefix(CWE_PREFIX) {
            cwe.insert(id.to_string());
        } else if let Some(id) = tag.strip_prefix(OWASP_TOP10_PREFIX) {
            owasp_top10.insert(id.to_string());
        } else if let Some(id) = tag.strip_prefix(OWASP_ASVS_40_PREFIX) {
            owasp_asvs_40.insert(id.to_string());
        }
    }

    if cwe.is_empty() {
        cwe.insert(UNKNOWN_STANDARD.to_string());
    }

    let mut sans_top25 = Vec::new();
    let has_any = |set: &[&str]| cwe.iter().any(|c| set.contains(&c.as_str()));
    if has_any(INSECURE_INTERACTION_CWES) {
        sans_top25.push(SANS_TOP_25_INSECURE_INTERACTION.to_string());
    }
    if has_any(RISKY_RESOURCE_CWES) {
        sans_top25.push(SANS_TOP_25_RISKY_RESOURCE.to_string());
    }
    if has_any(POROUS_DEFENSES_CWES) {
        sans_top25.push(SANS_TOP_25_POROUS_DEFENSES.to_string());
    }

    let sq_category = SecurityCategory::from_cwes(cwe.iter().map(|s| s.as_str()));

    SecurityStandards {
        cwe: cwe.into_iter().collect(),
        owasp_top10: owasp_top10.into_iter().collect(),
        owasp_asvs_40: owasp_asvs_40.into_iter().collect(),
        sans_top25,
        sq_category,
        vulnerability_probability: sq_category.vulnerability_probability(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_standards_maps_to_unknown_and_others() {
        let standards = split_security_standards(std::iter::empty::<&str>());
        assert_eq!(standards.cwe, vec![UNKNOWN_STANDARD.to_string()]);
        assert!(standards.owasp_top10.is_empty());
        assert!(standards.sans_top25.is_empty());
        assert_eq!(standards.sq_category, SecurityCategory::Others);
        assert_eq!(
            standards.vulnerability_probability,
            VulnerabilityProbability::Low
        );
    }

    #[test]
    fn test_split_per_prefix() {
        let standards = split_security_standards(
            ["cwe:123", "owaspTop10:a3", "cwe:863", "owaspAsvs-4.0:2.1.1"],
        );
        assert_eq!(standards.cwe, vec!["123".to_string(), "863".to_string()]);
        assert_eq!(standards.owasp_top10, vec!["a3".to_string()]);
        assert_eq!(standards.owasp_asvs_40, vec!["2.1.1".to_string()]);
        assert_eq!(
            standards.sans_top25,
            vec![SANS_TOP_25_POROUS_DEFENSES.to_string()]
        );
    }

    #[test]
    fn test_category_priority_order() {
        // 89 (sql injection) wins over 79 (xss) regardless of input order
        let standards = split_security_standards(["cwe:79", "cwe:89"]);
        assert_eq!(standards.sq_category, SecurityCategory::SqlInjection);
        assert_eq!(
            standards.vulnerability_probability,
            VulnerabilityProbability::High
        );
    }

    #[test]
    fn test_unrecognized_prefix_is_ignored() {
        let standards = split_security_standards(["pciDss-3.2:6.5.1", "cwe:918"]);
        assert_eq!(standards.cwe, vec!["918".to_string()]);
        assert_eq!(standards.sq_category, SecurityCategory::Ssrf);
    }
}
