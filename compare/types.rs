// ========================================================================================
//                             High-Level Data Contracts
// ========================================================================================

// Types shared between the engine modules. Types used by a single module live there.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One parsed line of a call file, keyed elsewhere by its marker id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerRecord {
    pub chromosome: String,
    pub position: u64,
    pub genotype: String,
}

impl MarkerRecord {
    pub fn new(chromosome: impl Into<String>, position: u64, genotype: impl Into<String>) -> Self {
        Self {
            chromosome: chromosome.into(),
            position,
            genotype: genotype.into(),
        }
    }

    /// True when this record sits on `chromosome`, compared after normalization.
    pub fn on_chromosome(&self, chromosome: &str) -> bool {
        normalize_chromosome(&self.chromosome) == normalize_chromosome(chromosome)
    }
}

/// The intersection-restricted records of one source, borrowed from its store.
pub type MarkerView<'a> = AHashMap<&'a str, &'a MarkerRecord>;

/// The outcome of looking a marker up in one source. A missing marker is
/// informative output, not a failure.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallLookup {
    Called(String),
    NotAvailable,
}

impl CallLookup {
    pub const NOT_AVAILABLE_LABEL: &'static str = "N/A";

    pub fn from_record(record: Option<&MarkerRecord>) -> Self {
        match record {
            Some(record) => Self::Called(record.genotype.clone()),
            None => Self::NotAvailable,
        }
    }

    pub fn genotype(&self) -> Option<&str> {
        match self {
            Self::Called(genotype) => Some(genotype),
            Self::NotAvailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Called(_))
    }
}

impl fmt::Display for CallLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Called(genotype) => f.write_str(genotype),
            Self::NotAvailable => f.write_str(Self::NOT_AVAILABLE_LABEL),
        }
    }
}

/// Strips an optional `chr` prefix and upper-cases the label, so `chrx` and `X`
/// name the same chromosome.
pub fn normalize_chromosome(chromosome: &str) -> String {
    let mut trimmed = chromosome.trim();
    if trimmed.len() >= 3 && trimmed.is_char_boundary(3) && trimmed[..3].eq_ignore_ascii_case("chr")
    {
        trimmed = &trimmed[3..];
    }
    trimmed.to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_chromosome_supports_common_variants() {
        assert_eq!(normalize_chromosome("1"), "1");
        assert_eq!(normalize_chromosome("chr2"), "2");
        assert_eq!(normalize_chromosome("ChrX"), "X");
        assert_eq!(normalize_chromosome(" mt "), "MT");
    }

    #[test]
    fn call_lookup_displays_sentinel() {
        let record = MarkerRecord::new("1", 10, "AG");
        assert_eq!(CallLookup::from_record(Some(&record)).to_string(), "AG");
        assert_eq!(CallLookup::from_record(None).to_string(), "N/A");
        assert!(!CallLookup::NotAvailable.is_available());
        assert_eq!(CallLookup::Called("TT".into()).genotype(), Some("TT"));
    }

    #[test]
    fn records_match_chromosome_after_normalization() {
        let record = MarkerRecord::new("chrX", 5, "A");
        assert!(record.on_chromosome("x"));
        assert!(!record.on_chromosome("Y"));
    }
}
