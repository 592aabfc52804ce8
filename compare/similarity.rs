// ========================================================================================
//
//                     SIMILARITY: HOW MANY SHARED MARKERS AGREE
//
// ========================================================================================

use crate::intersection::CommonView;
use crate::shared::files::compare_names;
use crate::types::{MarkerRecord, MarkerView};
use itertools::Itertools;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// How two calls at the same marker are judged to agree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Metric {
    /// Records are field-for-field equal.
    #[default]
    Identity,
    /// Any allele symbol of one call appears in the other call.
    HalfIdentity,
}

impl Metric {
    pub fn name(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::HalfIdentity => "halfidentity",
        }
    }

    /// Resolves a metric by name. Unknown names fall back to `identity`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "identity" => Self::Identity,
            "halfidentity" => Self::HalfIdentity,
            other => {
                warn!("Unknown similarity metric '{other}', using identity");
                Self::Identity
            }
        }
    }

    pub fn agrees(self, a: &MarkerRecord, b: &MarkerRecord) -> bool {
        match self {
            Self::Identity => a == b,
            Self::HalfIdentity => {
                a == b
                    || a
                        .genotype
                        .chars()
                        .any(|allele| b.genotype.chars().any(|other| other == allele))
            }
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for Metric {
    fn from(value: String) -> Self {
        Self::from_name(&value)
    }
}

impl From<Metric> for String {
    fn from(value: Metric) -> Self {
        value.name().to_string()
    }
}

/// The agreeing markers between two views and their count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimilarityScore<'a> {
    pub count: usize,
    pub agreeing: BTreeSet<&'a str>,
}

/// Compares two views marker by marker. Only ids present in both views are
/// considered, even when the views come from the same intersection.
pub fn score<'a>(a: &MarkerView<'a>, b: &MarkerView<'a>, metric: Metric) -> SimilarityScore<'a> {
    let agreeing: BTreeSet<&'a str> = a
        .iter()
        .filter_map(|(id, record_a)| {
            let record_b = b.get(id)?;
            metric.agrees(record_a, record_b).then_some(*id)
        })
        .collect();

    SimilarityScore {
        count: agreeing.len(),
        agreeing,
    }
}

/// Score of one ordered pair of sources.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairScore {
    pub first: String,
    pub second: String,
    pub score: usize,
}

impl PairScore {
    fn name_order(&self, other: &Self) -> Ordering {
        compare_names(&self.first, &other.first)
            .then_with(|| compare_names(&self.second, &other.second))
    }
}

/// Scores of every ordered pair of distinct sources, sorted by descending
/// score with ties in natural name order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimilarityMatrix {
    metric: Metric,
    pairs: Vec<PairScore>,
}

impl SimilarityMatrix {
    /// Both (a, b) and (b, a) are scored independently.
    pub fn compute(view: &CommonView<'_>, metric: Metric) -> Self {
        let mut pairs: Vec<PairScore> = view
            .iter()
            .permutations(2)
            .map(|pair| {
                let (first, view_a) = pair[0];
                let (second, view_b) = pair[1];
                let similarity = score(view_a, view_b, metric);
                debug!("{metric} score {first} vs {second}: {}", similarity.count);
                PairScore {
                    first: first.to_string(),
                    second: second.to_string(),
                    score: similarity.count,
                }
            })
            .collect();

        pairs.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name_order(b)));
        Self { metric, pairs }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn sorted_pairs(&self) -> &[PairScore] {
        &self.pairs
    }

    pub fn get(&self, first: &str, second: &str) -> Option<usize> {
        self.pairs
            .iter()
            .find(|pair| pair.first == first && pair.second == second)
            .map(|pair| pair.score)
    }

    /// The highest-scoring ordered pair, tracked as a running maximum.
    pub fn best_pair(&self) -> Option<&PairScore> {
        let mut best: Option<&PairScore> = None;
        for candidate in &self.pairs {
            best = match best {
                Some(current)
                    if candidate.score < current.score
                        || (candidate.score == current.score
                            && candidate.name_order(current) != Ordering::Less) =>
                {
                    Some(current)
                }
                _ => Some(candidate),
            };
        }
        best
    }
}
