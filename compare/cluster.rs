// ========================================================================================
//
//                 CLUSTER BUILDER: GREEDY SIMILARITY-ORDERED JOIN TREE
//
// ========================================================================================
//
// The tree is a heuristic, not an inferred phylogeny. Every ordered pair of sources is
// scored over the shared markers, the pairs are walked from most to least similar, and
// each source is attached the first time it appears as the leading member of a pair.
// The result is a left-deepening chain, rebuilt as a left-nested pairwise tree.

use crate::collection::DatasetCollection;
use crate::intersection::{CommonView, IntersectionIndex};
use crate::similarity::{Metric, SimilarityMatrix};
use crate::types::CallLookup;
use ahash::AHashSet;
use log::info;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("clustering needs at least 2 sources, but {found} were loaded")]
    InsufficientData { found: usize },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Leaf {
    pub source: String,
    /// The call at the annotation marker, when one was requested.
    pub call: Option<CallLookup>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClusterNode {
    Leaf(Leaf),
    Join(Box<ClusterNode>, Box<ClusterNode>),
}

impl ClusterNode {
    pub fn leaf(source: impl Into<String>) -> Self {
        Self::Leaf(Leaf {
            source: source.into(),
            call: None,
        })
    }

    pub fn join(left: ClusterNode, right: ClusterNode) -> Self {
        Self::Join(Box::new(left), Box::new(right))
    }

    /// Left-nests `sources`: the first two form a pair and each later source is
    /// paired with the running node. A single source is returned as a leaf.
    pub fn make_tree<S: Into<String>>(sources: impl IntoIterator<Item = S>) -> Option<Self> {
        let mut sources = sources.into_iter();
        let first = Self::leaf(sources.next()?);
        Some(sources.fold(first, |tree, source| Self::join(tree, Self::leaf(source))))
    }

    pub fn leaves(&self) -> Vec<&Leaf> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a Leaf>) {
        match self {
            Self::Leaf(leaf) => leaves.push(leaf),
            Self::Join(left, right) => {
                left.collect_leaves(leaves);
                right.collect_leaves(leaves);
            }
        }
    }

    /// Source names in left-to-right leaf order.
    pub fn flatten(&self) -> Vec<&str> {
        self.leaves()
            .into_iter()
            .map(|leaf| leaf.source.as_str())
            .collect()
    }

    /// Replaces every leaf's call with the call `marker_id` has in that leaf's
    /// full store. Markers missing from a store become `NotAvailable`.
    pub fn annotate(self, collection: &DatasetCollection, marker_id: &str) -> Self {
        match self {
            Self::Leaf(leaf) => {
                let record = collection
                    .store(&leaf.source)
                    .and_then(|store| store.get(marker_id));
                Self::Leaf(Leaf {
                    call: Some(CallLookup::from_record(record)),
                    source: leaf.source,
                })
            }
            Self::Join(left, right) => Self::join(
                left.annotate(collection, marker_id),
                right.annotate(collection, marker_id),
            ),
        }
    }
}

impl fmt::Display for ClusterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(Leaf { source, call: None }) => write!(f, "{source}"),
            Self::Leaf(Leaf {
                source,
                call: Some(call),
            }) => write!(f, "{source}[{call}]"),
            Self::Join(left, right) => write!(f, "({left}, {right})"),
        }
    }
}

/// Walks the sorted pairs once. The best pair seeds the chain; afterwards a pair
/// contributes its leading source only if that source is not yet in the chain.
pub fn greedy_join(matrix: &SimilarityMatrix) -> Option<ClusterNode> {
    let mut pairs = matrix.sorted_pairs().iter();
    let seed = pairs.next()?;

    let mut used: AHashSet<&str> = AHashSet::new();
    used.insert(seed.first.as_str());
    used.insert(seed.second.as_str());
    let mut tree = ClusterNode::join(
        ClusterNode::leaf(seed.first.as_str()),
        ClusterNode::leaf(seed.second.as_str()),
    );

    for pair in pairs {
        if used.insert(pair.first.as_str()) {
            tree = ClusterNode::join(tree, ClusterNode::leaf(pair.first.as_str()));
        }
    }
    Some(tree)
}

/// Builds the similarity-ordered join tree of a collection. `view` is computed
/// from the collection when not supplied. With `marker_id`, each leaf carries
/// that marker's call from its unfiltered store.
pub fn build_phylogeny(
    collection: &DatasetCollection,
    view: Option<&CommonView<'_>>,
    metric: Metric,
    marker_id: Option<&str>,
) -> Result<ClusterNode, ClusterError> {
    let insufficient = || ClusterError::InsufficientData {
        found: collection.len(),
    };
    if collection.len() < 2 {
        return Err(insufficient());
    }

    let computed;
    let view = match view {
        Some(view) => view,
        None => {
            computed = IntersectionIndex::compute(collection).filtered_view(collection);
            &computed
        }
    };

    let matrix = SimilarityMatrix::compute(view, metric);
    let chain = greedy_join(&matrix).ok_or_else(insufficient)?;
    let tree = ClusterNode::make_tree(chain.flatten()).ok_or_else(insufficient)?;
    info!("Built {metric} phylogeny over {} sources: {tree}", collection.len());

    Ok(match marker_id {
        Some(marker_id) => tree.annotate(collection, marker_id),
        None => tree,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::GenotypeStore;
    use crate::types::MarkerRecord;

    fn store(name: &str, calls: &[(&str, &str)]) -> GenotypeStore {
        GenotypeStore::from_records(
            name,
            calls
                .iter()
                .map(|(id, call)| (id.to_string(), MarkerRecord::new("1", 42, *call))),
        )
    }

    fn collection(stores: Vec<GenotypeStore>) -> DatasetCollection {
        DatasetCollection::from_stores(stores).unwrap()
    }

    #[test]
    fn single_source_cannot_be_clustered() {
        let solo = collection(vec![store("solo", &[("rs1", "AA")])]);
        let err = build_phylogeny(&solo, None, Metric::Identity, None).unwrap_err();
        assert!(matches!(err, ClusterError::InsufficientData { found: 1 }));
    }

    #[test]
    fn two_sources_form_a_single_pair() {
        let pair = collection(vec![
            store("a", &[("rs1", "AA")]),
            store("b", &[("rs1", "AA")]),
        ]);
        let tree = build_phylogeny(&pair, None, Metric::Identity, None).unwrap();
        assert_eq!(
            tree,
            ClusterNode::join(ClusterNode::leaf("a"), ClusterNode::leaf("b"))
        );
        assert_eq!(tree.to_string(), "(a, b)");
    }

    fn family() -> DatasetCollection {
        collection(vec![
            store("x", &[("rs1", "AA"), ("rs2", "AG"), ("rs3", "CT"), ("x_only", "GG")]),
            store("y", &[("rs1", "AA"), ("rs2", "GG"), ("rs3", "CT")]),
            store("z", &[("rs1", "AG"), ("rs2", "AG"), ("rs3", "TT")]),
            store("w", &[("rs1", "TT"), ("rs2", "CC"), ("rs3", "GG")]),
        ])
    }

    #[test]
    fn most_similar_pair_seeds_a_left_deepening_chain() {
        let data = family();
        let tree = build_phylogeny(&data, None, Metric::Identity, None).unwrap();
        // x~y share 2 calls; then x~z share 1; w shares nothing.
        assert_eq!(tree.to_string(), "(((x, y), z), w)");
        assert_eq!(tree.flatten(), vec!["x", "y", "z", "w"]);
    }

    #[test]
    fn supplied_view_gives_the_same_tree() {
        let data = family();
        let index = IntersectionIndex::compute(&data);
        let view = index.filtered_view(&data);
        assert_eq!(
            build_phylogeny(&data, Some(&view), Metric::Identity, None).unwrap(),
            build_phylogeny(&data, None, Metric::Identity, None).unwrap()
        );
    }

    #[test]
    fn leaves_are_annotated_from_unfiltered_stores() {
        let data = family();
        let tree = build_phylogeny(&data, None, Metric::Identity, Some("x_only")).unwrap();
        let calls: Vec<_> = tree
            .leaves()
            .into_iter()
            .map(|leaf| (leaf.source.as_str(), leaf.call.clone()))
            .collect();
        assert_eq!(
            calls,
            vec![
                ("x", Some(CallLookup::Called("GG".into()))),
                ("y", Some(CallLookup::NotAvailable)),
                ("z", Some(CallLookup::NotAvailable)),
                ("w", Some(CallLookup::NotAvailable)),
            ]
        );
        assert_eq!(tree.to_string(), "(((x[GG], y[N/A]), z[N/A]), w[N/A])");
    }

    #[test]
    fn make_tree_left_nests() {
        assert_eq!(ClusterNode::make_tree(Vec::<String>::new()), None);
        assert_eq!(ClusterNode::make_tree(["a"]), Some(ClusterNode::leaf("a")));
        let tree = ClusterNode::make_tree(["a", "b", "c"]).unwrap();
        assert_eq!(
            tree,
            ClusterNode::join(
                ClusterNode::join(ClusterNode::leaf("a"), ClusterNode::leaf("b")),
                ClusterNode::leaf("c")
            )
        );
    }
}
