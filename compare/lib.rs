#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod cluster;
pub mod collection;
pub mod config;
pub mod export;
pub mod intersection;
pub mod progress;
pub mod query;
pub mod similarity;
pub mod store;
pub mod types;
#[path = "../shared/files.rs"]
pub mod shared_files;
pub mod shared {
    pub use super::shared_files as files;
}

pub use cluster::{ClusterError, ClusterNode, Leaf, build_phylogeny};
pub use collection::{CollectionError, DatasetCollection};
pub use intersection::{CommonView, IntersectionIndex};
pub use similarity::{Metric, SimilarityMatrix, SimilarityScore, score};
pub use store::{GenotypeStore, LoadOptions, StoreError};
pub use types::{CallLookup, MarkerRecord};
