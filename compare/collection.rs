// ========================================================================================
//
//                  DATASET COLLECTION: EVERY LOADED SOURCE, RANKED BY SIZE
//
// ========================================================================================

use crate::progress::{LoadProgress, LoadStage, NoopLoadProgress};
use crate::shared::files::compare_names;
use crate::store::{GenotypeStore, LoadOptions, StoreError};
use ahash::AHashSet;
use log::{info, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("no input sources were provided")]
    EmptyInput,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One `GenotypeStore` per source, keyed by source name, plus the size ranking
/// derived once at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetCollection {
    stores: BTreeMap<String, GenotypeStore>,
    marker_counts: BTreeMap<String, usize>,
    /// Descending marker count, ties by natural name order. Never empty.
    ranked_by_size: Vec<(String, usize)>,
}

impl DatasetCollection {
    /// Loads every path as one source. The source name is the path as given.
    pub fn build<P: AsRef<Path> + Sync>(
        paths: &[P],
        options: &LoadOptions,
    ) -> Result<Self, CollectionError> {
        Self::build_with_progress(paths, options, &NoopLoadProgress)
    }

    pub fn build_with_progress<P: AsRef<Path> + Sync>(
        paths: &[P],
        options: &LoadOptions,
        progress: &dyn LoadProgress,
    ) -> Result<Self, CollectionError> {
        if paths.is_empty() {
            return Err(CollectionError::EmptyInput);
        }

        progress.on_stage_start(LoadStage::Parsing, paths.len());
        let stores = paths
            .par_iter()
            .map(|path| -> Result<GenotypeStore, StoreError> {
                let store = GenotypeStore::load(path.as_ref(), options)?;
                progress.on_source_loaded(store.source(), store.len());
                Ok(store)
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        progress.on_stage_finish(LoadStage::Parsing);

        progress.on_stage_start(LoadStage::Ranking, stores.len());
        let collection = Self::from_stores(stores);
        progress.on_stage_finish(LoadStage::Ranking);
        collection
    }

    /// Aggregates already-parsed stores, keyed by each store's source name.
    pub fn from_stores(
        stores: impl IntoIterator<Item = GenotypeStore>,
    ) -> Result<Self, CollectionError> {
        let mut by_name = BTreeMap::new();
        for store in stores {
            let name = store.source().to_string();
            if by_name.insert(name.clone(), store).is_some() {
                warn!("Source {name} was given more than once; keeping the last copy");
            }
        }
        if by_name.is_empty() {
            return Err(CollectionError::EmptyInput);
        }

        let marker_counts: BTreeMap<String, usize> = by_name
            .iter()
            .map(|(name, store)| (name.clone(), store.len()))
            .collect();

        let mut ranked_by_size: Vec<(String, usize)> = marker_counts
            .iter()
            .map(|(name, count)| (name.clone(), *count))
            .collect();
        ranked_by_size.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| compare_names(&a.0, &b.0)));

        let collection = Self {
            stores: by_name,
            marker_counts,
            ranked_by_size,
        };
        let (largest, largest_count) = collection.largest();
        let (smallest, smallest_count) = collection.smallest();
        info!(
            "Loaded {} sources; largest {largest} ({largest_count} markers), smallest {smallest} ({smallest_count} markers)",
            collection.len()
        );
        Ok(collection)
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Always false: a collection holds at least one source.
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    pub fn store(&self, name: &str) -> Option<&GenotypeStore> {
        self.stores.get(name)
    }

    pub fn stores(&self) -> impl Iterator<Item = (&str, &GenotypeStore)> {
        self.stores.iter().map(|(name, store)| (name.as_str(), store))
    }

    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(String::as_str)
    }

    pub fn marker_ids(&self, name: &str) -> Option<AHashSet<&str>> {
        self.stores.get(name).map(|store| store.marker_ids().collect())
    }

    pub fn marker_counts(&self) -> &BTreeMap<String, usize> {
        &self.marker_counts
    }

    pub fn ranked_by_size(&self) -> &[(String, usize)] {
        &self.ranked_by_size
    }

    pub fn largest(&self) -> (&str, usize) {
        // Non-empty by construction.
        let (name, count) = &self.ranked_by_size[0];
        (name, *count)
    }

    pub fn smallest(&self) -> (&str, usize) {
        let (name, count) = &self.ranked_by_size[self.ranked_by_size.len() - 1];
        (name, *count)
    }
}
