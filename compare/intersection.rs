use crate::collection::DatasetCollection;
use crate::shared::files::compare_names;
use crate::store::GenotypeStore;
use crate::types::{MarkerRecord, MarkerView};
use ahash::AHashSet;
use log::info;
use std::collections::BTreeMap;

/// The marker ids present in every source of a collection.
#[derive(Clone, Debug, Default)]
pub struct IntersectionIndex {
    markers: AHashSet<String>,
}

impl PartialEq for IntersectionIndex {
    fn eq(&self, other: &Self) -> bool {
        *self.markers == *other.markers
    }
}

impl Eq for IntersectionIndex {}

impl IntersectionIndex {
    /// Seeds from the smallest source and folds the remaining sources in.
    pub fn compute(collection: &DatasetCollection) -> Self {
        let (smallest, _) = collection.smallest();
        let index = match collection.store(smallest) {
            Some(seed) => Self::intersect(
                seed,
                collection
                    .stores()
                    .filter(|(name, _)| *name != smallest)
                    .map(|(_, store)| store),
            ),
            None => Self::default(),
        };
        info!(
            "{} markers are shared by all {} sources",
            index.len(),
            collection.len()
        );
        index
    }

    /// Same intersection over an arbitrary sequence of stores. The result does
    /// not depend on the order of `stores`; no stores yields the empty set.
    pub fn from_stores<'a>(stores: impl IntoIterator<Item = &'a GenotypeStore>) -> Self {
        let stores: Vec<&GenotypeStore> = stores.into_iter().collect();
        let Some(seed_position) = stores
            .iter()
            .enumerate()
            .min_by_key(|(_, store)| store.len())
            .map(|(position, _)| position)
        else {
            return Self::default();
        };

        Self::intersect(
            stores[seed_position],
            stores
                .iter()
                .enumerate()
                .filter(|(position, _)| *position != seed_position)
                .map(|(_, store)| *store),
        )
    }

    fn intersect<'a>(
        seed: &'a GenotypeStore,
        rest: impl Iterator<Item = &'a GenotypeStore>,
    ) -> Self {
        let mut common: AHashSet<&str> = seed.marker_ids().collect();
        for store in rest {
            if common.is_empty() {
                break;
            }
            common.retain(|id| store.contains(id));
        }
        Self {
            markers: common.into_iter().map(str::to_string).collect(),
        }
    }

    /// Marker ids shared by exactly these two stores.
    pub fn pairwise<'a>(a: &'a GenotypeStore, b: &GenotypeStore) -> AHashSet<&'a str> {
        a.marker_ids().filter(|id| b.contains(id)).collect()
    }

    pub fn contains(&self, marker_id: &str) -> bool {
        self.markers.contains(marker_id)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn markers(&self) -> &AHashSet<String> {
        &self.markers
    }

    pub fn sorted_markers(&self) -> Vec<&str> {
        let mut sorted: Vec<&str> = self.markers.iter().map(String::as_str).collect();
        sorted.sort_by(|a, b| compare_names(a, b));
        sorted
    }

    /// Restricts every source of `collection` to the shared markers.
    pub fn filtered_view<'a>(&self, collection: &'a DatasetCollection) -> CommonView<'a> {
        let views = collection
            .stores()
            .map(|(name, store)| {
                let view: MarkerView<'a> = store
                    .iter()
                    .filter(|(id, _)| self.markers.contains(*id))
                    .collect();
                (name, view)
            })
            .collect();
        CommonView { views }
    }
}

/// Per-source records restricted to the intersection, borrowed from the collection.
#[derive(Clone, Debug)]
pub struct CommonView<'a> {
    views: BTreeMap<&'a str, MarkerView<'a>>,
}

impl<'a> CommonView<'a> {
    pub fn get(&self, source: &str) -> Option<&MarkerView<'a>> {
        self.views.get(source)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &MarkerView<'a>)> {
        self.views.iter().map(|(name, view)| (*name, view))
    }

    pub fn source_names(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.views.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// The record of `marker_id` in `source`, if the marker is shared.
    pub fn record(&self, source: &str, marker_id: &str) -> Option<&'a MarkerRecord> {
        self.views
            .get(source)
            .and_then(|view| view.get(marker_id).copied())
    }
}
