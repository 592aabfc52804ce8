use crate::collection::DatasetCollection;
use crate::intersection::CommonView;
use crate::shared::files::compare_names;
use crate::types::{CallLookup, MarkerRecord};
use std::collections::BTreeMap;

/// One source's call at a marker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceCall {
    pub source: String,
    pub call: CallLookup,
}

/// A shared marker that fell inside a chromosome window, with every source's call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowHit {
    pub marker_id: String,
    pub chromosome: String,
    pub position: u64,
    pub calls: Vec<SourceCall>,
}

/// The call of `marker_id` in every source, in source-name order. Sources
/// lacking the marker report `NotAvailable`.
pub fn search_marker(collection: &DatasetCollection, marker_id: &str) -> Vec<SourceCall> {
    collection
        .stores()
        .map(|(name, store)| SourceCall {
            source: name.to_string(),
            call: CallLookup::from_record(store.get(marker_id)),
        })
        .collect()
}

/// Shared markers on `chromosome` with `min_position < position < max_position`.
///
/// Every source's view is scanned, so a marker whose coordinates differ between
/// sources is found through whichever source places it in the window. Each
/// marker is reported once, ordered by position and then marker id, with the
/// calls of all sources.
pub fn search_by_chromosome_window(
    view: &CommonView<'_>,
    chromosome: &str,
    min_position: u64,
    max_position: u64,
) -> Vec<WindowHit> {
    let in_window = |record: &MarkerRecord| {
        record.on_chromosome(chromosome)
            && record.position > min_position
            && record.position < max_position
    };

    let mut matches: BTreeMap<&str, &MarkerRecord> = BTreeMap::new();
    for (_, markers) in view.iter() {
        for (marker_id, record) in markers.iter() {
            if in_window(*record) {
                matches.entry(*marker_id).or_insert(*record);
            }
        }
    }

    let mut hits: Vec<WindowHit> = matches
        .into_iter()
        .map(|(marker_id, record)| WindowHit {
            marker_id: marker_id.to_string(),
            chromosome: record.chromosome.clone(),
            position: record.position,
            calls: view
                .iter()
                .map(|(source, _)| SourceCall {
                    source: source.to_string(),
                    call: CallLookup::from_record(view.record(source, marker_id)),
                })
                .collect(),
        })
        .collect();

    hits.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| compare_names(&a.marker_id, &b.marker_id))
    });
    hits
}
