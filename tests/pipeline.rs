use flate2::Compression;
use flate2::write::GzEncoder;
use rsidcmp::export::{load_json, save_json};
use rsidcmp::query::{search_by_chromosome_window, search_marker};
use rsidcmp::{
    CallLookup, ClusterNode, CollectionError, DatasetCollection, IntersectionIndex, LoadOptions,
    Metric, StoreError, build_phylogeny,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

const HEADER: &str = "# This data file generated by 23andMe at: Sun Feb 06 2011\n\
                      # rsid\tchromosome\tposition\tgenotype\n";

fn write_calls(dir: &Path, name: &str, rows: &[(&str, &str, u64, &str)]) -> PathBuf {
    let mut body = String::from(HEADER);
    for (id, chr, pos, call) in rows {
        body.push_str(&format!("{id}\t{chr}\t{pos}\t{call}\n"));
    }
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

struct Fixture {
    _dir: TempDir,
    mother: PathBuf,
    child: PathBuf,
    stranger: PathBuf,
}

fn family_fixture() -> Fixture {
    let dir = tempdir().unwrap();
    let mother = write_calls(
        dir.path(),
        "mother.txt",
        &[
            ("rs1", "1", 900, "AG"),
            ("rs2", "1", 10_000, "CC"),
            ("rs3", "2", 500, "TT"),
            ("rs4", "X", 2_700_157, "AA"),
            ("rs_mother", "3", 1, "GG"),
        ],
    );
    let child = write_calls(
        dir.path(),
        "child.txt",
        &[
            ("rs1", "1", 900, "AG"),
            ("rs2", "1", 10_000, "CT"),
            ("rs3", "2", 500, "TT"),
            ("rs4", "X", 2_700_157, "AG"),
        ],
    );
    let stranger = write_calls(
        dir.path(),
        "stranger.txt",
        &[
            ("rs1", "1", 900, "CC"),
            ("rs2", "1", 10_000, "TT"),
            ("rs3", "2", 500, "CC"),
            ("rs4", "X", 2_700_157, "GG"),
            ("rs5", "5", 5, "AA"),
        ],
    );
    Fixture {
        _dir: dir,
        mother,
        child,
        stranger,
    }
}

fn name(path: &Path) -> String {
    path.display().to_string()
}

#[test]
fn family_files_cluster_parent_and_child_first() {
    let fixture = family_fixture();
    let paths = vec![
        fixture.stranger.clone(),
        fixture.child.clone(),
        fixture.mother.clone(),
    ];
    let collection = DatasetCollection::build(&paths, &LoadOptions::default()).unwrap();

    assert_eq!(collection.len(), 3);
    assert_eq!(collection.smallest(), (name(&fixture.child).as_str(), 4));

    let index = IntersectionIndex::compute(&collection);
    assert_eq!(index.sorted_markers(), vec!["rs1", "rs2", "rs3", "rs4"]);

    let tree = build_phylogeny(&collection, None, Metric::Identity, None).unwrap();
    let order = tree.flatten();
    assert_eq!(order.len(), 3);
    let first_pair: Vec<&str> = order[..2].to_vec();
    assert!(first_pair.contains(&name(&fixture.mother).as_str()));
    assert!(first_pair.contains(&name(&fixture.child).as_str()));
    assert_eq!(order[2], name(&fixture.stranger));
    assert!(matches!(&tree, ClusterNode::Join(left, _) if matches!(**left, ClusterNode::Join(..))));
}

#[test]
fn half_identity_is_looser_across_the_family() {
    let fixture = family_fixture();
    let collection =
        DatasetCollection::build(&[&fixture.mother, &fixture.child], &LoadOptions::default())
            .unwrap();
    let index = IntersectionIndex::compute(&collection);
    let view = index.filtered_view(&collection);
    let mother = view.get(&name(&fixture.mother)).unwrap();
    let child = view.get(&name(&fixture.child)).unwrap();

    assert_eq!(rsidcmp::score(mother, child, Metric::Identity).count, 2);
    assert_eq!(rsidcmp::score(mother, child, Metric::HalfIdentity).count, 4);
}

#[test]
fn annotated_phylogeny_and_marker_search_report_missing_calls() {
    let fixture = family_fixture();
    let paths = [&fixture.mother, &fixture.child, &fixture.stranger];
    let collection = DatasetCollection::build(&paths, &LoadOptions::default()).unwrap();

    let tree = build_phylogeny(&collection, None, Metric::Identity, Some("rs5")).unwrap();
    let available: Vec<_> = tree
        .leaves()
        .into_iter()
        .filter(|leaf| leaf.call.as_ref().is_some_and(CallLookup::is_available))
        .map(|leaf| leaf.source.clone())
        .collect();
    assert_eq!(available, vec![name(&fixture.stranger)]);

    let hits = search_marker(&collection, "rs_mother");
    assert_eq!(hits.len(), 3);
    assert_eq!(
        hits.iter().filter(|hit| hit.call == CallLookup::NotAvailable).count(),
        2
    );
}

#[test]
fn chromosome_window_uses_numeric_positions() {
    let fixture = family_fixture();
    let collection = DatasetCollection::build(
        &[&fixture.mother, &fixture.child, &fixture.stranger],
        &LoadOptions::default(),
    )
    .unwrap();
    let index = IntersectionIndex::compute(&collection);
    let view = index.filtered_view(&collection);

    let hits = search_by_chromosome_window(&view, "chr1", 899, 10_001);
    let ids: Vec<_> = hits.iter().map(|hit| hit.marker_id.as_str()).collect();
    assert_eq!(ids, vec!["rs1", "rs2"]);
    assert!(hits.iter().all(|hit| hit.calls.len() == 3));
}

#[test]
fn gzip_sources_load_like_plain_ones() {
    let fixture = family_fixture();
    let plain = fs::read(&fixture.child).unwrap();
    let gz_path = fixture.child.with_extension("txt.gz");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&plain).unwrap();
    fs::write(&gz_path, encoder.finish().unwrap()).unwrap();

    let plain_store = DatasetCollection::build(&[&fixture.child], &LoadOptions::default()).unwrap();
    let gz_store = DatasetCollection::build(&[&gz_path], &LoadOptions::default()).unwrap();
    let plain_records: Vec<_> = plain_store
        .store(&name(&fixture.child))
        .unwrap()
        .sorted_records()
        .into_iter()
        .map(|(id, record)| (id.to_string(), record.clone()))
        .collect();
    let gz_records: Vec<_> = gz_store
        .store(&name(&gz_path))
        .unwrap()
        .sorted_records()
        .into_iter()
        .map(|(id, record)| (id.to_string(), record.clone()))
        .collect();
    assert_eq!(plain_records, gz_records);
}

#[test]
fn json_export_round_trips_loaded_files() {
    let fixture = family_fixture();
    let collection =
        DatasetCollection::build(&[&fixture.mother, &fixture.stranger], &LoadOptions::default())
            .unwrap();
    let out = fixture.mother.with_file_name("all.json");
    save_json(&collection, &out).unwrap();
    assert_eq!(load_json(&out).unwrap(), collection);
}

#[test]
fn malformed_file_aborts_the_build() {
    let dir = tempdir().unwrap();
    let good = write_calls(dir.path(), "good.txt", &[("rs1", "1", 1, "AA")]);
    let bad = dir.path().join("bad.txt");
    fs::write(&bad, "# header\nrs1\t1\t1\tAA\nrs2\t1\n").unwrap();

    let err = DatasetCollection::build(&[good, bad], &LoadOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        CollectionError::Store(StoreError::MalformedRecord { line: 3, .. })
    ));
}
