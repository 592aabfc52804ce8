// ========================================================================================
//
//                     EXPORT: JSON INTERCHANGE AND PER-SOURCE SQLITE TABLES
//
// ========================================================================================

use crate::collection::{CollectionError, DatasetCollection};
use crate::shared::files::table_stem;
use crate::store::GenotypeStore;
use crate::types::MarkerRecord;
use log::{info, warn};
use rusqlite::{Connection, Transaction, params};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// `[chromosome, position, genotype]` as stored in the interchange document.
pub type InterchangeRecord = (String, u64, String);

/// source name -> marker id -> record.
pub type InterchangeDocument = BTreeMap<String, BTreeMap<String, InterchangeRecord>>;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("JSON interchange error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("table export error: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("sources {first} and {second} would both be exported as table {table}")]
    TableCollision {
        table: String,
        first: String,
        second: String,
    },
    #[error("interchange document holds no usable sources: {0}")]
    Collection(#[from] CollectionError),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub fn to_interchange(collection: &DatasetCollection) -> InterchangeDocument {
    collection
        .stores()
        .map(|(name, store)| {
            let records = store
                .iter()
                .map(|(id, record)| {
                    (
                        id.to_string(),
                        (
                            record.chromosome.clone(),
                            record.position,
                            record.genotype.clone(),
                        ),
                    )
                })
                .collect();
            (name.to_string(), records)
        })
        .collect()
}

pub fn from_interchange(document: InterchangeDocument) -> Result<DatasetCollection, ExportError> {
    let stores = document.into_iter().map(|(name, records)| {
        GenotypeStore::from_records(
            name,
            records.into_iter().map(|(id, (chromosome, position, genotype))| {
                (id, MarkerRecord::new(chromosome, position, genotype))
            }),
        )
    });
    Ok(DatasetCollection::from_stores(stores)?)
}

pub fn write_json<W: Write>(collection: &DatasetCollection, writer: W) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(writer, &to_interchange(collection))?;
    Ok(())
}

pub fn read_json<R: Read>(reader: R) -> Result<DatasetCollection, ExportError> {
    let document: InterchangeDocument = serde_json::from_reader(reader)?;
    from_interchange(document)
}

pub fn save_json(collection: &DatasetCollection, path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let file = File::create(path).map_err(io_error(path))?;
    let mut writer = BufWriter::new(file);
    write_json(collection, &mut writer)?;
    writer.flush().map_err(io_error(path))?;
    info!("Wrote {} sources to {}", collection.len(), path.display());
    Ok(())
}

pub fn load_json(path: &Path) -> Result<DatasetCollection, ExportError> {
    let file = File::open(path).map_err(io_error(path))?;
    read_json(BufReader::new(file))
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableExportSummary {
    pub written: Vec<String>,
    pub skipped: Vec<String>,
}

/// SQL identifier for a table name, double-quoted.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Maps every source to its table name. SQLite compares table names without
/// regard to case, so two sources whose names differ only in case collide too.
fn table_names(
    collection: &DatasetCollection,
) -> Result<Vec<(String, &GenotypeStore)>, ExportError> {
    let mut claimed: BTreeMap<String, &str> = BTreeMap::new();
    let mut tables = Vec::with_capacity(collection.len());
    for (name, store) in collection.stores() {
        let table = table_stem(Path::new(name));
        if let Some(first) = claimed.insert(table.to_lowercase(), name) {
            return Err(ExportError::TableCollision {
                table,
                first: first.to_string(),
                second: name.to_string(),
            });
        }
        tables.push((table, store));
    }
    Ok(tables)
}

fn table_exists(connection: &Connection, table: &str) -> Result<bool, rusqlite::Error> {
    let count: i64 = connection.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Writes one table per source into the SQLite database at `database`, named
/// after the source's file name up to the first `.`. Tables that already exist
/// are left untouched. Each table is created and filled in its own transaction,
/// so a failed write leaves no table behind.
pub fn export_tables(
    collection: &DatasetCollection,
    database: &Path,
) -> Result<TableExportSummary, ExportError> {
    let tables = table_names(collection)?;
    if let Some(parent) = database.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let mut connection = Connection::open(database)?;
    let mut summary = TableExportSummary::default();

    for (table, store) in tables {
        if table_exists(&connection, &table)? {
            warn!("Table {table} already exists. Moving on...");
            summary.skipped.push(table);
            continue;
        }

        let transaction = connection.transaction()?;
        write_table(&transaction, &table, store)?;
        transaction.commit()?;
        info!(
            "Wrote {} rows to table {table} in {}",
            store.len(),
            database.display()
        );
        summary.written.push(table);
    }

    Ok(summary)
}

fn write_table(
    transaction: &Transaction<'_>,
    table: &str,
    store: &GenotypeStore,
) -> Result<(), rusqlite::Error> {
    let quoted = quote_identifier(table);
    transaction.execute(
        &format!(
            "CREATE TABLE {quoted} (rsid TEXT PRIMARY KEY, chromosome TEXT NOT NULL, \
             position INTEGER NOT NULL, genotype TEXT NOT NULL)"
        ),
        [],
    )?;
    let mut insert = transaction.prepare(&format!(
        "INSERT INTO {quoted} (rsid, chromosome, position, genotype) VALUES (?1, ?2, ?3, ?4)"
    ))?;
    for (id, record) in store.sorted_records() {
        insert.execute(params![
            id,
            record.chromosome,
            record.position,
            record.genotype
        ])?;
    }
    Ok(())
}
