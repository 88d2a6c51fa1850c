use crate::util::chain_types::ChainStore;
use crate::util::parquet_utils::read_numeric_columns;
use anyhow::{Context, bail};
use csv::ReaderBuilder;
use num_format::{Locale, ToFormattedString};
use std::path::Path;
use tracing::{debug, info};

/// Accepted names for the column holding the iteration of each row.
const ITERATION_COLUMNS: [&str; 2] = ["sample", "iteration"];
/// Accepted names for the column holding the chain (or walker) of each row.
const CHAIN_COLUMNS: [&str; 2] = ["chain", "walker"];

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|f| f.to_str()).unwrap_or("")
}

fn is_parquet(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("parquet") | Some("pq")
    )
}

/// The field delimiter implied by the file name; the compression suffix
/// (if any) is ignored.
fn delimiter_for(path: &Path) -> u8 {
    let name = file_name(path);
    if name.contains(".tsv") || name.contains(".tab") {
        b'\t'
    } else {
        b','
    }
}

/// Convert a column of index values to non-negative integer labels.
fn as_labels(values: &[f64], column: &str) -> anyhow::Result<Vec<u64>> {
    values
        .iter()
        .enumerate()
        .map(|(row, &v)| {
            if v >= 0.0 && v.fract() == 0.0 {
                Ok(v as u64)
            } else {
                bail!(
                    "row {} of index column {:?} holds {}, which is not a non-negative integer",
                    row,
                    column,
                    v
                )
            }
        })
        .collect()
}

/// Split a table into its iteration labels, chain labels, and data
/// columns. A table without a chain column is treated as a single chain.
fn into_store(names: Vec<String>, mut columns: Vec<Vec<f64>>) -> anyhow::Result<ChainStore> {
    let Some(iter_idx) = names
        .iter()
        .position(|n| ITERATION_COLUMNS.contains(&n.as_str()))
    else {
        bail!(
            "the results store has no iteration column (expected one of {:?}); found [{}]",
            ITERATION_COLUMNS,
            names.join(", ")
        );
    };
    let chain_idx = names
        .iter()
        .position(|n| CHAIN_COLUMNS.contains(&n.as_str()));

    let iterations = as_labels(&columns[iter_idx], &names[iter_idx])?;
    let chains = match chain_idx {
        Some(ci) => as_labels(&columns[ci], &names[ci])?,
        None => {
            debug!("no chain column found; treating the results store as a single chain");
            vec![0; iterations.len()]
        }
    };

    let mut data_names = Vec::with_capacity(names.len());
    let mut data = Vec::with_capacity(names.len());
    for (i, (name, col)) in names.into_iter().zip(columns.drain(..)).enumerate() {
        if i != iter_idx && Some(i) != chain_idx {
            data_names.push(name);
            data.push(col);
        }
    }
    ChainStore::from_long_columns(&iterations, &chains, data_names, data)
}

/// Read a delimited text results store. Compressed files (gzip, bzip2,
/// xz, zstd) are decompressed transparently.
pub fn read_chain_csv(path: &Path) -> anyhow::Result<ChainStore> {
    let (reader, format) = niffler::from_path(path)
        .with_context(|| format!("could not open results store {}", path.display()))?;
    debug!("opened {} (compression: {:?})", path.display(), format);

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter_for(path))
        .trim(csv::Trim::All)
        .from_reader(reader);

    let names: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];

    for (row, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("malformed record in {}", path.display()))?;
        for (k, field) in record.iter().enumerate() {
            let v: f64 = field.parse().with_context(|| {
                format!(
                    "could not parse {:?} (row {}, column {:?}) as a number",
                    field, row, names[k]
                )
            })?;
            columns[k].push(v);
        }
    }
    into_store(names, columns)
}

/// Read a parquet results store.
pub fn read_chain_parquet(path: &Path) -> anyhow::Result<ChainStore> {
    let (names, columns) = read_numeric_columns(path)?;
    into_store(names, columns)
}

/// Read the results store at `path`, choosing the reader based on the
/// file extension.
pub fn read_chain_store(path: &Path) -> anyhow::Result<ChainStore> {
    let store = if is_parquet(path) {
        read_chain_parquet(path)?
    } else {
        read_chain_csv(path)?
    };
    info!(
        "read {} iterations of {} chain(s) and {} column(s) from {}",
        store.num_iterations().to_formatted_string(&Locale::en),
        store.num_chains().to_formatted_string(&Locale::en),
        store.columns.len(),
        path.display()
    );
    Ok(store)
}
