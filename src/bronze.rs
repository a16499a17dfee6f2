use std::io::{Cursor, Read};

use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::error::PipelineError;
use crate::table::{Column, Table};

const TABLE_EXTENSIONS: [&str; 2] = [".csv", ".txt"];
const DELIMITER: u8 = b';';

/// Converts a raw TSE archive into a bronze parquet payload with every source column as text.
pub fn convert_archive(zip_bytes: &[u8]) -> Result<Vec<u8>, PipelineError> {
    let (entry_name, content) = read_table_entry(zip_bytes)?;
    let table = parse_delimited(&content)?;
    info!(
        entry = %entry_name,
        rows = table.num_rows(),
        columns = table.num_columns(),
        "parsed archive table"
    );
    table.to_parquet()
}

/// Returns the first entry, in archive order, whose name ends in `.csv` or `.txt`.
pub fn read_table_entry(zip_bytes: &[u8]) -> Result<(String, Vec<u8>), PipelineError> {
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes))
        .map_err(|err| PipelineError::Format(format!("opening archive: {err}")))?;

    let mut selected = None;
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|err| PipelineError::Format(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        let lower = entry.name().to_ascii_lowercase();
        if !TABLE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            debug!(entry = %entry.name(), "skipping archive entry");
            continue;
        }
        if selected.is_none() {
            selected = Some(index);
        } else {
            warn!(entry = %entry.name(), "multiple table entries, using first");
        }
    }

    let index = selected.ok_or_else(|| {
        PipelineError::Format("archive has no .csv or .txt entry".to_string())
    })?;
    let mut entry = archive
        .by_index(index)
        .map_err(|err| PipelineError::Format(err.to_string()))?;
    let name = entry.name().to_string();
    let mut content = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or_default());
    entry
        .read_to_end(&mut content)
        .map_err(|err| PipelineError::Format(format!("reading {name}: {err}")))?;
    Ok((name, content))
}

/// Parses a `;`-delimited, Latin-1 encoded table with a header row. Empty fields and the
/// missing tail of short rows become nulls; rows longer than the header are rejected.
pub fn parse_delimited(content: &[u8]) -> Result<Table, PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .flexible(true)
        .from_reader(content);

    let headers = reader
        .byte_headers()
        .map_err(|err| PipelineError::Format(format!("reading header: {err}")))?
        .iter()
        .map(decode_latin1)
        .map(|name| name.trim().to_string())
        .collect::<Vec<_>>();
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(PipelineError::Format("table has no header row".to_string()));
    }

    let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for record in reader.byte_records() {
        let record = record.map_err(|err| PipelineError::Format(err.to_string()))?;
        if record.len() > headers.len() {
            let line = record.position().map(|pos| pos.line()).unwrap_or_default();
            return Err(PipelineError::Format(format!(
                "line {line} has {} fields, header has {}",
                record.len(),
                headers.len()
            )));
        }
        // Short rows are padded with nulls.
        for (index, column) in values.iter_mut().enumerate() {
            let field = record.get(index).filter(|field| !field.is_empty());
            column.push(field.map(decode_latin1));
        }
    }

    let mut table = Table::new();
    for (name, column) in headers.iter().zip(values) {
        table.push_column(name, Column::Text(column))?;
    }
    Ok(table)
}

/// ISO-8859-1 maps every byte to the code point of the same value.
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&byte| char::from(byte)).collect()
}
