use tracing::info;

use crate::domain::VoteType;
use crate::error::PipelineError;
use crate::table::{Column, Key, Table};

pub const ANO_ELEICAO: &str = "ANO_ELEICAO";
pub const NR_TURNO: &str = "NR_TURNO";
pub const SG_UF: &str = "SG_UF";
pub const CD_MUNICIPIO: &str = "CD_MUNICIPIO";
pub const NM_MUNICIPIO: &str = "NM_MUNICIPIO";
pub const NR_ZONA: &str = "NR_ZONA";
pub const NR_SECAO: &str = "NR_SECAO";
pub const DS_CARGO: &str = "DS_CARGO";
pub const NR_VOTAVEL: &str = "NR_VOTAVEL";
pub const NM_VOTAVEL: &str = "NM_VOTAVEL";
pub const QT_VOTOS: &str = "QT_VOTOS";
pub const TP_VOTO: &str = "TP_VOTO";

pub const SILVER_COLUMNS: [&str; 11] = [
    ANO_ELEICAO,
    NR_TURNO,
    SG_UF,
    CD_MUNICIPIO,
    NM_MUNICIPIO,
    NR_ZONA,
    NR_SECAO,
    DS_CARGO,
    NR_VOTAVEL,
    NM_VOTAVEL,
    QT_VOTOS,
];

const NORMALIZED_COLUMNS: [&str; 3] = [NM_MUNICIPIO, NM_VOTAVEL, DS_CARGO];
const INTEGER_COLUMNS: [&str; 6] = [ANO_ELEICAO, NR_TURNO, CD_MUNICIPIO, NR_ZONA, NR_SECAO, NR_VOTAVEL];
const SORT_COLUMNS: [&str; 3] = [NM_MUNICIPIO, NR_ZONA, NR_SECAO];

pub fn transform_payload(bronze: &[u8]) -> Result<Vec<u8>, PipelineError> {
    let table = Table::from_parquet(bronze)?;
    transform(&table)?.to_parquet()
}

/// Projects, cleans, types, classifies and sorts a bronze table. Rows are never dropped.
pub fn transform(bronze: &Table) -> Result<Table, PipelineError> {
    for required in [NM_VOTAVEL, QT_VOTOS] {
        if bronze.column(required).is_none() {
            return Err(PipelineError::Transform(format!(
                "bronze table has no {required} column"
            )));
        }
    }

    let rows = bronze.num_rows();
    let mut silver = Table::with_rows(rows);
    for name in SILVER_COLUMNS {
        let Some(column) = bronze.column(name) else {
            continue;
        };
        if name == QT_VOTOS {
            silver.push_required_column(name, Column::Int(vote_counts(column)))?;
        } else if INTEGER_COLUMNS.contains(&name) {
            silver.push_column(name, Column::Int(integers(column)))?;
        } else if NORMALIZED_COLUMNS.contains(&name) {
            silver.push_column(name, Column::Text(normalized(column)))?;
        } else {
            silver.push_column(name, column.clone())?;
        }
    }

    let labels = silver
        .column(NM_VOTAVEL)
        .ok_or_else(|| PipelineError::Transform(format!("{NM_VOTAVEL} was not projected")))?;
    let vote_types = (0..rows)
        .map(|i| {
            let label = labels.text_at(i);
            Some(VoteType::classify(label.as_deref()).as_str().to_string())
        })
        .collect();
    silver.push_required_column(TP_VOTO, Column::Text(vote_types))?;

    let sorted = sort_by(&silver, &SORT_COLUMNS);
    info!(rows, columns = sorted.num_columns(), "silver table ready");
    Ok(sorted)
}

fn normalized(column: &Column) -> Vec<Option<String>> {
    (0..column.len())
        .map(|i| column.text_at(i).map(|value| value.trim().to_uppercase()))
        .collect()
}

fn integers(column: &Column) -> Vec<Option<i64>> {
    match column {
        Column::Int(values) => values.clone(),
        _ => (0..column.len())
            .map(|i| column.text_at(i).as_deref().and_then(parse_integer))
            .collect(),
    }
}

fn vote_counts(column: &Column) -> Vec<Option<i64>> {
    integers(column)
        .into_iter()
        .map(|value| Some(value.unwrap_or(0).max(0)))
        .collect()
}

/// Accepts plain integers and integral-looking decimals such as `12.0`.
fn parse_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }
    let value = trimmed.parse::<f64>().ok()?;
    if !value.is_finite() || value.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(value.trunc() as i64)
}

/// Stable ascending sort on the given columns; absent columns are ignored.
fn sort_by(table: &Table, names: &[&str]) -> Table {
    let columns = names
        .iter()
        .filter_map(|name| table.column(name))
        .collect::<Vec<_>>();
    let mut order = (0..table.num_rows()).collect::<Vec<_>>();
    order.sort_by_cached_key(|&row| {
        columns
            .iter()
            .map(|column| column.key_at(row))
            .collect::<Vec<Key>>()
    });
    table.take(&order)
}
