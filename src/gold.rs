use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use tracing::info;

use crate::domain::VoteType;
use crate::error::PipelineError;
use crate::silver::{
    ANO_ELEICAO, DS_CARGO, NM_MUNICIPIO, NM_VOTAVEL, NR_TURNO, QT_VOTOS, SG_UF, TP_VOTO,
};
use crate::table::{Column, Key, Table};

pub const PERC_VOTOS_VALIDOS: &str = "PERC_VOTOS_VALIDOS";

pub const GROUP_COLUMNS: [&str; 7] = [
    ANO_ELEICAO,
    NR_TURNO,
    SG_UF,
    NM_MUNICIPIO,
    DS_CARGO,
    NM_VOTAVEL,
    TP_VOTO,
];

const MUNICIPALITY: usize = 3;
const OFFICE: usize = 4;
const VOTE_TYPE: usize = 6;

struct Group {
    key: Vec<Key>,
    representative: usize,
    votes: i64,
}

pub fn aggregate_payload(silver: &[u8]) -> Result<Vec<u8>, PipelineError> {
    let table = Table::from_parquet(silver)?;
    aggregate(&table)?.to_parquet()
}

/// Sums votes per (year, round, UF, municipality, office, candidate, vote type) and adds each
/// nominal row's share of the nominal votes cast for its (municipality, office) pair.
pub fn aggregate(silver: &Table) -> Result<Table, PipelineError> {
    let key_columns = GROUP_COLUMNS
        .iter()
        .map(|name| required(silver, name))
        .collect::<Result<Vec<_>, _>>()?;
    let votes = match required(silver, QT_VOTOS)? {
        Column::Int(values) => values,
        _ => {
            return Err(PipelineError::Transform(format!(
                "{QT_VOTOS} must be an integer column"
            )));
        }
    };

    let mut grouped: BTreeMap<Vec<Key>, (usize, i64)> = BTreeMap::new();
    for row in 0..silver.num_rows() {
        let key = key_columns
            .iter()
            .map(|column| column.key_at(row))
            .collect::<Vec<_>>();
        let count = votes[row].unwrap_or(0);
        let entry = grouped.entry(key).or_insert((row, 0));
        entry.1 = entry.1.saturating_add(count);
    }

    let mut groups = grouped
        .into_iter()
        .map(|(key, (representative, votes))| Group {
            key,
            representative,
            votes,
        })
        .collect::<Vec<_>>();

    let nominal = Key::Text(VoteType::Nominal.as_str().to_string());
    let mut nominal_totals: HashMap<(Key, Key), i64> = HashMap::new();
    for group in groups.iter().filter(|g| g.key[VOTE_TYPE] == nominal) {
        let total = nominal_totals
            .entry((group.key[MUNICIPALITY].clone(), group.key[OFFICE].clone()))
            .or_insert(0);
        *total = total.saturating_add(group.votes);
    }

    groups.sort_by(|a, b| {
        (&a.key[MUNICIPALITY], &a.key[OFFICE], Reverse(a.votes)).cmp(&(
            &b.key[MUNICIPALITY],
            &b.key[OFFICE],
            Reverse(b.votes),
        ))
    });

    let shares = groups
        .iter()
        .map(|group| {
            if group.key[VOTE_TYPE] != nominal {
                return Some(0.0);
            }
            let total = nominal_totals
                .get(&(group.key[MUNICIPALITY].clone(), group.key[OFFICE].clone()))
                .copied()
                .unwrap_or(0);
            Some(share(group.votes, total))
        })
        .collect::<Vec<_>>();

    let representatives = groups.iter().map(|g| g.representative).collect::<Vec<_>>();
    let mut gold = Table::with_rows(groups.len());
    for (name, column) in GROUP_COLUMNS.iter().zip(&key_columns) {
        if silver.is_nullable(name) == Some(false) {
            gold.push_required_column(name, column.take(&representatives))?;
        } else {
            gold.push_column(name, column.take(&representatives))?;
        }
    }
    gold.push_required_column(
        QT_VOTOS,
        Column::Int(groups.iter().map(|g| Some(g.votes)).collect()),
    )?;
    gold.push_required_column(PERC_VOTOS_VALIDOS, Column::Float(shares))?;

    info!(
        input_rows = silver.num_rows(),
        groups = gold.num_rows(),
        "gold table ready"
    );
    Ok(gold)
}

/// Percentage of `total`; a pair without nominal votes yields 0.0 instead of a NaN.
pub fn share(votes: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    100.0 * votes as f64 / total as f64
}

fn required<'a>(table: &'a Table, name: &str) -> Result<&'a Column, PipelineError> {
    table
        .column(name)
        .ok_or_else(|| PipelineError::Transform(format!("silver table has no {name} column")))
}
