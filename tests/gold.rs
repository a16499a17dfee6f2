mod common;

use assert_matches::assert_matches;
use tse_lakehouse::error::PipelineError;
use tse_lakehouse::gold::{PERC_VOTOS_VALIDOS, aggregate, aggregate_payload};
use tse_lakehouse::table::Table;

use common::{floats, integers, ints, text, texts};

/// (municipality, office, candidate, vote type, votes)
fn silver(rows: &[(&str, &str, &str, &str, i64)]) -> Table {
    let n = rows.len();
    let mut table = Table::with_rows(n);
    table.push_column("ANO_ELEICAO", ints(&vec![2022; n])).unwrap();
    table.push_column("NR_TURNO", ints(&vec![1; n])).unwrap();
    table.push_column("SG_UF", text(&vec!["CE"; n])).unwrap();
    table
        .push_column("NM_MUNICIPIO", text(&rows.iter().map(|r| r.0).collect::<Vec<_>>()))
        .unwrap();
    table
        .push_column("DS_CARGO", text(&rows.iter().map(|r| r.1).collect::<Vec<_>>()))
        .unwrap();
    table
        .push_column("NM_VOTAVEL", text(&rows.iter().map(|r| r.2).collect::<Vec<_>>()))
        .unwrap();
    table
        .push_required_column("TP_VOTO", text(&rows.iter().map(|r| r.3).collect::<Vec<_>>()))
        .unwrap();
    table
        .push_required_column("QT_VOTOS", ints(&rows.iter().map(|r| r.4).collect::<Vec<_>>()))
        .unwrap();
    table
}

#[test]
fn shares_of_nominal_votes_sum_to_one_hundred() {
    let gold = aggregate(&silver(&[
        ("FORTALEZA", "PRESIDENTE", "A", "NOMINAL", 100),
        ("FORTALEZA", "PRESIDENTE", "B", "NOMINAL", 50),
        ("FORTALEZA", "PRESIDENTE", "C", "NOMINAL", 50),
    ]))
    .unwrap();

    let shares = floats(&gold, PERC_VOTOS_VALIDOS);
    assert_eq!(shares, vec![50.0, 25.0, 25.0]);
    assert!((shares.iter().sum::<f64>() - 100.0).abs() < 1e-9);
}

#[test]
fn sums_votes_across_sections() {
    let gold = aggregate(&silver(&[
        ("FORTALEZA", "PRESIDENTE", "A", "NOMINAL", 10),
        ("FORTALEZA", "PRESIDENTE", "B", "NOMINAL", 5),
        ("FORTALEZA", "PRESIDENTE", "A", "NOMINAL", 20),
        ("FORTALEZA", "PRESIDENTE", "B", "NOMINAL", 5),
    ]))
    .unwrap();

    assert_eq!(gold.num_rows(), 2);
    assert_eq!(
        texts(&gold, "NM_VOTAVEL"),
        vec![Some("A".to_string()), Some("B".to_string())]
    );
    assert_eq!(integers(&gold, "QT_VOTOS"), vec![Some(30), Some(10)]);
    assert_eq!(floats(&gold, PERC_VOTOS_VALIDOS), vec![75.0, 25.0]);
}

#[test]
fn blank_and_null_rows_do_not_dilute_shares() {
    let gold = aggregate(&silver(&[
        ("SOBRAL", "GOVERNADOR", "A", "NOMINAL", 30),
        ("SOBRAL", "GOVERNADOR", "VOTO BRANCO", "BLANK", 500),
        ("SOBRAL", "GOVERNADOR", "VOTO NULO", "NULL", 70),
        ("SOBRAL", "GOVERNADOR", "B", "NOMINAL", 10),
    ]))
    .unwrap();

    let names = texts(&gold, "NM_VOTAVEL");
    let shares = floats(&gold, PERC_VOTOS_VALIDOS);
    for (name, share) in names.iter().zip(&shares) {
        match name.as_deref() {
            Some("A") => assert_eq!(*share, 75.0),
            Some("B") => assert_eq!(*share, 25.0),
            _ => assert_eq!(*share, 0.0),
        }
    }
}

#[test]
fn group_without_nominal_votes_gets_zero_share() {
    let gold = aggregate(&silver(&[
        ("IRACEMA", "SENADOR", "A", "NOMINAL", 0),
        ("IRACEMA", "SENADOR", "VOTO BRANCO", "BLANK", 3),
    ]))
    .unwrap();

    let shares = floats(&gold, PERC_VOTOS_VALIDOS);
    assert!(shares.iter().all(|share| *share == 0.0));
    assert!(shares.iter().all(|share| share.is_finite()));
}

#[test]
fn sorted_by_municipality_office_then_votes_descending() {
    let gold = aggregate(&silver(&[
        ("SOBRAL", "PRESIDENTE", "A", "NOMINAL", 1),
        ("CAUCAIA", "SENADOR", "B", "NOMINAL", 5),
        ("CAUCAIA", "PRESIDENTE", "C", "NOMINAL", 2),
        ("CAUCAIA", "PRESIDENTE", "D", "NOMINAL", 9),
    ]))
    .unwrap();

    assert_eq!(
        texts(&gold, "NM_VOTAVEL"),
        ["D", "C", "B", "A"]
            .iter()
            .map(|v| Some(v.to_string()))
            .collect::<Vec<_>>()
    );
    assert_eq!(
        integers(&gold, "QT_VOTOS"),
        vec![Some(9), Some(2), Some(5), Some(1)]
    );
}

#[test]
fn output_columns() {
    let gold = aggregate(&silver(&[("A", "B", "C", "NOMINAL", 1)])).unwrap();
    assert_eq!(
        gold.column_names(),
        vec![
            "ANO_ELEICAO",
            "NR_TURNO",
            "SG_UF",
            "NM_MUNICIPIO",
            "DS_CARGO",
            "NM_VOTAVEL",
            "TP_VOTO",
            "QT_VOTOS",
            PERC_VOTOS_VALIDOS,
        ]
    );
    assert_eq!(gold.is_nullable(PERC_VOTOS_VALIDOS), Some(false));
}

#[test]
fn missing_group_column_is_rejected() {
    let mut table = Table::with_rows(1);
    table.push_column("QT_VOTOS", ints(&[1])).unwrap();
    assert_matches!(aggregate(&table), Err(PipelineError::Transform(_)));
}

#[test]
fn payload_round_trip_through_parquet() {
    let input = silver(&[
        ("FORTALEZA", "PRESIDENTE", "A", "NOMINAL", 3),
        ("FORTALEZA", "PRESIDENTE", "B", "NOMINAL", 1),
    ]);
    let gold = aggregate_payload(&input.to_parquet().unwrap()).unwrap();
    let table = Table::from_parquet(&gold).unwrap();
    assert_eq!(floats(&table, PERC_VOTOS_VALIDOS), vec![75.0, 25.0]);
}
