#![allow(dead_code)]

use std::io::{Cursor, Write};

use tse_lakehouse::table::{Column, Table};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn text(values: &[&str]) -> Column {
    Column::Text(values.iter().map(|v| Some(v.to_string())).collect())
}

pub fn ints(values: &[i64]) -> Column {
    Column::Int(values.iter().map(|v| Some(*v)).collect())
}

pub fn texts(table: &Table, name: &str) -> Vec<Option<String>> {
    match table.column(name) {
        Some(Column::Text(values)) => values.clone(),
        other => panic!("expected text column {name}, got {other:?}"),
    }
}

pub fn integers(table: &Table, name: &str) -> Vec<Option<i64>> {
    match table.column(name) {
        Some(Column::Int(values)) => values.clone(),
        other => panic!("expected integer column {name}, got {other:?}"),
    }
}

pub fn floats(table: &Table, name: &str) -> Vec<f64> {
    match table.column(name) {
        Some(Column::Float(values)) => values.iter().map(|v| v.unwrap()).collect(),
        other => panic!("expected float column {name}, got {other:?}"),
    }
}

/// A TSE-shaped section table: header plus rows, `;`-separated, quoted, Latin-1 friendly.
pub fn section_csv(rows: &[[&str; 11]]) -> Vec<u8> {
    let mut out = String::from(
        "\"DT_GERACAO\";\"ANO_ELEICAO\";\"NR_TURNO\";\"SG_UF\";\"CD_MUNICIPIO\";\"NM_MUNICIPIO\";\
         \"NR_ZONA\";\"NR_SECAO\";\"DS_CARGO\";\"NR_VOTAVEL\";\"NM_VOTAVEL\";\"QT_VOTOS\"\n",
    );
    for row in rows {
        out.push_str("\"01/01/2023\"");
        for value in row {
            out.push_str(";\"");
            out.push_str(value);
            out.push('"');
        }
        out.push('\n');
    }
    out.into_bytes()
}
