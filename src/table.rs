use std::sync::Arc;

use arrow_array::{
    Array, ArrayRef, Float32Array, Float64Array, Int32Array, Int64Array, LargeStringArray,
    RecordBatch, RecordBatchOptions, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Text(Vec<Option<String>>),
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
}

/// Hashable, totally ordered view of one cell. Nulls sort after every value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Int(i64),
    Text(String),
    Null,
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Text(values) => values.len(),
            Column::Int(values) => values.len(),
            Column::Float(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_nulls(&self) -> bool {
        match self {
            Column::Text(values) => values.iter().any(Option::is_none),
            Column::Int(values) => values.iter().any(Option::is_none),
            Column::Float(values) => values.iter().any(Option::is_none),
        }
    }

    pub fn key_at(&self, index: usize) -> Key {
        match self {
            Column::Text(values) => values[index]
                .as_ref()
                .map_or(Key::Null, |value| Key::Text(value.clone())),
            Column::Int(values) => values[index].map_or(Key::Null, Key::Int),
            Column::Float(values) => values[index].map_or(Key::Null, |value| Key::Text(value.to_string())),
        }
    }

    /// Cell rendered as text, the way the delimited source would have spelled it.
    pub fn text_at(&self, index: usize) -> Option<String> {
        match self {
            Column::Text(values) => values[index].clone(),
            Column::Int(values) => values[index].map(|value| value.to_string()),
            Column::Float(values) => values[index].map(|value| value.to_string()),
        }
    }

    pub fn take(&self, indices: &[usize]) -> Column {
        match self {
            Column::Text(values) => {
                Column::Text(indices.iter().map(|&i| values[i].clone()).collect())
            }
            Column::Int(values) => Column::Int(indices.iter().map(|&i| values[i]).collect()),
            Column::Float(values) => Column::Float(indices.iter().map(|&i| values[i]).collect()),
        }
    }

    fn data_type(&self) -> DataType {
        match self {
            Column::Text(_) => DataType::Utf8,
            Column::Int(_) => DataType::Int64,
            Column::Float(_) => DataType::Float64,
        }
    }

    fn to_array(&self) -> ArrayRef {
        match self {
            Column::Text(values) => Arc::new(StringArray::from_iter(
                values.iter().map(|value| value.as_deref()),
            )),
            Column::Int(values) => Arc::new(Int64Array::from(values.clone())),
            Column::Float(values) => Arc::new(Float64Array::from(values.clone())),
        }
    }

    fn from_array(name: &str, array: &dyn Array) -> Result<Column, PipelineError> {
        let any = array.as_any();
        if let Some(values) = any.downcast_ref::<StringArray>() {
            return Ok(Column::Text(
                values.iter().map(|value| value.map(str::to_string)).collect(),
            ));
        }
        if let Some(values) = any.downcast_ref::<LargeStringArray>() {
            return Ok(Column::Text(
                values.iter().map(|value| value.map(str::to_string)).collect(),
            ));
        }
        if let Some(values) = any.downcast_ref::<Int64Array>() {
            return Ok(Column::Int(values.iter().collect()));
        }
        if let Some(values) = any.downcast_ref::<Int32Array>() {
            return Ok(Column::Int(
                values.iter().map(|value| value.map(i64::from)).collect(),
            ));
        }
        if let Some(values) = any.downcast_ref::<Float64Array>() {
            return Ok(Column::Float(values.iter().collect()));
        }
        if let Some(values) = any.downcast_ref::<Float32Array>() {
            return Ok(Column::Float(
                values.iter().map(|value| value.map(f64::from)).collect(),
            ));
        }
        Err(PipelineError::Transform(format!(
            "column {name} has unsupported type {}",
            array.data_type()
        )))
    }

    fn extend(&mut self, other: Column) -> Result<(), PipelineError> {
        match (self, other) {
            (Column::Text(values), Column::Text(more)) => values.extend(more),
            (Column::Int(values), Column::Int(more)) => values.extend(more),
            (Column::Float(values), Column::Float(more)) => values.extend(more),
            _ => {
                return Err(PipelineError::Format(
                    "column changes type between record batches".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct NamedColumn {
    name: String,
    nullable: bool,
    column: Column,
}

/// Small in-memory column store used between parquet payloads and the stage transforms.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<NamedColumn>,
    rows: usize,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: usize) -> Self {
        Self {
            columns: Vec::new(),
            rows,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.column)
    }

    pub fn is_nullable(&self, name: &str) -> Option<bool> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.nullable)
    }

    pub fn push_column(&mut self, name: &str, column: Column) -> Result<(), PipelineError> {
        self.push(name, column, true)
    }

    /// Adds a column whose schema field is declared non-nullable.
    pub fn push_required_column(
        &mut self,
        name: &str,
        column: Column,
    ) -> Result<(), PipelineError> {
        if column.has_nulls() {
            return Err(PipelineError::Transform(format!(
                "required column {name} contains nulls"
            )));
        }
        self.push(name, column, false)
    }

    fn push(&mut self, name: &str, column: Column, nullable: bool) -> Result<(), PipelineError> {
        if self.columns.iter().any(|c| c.name == name) {
            return Err(PipelineError::Transform(format!("duplicate column {name}")));
        }
        if self.columns.is_empty() && self.rows == 0 {
            self.rows = column.len();
        }
        if column.len() != self.rows {
            return Err(PipelineError::Transform(format!(
                "column {name} has {} rows, table has {}",
                column.len(),
                self.rows
            )));
        }
        self.columns.push(NamedColumn {
            name: name.to_string(),
            nullable,
            column,
        });
        Ok(())
    }

    /// Reorders (or subsets) every column by row index.
    pub fn take(&self, indices: &[usize]) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| NamedColumn {
                    name: c.name.clone(),
                    nullable: c.nullable,
                    column: c.column.take(indices),
                })
                .collect(),
            rows: indices.len(),
        }
    }

    pub fn to_record_batch(&self) -> Result<RecordBatch, PipelineError> {
        let fields = self
            .columns
            .iter()
            .map(|c| Field::new(&c.name, c.column.data_type(), c.nullable))
            .collect::<Vec<_>>();
        let arrays = self
            .columns
            .iter()
            .map(|c| c.column.to_array())
            .collect::<Vec<_>>();
        let options = RecordBatchOptions::new().with_row_count(Some(self.rows));
        RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)
            .map_err(|err| PipelineError::Format(err.to_string()))
    }

    pub fn to_parquet(&self) -> Result<Vec<u8>, PipelineError> {
        let batch = self.to_record_batch()?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut buffer = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))
            .map_err(|err| PipelineError::Format(format!("opening parquet writer: {err}")))?;
        writer
            .write(&batch)
            .map_err(|err| PipelineError::Format(format!("writing record batch: {err}")))?;
        writer
            .close()
            .map_err(|err| PipelineError::Format(format!("closing parquet writer: {err}")))?;
        Ok(buffer)
    }

    pub fn from_parquet(payload: &[u8]) -> Result<Table, PipelineError> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(payload))
            .map_err(|err| PipelineError::Format(format!("reading parquet footer: {err}")))?;
        let schema = builder.schema().clone();
        let reader = builder
            .build()
            .map_err(|err| PipelineError::Format(format!("opening parquet reader: {err}")))?;

        let mut columns: Vec<Option<Column>> = vec![None; schema.fields().len()];
        let mut rows = 0usize;
        for batch in reader {
            let batch =
                batch.map_err(|err| PipelineError::Format(format!("decoding parquet: {err}")))?;
            rows += batch.num_rows();
            for (index, field) in schema.fields().iter().enumerate() {
                let decoded = Column::from_array(field.name(), batch.column(index).as_ref())?;
                match columns[index].as_mut() {
                    Some(existing) => existing.extend(decoded)?,
                    None => columns[index] = Some(decoded),
                }
            }
        }

        let mut table = Table::with_rows(rows);
        for (field, column) in schema.fields().iter().zip(columns) {
            let column = match column {
                Some(column) => column,
                None => empty_column(field.data_type(), field.name())?,
            };
            table.push(field.name(), column, field.is_nullable())?;
        }
        Ok(table)
    }
}

fn empty_column(data_type: &DataType, name: &str) -> Result<Column, PipelineError> {
    match data_type {
        DataType::Utf8 | DataType::LargeUtf8 => Ok(Column::Text(Vec::new())),
        DataType::Int32 | DataType::Int64 => Ok(Column::Int(Vec::new())),
        DataType::Float32 | DataType::Float64 => Ok(Column::Float(Vec::new())),
        other => Err(PipelineError::Transform(format!(
            "column {name} has unsupported type {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parquet_keeps_types_and_nullability() {
        let mut table = Table::new();
        table
            .push_column(
                "NM_MUNICIPIO",
                Column::Text(vec![Some("FORTALEZA".to_string()), None]),
            )
            .unwrap();
        table
            .push_required_column("QT_VOTOS", Column::Int(vec![Some(3), Some(0)]))
            .unwrap();
        table
            .push_column("PERC", Column::Float(vec![Some(12.5), Some(0.0)]))
            .unwrap();

        let decoded = Table::from_parquet(&table.to_parquet().unwrap()).unwrap();
        assert_eq!(decoded, table);
        assert_eq!(decoded.is_nullable("QT_VOTOS"), Some(false));
    }

    #[test]
    fn empty_table_keeps_schema() {
        let mut table = Table::new();
        table.push_column("A", Column::Text(Vec::new())).unwrap();
        table.push_column("B", Column::Int(Vec::new())).unwrap();
        let decoded = Table::from_parquet(&table.to_parquet().unwrap()).unwrap();
        assert_eq!(decoded.num_rows(), 0);
        assert_eq!(decoded.column_names(), vec!["A", "B"]);
    }

    #[test]
    fn mismatched_column_length_is_rejected() {
        let mut table = Table::new();
        table.push_column("A", Column::Int(vec![Some(1)])).unwrap();
        let err = table
            .push_column("B", Column::Int(vec![Some(1), Some(2)]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Transform(_)));
    }

    #[test]
    fn nulls_sort_last() {
        let column = Column::Int(vec![None, Some(2), Some(1)]);
        let mut keys = (0..3).map(|i| column.key_at(i)).collect::<Vec<_>>();
        keys.sort();
        assert_eq!(keys, vec![Key::Int(1), Key::Int(2), Key::Null]);
    }
}
