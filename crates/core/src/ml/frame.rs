//! In-memory tabular frame with a CSV codec.
//!
//! A column is numeric when every non-empty cell parses as a floating point number and at
//! least one cell is non-empty; otherwise it is text. Empty cells in a numeric column become
//! NaN and are written back as empty cells. Callers that know a column's kind, such as a
//! dataset carrying its schema, can force it with [`DataFrame::from_csv_with_kinds`].

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Storage kind of a [`Column`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Text,
}

/// A single column of a [`DataFrame`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(values) => values.len(),
            Self::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true when the column's storage is numeric.
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric(_))
    }

    pub const fn kind(&self) -> ColumnKind {
        match self {
            Self::Numeric(_) => ColumnKind::Numeric,
            Self::Text(_) => ColumnKind::Text,
        }
    }

    /// Cell rendered as text, as it would appear in CSV.
    pub fn cell(&self, row: usize) -> Option<String> {
        match self {
            Self::Numeric(values) => values.get(row).map(|v| format_number(*v)),
            Self::Text(values) => values.get(row).cloned(),
        }
    }

    /// Copy of the rows in `start..end`, failing with InvalidArgument if the range is out of
    /// bounds.
    pub fn slice(&self, start: usize, end: usize) -> Result<Self> {
        let out_of_range = || {
            Error::invalid_argument(format!("rows {start}..{end} out of range for {} rows", self.len()))
        };
        Ok(match self {
            Self::Numeric(values) => Self::Numeric(values.get(start..end).ok_or_else(out_of_range)?.to_vec()),
            Self::Text(values) => Self::Text(values.get(start..end).ok_or_else(out_of_range)?.to_vec()),
        })
    }
}

/// Render a number the way the CSV encoder writes it.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok()
}

/// Ordered, named columns of equal length.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataFrame {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl DataFrame {
    /// Empty frame with no columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a frame from `(name, column)` pairs.
    ///
    /// Column names must be unique and all columns the same length.
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Column)>,
        S: Into<String>,
    {
        let mut frame = Self::new();
        for (name, column) in columns {
            frame.push_column(name, column)?;
        }
        Ok(frame)
    }

    /// Append a column.
    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if self.names.contains(&name) {
            return Err(Error::invalid_argument(format!("duplicate column: {name}")));
        }
        if !self.columns.is_empty() && column.len() != self.n_rows() {
            return Err(Error::invalid_argument(format!(
                "column {name} has {} rows, expected {}",
                column.len(),
                self.n_rows()
            )));
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Columns paired with their names, in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    /// Column by name, failing with InvalidArgument if it does not exist.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| &self.columns[idx])
            .ok_or_else(|| Error::invalid_argument(format!("column not found: {name}")))
    }

    /// Column kinds keyed by column name.
    pub fn column_kinds(&self) -> BTreeMap<String, ColumnKind> {
        self.iter()
            .map(|(name, column)| (name.to_string(), column.kind()))
            .collect()
    }

    /// Decode UTF-8 CSV with a header row, inferring every column's kind.
    pub fn from_csv(bytes: &[u8]) -> Result<Self> {
        Self::from_csv_with_kinds(bytes, &BTreeMap::new())
    }

    /// Decode UTF-8 CSV, using `kinds` for the columns it names and inferring the rest.
    ///
    /// A forced text column keeps its cells verbatim. A forced numeric column reads empty
    /// cells as NaN and rejects any other cell that does not parse.
    pub fn from_csv_with_kinds(bytes: &[u8], kinds: &BTreeMap<String, ColumnKind>) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| Error::invalid_argument(format!("csv header: {e}")))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut seen = HashSet::new();
        for name in &headers {
            if !seen.insert(name.as_str()) {
                return Err(Error::invalid_argument(format!("duplicate column: {name}")));
            }
        }

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for (idx, record) in reader.records().enumerate() {
            let record =
                record.map_err(|e| Error::invalid_argument(format!("csv row {}: {e}", idx + 1)))?;
            for (column, cell) in cells.iter_mut().zip(record.iter()) {
                column.push(cell.to_string());
            }
        }

        let mut frame = Self::new();
        for (name, values) in headers.into_iter().zip(cells) {
            let column = match kinds.get(&name) {
                Some(ColumnKind::Text) => Column::Text(values),
                Some(ColumnKind::Numeric) => Self::numeric_column(&name, &values)?,
                None => Self::infer_column(values),
            };
            frame.push_column(name, column)?;
        }
        Ok(frame)
    }

    fn numeric_column(name: &str, values: &[String]) -> Result<Column> {
        values
            .iter()
            .enumerate()
            .map(|(row, cell)| {
                if cell.trim().is_empty() {
                    return Ok(f64::NAN);
                }
                parse_number(cell).ok_or_else(|| {
                    Error::invalid_argument(format!(
                        "column {name} row {}: {cell:?} is not a number",
                        row + 1
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Column::Numeric)
    }

    fn infer_column(values: Vec<String>) -> Column {
        let mut any_value = false;
        let mut parsed = Vec::with_capacity(values.len());
        for cell in &values {
            if cell.trim().is_empty() {
                parsed.push(f64::NAN);
                continue;
            }
            match parse_number(cell) {
                Some(v) => {
                    any_value = true;
                    parsed.push(v);
                }
                None => return Column::Text(values),
            }
        }
        if any_value {
            Column::Numeric(parsed)
        } else {
            Column::Text(values)
        }
    }

    /// Encode as UTF-8 CSV with a header row and no index column.
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(&self.names)
            .map_err(|e| Error::invalid_argument(format!("csv encode: {e}")))?;

        for row in 0..self.n_rows() {
            let record: Vec<String> = self
                .columns
                .iter()
                .map(|c| c.cell(row).unwrap_or_default())
                .collect();
            writer
                .write_record(&record)
                .map_err(|e| Error::invalid_argument(format!("csv encode: {e}")))?;
        }

        writer
            .into_inner()
            .map_err(|e| Error::invalid_argument(format!("csv encode: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        DataFrame::from_columns([
            ("age", Column::Numeric(vec![31.0, 45.5, 22.0])),
            (
                "city",
                Column::Text(vec!["Oslo".into(), "Rome, IT".into(), "Lima".into()]),
            ),
            ("score", Column::Numeric(vec![0.1, -3.25, 1e-7])),
        ])
        .unwrap()
    }

    #[test]
    fn test_csv_round_trip_preserves_values_and_order() {
        let frame = sample();
        let bytes = frame.to_csv().unwrap();
        let decoded = DataFrame::from_csv(&bytes).unwrap();

        assert_eq!(decoded, frame);
        assert_eq!(decoded.column_names(), &["age", "city", "score"]);
    }

    #[test]
    fn test_encoding_has_header_and_no_index() {
        let bytes = sample().to_csv().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("age,city,score"));
        assert_eq!(lines.next(), Some("31,Oslo,0.1"));
        assert_eq!(lines.next(), Some("45.5,\"Rome, IT\",-3.25"));
    }

    #[test]
    fn test_type_inference() {
        let frame = DataFrame::from_csv(b"a,b,c,d\n1,x,2.5,\n2,3,,\n").unwrap();
        assert!(frame.column("a").unwrap().is_numeric());
        assert!(!frame.column("b").unwrap().is_numeric());
        assert!(frame.column("c").unwrap().is_numeric());
        assert!(!frame.column("d").unwrap().is_numeric());

        match frame.column("c").unwrap() {
            Column::Numeric(values) => assert!(values[1].is_nan()),
            Column::Text(_) => panic!("expected numeric"),
        }
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let result = DataFrame::from_csv(b"a,b\n1,2\n3\n");
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_duplicate_headers_rejected() {
        let result = DataFrame::from_csv(b"a,a\n1,2\n");
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_missing_column() {
        let frame = sample();
        assert!(matches!(
            frame.column("nope"),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(frame.n_rows(), 3);
        assert_eq!(frame.n_columns(), 3);
    }

    #[test]
    fn test_forced_kinds_override_inference() {
        let kinds = BTreeMap::from([
            ("zip".to_string(), ColumnKind::Text),
            ("reading".to_string(), ColumnKind::Numeric),
        ]);
        let frame = DataFrame::from_csv_with_kinds(b"zip,reading,n\n02134,,1\n10001,,2\n", &kinds).unwrap();

        assert_eq!(
            frame.column("zip").unwrap(),
            &Column::Text(vec!["02134".into(), "10001".into()])
        );
        match frame.column("reading").unwrap() {
            Column::Numeric(values) => assert!(values.iter().all(|v| v.is_nan())),
            Column::Text(_) => panic!("expected numeric"),
        }
        assert!(frame.column("n").unwrap().is_numeric());
        assert_eq!(
            frame.column_kinds(),
            BTreeMap::from([
                ("n".to_string(), ColumnKind::Numeric),
                ("reading".to_string(), ColumnKind::Numeric),
                ("zip".to_string(), ColumnKind::Text),
            ])
        );
    }

    #[test]
    fn test_forced_numeric_rejects_text_cell() {
        let kinds = BTreeMap::from([("a".to_string(), ColumnKind::Numeric)]);
        let result = DataFrame::from_csv_with_kinds(b"a\n1\nx\n", &kinds);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_forced_kinds_ignore_unknown_columns() {
        let kinds = BTreeMap::from([("other".to_string(), ColumnKind::Text)]);
        let frame = DataFrame::from_csv_with_kinds(b"a\n1\n", &kinds).unwrap();
        assert!(frame.column("a").unwrap().is_numeric());
    }

    #[test]
    fn test_slice_copies_rows() {
        let frame = sample();
        let city = frame.column("city").unwrap();
        assert_eq!(
            city.slice(1, 3).unwrap(),
            Column::Text(vec!["Rome, IT".into(), "Lima".into()])
        );
        assert!(city.slice(3, 3).unwrap().is_empty());
    }

    #[test]
    fn test_slice_out_of_range() {
        let age = sample().column("age").unwrap().clone();
        assert!(matches!(age.slice(2, 5), Err(Error::InvalidArgument(_))));
        assert!(matches!(age.slice(2, 1), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_push_column_length_mismatch() {
        let mut frame = sample();
        let result = frame.push_column("short", Column::Numeric(vec![1.0]));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}
