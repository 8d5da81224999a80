//! Delimited-text reading into raw rows

use std::io::Read;

use crate::types::{ImportError, ImportResult, RawRow};

/// A parsed batch: the header row plus every data row, in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBatch {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// Parse delimited text into a [`RawBatch`]
///
/// Structural malformation (unreadable bytes, a record the parser cannot
/// recover) aborts with [`ImportError::Malformed`]; content problems are
/// the validator's job and are left in the rows untouched.
pub fn parse_delimited<R: Read>(input: R) -> ImportResult<RawBatch> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.is_empty() {
        return Err(ImportError::EmptyBatch);
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let mut row = RawRow::new();
        for (column, value) in headers.iter().zip(record.iter()) {
            row.insert(column.clone(), value);
        }
        rows.push(row);
    }

    Ok(RawBatch { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_headers_and_rows() {
        let input = "payment_ref,amount\nTXN-1,100.00\nTXN-2,50.00\n";
        let batch = parse_delimited(input.as_bytes()).unwrap();
        assert_eq!(batch.headers, vec!["payment_ref", "amount"]);
        assert_eq!(batch.rows.len(), 2);
        assert_eq!(batch.rows[0].get("payment_ref"), Some("TXN-1"));
        assert_eq!(batch.rows[1].get("amount"), Some("50.00"));
    }

    #[test]
    fn trims_whitespace_around_values() {
        let input = "payment_ref,amount\n TXN-1 , 100.00 \n";
        let batch = parse_delimited(input.as_bytes()).unwrap();
        assert_eq!(batch.rows[0].get("amount"), Some("100.00"));
    }

    #[test]
    fn empty_input_is_an_empty_batch_error() {
        let batch = parse_delimited("".as_bytes());
        assert!(matches!(batch, Err(ImportError::EmptyBatch)));
    }

    #[test]
    fn ragged_record_is_malformed() {
        let input = "payment_ref,amount\nTXN-1,100.00,extra\n";
        let result = parse_delimited(input.as_bytes());
        assert!(matches!(result, Err(ImportError::Malformed(_))));
    }
}
