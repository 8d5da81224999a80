//! Header-set and per-row validation for imported batches

use bigdecimal::BigDecimal;

use crate::import::normalize;
use crate::types::*;

/// Check that the batch header carries every required column
///
/// This is the structural check that runs before any row: a header missing
/// required columns rejects the whole batch, distinct from per-row issues.
pub fn validate_headers(headers: &[String], record_type: RecordType) -> ImportResult<()> {
    let missing: Vec<String> = record_type
        .required_columns()
        .iter()
        .filter(|required| !headers.iter().any(|header| header == *required))
        .map(|required| required.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ImportError::MissingHeaders {
            record_type,
            missing,
        })
    }
}

/// Validate one raw row against the rules for its record type
///
/// Pure function; the first problem found wins. The session keeps going
/// with the next row on rejection, so a returned issue never aborts the
/// batch.
pub fn validate_row(
    row: &RawRow,
    row_index: usize,
    record_type: RecordType,
    options: &ImportOptions,
) -> Result<(), ImportIssue> {
    for column in record_type.required_columns() {
        // A fine may identify its agreement by plate or by number; either
        // one of the two may be blank as long as the other is present.
        if record_type == RecordType::Fine && *column == columns::LICENSE_PLATE {
            continue;
        }
        if row.get_trimmed(column).is_none() {
            return Err(ImportIssue::new(
                row_index,
                *column,
                format!("required column '{}' is missing or blank", column),
            ));
        }
    }

    if record_type == RecordType::Fine
        && row.get_trimmed(columns::LICENSE_PLATE).is_none()
        && row.get_trimmed(columns::AGREEMENT_NO).is_none()
    {
        return Err(ImportIssue::new(
            row_index,
            columns::LICENSE_PLATE,
            "fine rows need a license plate or an agreement number",
        ));
    }

    let amount = validate_amount(row, row_index, record_type)?;
    if record_type == RecordType::Fine && amount < BigDecimal::from(0) {
        return Err(ImportIssue::new(
            row_index,
            record_type.amount_column(),
            format!("fine amount cannot be negative: {}", amount),
        ));
    }

    let date = validate_date(row, row_index, record_type)?;
    if record_type == RecordType::Fine
        && (date - options.reference_date).num_days() > options.max_future_days
    {
        return Err(ImportIssue::new(
            row_index,
            record_type.date_column(),
            format!("violation date {} is in the future", date),
        ));
    }

    Ok(())
}

fn validate_amount(
    row: &RawRow,
    row_index: usize,
    record_type: RecordType,
) -> Result<BigDecimal, ImportIssue> {
    let column = record_type.amount_column();
    let raw = row
        .get_trimmed(column)
        .ok_or_else(|| ImportIssue::new(row_index, column, "amount is missing"))?;
    normalize::parse_amount(raw).map_err(|reason| ImportIssue::new(row_index, column, reason))
}

fn validate_date(
    row: &RawRow,
    row_index: usize,
    record_type: RecordType,
) -> Result<chrono::NaiveDate, ImportIssue> {
    let column = record_type.date_column();
    let raw = row
        .get_trimmed(column)
        .ok_or_else(|| ImportIssue::new(row_index, column, "date is missing"))?;
    normalize::parse_date(raw).map_err(|reason| ImportIssue::new(row_index, column, reason))
}
