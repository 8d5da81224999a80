//! Canonicalization of raw column values into domain types

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::str::FromStr;

use crate::types::*;

/// Accepted date formats, tried in order
///
/// Ambiguous numeric dates resolve day-first (`03/04/2024` is 3 April), a
/// single fixed convention for the whole batch.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d %B %Y",
    "%B %d, %Y",
];

/// Parse a date under the accepted formats
pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    let trimmed = value.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date);
        }
    }
    Err(format!("unrecognized date '{}'", trimmed))
}

/// Parse a monetary amount, preserving its sign
///
/// Strips currency symbols, currency codes, and thousands separators
/// (comma, space, apostrophe); accepts accounting-style parentheses for
/// negatives. The decimal separator is the dot.
pub fn parse_amount(value: &str) -> Result<BigDecimal, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("amount is blank".to_string());
    }

    let (negated, inner) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned: String = inner
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    if cleaned.is_empty() || cleaned == "-" {
        return Err(format!("unrecognized amount '{}'", trimmed));
    }

    let amount = BigDecimal::from_str(&cleaned)
        .map_err(|_| format!("unrecognized amount '{}'", trimmed))?;

    Ok(if negated { -amount } else { amount })
}

/// Canonical form of a license plate for comparisons
///
/// Uppercased, with separators removed, so `ab-123-cd` and `AB 123 CD`
/// compare equal.
pub fn canonical_plate(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Build a financial record from a validated row
///
/// Shares the issue-reporting contract with validation: a value that still
/// fails to parse here becomes an [`ImportIssue`], never a panic.
pub fn normalize(
    row: &RawRow,
    row_index: usize,
    record_type: RecordType,
) -> Result<FinancialRecord, ImportIssue> {
    let external_ref = required(row, row_index, record_type.reference_column())?.to_string();

    let raw_amount = required(row, row_index, record_type.amount_column())?;
    let amount = parse_amount(raw_amount)
        .map_err(|reason| ImportIssue::new(row_index, record_type.amount_column(), reason))?;

    let raw_date = required(row, row_index, record_type.date_column())?;
    let occurred_on = parse_date(raw_date)
        .map_err(|reason| ImportIssue::new(row_index, record_type.date_column(), reason))?;

    let agreement_ref = row
        .get_trimmed(columns::AGREEMENT_NO)
        .map(|s| s.to_string());
    let customer_name = row
        .get_trimmed(columns::CUSTOMER_NAME)
        .map(|s| s.to_string());

    let details = match record_type {
        RecordType::Payment => RecordDetails::Payment {
            method: row
                .get_trimmed(columns::METHOD)
                .map(PaymentMethod::from_raw)
                .unwrap_or(PaymentMethod::Other),
            agreement_ref,
            customer_name,
        },
        RecordType::Fine => RecordDetails::Fine {
            category: row
                .get_trimmed(columns::CATEGORY)
                .map(FineCategory::from_raw)
                .unwrap_or(FineCategory::Pending),
            license_plate: row
                .get_trimmed(columns::LICENSE_PLATE)
                .map(canonical_plate),
            agreement_ref,
            customer_name,
        },
    };

    Ok(FinancialRecord {
        external_ref,
        amount,
        occurred_on,
        details,
        raw: row.clone(),
    })
}

fn required<'a>(
    row: &'a RawRow,
    row_index: usize,
    column: &str,
) -> Result<&'a str, ImportIssue> {
    row.get_trimmed(column).ok_or_else(|| {
        ImportIssue::new(
            row_index,
            column,
            format!("required column '{}' is missing or blank", column),
        )
    })
}
