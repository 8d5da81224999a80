//! Core types and data structures for the import and assignment subsystem

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Column names recognized in imported batches, per record type
pub mod columns {
    pub const PAYMENT_REF: &str = "payment_ref";
    pub const PAYMENT_DATE: &str = "payment_date";
    pub const AMOUNT: &str = "amount";
    pub const AGREEMENT_NO: &str = "agreement_no";
    pub const METHOD: &str = "method";
    pub const CUSTOMER_NAME: &str = "customer_name";

    pub const FINE_REF: &str = "fine_ref";
    pub const VIOLATION_DATE: &str = "violation_date";
    pub const FINE_AMOUNT: &str = "fine_amount";
    pub const LICENSE_PLATE: &str = "license_plate";
    pub const CATEGORY: &str = "category";
}

/// Kind of financial record a batch carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// Customer payment against a rental agreement
    Payment,
    /// Traffic fine incurred by a rented vehicle
    Fine,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Payment => "payment",
            RecordType::Fine => "fine",
        }
    }

    /// Columns that must be present in the batch header for this record type
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            RecordType::Payment => &[
                columns::PAYMENT_REF,
                columns::PAYMENT_DATE,
                columns::AMOUNT,
                columns::AGREEMENT_NO,
                columns::METHOD,
            ],
            RecordType::Fine => &[
                columns::FINE_REF,
                columns::VIOLATION_DATE,
                columns::FINE_AMOUNT,
                columns::LICENSE_PLATE,
                columns::CATEGORY,
            ],
        }
    }

    /// Column carrying the external reference for this record type
    pub fn reference_column(&self) -> &'static str {
        match self {
            RecordType::Payment => columns::PAYMENT_REF,
            RecordType::Fine => columns::FINE_REF,
        }
    }

    /// Column carrying the monetary amount for this record type
    pub fn amount_column(&self) -> &'static str {
        match self {
            RecordType::Payment => columns::AMOUNT,
            RecordType::Fine => columns::FINE_AMOUNT,
        }
    }

    /// Column carrying the occurrence date for this record type
    pub fn date_column(&self) -> &'static str {
        match self {
            RecordType::Payment => columns::PAYMENT_DATE,
            RecordType::Fine => columns::VIOLATION_DATE,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of an uploaded batch, exactly as parsed from the file
///
/// Column order is preserved. Rows are ephemeral: they exist only for the
/// lifetime of the import and inside the batch report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    columns: Vec<(String, String)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        Self { columns: pairs }
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.columns.push((column.into(), value.into()));
    }

    /// Get the value of a column, if the column is present
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Get a trimmed, non-blank value of a column
    pub fn get_trimmed(&self, column: &str) -> Option<&str> {
        self.get(column)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A problem found in a single imported row
///
/// Issues are collected into the batch report and never persisted beyond it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportIssue {
    /// 1-based index of the row in the uploaded file
    pub row_index: usize,
    /// Column name or short reason tag the issue refers to
    pub field: String,
    /// Human-readable description for the operator
    pub message: String,
}

impl ImportIssue {
    pub fn new(row_index: usize, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            row_index,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ImportIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {} [{}]: {}", self.row_index, self.field, self.message)
    }
}

/// Canonical payment methods
///
/// Raw method strings map through a fixed lookup; anything unrecognized
/// becomes `Other` so the import completes and the value stays visible for
/// manual review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Cheque,
    Other,
}

impl PaymentMethod {
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "cash" => PaymentMethod::Cash,
            "card" | "credit card" | "credit_card" | "debit card" | "debit_card" | "pos" => {
                PaymentMethod::Card
            }
            "bank transfer" | "bank_transfer" | "transfer" | "wire" | "sepa" | "iban" => {
                PaymentMethod::BankTransfer
            }
            "cheque" | "check" => PaymentMethod::Cheque,
            _ => PaymentMethod::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Cheque => "cheque",
            PaymentMethod::Other => "other",
        }
    }
}

/// Canonical traffic-fine categories
///
/// Same lookup discipline as [`PaymentMethod`]: unrecognized categories map
/// to `Pending` rather than failing normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FineCategory {
    Speeding,
    Parking,
    RedLight,
    TollEvasion,
    Pending,
}

impl FineCategory {
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "speeding" | "speed" | "speed limit" => FineCategory::Speeding,
            "parking" | "no parking" => FineCategory::Parking,
            "red light" | "red_light" | "signal" | "traffic light" => FineCategory::RedLight,
            "toll" | "toll evasion" | "toll_evasion" => FineCategory::TollEvasion,
            _ => FineCategory::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FineCategory::Speeding => "speeding",
            FineCategory::Parking => "parking",
            FineCategory::RedLight => "red_light",
            FineCategory::TollEvasion => "toll_evasion",
            FineCategory::Pending => "pending",
        }
    }
}

/// Record-type-specific fields of a financial record
///
/// Payments and fines carry different secondary keys, so the variants are
/// kept separate instead of one loosely-typed shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordDetails {
    Payment {
        method: PaymentMethod,
        agreement_ref: Option<String>,
        customer_name: Option<String>,
    },
    Fine {
        category: FineCategory,
        license_plate: Option<String>,
        agreement_ref: Option<String>,
        customer_name: Option<String>,
    },
}

/// A validated, canonicalized payment or fine
///
/// Immutable once created by normalization. The raw row is retained for
/// provenance and for resubmitting failed rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialRecord {
    /// External reference from the source system (dedup key component)
    pub external_ref: String,
    /// Signed amount; negative payments denote refunds/credits
    pub amount: BigDecimal,
    /// Date the payment was made or the violation occurred
    pub occurred_on: NaiveDate,
    /// Record-type-specific fields
    pub details: RecordDetails,
    /// Original row as uploaded
    pub raw: RawRow,
}

impl FinancialRecord {
    pub fn record_type(&self) -> RecordType {
        match self.details {
            RecordDetails::Payment { .. } => RecordType::Payment,
            RecordDetails::Fine { .. } => RecordType::Fine,
        }
    }

    pub fn agreement_ref(&self) -> Option<&str> {
        match &self.details {
            RecordDetails::Payment { agreement_ref, .. }
            | RecordDetails::Fine { agreement_ref, .. } => agreement_ref.as_deref(),
        }
    }

    pub fn license_plate(&self) -> Option<&str> {
        match &self.details {
            RecordDetails::Payment { .. } => None,
            RecordDetails::Fine { license_plate, .. } => license_plate.as_deref(),
        }
    }

    pub fn customer_name(&self) -> Option<&str> {
        match &self.details {
            RecordDetails::Payment { customer_name, .. }
            | RecordDetails::Fine { customer_name, .. } => customer_name.as_deref(),
        }
    }

    /// Signed effect of this record on an agreement's outstanding balance
    ///
    /// Payments reduce what the customer owes, fines increase it. A refund
    /// (negative payment) therefore increases the balance again.
    pub fn balance_delta(&self) -> BigDecimal {
        match self.record_type() {
            RecordType::Payment => -self.amount.clone(),
            RecordType::Fine => self.amount.clone(),
        }
    }
}

/// Lifecycle status of a rental agreement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgreementStatus {
    Active,
    Closed,
}

/// A rental agreement, owned by the surrounding application
///
/// The import subsystem only reads agreements; it never creates or deletes
/// them. `agreement_number` is human-assigned and may repeat across
/// historical records; `id` is system-assigned and unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agreement {
    pub id: Uuid,
    pub agreement_number: String,
    pub customer_name: String,
    pub vehicle_plate: String,
    pub start_date: NaiveDate,
    /// `None` means the agreement is open-ended
    pub end_date: Option<NaiveDate>,
    pub status: AgreementStatus,
    /// Outstanding balance the customer owes on this agreement
    pub balance: BigDecimal,
}

impl Agreement {
    /// Create a new active agreement with a zero balance
    pub fn new(
        agreement_number: impl Into<String>,
        customer_name: impl Into<String>,
        vehicle_plate: impl Into<String>,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            agreement_number: agreement_number.into(),
            customer_name: customer_name.into(),
            vehicle_plate: vehicle_plate.into(),
            start_date,
            end_date: None,
            status: AgreementStatus::Active,
            balance: BigDecimal::from(0),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AgreementStatus::Active
    }

    /// Whether `date` falls inside this agreement's rental period (inclusive)
    pub fn covers(&self, date: NaiveDate) -> bool {
        if date < self.start_date {
            return false;
        }
        match self.end_date {
            Some(end) => date <= end,
            None => true,
        }
    }
}

/// Strength of an assignment decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    /// Matched by agreement number or id
    Exact,
    /// Matched by secondary keys and date containment
    Heuristic,
    /// No unambiguous match; left for manual assignment
    None,
}

/// Outcome of matching one financial record against the agreement set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub record: FinancialRecord,
    pub agreement_id: Option<Uuid>,
    /// Equals the record amount when assigned, zero otherwise
    pub amount_assigned: BigDecimal,
    pub confidence: Confidence,
}

impl AssignmentResult {
    pub fn assigned(record: FinancialRecord, agreement_id: Uuid, confidence: Confidence) -> Self {
        let amount_assigned = record.amount.clone();
        Self {
            record,
            agreement_id: Some(agreement_id),
            amount_assigned,
            confidence,
        }
    }

    pub fn unassigned(record: FinancialRecord) -> Self {
        Self {
            record,
            agreement_id: None,
            amount_assigned: BigDecimal::from(0),
            confidence: Confidence::None,
        }
    }

    pub fn is_assigned(&self) -> bool {
        self.confidence != Confidence::None
    }
}

/// Key preventing re-application of an already-applied record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DedupKey {
    pub agreement_id: Uuid,
    pub external_ref: String,
}

impl DedupKey {
    pub fn new(agreement_id: Uuid, external_ref: impl Into<String>) -> Self {
        Self {
            agreement_id,
            external_ref: external_ref.into(),
        }
    }
}

/// Result of applying an assignment to an agreement balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceUpdate {
    pub agreement_id: Uuid,
    pub previous_balance: BigDecimal,
    pub new_balance: BigDecimal,
    /// `false` when the dedup key had already been applied (re-run)
    pub applied: bool,
}

/// Per-row outcome, as counted by the report and seen by progress observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowOutcome {
    /// Imported and linked to an agreement
    Assigned {
        external_ref: String,
        agreement_id: Uuid,
        confidence: Confidence,
    },
    /// Imported, but no unambiguous agreement match
    Unassigned { external_ref: String },
    /// Rejected by validation or normalization
    Rejected { issue: ImportIssue },
    /// Valid row that could not be persisted
    Failed {
        external_ref: String,
        reason: String,
    },
}

/// A row that validated but failed to persist
///
/// The raw payload is retained so the caller can resubmit just these rows
/// as a new batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceFailure {
    pub row_index: usize,
    pub external_ref: String,
    pub reason: String,
    pub raw: RawRow,
}

/// Terminal state of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    /// Every row imported with no issues and no failures
    Completed,
    /// All rows processed, but at least one issue or failure occurred
    PartiallyCompleted,
}

/// Summary of one import batch, surfaced to the caller when the batch ends
///
/// The report distinguishes imported-and-assigned, imported-but-unassigned,
/// rejected, and failed rows so an operator can act on each category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub record_type: RecordType,
    pub status: BatchStatus,
    pub total_rows: usize,
    pub valid_rows: usize,
    pub invalid_rows: usize,
    /// Sum of amounts over valid rows
    pub total_amount: BigDecimal,
    pub issues: Vec<ImportIssue>,
    /// One entry per valid, non-failed record (assigned or unassigned)
    pub assignments: Vec<AssignmentResult>,
    pub failures: Vec<PersistenceFailure>,
}

impl BatchReport {
    pub fn new(batch_id: Uuid, record_type: RecordType) -> Self {
        Self {
            batch_id,
            record_type,
            status: BatchStatus::Completed,
            total_rows: 0,
            valid_rows: 0,
            invalid_rows: 0,
            total_amount: BigDecimal::from(0),
            issues: Vec::new(),
            assignments: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Records that were linked to an agreement
    pub fn assigned(&self) -> impl Iterator<Item = &AssignmentResult> {
        self.assignments.iter().filter(|a| a.is_assigned())
    }

    /// Records imported without an agreement link, pending manual assignment
    pub fn unassigned(&self) -> impl Iterator<Item = &AssignmentResult> {
        self.assignments.iter().filter(|a| !a.is_assigned())
    }

    /// Sum of assigned amounts; never exceeds `total_amount`
    pub fn assigned_total(&self) -> BigDecimal {
        self.assigned().map(|a| &a.amount_assigned).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.status == BatchStatus::Completed
    }

    /// Raw payloads of persistence-failed rows, for an explicit retry batch
    pub fn failed_rows(&self) -> Vec<RawRow> {
        self.failures.iter().map(|f| f.raw.clone()).collect()
    }
}

/// Options governing one import session
///
/// Created per batch and discarded with it; there is no global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Date against which future-dated violations are checked
    pub reference_date: NaiveDate,
    /// How many days past the reference date a violation may be dated
    pub max_future_days: i64,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            reference_date: chrono::Utc::now().date_naive(),
            max_future_days: 1,
        }
    }
}

/// Errors that can occur in the import subsystem
///
/// Only structural problems abort a batch; per-row problems are collected
/// as [`ImportIssue`]s or [`PersistenceFailure`]s inside the report.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("missing required {record_type} headers: {missing:?}")]
    MissingHeaders {
        record_type: RecordType,
        missing: Vec<String>,
    },
    #[error("batch contains no header row")]
    EmptyBatch,
    #[error("malformed input: {0}")]
    Malformed(String),
    #[error("agreement not found: {0}")]
    AgreementNotFound(Uuid),
    #[error("validation error: {0}")]
    Validation(String),
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::Malformed(err.to_string())
    }
}

/// Result type for import operations
pub type ImportResult<T> = Result<T, ImportError>;
