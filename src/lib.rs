//! # Fleet Imports
//!
//! Payment and traffic-fine import core for fleet rental back-offices:
//! turning raw bulk-export rows into validated financial records,
//! assigning each record to the right rental agreement, and keeping
//! running balances correct across re-runs.
//!
//! ## Features
//!
//! - **Row validation**: required-column, amount, and date rules per
//!   record type, with per-row issues that never abort a batch
//! - **Normalization**: multi-format dates (day-first convention),
//!   currency-decorated amounts, and canonical method/category enums
//! - **Assignment**: exact identifier matching first, then conservative
//!   heuristic matching over vehicle/customer and rental period
//! - **Idempotent balances**: decimal arithmetic with a
//!   `(agreement, external_ref)` dedup key, safe against re-imports
//! - **Batch reports**: assigned / unassigned / rejected / failed rows
//!   distinguished for operator remediation, with failed rows
//!   re-submittable as a new batch
//! - **Storage abstraction**: backend-agnostic design with trait-based
//!   stores; an in-memory store backs tests and development
//!
//! ## Quick Start
//!
//! ```rust
//! use fleet_imports::{ImportSession, MemoryStore, RecordType};
//!
//! // The store would normally be your database adapter implementing
//! // AgreementStore + RecordStore.
//! // let mut session = ImportSession::new(MemoryStore::new());
//! // let report = session.run_reader(RecordType::Payment, file).await?;
//! ```

pub mod assign;
pub mod import;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use assign::*;
pub use import::*;
pub use traits::*;
pub use types::*;
pub use utils::*;
