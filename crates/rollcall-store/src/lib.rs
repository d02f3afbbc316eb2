//! rollcall-store — Durable local state for the attendance system.
//!
//! Three stores, each loaded at startup and flushed after mutation:
//! the signature gallery (identity → signature + reference image), the
//! attendance ledger (one CSV sheet), and the append-only error log.
//!
//! All stores assume a single process instance; concurrent external
//! modification of the backing files is undefined behavior.

mod atomic;
pub mod error_log;
pub mod gallery;
pub mod ledger;

pub use error_log::ErrorLog;
pub use gallery::{Gallery, GalleryError};
pub use ledger::{Ledger, LedgerError, LedgerRow, MarkOutcome, YearRule};
