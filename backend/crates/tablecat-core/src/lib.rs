//! # tablecat-core
//!
//! Multi-field secondary indexing over a partition/row-key store that has no
//! secondary indexes and no cross-partition transactions.
//!
//! A record is written once per index field, each copy in the partition for
//! that field's value, so a lookup by any indexed field is a single
//! partition scan. The multi-partition write is made eventually
//! all-or-nothing by a write-ahead log:
//!
//! ```text
//! insert(record)
//!   -> opportunistic recovery (bounded, rate-limited)
//!   -> encode: k target rows
//!   -> WAL append (one atomic row in "~wal")
//!   -> fan out k rows in parallel
//!   -> checkpoint (delete WAL row and older rows of the same record)
//! ```
//!
//! A crash anywhere after the append leaves a pending entry that the next
//! writer, or the background loop, replays.

pub mod catalog;
pub mod encoding;
pub mod error;
pub mod fanout;
pub mod query;
pub mod record;
pub mod recovery;
pub mod schema;
pub mod wal;
pub mod writer;

pub use catalog::{CatalogOptions, TableCatalog};
pub use encoding::{EncodedRecord, Encoder, IndexRowTarget, PrimaryKey};
pub use error::{CatalogError, Result};
pub use fanout::{FanoutOptions, FanoutReport, IDENTITY_PARTITION};
pub use query::RowKeyRange;
pub use record::{FieldValue, Record};
pub use recovery::{RecoveryOptions, RecoveryReport, RecoveryScope};
pub use schema::Schema;
pub use wal::{WalEntry, WalManager, WalOperation, WalStatus, WAL_PARTITION};
