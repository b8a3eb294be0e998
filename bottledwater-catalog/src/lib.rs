//! bottledwater Catalog - Collaborator Traits and In-Memory Implementation
//!
//! Defines what the encoders need from the surrounding database: relation
//! metadata, index lists, default expressions, registered JSON casts, and
//! forward-only row cursors. A database-backed implementation lives with the
//! host extension; [`InMemoryCatalog`] serves tests and embedders.

mod in_memory;
mod traits;

pub use in_memory::InMemoryCatalog;
pub use traits::{Catalog, DefaultExpression, JsonCast, RowCursor};
