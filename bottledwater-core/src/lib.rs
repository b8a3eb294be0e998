//! bottledwater Core - Data Types
//!
//! Pure data structures shared by the encoders and the catalog layer:
//! column/row descriptors, typed values, relation metadata, change events,
//! configuration, and the error taxonomy. No encoding logic lives here.

mod column;
mod config;
mod error;
mod event;
mod relation;
mod value;

pub use column::{ColumnDescriptor, RowDescriptor, TypeDescriptor, TypeModifier, TypeTag};
pub use config::{EncoderConfig, OutputFormat, SessionZone};
pub use error::{
    BottledWaterError, BottledWaterResult, ConfigError, ContractViolation, LookupError,
    RangeError, UnsupportedInput,
};
pub use event::{ChangeEvent, ChangeKind, WalPosition, Xid};
pub use relation::{
    IndexInfo, Oid, Persistence, Relation, RelationIdentity, RelationKind, RelationName,
    ReplicaIdentity,
};
pub use value::{
    storage_epoch, Row, Value, DATE_INFINITY, DATE_NEG_INFINITY, TIMESTAMP_INFINITY,
    TIMESTAMP_NEG_INFINITY,
};
