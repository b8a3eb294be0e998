//! bottledwater JSON - Change Event and Snapshot Encoders
//!
//! Turns typed rows and change notifications into one compact JSON document
//! each. Leaves first: [`ValueEncoder`] encodes single values,
//! [`encode_tuple`] whole rows, [`describe_key`] identity keys.
//! [`ChangeEventEncoder`] builds transaction and row-change envelopes,
//! [`describe_schema`] relation schemas, and [`SnapshotStream`] streams a
//! table one row document at a time.
//!
//! Every encoder takes an explicit [`EncodeContext`]; nothing reads ambient
//! session state.

mod buffer;
mod change;
mod context;
pub mod format;
mod key;
mod plugin;
mod schema;
mod snapshot;
mod tuple;
mod value;

pub use buffer::{JsonBuffer, Mark, ObjectWriter};
pub use change::ChangeEventEncoder;
pub use context::EncodeContext;
pub use format::{ensure_supported, is_supported, AVRO_NOT_SUPPORTED, JSON_NOT_SUPPORTED};
pub use key::{describe_identity, describe_key, write_key};
pub use plugin::{CollectingSink, JsonOutputPlugin, OutputSink};
pub use schema::{describe_relation, describe_schema};
pub use snapshot::{
    export_table_list, open_snapshot, ExportAll, SnapshotPolicy, SnapshotStream, StreamState,
};
pub use tuple::encode_tuple;
pub use value::{
    encode_date, encode_timestamp, encode_timestamptz, float_text, is_json_number, real_text,
    ValueEncoder, ValueHandler,
};
