//! Output format gating.
//!
//! JSON support is the `json` cargo feature. The binary AVRO format is not
//! part of this crate; its entry points exist so callers get the fixed
//! error instead of a missing symbol.

use bottledwater_core::{BottledWaterError, BottledWaterResult, OutputFormat};

pub const AVRO_NOT_SUPPORTED: &str =
    "this version of bottledwater was built without AVRO format support";

pub const JSON_NOT_SUPPORTED: &str =
    "this version of bottledwater was built without JSON format support";

/// Whether this build can produce `format`.
pub fn is_supported(format: OutputFormat) -> bool {
    match format {
        OutputFormat::Json => cfg!(feature = "json"),
        OutputFormat::Avro => false,
    }
}

/// Fail with the format's fixed error unless this build supports it.
pub fn ensure_supported(format: OutputFormat) -> BottledWaterResult<()> {
    if is_supported(format) {
        return Ok(());
    }
    Err(not_built(format))
}

fn not_built(format: OutputFormat) -> BottledWaterError {
    let message = match format {
        OutputFormat::Json => JSON_NOT_SUPPORTED,
        OutputFormat::Avro => AVRO_NOT_SUPPORTED,
    };
    tracing::debug!(%format, "output format not built");
    BottledWaterError::UnsupportedFeature { message }
}

/// AVRO entry points. Every call fails before looking at its arguments.
pub mod avro {
    use bottledwater_core::{BottledWaterResult, OutputFormat, RelationName};

    pub fn key_schema(_relation: &RelationName) -> BottledWaterResult<String> {
        unavailable()
    }

    pub fn row_schema(_relation: &RelationName) -> BottledWaterResult<String> {
        unavailable()
    }

    pub fn frame_schema() -> BottledWaterResult<String> {
        unavailable()
    }

    pub fn export(
        _relation: &RelationName,
        _exclude_child_tables: bool,
    ) -> BottledWaterResult<Vec<Vec<u8>>> {
        unavailable()
    }

    fn unavailable<T>() -> BottledWaterResult<T> {
        Err(super::not_built(OutputFormat::Avro))
    }
}
