//! Typed value to JSON token encoding.
//!
//! Dispatch is an ordered list of [`ValueHandler`]s; the first handler that
//! accepts a column type encodes the value. A fixed text fallback closes the
//! list, so any type nobody claims still encodes as an escaped string.
//! Embedders add categories with [`ValueEncoder::push_handler`], which slots
//! new handlers in front of the fallback without touching the built-ins.

mod datetime;
mod number;

pub use datetime::{encode_date, encode_timestamp, encode_timestamptz};
pub use number::{float_text, is_json_number, real_text};

use crate::buffer::JsonBuffer;
use crate::context::EncodeContext;
use crate::tuple::encode_tuple;
use bottledwater_core::{
    BottledWaterError, BottledWaterResult, ContractViolation, TypeDescriptor, TypeTag, Value,
};
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;

/// One predicate-handler pair of the dispatch list.
pub trait ValueHandler: Send + Sync {
    /// Short name, used in logs and `Debug` output.
    fn name(&self) -> &'static str;

    /// Whether this handler encodes values of `ty`.
    fn accepts(&self, ty: &TypeDescriptor, ctx: &EncodeContext) -> bool;

    /// Encode a non-null `value` of type `ty`.
    fn encode(
        &self,
        value: &Value,
        ty: &TypeDescriptor,
        ctx: &EncodeContext,
        out: &mut JsonBuffer,
    ) -> BottledWaterResult<()>;
}

static STANDARD: Lazy<Arc<ValueEncoder>> = Lazy::new(|| Arc::new(ValueEncoder::standard()));

/// Ordered value dispatch table.
pub struct ValueEncoder {
    handlers: Vec<Box<dyn ValueHandler>>,
    fallback: TextFallback,
}

impl ValueEncoder {
    /// An encoder with no handlers: everything goes to the text fallback.
    pub fn empty() -> Self {
        Self {
            handlers: Vec::new(),
            fallback: TextFallback,
        }
    }

    /// The built-in handlers, in dispatch order.
    pub fn standard() -> Self {
        let mut encoder = Self::empty();
        encoder.push_handler(BoolHandler);
        encoder.push_handler(PlainNumberHandler);
        encoder.push_handler(QuotedNumberHandler);
        encoder.push_handler(DateHandler);
        encoder.push_handler(TimestampHandler);
        encoder.push_handler(TimestampTzHandler);
        encoder.push_handler(ArrayHandler);
        encoder.push_handler(CompositeHandler);
        encoder.push_handler(JsonTextHandler);
        encoder.push_handler(JsonCastHandler);
        encoder
    }

    /// Process-wide shared instance of [`ValueEncoder::standard`].
    pub fn shared_standard() -> Arc<ValueEncoder> {
        Arc::clone(&STANDARD)
    }

    /// Append a handler after the existing ones, ahead of the text fallback.
    pub fn push_handler(&mut self, handler: impl ValueHandler + 'static) {
        self.handlers.push(Box::new(handler));
    }

    pub fn handler_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers
            .iter()
            .map(|h| h.name())
            .chain(std::iter::once(self.fallback.name()))
    }

    /// Encode one value as a JSON token. Null is `null` for every type.
    pub fn encode(
        &self,
        value: &Value,
        ty: &TypeDescriptor,
        ctx: &EncodeContext,
        out: &mut JsonBuffer,
    ) -> BottledWaterResult<()> {
        if value.is_null() {
            out.push_raw("null");
            return Ok(());
        }
        match self.handlers.iter().find(|h| h.accepts(ty, ctx)) {
            Some(handler) => handler.encode(value, ty, ctx, out),
            None => self.fallback.encode(value, ty, ctx, out),
        }
    }
}

impl Default for ValueEncoder {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for ValueEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.handler_names()).finish()
    }
}

fn mismatch(ty: &TypeDescriptor, value: &Value) -> BottledWaterError {
    ContractViolation::TypeMismatch {
        type_name: ty.name.clone(),
        value: value.kind(),
    }
    .into()
}

// ============================================================================
// BUILT-IN HANDLERS
// ============================================================================

struct BoolHandler;

impl ValueHandler for BoolHandler {
    fn name(&self) -> &'static str {
        "bool"
    }

    fn accepts(&self, ty: &TypeDescriptor, _ctx: &EncodeContext) -> bool {
        matches!(ty.tag, TypeTag::Bool)
    }

    fn encode(
        &self,
        value: &Value,
        ty: &TypeDescriptor,
        _ctx: &EncodeContext,
        out: &mut JsonBuffer,
    ) -> BottledWaterResult<()> {
        match value {
            Value::Bool(true) => out.push_raw("true"),
            Value::Bool(false) => out.push_raw("false"),
            other => return Err(mismatch(ty, other)),
        }
        Ok(())
    }
}

/// Small integers and floats of either width: bare numbers when the text
/// form is valid JSON.
struct PlainNumberHandler;

impl ValueHandler for PlainNumberHandler {
    fn name(&self) -> &'static str {
        "plain-number"
    }

    fn accepts(&self, ty: &TypeDescriptor, _ctx: &EncodeContext) -> bool {
        matches!(ty.tag, TypeTag::SmallInt | TypeTag::Float | TypeTag::Real)
    }

    fn encode(
        &self,
        value: &Value,
        ty: &TypeDescriptor,
        _ctx: &EncodeContext,
        out: &mut JsonBuffer,
    ) -> BottledWaterResult<()> {
        let text = match (&ty.tag, value) {
            (TypeTag::SmallInt, Value::Int(n) | Value::BigInt(n)) => n.to_string(),
            (TypeTag::Float, Value::Float(f)) => float_text(*f),
            (TypeTag::Real, Value::Float(f)) => real_text(*f as f32),
            (_, other) => return Err(mismatch(ty, other)),
        };
        if is_json_number(&text) {
            out.push_raw(&text);
            Ok(())
        } else {
            out.push_escaped(&text)
        }
    }
}

/// Big integers and decimals: always strings.
struct QuotedNumberHandler;

impl ValueHandler for QuotedNumberHandler {
    fn name(&self) -> &'static str {
        "quoted-number"
    }

    fn accepts(&self, ty: &TypeDescriptor, _ctx: &EncodeContext) -> bool {
        matches!(ty.tag, TypeTag::BigInt | TypeTag::Decimal)
    }

    fn encode(
        &self,
        value: &Value,
        ty: &TypeDescriptor,
        _ctx: &EncodeContext,
        out: &mut JsonBuffer,
    ) -> BottledWaterResult<()> {
        match (&ty.tag, value) {
            (TypeTag::BigInt, Value::Int(n) | Value::BigInt(n)) => out.push_display_quoted(n),
            (TypeTag::Decimal, Value::Decimal(text)) => out.push_escaped(text),
            (_, other) => Err(mismatch(ty, other)),
        }
    }
}

struct DateHandler;

impl ValueHandler for DateHandler {
    fn name(&self) -> &'static str {
        "date"
    }

    fn accepts(&self, ty: &TypeDescriptor, _ctx: &EncodeContext) -> bool {
        matches!(ty.tag, TypeTag::Date)
    }

    fn encode(
        &self,
        value: &Value,
        ty: &TypeDescriptor,
        _ctx: &EncodeContext,
        out: &mut JsonBuffer,
    ) -> BottledWaterResult<()> {
        match value {
            Value::Date(days) => encode_date(*days, out),
            other => Err(mismatch(ty, other)),
        }
    }
}

struct TimestampHandler;

impl ValueHandler for TimestampHandler {
    fn name(&self) -> &'static str {
        "timestamp"
    }

    fn accepts(&self, ty: &TypeDescriptor, _ctx: &EncodeContext) -> bool {
        matches!(ty.tag, TypeTag::Timestamp)
    }

    fn encode(
        &self,
        value: &Value,
        ty: &TypeDescriptor,
        _ctx: &EncodeContext,
        out: &mut JsonBuffer,
    ) -> BottledWaterResult<()> {
        match value {
            Value::Timestamp(micros) => encode_timestamp(*micros, out),
            other => Err(mismatch(ty, other)),
        }
    }
}

struct TimestampTzHandler;

impl ValueHandler for TimestampTzHandler {
    fn name(&self) -> &'static str {
        "timestamptz"
    }

    fn accepts(&self, ty: &TypeDescriptor, _ctx: &EncodeContext) -> bool {
        matches!(ty.tag, TypeTag::TimestampTz)
    }

    fn encode(
        &self,
        value: &Value,
        ty: &TypeDescriptor,
        ctx: &EncodeContext,
        out: &mut JsonBuffer,
    ) -> BottledWaterResult<()> {
        match value {
            Value::TimestampTz(micros) => encode_timestamptz(*micros, ctx.session_zone(), out),
            other => Err(mismatch(ty, other)),
        }
    }
}

struct ArrayHandler;

impl ArrayHandler {
    /// Elements that are themselves arrays under a non-array element type
    /// are inner dimensions and reuse the same element descriptor.
    fn encode_elements(
        elements: &[Value],
        element_ty: &TypeDescriptor,
        ctx: &EncodeContext,
        out: &mut JsonBuffer,
    ) -> BottledWaterResult<()> {
        out.push_byte(b'[');
        for (i, element) in elements.iter().enumerate() {
            if i > 0 {
                out.push_byte(b',');
            }
            match element {
                Value::Array(inner) if !matches!(element_ty.tag, TypeTag::Array(_)) => {
                    Self::encode_elements(inner, element_ty, ctx, out)?
                }
                _ => ctx.values().encode(element, element_ty, ctx, out)?,
            }
        }
        out.push_byte(b']');
        Ok(())
    }
}

impl ValueHandler for ArrayHandler {
    fn name(&self) -> &'static str {
        "array"
    }

    fn accepts(&self, ty: &TypeDescriptor, _ctx: &EncodeContext) -> bool {
        matches!(ty.tag, TypeTag::Array(_))
    }

    fn encode(
        &self,
        value: &Value,
        ty: &TypeDescriptor,
        ctx: &EncodeContext,
        out: &mut JsonBuffer,
    ) -> BottledWaterResult<()> {
        match (&ty.tag, value) {
            (TypeTag::Array(element_ty), Value::Array(elements)) => {
                Self::encode_elements(elements, element_ty, ctx, out)
            }
            (_, other) => Err(mismatch(ty, other)),
        }
    }
}

struct CompositeHandler;

impl ValueHandler for CompositeHandler {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn accepts(&self, ty: &TypeDescriptor, _ctx: &EncodeContext) -> bool {
        matches!(ty.tag, TypeTag::Composite(_))
    }

    fn encode(
        &self,
        value: &Value,
        ty: &TypeDescriptor,
        ctx: &EncodeContext,
        out: &mut JsonBuffer,
    ) -> BottledWaterResult<()> {
        match (&ty.tag, value) {
            (TypeTag::Composite(shape), Value::Composite(row)) => {
                encode_tuple(ctx, row, shape, out)
            }
            (_, other) => Err(mismatch(ty, other)),
        }
    }
}

/// `json` and `jsonb` values already hold JSON text and are embedded as is.
struct JsonTextHandler;

impl ValueHandler for JsonTextHandler {
    fn name(&self) -> &'static str {
        "json"
    }

    fn accepts(&self, ty: &TypeDescriptor, _ctx: &EncodeContext) -> bool {
        matches!(ty.tag, TypeTag::Opaque) && matches!(ty.name.as_str(), "json" | "jsonb")
    }

    fn encode(
        &self,
        value: &Value,
        ty: &TypeDescriptor,
        _ctx: &EncodeContext,
        out: &mut JsonBuffer,
    ) -> BottledWaterResult<()> {
        match value {
            Value::Text(text) => {
                out.push_raw(text);
                Ok(())
            }
            other => Err(mismatch(ty, other)),
        }
    }
}

/// Opaque types with a registered JSON cast. The cast output is embedded as is.
struct JsonCastHandler;

impl ValueHandler for JsonCastHandler {
    fn name(&self) -> &'static str {
        "json-cast"
    }

    /// A failed cast lookup is accepted too, so that `encode` reports it.
    fn accepts(&self, ty: &TypeDescriptor, ctx: &EncodeContext) -> bool {
        matches!(ty.tag, TypeTag::Opaque)
            && !matches!(ctx.catalog().json_cast(&ty.name), Ok(None))
    }

    fn encode(
        &self,
        value: &Value,
        ty: &TypeDescriptor,
        ctx: &EncodeContext,
        out: &mut JsonBuffer,
    ) -> BottledWaterResult<()> {
        let Value::Text(text) = value else {
            return Err(mismatch(ty, value));
        };
        match ctx.catalog().json_cast(&ty.name)? {
            Some(cast) => {
                let json = cast.to_json(text)?;
                out.push_raw(&json);
                Ok(())
            }
            None => out.push_escaped(text),
        }
    }
}

/// Catch-all: the type's text form as an escaped string.
struct TextFallback;

impl ValueHandler for TextFallback {
    fn name(&self) -> &'static str {
        "text"
    }

    fn accepts(&self, _ty: &TypeDescriptor, _ctx: &EncodeContext) -> bool {
        true
    }

    fn encode(
        &self,
        value: &Value,
        ty: &TypeDescriptor,
        _ctx: &EncodeContext,
        out: &mut JsonBuffer,
    ) -> BottledWaterResult<()> {
        match value {
            Value::Text(text) => out.push_escaped(text),
            other => Err(mismatch(ty, other)),
        }
    }
}
