//! Append-only JSON output buffer with checkpoint/truncate support.
//!
//! The snapshot streamer writes its per-relation template once, takes a
//! [`Mark`] at the end of it, and rewinds to that mark before each row.
//! Everything the encoders write goes through here, so the buffer only ever
//! holds UTF-8.

use bottledwater_core::{BottledWaterError, BottledWaterResult};
use std::fmt::Display;
use std::io::Write;

/// A checkpoint into a [`JsonBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Mark(usize);

impl Mark {
    /// Byte offset of the checkpoint.
    pub fn offset(self) -> usize {
        self.0
    }
}

/// Growable byte buffer for one document at a time.
#[derive(Debug, Default, Clone)]
pub struct JsonBuffer {
    buf: Vec<u8>,
}

impl JsonBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Current end of the buffer.
    #[inline]
    pub fn mark(&self) -> Mark {
        Mark(self.buf.len())
    }

    /// Discard everything written after `mark`. Capacity is kept.
    pub fn truncate_to(&mut self, mark: Mark) {
        self.buf.truncate(mark.0);
    }

    /// Append trusted, already well-formed JSON.
    #[inline]
    pub fn push_raw(&mut self, json: &str) {
        self.buf.extend_from_slice(json.as_bytes());
    }

    #[inline]
    pub fn push_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Append `text` as a quoted, escaped JSON string.
    pub fn push_escaped(&mut self, text: &str) -> BottledWaterResult<()> {
        serde_json::to_writer(&mut self.buf, text).map_err(serialization)
    }

    /// Append the display form of `value` without quoting.
    pub fn push_display(&mut self, value: impl Display) -> BottledWaterResult<()> {
        write!(self.buf, "{}", value).map_err(serialization)
    }

    /// Append the display form of `value` as a quoted JSON string.
    pub fn push_display_quoted(&mut self, value: impl Display) -> BottledWaterResult<()> {
        self.push_escaped(&value.to_string())
    }

    /// Start a JSON object; fields are written through the returned writer.
    pub fn object(&mut self) -> ObjectWriter<'_> {
        self.push_byte(b'{');
        ObjectWriter {
            out: self,
            fields: 0,
        }
    }

    pub fn as_str(&self) -> BottledWaterResult<&str> {
        std::str::from_utf8(&self.buf).map_err(serialization)
    }

    /// Copy the current contents out as a document.
    pub fn to_document(&self) -> BottledWaterResult<String> {
        self.as_str().map(str::to_string)
    }

    /// Consume the buffer as a document.
    pub fn into_document(self) -> BottledWaterResult<String> {
        String::from_utf8(self.buf).map_err(serialization)
    }
}

fn serialization(err: impl Display) -> BottledWaterError {
    BottledWaterError::Serialization {
        reason: err.to_string(),
    }
}

/// Writes comma-separated `"name":value` pairs into an open object.
pub struct ObjectWriter<'a> {
    out: &'a mut JsonBuffer,
    fields: usize,
}

impl<'a> ObjectWriter<'a> {
    /// Write the separator and key of the next field and return the buffer
    /// for its value.
    pub fn field(&mut self, name: &str) -> BottledWaterResult<&mut JsonBuffer> {
        if self.fields > 0 {
            self.out.push_byte(b',');
        }
        self.fields += 1;
        self.out.push_escaped(name)?;
        self.out.push_byte(b':');
        Ok(&mut *self.out)
    }

    /// A field whose value is an escaped string.
    pub fn string_field(&mut self, name: &str, value: &str) -> BottledWaterResult<()> {
        self.field(name)?.push_escaped(value)
    }

    /// A field whose value is trusted raw JSON.
    pub fn raw_field(&mut self, name: &str, json: &str) -> BottledWaterResult<()> {
        self.field(name)?.push_raw(json);
        Ok(())
    }

    pub fn field_count(&self) -> usize {
        self.fields
    }

    /// Leave the object open and hand the buffer back. Used by templates
    /// whose tail is written later.
    pub fn into_open(self) -> &'a mut JsonBuffer {
        self.out
    }

    /// Close the object.
    pub fn finish(self) {
        self.out.push_byte(b'}');
    }
}
