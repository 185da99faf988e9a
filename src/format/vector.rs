//! Fixed binary layout for embedding vectors
//!
//! All integers and floats are little-endian:
//!
//! ```text
//! [dimensions: i32][value: f32] x dimensions
//! [text_len: i32][utf-8 bytes]     present only with metadata; -1 = no text
//! [token_count: i32]               present only when a token count is known
//! ```
//!
//! Files written by one process must decode byte-for-byte in another, so
//! decoding is strict: every byte has to be accounted for.

use crate::error::{Error, Result};
use bytes::{Buf, BufMut};

const NO_TEXT: i32 = -1;

/// An embedding vector with its optional metadata
#[derive(Debug, Clone, PartialEq)]
pub struct VectorPayload {
    pub values: Vec<f32>,
    pub input_text: Option<String>,
    pub token_count: Option<i32>,
}

impl VectorPayload {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            input_text: None,
            token_count: None,
        }
    }

    pub fn with_input_text(mut self, text: impl Into<String>) -> Self {
        self.input_text = Some(text.into());
        self
    }

    pub fn with_token_count(mut self, count: i32) -> Self {
        self.token_count = Some(count);
        self
    }

    pub fn dimensions(&self) -> usize {
        self.values.len()
    }

    /// Exact size of the encoded form
    pub fn encoded_len(&self) -> usize {
        let mut len = 4 + 4 * self.values.len();
        if self.has_metadata() {
            len += 4 + self.input_text.as_ref().map_or(0, |t| t.len());
            if self.token_count.is_some() {
                len += 4;
            }
        }
        len
    }

    fn has_metadata(&self) -> bool {
        self.input_text.is_some() || self.token_count.is_some()
    }

    /// Encode into the fixed layout.
    ///
    /// Fails only when a length does not fit in an `i32`.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let dimensions = i32::try_from(self.values.len()).map_err(|_| {
            Error::Encode(format!("{} dimensions exceed i32 range", self.values.len()))
        })?;

        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.put_i32_le(dimensions);
        for value in &self.values {
            buf.put_f32_le(*value);
        }

        if self.has_metadata() {
            match &self.input_text {
                Some(text) => {
                    let len = i32::try_from(text.len()).map_err(|_| {
                        Error::Encode(format!("input text of {} bytes is too long", text.len()))
                    })?;
                    buf.put_i32_le(len);
                    buf.put_slice(text.as_bytes());
                }
                None => buf.put_i32_le(NO_TEXT),
            }
            if let Some(count) = self.token_count {
                buf.put_i32_le(count);
            }
        }

        Ok(buf)
    }

    /// Decode from the fixed layout.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut buf = data;

        if buf.remaining() < 4 {
            return Err(Error::Decode(format!(
                "vector payload of {} bytes is too short for a dimension header",
                data.len()
            )));
        }
        let dimensions = buf.get_i32_le();
        if dimensions < 0 {
            return Err(Error::Decode(format!(
                "negative dimension count {}",
                dimensions
            )));
        }
        let dimensions = dimensions as usize;
        let needed = dimensions * 4;
        if buf.remaining() < needed {
            return Err(Error::Decode(format!(
                "declared {} dimensions need {} value bytes but only {} remain",
                dimensions,
                needed,
                buf.remaining()
            )));
        }

        let mut values = Vec::with_capacity(dimensions);
        for _ in 0..dimensions {
            values.push(buf.get_f32_le());
        }

        let mut payload = VectorPayload::new(values);
        if !buf.has_remaining() {
            return Ok(payload);
        }

        if buf.remaining() < 4 {
            return Err(Error::Decode(format!(
                "{} trailing bytes after vector values",
                buf.remaining()
            )));
        }
        let text_len = buf.get_i32_le();
        if text_len != NO_TEXT {
            if text_len < 0 {
                return Err(Error::Decode(format!("invalid text length {}", text_len)));
            }
            let text_len = text_len as usize;
            if buf.remaining() < text_len {
                return Err(Error::Decode(format!(
                    "text length {} exceeds the {} remaining bytes",
                    text_len,
                    buf.remaining()
                )));
            }
            let text = std::str::from_utf8(&buf[..text_len])
                .map_err(|e| Error::Decode(format!("input text is not UTF-8: {}", e)))?
                .to_string();
            buf.advance(text_len);
            payload.input_text = Some(text);
        }

        match buf.remaining() {
            0 => {}
            4 => payload.token_count = Some(buf.get_i32_le()),
            n => {
                return Err(Error::Decode(format!(
                    "{} unexpected trailing bytes after vector metadata",
                    n
                )))
            }
        }

        Ok(payload)
    }

    /// Decode and require exactly `expected` dimensions
    pub fn from_bytes_with_dimensions(data: &[u8], expected: usize) -> Result<Self> {
        let payload = Self::from_bytes(data)?;
        if payload.dimensions() != expected {
            return Err(Error::Decode(format!(
                "vector has {} dimensions but {} were declared",
                payload.dimensions(),
                expected
            )));
        }
        Ok(payload)
    }
}
