//! Character encoding of the external source.
//!
//! Legacy source databases often store text in a single-byte or regional
//! encoding. Values read from them are transcoded to UTF-8, and values
//! interpolated into queries must be representable in the source encoding.

use encoding_rs::{Encoding, UTF_8};
use std::borrow::Cow;
use std::fmt::{Display, Formatter};

use crate::error::{ConnectorError, ConnectorResult};

/// Default encoding label.
pub const DEFAULT_ENCODING: &str = "utf-8";

/// A resolved source character encoding.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SourceEncoding {
    encoding: &'static Encoding,
}

impl SourceEncoding {
    /// Resolve an encoding from a WHATWG label (`utf-8`, `latin1`, `shift_jis`, ...).
    ///
    /// An empty label means UTF-8.
    pub fn for_label(label: &str) -> ConnectorResult<Self> {
        let label = label.trim();
        if label.is_empty() {
            return Ok(Self::utf8());
        }
        Encoding::for_label(label.as_bytes())
            .map(|encoding| Self { encoding })
            .ok_or_else(|| ConnectorError::UnsupportedEncoding {
                label: label.to_string(),
            })
    }

    /// UTF-8, the identity encoding.
    #[must_use]
    pub fn utf8() -> Self {
        Self { encoding: UTF_8 }
    }

    /// Canonical encoding name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    /// Whether no transcoding is needed.
    #[must_use]
    pub fn is_utf8(&self) -> bool {
        self.encoding == UTF_8
    }

    /// Decode raw source bytes to UTF-8.
    ///
    /// Malformed sequences become U+FFFD.
    #[must_use]
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        let (text, _had_errors) = self.encoding.decode_without_bom_handling(bytes);
        text
    }

    /// Encode a UTF-8 value into the source encoding.
    ///
    /// Fails when the value holds characters the encoding cannot express,
    /// instead of silently substituting them.
    pub fn encode<'a>(&self, value: &'a str) -> ConnectorResult<Cow<'a, [u8]>> {
        let (bytes, _, had_unmappable) = self.encoding.encode(value);
        if had_unmappable {
            return Err(ConnectorError::UnrepresentableValue {
                value: value.to_string(),
                encoding: self.name().to_string(),
            });
        }
        Ok(bytes)
    }

    /// Check that `value` survives a round trip through the source encoding.
    pub fn ensure_representable(&self, value: &str) -> ConnectorResult<()> {
        self.encode(value).map(|_| ())
    }
}

impl Default for SourceEncoding {
    fn default() -> Self {
        Self::utf8()
    }
}

impl std::fmt::Debug for SourceEncoding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SourceEncoding").field(&self.name()).finish()
    }
}

impl Display for SourceEncoding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
