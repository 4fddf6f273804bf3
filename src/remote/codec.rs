//! Server-side name encoding / 服务器文件名编码
//!
//! Names travel as raw bytes on the control and data connections. A name that
//! does not survive the trip both ways is reported, never replaced.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};

use crate::error::RemoteError;

#[derive(Debug, Clone, Copy)]
pub struct NameCodec {
    encoding: &'static Encoding,
}

impl Default for NameCodec {
    fn default() -> Self {
        Self { encoding: UTF_8 }
    }
}

impl NameCodec {
    /// Look up a WHATWG label such as `utf-8` or `gbk` / 按标签查找编码
    pub fn for_label(label: &str) -> Result<Self, RemoteError> {
        let label = label.trim();
        if label.is_empty() {
            return Ok(Self::default());
        }
        Encoding::for_label(label.as_bytes())
            .map(|encoding| Self { encoding })
            .ok_or_else(|| RemoteError::Encoding(format!("unknown encoding label '{}'", label)))
    }

    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    pub fn encode<'a>(&self, text: &'a str) -> Result<Cow<'a, [u8]>, RemoteError> {
        let (bytes, _, had_errors) = self.encoding.encode(text);
        if had_errors {
            return Err(RemoteError::Encoding(format!("'{}' cannot be written as {}", text, self.name())));
        }
        Ok(bytes)
    }

    /// Decode a name, rejecting bytes that would not encode back the same
    pub fn decode(&self, bytes: &[u8]) -> Result<String, RemoteError> {
        let (text, had_errors) = self.encoding.decode_without_bom_handling(bytes);
        if had_errors {
            return Err(RemoteError::Encoding(format!(
                "'{}' is not valid {}",
                String::from_utf8_lossy(bytes),
                self.name()
            )));
        }
        let (back, _, _) = self.encoding.encode(&text);
        if back.as_ref() != bytes {
            return Err(RemoteError::Encoding(format!("'{}' does not round-trip through {}", text, self.name())));
        }
        Ok(text.into_owned())
    }
}
