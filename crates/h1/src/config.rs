//! Tunable limits for the parser and the serializer.
//!
//! Both structs are plain values: build them with `Default` plus the `with_*`
//! helpers, or, with the `serde` feature enabled, deserialize them from whatever
//! configuration format the host application already uses. Missing fields fall
//! back to the defaults below.

/// Default upper bound for the start-line plus header block, in bytes.
pub const DEFAULT_MAX_HEAD_BYTES: usize = 100 * 1024;

/// Default maximum number of header fields in one message.
pub const DEFAULT_MAX_HEADERS: usize = 128;

/// Default upper bound for a body that the parser buffers in memory.
pub const DEFAULT_MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// Default size of the serializer scratch buffer.
pub const DEFAULT_SCRATCH_BUFFER_SIZE: usize = 2048;

/// Smallest scratch buffer the serializer accepts; smaller values are rounded up
/// so a chunk header and at least some data always fit.
pub const MIN_SCRATCH_BUFFER_SIZE: usize = 64;

/// Limits applied while parsing inbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct ParserConfig {
    /// Cumulative size of start-line and header block.
    pub max_head_bytes: usize,
    /// Maximum number of header fields.
    pub max_headers: usize,
    /// Maximum size of a body collected into memory by [`MessageParser`](crate::codec::MessageParser).
    /// Streaming consumers of [`MessageDecoder`](crate::codec::MessageDecoder) are not bound by it.
    pub max_body_bytes: u64,
    /// Fail messages that carry both `Transfer-Encoding: chunked` and
    /// `Content-Length` instead of letting chunked framing win.
    pub reject_ambiguous_framing: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_head_bytes: DEFAULT_MAX_HEAD_BYTES,
            max_headers: DEFAULT_MAX_HEADERS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            reject_ambiguous_framing: false,
        }
    }
}

impl ParserConfig {
    #[must_use]
    pub fn with_max_head_bytes(mut self, max_head_bytes: usize) -> Self {
        self.max_head_bytes = max_head_bytes;
        self
    }

    #[must_use]
    pub fn with_max_headers(mut self, max_headers: usize) -> Self {
        self.max_headers = max_headers;
        self
    }

    #[must_use]
    pub fn with_max_body_bytes(mut self, max_body_bytes: u64) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    #[must_use]
    pub fn with_reject_ambiguous_framing(mut self, reject: bool) -> Self {
        self.reject_ambiguous_framing = reject;
        self
    }
}

/// Settings for the outbound direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct SerializerConfig {
    /// Size of the scratch buffer that every transport write is drained from.
    /// The whole start-line must fit into it.
    pub scratch_buffer_size: usize,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self { scratch_buffer_size: DEFAULT_SCRATCH_BUFFER_SIZE }
    }
}

impl SerializerConfig {
    #[must_use]
    pub fn with_scratch_buffer_size(mut self, scratch_buffer_size: usize) -> Self {
        self.scratch_buffer_size = scratch_buffer_size;
        self
    }

    /// The scratch size actually used, never below [`MIN_SCRATCH_BUFFER_SIZE`].
    pub fn effective_scratch_size(&self) -> usize {
        self.scratch_buffer_size.max(MIN_SCRATCH_BUFFER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ParserConfig::default();
        assert_eq!(config.max_head_bytes, 100 * 1024);
        assert_eq!(config.max_headers, 128);
        assert_eq!(config.max_body_bytes, 10 * 1024 * 1024);
        assert!(!config.reject_ambiguous_framing);

        assert_eq!(SerializerConfig::default().scratch_buffer_size, 2048);
    }

    #[test]
    fn scratch_size_has_a_floor() {
        let config = SerializerConfig::default().with_scratch_buffer_size(8);
        assert_eq!(config.effective_scratch_size(), MIN_SCRATCH_BUFFER_SIZE);

        let config = SerializerConfig::default().with_scratch_buffer_size(4096);
        assert_eq!(config.effective_scratch_size(), 4096);
    }
}
