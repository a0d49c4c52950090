//! # Value Codec
//!
//! Turns payloads into the bytes stored in the backend and back again.
//!
//! The mode is fixed for the lifetime of a cache: a compressed store always
//! decompresses on read and never guesses per entry whether compression was
//! applied.

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

/// Storage representation chosen once from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecMode {
    /// Payload bytes stored as-is
    Plain,
    /// Payload bytes stored as a zstd frame
    Zstd { level: i32 },
}

/// Payload encoder/decoder with an entry size limit
///
/// The limit is enforced in both modes, so `Plain` is an identity transform
/// only for payloads within `max_entry_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueCodec {
    mode: CodecMode,
    max_entry_size: usize,
}

impl ValueCodec {
    /// Create a codec with an explicit mode
    #[must_use]
    pub const fn new(mode: CodecMode, max_entry_size: usize) -> Self {
        Self {
            mode,
            max_entry_size,
        }
    }

    /// Derive the codec from cache configuration
    #[must_use]
    pub const fn from_config(config: &CacheConfig) -> Self {
        let mode = if config.compression {
            CodecMode::Zstd {
                level: config.compression_level,
            }
        } else {
            CodecMode::Plain
        };
        Self::new(mode, config.max_entry_size)
    }

    #[must_use]
    pub const fn mode(&self) -> CodecMode {
        self.mode
    }

    #[must_use]
    pub const fn max_entry_size(&self) -> usize {
        self.max_entry_size
    }

    /// Reject payloads above the limit, measured before compression
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::EntryTooLarge`].
    pub const fn check_size(&self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.max_entry_size {
            return Err(CacheError::EntryTooLarge {
                size: payload.len(),
                limit: self.max_entry_size,
            });
        }
        Ok(())
    }

    /// Encode a payload for storage
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::EntryTooLarge`] when the uncompressed payload is
    /// over the limit and [`CacheError::CorruptData`] when the compressor fails.
    pub fn encode(&self, payload: &[u8]) -> Result<Vec<u8>> {
        self.check_size(payload)?;

        match self.mode {
            CodecMode::Plain => Ok(payload.to_vec()),
            CodecMode::Zstd { level } => zstd::encode_all(payload, level)
                .map_err(|e| CacheError::CorruptData(format!("compression failed: {e}"))),
        }
    }

    /// Decode stored bytes back into the payload
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::CorruptData`] when the bytes are not a valid frame.
    pub fn decode(&self, stored: Vec<u8>) -> Result<Vec<u8>> {
        match self.mode {
            CodecMode::Plain => Ok(stored),
            CodecMode::Zstd { .. } => zstd::decode_all(stored.as_slice())
                .map_err(|e| CacheError::CorruptData(format!("decompression failed: {e}"))),
        }
    }

    /// Decode stored bytes into a UTF-8 payload
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::CorruptData`] for an invalid frame or non UTF-8 text.
    pub fn decode_str(&self, stored: Vec<u8>) -> Result<String> {
        let bytes = self.decode(stored)?;
        String::from_utf8(bytes)
            .map_err(|e| CacheError::CorruptData(format!("payload is not UTF-8: {e}")))
    }
}

impl Default for ValueCodec {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
