//! Byte encoding of oracle answers.
//!
//! Layout: a 32-byte big-endian length `n`, then `n` bytes of image URI,
//! then the word in the remaining bytes. Both strings are UTF-8; either may
//! be empty, in which case the decoded field is `None`.

use nordle_registry::domain::fulfillment::OracleAnswer;
use thiserror::Error;

/// Width of the big-endian length prefix.
pub const LENGTH_PREFIX_LEN: usize = 32;

/// Errors decoding an encoded answer.
#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    /// The hex text could not be decoded.
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Fewer bytes than the length prefix.
    #[error("answer is {0} bytes, shorter than the {LENGTH_PREFIX_LEN}-byte length prefix")]
    Truncated(usize),

    /// The declared URI length runs past the end of the answer.
    #[error("declared image URI length {declared} exceeds the {available} bytes available")]
    LengthOverflow {
        /// Length from the prefix (saturated to `u64::MAX` if wider).
        declared: u64,
        /// Bytes after the prefix.
        available: usize,
    },

    /// The URI or word is not valid UTF-8.
    #[error("{0} is not valid UTF-8")]
    Utf8(&'static str),
}

/// Decodes an answer from raw bytes.
///
/// # Errors
///
/// Returns `CodecError` if the bytes are truncated, the length prefix runs
/// past the end, or either string is not UTF-8.
pub fn decode_answer(bytes: &[u8]) -> Result<OracleAnswer, CodecError> {
    if bytes.len() < LENGTH_PREFIX_LEN {
        return Err(CodecError::Truncated(bytes.len()));
    }
    let (prefix, rest) = bytes.split_at(LENGTH_PREFIX_LEN);
    let (high, low) = prefix.split_at(LENGTH_PREFIX_LEN - 8);

    let mut low_bytes = [0u8; 8];
    low_bytes.copy_from_slice(low);
    let declared = if high.iter().any(|b| *b != 0) {
        u64::MAX
    } else {
        u64::from_be_bytes(low_bytes)
    };
    let uri_len = usize::try_from(declared)
        .ok()
        .filter(|len| *len <= rest.len())
        .ok_or(CodecError::LengthOverflow {
            declared,
            available: rest.len(),
        })?;

    let (uri, word) = rest.split_at(uri_len);
    let uri = std::str::from_utf8(uri).map_err(|_| CodecError::Utf8("image URI"))?;
    let word = std::str::from_utf8(word).map_err(|_| CodecError::Utf8("word"))?;
    Ok(OracleAnswer {
        word: non_empty(word),
        image_uri: non_empty(uri),
    })
}

/// Decodes an answer from hex text, with or without a `0x` prefix.
///
/// # Errors
///
/// Returns `CodecError::Hex` for malformed hex, otherwise as
/// [`decode_answer`].
pub fn decode_answer_hex(text: &str) -> Result<OracleAnswer, CodecError> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    decode_answer(&hex::decode(digits)?)
}

/// Encodes an image URI and a word.
#[must_use]
pub fn encode_answer(image_uri: &str, word: &str) -> Vec<u8> {
    let mut bytes = vec![0u8; LENGTH_PREFIX_LEN - 8];
    bytes.extend_from_slice(&(image_uri.len() as u64).to_be_bytes());
    bytes.extend_from_slice(image_uri.as_bytes());
    bytes.extend_from_slice(word.as_bytes());
    bytes
}

/// Encodes an image URI and a word as `0x`-prefixed hex.
#[must_use]
pub fn encode_answer_hex(image_uri: &str, word: &str) -> String {
    format!("0x{}", hex::encode(encode_answer(image_uri, word)))
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_owned())
}
