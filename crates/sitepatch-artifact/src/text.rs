//! Best-effort text decoding for artifact bytes

/// Result of decoding artifact bytes as UTF-8
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Decoded text (invalid sequences replaced with U+FFFD)
    pub text: String,
    /// Set when the bytes were not clean UTF-8
    pub anomaly: Option<EncodingAnomaly>,
}

/// Description of a lossy decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct EncodingAnomaly {
    /// Byte offset of the first invalid sequence
    pub first_invalid_offset: usize,
    /// Number of replacement characters introduced
    pub replacements: usize,
}

/// Decode bytes as UTF-8, replacing invalid sequences
///
/// Never fails. A leading byte-order mark is preserved as-is.
#[must_use]
pub fn decode_lossy(bytes: &[u8]) -> Decoded {
    match std::str::from_utf8(bytes) {
        Ok(text) => Decoded {
            text: text.to_owned(),
            anomaly: None,
        },
        Err(err) => {
            let first_invalid_offset = err.valid_up_to();
            Decoded {
                text: String::from_utf8_lossy(bytes).into_owned(),
                anomaly: Some(EncodingAnomaly {
                    first_invalid_offset,
                    replacements: invalid_sequences(&bytes[first_invalid_offset..]),
                }),
            }
        }
    }
}

/// Number of invalid sequences, one per U+FFFD the lossy decode inserts
///
/// U+FFFD already present in the input is valid text and not counted.
fn invalid_sequences(mut bytes: &[u8]) -> usize {
    let mut count = 0;
    while let Err(err) = std::str::from_utf8(bytes) {
        count += 1;
        match err.error_len() {
            Some(len) => bytes = &bytes[err.valid_up_to() + len..],
            None => break,
        }
    }
    count
}
