//! Versioned binary envelope for serialized pipelines.
//!
//! ```text
//! [4-byte magic: "AOPL"]
//! [2-byte format version, u16 little-endian]
//! [4-byte payload length N, u32 little-endian]
//! [N-byte JSON payload]
//! [32-byte SHA-256 of the payload]
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

pub const MAGIC: &[u8; 4] = b"AOPL";
pub const FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = 4 + 2 + 4;
const DIGEST_LEN: usize = 32;

/// Wrap `document` as JSON in the envelope.
pub fn encode<T: Serialize>(document: &T) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(document)?;
    let length = u32::try_from(payload.len())
        .map_err(|_| Error::serialization(format!("payload of {} bytes is too large", payload.len())))?;

    let mut blob = Vec::with_capacity(HEADER_LEN + payload.len() + DIGEST_LEN);
    blob.extend_from_slice(MAGIC);
    blob.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    blob.extend_from_slice(&length.to_le_bytes());
    blob.extend_from_slice(&payload);
    blob.extend_from_slice(&Sha256::digest(&payload));
    Ok(blob)
}

/// Validate the envelope and decode its JSON payload.
pub fn decode<T: DeserializeOwned>(blob: &[u8]) -> Result<T> {
    if blob.len() < HEADER_LEN + DIGEST_LEN {
        return Err(Error::serialization(format!(
            "pipeline blob is truncated ({} bytes)",
            blob.len()
        )));
    }
    let (magic, rest) = blob.split_at(4);
    if magic != MAGIC {
        return Err(Error::serialization(format!(
            "bad pipeline magic {}",
            hex::encode(magic)
        )));
    }

    let (version, rest) = rest.split_at(2);
    let version = u16::from_le_bytes([version[0], version[1]]);
    if version != FORMAT_VERSION {
        return Err(Error::serialization(format!(
            "unsupported pipeline format version {version}"
        )));
    }

    let (length, rest) = rest.split_at(4);
    let length = u32::from_le_bytes([length[0], length[1], length[2], length[3]]) as usize;
    if rest.len() != length + DIGEST_LEN {
        return Err(Error::serialization(format!(
            "pipeline payload length {length} does not match blob size"
        )));
    }

    let (payload, digest) = rest.split_at(length);
    let actual = Sha256::digest(payload);
    if actual.as_slice() != digest {
        return Err(Error::serialization(format!(
            "pipeline checksum mismatch: expected {}, got {}",
            hex::encode(digest),
            hex::encode(actual)
        )));
    }

    serde_json::from_slice(payload)
        .map_err(|e| Error::serialization(format!("pipeline document: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn sample() -> Vec<u8> {
        encode(&json!({"model": "lasso", "split": 0.8})).unwrap()
    }

    #[test]
    fn test_layout() {
        let blob = sample();
        assert_eq!(&blob[..4], b"AOPL");
        assert_eq!(&blob[4..6], &[1, 0]);
        let length = u32::from_le_bytes([blob[6], blob[7], blob[8], blob[9]]) as usize;
        assert_eq!(blob.len(), HEADER_LEN + length + DIGEST_LEN);

        let decoded: Value = decode(&blob).unwrap();
        assert_eq!(decoded["model"], "lasso");
    }

    #[test]
    fn test_bad_magic() {
        let mut blob = sample();
        blob[0] = b'X';
        assert!(matches!(decode::<Value>(&blob), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_unknown_version() {
        let mut blob = sample();
        blob[4] = 2;
        assert!(matches!(decode::<Value>(&blob), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_flipped_payload_byte_fails_checksum() {
        let mut blob = sample();
        blob[HEADER_LEN + 2] ^= 0x01;
        let err = decode::<Value>(&blob).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_truncated_and_extended() {
        let blob = sample();
        assert!(matches!(
            decode::<Value>(&blob[..blob.len() - 1]),
            Err(Error::Serialization(_))
        ));
        assert!(matches!(decode::<Value>(&blob[..5]), Err(Error::Serialization(_))));

        let mut longer = blob;
        longer.push(0);
        assert!(matches!(decode::<Value>(&longer), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_valid_envelope_with_wrong_shape() {
        #[derive(Debug, serde::Deserialize)]
        struct Expected {
            #[allow(dead_code)]
            dataset: String,
        }
        let blob = encode(&json!({"other": 1})).unwrap();
        assert!(matches!(decode::<Expected>(&blob), Err(Error::Serialization(_))));
    }
}
