//! Datagram framing: `i32 method_id (BE) · i32 payload_len (BE) · UTF-8 payload`.

use contracts::SyncError;

/// Fixed header size: two big-endian i32 fields.
pub const HEADER_BYTES: usize = 8;

/// Maximum payload size per datagram; the transport does not fragment.
pub const MAX_PAYLOAD_BYTES: usize = 64 * 1024;

/// Encode one RPC frame.
///
/// # Errors
/// `PayloadTooLarge` when the payload exceeds [`MAX_PAYLOAD_BYTES`].
pub fn encode_frame(method_id: i32, payload: &str) -> Result<Vec<u8>, SyncError> {
    let bytes = payload.as_bytes();
    if bytes.len() > MAX_PAYLOAD_BYTES {
        return Err(SyncError::PayloadTooLarge {
            len: bytes.len(),
            max: MAX_PAYLOAD_BYTES,
        });
    }

    let mut frame = Vec::with_capacity(HEADER_BYTES + bytes.len());
    frame.extend_from_slice(&method_id.to_be_bytes());
    frame.extend_from_slice(&(bytes.len() as i32).to_be_bytes());
    frame.extend_from_slice(bytes);
    Ok(frame)
}

/// Decode one RPC frame into `(method_id, payload)`.
///
/// # Errors
/// `MalformedPayload` for truncated headers, length mismatches, negative
/// lengths, or non-UTF-8 payloads.
pub fn decode_frame(buf: &[u8]) -> Result<(i32, String), SyncError> {
    if buf.len() < HEADER_BYTES {
        return Err(SyncError::malformed(
            0,
            format!("datagram too short: {} bytes", buf.len()),
        ));
    }

    let method_id = i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let payload_len = i32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);

    if payload_len < 0 {
        return Err(SyncError::malformed(
            method_id,
            format!("negative payload length: {payload_len}"),
        ));
    }
    let payload_len = payload_len as usize;
    if buf.len() != HEADER_BYTES + payload_len {
        return Err(SyncError::malformed(
            method_id,
            format!(
                "length mismatch: header says {}, datagram carries {}",
                payload_len,
                buf.len() - HEADER_BYTES
            ),
        ));
    }

    let payload = std::str::from_utf8(&buf[HEADER_BYTES..])
        .map_err(|e| SyncError::malformed(method_id, format!("invalid utf-8: {e}")))?;
    Ok((method_id, payload.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let frame = encode_frame(100_001, "cam-a,true").unwrap();
        assert_eq!(frame.len(), HEADER_BYTES + 10);

        let (method_id, payload) = decode_frame(&frame).unwrap();
        assert_eq!(method_id, 100_001);
        assert_eq!(payload, "cam-a,true");
    }

    #[test]
    fn test_empty_payload_is_legal() {
        let frame = encode_frame(42, "").unwrap();
        assert_eq!(frame.len(), HEADER_BYTES);

        let (method_id, payload) = decode_frame(&frame).unwrap();
        assert_eq!(method_id, 42);
        assert!(payload.is_empty());
    }

    #[test]
    fn test_big_endian_header() {
        let frame = encode_frame(0x0102_0304, "x").unwrap();
        assert_eq!(&frame[..4], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&frame[4..8], &[0, 0, 0, 1]);
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let payload = "a".repeat(MAX_PAYLOAD_BYTES + 1);
        assert!(matches!(
            encode_frame(1, &payload),
            Err(SyncError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_truncated_datagram_rejected() {
        let mut frame = encode_frame(7, "hello").unwrap();
        frame.truncate(frame.len() - 2);
        assert!(decode_frame(&frame).is_err());
    }

    #[test]
    fn test_short_header_rejected() {
        assert!(decode_frame(&[0, 1, 2]).is_err());
    }
}
