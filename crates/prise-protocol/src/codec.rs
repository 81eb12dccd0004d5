use crate::errors::ProtocolError;
use crate::message::Message;
use std::io::Cursor;

/// Default ceiling on a single frame's encoded size. Exceeding this while the
/// decoder is still waiting on more bytes is treated as `too_large` (§7),
/// which closes the connection.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Encode one message to its wire bytes.
pub fn encode_message(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    rmp_serde::to_vec(msg).map_err(|e| ProtocolError::MalformedEncoding(e.to_string()))
}

/// Try to decode one message from the front of `buf`.
///
/// Returns `Ok(Some((message, bytes_consumed)))` on success, `Ok(None)` when
/// `buf` holds an incomplete frame (callers append more bytes and retry
/// without discarding what's already buffered), and `Err` on malformed
/// encoding, which must close the connection (§4.1).
pub fn decode_message(buf: &[u8]) -> Result<Option<(Message, usize)>, ProtocolError> {
    decode_message_bounded(buf, DEFAULT_MAX_FRAME_BYTES)
}

pub fn decode_message_bounded(
    buf: &[u8],
    max_frame_bytes: usize,
) -> Result<Option<(Message, usize)>, ProtocolError> {
    let mut cursor = Cursor::new(buf);
    match rmp_serde::from_read::<_, Message>(&mut cursor) {
        Ok(msg) => {
            let consumed = cursor.position() as usize;
            Ok(Some((msg, consumed)))
        }
        Err(e) if is_incomplete(&e) => {
            if buf.len() >= max_frame_bytes {
                Err(ProtocolError::TooLarge {
                    size: buf.len(),
                    max: max_frame_bytes,
                })
            } else {
                Ok(None)
            }
        }
        Err(e) => Err(ProtocolError::MalformedEncoding(e.to_string())),
    }
}

fn is_incomplete(e: &rmp_serde::decode::Error) -> bool {
    use rmp_serde::decode::Error;
    let io_err = match e {
        Error::InvalidMarkerRead(io) | Error::InvalidDataRead(io) => Some(io),
        _ => None,
    };
    matches!(io_err, Some(io) if io.kind() == std::io::ErrorKind::UnexpectedEof)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmpv::Value;

    #[test]
    fn encode_then_decode_consumes_exact_bytes() {
        let msg = Message::notification("redraw", Value::from(vec![Value::from(1)]));
        let bytes = encode_message(&msg).unwrap();
        let (decoded, consumed) = decode_message(&bytes).unwrap().unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn incomplete_prefix_yields_none() {
        let msg = Message::request(1, "spawn_pty", Value::from(vec![Value::from(1)]));
        let bytes = encode_message(&msg).unwrap();
        for cut in 1..bytes.len() {
            let prefix = &bytes[..cut];
            let result = decode_message(prefix).unwrap();
            assert!(result.is_none(), "prefix of {cut} bytes should be incomplete");
        }
    }

    #[test]
    fn two_messages_back_to_back_decode_in_order() {
        let a = Message::notification("a", Value::Nil);
        let b = Message::notification("b", Value::Nil);
        let mut buf = encode_message(&a).unwrap();
        buf.extend(encode_message(&b).unwrap());

        let (first, consumed1) = decode_message(&buf).unwrap().unwrap();
        assert_eq!(first, a);
        let (second, consumed2) = decode_message(&buf[consumed1..]).unwrap().unwrap();
        assert_eq!(second, b);
        assert_eq!(consumed1 + consumed2, buf.len());
    }

    #[test]
    fn oversized_incomplete_frame_is_too_large() {
        let partial = vec![0x93u8]; // array-of-3 marker, no elements yet
        let result = decode_message_bounded(&partial, 0);
        assert!(matches!(result, Err(ProtocolError::TooLarge { .. })));
    }

    #[test]
    fn malformed_tag_is_rejected_not_incomplete() {
        // A complete 2-element array is a full frame, but tag 9 is invalid.
        let bytes = rmp_serde::to_vec(&(9u8, 1u32)).unwrap();
        let result = decode_message(&bytes);
        assert!(result.is_err());
    }

    #[test]
    fn arbitrary_chunk_splits_reconstruct_the_original_sequence() {
        let messages = vec![
            Message::request(1, "spawn_pty", Value::from(1)),
            Message::notification("redraw", Value::from(2)),
            Message::ok_response(1, Value::from(3)),
        ];
        let mut whole = Vec::new();
        for m in &messages {
            whole.extend(encode_message(m).unwrap());
        }

        for split in [1usize, 2, 3, 5, 7, 11, whole.len()] {
            let mut decoded = Vec::new();
            let mut pending = Vec::new();
            let mut offset = 0;
            while offset < whole.len() || !pending.is_empty() {
                if offset < whole.len() {
                    let end = (offset + split).min(whole.len());
                    pending.extend_from_slice(&whole[offset..end]);
                    offset = end;
                }
                loop {
                    match decode_message(&pending).unwrap() {
                        Some((msg, consumed)) => {
                            decoded.push(msg);
                            pending.drain(..consumed);
                        }
                        None => break,
                    }
                }
                if offset >= whole.len() && pending.is_empty() {
                    break;
                }
                if offset >= whole.len() && decoded.len() == messages.len() {
                    break;
                }
            }
            assert_eq!(decoded, messages, "failed at split size {split}");
        }
    }
}
