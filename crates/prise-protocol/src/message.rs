use rmpv::Value;
use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One of the three wire message shapes (§4.1), distinguished by the first
/// array element. Params/result/error bodies are kept as [`rmpv::Value`] at
/// this layer; callers decode the method-specific shape with
/// `rmpv::ext::from_value`.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// `[0, req_id, method, params]`
    Request {
        req_id: u32,
        method: String,
        params: Value,
    },
    /// `[1, req_id, error, result]` — `error` is `Value::Nil` on success.
    Response {
        req_id: u32,
        error: Value,
        result: Value,
    },
    /// `[2, method, params]`
    Notification { method: String, params: Value },
}

impl Message {
    pub fn request(req_id: u32, method: impl Into<String>, params: Value) -> Self {
        Message::Request {
            req_id,
            method: method.into(),
            params,
        }
    }

    pub fn ok_response(req_id: u32, result: Value) -> Self {
        Message::Response {
            req_id,
            error: Value::Nil,
            result,
        }
    }

    pub fn err_response(req_id: u32, error: Value) -> Self {
        Message::Response {
            req_id,
            error,
            result: Value::Nil,
        }
    }

    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Message::Notification {
            method: method.into(),
            params,
        }
    }
}

impl Serialize for Message {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Message::Request {
                req_id,
                method,
                params,
            } => {
                let mut seq = serializer.serialize_seq(Some(4))?;
                seq.serialize_element(&0u8)?;
                seq.serialize_element(req_id)?;
                seq.serialize_element(method)?;
                seq.serialize_element(params)?;
                seq.end()
            }
            Message::Response {
                req_id,
                error,
                result,
            } => {
                let mut seq = serializer.serialize_seq(Some(4))?;
                seq.serialize_element(&1u8)?;
                seq.serialize_element(req_id)?;
                seq.serialize_element(error)?;
                seq.serialize_element(result)?;
                seq.end()
            }
            Message::Notification { method, params } => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&2u8)?;
                seq.serialize_element(method)?;
                seq.serialize_element(params)?;
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MessageVisitor;

        impl<'de> Visitor<'de> for MessageVisitor {
            type Value = Message;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a [tag, ...] array message")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Message, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let tag: u8 = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                match tag {
                    0 => {
                        let req_id = seq
                            .next_element()?
                            .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                        let method = seq
                            .next_element()?
                            .ok_or_else(|| de::Error::invalid_length(2, &self))?;
                        let params = seq
                            .next_element()?
                            .ok_or_else(|| de::Error::invalid_length(3, &self))?;
                        Ok(Message::Request {
                            req_id,
                            method,
                            params,
                        })
                    }
                    1 => {
                        let req_id = seq
                            .next_element()?
                            .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                        let error = seq
                            .next_element()?
                            .ok_or_else(|| de::Error::invalid_length(2, &self))?;
                        let result = seq
                            .next_element()?
                            .ok_or_else(|| de::Error::invalid_length(3, &self))?;
                        Ok(Message::Response {
                            req_id,
                            error,
                            result,
                        })
                    }
                    2 => {
                        let method = seq
                            .next_element()?
                            .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                        let params = seq
                            .next_element()?
                            .ok_or_else(|| de::Error::invalid_length(2, &self))?;
                        Ok(Message::Notification { method, params })
                    }
                    other => Err(de::Error::invalid_value(
                        de::Unexpected::Unsigned(other as u64),
                        &"0, 1, or 2",
                    )),
                }
            }
        }

        deserializer.deserialize_seq(MessageVisitor)
    }
}

/// Monotonic, 32-bit wrapping request id allocator, one per direction per
/// connection (§4.1).
#[derive(Debug, Default)]
pub struct RequestIdAllocator {
    next: u32,
}

impl RequestIdAllocator {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips() {
        let msg = Message::request(7, "spawn_pty", Value::from(vec![Value::from(24)]));
        let bytes = rmp_serde::to_vec(&msg).unwrap();
        let back: Message = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn response_round_trips_with_nil_error() {
        let msg = Message::ok_response(7, Value::from(1u64));
        let bytes = rmp_serde::to_vec(&msg).unwrap();
        let back: Message = rmp_serde::from_slice(&bytes).unwrap();
        match back {
            Message::Response {
                req_id,
                error,
                result,
            } => {
                assert_eq!(req_id, 7);
                assert_eq!(error, Value::Nil);
                assert_eq!(result, Value::from(1u64));
            }
            _ => panic!("expected response"),
        }
    }

    #[test]
    fn notification_round_trips() {
        let msg = Message::notification("pty_exited", Value::from(vec![Value::from(1)]));
        let bytes = rmp_serde::to_vec(&msg).unwrap();
        let back: Message = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let bytes = rmp_serde::to_vec(&(9u8, 1u32)).unwrap();
        let result: Result<Message, _> = rmp_serde::from_slice(&bytes);
        assert!(result.is_err());
    }

    #[test]
    fn request_id_allocator_wraps() {
        let mut alloc = RequestIdAllocator {
            next: u32::MAX,
        };
        assert_eq!(alloc.next_id(), u32::MAX);
        assert_eq!(alloc.next_id(), 0);
        assert_eq!(alloc.next_id(), 1);
    }
}
