//! Broker wire message.

use bytes::Bytes;
use rdkafka::message::{Headers, Message as _};

/// One Kafka record, as fetched by a consumer or written by a producer.
///
/// A producer leaves `partition` at `-1` (let the balancer choose) and
/// `offset` at `-1`; a fetched message carries both.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
    /// Milliseconds since the Unix epoch, when the broker reported one.
    pub timestamp: Option<i64>,
    pub headers: Vec<(String, Bytes)>,
}

impl Message {
    /// An outgoing message for `topic`, with no payload yet.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            partition: -1,
            offset: -1,
            key: None,
            value: None,
            timestamp: None,
            headers: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<Bytes>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header named `name`.
    pub fn header(&self, name: &str) -> Option<&Bytes> {
        self.headers.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub(crate) fn from_kafka<M: rdkafka::Message>(msg: &M) -> Self {
        let headers = msg
            .headers()
            .map(|headers| {
                headers
                    .iter()
                    .map(|h| {
                        let value = h.value.map(Bytes::copy_from_slice).unwrap_or_default();
                        (h.key.to_owned(), value)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            topic: msg.topic().to_owned(),
            partition: msg.partition(),
            offset: msg.offset(),
            key: msg.key().map(Bytes::copy_from_slice),
            value: msg.payload().map(Bytes::copy_from_slice),
            timestamp: msg.timestamp().to_millis(),
            headers,
        }
    }
}

#[cfg(test)]
mod tests {
    use rdkafka::message::{OwnedHeaders, OwnedMessage, Timestamp};

    use super::*;

    #[test]
    fn converts_from_an_rdkafka_record() {
        let headers = OwnedHeaders::new().insert(rdkafka::message::Header {
            key: "trace-id",
            value: Some("abc"),
        });
        let record = OwnedMessage::new(
            Some(b"{\"id\":1}".to_vec()),
            Some(b"order-1".to_vec()),
            "orders".to_owned(),
            Timestamp::CreateTime(1_700_000_000_000),
            3,
            42,
            Some(headers),
        );

        let msg = Message::from_kafka(&record);
        assert_eq!(msg.topic, "orders");
        assert_eq!(msg.partition, 3);
        assert_eq!(msg.offset, 42);
        assert_eq!(msg.key.as_deref(), Some(&b"order-1"[..]));
        assert_eq!(msg.timestamp, Some(1_700_000_000_000));
        assert_eq!(msg.header("trace-id").map(|v| &v[..]), Some(&b"abc"[..]));
    }

    #[test]
    fn builder_style_outgoing_message() {
        let msg = Message::new("orders").with_key("k").with_value("v").with_header("h", "1");
        assert_eq!(msg.partition, -1);
        assert_eq!(msg.value.as_deref(), Some(&b"v"[..]));
        assert!(msg.header("missing").is_none());
    }
}
