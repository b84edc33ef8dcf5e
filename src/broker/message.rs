//! Message definitions for the broker
//!
//! `Message` is the only thing that travels between links and the router.
//! On the wire it is the JSON document `{"header": <topic>, "body": <payload>}`
//! with the payload base64 encoded.
//!
//! The payload is a reference-counted `Bytes` buffer: fanning one inbound
//! message out to many subscribers and peers clones the handle, never the
//! bytes, and nothing ever mutates a payload after it was received.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Routing key, carried on the wire as `header`.
    #[serde(rename = "header")]
    pub topic: String,

    /// Opaque body, carried on the wire as base64 in `body`.
    #[serde(rename = "body", with = "body", default)]
    pub payload: Bytes,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Same payload under a different topic. The buffer is shared, not copied.
    pub fn relabel(&self, topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            payload: self.payload.clone(),
        }
    }
}

mod body {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(payload: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(payload))
    }

    // An empty body may arrive as `null`.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map(Bytes::from)
                .map_err(de::Error::custom),
            None => Ok(Bytes::new()),
        }
    }
}
