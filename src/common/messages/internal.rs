use serde::{Deserialize, Serialize};
use serde_bencode::value::Value;
use serde_bytes::ByteBuf;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTMessage {
    #[serde(rename = "t")]
    pub transaction_id: ByteBuf,

    #[serde(rename = "y")]
    pub message_type: ByteBuf,

    #[serde(default)]
    #[serde(rename = "v", skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,

    #[serde(default)]
    #[serde(rename = "q", skip_serializing_if = "Option::is_none")]
    pub query: Option<ByteBuf>,

    #[serde(default)]
    #[serde(rename = "a", skip_serializing_if = "Option::is_none")]
    pub arguments: Option<DHTRequestArguments>,

    #[serde(default)]
    #[serde(rename = "r", skip_serializing_if = "Option::is_none")]
    pub response: Option<DHTResponseArguments>,

    #[serde(default)]
    #[serde(rename = "e", skip_serializing_if = "Option::is_none")]
    pub error: Option<(i64, ByteBuf)>,
}

impl DHTMessage {
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<DHTMessage, serde_bencode::Error> {
        let obj = serde_bencode::from_bytes(bytes.as_ref())?;
        Ok(obj)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_bencode::Error> {
        serde_bencode::to_bytes(self)
    }
}

// Arguments of any query. Everything but `id` is optional, so we can at least
// recognize queries we don't implement instead of failing to decode them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTRequestArguments {
    pub id: ByteBuf,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<ByteBuf>,
}

// Responses are not tagged on the wire, we only care about `get_peers` fields.
//
// Fields are loosely typed, a field of the wrong type is dropped on its own
// instead of failing the whole response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTResponseArguments {
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<Value>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Value>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Value>,
}

/// Returns the bytes of a bencode string, None for any other type.
pub fn into_bytes(value: Value) -> Option<Vec<u8>> {
    match value {
        Value::Bytes(bytes) => Some(bytes),
        _ => None,
    }
}
