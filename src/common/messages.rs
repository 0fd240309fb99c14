//! Serialize and deserialize the Krpc messages a crawl job exchanges.

mod internal;

use std::net::SocketAddr;

use serde_bencode::value::Value;
use serde_bytes::ByteBuf;

use crate::common::{decode_compact_address, decode_nodes, Id, Node};
use crate::{Error, Result};

const QUERY: &[u8] = b"q";
const RESPONSE: &[u8] = b"r";
const ERROR: &[u8] = b"e";

const GET_PEERS: &str = "get_peers";

#[derive(Debug, PartialEq, Clone)]
pub struct Message {
    pub transaction_id: u16,

    /// The version of the requester or responder.
    pub version: Option<Vec<u8>>,

    pub message_type: MessageType,
}

#[derive(Debug, PartialEq, Clone)]
pub enum MessageType {
    Request(RequestSpecific),

    Response(GetPeersResponseArguments),

    Error(ErrorSpecific),
}

#[derive(Debug, PartialEq, Clone)]
pub struct ErrorSpecific {
    pub code: i64,
    pub description: String,
}

#[derive(Debug, PartialEq, Clone)]
pub struct RequestSpecific {
    pub requester_id: Id,
    pub request_type: RequestTypeSpecific,
}

#[derive(Debug, PartialEq, Clone)]
pub enum RequestTypeSpecific {
    GetPeers(GetPeersRequestArguments),
    /// Any other query method, by name. Never sent, and ignored when received.
    Other(String),
}

// === Get Peers ===

#[derive(Debug, PartialEq, Clone)]
pub struct GetPeersRequestArguments {
    pub info_hash: Id,
}

/// The fields of a response we care about.
///
/// `values` and `nodes` are kept in their compact form, and decoded entry by
/// entry with [Self::peers] and [Self::nodes], so that a single bad entry
/// doesn't invalidate the rest of the response.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct GetPeersResponseArguments {
    pub responder_id: Option<Id>,
    pub token: Option<Vec<u8>>,
    /// Compact peer addresses.
    ///
    /// Entries that are not bencode strings on the wire are kept as empty
    /// addresses, so they fail to decode in [Self::peers].
    pub values: Vec<Vec<u8>>,
    /// Concatenated 26 bytes compact node infos.
    pub nodes: Option<Vec<u8>>,
}

impl GetPeersResponseArguments {
    /// Decode each entry of `values`.
    pub fn peers(&self) -> impl Iterator<Item = Result<SocketAddr>> + '_ {
        self.values.iter().map(decode_compact_address)
    }

    /// Decode each complete record of the `nodes` blob.
    pub fn nodes(&self) -> impl Iterator<Item = Result<Node>> + '_ {
        decode_nodes(self.nodes.as_deref().unwrap_or_default())
    }
}

impl Message {
    fn into_serde_message(self) -> internal::DHTMessage {
        let mut message = internal::DHTMessage {
            transaction_id: ByteBuf::from(self.transaction_id.to_be_bytes().to_vec()),
            message_type: ByteBuf::new(),
            version: self.version.map(Value::Bytes),
            query: None,
            arguments: None,
            response: None,
            error: None,
        };

        match self.message_type {
            MessageType::Request(RequestSpecific {
                requester_id,
                request_type,
            }) => {
                message.message_type = ByteBuf::from(QUERY);

                let (query, info_hash) = match request_type {
                    RequestTypeSpecific::GetPeers(arguments) => {
                        (GET_PEERS.to_string(), Some(arguments.info_hash))
                    }
                    RequestTypeSpecific::Other(name) => (name, None),
                };

                message.query = Some(ByteBuf::from(query.into_bytes()));
                message.arguments = Some(internal::DHTRequestArguments {
                    id: ByteBuf::from(requester_id.as_bytes().to_vec()),
                    info_hash: info_hash.map(|id| ByteBuf::from(id.as_bytes().to_vec())),
                });
            }
            MessageType::Response(arguments) => {
                message.message_type = ByteBuf::from(RESPONSE);
                message.response = Some(internal::DHTResponseArguments {
                    id: arguments
                        .responder_id
                        .map(|id| Value::Bytes(id.as_bytes().to_vec())),
                    token: arguments.token.map(Value::Bytes),
                    nodes: arguments.nodes.map(Value::Bytes),
                    values: if arguments.values.is_empty() {
                        None
                    } else {
                        Some(Value::List(
                            arguments.values.into_iter().map(Value::Bytes).collect(),
                        ))
                    },
                });
            }
            MessageType::Error(error) => {
                message.message_type = ByteBuf::from(ERROR);
                message.error = Some((error.code, ByteBuf::from(error.description.into_bytes())));
            }
        }

        message
    }

    fn from_serde_message(msg: internal::DHTMessage) -> Result<Message> {
        let transaction_id = transaction_id(&msg.transaction_id)?;

        let message_type = match msg.message_type.as_slice() {
            QUERY => {
                let arguments = msg.arguments.ok_or(Error::InvalidMessage("missing `a`"))?;
                let requester_id = Id::from_bytes(&arguments.id)?;

                let query = msg
                    .query
                    .map(|query| String::from_utf8_lossy(&query).to_string())
                    .ok_or(Error::InvalidMessage("missing `q`"))?;

                let request_type = match (query.as_str(), arguments.info_hash) {
                    (GET_PEERS, Some(info_hash)) => {
                        RequestTypeSpecific::GetPeers(GetPeersRequestArguments {
                            info_hash: Id::from_bytes(info_hash)?,
                        })
                    }
                    (GET_PEERS, None) => return Err(Error::InvalidMessage("missing `info_hash`")),
                    _ => RequestTypeSpecific::Other(query),
                };

                MessageType::Request(RequestSpecific {
                    requester_id,
                    request_type,
                })
            }
            RESPONSE => {
                let arguments = msg.response.ok_or(Error::InvalidMessage("missing `r`"))?;

                MessageType::Response(GetPeersResponseArguments {
                    // A responder with a malformed id can still tell us about peers.
                    responder_id: arguments
                        .id
                        .and_then(internal::into_bytes)
                        .and_then(|id| Id::from_bytes(id).ok()),
                    token: arguments.token.and_then(internal::into_bytes),
                    values: match arguments.values {
                        Some(Value::List(values)) => values
                            .into_iter()
                            .map(|value| internal::into_bytes(value).unwrap_or_default())
                            .collect(),
                        _ => vec![],
                    },
                    nodes: arguments.nodes.and_then(internal::into_bytes),
                })
            }
            ERROR => {
                let (code, description) = msg.error.ok_or(Error::InvalidMessage("missing `e`"))?;

                MessageType::Error(ErrorSpecific {
                    code,
                    description: String::from_utf8_lossy(&description).to_string(),
                })
            }
            _ => return Err(Error::InvalidMessage("unknown `y`")),
        };

        Ok(Message {
            transaction_id,
            version: msg.version.and_then(internal::into_bytes),
            message_type,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.clone().into_serde_message().to_bytes()?)
    }

    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Message> {
        Message::from_serde_message(internal::DHTMessage::from_bytes(bytes)?)
    }
}

/// Return the transaction Id as a u16, it has to be exactly 2 bytes.
pub fn transaction_id<T: AsRef<[u8]>>(bytes: T) -> Result<u16> {
    let bytes = bytes.as_ref();

    if bytes.len() == 2 {
        return Ok(u16::from_be_bytes([bytes[0], bytes[1]]));
    }

    Err(Error::InvalidTransactionId(bytes.to_vec()))
}

#[cfg(test)]
mod tests {
    use crate::common::{encode_compact_address, encode_nodes};

    use super::*;

    #[test]
    fn test_transaction_id() {
        assert_eq!(transaction_id([1_u8, 2]).unwrap(), 258);
        assert_eq!(transaction_id([0xff_u8, 0xff]).unwrap(), u16::MAX);
        assert!(transaction_id([255_u8]).is_err());
        assert!(transaction_id([1_u8, 2, 3]).is_err());
    }

    #[test]
    fn test_get_peers_request() {
        let original_msg = Message {
            transaction_id: 258,
            version: Some(vec![72, 73]),
            message_type: MessageType::Request(RequestSpecific {
                requester_id: Id::random(),
                request_type: RequestTypeSpecific::GetPeers(GetPeersRequestArguments {
                    info_hash: Id::random(),
                }),
            }),
        };

        let bytes = original_msg.to_bytes().unwrap();
        let parsed_msg = Message::from_bytes(bytes).unwrap();

        assert_eq!(parsed_msg, original_msg);
    }

    #[test]
    fn test_get_peers_request_wire_format() {
        let msg = Message {
            transaction_id: u16::from_be_bytes(*b"aa"),
            version: None,
            message_type: MessageType::Request(RequestSpecific {
                requester_id: Id(*b"abcdefghij0123456789"),
                request_type: RequestTypeSpecific::GetPeers(GetPeersRequestArguments {
                    info_hash: Id(*b"mnopqrstuvwxyz123456"),
                }),
            }),
        };

        // Example from BEP_0005
        assert_eq!(
            msg.to_bytes().unwrap(),
            b"d1:ad2:id20:abcdefghij01234567899:info_hash20:mnopqrstuvwxyz123456e1:q9:get_peers1:t2:aa1:y1:qe".to_vec()
        );
    }

    #[test]
    fn test_get_peers_response_values() {
        let bytes = b"d1:rd2:id20:abcdefghij01234567895:token8:aoeusnth6:valuesl6:axje.u6:idhtnmee1:t2:aa1:y1:re";

        let msg = Message::from_bytes(bytes).unwrap();

        assert_eq!(msg.transaction_id, u16::from_be_bytes(*b"aa"));

        match msg.message_type {
            MessageType::Response(arguments) => {
                assert_eq!(arguments.responder_id, Some(Id(*b"abcdefghij0123456789")));
                assert_eq!(arguments.token, Some(b"aoeusnth".to_vec()));
                assert_eq!(arguments.values.len(), 2);
                assert!(arguments.nodes.is_none());
                assert_eq!(arguments.peers().filter(|p| p.is_ok()).count(), 2);
            }
            _ => panic!("expected a response"),
        }
    }

    #[test]
    fn test_get_peers_response_nodes() {
        let node = Node::new(Id::random(), "49.50.52.52:5354".parse().unwrap());

        let original_msg = Message {
            transaction_id: 3,
            version: Some(vec![1]),
            message_type: MessageType::Response(GetPeersResponseArguments {
                responder_id: Some(Id::random()),
                token: Some(vec![99, 100, 101, 102]),
                values: vec![],
                nodes: Some(encode_nodes(&[node.clone()])),
            }),
        };

        let parsed_msg = Message::from_bytes(original_msg.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed_msg, original_msg);

        match parsed_msg.message_type {
            MessageType::Response(arguments) => {
                assert_eq!(arguments.nodes().next().unwrap().unwrap(), node);
            }
            _ => panic!("expected a response"),
        }
    }

    #[test]
    fn test_response_with_bad_entries() {
        let good = encode_compact_address(&"1.2.3.4:5000".parse().unwrap());

        let msg = Message {
            transaction_id: 7,
            version: None,
            message_type: MessageType::Response(GetPeersResponseArguments {
                responder_id: None,
                token: None,
                values: vec![vec![1, 2, 3], good],
                nodes: Some(vec![0; 30]),
            }),
        };

        let parsed = Message::from_bytes(msg.to_bytes().unwrap()).unwrap();

        match parsed.message_type {
            MessageType::Response(arguments) => {
                let peers = arguments.peers().collect::<Vec<_>>();
                assert!(peers[0].is_err());
                assert_eq!(
                    peers[1].as_ref().unwrap(),
                    &"1.2.3.4:5000".parse::<SocketAddr>().unwrap()
                );
                // Only one complete record.
                assert_eq!(arguments.nodes().count(), 1);
            }
            _ => panic!("expected a response"),
        }
    }

    #[test]
    fn test_response_with_wrongly_typed_fields() {
        // `v` and `token` are integers, `id` is a list, and `values` holds an integer entry.
        let mut bytes = b"d1:rd2:idli1ee5:tokeni5e6:valuesli42e6:".to_vec();
        bytes.extend_from_slice(&[1, 2, 3, 4, 0x13, 0x88]);
        bytes.extend_from_slice(b"ee1:t2:aa1:vi1e1:y1:re");

        let msg = Message::from_bytes(&bytes).unwrap();

        assert_eq!(msg.version, None);

        match msg.message_type {
            MessageType::Response(arguments) => {
                assert_eq!(arguments.responder_id, None);
                assert_eq!(arguments.token, None);

                let peers = arguments.peers().collect::<Vec<_>>();
                assert_eq!(peers.len(), 2);
                assert!(matches!(peers[0], Err(Error::InvalidCompactAddress(0))));
                assert_eq!(
                    peers[1].as_ref().unwrap(),
                    &"1.2.3.4:5000".parse::<SocketAddr>().unwrap()
                );
            }
            _ => panic!("expected a response"),
        }

        // `values` and `nodes` that are not lists or strings at all.
        let msg = Message::from_bytes(b"d1:rd5:nodesi3e6:valuesi7ee1:t2:aa1:y1:re").unwrap();

        match msg.message_type {
            MessageType::Response(arguments) => {
                assert!(arguments.values.is_empty());
                assert!(arguments.nodes.is_none());
            }
            _ => panic!("expected a response"),
        }
    }

    #[test]
    fn test_error_message() {
        let bytes = b"d1:eli201e23:A Generic Error Ocurrede1:t2:aa1:y1:ee";

        let msg = Message::from_bytes(bytes).unwrap();

        assert_eq!(
            msg.message_type,
            MessageType::Error(ErrorSpecific {
                code: 201,
                description: "A Generic Error Ocurred".to_string(),
            })
        );
    }

    #[test]
    fn test_other_query() {
        let bytes = b"d1:ad2:id20:abcdefghij0123456789e1:q4:ping1:t2:aa1:y1:qe";

        let msg = Message::from_bytes(bytes).unwrap();

        assert_eq!(
            msg.message_type,
            MessageType::Request(RequestSpecific {
                requester_id: Id(*b"abcdefghij0123456789"),
                request_type: RequestTypeSpecific::Other("ping".to_string()),
            })
        );
    }

    #[test]
    fn test_malformed() {
        assert!(Message::from_bytes(b"").is_err());
        assert!(Message::from_bytes(b"d1:t2:aa").is_err());
        assert!(Message::from_bytes(b"i42e").is_err());
        // Wrong transaction_id length.
        assert!(matches!(
            Message::from_bytes(b"d1:rd2:id20:abcdefghij0123456789e1:t3:aaa1:y1:re"),
            Err(Error::InvalidTransactionId(_))
        ));
        // Missing transaction_id.
        assert!(Message::from_bytes(b"d1:rd2:id20:abcdefghij0123456789e1:y1:re").is_err());
    }
}
