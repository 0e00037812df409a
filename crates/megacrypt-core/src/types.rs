use serde::{Deserialize, Serialize};

use crate::error::MegaError;

/// Kind of a remote node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum NodeType {
    File,
    Directory,
    Root,
    Inbox,
    Trash,
}

impl TryFrom<u8> for NodeType {
    type Error = MegaError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(NodeType::File),
            1 => Ok(NodeType::Directory),
            2 => Ok(NodeType::Root),
            3 => Ok(NodeType::Inbox),
            4 => Ok(NodeType::Trash),
            other => Err(MegaError::Metadata(format!("unknown node type {other}"))),
        }
    }
}

impl From<NodeType> for u8 {
    fn from(value: NodeType) -> Self {
        match value {
            NodeType::File => 0,
            NodeType::Directory => 1,
            NodeType::Root => 2,
            NodeType::Inbox => 3,
            NodeType::Trash => 4,
        }
    }
}

/// Remote node record as listed by the API.
///
/// `attributes` and `key` stay in their serialized (encrypted, base64) form;
/// unwrapping them is the job of the crypto layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(rename = "h")]
    pub id: String,
    #[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(rename = "u", default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(rename = "t")]
    pub node_type: NodeType,
    #[serde(rename = "s", default)]
    pub size: u64,
    #[serde(rename = "a", default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<String>,
    #[serde(rename = "k", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(rename = "ts", default)]
    pub timestamp: i64,
    #[serde(rename = "fa", default, skip_serializing_if = "Option::is_none")]
    pub file_attributes: Option<String>,
}

impl NodeRecord {
    pub fn is_file(&self) -> bool {
        self.node_type == NodeType::File
    }

    /// The encoded key part of `k`, which has the form `owner:key`
    /// (several `/`-separated pairs for shared nodes; the first one wins).
    pub fn serialized_key(&self) -> Option<&str> {
        let raw = self.key.as_deref()?;
        let first = raw.split('/').next()?;
        Some(first.split_once(':').map_or(first, |(_, key)| key))
    }
}
