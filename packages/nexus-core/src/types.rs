use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub const HASH_LENGTH: usize = 32;

/// 发送方链所属的模块，调用方（网关合约）只能来自 wasm
pub const WASM_MODULE: &str = "wasm";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainName(String);

impl ChainName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ChainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChainName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

/// 32 字节哈希；反序列化时接受 base64 或十六进制字符串
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash(pub [u8; HASH_LENGTH]);

impl Hash {
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = if digits.len() == HASH_LENGTH * 2 && digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            hex::decode(digits).map_err(|e| format!("invalid hex hash: {}", e))?
        } else {
            STANDARD
                .decode(s)
                .map_err(|e| format!("invalid base64 hash: {}", e))?
        };

        let bytes: [u8; HASH_LENGTH] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| format!("hash must be {} bytes, got {}", HASH_LENGTH, b.len()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::parse(&s).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub name: ChainName,
    pub module: String,
    pub supports_foreign_assets: bool,
}

impl Chain {
    /// 由网关声明的源链，不在注册表中查询
    pub fn from_source(name: ChainName) -> Self {
        Self {
            name,
            module: WASM_MODULE.to_string(),
            supports_foreign_assets: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub chain: Chain,
    pub address: Address,
}

/// 网关合约提交的自定义消息体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrossChainMessage {
    pub source_chain: ChainName,
    pub source_address: Address,
    pub destination_chain: ChainName,
    pub destination_address: Address,
    pub payload_hash: Hash,
    pub source_tx_id: Hash,
    pub source_tx_index: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    Approved,
    Processing,
    Executed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub denom: String,
    pub amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralMessage {
    pub id: String,
    pub sender: Endpoint,
    pub recipient: Endpoint,
    pub payload_hash: Hash,
    pub source_tx_id: Hash,
    pub source_tx_index: u64,
    pub status: MessageStatus,
    pub asset: Option<Asset>,
}

impl GeneralMessage {
    pub fn new(
        id: String,
        sender: Endpoint,
        recipient: Endpoint,
        payload_hash: Hash,
        source_tx_id: Hash,
        source_tx_index: u64,
    ) -> Self {
        Self {
            id,
            sender,
            recipient,
            payload_hash,
            source_tx_id,
            source_tx_index,
            status: MessageStatus::Approved,
            asset: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingContext {
    pub sender: Address,
    pub fee_granter: Option<Address>,
    pub payload: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageId {
    pub id: String,
    pub id_bytes: Vec<u8>,
    pub nonce: u64,
}
