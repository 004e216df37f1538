use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, PartialEq, Eq, EnumString, AsRefStr)]
pub enum DisconnectReason {
    #[strum(serialize = "shutdown")]
    Shutdown,
    #[strum(serialize = "duplicate stream")]
    DuplicateStream,
    #[strum(serialize = "control request")]
    ControlRequest,
    #[strum(serialize = "stall")]
    Stall,
    #[strum(serialize = "normal")]
    Normal,
    #[strum(serialize = "token revoked")]
    TokenRevoked,
    #[strum(serialize = "admin logout")]
    AdminLogout,
    #[strum(serialize = "max message limit")]
    MaxMessageLimit,
    #[strum(serialize = "stream exception")]
    StreamException,
    #[strum(serialize = "broker stall")]
    BrokerStall,
    #[strum(serialize = "shed load")]
    ShedLoad,
    #[strum(default)]
    Other(String),
}

impl DisconnectReason {
    pub fn name(&self) -> &str {
        match self {
            DisconnectReason::Other(name) => name,
            known => known.as_ref(),
        }
    }
}

/// The `-`-separated tokens of a stream name, e.g. `["roly426", "sphere", "kfalter"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamName(pub Vec<String>);

impl StreamName {
    fn parse(name: &str) -> Self {
        Self(name.splitn(3, '-').map(str::to_string).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Disconnect {
    pub code: u64,
    pub reason: DisconnectReason,
    pub stream_name: StreamName,
}

#[derive(Deserialize)]
struct RawDisconnect {
    code: u64,
    reason: String,
    stream_name: Option<String>,
}

impl Disconnect {
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        let raw = RawDisconnect::deserialize(value)?;
        Ok(Self {
            code: raw.code,
            reason: DisconnectReason::from_str(&raw.reason)
                .unwrap_or(DisconnectReason::Other(raw.reason)),
            stream_name: raw
                .stream_name
                .as_deref()
                .map(StreamName::parse)
                .unwrap_or_default(),
        })
    }
}
