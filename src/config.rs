use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::ClientRequestFlags;

/// Transport the handshake authenticates.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// HTTP proxy or gateway authentication.
    #[default]
    Http,
    /// RPC authentication at the packet integrity level.
    Rpc,
}

impl AuthMode {
    /// Capability flags requested from the provider for this transport.
    pub fn context_requirements(self) -> ClientRequestFlags {
        match self {
            AuthMode::Http => ClientRequestFlags::CONFIDENTIALITY,
            AuthMode::Rpc => {
                ClientRequestFlags::USE_DCE_STYLE
                    | ClientRequestFlags::DELEGATE
                    | ClientRequestFlags::MUTUAL_AUTH
                    | ClientRequestFlags::REPLAY_DETECT
                    | ClientRequestFlags::SEQUENCE_DETECT
            }
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, FromPrimitive, ToPrimitive, Serialize, Deserialize)]
pub enum DataRepresentation {
    Network = 0,
    #[default]
    Native = 0x10,
}

#[derive(Debug, Clone, Eq, PartialEq, Default, Serialize, Deserialize)]
pub struct HandshakeConfig {
    pub mode: AuthMode,
    /// Service principal name of the peer, usually built with [`make_spn`](crate::make_spn).
    pub target_name: Option<String>,
    pub data_representation: DataRepresentation,
}

impl HandshakeConfig {
    pub fn new(mode: AuthMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn with_target_name(self, target_name: impl Into<String>) -> Self {
        Self {
            target_name: Some(target_name.into()),
            ..self
        }
    }

    pub fn with_data_representation(self, data_representation: DataRepresentation) -> Self {
        Self {
            data_representation,
            ..self
        }
    }
}
