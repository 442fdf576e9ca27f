use std::fmt;
use std::panic::Location;

use thiserror::Error;

use crate::{HandshakeState, ProviderError, ProviderStatus};

/// Operation during which an error occurred.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Operation {
    QueryPackageInfo,
    AcquireCredentialsHandle,
    InitializeSecurityContext,
    CompleteAuthToken,
    QueryContextSizes,
    EncryptMessage,
    SetInputToken,
    Step,
    ProtectMessage,
    MaxSignatureSize,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::QueryPackageInfo => "QuerySecurityPackageInfo",
            Operation::AcquireCredentialsHandle => "AcquireCredentialsHandle",
            Operation::InitializeSecurityContext => "InitializeSecurityContext",
            Operation::CompleteAuthToken => "CompleteAuthToken",
            Operation::QueryContextSizes => "QueryContextAttributes(SECPKG_ATTR_SIZES)",
            Operation::EncryptMessage => "EncryptMessage",
            Operation::SetInputToken => "set_input_token",
            Operation::Step => "step",
            Operation::ProtectMessage => "protect_message",
            Operation::MaxSignatureSize => "max_signature_size",
        };

        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("failed to allocate a {requested}-byte token buffer")]
    AllocationFailure { requested: usize },

    #[error("security provider is not available: {0}")]
    ProviderUnavailable(String),

    #[error("{operation} status {status}: {description}")]
    ProviderRejected {
        operation: Operation,
        status: ProviderStatus,
        description: String,
    },

    #[error("[{operation} {location}] {field} {value} is larger than the maximum {max}")]
    Overflow {
        operation: Operation,
        field: &'static str,
        value: u64,
        max: u64,
        location: &'static Location<'static>,
    },

    #[error("input token is empty")]
    EmptyInput,

    #[error("{operation} is not allowed in the {state:?} state")]
    InvalidState { operation: Operation, state: HandshakeState },

    #[error("invalid target name: {0}")]
    InvalidTargetName(String),
}

impl HandshakeError {
    pub(crate) fn rejected(operation: Operation, error: ProviderError) -> Self {
        HandshakeError::ProviderRejected {
            operation,
            status: error.status(),
            description: error.description,
        }
    }

    pub(crate) fn unexpected_status(operation: Operation, status: impl Into<ProviderStatus>) -> Self {
        HandshakeError::ProviderRejected {
            operation,
            status: status.into(),
            description: String::from("unexpected status"),
        }
    }

    /// Provider status carried by the error, if any.
    pub fn provider_status(&self) -> Option<ProviderStatus> {
        match self {
            HandshakeError::ProviderRejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, HandshakeError>;
