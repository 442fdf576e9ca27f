//! Client side of SSPI-style challenge-response authentication.
//!
//! The crate drives a multi-round handshake (NTLM and alike) against a pluggable
//! [`SecurityProvider`]: it acquires outbound credentials, feeds the peer's tokens to the
//! provider round by round, exposes the produced tokens and, once the context is established,
//! protects messages with it. All provider resources are released exactly once.

#[macro_use]
extern crate tracing;

mod auth_identity;
mod config;
mod credentials;
mod engine;
mod error;
mod flags;
mod protector;
mod provider;
mod secret;
mod security_buffer;
mod spn;
#[cfg(feature = "sspi-ntlm")]
mod sspi_ntlm;
mod status;
mod token_buffers;
mod utils;

pub use auth_identity::AuthIdentity;
pub use config::{AuthMode, DataRepresentation, HandshakeConfig};
pub use engine::{HandshakeEngine, HandshakeState};
pub use error::{HandshakeError, Operation, Result};
pub use flags::{ClientRequestFlags, ClientResponseFlags, EncryptionFlags, PackageCapabilities};
pub use protector::MessageProtector;
pub use provider::{
    ContextSizes, CredentialUse, InitializeSecurityContext, InitializeSecurityContextResult, PackageInfo,
    ProviderError, ProviderResult, SecurityProvider,
};
pub use secret::Secret;
pub use security_buffer::{
    BufferType, InputBuffer, InputBuffers, SecurityBuffer, SecurityBufferFlags, SecurityBufferRef,
};
pub use spn::make_spn;
#[cfg(feature = "sspi-ntlm")]
pub use sspi_ntlm::SspiNtlmProvider;
pub use status::{ErrorKind, ProviderStatus, SecurityStatus};
