//! Security provider contract.
//!
//! The handshake engine never computes authentication messages itself. Everything protocol
//! specific goes through [`SecurityProvider`], which mirrors the subset of the SSPI function
//! table a client needs: package info, credentials, context steps, sizes, message protection
//! and the matching release functions.

use std::{error, fmt};

use num_derive::{FromPrimitive, ToPrimitive};

use crate::{
    AuthIdentity, ClientRequestFlags, ClientResponseFlags, DataRepresentation, EncryptionFlags, ErrorKind,
    InputBuffers, PackageCapabilities, ProviderStatus, SecurityBuffer, SecurityBufferRef, SecurityStatus,
};

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Failure reported by a security provider: the `SEC_E_*` kind and a description.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProviderError {
    pub error_type: ErrorKind,
    pub description: String,
}

impl ProviderError {
    /// Allows to fill a new error easily, supplying it with a coherent description.
    pub fn new(error_type: ErrorKind, description: impl ToString) -> Self {
        Self {
            error_type,
            description: description.to_string(),
        }
    }

    pub fn status(&self) -> ProviderStatus {
        ProviderStatus::from(self.error_type)
    }
}

impl error::Error for ProviderError {}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status(), self.description)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, FromPrimitive, ToPrimitive)]
pub enum CredentialUse {
    Inbound = 1,
    Outbound = 2,
    Both = 3,
    Default = 4,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PackageInfo {
    pub capabilities: PackageCapabilities,
    pub rpc_id: u16,
    pub max_token_len: u32,
    pub name: String,
    pub comment: String,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct ContextSizes {
    pub max_token: u32,
    pub max_signature: u32,
    pub block: u32,
    pub security_trailer: u32,
}

/// Arguments of one context initialization step.
///
/// `context` is `None` on the very first step only. The provider then returns the context it
/// created in [`InitializeSecurityContextResult::context`]; on every later step it updates the
/// referenced context in place.
#[derive(Debug)]
pub struct InitializeSecurityContext<'a, C, X> {
    pub credentials_handle: &'a mut C,
    pub context: Option<&'a mut X>,
    pub target_name: Option<&'a str>,
    pub context_requirements: ClientRequestFlags,
    pub target_data_representation: DataRepresentation,
    pub input: Option<InputBuffers<'a>>,
    pub output: &'a mut SecurityBuffer,
}

#[derive(Debug)]
pub struct InitializeSecurityContextResult<X> {
    pub status: SecurityStatus,
    pub flags: ClientResponseFlags,
    pub context: Option<X>,
}

/// Outbound authentication capabilities of a security package.
///
/// Credentials handles and contexts are opaque to the engine, which owns them from creation
/// until it hands them back to [`free_credentials_handle`](Self::free_credentials_handle) and
/// [`delete_security_context`](Self::delete_security_context), exactly once each.
pub trait SecurityProvider {
    type CredentialsHandle;
    type Context;

    fn query_package_info(&mut self) -> ProviderResult<PackageInfo>;

    fn acquire_credentials_handle(
        &mut self,
        identity: &AuthIdentity,
        credential_use: CredentialUse,
        context_requirements: ClientRequestFlags,
    ) -> ProviderResult<Self::CredentialsHandle>;

    fn initialize_security_context(
        &mut self,
        request: InitializeSecurityContext<'_, Self::CredentialsHandle, Self::Context>,
    ) -> ProviderResult<InitializeSecurityContextResult<Self::Context>>;

    /// Runs the local completion step on the output token.
    ///
    /// Returns `None` when the package has no completion step.
    fn complete_auth_token(
        &mut self,
        _context: &mut Self::Context,
        _output: &mut SecurityBuffer,
    ) -> Option<ProviderResult<SecurityStatus>> {
        None
    }

    fn query_context_sizes(&mut self, context: &mut Self::Context) -> ProviderResult<ContextSizes>;

    fn encrypt_message(
        &mut self,
        context: &mut Self::Context,
        flags: EncryptionFlags,
        message: &mut [SecurityBufferRef<'_>],
        sequence_number: u32,
    ) -> ProviderResult<SecurityStatus>;

    fn free_credentials_handle(&mut self, credentials_handle: Self::CredentialsHandle) -> ProviderResult<()>;

    fn delete_security_context(&mut self, context: Self::Context) -> ProviderResult<()>;

    fn free_package_info(&mut self, _package_info: PackageInfo) -> ProviderResult<()> {
        Ok(())
    }
}

impl<T: SecurityProvider + ?Sized> SecurityProvider for &mut T {
    type CredentialsHandle = T::CredentialsHandle;
    type Context = T::Context;

    fn query_package_info(&mut self) -> ProviderResult<PackageInfo> {
        (**self).query_package_info()
    }

    fn acquire_credentials_handle(
        &mut self,
        identity: &AuthIdentity,
        credential_use: CredentialUse,
        context_requirements: ClientRequestFlags,
    ) -> ProviderResult<Self::CredentialsHandle> {
        (**self).acquire_credentials_handle(identity, credential_use, context_requirements)
    }

    fn initialize_security_context(
        &mut self,
        request: InitializeSecurityContext<'_, Self::CredentialsHandle, Self::Context>,
    ) -> ProviderResult<InitializeSecurityContextResult<Self::Context>> {
        (**self).initialize_security_context(request)
    }

    fn complete_auth_token(
        &mut self,
        context: &mut Self::Context,
        output: &mut SecurityBuffer,
    ) -> Option<ProviderResult<SecurityStatus>> {
        (**self).complete_auth_token(context, output)
    }

    fn query_context_sizes(&mut self, context: &mut Self::Context) -> ProviderResult<ContextSizes> {
        (**self).query_context_sizes(context)
    }

    fn encrypt_message(
        &mut self,
        context: &mut Self::Context,
        flags: EncryptionFlags,
        message: &mut [SecurityBufferRef<'_>],
        sequence_number: u32,
    ) -> ProviderResult<SecurityStatus> {
        (**self).encrypt_message(context, flags, message, sequence_number)
    }

    fn free_credentials_handle(&mut self, credentials_handle: Self::CredentialsHandle) -> ProviderResult<()> {
        (**self).free_credentials_handle(credentials_handle)
    }

    fn delete_security_context(&mut self, context: Self::Context) -> ProviderResult<()> {
        (**self).delete_security_context(context)
    }

    fn free_package_info(&mut self, package_info: PackageInfo) -> ProviderResult<()> {
        (**self).free_package_info(package_info)
    }
}
