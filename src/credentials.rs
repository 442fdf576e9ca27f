use crate::error::{HandshakeError, Operation, Result};
use crate::{AuthIdentity, AuthMode, ClientRequestFlags, CredentialUse, ErrorKind, PackageInfo, SecurityProvider};

/// Outbound credentials handle together with the package info queried while acquiring it.
///
/// Both are released at most once: releasing takes them out of their slots.
pub(crate) struct Credentials<P: SecurityProvider> {
    handle: Option<P::CredentialsHandle>,
    package_info: Option<PackageInfo>,
    max_token_len: u32,
    context_requirements: ClientRequestFlags,
}

impl<P: SecurityProvider> Credentials<P> {
    #[instrument(level = "debug", skip_all, fields(mode = ?mode, anonymous = identity.is_anonymous()))]
    pub(crate) fn acquire(provider: &mut P, identity: &AuthIdentity, mode: AuthMode) -> Result<Self> {
        let package_info = provider.query_package_info().map_err(|err| {
            if err.error_type == ErrorKind::SecurityPackageNotFound {
                HandshakeError::ProviderUnavailable(err.description)
            } else {
                HandshakeError::rejected(Operation::QueryPackageInfo, err)
            }
        })?;

        debug!(package = %package_info.name, max_token_len = package_info.max_token_len);

        let context_requirements = mode.context_requirements();

        let handle =
            match provider.acquire_credentials_handle(identity, CredentialUse::Outbound, context_requirements) {
                Ok(handle) => handle,
                Err(err) => {
                    error!(%err, "AcquireCredentialsHandle failed");

                    if let Err(err) = provider.free_package_info(package_info) {
                        warn!(%err, "FreeContextBuffer failed");
                    }

                    return Err(HandshakeError::rejected(Operation::AcquireCredentialsHandle, err));
                }
            };

        Ok(Self {
            handle: Some(handle),
            max_token_len: package_info.max_token_len,
            package_info: Some(package_info),
            context_requirements,
        })
    }

    pub(crate) fn handle_mut(&mut self) -> Option<&mut P::CredentialsHandle> {
        self.handle.as_mut()
    }

    pub(crate) fn is_acquired(&self) -> bool {
        self.handle.is_some()
    }

    pub(crate) fn package_info(&self) -> Option<&PackageInfo> {
        self.package_info.as_ref()
    }

    pub(crate) fn max_token_len(&self) -> u32 {
        self.max_token_len
    }

    pub(crate) fn context_requirements(&self) -> ClientRequestFlags {
        self.context_requirements
    }

    /// Releases the credentials handle. Does nothing when it was already released.
    pub(crate) fn release(&mut self, provider: &mut P) {
        if let Some(handle) = self.handle.take() {
            if let Err(err) = provider.free_credentials_handle(handle) {
                warn!(%err, "FreeCredentialsHandle failed");
            }
        }
    }

    pub(crate) fn release_package_info(&mut self, provider: &mut P) {
        if let Some(package_info) = self.package_info.take() {
            if let Err(err) = provider.free_package_info(package_info) {
                warn!(%err, "FreeContextBuffer failed");
            }
        }
    }
}
