//! NTLM provider backed by the `sspi` crate.
//!
//! Each handshake gets its own [`SspiContext::Ntlm`]. Credentials are kept as the
//! [`CredentialsBuffers`] produced by `AcquireCredentialsHandle`.

use num_traits::{FromPrimitive, ToPrimitive};
use sspi::builders::{AcquireCredentialsHandle, WithoutCredentialUse};
use sspi::credssp::SspiContext;
use sspi::ntlm::NtlmConfig;
use sspi::{AcquireCredentialsHandleResult, CredentialsBuffers, Ntlm, Sspi, Username};

use crate::provider::{
    ContextSizes, CredentialUse, InitializeSecurityContext, InitializeSecurityContextResult, PackageInfo,
    ProviderError, ProviderResult,
};
use crate::{
    AuthIdentity, BufferType, ClientRequestFlags, ClientResponseFlags, DataRepresentation, EncryptionFlags,
    ErrorKind, InputBuffer, PackageCapabilities, SecurityBuffer, SecurityBufferRef, SecurityProvider,
    SecurityStatus,
};

impl From<sspi::Error> for ProviderError {
    fn from(err: sspi::Error) -> Self {
        let error_type = err
            .error_type
            .to_u32()
            .and_then(ErrorKind::from_u32)
            .unwrap_or(ErrorKind::InternalError);

        ProviderError::new(error_type, err.description)
    }
}

fn convert_status(status: sspi::SecurityStatus) -> ProviderResult<SecurityStatus> {
    status
        .to_u32()
        .and_then(SecurityStatus::from_u32)
        .ok_or_else(|| ProviderError::new(ErrorKind::InternalError, format!("unknown security status: {:?}", status)))
}

#[derive(Debug, Clone, Default)]
pub struct SspiNtlmProvider {
    client_computer_name: Option<String>,
}

impl SspiNtlmProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Workstation name sent in the NTLM messages.
    pub fn with_client_computer_name(self, client_computer_name: impl Into<String>) -> Self {
        Self {
            client_computer_name: Some(client_computer_name.into()),
        }
    }

    fn new_context(&self) -> SspiContext {
        SspiContext::Ntlm(Ntlm::with_config(NtlmConfig {
            client_computer_name: self.client_computer_name.clone(),
        }))
    }
}

impl SecurityProvider for SspiNtlmProvider {
    type CredentialsHandle = Option<CredentialsBuffers>;
    type Context = SspiContext;

    fn query_package_info(&mut self) -> ProviderResult<PackageInfo> {
        let info = self.new_context().query_context_package_info()?;

        Ok(PackageInfo {
            capabilities: PackageCapabilities::from_bits_truncate(info.capabilities.bits()),
            rpc_id: info.rpc_id,
            max_token_len: info.max_token_len,
            name: info.name.to_string(),
            comment: info.comment,
        })
    }

    fn acquire_credentials_handle(
        &mut self,
        identity: &AuthIdentity,
        credential_use: CredentialUse,
        _context_requirements: ClientRequestFlags,
    ) -> ProviderResult<Self::CredentialsHandle> {
        if identity.is_anonymous() {
            return Err(ProviderError::new(
                ErrorKind::NoCredentials,
                "NTLM needs an explicit user name",
            ));
        }

        let domain = (!identity.domain.is_empty()).then_some(identity.domain.as_str());
        let username = Username::new(&identity.username, domain)
            .map_err(|err| ProviderError::new(ErrorKind::InvalidParameter, err))?;
        let credentials = sspi::Credentials::AuthIdentity(sspi::AuthIdentity {
            username,
            password: identity.password.as_ref().clone().into(),
        });

        let credential_use = match credential_use {
            CredentialUse::Inbound => sspi::CredentialUse::Inbound,
            CredentialUse::Outbound => sspi::CredentialUse::Outbound,
            CredentialUse::Both => sspi::CredentialUse::Both,
            CredentialUse::Default => sspi::CredentialUse::Default,
        };

        let mut context = self.new_context();
        let builder = AcquireCredentialsHandle::<'_, _, _, WithoutCredentialUse>::new();
        let AcquireCredentialsHandleResult { credentials_handle, .. } = builder
            .with_auth_data(&credentials)
            .with_credential_use(credential_use)
            .execute(&mut context)?;

        Ok(credentials_handle)
    }

    #[instrument(level = "trace", skip_all, fields(has_context = request.context.is_some()))]
    fn initialize_security_context(
        &mut self,
        request: InitializeSecurityContext<'_, Self::CredentialsHandle, Self::Context>,
    ) -> ProviderResult<InitializeSecurityContextResult<Self::Context>> {
        let InitializeSecurityContext {
            credentials_handle,
            context,
            target_name,
            context_requirements,
            target_data_representation,
            input,
            output,
        } = request;

        let mut created = None;
        let context = match context {
            Some(context) => context,
            None => created.insert(self.new_context()),
        };

        let mut input_buffers: Vec<_> = input
            .iter()
            .flat_map(|input| input.iter())
            .map(|buffer| match buffer {
                InputBuffer::Token(token) => sspi::SecurityBuffer::new(token.to_vec(), sspi::BufferType::Token),
                InputBuffer::ChannelBindings(bindings) => {
                    sspi::SecurityBuffer::new(bindings.to_vec(), sspi::BufferType::ChannelBindings)
                }
            })
            .collect();
        let mut output_buffers = [sspi::SecurityBuffer::new(Vec::with_capacity(output.len()), sspi::BufferType::Token)];

        let target_data_representation = match target_data_representation {
            DataRepresentation::Network => sspi::DataRepresentation::Network,
            DataRepresentation::Native => sspi::DataRepresentation::Native,
        };

        let mut builder = context
            .initialize_security_context()
            .with_credentials_handle(credentials_handle)
            .with_context_requirements(sspi::ClientRequestFlags::from_bits_truncate(context_requirements.bits()))
            .with_target_data_representation(target_data_representation)
            .with_output(&mut output_buffers);
        if let Some(target_name) = target_name {
            builder = builder.with_target_name(target_name);
        }
        if input.is_some() {
            builder = builder.with_input(&mut input_buffers);
        }

        let result = context.initialize_security_context_sync(&mut builder)?;

        output.write_token(&output_buffers[0].buffer)?;

        Ok(InitializeSecurityContextResult {
            status: convert_status(result.status)?,
            flags: ClientResponseFlags::from_bits_truncate(result.flags.bits()),
            context: created,
        })
    }

    fn complete_auth_token(
        &mut self,
        context: &mut Self::Context,
        output: &mut SecurityBuffer,
    ) -> Option<ProviderResult<SecurityStatus>> {
        let mut token = [sspi::SecurityBuffer::new(output.buffer.clone(), sspi::BufferType::Token)];

        let status = context
            .complete_auth_token(&mut token)
            .map_err(ProviderError::from)
            .and_then(convert_status)
            .and_then(|status| {
                output.write_token(&token[0].buffer)?;

                Ok(status)
            });

        Some(status)
    }

    fn query_context_sizes(&mut self, context: &mut Self::Context) -> ProviderResult<ContextSizes> {
        let sizes = context.query_context_sizes()?;

        Ok(ContextSizes {
            max_token: sizes.max_token,
            max_signature: sizes.max_signature,
            block: sizes.block,
            security_trailer: sizes.security_trailer,
        })
    }

    fn encrypt_message(
        &mut self,
        context: &mut Self::Context,
        flags: EncryptionFlags,
        message: &mut [SecurityBufferRef<'_>],
        sequence_number: u32,
    ) -> ProviderResult<SecurityStatus> {
        let mut sspi_message: Vec<_> = message
            .iter_mut()
            .map(|buffer| {
                let buffer_flags = sspi::SecurityBufferFlags::from_bits_truncate(buffer.buffer_flags().bits());
                let sspi_buffer = match buffer.buffer_type() {
                    BufferType::Data => sspi::SecurityBufferRef::data_buf(buffer.take_data()),
                    BufferType::Token => sspi::SecurityBufferRef::token_buf(buffer.take_data()),
                    BufferType::StreamHeader => sspi::SecurityBufferRef::stream_header_buf(buffer.take_data()),
                    BufferType::StreamTrailer => sspi::SecurityBufferRef::stream_trailer_buf(buffer.take_data()),
                    BufferType::Stream => sspi::SecurityBufferRef::stream_buf(buffer.take_data()),
                    BufferType::Padding => sspi::SecurityBufferRef::padding_buf(buffer.take_data()),
                    BufferType::Missing => sspi::SecurityBufferRef::missing_buf(buffer.buf_len()),
                    _ => sspi::SecurityBufferRef::empty_buf(),
                };

                sspi_buffer.with_flags(buffer_flags)
            })
            .collect();

        let status = context.encrypt_message(
            sspi::EncryptionFlags::from_bits_truncate(flags.bits()),
            &mut sspi_message,
            sequence_number,
        );

        // The provider may have shrunk the buffers. Hand the slices back either way.
        for (buffer, sspi_buffer) in message.iter_mut().zip(sspi_message.iter_mut()) {
            buffer.set_data(sspi_buffer.take_data());
        }

        convert_status(status?)
    }

    fn free_credentials_handle(&mut self, credentials_handle: Self::CredentialsHandle) -> ProviderResult<()> {
        drop(credentials_handle);

        Ok(())
    }

    fn delete_security_context(&mut self, context: Self::Context) -> ProviderResult<()> {
        drop(context);

        Ok(())
    }
}
