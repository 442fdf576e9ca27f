use crate::error::{HandshakeError, Operation, Result};
use crate::utils::cast_to_wire;
use crate::{
    ContextSizes, EncryptionFlags, HandshakeEngine, HandshakeState, SecurityBufferRef, SecurityProvider, SecurityStatus,
};

/// Message protection over an established security context.
///
/// Borrowed from [`HandshakeEngine::protector`]; only exists while the engine is established.
pub struct MessageProtector<'e, P: SecurityProvider> {
    provider: &'e mut P,
    context: &'e mut P::Context,
    context_sizes: &'e mut ContextSizes,
}

impl<P: SecurityProvider> MessageProtector<'_, P> {
    /// Encrypts or signs `message` in place.
    ///
    /// The sequence number is checked against the 32-bit wire field before the provider sees
    /// the message. A rejected message leaves the context usable for the next one.
    #[instrument(level = "trace", skip(self, message), fields(buffers = message.len()))]
    pub fn protect_message(
        &mut self,
        qop: EncryptionFlags,
        message: &mut [SecurityBufferRef<'_>],
        sequence_number: u64,
    ) -> Result<()> {
        let sequence_number: u32 = cast_to_wire(sequence_number, "sequence_number", Operation::ProtectMessage)?;

        match self.provider.encrypt_message(self.context, qop, message, sequence_number) {
            Ok(SecurityStatus::Ok) => Ok(()),
            Ok(status) => {
                error!(?status, "EncryptMessage returned an unexpected status");

                Err(HandshakeError::unexpected_status(Operation::EncryptMessage, status))
            }
            Err(err) => {
                error!(%err, "EncryptMessage failed");

                Err(HandshakeError::rejected(Operation::EncryptMessage, err))
            }
        }
    }

    /// Signature size of the cached context sizes.
    pub fn max_signature_size(&self) -> Result<u16> {
        max_signature_size(&*self.context_sizes)
    }

    /// Queries the context sizes again and returns the new signature size.
    pub fn query_auth_size(&mut self) -> Result<u16> {
        *self.context_sizes = self
            .provider
            .query_context_sizes(self.context)
            .map_err(|err| HandshakeError::rejected(Operation::QueryContextSizes, err))?;

        max_signature_size(&*self.context_sizes)
    }
}

#[track_caller]
fn max_signature_size(sizes: &ContextSizes) -> Result<u16> {
    cast_to_wire(sizes.max_signature, "max_signature", Operation::MaxSignatureSize)
}

impl<'a, P: SecurityProvider> HandshakeEngine<'a, P> {
    /// Borrows the established context for message protection.
    pub fn protector(&mut self) -> Result<MessageProtector<'_, P>> {
        let state = self.state;

        match (state, self.context.as_mut()) {
            (HandshakeState::Established, Some(context)) => Ok(MessageProtector {
                provider: &mut self.provider,
                context,
                context_sizes: &mut self.context_sizes,
            }),
            _ => Err(HandshakeError::InvalidState {
                operation: Operation::ProtectMessage,
                state,
            }),
        }
    }

    /// Encrypts or signs `message` with the established context.
    ///
    /// Fails with [`HandshakeError::InvalidState`] before the handshake completes.
    pub fn protect_message(
        &mut self,
        qop: EncryptionFlags,
        message: &mut [SecurityBufferRef<'_>],
        sequence_number: u64,
    ) -> Result<()> {
        self.protector()?.protect_message(qop, message, sequence_number)
    }

    /// Maximum signature size reported by the last context size query.
    ///
    /// Zero until a round has completed the context.
    pub fn max_signature_size(&self) -> Result<u16> {
        max_signature_size(&self.context_sizes)
    }

    /// Re-queries the context sizes and returns the maximum signature size.
    ///
    /// Needs a security context, but not a completed handshake.
    pub fn query_auth_size(&mut self) -> Result<u16> {
        let Some(context) = self.context.as_mut() else {
            return Err(HandshakeError::InvalidState {
                operation: Operation::QueryContextSizes,
                state: self.state,
            });
        };

        self.context_sizes = self
            .provider
            .query_context_sizes(context)
            .map_err(|err| HandshakeError::rejected(Operation::QueryContextSizes, err))?;

        max_signature_size(&self.context_sizes)
    }
}
