//! Client side of a multi-round challenge-response handshake.
//!
//! [`HandshakeEngine`] owns the credentials, the security context and the token buffers of one
//! authentication attempt. The caller drives it round by round:
//!
//! ```text
//! loop {
//!     let continue_needed = engine.step()?;
//!     send(engine.output_token());
//!     if !continue_needed { break; }
//!     engine.set_input_token(&receive())?;
//! }
//! ```
//!
//! Once the engine reaches [`HandshakeState::Established`], messages can be protected with
//! [`HandshakeEngine::protect_message`].

use crate::credentials::Credentials;
use crate::error::{HandshakeError, Operation, Result};
use crate::token_buffers::TokenBuffers;
use crate::{
    AuthIdentity, ClientResponseFlags, ContextSizes, ErrorKind, HandshakeConfig, InitializeSecurityContext,
    PackageInfo, ProviderError, ProviderStatus, SecurityProvider, SecurityStatus,
};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HandshakeState {
    /// Credentials are acquired and no context exists yet.
    Fresh,
    /// The peer's next token is expected.
    Continuing,
    Established,
    /// A round failed. The engine only accepts teardown from here.
    Failed,
    /// Resources were released by [`HandshakeEngine::teardown`].
    TornDown,
}

/// Provider statuses a context step may legitimately return.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum RoundStatus {
    Ok,
    ContinueNeeded,
    CompleteNeeded,
    CompleteAndContinue,
}

impl RoundStatus {
    fn classify(status: SecurityStatus) -> Option<Self> {
        match status {
            SecurityStatus::Ok => Some(RoundStatus::Ok),
            SecurityStatus::ContinueNeeded => Some(RoundStatus::ContinueNeeded),
            SecurityStatus::CompleteNeeded => Some(RoundStatus::CompleteNeeded),
            SecurityStatus::CompleteAndContinue => Some(RoundStatus::CompleteAndContinue),
            _ => None,
        }
    }

    fn needs_completion(self) -> bool {
        matches!(self, RoundStatus::CompleteNeeded | RoundStatus::CompleteAndContinue)
    }

    fn continue_needed(self) -> bool {
        matches!(self, RoundStatus::ContinueNeeded | RoundStatus::CompleteAndContinue)
    }
}

pub struct HandshakeEngine<'a, P: SecurityProvider> {
    pub(crate) provider: P,
    identity: AuthIdentity,
    config: HandshakeConfig,
    credentials: Credentials<P>,
    pub(crate) context: Option<P::Context>,
    buffers: TokenBuffers<'a>,
    pub(crate) state: HandshakeState,
    continue_needed: bool,
    pub(crate) context_sizes: ContextSizes,
    context_attributes: ClientResponseFlags,
}

impl<'a, P: SecurityProvider> HandshakeEngine<'a, P> {
    /// Acquires outbound credentials for `identity` and prepares the first round.
    ///
    /// `channel_bindings` is borrowed for the whole handshake and attached to every round that
    /// carries an input token.
    #[instrument(level = "debug", skip_all, fields(mode = ?config.mode, target_name = ?config.target_name))]
    pub fn new(
        mut provider: P,
        identity: AuthIdentity,
        config: HandshakeConfig,
        channel_bindings: Option<&'a [u8]>,
    ) -> Result<Self> {
        let credentials = Credentials::acquire(&mut provider, &identity, config.mode)?;
        let buffers = TokenBuffers::new(credentials.max_token_len(), channel_bindings);

        Ok(Self {
            provider,
            identity,
            config,
            credentials,
            context: None,
            buffers,
            state: HandshakeState::Fresh,
            continue_needed: false,
            context_sizes: ContextSizes::default(),
            context_attributes: ClientResponseFlags::empty(),
        })
    }

    /// Replaces the service principal name used by the following rounds.
    pub fn set_target_name(&mut self, target_name: impl Into<String>) {
        self.config.target_name = Some(target_name.into());
    }

    /// Stores a copy of the peer's token for the next round.
    pub fn set_input_token(&mut self, token: &[u8]) -> Result<()> {
        self.check_accepts_input()?;

        self.buffers.set_input_copy(token)
    }

    /// Stores a reference to the peer's token for the next round without copying it.
    pub fn set_input_token_borrowed(&mut self, token: &'a [u8]) -> Result<()> {
        self.check_accepts_input()?;

        self.buffers.set_input_borrowed(token)
    }

    fn check_accepts_input(&self) -> Result<()> {
        match self.state {
            HandshakeState::Fresh | HandshakeState::Continuing => Ok(()),
            state => Err(HandshakeError::InvalidState {
                operation: Operation::SetInputToken,
                state,
            }),
        }
    }

    /// Runs one handshake round.
    ///
    /// Returns `true` while the peer must answer with another token. A provider failure moves
    /// the engine to [`HandshakeState::Failed`] and discards the round's output. A failed
    /// allocation of the output buffer leaves the state untouched.
    #[instrument(level = "debug", ret, skip(self), fields(state = ?self.state, has_input = self.buffers.has_input()))]
    pub fn step(&mut self) -> Result<bool> {
        match self.state {
            HandshakeState::Fresh | HandshakeState::Continuing if self.credentials.is_acquired() => {}
            state => {
                return Err(HandshakeError::InvalidState {
                    operation: Operation::Step,
                    state,
                })
            }
        }

        self.buffers.reset_output()?;

        let status = match self.run_round() {
            Ok(status) => status,
            Err(err) => {
                error!(%err, "handshake round failed");

                self.state = HandshakeState::Failed;
                self.continue_needed = false;
                self.buffers.discard_output();
                self.buffers.consume_input();

                return Err(err);
            }
        };

        self.continue_needed = status.continue_needed();
        self.state = if self.continue_needed {
            HandshakeState::Continuing
        } else {
            HandshakeState::Established
        };

        self.buffers.consume_input();

        debug!(
            output_len = self.buffers.output().len(),
            attributes = ?self.context_attributes,
            "handshake round finished"
        );

        Ok(self.continue_needed)
    }

    fn run_round(&mut self) -> Result<RoundStatus> {
        let context_requirements = self.credentials.context_requirements();
        let input_required = self.context.is_some();

        let credentials_handle = self.credentials.handle_mut().ok_or(HandshakeError::InvalidState {
            operation: Operation::Step,
            state: self.state,
        })?;
        let (input, output) = self.buffers.round_buffers(input_required);

        let result = self
            .provider
            .initialize_security_context(InitializeSecurityContext {
                credentials_handle,
                context: self.context.as_mut(),
                target_name: self.config.target_name.as_deref(),
                context_requirements,
                target_data_representation: self.config.data_representation,
                input,
                output,
            })
            .map_err(|err| HandshakeError::rejected(Operation::InitializeSecurityContext, err))?;

        let status = result.status;
        debug!(status = %ProviderStatus::from(status), "InitializeSecurityContext");

        if let Some(context) = result.context {
            if let Some(previous) = self.context.replace(context) {
                if let Err(err) = self.provider.delete_security_context(previous) {
                    warn!(%err, "DeleteSecurityContext failed");
                }
            }
        }
        self.context_attributes = result.flags;

        let Some(context) = self.context.as_mut() else {
            return Err(HandshakeError::rejected(
                Operation::InitializeSecurityContext,
                ProviderError::new(ErrorKind::NoContext, "provider did not create a security context"),
            ));
        };

        let status = RoundStatus::classify(status)
            .ok_or_else(|| HandshakeError::unexpected_status(Operation::InitializeSecurityContext, status))?;

        if status == RoundStatus::ContinueNeeded {
            return Ok(status);
        }

        if status.needs_completion() {
            match self.provider.complete_auth_token(context, self.buffers.output_mut()) {
                Some(Ok(SecurityStatus::Ok)) | None => {}
                Some(Ok(status)) => {
                    return Err(HandshakeError::unexpected_status(Operation::CompleteAuthToken, status))
                }
                Some(Err(err)) => return Err(HandshakeError::rejected(Operation::CompleteAuthToken, err)),
            }
        }

        self.context_sizes = self
            .provider
            .query_context_sizes(context)
            .map_err(|err| HandshakeError::rejected(Operation::QueryContextSizes, err))?;

        debug!(sizes = ?self.context_sizes, "context sizes");

        Ok(status)
    }

    /// Token produced by the last successful round.
    pub fn output_token(&self) -> &[u8] {
        self.buffers.output()
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_established(&self) -> bool {
        self.state == HandshakeState::Established
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    pub fn continue_needed(&self) -> bool {
        self.continue_needed
    }

    pub fn context_sizes(&self) -> ContextSizes {
        self.context_sizes
    }

    /// Capability flags the provider granted on the last round.
    pub fn context_attributes(&self) -> ClientResponseFlags {
        self.context_attributes
    }

    pub fn package_info(&self) -> Option<&PackageInfo> {
        self.credentials.package_info()
    }

    pub fn identity(&self) -> &AuthIdentity {
        &self.identity
    }

    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    pub fn channel_bindings(&self) -> Option<&'a [u8]> {
        self.buffers.channel_bindings()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Wipes the identity and releases every provider resource the engine still holds.
    ///
    /// The engine ends up in [`HandshakeState::TornDown`]. Release failures are logged and
    /// otherwise ignored. Calling it again does nothing.
    pub fn teardown(&mut self) {
        self.state = HandshakeState::TornDown;
        self.continue_needed = false;

        self.identity.clear();
        self.config.target_name = None;

        self.credentials.release(&mut self.provider);
        self.credentials.release_package_info(&mut self.provider);

        if let Some(context) = self.context.take() {
            if let Err(err) = self.provider.delete_security_context(context) {
                warn!(%err, "DeleteSecurityContext failed");
            }
        }

        self.buffers.consume_input();
    }

    /// Frees the output buffer, then tears the engine down.
    pub fn destroy(self) {
        drop(self)
    }
}

impl<P: SecurityProvider> Drop for HandshakeEngine<'_, P> {
    fn drop(&mut self) {
        self.buffers.discard_output();
        self.teardown();
    }
}
