#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Once;

use sspi_handshake::{
    AuthIdentity, AuthMode, BufferType, ClientRequestFlags, ClientResponseFlags, ContextSizes, CredentialUse,
    DataRepresentation, EncryptionFlags, ErrorKind, HandshakeConfig, HandshakeEngine, InitializeSecurityContext,
    InitializeSecurityContextResult, PackageCapabilities, PackageInfo, ProviderError, ProviderResult,
    SecurityBuffer, SecurityBufferRef, SecurityProvider, SecurityStatus,
};
use tracing_subscriber::EnvFilter;

pub const MAX_TOKEN_LEN: u32 = 2888;
pub const NEGOTIATE_MESSAGE: &[u8] = b"NTLMSSP\0\x01\0\0\0";
pub const CHALLENGE_MESSAGE: &[u8] = b"NTLMSSP\0\x02\0\0\0challenge";
pub const AUTHENTICATE_MESSAGE: &[u8] = b"NTLMSSP\0\x03\0\0\0authenticate";
pub const SIGNATURE: [u8; 16] = [0xAA; 16];

static SETUP: Once = Once::new();

const LOG_FILTER_ENV: &str = "SSPI_HANDSHAKE_LOG";

pub fn setup_logger() {
    SETUP.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_env(LOG_FILTER_ENV))
            .with_test_writer()
            .try_init();
    })
}

/// Scripted answer of one `initialize_security_context` call.
#[derive(Debug, Clone)]
pub struct Round {
    pub result: ProviderResult<SecurityStatus>,
    pub token: Vec<u8>,
    pub flags: ClientResponseFlags,
    /// Whether a context is handed back on the first round.
    pub creates_context: bool,
}

impl Round {
    pub fn new(status: SecurityStatus, token: &[u8]) -> Self {
        Self {
            result: Ok(status),
            token: token.to_vec(),
            flags: ClientResponseFlags::CONFIDENTIALITY,
            creates_context: true,
        }
    }

    pub fn fail(kind: ErrorKind, description: &str) -> Self {
        Self {
            result: Err(ProviderError::new(kind, description)),
            token: Vec::new(),
            flags: ClientResponseFlags::empty(),
            creates_context: false,
        }
    }
}

/// What the provider saw in one `initialize_security_context` call.
#[derive(Debug, Clone)]
pub struct ObservedRound {
    pub had_context: bool,
    pub target_name: Option<String>,
    pub context_requirements: ClientRequestFlags,
    pub data_representation: DataRepresentation,
    pub input_token: Option<Vec<u8>>,
    pub input_token_ptr: Option<*const u8>,
    pub channel_bindings: Option<Vec<u8>>,
    pub channel_bindings_ptr: Option<*const u8>,
    pub output_len: usize,
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct Calls {
    pub query_package_info: usize,
    pub acquire_credentials_handle: usize,
    pub initialize_security_context: usize,
    pub complete_auth_token: usize,
    pub query_context_sizes: usize,
    pub encrypt_message: usize,
    pub free_credentials_handle: usize,
    pub delete_security_context: usize,
    pub free_package_info: usize,
}

#[derive(Debug, Eq, PartialEq)]
pub struct MockCredentials(pub u32);

#[derive(Debug, Eq, PartialEq)]
pub struct MockContext(pub u32);

/// Security provider that replays scripted rounds and records every call it receives.
#[derive(Debug)]
pub struct MockProvider {
    pub package_info: ProviderResult<PackageInfo>,
    pub acquire_error: Option<ProviderError>,
    pub rounds: VecDeque<Round>,
    pub completion: Option<ProviderResult<SecurityStatus>>,
    pub sizes: ProviderResult<ContextSizes>,
    pub encrypt_result: ProviderResult<SecurityStatus>,
    pub release_error: Option<ProviderError>,

    pub calls: Calls,
    pub observed: Vec<ObservedRound>,
    pub credential_use: Option<CredentialUse>,
    pub identity: Option<(String, String, String)>,
    pub sequence_numbers: Vec<u32>,
    pub encrypt_flags: Vec<EncryptionFlags>,
    pub freed_credentials: Vec<u32>,
    pub deleted_contexts: Vec<u32>,
    next_id: u32,
}

impl MockProvider {
    pub fn ntlm() -> Self {
        Self {
            package_info: Ok(PackageInfo {
                capabilities: PackageCapabilities::INTEGRITY
                    | PackageCapabilities::PRIVACY
                    | PackageCapabilities::CONNECTION,
                rpc_id: 10,
                max_token_len: MAX_TOKEN_LEN,
                name: String::from("NTLM"),
                comment: String::from("NTLM Security Package"),
            }),
            acquire_error: None,
            rounds: VecDeque::new(),
            completion: Some(Ok(SecurityStatus::Ok)),
            sizes: Ok(ContextSizes {
                max_token: 2010,
                max_signature: 16,
                block: 0,
                security_trailer: 16,
            }),
            encrypt_result: Ok(SecurityStatus::Ok),
            release_error: None,
            calls: Calls::default(),
            observed: Vec::new(),
            credential_use: None,
            identity: None,
            sequence_numbers: Vec::new(),
            encrypt_flags: Vec::new(),
            freed_credentials: Vec::new(),
            deleted_contexts: Vec::new(),
            next_id: 1,
        }
    }

    /// Two-round NTLM exchange: negotiate, then authenticate.
    pub fn two_rounds() -> Self {
        Self::ntlm().with_rounds([
            Round::new(SecurityStatus::ContinueNeeded, NEGOTIATE_MESSAGE),
            Round::new(SecurityStatus::Ok, AUTHENTICATE_MESSAGE),
        ])
    }

    pub fn with_rounds(mut self, rounds: impl IntoIterator<Item = Round>) -> Self {
        self.rounds = rounds.into_iter().collect();
        self
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl SecurityProvider for MockProvider {
    type CredentialsHandle = MockCredentials;
    type Context = MockContext;

    fn query_package_info(&mut self) -> ProviderResult<PackageInfo> {
        self.calls.query_package_info += 1;
        self.package_info.clone()
    }

    fn acquire_credentials_handle(
        &mut self,
        identity: &AuthIdentity,
        credential_use: CredentialUse,
        _context_requirements: ClientRequestFlags,
    ) -> ProviderResult<Self::CredentialsHandle> {
        self.calls.acquire_credentials_handle += 1;
        self.credential_use = Some(credential_use);
        self.identity = Some((
            identity.username.clone(),
            identity.domain.clone(),
            identity.password.as_ref().clone(),
        ));

        match self.acquire_error.clone() {
            Some(err) => Err(err),
            None => Ok(MockCredentials(self.next_id())),
        }
    }

    fn initialize_security_context(
        &mut self,
        request: InitializeSecurityContext<'_, Self::CredentialsHandle, Self::Context>,
    ) -> ProviderResult<InitializeSecurityContextResult<Self::Context>> {
        self.calls.initialize_security_context += 1;

        assert_eq!(request.output.buffer_type, BufferType::Token);

        self.observed.push(ObservedRound {
            had_context: request.context.is_some(),
            target_name: request.target_name.map(str::to_owned),
            context_requirements: request.context_requirements,
            data_representation: request.target_data_representation,
            input_token: request.input.map(|input| input.token().to_vec()),
            input_token_ptr: request.input.map(|input| input.token().as_ptr()),
            channel_bindings: request
                .input
                .and_then(|input| input.channel_bindings())
                .map(<[u8]>::to_vec),
            channel_bindings_ptr: request
                .input
                .and_then(|input| input.channel_bindings())
                .map(<[u8]>::as_ptr),
            output_len: request.output.len(),
        });

        let round = self
            .rounds
            .pop_front()
            .ok_or_else(|| ProviderError::new(ErrorKind::OutOfSequence, "no more scripted rounds"))?;
        let status = round.result?;

        request.output.write_token(&round.token)?;

        let context = if request.context.is_none() && round.creates_context {
            Some(MockContext(self.next_id()))
        } else {
            None
        };

        Ok(InitializeSecurityContextResult {
            status,
            flags: round.flags,
            context,
        })
    }

    fn complete_auth_token(
        &mut self,
        _context: &mut Self::Context,
        _output: &mut SecurityBuffer,
    ) -> Option<ProviderResult<SecurityStatus>> {
        self.calls.complete_auth_token += 1;
        self.completion.clone()
    }

    fn query_context_sizes(&mut self, _context: &mut Self::Context) -> ProviderResult<ContextSizes> {
        self.calls.query_context_sizes += 1;
        self.sizes.clone()
    }

    fn encrypt_message(
        &mut self,
        _context: &mut Self::Context,
        flags: EncryptionFlags,
        message: &mut [SecurityBufferRef<'_>],
        sequence_number: u32,
    ) -> ProviderResult<SecurityStatus> {
        self.calls.encrypt_message += 1;
        self.sequence_numbers.push(sequence_number);
        self.encrypt_flags.push(flags);

        let status = self.encrypt_result.clone()?;

        for buffer in message.iter_mut() {
            match buffer.buffer_type() {
                BufferType::Data => buffer.data_mut().iter_mut().for_each(|byte| *byte ^= 0xFF),
                BufferType::Token => buffer.write_data(&SIGNATURE)?,
                _ => {}
            }
        }

        Ok(status)
    }

    fn free_credentials_handle(&mut self, credentials_handle: Self::CredentialsHandle) -> ProviderResult<()> {
        self.calls.free_credentials_handle += 1;
        self.freed_credentials.push(credentials_handle.0);

        self.release_error.clone().map_or(Ok(()), Err)
    }

    fn delete_security_context(&mut self, context: Self::Context) -> ProviderResult<()> {
        self.calls.delete_security_context += 1;
        self.deleted_contexts.push(context.0);

        self.release_error.clone().map_or(Ok(()), Err)
    }

    fn free_package_info(&mut self, _package_info: PackageInfo) -> ProviderResult<()> {
        self.calls.free_package_info += 1;

        self.release_error.clone().map_or(Ok(()), Err)
    }
}

pub fn identity() -> AuthIdentity {
    AuthIdentity::new("test_user", "EXAMPLE", "test_password")
}

pub fn http_engine(provider: &mut MockProvider) -> HandshakeEngine<'static, &mut MockProvider> {
    setup_logger();

    HandshakeEngine::new(
        provider,
        identity(),
        HandshakeConfig::new(AuthMode::Http).with_target_name("HTTP/gateway.example.com"),
        None,
    )
    .unwrap()
}

/// Runs the scripted two-round exchange until the engine is established.
pub fn establish(engine: &mut HandshakeEngine<'_, &mut MockProvider>) {
    assert!(engine.step().unwrap());
    engine.set_input_token(CHALLENGE_MESSAGE).unwrap();
    assert!(!engine.step().unwrap());
    assert!(engine.is_established());
}
