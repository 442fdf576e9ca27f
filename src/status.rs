use std::fmt;

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};

/// Non-error completion codes a security provider may return from a context step.
///
/// Only the first four take part in the handshake. Anything else is treated as a failure by the engine.
#[derive(Debug, Copy, Clone, Eq, PartialEq, FromPrimitive, ToPrimitive)]
pub enum SecurityStatus {
    Ok = 0,
    ContinueNeeded = 0x0009_0312,
    CompleteNeeded = 0x0009_0313,
    CompleteAndContinue = 0x0009_0314,
    LocalLogon = 0x0009_0315,
    ContextExpired = 0x0009_0317,
    IncompleteCredentials = 0x0009_0320,
    Renegotiate = 0x0009_0321,
    NoLsaContext = 0x0009_0323,
}

/// The kind of a security provider failure (`SEC_E_*` codes).
#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, FromPrimitive, ToPrimitive)]
pub enum ErrorKind {
    Unknown = 0,
    InsufficientMemory = 0x8009_0300,
    InvalidHandle = 0x8009_0301,
    UnsupportedFunction = 0x8009_0302,
    TargetUnknown = 0x8009_0303,
    /// May correspond to any internal error of the provider.
    InternalError = 0x8009_0304,
    SecurityPackageNotFound = 0x8009_0305,
    NotOwned = 0x8009_0306,
    CannotInstall = 0x8009_0307,
    /// Used in cases when supplied data is missing or invalid.
    InvalidToken = 0x8009_0308,
    CannotPack = 0x8009_0309,
    OperationNotSupported = 0x8009_030A,
    NoImpersonation = 0x8009_030B,
    LogonDenied = 0x8009_030C,
    UnknownCredentials = 0x8009_030D,
    NoCredentials = 0x8009_030E,
    MessageAltered = 0x8009_030F,
    OutOfSequence = 0x8009_0310,
    NoAuthenticatingAuthority = 0x8009_0311,
    BadPackageId = 0x8009_0316,
    ContextExpired = 0x8009_0317,
    IncompleteMessage = 0x8009_0318,
    IncompleteCredentials = 0x8009_0320,
    BufferTooSmall = 0x8009_0321,
    WrongPrincipalName = 0x8009_0322,
    TimeSkew = 0x8009_0324,
    IllegalMessage = 0x8009_0326,
    EncryptFailure = 0x8009_0329,
    DecryptFailure = 0x8009_0330,
    AlgorithmMismatch = 0x8009_0331,
    SecurityQosFailed = 0x8009_0332,
    UnfinishedContextDeleted = 0x8009_0333,
    WrongCredentialHandle = 0x8009_0336,
    BadBindings = 0x8009_0346,
    InvalidParameter = 0x8009_035D,
    NoContext = 0x8009_0361,
    MutualAuthFailed = 0x8009_0363,
}

/// Raw status reported by a security provider, kept for diagnostics.
///
/// Renders the same way regardless of whether the code is a completion status or a failure:
/// `ContinueNeeded [0x00090312]`, `LogonDenied [0x8009030C]`, `Unknown [0x12345678]`.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct ProviderStatus(u32);

impl ProviderStatus {
    pub fn from_code(code: u32) -> Self {
        Self(code)
    }

    pub fn code(self) -> u32 {
        self.0
    }

    /// Returns `true` when the code belongs to the `SEC_E_*` failure range.
    pub fn is_error(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }
}

impl From<SecurityStatus> for ProviderStatus {
    fn from(status: SecurityStatus) -> Self {
        Self(status.to_u32().unwrap_or_default())
    }
}

impl From<ErrorKind> for ProviderStatus {
    fn from(kind: ErrorKind) -> Self {
        Self(kind.to_u32().unwrap_or_default())
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_error() {
            match ErrorKind::from_u32(self.0) {
                Some(kind) => write!(f, "{kind:?}")?,
                None => f.write_str("Unknown")?,
            }
        } else {
            match SecurityStatus::from_u32(self.0) {
                Some(status) => write!(f, "{status:?}")?,
                None => f.write_str("Unknown")?,
            }
        }

        write!(f, " [0x{:08X}]", self.0)
    }
}

impl fmt::Debug for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProviderStatus({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_name_and_hex_code() {
        assert_eq!(
            ProviderStatus::from(SecurityStatus::ContinueNeeded).to_string(),
            "ContinueNeeded [0x00090312]"
        );
        assert_eq!(
            ProviderStatus::from(ErrorKind::LogonDenied).to_string(),
            "LogonDenied [0x8009030C]"
        );
    }

    #[test]
    fn names_follow_the_variant_names() {
        assert_eq!(
            ProviderStatus::from(SecurityStatus::NoLsaContext).to_string(),
            "NoLsaContext [0x00090323]"
        );
        assert_eq!(
            ProviderStatus::from(ErrorKind::MutualAuthFailed).to_string(),
            "MutualAuthFailed [0x80090363]"
        );
        assert_eq!(ProviderStatus::from_code(0x0009_0399).to_string(), "Unknown [0x00090399]");
    }

    #[test]
    fn unknown_codes_keep_raw_value() {
        let status = ProviderStatus::from_code(0x8009_FFFF);

        assert!(status.is_error());
        assert_eq!(status.code(), 0x8009_FFFF);
        assert_eq!(status.to_string(), "Unknown [0x8009FFFF]");
    }

    #[test]
    fn completion_codes_are_not_errors() {
        assert!(!ProviderStatus::from(SecurityStatus::Ok).is_error());
        assert!(!ProviderStatus::from(SecurityStatus::CompleteAndContinue).is_error());
    }
}
