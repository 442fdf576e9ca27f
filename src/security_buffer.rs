use std::fmt;
use std::mem::take;

use bitflags::bitflags;
use num_derive::{FromPrimitive, ToPrimitive};

use crate::provider::{ProviderError, ProviderResult};
use crate::ErrorKind;

#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, FromPrimitive, ToPrimitive)]
pub enum BufferType {
    Empty = 0,
    Data = 1,
    Token = 2,
    Missing = 4,
    Extra = 5,
    StreamTrailer = 6,
    StreamHeader = 7,
    Padding = 9,
    Stream = 10,
    ChannelBindings = 14,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SecurityBufferFlags: u32 {
        const NONE = 0x0;
        const SECBUFFER_READONLY = 0x8000_0000;
        const SECBUFFER_READONLY_WITH_CHECKSUM = 0x1000_0000;
    }
}

/// Engine-owned output token buffer of the current round.
///
/// It is allocated with the provider's maximum token length before every step. The provider
/// writes its token into it with [`SecurityBuffer::write_token`], which shrinks it to the token size.
#[derive(Clone, Eq, PartialEq)]
pub struct SecurityBuffer {
    pub buffer: Vec<u8>,
    pub buffer_type: BufferType,
}

impl SecurityBuffer {
    pub fn new(buffer: Vec<u8>, buffer_type: BufferType) -> Self {
        Self { buffer, buffer_type }
    }

    /// Copies `token` into the front of the buffer and truncates the buffer to its length.
    pub fn write_token(&mut self, token: &[u8]) -> ProviderResult<()> {
        if self.buffer.len() < token.len() {
            return Err(ProviderError::new(
                ErrorKind::BufferTooSmall,
                format!(
                    "token of {} bytes does not fit in the {}-byte output buffer",
                    token.len(),
                    self.buffer.len()
                ),
            ));
        }

        self.buffer[..token.len()].copy_from_slice(token);
        self.buffer.truncate(token.len());

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl fmt::Debug for SecurityBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecurityBuffer {{ ")?;
        write_buffer(&self.buffer, &format!("{:?}", self.buffer_type), f)?;
        write!(f, " }}")
    }
}

/// One entry of the input buffer list handed to the provider.
///
/// Both variants borrow their bytes: the token from the engine's input slot and the channel
/// bindings from the caller, so neither is ever copied or freed by the list.
#[derive(Clone, Copy, Eq, PartialEq)]
pub enum InputBuffer<'data> {
    Token(&'data [u8]),
    ChannelBindings(&'data [u8]),
}

impl<'data> InputBuffer<'data> {
    pub fn buffer_type(&self) -> BufferType {
        match self {
            InputBuffer::Token(_) => BufferType::Token,
            InputBuffer::ChannelBindings(_) => BufferType::ChannelBindings,
        }
    }

    pub fn data(&self) -> &'data [u8] {
        match self {
            InputBuffer::Token(data) | InputBuffer::ChannelBindings(data) => data,
        }
    }
}

impl fmt::Debug for InputBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_buffer(self.data(), &format!("{:?}", self.buffer_type()), f)
    }
}

/// Typed input buffer list: a token, optionally followed by channel bindings.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct InputBuffers<'data> {
    token: &'data [u8],
    channel_bindings: Option<&'data [u8]>,
}

impl<'data> InputBuffers<'data> {
    pub fn new(token: &'data [u8], channel_bindings: Option<&'data [u8]>) -> Self {
        Self {
            token,
            channel_bindings,
        }
    }

    pub fn token(&self) -> &'data [u8] {
        self.token
    }

    pub fn channel_bindings(&self) -> Option<&'data [u8]> {
        self.channel_bindings
    }

    pub fn len(&self) -> usize {
        1 + usize::from(self.channel_bindings.is_some())
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = InputBuffer<'data>> {
        std::iter::once(InputBuffer::Token(self.token)).chain(self.channel_bindings.map(InputBuffer::ChannelBindings))
    }

    pub fn find(&self, buffer_type: BufferType) -> Option<InputBuffer<'data>> {
        self.iter().find(|b| b.buffer_type() == buffer_type)
    }
}

/// A security buffer type with a mutable reference to the buffer data.
///
/// Basically, it is a security buffer but without buffer flags.
enum UnflaggedSecurityBuffer<'data> {
    Data(&'data mut [u8]),
    Token(&'data mut [u8]),
    StreamHeader(&'data mut [u8]),
    StreamTrailer(&'data mut [u8]),
    Stream(&'data mut [u8]),
    Padding(&'data mut [u8]),
    Missing(usize),
    Empty,
}

/// Message buffer processed in place by [`protect_message`](crate::HandshakeEngine::protect_message).
///
/// Signing and sealing rewrite the data buffers and fill the token buffer with the signature,
/// so the buffers hold mutable references to caller memory instead of owned vectors.
pub struct SecurityBufferRef<'data> {
    buffer_type: UnflaggedSecurityBuffer<'data>,
    buffer_flags: SecurityBufferFlags,
}

impl<'data> SecurityBufferRef<'data> {
    /// Creates a [SecurityBufferRef] with a `Data` buffer type and empty buffer flags.
    pub fn data_buf(data: &mut [u8]) -> SecurityBufferRef<'_> {
        SecurityBufferRef {
            buffer_type: UnflaggedSecurityBuffer::Data(data),
            buffer_flags: Default::default(),
        }
    }

    /// Creates a [SecurityBufferRef] with a `Token` buffer type and empty buffer flags.
    pub fn token_buf(data: &mut [u8]) -> SecurityBufferRef<'_> {
        SecurityBufferRef {
            buffer_type: UnflaggedSecurityBuffer::Token(data),
            buffer_flags: Default::default(),
        }
    }

    pub fn stream_header_buf(data: &mut [u8]) -> SecurityBufferRef<'_> {
        SecurityBufferRef {
            buffer_type: UnflaggedSecurityBuffer::StreamHeader(data),
            buffer_flags: Default::default(),
        }
    }

    pub fn stream_trailer_buf(data: &mut [u8]) -> SecurityBufferRef<'_> {
        SecurityBufferRef {
            buffer_type: UnflaggedSecurityBuffer::StreamTrailer(data),
            buffer_flags: Default::default(),
        }
    }

    pub fn stream_buf(data: &mut [u8]) -> SecurityBufferRef<'_> {
        SecurityBufferRef {
            buffer_type: UnflaggedSecurityBuffer::Stream(data),
            buffer_flags: Default::default(),
        }
    }

    pub fn padding_buf(data: &mut [u8]) -> SecurityBufferRef<'_> {
        SecurityBufferRef {
            buffer_type: UnflaggedSecurityBuffer::Padding(data),
            buffer_flags: Default::default(),
        }
    }

    pub fn missing_buf<'a>(count: usize) -> SecurityBufferRef<'a> {
        SecurityBufferRef {
            buffer_type: UnflaggedSecurityBuffer::Missing(count),
            buffer_flags: Default::default(),
        }
    }

    pub fn empty_buf<'a>() -> SecurityBufferRef<'a> {
        SecurityBufferRef {
            buffer_type: UnflaggedSecurityBuffer::Empty,
            buffer_flags: Default::default(),
        }
    }

    /// Set buffer flags.
    pub fn with_flags(self, buffer_flags: SecurityBufferFlags) -> Self {
        Self {
            buffer_type: self.buffer_type,
            buffer_flags,
        }
    }

    pub fn buffer_type(&self) -> BufferType {
        match &self.buffer_type {
            UnflaggedSecurityBuffer::Data(_) => BufferType::Data,
            UnflaggedSecurityBuffer::Token(_) => BufferType::Token,
            UnflaggedSecurityBuffer::StreamHeader(_) => BufferType::StreamHeader,
            UnflaggedSecurityBuffer::StreamTrailer(_) => BufferType::StreamTrailer,
            UnflaggedSecurityBuffer::Stream(_) => BufferType::Stream,
            UnflaggedSecurityBuffer::Padding(_) => BufferType::Padding,
            UnflaggedSecurityBuffer::Missing(_) => BufferType::Missing,
            UnflaggedSecurityBuffer::Empty => BufferType::Empty,
        }
    }

    pub fn buffer_flags(&self) -> SecurityBufferFlags {
        self.buffer_flags
    }

    /// Returns the immutable reference to the inner data.
    ///
    /// Some buffer types can not hold the data, so the empty slice will be returned.
    pub fn data(&self) -> &[u8] {
        match &self.buffer_type {
            UnflaggedSecurityBuffer::Data(data) => data,
            UnflaggedSecurityBuffer::Token(data) => data,
            UnflaggedSecurityBuffer::StreamHeader(data) => data,
            UnflaggedSecurityBuffer::StreamTrailer(data) => data,
            UnflaggedSecurityBuffer::Stream(data) => data,
            UnflaggedSecurityBuffer::Padding(data) => data,
            UnflaggedSecurityBuffer::Missing(_) => &[],
            UnflaggedSecurityBuffer::Empty => &[],
        }
    }

    /// Returns the mutable reference to the inner data.
    pub fn data_mut(&mut self) -> &mut [u8] {
        match &mut self.buffer_type {
            UnflaggedSecurityBuffer::Data(data) => data,
            UnflaggedSecurityBuffer::Token(data) => data,
            UnflaggedSecurityBuffer::StreamHeader(data) => data,
            UnflaggedSecurityBuffer::StreamTrailer(data) => data,
            UnflaggedSecurityBuffer::Stream(data) => data,
            UnflaggedSecurityBuffer::Padding(data) => data,
            UnflaggedSecurityBuffer::Missing(_) => &mut [],
            UnflaggedSecurityBuffer::Empty => &mut [],
        }
    }

    pub fn buf_len(&self) -> usize {
        match &self.buffer_type {
            UnflaggedSecurityBuffer::Missing(needed_bytes_amount) => *needed_bytes_amount,
            _ => self.data().len(),
        }
    }

    /// Returns the mutable reference to the inner data leaving the empty buffer on its place.
    pub fn take_data(&mut self) -> &'data mut [u8] {
        match &mut self.buffer_type {
            UnflaggedSecurityBuffer::Data(data) => take(data),
            UnflaggedSecurityBuffer::Token(data) => take(data),
            UnflaggedSecurityBuffer::StreamHeader(data) => take(data),
            UnflaggedSecurityBuffer::StreamTrailer(data) => take(data),
            UnflaggedSecurityBuffer::Stream(data) => take(data),
            UnflaggedSecurityBuffer::Padding(data) => take(data),
            UnflaggedSecurityBuffer::Missing(_) => &mut [],
            UnflaggedSecurityBuffer::Empty => &mut [],
        }
    }

    pub(crate) fn set_data(&mut self, buf: &'data mut [u8]) {
        match &mut self.buffer_type {
            UnflaggedSecurityBuffer::Data(data)
            | UnflaggedSecurityBuffer::Token(data)
            | UnflaggedSecurityBuffer::StreamHeader(data)
            | UnflaggedSecurityBuffer::StreamTrailer(data)
            | UnflaggedSecurityBuffer::Stream(data)
            | UnflaggedSecurityBuffer::Padding(data) => *data = buf,
            UnflaggedSecurityBuffer::Missing(_) | UnflaggedSecurityBuffer::Empty => {}
        }
    }

    /// Writes the provided data into the inner buffer.
    ///
    /// Returns error if the inner buffer is not big enough. If the inner buffer is larger than
    /// provided data, then it'll be shrunk to the size of the data.
    pub fn write_data(&mut self, data: &[u8]) -> ProviderResult<()> {
        let data_len = data.len();

        if self.buf_len() < data_len {
            return Err(ProviderError::new(
                ErrorKind::BufferTooSmall,
                "provided data can not fit in the destination buffer",
            ));
        }

        let mut buf = self.take_data();
        buf = &mut buf[0..data_len];
        buf.copy_from_slice(data);
        self.set_data(buf);

        Ok(())
    }
}

impl fmt::Debug for SecurityBufferRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecurityBufferRef {{ ")?;
        f.write_fmt(format_args!("{:?},", self.buffer_flags))?;
        match &self.buffer_type {
            UnflaggedSecurityBuffer::Missing(needed_bytes_amount) => write!(f, "Missing({})", *needed_bytes_amount)?,
            UnflaggedSecurityBuffer::Empty => f.write_str("Empty")?,
            _ => write_buffer(self.data(), &format!("{:?}", self.buffer_type()), f)?,
        };
        write!(f, " }}")
    }
}

fn write_buffer(buf: &[u8], buf_name: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: ", buf_name)?;
    f.write_str("0x")?;
    buf.iter().try_for_each(|byte| write!(f, "{byte:02X}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_token_shrinks_output() {
        let mut output = SecurityBuffer::new(vec![0; 16], BufferType::Token);

        output.write_token(&[1, 2, 3]).unwrap();

        assert_eq!(output.buffer, [1, 2, 3]);
    }

    #[test]
    fn write_token_rejects_oversized_token() {
        let mut output = SecurityBuffer::new(vec![0; 2], BufferType::Token);

        let err = output.write_token(&[1, 2, 3]).unwrap_err();

        assert_eq!(err.error_type, ErrorKind::BufferTooSmall);
        assert_eq!(output.buffer, [0, 0]);
    }

    #[test]
    fn input_list_tags_channel_bindings() {
        let bindings = [9, 9];
        let list = InputBuffers::new(&[1, 2], Some(&bindings));

        assert_eq!(list.len(), 2);
        assert_eq!(
            list.iter().map(|b| b.buffer_type()).collect::<Vec<_>>(),
            [BufferType::Token, BufferType::ChannelBindings]
        );
        assert_eq!(
            list.find(BufferType::ChannelBindings).map(|b| b.data()),
            Some(bindings.as_slice())
        );
    }

    #[test]
    fn input_list_without_bindings_has_single_token() {
        let list = InputBuffers::new(&[1, 2], None);

        assert_eq!(list.len(), 1);
        assert!(list.find(BufferType::ChannelBindings).is_none());
    }

    #[test]
    fn write_data_shrinks_message_buffer() {
        let mut signature = [0; 16];
        let mut buffer = SecurityBufferRef::token_buf(&mut signature);

        buffer.write_data(&[7; 4]).unwrap();

        assert_eq!(buffer.data(), &[7; 4]);
        assert_eq!(buffer.buffer_type(), BufferType::Token);
    }
}
