use std::borrow::Cow;

use crate::error::{HandshakeError, Operation, Result};
use crate::utils::cast_to_wire;
use crate::{BufferType, InputBuffers, SecurityBuffer};

/// Input and output token buffers of the current round.
///
/// The input token is either an engine-owned copy or a reference to caller memory. Channel
/// bindings are always a reference. The output buffer is owned and replaced on every round.
pub(crate) struct TokenBuffers<'a> {
    input: Option<Cow<'a, [u8]>>,
    output: SecurityBuffer,
    channel_bindings: Option<&'a [u8]>,
    max_token_len: usize,
}

impl<'a> TokenBuffers<'a> {
    pub(crate) fn new(max_token_len: u32, channel_bindings: Option<&'a [u8]>) -> Self {
        Self {
            input: None,
            output: SecurityBuffer::new(Vec::new(), BufferType::Token),
            channel_bindings,
            max_token_len: max_token_len as usize,
        }
    }

    /// Stores a copy of `token` as the next round's input.
    pub(crate) fn set_input_copy(&mut self, token: &[u8]) -> Result<()> {
        check_input(token)?;

        let mut copy = Vec::new();
        copy.try_reserve_exact(token.len())
            .map_err(|_| HandshakeError::AllocationFailure { requested: token.len() })?;
        copy.extend_from_slice(token);

        self.input = Some(Cow::Owned(copy));

        Ok(())
    }

    /// Stores a reference to `token` as the next round's input.
    pub(crate) fn set_input_borrowed(&mut self, token: &'a [u8]) -> Result<()> {
        check_input(token)?;

        self.input = Some(Cow::Borrowed(token));

        Ok(())
    }

    pub(crate) fn has_input(&self) -> bool {
        self.input.is_some()
    }

    #[cfg(test)]
    pub(crate) fn input(&self) -> Option<&[u8]> {
        self.input.as_deref()
    }

    /// Drops the input once the provider has seen it. An owned copy is freed here; a borrowed
    /// token is only forgotten since its memory belongs to the caller.
    pub(crate) fn consume_input(&mut self) {
        self.input = None;
    }

    /// Frees the previous output buffer and allocates a fresh one of the maximum token length.
    pub(crate) fn reset_output(&mut self) -> Result<()> {
        self.output = SecurityBuffer::new(Vec::new(), BufferType::Token);

        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(self.max_token_len)
            .map_err(|_| HandshakeError::AllocationFailure {
                requested: self.max_token_len,
            })?;
        buffer.resize(self.max_token_len, 0);

        self.output.buffer = buffer;

        Ok(())
    }

    pub(crate) fn discard_output(&mut self) {
        self.output = SecurityBuffer::new(Vec::new(), BufferType::Token);
    }

    pub(crate) fn output(&self) -> &[u8] {
        &self.output.buffer
    }

    pub(crate) fn output_mut(&mut self) -> &mut SecurityBuffer {
        &mut self.output
    }

    pub(crate) fn channel_bindings(&self) -> Option<&'a [u8]> {
        self.channel_bindings
    }

    /// Splits the buffers for a provider call: the input list and the writable output buffer.
    ///
    /// When `input_required` is set and the caller supplied no token, the list still carries an
    /// empty token entry.
    pub(crate) fn round_buffers(&mut self, input_required: bool) -> (Option<InputBuffers<'_>>, &mut SecurityBuffer) {
        let Self {
            input,
            output,
            channel_bindings,
            ..
        } = self;

        let input = match input.as_deref() {
            Some(token) => Some(InputBuffers::new(token, *channel_bindings)),
            None if input_required => Some(InputBuffers::new(&[], *channel_bindings)),
            None => None,
        };

        (input, output)
    }
}

fn check_input(token: &[u8]) -> Result<()> {
    if token.is_empty() {
        return Err(HandshakeError::EmptyInput);
    }

    cast_to_wire::<u32, u64>(token.len() as u64, "input_token_len", Operation::SetInputToken)?;

    Ok(())
}
