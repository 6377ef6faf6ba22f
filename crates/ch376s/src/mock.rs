//! No-hardware test doubles for the driver seams.

use embedded_hal::delay::DelayNs;

use crate::Channel;
use crate::completion::StatusSource;

/// Error raised when a [`RecordingChannel`] transcript overflows.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TranscriptFull;

/// Channel that records every byte written to it.
///
/// Sized small, it doubles as a failing channel for error-path tests.
#[derive(Debug, Default)]
pub struct RecordingChannel<const N: usize> {
    transcript: heapless::Vec<u8, N>,
}

impl<const N: usize> RecordingChannel<N> {
    pub const fn new() -> Self {
        Self {
            transcript: heapless::Vec::new(),
        }
    }

    /// Everything written so far, in order.
    pub fn bytes(&self) -> &[u8] {
        &self.transcript
    }

    pub fn clear(&mut self) {
        self.transcript.clear();
    }
}

impl<const N: usize> Channel for RecordingChannel<N> {
    type Error = TranscriptFull;

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.transcript
            .extend_from_slice(bytes)
            .map_err(|_| TranscriptFull)
    }
}

/// Status source replaying a fixed script.
///
/// Each poll consumes one entry; an exhausted script reads as
/// no-status-pending forever.
#[derive(Debug)]
pub struct ScriptedStatus<'a> {
    script: &'a [Option<u8>],
    cursor: usize,
}

impl<'a> ScriptedStatus<'a> {
    pub const fn new(script: &'a [Option<u8>]) -> Self {
        Self { script, cursor: 0 }
    }
}

impl StatusSource for ScriptedStatus<'_> {
    type Error = core::convert::Infallible;

    fn poll_status(&mut self) -> Result<Option<u8>, Self::Error> {
        let status = self.script.get(self.cursor).copied().flatten();
        self.cursor = self.cursor.saturating_add(1);

        Ok(status)
    }
}

/// Delay that returns immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDelay;

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}
