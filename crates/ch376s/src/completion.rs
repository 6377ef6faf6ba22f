//! Command completion policies.
//!
//! The chip signals completion out of band, either by simply needing time
//! or by raising an interrupt status on request. The driver stays agnostic
//! through [`Completion`]; pick [`FixedDelay`] for timed waits on a
//! write-only link, [`AckPoll`] when a status line is readable.

use embedded_hal::delay::DelayNs;

use crate::protocol::Opcode;

/// Waits out a command after its frame went on the wire.
pub trait Completion {
    type Error;

    /// Blocks until the chip should have finished `op`.
    fn settle(&mut self, op: Opcode) -> Result<(), Self::Error>;
}

/// Timed completion: every command gets its fixed settle time.
#[derive(Debug)]
pub struct FixedDelay<D> {
    delay: D,
}

impl<D> FixedDelay<D> {
    pub fn new(delay: D) -> Self {
        Self { delay }
    }

    /// Releases the owned delay.
    pub fn release(self) -> D {
        self.delay
    }
}

impl<D: DelayNs> Completion for FixedDelay<D> {
    type Error = core::convert::Infallible;

    fn settle(&mut self, op: Opcode) -> Result<(), Self::Error> {
        let ms = op.settle_ms();
        if ms > 0 {
            self.delay.delay_ms(ms);
        }

        Ok(())
    }
}

/// Source of interrupt status reads.
///
/// `Ok(None)` means no status is pending yet.
pub trait StatusSource {
    type Error;

    fn poll_status(&mut self) -> Result<Option<u8>, Self::Error>;
}

/// Errors from status-polled completion.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AckError<E> {
    /// The status source failed.
    Source(E),
    /// The chip raised a status other than the expected one.
    Fault(u8),
    /// No status arrived within the polling budget.
    Timeout,
}

/// Status-polled completion.
///
/// Commands that raise an interrupt are polled until the expected status
/// arrives; any other status is a fault. Commands without an interrupt
/// fall back to their fixed settle time.
#[derive(Debug)]
pub struct AckPoll<S, D> {
    status: S,
    delay: D,
    /// Polling attempts before giving up on a command.
    pub attempts: u32,
    /// Wait between attempts, in milliseconds.
    pub poll_interval_ms: u32,
}

impl<S, D> AckPoll<S, D> {
    pub fn new(status: S, delay: D) -> Self {
        Self {
            status,
            delay,
            attempts: 200,
            poll_interval_ms: 10,
        }
    }

    /// Releases the owned status source and delay.
    pub fn release(self) -> (S, D) {
        (self.status, self.delay)
    }
}

impl<S: StatusSource, D: DelayNs> Completion for AckPoll<S, D> {
    type Error = AckError<S::Error>;

    fn settle(&mut self, op: Opcode) -> Result<(), Self::Error> {
        let Some(expected) = op.expected_status() else {
            let ms = op.settle_ms();
            if ms > 0 {
                self.delay.delay_ms(ms);
            }

            return Ok(());
        };

        for _ in 0..self.attempts {
            match self.status.poll_status().map_err(AckError::Source)? {
                Some(code) if code == expected => return Ok(()),
                Some(code) => return Err(AckError::Fault(code)),
                None => self.delay.delay_ms(self.poll_interval_ms),
            }
        }

        Err(AckError::Timeout)
    }
}

/// No-op completion for transcript tests.
#[derive(Debug, Default)]
pub struct NoWait;

impl Completion for NoWait {
    type Error = core::convert::Infallible;

    fn settle(&mut self, _op: Opcode) -> Result<(), Self::Error> {
        Ok(())
    }
}
