#![cfg_attr(not(test), no_std)]

//! CH376S USB file-manager chip driver primitives.
//!
//! The chip sits on a write-only serial command channel and exposes the
//! FAT filesystem of an attached USB mass-storage device. This driver
//! covers the session a file export needs: reset, host mode, mount,
//! create, name, grouped byte writes, close. Each step is legal exactly
//! once and only in that order; the driver tracks the session in
//! [`SessionState`] and rejects out-of-order commands before any byte
//! goes on the wire.

pub mod completion;
pub mod mock;
pub mod protocol;

use completion::Completion;
use protocol::{CloseMode, FileNameError, Opcode};

/// Largest write group the chip's internal buffer accepts.
pub const GROUP_LEN_MAX: usize = 64;

/// Write-only byte channel to the chip.
pub trait Channel {
    type Error;

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;
}

/// Driver configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    /// Bytes per write group in [`Ch376s::write_groups`], 1..=64.
    ///
    /// The default of 2 is the largest group the chip has been observed
    /// to accept reliably over the serial link.
    pub write_group_len: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self { write_group_len: 2 }
    }
}

/// Where a session currently stands. Forward-only.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    Idle,
    ResetDone,
    UsbHost,
    DiskMounted,
    FileCreated,
    FileNamed,
    Writing,
    Closed,
}

/// Driver errors.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Error<CErr, PErr> {
    /// Channel write failed.
    Channel(CErr),
    /// Completion policy failed.
    Completion(PErr),
    /// Command issued out of session order. `expected` names the
    /// earliest state the command is legal in.
    State {
        expected: SessionState,
        found: SessionState,
    },
    /// File name failed validation.
    FileName(FileNameError),
    /// Group length outside 1..=[`GROUP_LEN_MAX`].
    GroupLen,
}

pub type DriverResult<CErr, PErr> = Result<(), Error<CErr, PErr>>;

/// CH376S session driver.
///
/// Owns the channel and the completion policy for the lifetime of one
/// file session.
#[derive(Debug)]
pub struct Ch376s<C, P> {
    channel: C,
    completion: P,
    config: Config,
    state: SessionState,
}

impl<C, P> Ch376s<C, P>
where
    C: Channel,
    P: Completion,
{
    /// Creates a new driver instance in the idle state.
    pub fn new(channel: C, completion: P, config: Config) -> Self {
        Self {
            channel,
            completion,
            config,
            state: SessionState::Idle,
        }
    }

    /// Returns current configuration.
    pub fn config(&self) -> Config {
        self.config
    }

    /// Returns where the session currently stands.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Releases the owned channel and completion policy.
    pub fn release(self) -> (C, P) {
        (self.channel, self.completion)
    }

    fn send(&mut self, frame: &[u8], op: Opcode) -> DriverResult<C::Error, P::Error> {
        self.channel.write(frame).map_err(Error::Channel)?;
        self.completion.settle(op).map_err(Error::Completion)
    }

    fn expect(&self, expected: SessionState) -> DriverResult<C::Error, P::Error> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::State {
                expected,
                found: self.state,
            })
        }
    }

    /// Resets the chip. First command of every session.
    pub fn reset(&mut self) -> DriverResult<C::Error, P::Error> {
        self.expect(SessionState::Idle)?;
        self.send(&protocol::command_frame(Opcode::ResetAll), Opcode::ResetAll)?;
        self.state = SessionState::ResetDone;

        Ok(())
    }

    /// Puts the chip in USB host mode.
    pub fn enter_usb_mode(&mut self) -> DriverResult<C::Error, P::Error> {
        self.expect(SessionState::ResetDone)?;
        self.send(
            &protocol::set_usb_mode_frame(protocol::USB_MODE_HOST),
            Opcode::SetUsbMode,
        )?;
        self.state = SessionState::UsbHost;

        Ok(())
    }

    /// Mounts the attached mass-storage medium.
    pub fn mount_disk(&mut self) -> DriverResult<C::Error, P::Error> {
        self.expect(SessionState::UsbHost)?;
        self.send(&protocol::command_frame(Opcode::DiskMount), Opcode::DiskMount)?;
        self.state = SessionState::DiskMounted;

        Ok(())
    }

    /// Creates the file that subsequent writes land in.
    pub fn create_file(&mut self) -> DriverResult<C::Error, P::Error> {
        self.expect(SessionState::DiskMounted)?;
        self.send(
            &protocol::command_frame(Opcode::FileCreate),
            Opcode::FileCreate,
        )?;
        self.state = SessionState::FileCreated;

        Ok(())
    }

    /// Declares the file name.
    ///
    /// The name is validated host-side; nothing goes on the wire for a
    /// name the chip might mishandle.
    pub fn set_file_name(&mut self, name: &str) -> DriverResult<C::Error, P::Error> {
        self.expect(SessionState::FileCreated)?;
        let frame = protocol::set_file_name_frame(name).map_err(Error::FileName)?;
        self.send(&frame, Opcode::SetFileName)?;
        self.state = SessionState::FileNamed;

        Ok(())
    }

    /// Writes one group of 1..=[`GROUP_LEN_MAX`] bytes at the file
    /// pointer.
    ///
    /// Each group is a three-command bracket: declare the length, stream
    /// the bytes, commit and advance the pointer.
    pub fn write_group(&mut self, data: &[u8]) -> DriverResult<C::Error, P::Error> {
        if !matches!(
            self.state,
            SessionState::FileNamed | SessionState::Writing
        ) {
            return Err(Error::State {
                expected: SessionState::FileNamed,
                found: self.state,
            });
        }
        if data.is_empty() || data.len() > GROUP_LEN_MAX {
            return Err(Error::GroupLen);
        }

        self.send(
            &protocol::byte_write_frame(data.len() as u16),
            Opcode::ByteWrite,
        )?;
        self.channel
            .write(&protocol::command_frame(Opcode::WrReqData))
            .map_err(Error::Channel)?;
        self.channel.write(data).map_err(Error::Channel)?;
        self.completion
            .settle(Opcode::WrReqData)
            .map_err(Error::Completion)?;
        self.send(&protocol::command_frame(Opcode::ByteWrGo), Opcode::ByteWrGo)?;
        self.state = SessionState::Writing;

        Ok(())
    }

    /// Writes a byte stream as consecutive groups of
    /// [`Config::write_group_len`] bytes, with a shorter final group
    /// when the stream length is not a multiple.
    pub fn write_groups<I>(&mut self, bytes: I) -> DriverResult<C::Error, P::Error>
    where
        I: IntoIterator<Item = u8>,
    {
        let group_len = usize::from(self.config.write_group_len);
        if group_len == 0 || group_len > GROUP_LEN_MAX {
            return Err(Error::GroupLen);
        }

        let mut group = [0u8; GROUP_LEN_MAX];
        let mut filled = 0;
        for byte in bytes {
            group[filled] = byte;
            filled += 1;
            if filled == group_len {
                self.write_group(&group[..filled])?;
                filled = 0;
            }
        }
        if filled > 0 {
            self.write_group(&group[..filled])?;
        }

        Ok(())
    }

    /// Closes the file. Legal right after naming, so empty files can be
    /// closed without a single write.
    pub fn close_file(&mut self, mode: CloseMode) -> DriverResult<C::Error, P::Error> {
        if !matches!(
            self.state,
            SessionState::FileNamed | SessionState::Writing
        ) {
            return Err(Error::State {
                expected: SessionState::FileNamed,
                found: self.state,
            });
        }

        self.send(&protocol::file_close_frame(mode), Opcode::FileClose)?;
        self.state = SessionState::Closed;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::NoWait;
    use crate::mock::{RecordingChannel, TranscriptFull};

    fn driver() -> Ch376s<RecordingChannel<256>, NoWait> {
        Ch376s::new(RecordingChannel::new(), NoWait, Config::default())
    }

    fn named_driver() -> Ch376s<RecordingChannel<256>, NoWait> {
        let mut dev = driver();
        dev.reset().unwrap();
        dev.enter_usb_mode().unwrap();
        dev.mount_disk().unwrap();
        dev.create_file().unwrap();
        dev.set_file_name("A.BMP").unwrap();
        dev
    }

    #[test]
    fn full_session_transcript_is_byte_exact() {
        let mut dev = named_driver();
        dev.write_group(&[0xDE, 0xAD]).unwrap();
        dev.close_file(CloseMode::UpdateLength).unwrap();

        let (channel, _) = dev.release();
        assert_eq!(
            channel.bytes(),
            &[
                0x57, 0xAB, 0x05, // reset
                0x57, 0xAB, 0x15, 0x06, // host mode
                0x57, 0xAB, 0x31, // mount
                0x57, 0xAB, 0x34, // create
                0x57, 0xAB, 0x2F, b'/', b'A', b'.', b'B', b'M', b'P', 0x00, // name
                0x57, 0xAB, 0x3C, 0x02, 0x00, // declare two bytes
                0x57, 0xAB, 0x2D, 0xDE, 0xAD, // stream them
                0x57, 0xAB, 0x3D, // commit
                0x57, 0xAB, 0x36, 0x01, // close, update length
            ]
        );
    }

    #[test]
    fn session_steps_must_run_in_order() {
        let mut dev = driver();

        assert_eq!(
            dev.mount_disk(),
            Err(Error::State {
                expected: SessionState::UsbHost,
                found: SessionState::Idle,
            })
        );

        dev.reset().unwrap();
        assert_eq!(
            dev.reset(),
            Err(Error::State {
                expected: SessionState::Idle,
                found: SessionState::ResetDone,
            })
        );
        assert_eq!(
            dev.write_group(&[0x00]),
            Err(Error::State {
                expected: SessionState::FileNamed,
                found: SessionState::ResetDone,
            })
        );
    }

    #[test]
    fn closed_session_accepts_nothing() {
        let mut dev = named_driver();
        dev.close_file(CloseMode::NoUpdate).unwrap();

        assert_eq!(dev.state(), SessionState::Closed);
        assert!(dev.write_group(&[0x00]).is_err());
        assert!(dev.close_file(CloseMode::NoUpdate).is_err());
    }

    #[test]
    fn empty_file_can_be_closed_without_writing() {
        let mut dev = named_driver();

        assert!(dev.close_file(CloseMode::UpdateLength).is_ok());
    }

    #[test]
    fn group_size_bounds_are_enforced() {
        let mut dev = named_driver();

        assert_eq!(dev.write_group(&[]), Err(Error::GroupLen));
        assert_eq!(dev.write_group(&[0u8; 65]), Err(Error::GroupLen));
        assert!(dev.write_group(&[0u8; 64]).is_ok());
    }

    #[test]
    fn bad_file_name_sends_nothing() {
        let mut dev = driver();
        dev.reset().unwrap();
        dev.enter_usb_mode().unwrap();
        dev.mount_disk().unwrap();
        dev.create_file().unwrap();

        let before = dev.channel.bytes().len();
        assert_eq!(
            dev.set_file_name("BAD/NAME"),
            Err(Error::FileName(FileNameError::InvalidChar))
        );
        assert_eq!(dev.channel.bytes().len(), before);
        assert_eq!(dev.state(), SessionState::FileCreated);
    }

    #[test]
    fn write_groups_chunks_with_a_short_tail() {
        let mut dev = named_driver();
        dev.channel.clear();
        dev.write_groups([1u8, 2, 3, 4, 5]).unwrap();

        // Three brackets: 2 + 2 + 1 bytes.
        assert_eq!(
            dev.channel.bytes(),
            &[
                0x57, 0xAB, 0x3C, 0x02, 0x00, 0x57, 0xAB, 0x2D, 1, 2, 0x57, 0xAB, 0x3D, //
                0x57, 0xAB, 0x3C, 0x02, 0x00, 0x57, 0xAB, 0x2D, 3, 4, 0x57, 0xAB, 0x3D, //
                0x57, 0xAB, 0x3C, 0x01, 0x00, 0x57, 0xAB, 0x2D, 5, 0x57, 0xAB, 0x3D,
            ]
        );
    }

    #[test]
    fn write_groups_rejects_out_of_range_config() {
        let mut dev = Ch376s::new(
            RecordingChannel::<64>::new(),
            NoWait,
            Config { write_group_len: 0 },
        );
        assert_eq!(dev.write_groups([0u8]), Err(Error::GroupLen));

        let mut dev = Ch376s::new(
            RecordingChannel::<64>::new(),
            NoWait,
            Config {
                write_group_len: 65,
            },
        );
        assert_eq!(dev.write_groups([0u8]), Err(Error::GroupLen));
    }

    #[test]
    fn channel_failure_surfaces_as_channel_error() {
        let mut dev = Ch376s::new(RecordingChannel::<2>::new(), NoWait, Config::default());

        assert_eq!(dev.reset(), Err(Error::Channel(TranscriptFull)));
    }
}
