#![cfg_attr(not(test), no_std)]

//! Exports a packed-nibble pixel matrix to a USB mass-storage stick as a
//! 24bpp BMP file, through a CH376S file-manager chip.
//!
//! [`write_matrix`] runs the whole chip session for one file: reset,
//! host mode, mount, create, name, then the file body as write groups
//! (the 54-byte header in one group, pixel bytes in configured groups,
//! the 2-byte trailer in one group), and close.

pub use ch376s::{Ch376s, Channel, Config, SessionState};
pub use ch376s::completion::{AckPoll, Completion, FixedDelay, NoWait};
pub use ch376s::protocol::CloseMode;
pub use gridsnap_core::{ColorChannel, Matrix32, PixelMatrix, pack_rgb444};

use gridsnap_core::bmp;
use log::{debug, info};

/// Export errors.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ExportError<CErr, PErr> {
    /// The chip session failed.
    Device(ch376s::Error<CErr, PErr>),
    /// The matrix width would need BMP row padding, which the encoder
    /// does not emit.
    UnpaddedWidth { width: u32 },
}

impl<CErr, PErr> From<ch376s::Error<CErr, PErr>> for ExportError<CErr, PErr> {
    fn from(err: ch376s::Error<CErr, PErr>) -> Self {
        Self::Device(err)
    }
}

/// Writes `matrix` to the stick as a BMP file named `file_name`.
///
/// Expects a fresh driver; the session is consumed whether or not the
/// export succeeds. Nothing goes on the wire for widths that would need
/// row padding.
pub fn write_matrix<C, P, const W: usize, const H: usize>(
    dev: &mut Ch376s<C, P>,
    matrix: &PixelMatrix<W, H>,
    file_name: &str,
    close_mode: CloseMode,
) -> Result<(), ExportError<C::Error, P::Error>>
where
    C: Channel,
    P: Completion,
{
    if !bmp::is_padding_free(W as u32) {
        return Err(ExportError::UnpaddedWidth { width: W as u32 });
    }

    info!("exporting {W}x{H} matrix as {file_name}");

    dev.reset()?;
    dev.enter_usb_mode()?;
    dev.mount_disk()?;
    debug!("medium mounted");

    dev.create_file()?;
    dev.set_file_name(file_name)?;
    debug!("file created");

    dev.write_group(&bmp::header(W as u32, H as u32))?;
    dev.write_groups(bmp::PixelStream::new(matrix))?;
    dev.write_group(&bmp::TRAILER)?;
    dev.close_file(close_mode)?;

    info!(
        "wrote {} bytes to {file_name}",
        bmp::file_len(W as u32, H as u32)
    );

    Ok(())
}
