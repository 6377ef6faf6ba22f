use core::convert::Infallible;

use embedded_graphics_core::{
    Pixel,
    draw_target::DrawTarget,
    geometry::{OriginDimensions, Size},
    pixelcolor::{Rgb888, RgbColor},
};

use crate::matrix::{PixelMatrix, pack_rgb444};

impl<const W: usize, const H: usize> DrawTarget for PixelMatrix<W, H> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }

            let x = point.x as usize;
            let y = point.y as usize;
            // Quantize 8-bit components to the stored 4-bit channels.
            let packed = pack_rgb444(color.r() >> 4, color.g() >> 4, color.b() >> 4);
            let _ = self.set(x, y, packed);
        }

        Ok(())
    }
}

impl<const W: usize, const H: usize> OriginDimensions for PixelMatrix<W, H> {
    fn size(&self) -> Size {
        Size::new(W as u32, H as u32)
    }
}
