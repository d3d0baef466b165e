use std::error::Error;

use sdl2::pixels::PixelFormatEnum;

use vip8_core::constants::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use vip8_core::state::Frame;

const SCALE: usize = 10;

/// # Display
/// Presents the machine's 64x32 monochrome frames in an SDL2 window.
///
/// The core hands over a fully rendered frame (one 0x00RRGGBB color per
/// pixel); this crate only converts it to texture bytes and scales it up.
pub struct Display {
    canvas: sdl2::render::WindowCanvas,
    width: usize,
    height: usize,
}

impl Display {
    /// Creates a new display window bound to an sdl2 context.
    ///
    /// # Arguments
    /// * `sdl` an sdl2 context with which to draw
    pub fn new(sdl: &sdl2::Sdl) -> Result<Self, Box<dyn Error>> {
        let video_subsystem = sdl.video()?;
        let window = video_subsystem
            .window(
                "vip8",
                (DISPLAY_WIDTH * SCALE) as u32,
                (DISPLAY_HEIGHT * SCALE) as u32,
            )
            .position_centered()
            .opengl()
            .build()?;
        let canvas = window.into_canvas().build()?;

        Ok(Display {
            canvas,
            width: DISPLAY_WIDTH,
            height: DISPLAY_HEIGHT,
        })
    }

    /// Formats a rendered frame for upload as an SDL2 RGB24 texture.
    ///
    /// An SDL2 RGB24 texture is a 1D array of bytes holding concatenated
    /// rows of R, G, B channel values; each 0x00RRGGBB pixel contributes
    /// its three channel bytes in order.
    ///
    /// # Arguments
    /// * `frame` a rendered frame
    fn frame_to_texture(frame: &Frame) -> Vec<u8> {
        frame
            .iter()
            .flat_map(|pixel| [(pixel >> 16) as u8, (pixel >> 8) as u8, *pixel as u8])
            .collect()
    }

    /// Uploads the frame as an SDL2 RGB24 streaming texture and presents it.
    ///
    /// # Arguments
    /// * `frame` a rendered frame
    pub fn render(&mut self, frame: &Frame) -> Result<(), Box<dyn Error>> {
        let texture_creator = self.canvas.texture_creator();

        let mut texture = texture_creator.create_texture_streaming(
            PixelFormatEnum::RGB24,
            self.width as u32,
            self.height as u32,
        )?;

        texture.with_lock(None, |buffer: &mut [u8], _pitch: usize| {
            buffer.copy_from_slice(&Display::frame_to_texture(frame));
        })?;

        self.canvas.copy(&texture, None, None)?;
        self.canvas.present();
        Ok(())
    }
}
