use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use log::info;
use sdl2::event::Event;
use sdl2::keyboard::Keycode;

use vip8_core::constants::{FRAME_TIME, INSTRUCTIONS_PER_FRAME};
use vip8_core::Chip8;
use vip8_display::Display;

use crate::keymap::keymap;

/// Wall-clock pacing state, threaded through the loop rather than held in
/// globals: when the run started and how many 60 Hz ticks it has consumed.
struct FrameClock {
    started: Instant,
    ticks: u64,
}

impl FrameClock {
    fn new() -> Self {
        FrameClock {
            started: Instant::now(),
            ticks: 0,
        }
    }

    /// Number of whole 60 Hz ticks elapsed since the previous call.
    fn advance(&mut self) -> u64 {
        let total = (self.started.elapsed().as_nanos() / FRAME_TIME.as_nanos()) as u64;
        let fresh = total - self.ticks;
        self.ticks = total;
        fresh
    }
}

pub fn run(rom: PathBuf) -> Result<(), Box<dyn Error>> {
    let mut chip8 = Chip8::new();

    let file = File::open(&rom)?;
    let mut reader = BufReader::new(file);
    let loaded = chip8.load_rom(&mut reader)?;
    info!("loaded {} ({} bytes)", rom.display(), loaded);

    let sdl = sdl2::init()?;
    let mut display = Display::new(&sdl)?;
    let mut events = sdl.event_pump()?;

    let mut clock = FrameClock::new();

    'event: loop {
        // Forward input; a key-down may also resolve a pending key wait
        for event in events.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => break 'event,
                Event::KeyDown {
                    keycode: Some(key), ..
                } => {
                    if let Some(kc) = keymap(key) {
                        chip8.key_press(kc);
                    }
                }
                Event::KeyUp {
                    keycode: Some(key), ..
                } => {
                    if let Some(kc) = keymap(key) {
                        chip8.key_release(kc);
                    }
                }
                _ => {}
            }
        }

        let ticks = clock.advance();
        if ticks == 0 {
            // Ahead of the timer clock; sleep one period rather than spin
            thread::sleep(FRAME_TIME);
            continue;
        }

        // Run this iteration's instruction budget, stopping early if the
        // machine halts on a key wait
        for _ in 0..ticks * u64::from(INSTRUCTIONS_PER_FRAME) {
            if chip8.is_waiting() {
                break;
            }
            chip8.step();
        }

        chip8.tick_timers(ticks);

        if let Some(frame) = chip8.get_frame() {
            display.render(&frame)?;
        }
    }

    Ok(())
}
