use std::io::{self, Read};

use log::{debug, trace};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::constants::PROGRAM_START;
use crate::instruction;
use crate::state::{Frame, State};

/// # Chip-8
/// Chip-8 is a virtual machine and corresponding interpreted language.
///
/// Owns the machine state and the PRNG behind the random-register
/// instruction, and supplies the interfaces an execution loop needs:
/// - loading program images
/// - advancing the CPU one instruction at a time
/// - pressing and releasing keys; a key-down also resolves a pending
///   wait-for-key halt
/// - decrementing the 60 Hz timers by however many ticks have elapsed
/// - taking the rendered frame when the display has changed
pub struct Chip8 {
    state: State,
    rng: StdRng,
}

impl Chip8 {
    pub fn new() -> Self {
        Chip8 {
            state: State::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Loads a program image from a source file.
    ///
    /// The image is copied verbatim to the conventional origin with no
    /// format validation; bytes beyond the memory capacity wrap around.
    /// Returns the number of bytes consumed.
    pub fn load_rom(&mut self, reader: &mut dyn Read) -> io::Result<usize> {
        let mut image = Vec::new();
        let len = reader.read_to_end(&mut image)?;
        self.state.load(&image, PROGRAM_START);
        debug!("loaded {} byte image at {:#05X}", len, PROGRAM_START);
        Ok(len)
    }

    /// Advances the CPU by a single fetch/decode/execute cycle.
    /// - does nothing while halted awaiting a keypress
    /// - the pc moves past the instruction before it executes, so jump
    ///   targets overwrite the advanced value
    pub fn step(&mut self) {
        if self.is_waiting() {
            return;
        }
        let op = self.get_op();
        self.state.pc = self.state.pc.wrapping_add(0x2);
        trace!(
            "{:04X} v{:02X?} i{:04X} pc{:04X}",
            op,
            self.state.v,
            self.state.i,
            self.state.pc
        );
        self.state = instruction::from_op(&op)(&op, &self.state, &mut self.rng);
    }

    /// Whether execution is suspended on a wait-for-key instruction.
    pub fn is_waiting(&self) -> bool {
        self.state.waiting_key & 0x80 != 0
    }

    /// Sets the pressed status of `key`.
    ///
    /// If the CPU is halted on a wait-for-key, the key index is written to
    /// the destination register and the halt bit is cleared.
    pub fn key_press(&mut self, key: u8) {
        self.state.keys[(key & 0xF) as usize] = true;
        if self.is_waiting() {
            let register = self.state.waiting_key & 0x7F;
            self.state.v[register as usize] = key;
            self.state.waiting_key &= 0x7F;
        }
    }

    /// Unsets the pressed status of `key`.
    pub fn key_release(&mut self, key: u8) {
        self.state.keys[(key & 0xF) as usize] = false;
    }

    /// Decrements both timers by the number of elapsed 60 Hz ticks,
    /// stopping at zero.
    pub fn tick_timers(&mut self, ticks: u64) {
        let ticks = ticks.min(u64::from(u8::MAX)) as u8;
        self.state.delay_timer = self.state.delay_timer.saturating_sub(ticks);
        self.state.sound_timer = self.state.sound_timer.saturating_sub(ticks);
    }

    /// Returns the rendered frame if the display changed since the last
    /// call, clearing the redraw flag.
    pub fn get_frame(&mut self) -> Option<Frame> {
        if self.state.draw_flag {
            self.state.draw_flag = false;
            Some(self.state.render())
        } else {
            None
        }
    }

    /// Gets the opcode currently pointed at by the pc.
    /// Memory is stored as bytes, but opcodes are 16 bits so two subsequent
    /// bytes are combined big-endian.
    fn get_op(&self) -> u16 {
        let high = u16::from(self.state.read_byte(self.state.pc));
        let low = u16::from(self.state.read_byte(self.state.pc.wrapping_add(0x1)));
        high << 8 | low
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test_chip8 {
    use std::io::Cursor;

    use super::*;
    use crate::constants::PIXEL_ON;

    #[test]
    fn test_gets_op_big_endian() {
        let mut chip8 = Chip8::new();
        chip8.state.memory[0x200..0x202].copy_from_slice(&[0xAA, 0xBB]);
        assert_eq!(chip8.get_op(), 0xAABB);
    }

    #[test]
    fn test_fetch_wraps_at_memory_end() {
        let mut chip8 = Chip8::new();
        chip8.state.pc = 0xFFF;
        chip8.state.memory[0xFFF] = 0xAA;
        chip8.state.memory[0x000] = 0xBB;
        assert_eq!(chip8.get_op(), 0xAABB);
    }

    #[test]
    fn test_load_rom() {
        let mut chip8 = Chip8::new();
        let image = vec![0x00, 0xE0, 0x12, 0x00];
        let len = chip8.load_rom(&mut Cursor::new(image)).unwrap();
        assert_eq!(len, 4);
        assert_eq!(chip8.state.memory[0x200..0x204], [0x00, 0xE0, 0x12, 0x00]);
    }

    #[test]
    fn test_step_advances_pc() {
        let mut chip8 = Chip8::new();
        chip8.state.memory[0x200..0x202].copy_from_slice(&[0x00, 0xE0]);
        chip8.step();
        assert_eq!(chip8.state.pc, 0x202);
    }

    #[test]
    fn test_step_halts_while_waiting() {
        let mut chip8 = Chip8::new();
        chip8.state.memory[0x200..0x202].copy_from_slice(&[0x00, 0xE0]);
        chip8.state.waiting_key = 0x81;
        chip8.step();
        assert_eq!(chip8.state.pc, 0x200);
    }

    #[test]
    fn test_key_press_resolves_wait() {
        let mut chip8 = Chip8::new();
        // f10a: halt until a key lands in V1
        chip8.state.memory[0x200..0x202].copy_from_slice(&[0xF1, 0x0A]);
        chip8.step();
        assert!(chip8.is_waiting());
        assert_eq!(chip8.state.waiting_key, 0x81);

        // Further cycles refuse to advance until the key arrives
        chip8.step();
        chip8.step();
        assert_eq!(chip8.state.pc, 0x202);

        chip8.key_press(0x7);
        assert!(!chip8.is_waiting());
        assert_eq!(chip8.state.waiting_key, 0x01);
        assert_eq!(chip8.state.v[0x1], 0x7);

        chip8.state.memory[0x202..0x204].copy_from_slice(&[0x00, 0xE0]);
        chip8.step();
        assert_eq!(chip8.state.pc, 0x204);
    }

    #[test]
    fn test_captures_key_presses() {
        let mut chip8 = Chip8::new();
        chip8.key_press(0xE);
        assert!(chip8.state.keys[0xE]);
        chip8.key_release(0xE);
        assert!(!chip8.state.keys[0xE]);
    }

    #[test]
    fn test_tick_timers_clamps_at_zero() {
        let mut chip8 = Chip8::new();
        chip8.state.delay_timer = 0x2;
        chip8.state.sound_timer = 0x10;
        chip8.tick_timers(5);
        assert_eq!(chip8.state.delay_timer, 0x0);
        assert_eq!(chip8.state.sound_timer, 0xB);
        chip8.tick_timers(1_000_000);
        assert_eq!(chip8.state.sound_timer, 0x0);
    }

    #[test]
    fn test_get_frame_clears_draw_flag() {
        let mut chip8 = Chip8::new();
        // d005 draws the 0x0 font glyph at (0, 0)
        chip8.state.memory[0x200..0x202].copy_from_slice(&[0xD0, 0x05]);
        chip8.step();
        let frame = chip8.get_frame().unwrap();
        assert_eq!(frame[0], PIXEL_ON);
        assert!(chip8.get_frame().is_none());
    }
}
