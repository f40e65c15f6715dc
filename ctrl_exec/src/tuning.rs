//! # Interactive Tuning
//!
//! Live adjustment of the controller gains from the keyboard:
//!
//! | Key | Action          |
//! |-----|-----------------|
//! | `q` | raise `alpha_1` |
//! | `a` | lower `alpha_1` |
//! | `w` | raise `alpha_2` |
//! | `s` | lower `alpha_2` |
//!
//! The terminal is switched out of canonical, echoing mode for the duration of the run by a
//! `RawTerminal` guard, which restores the original settings when dropped.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::os::unix::io::RawFd;

use log::{debug, info, warn};
use nix::sys::termios::{
    tcgetattr, tcsetattr, LocalFlags, SetArg, SpecialCharacterIndices, Termios,
};
use thiserror::Error;
use util::maths::clamp_floor;

use crate::data_store::{DataStore, Gains};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const STDIN_FD: RawFd = 0;

/// Most key presses handled in a single poll.
const MAX_KEYS_PER_POLL: usize = 16;

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

/// A recognised tuning key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningKey {
    Alpha1Up,
    Alpha1Down,
    Alpha2Up,
    Alpha2Down,
}

#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("Standard input is not a terminal")]
    NotATty,

    #[error("Could not read the terminal attributes: {0}")]
    GetAttrFailed(nix::Error),

    #[error("Could not set the terminal attributes: {0}")]
    SetAttrFailed(nix::Error),
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Guard holding the terminal in non-canonical, non-echoing, non-blocking mode.
pub struct RawTerminal {
    fd: RawFd,
    original: Termios,
}

/// Non-blocking reader of single key presses.
///
/// Only meaningful while a `RawTerminal` is alive, otherwise reads block for a full line.
#[derive(Debug)]
pub struct KeyReader {
    fd: RawFd,
}

/// Applies key presses to the gains held in the data store.
#[derive(Debug)]
pub struct Tuner {
    reader: KeyReader,
    step: f64,
    floor: f64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl TuningKey {
    /// Map a byte read from the terminal to a key, `None` for anything unrecognised.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'q' => Some(TuningKey::Alpha1Up),
            b'a' => Some(TuningKey::Alpha1Down),
            b'w' => Some(TuningKey::Alpha2Up),
            b's' => Some(TuningKey::Alpha2Down),
            _ => None,
        }
    }
}

/// Apply a key to a set of gains. Gains never drop below `floor`.
pub fn apply_key(gains: Gains, key: TuningKey, step: f64, floor: f64) -> Gains {
    let mut g = gains;

    match key {
        TuningKey::Alpha1Up => g.alpha_1 += step,
        TuningKey::Alpha1Down => g.alpha_1 -= step,
        TuningKey::Alpha2Up => g.alpha_2 += step,
        TuningKey::Alpha2Down => g.alpha_2 -= step,
    }

    g.alpha_1 = clamp_floor(g.alpha_1, floor);
    g.alpha_2 = clamp_floor(g.alpha_2, floor);
    g
}

impl RawTerminal {
    /// Switch stdin into raw mode.
    ///
    /// Reads return immediately with whatever is available (`VMIN = 0`, `VTIME = 0`).
    pub fn enable() -> Result<Self, TerminalError> {
        if !nix::unistd::isatty(STDIN_FD).unwrap_or(false) {
            return Err(TerminalError::NotATty);
        }

        let original = tcgetattr(STDIN_FD).map_err(TerminalError::GetAttrFailed)?;

        let mut raw = original.clone();
        raw.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO);
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
        raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;

        tcsetattr(STDIN_FD, SetArg::TCSANOW, &raw).map_err(TerminalError::SetAttrFailed)?;

        Ok(Self {
            fd: STDIN_FD,
            original,
        })
    }

    /// Get a key reader for this terminal.
    pub fn key_reader(&self) -> KeyReader {
        KeyReader { fd: self.fd }
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        match tcsetattr(self.fd, SetArg::TCSANOW, &self.original) {
            Ok(_) => info!("Terminal settings restored"),
            Err(e) => warn!("Could not restore terminal settings: {}", e),
        }
    }
}

impl KeyReader {
    /// Read one pending byte, or `None` if no key is waiting.
    pub fn read_byte(&mut self) -> Option<u8> {
        let mut buf = [0u8; 1];

        match nix::unistd::read(self.fd, &mut buf) {
            Ok(1) => Some(buf[0]),
            _ => None,
        }
    }
}

impl Tuner {
    pub fn new(reader: KeyReader, step: f64, floor: f64) -> Self {
        Self {
            reader,
            step,
            floor,
        }
    }

    /// Handle all pending key presses.
    ///
    /// The gains slot is read once and written once, never held across the key handling.
    pub fn poll(&mut self, ds: &DataStore) {
        let mut keys = [None; MAX_KEYS_PER_POLL];
        let mut num_keys = 0;

        while num_keys < MAX_KEYS_PER_POLL {
            match self.reader.read_byte() {
                Some(b) => {
                    keys[num_keys] = TuningKey::from_byte(b);
                    num_keys += 1;
                }
                None => break,
            }
        }

        if !keys.iter().any(|k| k.is_some()) {
            return;
        }

        let mut gains = ds.gains.read();
        for key in keys.iter().filter_map(|k| *k) {
            gains = apply_key(gains, key, self.step, self.floor);
        }
        ds.gains.write(gains);

        debug!(
            "Gains updated: alpha_1 = {:.2}, alpha_2 = {:.2}",
            gains.alpha_1, gains.alpha_2
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_key_mapping() {
        assert_eq!(TuningKey::from_byte(b'q'), Some(TuningKey::Alpha1Up));
        assert_eq!(TuningKey::from_byte(b'a'), Some(TuningKey::Alpha1Down));
        assert_eq!(TuningKey::from_byte(b'w'), Some(TuningKey::Alpha2Up));
        assert_eq!(TuningKey::from_byte(b's'), Some(TuningKey::Alpha2Down));
        assert_eq!(TuningKey::from_byte(b'x'), None);
        assert_eq!(TuningKey::from_byte(b'Q'), None);
    }

    #[test]
    fn test_apply_key() {
        let g = apply_key(Gains::new(1.0, 2.0), TuningKey::Alpha1Up, 0.1, 0.1);
        assert!((g.alpha_1 - 1.1).abs() < 1e-12);
        assert_eq!(g.alpha_2, 2.0);

        let g = apply_key(g, TuningKey::Alpha2Down, 0.1, 0.1);
        assert!((g.alpha_2 - 1.9).abs() < 1e-12);
    }

    #[test]
    fn test_gains_never_below_floor() {
        let mut g = Gains::new(0.35, 0.5);
        for _ in 0..100 {
            g = apply_key(g, TuningKey::Alpha1Down, 0.1, 0.1);
            g = apply_key(g, TuningKey::Alpha2Down, 0.1, 0.1);
            assert!(g.alpha_1 >= 0.1);
            assert!(g.alpha_2 >= 0.1);
        }
        assert_eq!(g.alpha_1, 0.1);
        assert_eq!(g.alpha_2, 0.1);

        // Raising from the floor works as normal
        let g = apply_key(g, TuningKey::Alpha1Up, 0.1, 0.1);
        assert!((g.alpha_1 - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_poll_applies_pending_keys() {
        use nalgebra::Vector3;
        use nix::fcntl::{fcntl, FcntlArg, OFlag};
        use nix::unistd::{close, pipe, write};

        // A non-blocking pipe stands in for stdin in raw mode
        let (read_fd, write_fd) = pipe().unwrap();
        fcntl(read_fd, FcntlArg::F_SETFL(OFlag::O_NONBLOCK)).unwrap();

        let ds = DataStore::new(Vector3::zeros(), Gains::new(0.5, 0.5), 0.3);
        let mut tuner = Tuner::new(KeyReader { fd: read_fd }, 0.1, 0.1);

        // Nothing pending
        tuner.poll(&ds);
        assert_eq!(ds.gains.read(), Gains::new(0.5, 0.5));

        assert_eq!(write(write_fd, b"aaaaaaaaaaaaaaaaqx").unwrap(), 18);

        // The first poll takes at most 16 keys, all lowering alpha_1 onto the floor
        tuner.poll(&ds);
        let g = ds.gains.read();
        assert_eq!(g.alpha_1, 0.1);
        assert_eq!(g.alpha_2, 0.5);

        // The rest: one raise and one unknown key
        tuner.poll(&ds);
        let g = ds.gains.read();
        assert!((g.alpha_1 - 0.2).abs() < 1e-12);
        assert_eq!(g.alpha_2, 0.5);

        // Drained
        tuner.poll(&ds);
        assert_eq!(ds.gains.read(), g);

        close(write_fd).unwrap();
        close(read_fd).unwrap();
    }
}
