//! Horizontal note lane layout shared by the editor and gameplay screens.

use std::io::{self, Write as _};

use dondon_core::chart::{Note, NoteColor, NoteFlags, NoteSize};
use dondon_core::timing::Timestamp;
use rustix::termios::Winsize;

/// Maps between playback time and terminal columns.
///
/// Notes move right to left; the hit target sits at a fixed column.
#[derive(Debug, Clone, Copy)]
pub struct Lane {
    /// 1-based row of the lane.
    pub row: u16,
    /// 1-based column of the hit target.
    pub target_col: u16,
    /// Total number of columns.
    pub width: u16,
    /// Columns per second.
    pub speed: f64,
}

impl Lane {
    pub fn new(size: Winsize, speed: f64) -> Self {
        Self {
            row: (size.ws_row / 2).max(3),
            target_col: (size.ws_col / 6).max(4),
            width: size.ws_col,
            speed,
        }
    }

    /// Returns the column of `timestamp` when the playback position is `now`.
    pub fn col_at(&self, timestamp: Timestamp, now: Timestamp) -> i64 {
        let offset = timestamp.saturating_difference(now).as_secs_f64() * self.speed;
        i64::from(self.target_col) + offset.round() as i64
    }

    /// Returns the time displayed at `col` when the playback position is `now`.
    pub fn time_at(&self, col: u16, now: Timestamp) -> Timestamp {
        let offset = f64::from(i32::from(col) - i32::from(self.target_col)) / self.speed;
        Timestamp::from_secs_f64(now.as_secs_f64() + offset)
    }

    /// Returns the time range visible on screen.
    pub fn visible_range(&self, now: Timestamp) -> std::ops::Range<Timestamp> {
        self.time_at(1, now)..self.time_at(self.width.saturating_add(1), now)
    }

    /// Returns `true` if `col` is on screen.
    pub fn contains_col(&self, col: i64) -> bool {
        col >= 1 && col <= i64::from(self.width)
    }
}

pub fn note_glyph(flags: NoteFlags) -> &'static str {
    match flags.size {
        NoteSize::Normal => "●",
        NoteSize::Big => "◉",
    }
}

pub fn note_color(flags: NoteFlags) -> u8 {
    match flags.color {
        NoteColor::Don => 91,
        NoteColor::Kat => 96,
    }
}

pub fn clear_row(stdout: &mut io::StdoutLock, row: u16) -> io::Result<()> {
    write!(stdout, "\x1B[{row};1H\x1B[2K")
}

pub fn draw_note(
    stdout: &mut io::StdoutLock,
    row: u16,
    col: i64,
    note: &Note,
) -> io::Result<()> {
    let color = note_color(note.flags);
    let glyph = note_glyph(note.flags);
    if note.selected {
        write!(stdout, "\x1B[{row};{col}H\x1B[7;{color}m{glyph}\x1B[27;39m")
    } else {
        write!(stdout, "\x1B[{row};{col}H\x1B[{color}m{glyph}\x1B[39m")
    }
}
