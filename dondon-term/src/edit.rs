use std::io::{self, Write as _};

use dondon_chart::Mapset;
use dondon_core::chart::{NoteColor, NoteFlags};
use dondon_core::clock::PlaybackClock;
use dondon_core::editor::{ClickOutcome, EditMode, Editor};
use dondon_core::event::{EventBus, Transition};
use dondon_core::grid::{BEATS_PER_MEASURE, GridLineKind, SUBDIVISIONS};
use dondon_core::timing::{Timestamp, TimestampDifference};
use rustix::termios::Winsize;
use tracing::{info, warn};

use crate::clock::WallClock;
use crate::lane::{self, Lane};
use crate::parser::{Key, Modifier, Mouse, MouseKind};

/// Editor zoom limits, in columns per second.
const MIN_SPEED: u16 = 10;
const MAX_SPEED: u16 = 400;

pub struct EditScreen {
    pub editor: Editor,
    /// Index of the mapset in the song list.
    pub mapset: usize,
    clock: WallClock,
    /// Flags of inserted notes.
    flags: NoteFlags,
    speed: u16,
    size: Winsize,
    status: Option<String>,
    /// Set after Escape with unsaved changes; a second Escape discards them.
    confirm_discard: bool,
}

impl EditScreen {
    pub fn new(editor: Editor, mapset: usize, speed: u16, size: Winsize) -> Self {
        Self {
            editor,
            mapset,
            clock: WallClock::new_paused(Timestamp::zero()),
            flags: NoteFlags::DON,
            speed: speed.clamp(MIN_SPEED, MAX_SPEED),
            size,
            status: None,
            confirm_discard: false,
        }
    }

    pub fn resize(&mut self, size: Winsize) {
        self.size = size;
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    fn lane(&self) -> Lane {
        Lane::new(self.size, f64::from(self.speed))
    }

    /// Pauses playback when coming back from test play.
    pub fn resumed(&mut self) {
        self.clock.pause();
    }

    pub fn save(&mut self, mapset: &mut Mapset) {
        match mapset.save_chart(self.editor.chart()) {
            Ok(path) => {
                self.editor.mark_saved();
                self.set_status(format!("saved to {}", path.display()));
            }
            Err(err) => {
                warn!("error saving chart: {err}");
                self.set_status(format!("error saving: {err}"));
            }
        }
    }

    pub fn key(&mut self, key: Key, mods: Modifier, bus: &mut EventBus) {
        if key != Key::Escape {
            self.confirm_discard = false;
        }

        match key {
            Key::Escape => {
                if self.editor.is_dirty() && !self.confirm_discard {
                    self.confirm_discard = true;
                    self.set_status("unsaved changes, press Escape again to discard");
                } else {
                    bus.push(Transition::ReturnToMenu);
                }
            }
            Key::Tab => {
                self.editor.toggle_mode();
                self.status = None;
            }
            Key::Char(' ') => self.clock.toggle_pause(),
            Key::Left => self.seek(step_count(mods)),
            Key::Right => self.seek(-step_count(mods)),
            Key::Char('1') => self.flags = NoteFlags::DON,
            Key::Char('2') => self.flags = NoteFlags::KAT,
            Key::Char('3') => self.flags = NoteFlags::BIG_DON,
            Key::Char('4') => self.flags = NoteFlags::BIG_KAT,
            Key::Char('c') => self.editor.set_selected_flags(self.flags),
            Key::Delete | Key::Backspace => {
                let removed = self.editor.delete_selected();
                self.set_status(format!("deleted {removed} notes"));
            }
            Key::Char('t') => {
                self.clock.pause();
                bus.push(self.editor.test_play(&self.clock));
            }
            Key::Char('[') => self.change_bpm(-bpm_step(mods)),
            Key::Char(']') => self.change_bpm(bpm_step(mods)),
            Key::Char('-') => self.change_offset(-5),
            Key::Char('=' | '+') => self.change_offset(5),
            Key::F3 => self.speed = self.speed.saturating_sub(10).max(MIN_SPEED),
            Key::F4 => self.speed = (self.speed + 10).min(MAX_SPEED),
            _ => (),
        }
    }

    pub fn mouse(&mut self, mouse: Mouse) {
        let lane = self.lane();
        let now = self.clock.elapsed();
        let time = lane.time_at(mouse.col, now);
        let lane_pos = f64::from(i32::from(mouse.row) - i32::from(lane.row));

        match mouse.kind {
            MouseKind::Press => match self.editor.pointer_down(time, lane_pos, self.flags) {
                ClickOutcome::Inserted(index) => {
                    self.status = None;
                    info!(index, t = time.as_secs_f64(), "inserted note");
                }
                ClickOutcome::Rejected(err) => self.set_status(err.to_string()),
                ClickOutcome::DragStarted => (),
            },
            MouseKind::Drag => {
                let count = self.editor.pointer_motion(time, lane_pos);
                self.set_status(format!("{count} selected"));
            }
            MouseKind::Release => {
                self.editor.pointer_up();
            }
            MouseKind::SecondaryPress => {
                if self.editor.remove_at(time).is_some() {
                    self.status = None;
                }
            }
            MouseKind::ScrollUp => self.seek(step_count(mouse.mods)),
            MouseKind::ScrollDown => self.seek(-step_count(mouse.mods)),
        }
    }

    fn seek(&mut self, steps: i64) {
        self.editor.seek(&mut self.clock, steps);
    }

    fn change_bpm(&mut self, delta: f64) {
        let bpm = ((self.editor.grid().bpm() + delta) * 10.).round() / 10.;
        if let Err(err) = self.editor.set_bpm(bpm) {
            self.set_status(err.to_string());
        }
    }

    fn change_offset(&mut self, millis: i32) {
        let offset = self
            .editor
            .grid()
            .offset()
            .saturating_add(TimestampDifference::from_millis(millis));
        self.editor.set_offset(offset);
    }

    pub fn draw(&mut self, stdout: &mut io::StdoutLock) -> io::Result<()> {
        let lane = self.lane();
        let now = self.clock.elapsed();
        let range = lane.visible_range(now);

        // Grid lines above the lane.
        let grid_row = lane.row - 2;
        lane::clear_row(stdout, grid_row)?;
        stdout.write_all(b"\x1B[90m")?;
        for line in self.editor.grid().lines(range.clone()) {
            let col = lane.col_at(line.timestamp, now);
            if !lane.contains_col(col) {
                continue;
            }
            let glyph = match line.kind {
                GridLineKind::Measure => "┃",
                GridLineKind::Beat => "│",
                GridLineKind::Quarter => "·",
            };
            write!(stdout, "\x1B[{grid_row};{col}H{glyph}")?;
        }
        stdout.write_all(b"\x1B[39m")?;

        // Playhead.
        lane::clear_row(stdout, lane.row - 1)?;
        write!(stdout, "\x1B[{};{}H▼", lane.row - 1, lane.target_col)?;

        lane::clear_row(stdout, lane.row)?;
        let chart = self.editor.chart();
        let first = chart.lower_bound(range.start);
        let last = chart.upper_bound(range.end);
        for note in &chart.notes()[first..last] {
            let col = lane.col_at(note.timestamp, now);
            if lane.contains_col(col) {
                lane::draw_note(stdout, lane.row, col, note)?;
            }
        }

        // Selection box span below the lane.
        lane::clear_row(stdout, lane.row + 1)?;
        if let Some(selection) = self.editor.selection_box() {
            let start = lane.col_at(selection.time_start, now).max(1);
            let end = lane.col_at(selection.time_end, now).min(i64::from(lane.width));
            if start <= end {
                write!(
                    stdout,
                    "\x1B[{};{start}H\x1B[90m{}\x1B[39m",
                    lane.row + 1,
                    "▔".repeat((end - start + 1) as usize)
                )?;
            }
        }

        self.draw_status(stdout, now)?;
        Ok(())
    }

    fn draw_status(&self, stdout: &mut io::StdoutLock, now: Timestamp) -> io::Result<()> {
        let rows = self.size.ws_row;
        let grid = self.editor.grid();
        let chart = self.editor.chart();

        let mode = match self.editor.mode() {
            EditMode::Select => "SELECT",
            EditMode::Insert => "INSERT",
        };
        let beat = grid.index_at(now) / SUBDIVISIONS;

        lane::clear_row(stdout, rows.saturating_sub(2).max(1))?;
        write!(
            stdout,
            "{mode}  {} {}  {:.1} BPM  offset {} ms  {:.3} s  measure {}.{}  {} notes{}{}",
            lane::note_glyph(self.flags),
            if self.flags.color == NoteColor::Don { "don" } else { "kat" },
            grid.bpm(),
            grid.offset().as_millis(),
            now.as_secs_f64(),
            beat.div_euclid(BEATS_PER_MEASURE) + 1,
            beat.rem_euclid(BEATS_PER_MEASURE) + 1,
            chart.len(),
            if self.editor.is_dirty() { "  [modified]" } else { "" },
            if self.clock.is_paused() { "  [paused]" } else { "" },
        )?;

        lane::clear_row(stdout, rows.saturating_sub(1).max(1))?;
        if let Some(status) = &self.status {
            stdout.write_all(status.as_bytes())?;
        } else {
            stdout.write_all(
                b"Tab mode  Space play  \xE2\x86\x90\xE2\x86\x92 seek  1-4 note  c recolor  \
                  Del delete  [ ] BPM  - = offset  t test  Ctrl+S save  Esc menu",
            )?;
        }

        Ok(())
    }
}

/// Grid lines per seek step: a quarter, a beat with Shift, or a measure with Ctrl.
fn step_count(mods: Modifier) -> i64 {
    if mods.contains(Modifier::Ctrl) {
        SUBDIVISIONS * BEATS_PER_MEASURE
    } else if mods.contains(Modifier::Shift) {
        SUBDIVISIONS
    } else {
        1
    }
}

fn bpm_step(mods: Modifier) -> f64 {
    if mods.contains(Modifier::Shift) { 0.1 } else { 1. }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dondon_core::chart::{Chart, ChartMeta};

    fn screen() -> EditScreen {
        let editor = Editor::new(Chart::new(ChartMeta::default())).unwrap();
        let size = Winsize {
            ws_row: 24,
            ws_col: 120,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        EditScreen::new(editor, 0, 40, size)
    }

    fn click(screen: &mut EditScreen, kind: MouseKind, col: u16, row: u16) {
        screen.mouse(Mouse {
            kind,
            col,
            row,
            mods: Modifier::empty(),
        });
    }

    #[test]
    fn keyboard_seeks_by_grid_lines() {
        let mut screen = screen();
        let mut bus = EventBus::new();

        screen.key(Key::Right, Modifier::empty(), &mut bus);
        assert_eq!(screen.clock.elapsed(), Timestamp::from_millis(125));
        screen.key(Key::Right, Modifier::Shift, &mut bus);
        assert_eq!(screen.clock.elapsed(), Timestamp::from_millis(625));
        screen.key(Key::Left, Modifier::Ctrl, &mut bus);
        assert_eq!(screen.clock.elapsed(), Timestamp::from_millis(-1375));
    }

    #[test]
    fn mouse_inserts_and_selects() {
        let mut screen = screen();
        let mut bus = EventBus::new();
        screen.key(Key::Tab, Modifier::empty(), &mut bus);
        assert_eq!(screen.editor.mode(), EditMode::Insert);

        // 40 columns per second, target at column 20, lane at row 12.
        click(&mut screen, MouseKind::Press, 40, 12);
        click(&mut screen, MouseKind::Press, 60, 12);
        assert_eq!(screen.editor.chart().len(), 2);
        assert_eq!(
            screen.editor.chart().notes()[0].timestamp,
            Timestamp::from_millis(500)
        );

        screen.key(Key::Tab, Modifier::empty(), &mut bus);
        click(&mut screen, MouseKind::Press, 30, 11);
        click(&mut screen, MouseKind::Drag, 50, 13);
        click(&mut screen, MouseKind::Release, 50, 13);
        assert_eq!(screen.editor.chart().selected_indices().collect::<Vec<_>>(), [0]);

        click(&mut screen, MouseKind::SecondaryPress, 60, 12);
        assert_eq!(screen.editor.chart().len(), 1);
    }

    #[test]
    fn escape_with_unsaved_changes_needs_confirmation() {
        let mut screen = screen();
        let mut bus = EventBus::new();
        screen.editor.try_insert(Timestamp::from_millis(500), NoteFlags::DON).unwrap();

        screen.key(Key::Escape, Modifier::empty(), &mut bus);
        assert!(bus.is_empty());
        screen.key(Key::Escape, Modifier::empty(), &mut bus);
        assert_eq!(bus.pop(), Some(Transition::ReturnToMenu));
    }

    #[test]
    fn test_play_request() {
        let mut screen = screen();
        let mut bus = EventBus::new();
        screen.key(Key::Char('t'), Modifier::empty(), &mut bus);
        assert!(matches!(
            bus.pop(),
            Some(Transition::StartTestPlay { start, .. }) if start == Timestamp::zero()
        ));
    }

    #[test]
    fn bpm_and_offset_keys() {
        let mut screen = screen();
        let mut bus = EventBus::new();
        screen.key(Key::Char(']'), Modifier::empty(), &mut bus);
        screen.key(Key::Char('['), Modifier::Shift, &mut bus);
        assert_eq!(screen.editor.chart().meta.bpm, 120.9);

        screen.key(Key::Char('-'), Modifier::empty(), &mut bus);
        assert_eq!(screen.editor.chart().meta.offset, Timestamp::from_millis(-5));
    }
}
