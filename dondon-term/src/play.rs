use std::io::{self, Write as _};

use anyhow::anyhow;
use dondon_core::chart::{Chart, NoteColor};
use dondon_core::clock::PlaybackClock;
use dondon_core::event::{EventBus, Transition};
use dondon_core::state::{Event, EventKind, GameState, HitGrade, Input, Statistics};
use dondon_core::timing::{Timestamp, TimestampDifference};
use rustix::termios::Winsize;
use tracing::{debug, info};

use crate::clock::WallClock;
use crate::config::Config;
use crate::lane::{self, Lane};
use crate::parser::Key;

/// Time before the first note at the start of a play session.
const LEAD_IN: TimestampDifference = TimestampDifference(100_000);
/// How long the judgement text stays on screen.
const JUDGEMENT_DISPLAY_TIME: TimestampDifference = TimestampDifference(40_000);
/// Milliseconds of hit error per error bar column.
const ERROR_BAR_MS_PER_COL: i32 = 5;

pub struct Play {
    pub state: GameState,
    clock: WallClock,
    /// Test-play from the editor, rather than a regular session.
    test_play: bool,
    global_offset: TimestampDifference,
    keys: crate::config::KeyBindings,
    lane: Lane,
    size: Winsize,
    last_event: Option<(Timestamp, EventKind)>,
    /// Last time each drum surface was hit, for the drum flash.
    last_input: [Option<Timestamp>; 2],
}

impl Play {
    /// Creates a session over `chart`, starting at `start` or at the beginning.
    pub fn new(
        chart: Chart,
        config: &Config,
        size: Winsize,
        start: Option<Timestamp>,
    ) -> anyhow::Result<Self> {
        let first = chart.first_timestamp();
        let mut state = GameState::new(chart, config.hit_windows.into())
            .map_err(|err| anyhow!("error starting play: {err}"))?;

        let start = match start {
            Some(start) => {
                state.seek(start);
                start
            }
            None => {
                let first = first.unwrap_or(Timestamp::zero());
                first.saturating_sub(LEAD_IN).min(Timestamp::zero())
            }
        };
        info!(
            start = start.as_secs_f64(),
            notes = state.chart.len(),
            "starting play"
        );

        Ok(Self {
            state,
            clock: WallClock::new(start),
            test_play: false,
            global_offset: TimestampDifference::from_millis(config.global_offset_ms),
            keys: config.keys,
            lane: Lane::new(size, f64::from(config.scroll_speed)),
            size,
            last_event: None,
            last_input: [None; 2],
        })
    }

    /// Creates a test-play session for a chart from the editor.
    pub fn test(
        chart: Chart,
        config: &Config,
        size: Winsize,
        start: Timestamp,
    ) -> anyhow::Result<Self> {
        let mut play = Self::new(chart, config, size, Some(start))?;
        play.test_play = true;
        Ok(play)
    }

    pub fn is_test_play(&self) -> bool {
        self.test_play
    }

    pub fn resize(&mut self, size: Winsize) {
        self.size = size;
        self.lane = Lane::new(size, self.lane.speed);
    }

    /// Playback position used for judgement.
    fn now(&self) -> Timestamp {
        self.clock.elapsed().saturating_sub(self.global_offset)
    }

    pub fn key(&mut self, key: Key, bus: &mut EventBus) {
        match key {
            Key::Escape => {
                bus.push(if self.test_play {
                    Transition::ReturnToEditor
                } else {
                    Transition::ReturnToMenu
                });
            }
            Key::Char(c) => {
                if let Some(input) = self.keys.input(c) {
                    // Judge right away so the input isn't delayed until the next frame.
                    self.judge(&[input]);
                }
            }
            _ => (),
        }
    }

    /// Advances the session to the current time.
    ///
    /// Once the session has ended, requests the summary, or the editor after a test play.
    pub fn tick(&mut self, bus: &mut EventBus) {
        if !self.judge(&[]) {
            return;
        }

        if self.test_play {
            bus.push(Transition::ReturnToEditor);
        } else {
            let stats = *self.state.stats();
            info!(score = stats.score, accuracy = stats.accuracy, "play finished");
            bus.push(Transition::ShowSummary { stats });
        }
    }

    fn judge(&mut self, inputs: &[Input]) -> bool {
        let now = self.now();
        let judgement = self.state.judge(now, inputs);

        for input in &judgement.feedback {
            let surface = match input.color {
                NoteColor::Don => 0,
                NoteColor::Kat => 1,
            };
            self.last_input[surface] = Some(now);
        }

        for &Event { note, kind } in &judgement.events {
            debug!(note, ?kind, "judged");
            self.last_event = Some((now, kind));
        }

        judgement.finished
    }

    pub fn draw(&mut self, stdout: &mut io::StdoutLock) -> io::Result<()> {
        let now = self.now();
        let lane = self.lane;
        let rows = self.size.ws_row;

        // Flying notes go from the target up to the top right.
        let flight_rows = lane.row.saturating_sub(3);
        for row in 2..lane.row.saturating_sub(1) {
            lane::clear_row(stdout, row)?;
        }
        let flight_cols = f64::from(lane.width.saturating_sub(lane.target_col)) / 2.;
        let target_col = i64::from(lane.target_col);
        for flying in self.state.sweep_in_flight(now) {
            let row = lane.row - 1 - (flying.progress * f64::from(flight_rows)).round() as u16;
            let col = target_col + (flying.progress * flight_cols).round() as i64;
            let color = lane::note_color(flying.flags);
            let glyph = lane::note_glyph(flying.flags);
            write!(stdout, "\x1B[{row};{col}H\x1B[{color}m{glyph}\x1B[39m")?;
        }

        // The lane itself.
        lane::clear_row(stdout, lane.row)?;
        let target_color = match self.last_input {
            [Some(t), _] if now.saturating_difference(t) < JUDGEMENT_DISPLAY_TIME => 91,
            [_, Some(t)] if now.saturating_difference(t) < JUDGEMENT_DISPLAY_TIME => 96,
            _ => 90,
        };
        write!(stdout, "\x1B[{};{}H\x1B[{target_color}m◯\x1B[39m", lane.row, lane.target_col)?;

        let notes = &self.state.chart.notes()[self.state.cursor()..];
        // Draw from the back so earlier notes end up on top.
        for note in notes
            .iter()
            .take_while(|note| lane.contains_col(lane.col_at(note.timestamp, now)))
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
        {
            lane::draw_note(stdout, lane.row, lane.col_at(note.timestamp, now), note)?;
        }

        // Judgement text below the target.
        let text_row = lane.row + 1;
        lane::clear_row(stdout, text_row)?;
        if let Some((t, kind)) = self.last_event
            && now.saturating_difference(t) < JUDGEMENT_DISPLAY_TIME
        {
            let (color, text) = match kind {
                EventKind::Hit(hit) if hit.grade == HitGrade::Perfect => (93, "PERFECT"),
                EventKind::Hit(_) => (97, "OK"),
                EventKind::Miss(_) => (94, "MISS"),
            };
            let col = lane.target_col.saturating_sub(text.len() as u16 / 2).max(1);
            write!(stdout, "\x1B[{text_row};{col}H\x1B[{color}m{text}\x1B[39m")?;
        }

        self.draw_error_bar(stdout, lane.row + 3)?;
        self.draw_hud(stdout, rows)?;

        Ok(())
    }

    fn draw_error_bar(&self, stdout: &mut io::StdoutLock, row: u16) -> io::Result<()> {
        lane::clear_row(stdout, row)?;

        let center = i64::from(self.size.ws_col / 2);
        let half_ok = self.state.hit_windows.ok.half().into_milli_hundredths() / 100;
        let half_width = i64::from(half_ok / ERROR_BAR_MS_PER_COL);
        write!(
            stdout,
            "\x1B[{row};{}H\x1B[90m{}\x1B[39m",
            (center - half_width).max(1),
            "─".repeat((half_width * 2 + 1) as usize)
        )?;

        // Oldest first so the newest hits are drawn on top.
        for hit in self.state.last_hits.asc_iter() {
            let ms = hit.difference.into_milli_hundredths() / 100;
            let col = center + i64::from(ms / ERROR_BAR_MS_PER_COL);
            let color = match hit.grade {
                HitGrade::Perfect => 93,
                HitGrade::Ok => 97,
            };
            write!(stdout, "\x1B[{row};{col}H\x1B[{color}m│\x1B[39m")?;
        }

        Ok(())
    }

    fn draw_hud(&self, stdout: &mut io::StdoutLock, rows: u16) -> io::Result<()> {
        let stats = self.state.stats();
        let row = rows.saturating_sub(1).max(1);
        lane::clear_row(stdout, row)?;
        write!(
            stdout,
            "{:>8}  {:>4}x  {:>6.2}%",
            stats.score,
            stats.combo,
            stats.accuracy * 100.
        )?;
        if self.test_play {
            stdout.write_all(b"  [test play, Esc returns to the editor]")?;
        }
        Ok(())
    }
}

/// Results screen shown after a regular session.
pub struct Summary {
    pub title: String,
    pub stats: Statistics,
}

impl Summary {
    pub fn key(&self, key: Key, bus: &mut EventBus) {
        if matches!(key, Key::Enter | Key::Escape) {
            bus.push(Transition::ReturnToMenu);
        }
    }

    pub fn draw(&self, stdout: &mut io::StdoutLock, size: Winsize) -> io::Result<()> {
        let stats = &self.stats;
        let rank = stats
            .rank()
            .map_or_else(|| String::from("-"), |rank| format!("{rank:?}"));

        let lines = [
            self.title.clone(),
            String::new(),
            format!("Rank      {rank}"),
            format!("Score     {}", stats.score),
            format!("Accuracy  {:.2}%", stats.accuracy * 100.),
            format!("Max combo {}", stats.max_combo),
            format!("Perfect   {}", stats.perfect_count),
            format!("Ok        {}", stats.ok_count),
            format!("Miss      {}", stats.miss_count),
            String::new(),
            String::from("Enter to continue"),
        ];

        let top = (size.ws_row / 2).saturating_sub(lines.len() as u16 / 2).max(1);
        let col = (size.ws_col / 2).saturating_sub(12).max(1);
        for (i, line) in lines.iter().enumerate() {
            write!(stdout, "\x1B[{};{col}H{line}", top + i as u16)?;
        }
        Ok(())
    }
}
