use std::io::{self, Write as _};
use std::path::Path;

use dondon_chart::Mapset;
use dondon_core::chart::{Chart, ChartMeta, MapSetInfo};
use dondon_core::event::{EventBus, Transition};
use rustix::termios::Winsize;
use tracing::{info, warn};

use crate::lane;
use crate::parser::Key;

/// Song selection screen.
#[derive(Debug, Default)]
pub struct Menu {
    selected_song: usize,
    selected_difficulty: usize,
    message: Option<String>,
}

impl Menu {
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub fn selected_song(&self) -> usize {
        self.selected_song
    }

    /// Selects the mapset at `index`, e.g. after coming back from its editor.
    pub fn select_song(&mut self, index: usize) {
        if index != self.selected_song {
            self.selected_song = index;
            self.selected_difficulty = 0;
        }
    }

    pub fn key(&mut self, key: Key, songs: &mut Vec<Mapset>, songs_dir: &Path, bus: &mut EventBus) {
        self.message = None;

        match key {
            Key::Char('q') | Key::Escape => bus.push(Transition::Quit),
            Key::Up => {
                self.select_song(self.selected_song.saturating_sub(1));
            }
            Key::Down => {
                if self.selected_song + 1 < songs.len() {
                    self.select_song(self.selected_song + 1);
                }
            }
            Key::Left => {
                self.selected_difficulty = self.selected_difficulty.saturating_sub(1);
            }
            Key::Right => {
                let count = songs.get(self.selected_song).map_or(0, |s| s.difficulties.len());
                if self.selected_difficulty + 1 < count {
                    self.selected_difficulty += 1;
                }
            }
            Key::Enter => match self.load_selected(songs) {
                Some(Ok(chart)) => bus.push(Transition::StartPlay { chart }),
                Some(Err(err)) => self.set_message(err),
                None => self.set_message("nothing to play"),
            },
            Key::Char('e') => {
                if songs.get(self.selected_song).is_none() {
                    self.set_message("no songs, press n to create one");
                    return;
                }

                let chart = match self.load_selected(songs) {
                    Some(Ok(chart)) => chart,
                    Some(Err(err)) => {
                        self.set_message(err);
                        return;
                    }
                    None => Chart::new(ChartMeta::default()),
                };
                bus.push(Transition::OpenEditor {
                    mapset: self.selected_song,
                    chart,
                });
            }
            Key::Char('n') => match create_mapset(songs_dir, songs) {
                Ok(index) => {
                    self.select_song(index);
                    bus.push(Transition::OpenEditor {
                        mapset: index,
                        chart: Chart::new(ChartMeta::default()),
                    });
                }
                Err(err) => {
                    warn!("error creating mapset: {err}");
                    self.set_message(format!("error creating mapset: {err}"));
                }
            },
            _ => (),
        }
    }

    /// Loads the selected chart, or returns `None` if the selected song has no charts.
    fn load_selected(&self, songs: &[Mapset]) -> Option<Result<Chart, String>> {
        let mapset = songs.get(self.selected_song)?;
        let name = mapset.difficulties.get(self.selected_difficulty)?;
        Some(
            mapset
                .load_chart(name)
                .map_err(|err| format!("error loading {name}: {err}")),
        )
    }

    pub fn draw(&self, stdout: &mut io::StdoutLock, songs: &[Mapset], size: Winsize) -> io::Result<()> {
        let rows = size.ws_row;

        write!(stdout, "\x1B[3;3H\x1B[1mSongs\x1B[22m")?;

        if songs.is_empty() {
            write!(stdout, "\x1B[5;3H\x1B[90mno songs found\x1B[39m")?;
        }

        // Keep the selection on screen.
        let list_rows = usize::from(rows.saturating_sub(9).max(1));
        let first = self.selected_song.saturating_sub(list_rows - 1);
        for (i, mapset) in songs.iter().enumerate().skip(first).take(list_rows) {
            let row = 5 + (i - first) as u16;
            let info = &mapset.info;
            if i == self.selected_song {
                write!(stdout, "\x1B[{row};1H> \x1B[7m{} - {}\x1B[27m", info.artist, info.title)?;
            } else {
                write!(stdout, "\x1B[{row};3H{} - {}", info.artist, info.title)?;
            }
        }

        let row = rows.saturating_sub(3).max(1);
        lane::clear_row(stdout, row)?;
        if let Some(mapset) = songs.get(self.selected_song) {
            if mapset.difficulties.is_empty() {
                stdout.write_all(b"  \x1B[90mno charts, press e to create one\x1B[39m")?;
            }
            for (i, name) in mapset.difficulties.iter().enumerate() {
                if i == self.selected_difficulty {
                    write!(stdout, "  \x1B[7m{name}\x1B[27m")?;
                } else {
                    write!(stdout, "  {name}")?;
                }
            }
        }

        let row = rows.saturating_sub(1).max(1);
        lane::clear_row(stdout, row)?;
        if let Some(message) = &self.message {
            stdout.write_all(message.as_bytes())?;
        } else {
            stdout.write_all(
                "↑↓ song  ←→ difficulty  Enter play  e edit  n new song  q quit".as_bytes(),
            )?;
        }

        Ok(())
    }
}

/// Creates an empty mapset in the first free `untitled-N` directory and adds it to `songs`.
///
/// Returns its index in `songs`.
fn create_mapset(songs_dir: &Path, songs: &mut Vec<Mapset>) -> Result<usize, dondon_chart::Error> {
    let (n, path) = (1..)
        .map(|n| (n, songs_dir.join(format!("untitled-{n}"))))
        .find(|(_, path)| !path.exists())
        .unwrap_or_else(|| (0, songs_dir.join("untitled")));

    let info = MapSetInfo {
        title: format!("Untitled {n}"),
        artist: String::from("Unknown"),
    };
    let mapset = Mapset::create(&path, info)?;
    info!(?path, "created mapset");

    songs.push(mapset);
    Ok(songs.len() - 1)
}
