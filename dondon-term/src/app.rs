use std::io::{self, Write};
use std::mem;

use anyhow::ensure;
use calloop::{EventLoop, LoopHandle, LoopSignal};
use dondon_chart::Mapset;
use dondon_core::editor::Editor;
use dondon_core::event::{EventBus, Transition};
use dondon_core::state::Statistics;
use rustix::termios::{self, Winsize};
use tracing::{debug, info, warn};

use crate::clock::FrameClock;
use crate::config::Config;
use crate::edit::EditScreen;
use crate::menu::Menu;
use crate::parser::{Event, Key, Modifier, Mouse};
use crate::play::{Play, Summary};

/// The current game mode.
enum Mode {
    Menu,
    Edit(EditScreen),
    Play(Play),
    Summary(Summary),
}

pub struct App {
    _loop_handle: LoopHandle<'static, Self>,
    stop_signal: LoopSignal,
    error: Option<anyhow::Error>,

    // Pre-init.
    got_kitty_keyboard_support: bool,

    size: Winsize,
    got_sync: bool,
    need_full_redraw: bool,

    frame_clock: FrameClock,
    config: Config,
    bus: EventBus,
    songs: Vec<Mapset>,
    menu: Menu,
    mode: Mode,
    /// The editor waiting for a test play to finish.
    suspended_editor: Option<EditScreen>,
}

impl App {
    pub fn new(
        event_loop: &EventLoop<'static, Self>,
        config: Config,
        songs: Vec<Mapset>,
    ) -> anyhow::Result<Self> {
        let size = termios::tcgetwinsize(rustix::stdio::stdout())?;
        Ok(Self::with_size(event_loop, config, songs, size))
    }

    fn with_size(
        event_loop: &EventLoop<'static, Self>,
        config: Config,
        songs: Vec<Mapset>,
        size: Winsize,
    ) -> Self {
        Self {
            _loop_handle: event_loop.handle(),
            stop_signal: event_loop.get_signal(),
            error: None,
            got_kitty_keyboard_support: false,
            size,
            got_sync: false,
            need_full_redraw: true,
            frame_clock: FrameClock::new(),
            config,
            bus: EventBus::new(),
            songs,
            menu: Menu::default(),
            mode: Mode::Menu,
            suspended_editor: None,
        }
    }

    pub fn signal_stop(&self) {
        self.stop_signal.stop();
    }

    pub fn stop_on_error(&mut self, result: anyhow::Result<()>) {
        if let Err(err) = result {
            self.error = Some(err);
            self.signal_stop();
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn into_result(self) -> anyhow::Result<()> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn resized(&mut self) -> anyhow::Result<()> {
        let size = termios::tcgetwinsize(rustix::stdio::stdout())?;
        if self.size == size {
            return Ok(());
        }
        self.size = size;
        self.need_full_redraw = true;

        debug!(rows = size.ws_row, cols = size.ws_col, "resized");

        match &mut self.mode {
            Mode::Edit(screen) => screen.resize(size),
            Mode::Play(play) => play.resize(size),
            Mode::Menu | Mode::Summary(_) => (),
        }
        if let Some(screen) = &mut self.suspended_editor {
            screen.resize(size);
        }

        Ok(())
    }

    pub fn event(&mut self, event: Event) -> anyhow::Result<()> {
        match event {
            Event::Key { key, mods, release } => {
                if !release {
                    self.key(key, mods);
                }
            }
            Event::Mouse(mouse) => self.mouse(mouse),
            Event::KittyKeyboardSupported => self.got_kitty_keyboard_support = true,
            Event::PrimaryDeviceAttributes => {
                ensure!(
                    self.got_kitty_keyboard_support,
                    "terminal doesn't support the Kitty keyboard protocol"
                );

                self.got_sync = true;
            }
        }

        self.apply_transitions();
        Ok(())
    }

    fn key(&mut self, key: Key, mods: Modifier) {
        if key == Key::Char('c') && mods == Modifier::Ctrl {
            self.signal_stop();
            return;
        }

        match &mut self.mode {
            Mode::Menu => self
                .menu
                .key(key, &mut self.songs, &self.config.songs_dir, &mut self.bus),
            Mode::Edit(screen) => {
                if key == Key::Char('s') && mods == Modifier::Ctrl {
                    match self.songs.get_mut(screen.mapset) {
                        Some(mapset) => screen.save(mapset),
                        None => screen.set_status("the song of this chart is gone"),
                    }
                } else {
                    screen.key(key, mods, &mut self.bus);
                }
            }
            Mode::Play(play) => play.key(key, &mut self.bus),
            Mode::Summary(summary) => summary.key(key, &mut self.bus),
        }
    }

    fn mouse(&mut self, mouse: Mouse) {
        if let Mode::Edit(screen) = &mut self.mode {
            screen.mouse(mouse);
        }
    }

    /// Applies the mode switches requested since the last call.
    fn apply_transitions(&mut self) {
        while let Some(transition) = self.bus.pop() {
            self.need_full_redraw = true;

            match transition {
                Transition::OpenEditor { mapset, chart } => {
                    self.menu.select_song(mapset);
                    match Editor::new(chart) {
                        Ok(editor) => {
                            info!(mapset, "opening editor");
                            self.mode = Mode::Edit(EditScreen::new(
                                editor,
                                mapset,
                                self.config.scroll_speed,
                                self.size,
                            ));
                        }
                        Err(err) => {
                            warn!("error opening editor: {err}");
                            self.menu.set_message(format!("error opening editor: {err}"));
                        }
                    }
                }
                Transition::StartTestPlay { chart, start } => {
                    let Mode::Edit(screen) = &mut self.mode else {
                        warn!("test play requested outside of the editor");
                        continue;
                    };

                    if chart.is_empty() {
                        screen.set_status("add some notes first");
                        continue;
                    }

                    match Play::test(chart, &self.config, self.size, start) {
                        Ok(play) => {
                            if let Mode::Edit(screen) = mem::replace(&mut self.mode, Mode::Play(play))
                            {
                                self.suspended_editor = Some(screen);
                            }
                        }
                        Err(err) => screen.set_status(format!("{err:#}")),
                    }
                }
                Transition::StartPlay { chart } => {
                    let title = self.title(&chart.meta.difficulty_name);

                    // Nothing to judge, the session is over right away.
                    if chart.is_empty() {
                        self.mode = Mode::Summary(Summary {
                            title,
                            stats: Statistics::default(),
                        });
                        continue;
                    }

                    match Play::new(chart, &self.config, self.size, None) {
                        Ok(play) => self.mode = Mode::Play(play),
                        Err(err) => self.menu.set_message(format!("{err:#}")),
                    }
                }
                Transition::ShowSummary { stats } => {
                    let Mode::Play(play) = &self.mode else {
                        warn!("summary requested outside of a play session");
                        continue;
                    };

                    let name = play.state.chart.meta.difficulty_name.clone();
                    let title = self.title(&name);
                    self.suspended_editor = None;
                    self.mode = Mode::Summary(Summary { title, stats });
                }
                Transition::ReturnToEditor => match self.suspended_editor.take() {
                    Some(mut screen) => {
                        screen.resumed();
                        self.mode = Mode::Edit(screen);
                    }
                    None => self.mode = Mode::Menu,
                },
                Transition::ReturnToMenu => {
                    self.suspended_editor = None;
                    self.mode = Mode::Menu;
                }
                Transition::Quit => self.signal_stop(),
            }
        }
    }

    /// Returns the display title of a chart of the selected song.
    fn title(&self, difficulty_name: &str) -> String {
        match self.songs.get(self.menu.selected_song()) {
            Some(mapset) => format!(
                "{} - {} [{difficulty_name}]",
                mapset.info.artist, mapset.info.title
            ),
            None => format!("[{difficulty_name}]"),
        }
    }

    pub fn redraw(&mut self) -> io::Result<()> {
        if !self.got_sync {
            return Ok(());
        }

        self.frame_clock.frame();

        // Advance the session first so a finished play shows its summary in this frame.
        self.tick();
        self.apply_transitions();

        let stdout = io::stdout();
        let mut stdout = stdout.lock();

        // Start synchronized update.
        stdout.write_all(b"\x1B[?2026h")?;

        if self.need_full_redraw {
            // Erase all.
            stdout.write_all(b"\x1B[2J")?;
        }

        match &mut self.mode {
            Mode::Menu => self.menu.draw(&mut stdout, &self.songs, self.size)?,
            Mode::Edit(screen) => screen.draw(&mut stdout)?,
            Mode::Play(play) => play.draw(&mut stdout)?,
            Mode::Summary(summary) => summary.draw(&mut stdout, self.size)?,
        }

        self.draw_fps(&mut stdout)?;

        // End synchronized update.
        stdout.write_all(b"\x1B[?2026l")?;

        self.request_sync(&mut stdout)?;
        stdout.flush()?;

        self.need_full_redraw = false;

        Ok(())
    }

    fn tick(&mut self) {
        if let Mode::Play(play) = &mut self.mode {
            play.tick(&mut self.bus);
        }
    }

    fn draw_fps(&self, stdout: &mut io::StdoutLock) -> io::Result<()> {
        if let Some(fps) = self.frame_clock.fps() {
            write!(stdout, "\x1B[HFPS: {fps:>5.0}")?;
        }

        Ok(())
    }

    // In order to avoid filling up the terminal buffer with several rendered
    // frames faster than it can read them, we request the primary device
    // attributes at the end of each frame, and don't render new frames until we
    // get a response.
    fn request_sync(&mut self, stdout: &mut io::StdoutLock) -> io::Result<()> {
        stdout.write_all(b"\x1B[c")?;
        self.got_sync = false;
        Ok(())
    }
}
