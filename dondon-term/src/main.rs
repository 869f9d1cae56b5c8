use std::env;
use std::fs::{self, File};
use std::io::{self, Write as _};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context as _, ensure};
use calloop::generic::Generic;
use calloop::signals::{Signal, Signals};
use calloop::{EventLoop, Interest, PostAction};
use rustix::io::{Errno, retry_on_intr};
use rustix::termios;
use tracing::info;
use tracing_subscriber::prelude::*;

mod app;
mod clock;
mod config;
mod edit;
mod lane;
mod menu;
mod parser;
mod play;
mod utils;

use app::App;
use config::Config;
use utils::*;

use crate::parser::Parser;

fn main() -> anyhow::Result<()> {
    let fd = rustix::stdio::stdout();
    ensure!(termios::isatty(fd));

    if env::var("RUST_BACKTRACE").is_err() {
        unsafe { env::set_var("RUST_BACKTRACE", "1") };
    }

    // The terminal is ours, so logs can only go to a file.
    let file_layer = match env::var_os("DONDON_LOG") {
        Some(path) => {
            let file =
                File::create(&path).with_context(|| format!("error creating log file {path:?}"))?;
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false);
            Some(layer)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(tracing_subscriber::filter::LevelFilter::DEBUG)
        .init();

    let mut config = Config::load()?;
    if let Some(songs_dir) = env::args_os().nth(1) {
        config.songs_dir = PathBuf::from(songs_dir);
    }

    fs::create_dir_all(&config.songs_dir)
        .with_context(|| format!("error creating songs directory {:?}", config.songs_dir))?;
    let songs = dondon_chart::list_mapsets(&config.songs_dir)
        .with_context(|| format!("error listing songs in {:?}", config.songs_dir))?;
    info!(count = songs.len(), dir = ?config.songs_dir, "loaded songs");

    // Get current term mode.
    let mut ios = termios::tcgetattr(fd)?;

    // Restore mode on normal exit.
    let _guard = RestoreTermMode(ios.clone());
    // Restore mode on panic.
    restore_term_mode_on_panic(ios.clone());

    // Enter raw mode.
    ios.make_raw();
    termios::tcsetattr(fd, termios::OptionalActions::Now, &ios)?;

    {
        let stdout = io::stdout();
        let mut stdout = stdout.lock();

        // Enable alternate screen buffer.
        stdout.write_all(b"\x1B[?1049h")?;
        // Hide cursor.
        stdout.write_all(b"\x1B[?25l")?;
        // Request Kitty keyboard protocol progressive enhancement status.
        stdout.write_all(b"\x1B[?u")?;
        // Request primary device attributes.
        stdout.write_all(b"\x1B[c")?;
        // Push enable Kitty keyboard protocol with:
        // - Disambiguate escape codes;
        // - Report event types;
        // - Report alternate keys;
        // - Report all keys as escape codes.
        stdout.write_all(b"\x1B[>15u")?;
        set_mouse_reporting(&mut stdout, true)?;
        stdout.flush()?;
    }

    let mut event_loop: EventLoop<'_, App> = EventLoop::try_new()?;
    let handle = event_loop.handle();

    // Listen for signals.
    let signals = Signals::new(&[
        Signal::SIGINT,
        Signal::SIGTERM,
        Signal::SIGHUP,
        Signal::SIGWINCH,
    ])?;
    // Now signalfd is created, so we won't miss SIGWINCH, and can get the term size.

    let mut app = App::new(&event_loop, config, songs)?;

    handle.insert_source(signals, |event, _, app| {
        if event.signal() == Signal::SIGWINCH {
            let res = app.resized();
            app.stop_on_error(res);
        } else {
            app.signal_stop();
        }
    })?;

    let mut parser = Parser::new();
    handle.insert_source(
        Generic::new(rustix::stdio::stdin(), Interest::READ, calloop::Mode::Level),
        move |_readiness, _fd, app| {
            let stdin = rustix::stdio::stdin();
            let mut buf = [0u8];
            match retry_on_intr(|| rustix::io::read(stdin, &mut buf)) {
                Ok(0) => (),
                Ok(_n) => parser.advance(app, &buf),
                Err(Errno::WOULDBLOCK) => (),
                Err(err) => Err(err)?,
            }
            Ok(PostAction::Continue)
        },
    )?;

    event_loop.run(None, &mut app, |app| {
        if !app.has_error() {
            let res = app.redraw().context("error redrawing");
            app.stop_on_error(res);
        }
    })?;

    app.into_result()
}
