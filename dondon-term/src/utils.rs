use std::io::{self, Write};
use std::panic;

use rustix::termios;

pub struct RestoreTermMode(pub termios::Termios);

impl Drop for RestoreTermMode {
    fn drop(&mut self) {
        let fd = rustix::stdio::stdout();
        if let Err(err) = termios::tcsetattr(fd, termios::OptionalActions::Now, &self.0) {
            eprintln!("error restoring terminal mode: {err:?}");
        };

        // Leave the game screen after leaving raw mode.
        let stdout = io::stdout();
        let _ = leave_game_screen(&mut stdout.lock());
    }
}

/// Enables or disables mouse button and drag reporting in SGR format.
///
/// The editor needs clicks and drags; nothing else reads the mouse.
pub fn set_mouse_reporting(out: &mut impl Write, enabled: bool) -> io::Result<()> {
    if enabled {
        out.write_all(b"\x1B[?1002h\x1B[?1006h")
    } else {
        out.write_all(b"\x1B[?1002l\x1B[?1006l")
    }
}

/// Undoes the terminal setup done on startup, in reverse order.
fn leave_game_screen(out: &mut impl Write) -> io::Result<()> {
    set_mouse_reporting(out, false)?;
    // Pop enable Kitty keyboard protocol. Must be done in the alternate screen since main and
    // alternate screens maintain separate stacks.
    out.write_all(b"\x1B[<u")?;
    // Disable alternate screen buffer.
    out.write_all(b"\x1B[?1049l")?;
    // Show cursor.
    out.write_all(b"\x1B[?25h")?;
    out.flush()
}

pub fn restore_term_mode_on_panic(ios: termios::Termios) {
    let hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Restore before running the default hook so the backtrace is printed properly.
        drop(RestoreTermMode(ios.clone()));

        hook(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mouse_reporting() {
        let mut out = Vec::new();
        set_mouse_reporting(&mut out, true).unwrap();
        assert_eq!(out, b"\x1B[?1002h\x1B[?1006h");

        out.clear();
        set_mouse_reporting(&mut out, false).unwrap();
        assert_eq!(out, b"\x1B[?1002l\x1B[?1006l");
    }

    #[test]
    fn leaving_disables_mouse_before_popping_keyboard_mode() {
        let mut out = Vec::new();
        leave_game_screen(&mut out).unwrap();
        assert_eq!(out, b"\x1B[?1002l\x1B[?1006l\x1B[<u\x1B[?1049l\x1B[?25h");
    }
}
