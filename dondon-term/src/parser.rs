use bitflags::bitflags;
use tracing::{trace, warn};

use crate::app::App;

pub struct Parser {
    vte: vte::Parser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Escape,
    Tab,
    Backspace,
    Delete,
    Up,
    Down,
    Left,
    Right,
    F3,
    F4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseKind {
    Press,
    SecondaryPress,
    Drag,
    Release,
    ScrollUp,
    ScrollDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mouse {
    pub kind: MouseKind,
    /// 1-based column.
    pub col: u16,
    /// 1-based row.
    pub row: u16,
    pub mods: Modifier,
}

#[derive(Debug)]
pub enum Event {
    Key {
        key: Key,
        mods: Modifier,
        release: bool,
    },
    Mouse(Mouse),
    KittyKeyboardSupported,
    PrimaryDeviceAttributes,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Modifier : u16 {
        const Shift = 1;
        const Alt = 1 << 1;
        const Ctrl = 1 << 2;
        const Super = 1 << 3;
        const Hyper = 1 << 4;
        const Meta = 1 << 5;

        // We don't care about these two.
        // const CapsLock = 1 << 6;
        // const NumLock = 1 << 7;
    }
}

struct Performer<'a>(&'a mut App);

impl Parser {
    pub fn new() -> Self {
        Self {
            vte: vte::Parser::new(),
        }
    }

    pub fn advance(&mut self, app: &mut App, bytes: &[u8]) {
        self.vte.advance(&mut Performer(app), bytes);
    }
}

impl vte::Perform for Performer<'_> {
    fn print(&mut self, _c: char) {}

    fn execute(&mut self, _byte: u8) {}

    fn hook(&mut self, _params: &vte::Params, _intermediates: &[u8], _ignore: bool, _action: char) {
    }

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {}

    fn csi_dispatch(
        &mut self,
        params: &vte::Params,
        intermediates: &[u8],
        ignore: bool,
        action: char,
    ) {
        trace!(?params, ?intermediates, ignore, %action, "csi dispatch");

        if ignore {
            return;
        }

        let event = match action {
            'u' => {
                if intermediates == b"?" {
                    Event::KittyKeyboardSupported
                } else if intermediates.is_empty() {
                    // Key event.
                    let mut params = params.iter();
                    let Some(key) = params.next() else {
                        warn!("no unicode-key-code param");
                        return;
                    };

                    // Try to get base-layout-key, fall back to unicode-key-code.
                    let Some(code) = key.get(2).or(key.get(0)) else {
                        warn!("no unicode-key-code argument");
                        return;
                    };
                    let Some(key) = key_from_code(u32::from(*code)) else {
                        warn!(code, "invalid codepoint");
                        return;
                    };

                    let Some((mods, release)) = parse_mods_release(params.next()) else {
                        return;
                    };

                    Event::Key { key, mods, release }
                } else {
                    return;
                }
            }
            '~' if intermediates.is_empty() => {
                let mut params = params.iter();
                let Some([key, ..]) = params.next() else {
                    return;
                };

                let key = match key {
                    3 => Key::Delete,
                    13 => Key::F3,
                    14 => Key::F4,
                    _ => return,
                };

                let Some((mods, release)) = parse_mods_release(params.next()) else {
                    return;
                };

                Event::Key { key, mods, release }
            }
            'A' | 'B' | 'C' | 'D' | 'S' if intermediates.is_empty() => {
                let mut params = params.iter();
                // The first param is always 1 when present.
                let _ = params.next();

                let key = match action {
                    'A' => Key::Up,
                    'B' => Key::Down,
                    'C' => Key::Right,
                    'D' => Key::Left,
                    _ => Key::F4,
                };

                let Some((mods, release)) = parse_mods_release(params.next()) else {
                    return;
                };

                Event::Key { key, mods, release }
            }
            'M' | 'm' if intermediates == b"<" => {
                let Some(mouse) = parse_sgr_mouse(params.iter(), action == 'm') else {
                    return;
                };
                Event::Mouse(mouse)
            }
            'c' => {
                if intermediates == b"?" {
                    Event::PrimaryDeviceAttributes
                } else {
                    return;
                }
            }
            _ => return,
        };

        let res = self.0.event(event);
        self.0.stop_on_error(res);
    }

    fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, _byte: u8) {}

    fn terminated(&self) -> bool {
        false
    }
}

fn key_from_code(code: u32) -> Option<Key> {
    let key = match code {
        9 => Key::Tab,
        13 => Key::Enter,
        27 => Key::Escape,
        127 => Key::Backspace,
        _ => Key::Char(char::from_u32(code)?),
    };
    Some(key)
}

fn parse_mods_release(opts: Option<&[u16]>) -> Option<(Modifier, bool)> {
    let mut mods = Modifier::empty();
    let mut release = false;
    if let Some(opts) = opts {
        if let Some(x) = opts.first() {
            if *x == 0 {
                warn!("invalid key modifier = 0");
            } else {
                mods = Modifier::from_bits_truncate(x - 1);
            }
        }

        match opts.get(1) {
            // Key repeat.
            Some(2) => return None,
            // Key release.
            Some(3) => release = true,
            // Key press.
            Some(1) | None => (),
            // Unrecognized.
            Some(x) => {
                warn!("unrecognized event type: {x}");
                return None;
            }
        }
    }
    Some((mods, release))
}

/// Parses an SGR mouse report: `CSI < button ; col ; row M` (or `m` on release).
fn parse_sgr_mouse<'a>(
    mut params: impl Iterator<Item = &'a [u16]>,
    release: bool,
) -> Option<Mouse> {
    let [button, ..] = params.next()? else {
        return None;
    };
    let [col, ..] = params.next()? else {
        return None;
    };
    let [row, ..] = params.next()? else {
        return None;
    };

    let mut mods = Modifier::empty();
    if button & 4 != 0 {
        mods |= Modifier::Shift;
    }
    if button & 8 != 0 {
        mods |= Modifier::Alt;
    }
    if button & 16 != 0 {
        mods |= Modifier::Ctrl;
    }

    let motion = button & 32 != 0;
    let wheel = button & 64 != 0;
    let kind = match (button & 3, wheel, motion, release) {
        (0, true, ..) => MouseKind::ScrollUp,
        (1, true, ..) => MouseKind::ScrollDown,
        (_, true, ..) => return None,
        (0, false, _, true) => MouseKind::Release,
        (0, false, true, false) => MouseKind::Drag,
        (0, false, false, false) => MouseKind::Press,
        (2, false, false, false) => MouseKind::SecondaryPress,
        _ => return None,
    };

    Some(Mouse {
        kind,
        col: *col,
        row: *row,
        mods,
    })
}
