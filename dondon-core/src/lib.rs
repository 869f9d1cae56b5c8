//! `dondon-core` is a crate that provides the timing and judgement logic for a taiko-style rhythm
//! game, together with the editing operations of its chart editor.
//!
//! Nothing here touches the filesystem, the audio output or the terminal. The playback position
//! comes in through [`clock::PlaybackClock`], and mode changes go out through
//! [`event::EventBus`].

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod chart;
pub mod clock;
pub mod editor;
pub mod event;
pub mod grid;
pub mod in_flight;
pub mod state;
pub mod timing;
