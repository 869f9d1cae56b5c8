//! Mode transition requests passed from the game modes to the host loop.
use alloc::collections::VecDeque;

use crate::{chart::Chart, state::Statistics, timing::Timestamp};

/// A request to switch the game mode.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Open a chart in the editor.
    OpenEditor {
        /// Index of the mapset in the song list.
        mapset: usize,
        /// The chart to edit. Ownership moves to the editor.
        chart: Chart,
    },
    /// Test-play the chart currently in the editor.
    StartTestPlay {
        /// A copy of the chart being edited.
        chart: Chart,
        /// Where to start playback.
        start: Timestamp,
    },
    /// Play a chart from the start.
    StartPlay {
        /// The chart to play.
        chart: Chart,
    },
    /// A regular play session has ended; show its results.
    ShowSummary {
        /// Final statistics of the session.
        stats: Statistics,
    },
    /// Leave test-play and go back to the editor.
    ReturnToEditor,
    /// Go back to the song list.
    ReturnToMenu,
    /// Exit the game.
    Quit,
}

/// Single-producer, single-consumer queue of [`Transition`]s.
///
/// The game modes push requests; the host loop pops and applies them between frames.
#[derive(Debug, Default)]
pub struct EventBus {
    queue: VecDeque<Transition>,
}

impl EventBus {
    /// Creates an empty `EventBus`.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a transition.
    #[inline]
    pub fn push(&mut self, transition: Transition) {
        self.queue.push_back(transition);
    }

    /// Takes the oldest queued transition.
    #[inline]
    pub fn pop(&mut self) -> Option<Transition> {
        self.queue.pop_front()
    }

    /// Returns `true` if nothing is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Takes all queued transitions in order.
    #[inline]
    pub fn drain(&mut self) -> impl Iterator<Item = Transition> + '_ {
        self.queue.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartMeta;
    use alloc::vec::Vec;

    #[test]
    fn fifo_order() {
        let mut bus = EventBus::new();
        bus.push(Transition::StartPlay {
            chart: Chart::new(ChartMeta::default()),
        });
        bus.push(Transition::ReturnToMenu);
        bus.push(Transition::Quit);

        assert!(matches!(bus.pop(), Some(Transition::StartPlay { .. })));
        let rest: Vec<_> = bus.drain().collect();
        assert_eq!(rest, [Transition::ReturnToMenu, Transition::Quit]);
        assert!(bus.is_empty());
        assert_eq!(bus.pop(), None);
    }
}
