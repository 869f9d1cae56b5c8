//! Chart editing: snapped insertion, removal, seeking and box selection.
use crate::{
    chart::{Chart, IndexOutOfRange, Note, NoteFlags},
    clock::PlaybackClock,
    event::Transition,
    grid::{BeatGrid, InvalidBpm},
    timing::Timestamp,
};

/// Vertical position of the note track in selection space.
///
/// All notes sit on this lane; a selection box must enclose it to select anything.
pub const NOTE_LANE: f64 = 0.;

/// Editor interaction mode.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum EditMode {
    /// Clicking and dragging selects notes.
    #[default]
    Select,
    /// Clicking inserts notes.
    Insert,
}

impl EditMode {
    /// Returns the other mode.
    #[inline]
    pub fn toggled(self) -> Self {
        match self {
            Self::Select => Self::Insert,
            Self::Insert => Self::Select,
        }
    }
}

/// An error returned from [`Editor::try_insert()`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum InsertError {
    /// An existing note is within the collision range of the snapped position.
    Collision {
        /// Index of the colliding note.
        index: usize,
        /// The snapped position the note would have been inserted at.
        timestamp: Timestamp,
    },
}

impl core::fmt::Display for InsertError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Collision { index, timestamp } => write!(
                f,
                "note at {:.3} s collides with note {}",
                timestamp.as_secs_f64(),
                index
            ),
        }
    }
}

/// A box in (time, lane) space.
///
/// Bounds are normalized so that `start <= end` on both axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionBox {
    /// Earlier time bound.
    pub time_start: Timestamp,
    /// Later time bound.
    pub time_end: Timestamp,
    /// Lower lane bound.
    pub lane_start: f64,
    /// Upper lane bound.
    pub lane_end: f64,
}

impl SelectionBox {
    /// Creates a box spanned by two opposite corners.
    pub fn from_corners(a: (Timestamp, f64), b: (Timestamp, f64)) -> Self {
        Self {
            time_start: a.0.min(b.0),
            time_end: a.0.max(b.0),
            lane_start: a.1.min(b.1),
            lane_end: a.1.max(b.1),
        }
    }

    /// Returns `true` if the point lies strictly inside the box.
    #[inline]
    pub fn contains(&self, timestamp: Timestamp, lane: f64) -> bool {
        self.time_start < timestamp
            && timestamp < self.time_end
            && self.lane_start < lane
            && lane < self.lane_end
    }
}

/// Result of [`Editor::pointer_down()`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ClickOutcome {
    /// A note was inserted at this index.
    Inserted(usize),
    /// The insertion was rejected.
    Rejected(InsertError),
    /// A selection drag has started.
    DragStarted,
}

/// The chart editor.
///
/// Owns the chart while it is being edited.
#[derive(Debug, Clone)]
pub struct Editor {
    chart: Chart,
    grid: BeatGrid,
    mode: EditMode,
    /// Anchor corner of the selection drag in progress.
    drag: Option<(Timestamp, f64)>,
    selection_box: Option<SelectionBox>,
    dirty: bool,
}

impl Editor {
    /// Creates an editor for `chart`.
    pub fn new(chart: Chart) -> Result<Self, InvalidBpm> {
        let grid = BeatGrid::from_meta(&chart.meta)?;

        Ok(Self {
            chart,
            grid,
            mode: EditMode::default(),
            drag: None,
            selection_box: None,
            dirty: false,
        })
    }

    /// Returns the chart being edited.
    #[inline]
    pub fn chart(&self) -> &Chart {
        &self.chart
    }

    /// Consumes the editor and returns the chart.
    #[inline]
    pub fn into_chart(self) -> Chart {
        self.chart
    }

    /// Returns the beat grid.
    #[inline]
    pub fn grid(&self) -> &BeatGrid {
        &self.grid
    }

    /// Returns the current mode.
    #[inline]
    pub fn mode(&self) -> EditMode {
        self.mode
    }

    /// Switches to `mode`, cancelling any drag in progress.
    pub fn set_mode(&mut self, mode: EditMode) {
        if self.mode != mode {
            self.drag = None;
            self.selection_box = None;
        }
        self.mode = mode;
    }

    /// Switches between select and insert modes.
    #[inline]
    pub fn toggle_mode(&mut self) {
        self.set_mode(self.mode.toggled());
    }

    /// Returns `true` if the chart changed since the editor was created or last saved.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Marks the chart as saved.
    #[inline]
    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// Changes the BPM of the chart and rebuilds the grid. Notes are not moved.
    pub fn set_bpm(&mut self, bpm: f64) -> Result<(), InvalidBpm> {
        self.grid = BeatGrid::new(bpm, self.grid.offset())?;
        self.chart.meta.bpm = bpm;
        self.dirty = true;
        Ok(())
    }

    /// Changes the grid offset of the chart. Notes are not moved.
    pub fn set_offset(&mut self, offset: Timestamp) {
        // The BPM was already validated.
        self.grid = BeatGrid::new(self.grid.bpm(), offset).unwrap_or(self.grid);
        self.chart.meta.offset = offset;
        self.dirty = true;
    }

    /// Snaps `timestamp` to the nearest grid line.
    #[inline]
    pub fn snap(&self, timestamp: Timestamp) -> Timestamp {
        self.grid.snap(timestamp)
    }

    /// Inserts a note at the grid line nearest to `timestamp`.
    ///
    /// Returns the index of the new note. Nothing changes if the snapped position collides with
    /// an existing note.
    pub fn try_insert(&mut self, timestamp: Timestamp, flags: NoteFlags) -> Result<usize, InsertError> {
        let timestamp = self.snap(timestamp);
        if let Some(index) = self.grid.collision(&self.chart, timestamp) {
            return Err(InsertError::Collision { index, timestamp });
        }

        self.dirty = true;
        Ok(self.chart.insert(Note::new(timestamp, flags)))
    }

    /// Removes the note at `index`.
    pub fn remove(&mut self, index: usize) -> Result<Note, IndexOutOfRange> {
        let note = self.chart.remove(index)?;
        self.dirty = true;
        Ok(note)
    }

    /// Removes the note colliding with `timestamp`, if any.
    pub fn remove_at(&mut self, timestamp: Timestamp) -> Option<Note> {
        let index = self.grid.collision(&self.chart, timestamp)?;
        self.remove(index).ok()
    }

    /// Removes every selected note and returns how many were removed.
    pub fn delete_selected(&mut self) -> usize {
        let removed = self.chart.remove_selected();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    /// Changes the flags of every selected note.
    pub fn set_selected_flags(&mut self, flags: NoteFlags) {
        if self.chart.selected_indices().next().is_some() {
            self.chart.set_selected_flags(flags);
            self.dirty = true;
        }
    }

    /// Moves playback `steps` grid lines back from the line nearest to the current position.
    ///
    /// Returns the new position.
    pub fn seek(&self, clock: &mut impl PlaybackClock, steps: i64) -> Timestamp {
        let target = self.grid.seek(clock.elapsed(), steps);
        clock.seek(target);
        target
    }

    /// Handles a pointer press at `(timestamp, lane)`.
    ///
    /// In insert mode this inserts a note with `flags`; in select mode this starts a drag.
    pub fn pointer_down(&mut self, timestamp: Timestamp, lane: f64, flags: NoteFlags) -> ClickOutcome {
        match self.mode {
            EditMode::Insert => match self.try_insert(timestamp, flags) {
                Ok(index) => ClickOutcome::Inserted(index),
                Err(err) => ClickOutcome::Rejected(err),
            },
            EditMode::Select => {
                self.drag = Some((timestamp, lane));
                self.update_selection(timestamp, lane);
                ClickOutcome::DragStarted
            }
        }
    }

    /// Handles pointer motion during a drag.
    ///
    /// Replaces the selection with the notes inside the current box and returns their count.
    pub fn pointer_motion(&mut self, timestamp: Timestamp, lane: f64) -> usize {
        if self.drag.is_none() {
            return 0;
        }
        self.update_selection(timestamp, lane)
    }

    /// Ends the drag in progress and returns its final box.
    pub fn pointer_up(&mut self) -> Option<SelectionBox> {
        self.drag = None;
        self.selection_box.take()
    }

    /// Returns the box of the drag in progress.
    #[inline]
    pub fn selection_box(&self) -> Option<&SelectionBox> {
        self.selection_box.as_ref()
    }

    fn update_selection(&mut self, timestamp: Timestamp, lane: f64) -> usize {
        let Some(anchor) = self.drag else {
            return 0;
        };

        let selection = SelectionBox::from_corners(anchor, (timestamp, lane));
        self.selection_box = Some(selection);

        let mut count = 0;
        for note in self.chart.notes_mut() {
            note.selected = selection.contains(note.timestamp, NOTE_LANE);
            count += usize::from(note.selected);
        }
        count
    }

    /// Builds a request to test-play a copy of the chart from the current playback position.
    pub fn test_play(&self, clock: &impl PlaybackClock) -> Transition {
        let mut chart = self.chart.clone();
        chart.clear_selection();
        Transition::StartTestPlay {
            chart,
            start: clock.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chart::{arbitrary_sorted_notes, ChartMeta},
        clock::ManualClock,
    };
    use alloc::vec::Vec;
    use proptest::prelude::*;

    fn secs(x: f64) -> Timestamp {
        Timestamp::from_secs_f64(x)
    }

    fn editor() -> Editor {
        Editor::new(Chart::new(ChartMeta::default())).unwrap()
    }

    #[test]
    fn insert_snaps_and_rejects_collisions() {
        let mut editor = editor();
        assert_eq!(editor.try_insert(secs(0.17), NoteFlags::DON), Ok(0));
        assert_eq!(editor.chart().notes()[0].timestamp, secs(0.125));
        assert!(editor.is_dirty());

        // Snaps to the same line.
        assert_eq!(
            editor.try_insert(secs(0.1), NoteFlags::KAT),
            Err(InsertError::Collision {
                index: 0,
                timestamp: secs(0.125),
            })
        );
        assert_eq!(editor.chart().len(), 1);

        assert_eq!(editor.try_insert(secs(0.2), NoteFlags::KAT), Ok(1));
        assert_eq!(editor.try_insert(secs(0.0), NoteFlags::KAT), Ok(0));
        assert!(editor.chart().is_sorted());
    }

    #[test]
    fn insert_next_to_off_grid_note() {
        let mut chart = Chart::new(ChartMeta::default());
        chart.insert(Note::new(secs(0.19), NoteFlags::DON));
        let mut editor = Editor::new(chart).unwrap();

        // 0.2 snaps to 0.25, which is 0.06 away from 0.19.
        assert_eq!(
            editor.try_insert(secs(0.2), NoteFlags::DON),
            Err(InsertError::Collision {
                index: 0,
                timestamp: secs(0.25),
            })
        );
        assert!(!editor.is_dirty());
    }

    #[test]
    fn remove() {
        let mut editor = editor();
        editor.try_insert(secs(0.5), NoteFlags::DON).unwrap();
        editor.mark_saved();

        assert!(editor.remove(1).is_err());
        assert!(!editor.is_dirty());
        assert_eq!(editor.remove_at(secs(0.52)).map(|x| x.timestamp), Some(secs(0.5)));
        assert!(editor.chart().is_empty());
        assert!(editor.is_dirty());
    }

    #[test]
    fn seek_moves_clock() {
        let editor = editor();
        let mut clock = ManualClock::new(secs(1.01));

        assert_eq!(editor.seek(&mut clock, 2), secs(0.75));
        assert_eq!(clock.elapsed(), secs(0.75));
        assert_eq!(editor.seek(&mut clock, -8), secs(1.75));
    }

    #[test]
    fn mode_toggle() {
        let mut editor = editor();
        assert_eq!(editor.mode(), EditMode::Select);
        editor.toggle_mode();
        assert_eq!(editor.mode(), EditMode::Insert);
        editor.toggle_mode();
        assert_eq!(editor.mode(), EditMode::Select);
    }

    #[test]
    fn click_in_insert_mode_inserts() {
        let mut editor = editor();
        editor.set_mode(EditMode::Insert);

        assert_eq!(
            editor.pointer_down(secs(1.0), 0., NoteFlags::BIG_KAT),
            ClickOutcome::Inserted(0)
        );
        assert!(matches!(
            editor.pointer_down(secs(1.01), 0., NoteFlags::DON),
            ClickOutcome::Rejected(InsertError::Collision { index: 0, .. })
        ));
        assert_eq!(editor.pointer_up(), None);
    }

    #[test]
    fn drag_replaces_selection() {
        let mut editor = editor();
        for i in 0..8 {
            editor.try_insert(secs(f64::from(i) * 0.25), NoteFlags::DON).unwrap();
        }

        assert_eq!(
            editor.pointer_down(secs(0.1), -1., NoteFlags::DON),
            ClickOutcome::DragStarted
        );
        assert_eq!(editor.pointer_motion(secs(0.6), 1.), 2);
        assert_eq!(editor.chart().selected_indices().collect::<Vec<_>>(), [1, 2]);

        // Moving the box drops notes that are no longer inside.
        assert_eq!(editor.pointer_motion(secs(-1.), 1.), 1);
        assert_eq!(editor.chart().selected_indices().collect::<Vec<_>>(), [0]);

        // A box that doesn't enclose the note lane selects nothing.
        assert_eq!(editor.pointer_motion(secs(2.), -0.5), 0);

        assert_eq!(editor.pointer_motion(secs(1.), 1.), 3);
        let selection = editor.pointer_up().unwrap();
        assert_eq!(selection.time_start, secs(0.1));
        assert_eq!(selection.time_end, secs(1.));
        assert_eq!(editor.pointer_motion(secs(2.), 1.), 0);
        assert_eq!(editor.chart().selected_indices().count(), 3);
    }

    #[test]
    fn box_bounds_are_strict() {
        let selection = SelectionBox::from_corners((secs(1.), 1.), (secs(0.5), -1.));
        assert!(selection.contains(secs(0.75), NOTE_LANE));
        assert!(!selection.contains(secs(0.5), NOTE_LANE));
        assert!(!selection.contains(secs(1.), NOTE_LANE));
        assert!(!selection.contains(secs(0.75), 1.));
    }

    #[test]
    fn selected_notes_editing() {
        let mut editor = editor();
        for i in 0..4 {
            editor.try_insert(secs(f64::from(i)), NoteFlags::DON).unwrap();
        }
        editor.pointer_down(secs(0.5), -1., NoteFlags::DON);
        editor.pointer_motion(secs(2.5), 1.);
        editor.pointer_up();

        editor.set_selected_flags(NoteFlags::KAT);
        assert_eq!(editor.chart().notes()[1].flags, NoteFlags::KAT);
        assert_eq!(editor.chart().notes()[3].flags, NoteFlags::DON);

        assert_eq!(editor.delete_selected(), 2);
        assert_eq!(editor.chart().len(), 2);
    }

    #[test]
    fn test_play_copies_chart() {
        let mut editor = editor();
        editor.try_insert(secs(1.), NoteFlags::DON).unwrap();
        editor.chart.set_selected(0, true).unwrap();
        let clock = ManualClock::new(secs(0.5));

        match editor.test_play(&clock) {
            Transition::StartTestPlay { chart, start } => {
                assert_eq!(start, secs(0.5));
                assert_eq!(chart.len(), 1);
                assert_eq!(chart.selected_indices().count(), 0);
            }
            other => panic!("unexpected transition {other:?}"),
        }
        assert_eq!(editor.chart().selected_indices().count(), 1);
    }

    #[test]
    fn bpm_changes_rebuild_grid() {
        let mut editor = editor();
        assert!(editor.set_bpm(0.).is_err());
        editor.set_bpm(60.).unwrap();
        assert_eq!(editor.grid().quarter_interval(), 0.25);
        assert_eq!(editor.chart().meta.bpm, 60.);

        editor.set_offset(secs(0.1));
        assert_eq!(editor.snap(secs(0.)), secs(0.1));
        assert_eq!(editor.snap(secs(-0.1)), secs(-0.15));
    }

    proptest! {
        #[test]
        fn inserts_never_collide(times in proptest::collection::vec(-100_000..1_000_000i32, 0..100)) {
            let mut editor = editor();
            for t in times {
                let _ = editor.try_insert(Timestamp(t), NoteFlags::DON);
            }

            let notes = editor.chart().notes();
            prop_assert!(editor.chart().is_sorted());
            for pair in notes.windows(2) {
                prop_assert!((pair[1].timestamp - pair[0].timestamp).as_secs_f64() >= editor.grid().collision_range());
            }
        }

        #[test]
        fn drag_selects_exactly_the_notes_inside(
            notes in arbitrary_sorted_notes(50),
            a in -100_000..10_000_000i32,
            b in -100_000..10_000_000i32,
        ) {
            let chart = Chart::from_notes(ChartMeta::default(), notes).unwrap();
            let mut editor = Editor::new(chart).unwrap();
            editor.pointer_down(Timestamp(a), -1., NoteFlags::DON);
            editor.pointer_motion(Timestamp(b), 1.);

            let (lo, hi) = (a.min(b), a.max(b));
            for note in editor.chart().notes() {
                prop_assert_eq!(note.selected, lo < note.timestamp.0 && note.timestamp.0 < hi);
            }
        }
    }
}
