//! Functionality related to charts and mapsets.
use alloc::{string::String, vec::Vec};

#[cfg(test)]
use proptest::prelude::*;
#[cfg(test)]
use proptest_derive::Arbitrary;

use crate::timing::Timestamp;

/// Color of a note, which decides the drum surface it must be hit with.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(test, derive(Arbitrary))]
pub enum NoteColor {
    /// Hit on the drum face.
    Don,
    /// Hit on the drum rim.
    Kat,
}

/// Size of a note.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(test, derive(Arbitrary))]
pub enum NoteSize {
    /// A regular note.
    Normal,
    /// A big note.
    Big,
}

/// Properties of a note.
///
/// On disk this is packed into a byte where bit 0 is the color and bit 1 is the size.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(test, derive(Arbitrary))]
pub struct NoteFlags {
    /// Color of the note.
    pub color: NoteColor,
    /// Size of the note.
    pub size: NoteSize,
}

impl NoteFlags {
    /// Bit set for [`NoteColor::Kat`].
    pub const COLOR_KAT: u8 = 0b01;
    /// Bit set for [`NoteSize::Big`].
    pub const SIZE_BIG: u8 = 0b10;
    /// All valid bits.
    pub const ALL: u8 = Self::COLOR_KAT | Self::SIZE_BIG;

    /// A normal don.
    pub const DON: Self = Self::new(NoteColor::Don, NoteSize::Normal);
    /// A normal kat.
    pub const KAT: Self = Self::new(NoteColor::Kat, NoteSize::Normal);
    /// A big don.
    pub const BIG_DON: Self = Self::new(NoteColor::Don, NoteSize::Big);
    /// A big kat.
    pub const BIG_KAT: Self = Self::new(NoteColor::Kat, NoteSize::Big);

    /// Creates new `NoteFlags`.
    #[inline]
    pub const fn new(color: NoteColor, size: NoteSize) -> Self {
        Self { color, size }
    }

    /// Packs the flags into a byte.
    #[inline]
    pub fn to_bits(self) -> u8 {
        let mut bits = 0;
        if self.color == NoteColor::Kat {
            bits |= Self::COLOR_KAT;
        }
        if self.size == NoteSize::Big {
            bits |= Self::SIZE_BIG;
        }
        bits
    }

    /// Unpacks the flags from a byte.
    ///
    /// Returns `None` if any bit outside of [`NoteFlags::ALL`] is set.
    #[inline]
    pub fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::ALL != 0 {
            return None;
        }

        let color = if bits & Self::COLOR_KAT != 0 {
            NoteColor::Kat
        } else {
            NoteColor::Don
        };
        let size = if bits & Self::SIZE_BIG != 0 {
            NoteSize::Big
        } else {
            NoteSize::Normal
        };
        Some(Self { color, size })
    }
}

impl Default for NoteFlags {
    #[inline]
    fn default() -> Self {
        Self::DON
    }
}

/// A note in a chart.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(test, derive(Arbitrary))]
pub struct Note {
    /// The timestamp at which this note should be hit.
    pub timestamp: Timestamp,
    /// Color and size of the note.
    pub flags: NoteFlags,
    /// Whether the note is selected in the editor.
    ///
    /// Not used by judgement.
    #[cfg_attr(test, proptest(value = "false"))]
    pub selected: bool,
}

impl Note {
    /// Creates a new unselected note.
    #[inline]
    pub fn new(timestamp: Timestamp, flags: NoteFlags) -> Self {
        Self {
            timestamp,
            flags,
            selected: false,
        }
    }
}

/// Metadata of a chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartMeta {
    /// Difficulty name.
    ///
    /// Used as the file name stem when saving.
    pub difficulty_name: String,
    /// Beats per minute. Must be positive and finite.
    pub bpm: f64,
    /// Timestamp of the first beat of the beat grid. May be negative.
    pub offset: Timestamp,
}

impl Default for ChartMeta {
    fn default() -> Self {
        Self {
            difficulty_name: String::from("Normal"),
            bpm: 120.,
            offset: Timestamp::zero(),
        }
    }
}

/// Information shared by all charts of a song.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct MapSetInfo {
    /// Title of the song.
    pub title: String,
    /// Artist of the song.
    pub artist: String,
}

/// A chart (one difficulty of one song).
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    /// Chart metadata.
    pub meta: ChartMeta,
    /// Notes sorted by timestamp.
    ///
    /// Invariant: sorted in non-decreasing timestamp order.
    notes: Vec<Note>,
}

/// An error returned when indexing past the end of a chart.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct IndexOutOfRange {
    /// The offending index.
    pub index: usize,
    /// Number of notes in the chart.
    pub len: usize,
}

impl core::fmt::Display for IndexOutOfRange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "note index {} out of range for chart of {} notes", self.index, self.len)
    }
}

/// An error returned from [`Chart::from_notes()`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct UnsortedNotes {
    /// Index of the first note that is earlier than its predecessor.
    pub index: usize,
}

impl Chart {
    /// Creates an empty chart.
    #[inline]
    pub fn new(meta: ChartMeta) -> Self {
        Self {
            meta,
            notes: Vec::new(),
        }
    }

    /// Creates a chart from notes which are already sorted by timestamp.
    pub fn from_notes(meta: ChartMeta, notes: Vec<Note>) -> Result<Self, UnsortedNotes> {
        if let Some(index) = notes
            .windows(2)
            .position(|ab| ab[0].timestamp > ab[1].timestamp)
        {
            return Err(UnsortedNotes { index: index + 1 });
        }

        Ok(Self { meta, notes })
    }

    /// Returns the notes.
    #[inline]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Returns the note at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Note> {
        self.notes.get(index)
    }

    /// Returns the number of notes.
    #[inline]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Returns `true` if the chart has no notes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Returns the timestamp of the first note.
    #[inline]
    pub fn first_timestamp(&self) -> Option<Timestamp> {
        self.notes.first().map(|note| note.timestamp)
    }

    /// Returns the timestamp of the last note.
    #[inline]
    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.notes.last().map(|note| note.timestamp)
    }

    /// Returns `true` if the notes are sorted by timestamp.
    pub fn is_sorted(&self) -> bool {
        self.notes
            .windows(2)
            .all(|ab| ab[0].timestamp <= ab[1].timestamp)
    }

    /// Inserts a note, keeping the notes sorted, and returns its index.
    ///
    /// A note with the same timestamp as existing notes goes after them.
    pub fn insert(&mut self, note: Note) -> usize {
        let index = self.upper_bound(note.timestamp);
        self.notes.insert(index, note);
        index
    }

    /// Removes and returns the note at `index`.
    pub fn remove(&mut self, index: usize) -> Result<Note, IndexOutOfRange> {
        if index >= self.notes.len() {
            return Err(IndexOutOfRange {
                index,
                len: self.notes.len(),
            });
        }

        Ok(self.notes.remove(index))
    }

    /// Returns the index of the first note with a timestamp greater than `timestamp`.
    #[inline]
    pub fn upper_bound(&self, timestamp: Timestamp) -> usize {
        self.notes.partition_point(|note| note.timestamp <= timestamp)
    }

    /// Returns the index of the first note with a timestamp greater or equal to `timestamp`.
    #[inline]
    pub fn lower_bound(&self, timestamp: Timestamp) -> usize {
        self.notes.partition_point(|note| note.timestamp < timestamp)
    }

    /// Marks or unmarks the note at `index` as selected.
    pub fn set_selected(&mut self, index: usize, selected: bool) -> Result<(), IndexOutOfRange> {
        let len = self.notes.len();
        let note = self
            .notes
            .get_mut(index)
            .ok_or(IndexOutOfRange { index, len })?;
        note.selected = selected;
        Ok(())
    }

    /// Deselects every note.
    pub fn clear_selection(&mut self) {
        for note in &mut self.notes {
            note.selected = false;
        }
    }

    /// Returns an iterator over indices of the selected notes.
    pub fn selected_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.notes
            .iter()
            .enumerate()
            .filter(|(_, note)| note.selected)
            .map(|(i, _)| i)
    }

    /// Removes every selected note and returns how many were removed.
    pub fn remove_selected(&mut self) -> usize {
        let before = self.notes.len();
        self.notes.retain(|note| !note.selected);
        before - self.notes.len()
    }

    /// Sets the flags of every selected note.
    pub fn set_selected_flags(&mut self, flags: NoteFlags) {
        for note in self.notes.iter_mut().filter(|note| note.selected) {
            note.flags = flags;
        }
    }

    /// Mutable access to the notes for operations that don't move them in time.
    #[inline]
    pub(crate) fn notes_mut(&mut self) -> &mut [Note] {
        &mut self.notes
    }
}

#[cfg(test)]
pub(crate) fn arbitrary_sorted_notes(
    max_len: usize,
) -> impl proptest::strategy::Strategy<Value = Vec<Note>> {
    proptest::collection::vec(
        (-100_000..10_000_000i32, any::<NoteFlags>()),
        0..max_len,
    )
    .prop_map(|mut notes| {
        notes.sort_unstable_by_key(|(t, _)| *t);
        notes
            .into_iter()
            .map(|(t, flags)| Note::new(Timestamp(t), flags))
            .collect()
    })
}
