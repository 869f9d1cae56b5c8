//! Reading and writing of `.tko` charts and `mapset` files.
//!
//! Both formats start with a 4-byte magic and a format version byte, followed by the bincode
//! encoding of the payload. Times are stored as float seconds.

use std::io::{Read, Write};

use bincode::{
    config::{Configuration, Limit, LittleEndian, Varint},
    error::{DecodeError, EncodeError},
    Decode, Encode,
};
use dondon_core::{
    chart::{Chart, ChartMeta, MapSetInfo, Note, NoteFlags},
    grid::BeatGrid,
    timing::Timestamp,
};
use tracing::debug;

mod mapset;
pub use mapset::{list_mapsets, Mapset, CHART_EXTENSION, MAPSET_FILE_NAME};

/// Magic at the start of a chart file.
pub const CHART_MAGIC: [u8; 4] = *b"TKO\0";
/// Magic at the start of a mapset file.
pub const MAPSET_MAGIC: [u8; 4] = *b"TKM\0";
/// Current format version of both files.
pub const FORMAT_VERSION: u8 = 1;

/// Upper bound on the decoded payload size.
const DECODE_LIMIT: usize = 64 * 1024 * 1024;

type FileConfig = Configuration<LittleEndian, Varint, Limit<DECODE_LIMIT>>;

fn config() -> FileConfig {
    bincode::config::standard().with_limit::<DECODE_LIMIT>()
}

/// An error that can occur while reading or writing charts and mapsets.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error")]
    Io(#[from] std::io::Error),
    #[error("error decoding the file")]
    Decoding(#[from] DecodeError),
    #[error("error encoding the file")]
    Encoding(#[from] EncodeError),
    #[error("unexpected file magic {0:?}")]
    BadMagic([u8; 4]),
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),
    #[error("chart is corrupt: {times} note times but {flags} note flags")]
    ChartCorrupt { times: usize, flags: usize },
    #[error("invalid flags {bits:#04x} on note {index}")]
    InvalidFlags { index: usize, bits: u8 },
    #[error("invalid time {time} on note {index}")]
    InvalidTime { index: usize, time: f64 },
    #[error("invalid grid offset {0}")]
    InvalidOffset(f64),
    #[error("notes are not sorted, note {index} is out of order")]
    Unsorted { index: usize },
    #[error("invalid BPM {0}")]
    InvalidBpm(f64),
    #[error("invalid difficulty name {0:?}")]
    InvalidDifficultyName(String),
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
struct RawMeta {
    difficulty_name: String,
    bpm: f64,
    offset: f64,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
struct RawChart {
    meta: RawMeta,
    times: Vec<f64>,
    flags: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
struct RawMapSetInfo {
    title: String,
    artist: String,
}

impl From<&Chart> for RawChart {
    fn from(chart: &Chart) -> Self {
        Self {
            meta: RawMeta {
                difficulty_name: chart.meta.difficulty_name.clone(),
                bpm: chart.meta.bpm,
                offset: chart.meta.offset.as_secs_f64(),
            },
            times: chart.notes().iter().map(|n| n.timestamp.as_secs_f64()).collect(),
            flags: chart.notes().iter().map(|n| n.flags.to_bits()).collect(),
        }
    }
}

impl TryFrom<RawChart> for Chart {
    type Error = Error;

    fn try_from(raw: RawChart) -> Result<Self, Self::Error> {
        if raw.times.len() != raw.flags.len() {
            return Err(Error::ChartCorrupt {
                times: raw.times.len(),
                flags: raw.flags.len(),
            });
        }

        let RawMeta {
            difficulty_name,
            bpm,
            offset,
        } = raw.meta;
        if BeatGrid::new(bpm, Timestamp::zero()).is_err() {
            return Err(Error::InvalidBpm(bpm));
        }
        let offset =
            Timestamp::checked_from_secs_f64(offset).ok_or(Error::InvalidOffset(offset))?;

        let notes = raw
            .times
            .into_iter()
            .zip(raw.flags)
            .enumerate()
            .map(|(index, (time, bits))| {
                let timestamp = Timestamp::checked_from_secs_f64(time)
                    .ok_or(Error::InvalidTime { index, time })?;
                let flags = NoteFlags::from_bits(bits).ok_or(Error::InvalidFlags { index, bits })?;
                Ok(Note::new(timestamp, flags))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let meta = ChartMeta {
            difficulty_name,
            bpm,
            offset,
        };
        Chart::from_notes(meta, notes).map_err(|err| Error::Unsorted { index: err.index })
    }
}

impl From<RawMapSetInfo> for MapSetInfo {
    fn from(raw: RawMapSetInfo) -> Self {
        Self {
            title: raw.title,
            artist: raw.artist,
        }
    }
}

impl From<&MapSetInfo> for RawMapSetInfo {
    fn from(info: &MapSetInfo) -> Self {
        Self {
            title: info.title.clone(),
            artist: info.artist.clone(),
        }
    }
}

fn read_header<R: Read>(reader: &mut R, magic: [u8; 4]) -> Result<(), Error> {
    let mut found = [0; 4];
    reader.read_exact(&mut found)?;
    if found != magic {
        return Err(Error::BadMagic(found));
    }

    let mut version = [0];
    reader.read_exact(&mut version)?;
    if version[0] != FORMAT_VERSION {
        return Err(Error::UnsupportedVersion(version[0]));
    }

    Ok(())
}

fn write_header<W: Write>(writer: &mut W, magic: [u8; 4]) -> Result<(), Error> {
    writer.write_all(&magic)?;
    writer.write_all(&[FORMAT_VERSION])?;
    Ok(())
}

/// Reads a chart from a `.tko` stream.
pub fn from_reader<R: Read>(mut reader: R) -> Result<Chart, Error> {
    read_header(&mut reader, CHART_MAGIC)?;
    let raw: RawChart = bincode::decode_from_std_read(&mut reader, config())?;
    debug!(
        difficulty = %raw.meta.difficulty_name,
        notes = raw.times.len(),
        "decoded chart"
    );
    raw.try_into()
}

/// Writes a chart as a `.tko` stream.
///
/// Selection state is not stored.
pub fn to_writer<W: Write>(mut writer: W, chart: &Chart) -> Result<(), Error> {
    write_header(&mut writer, CHART_MAGIC)?;
    bincode::encode_into_std_write(RawChart::from(chart), &mut writer, config())?;
    Ok(())
}

/// Reads mapset info from a `mapset` stream.
pub fn info_from_reader<R: Read>(mut reader: R) -> Result<MapSetInfo, Error> {
    read_header(&mut reader, MAPSET_MAGIC)?;
    let raw: RawMapSetInfo = bincode::decode_from_std_read(&mut reader, config())?;
    Ok(raw.into())
}

/// Writes mapset info as a `mapset` stream.
pub fn info_to_writer<W: Write>(mut writer: W, info: &MapSetInfo) -> Result<(), Error> {
    write_header(&mut writer, MAPSET_MAGIC)?;
    bincode::encode_into_std_write(RawMapSetInfo::from(info), &mut writer, config())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn encode(magic: [u8; 4], version: u8, raw: &RawChart) -> Vec<u8> {
        let mut buf = magic.to_vec();
        buf.push(version);
        bincode::encode_into_std_write(raw, &mut buf, config()).unwrap();
        buf
    }

    fn raw(times: Vec<f64>, flags: Vec<u8>) -> RawChart {
        RawChart {
            meta: RawMeta {
                difficulty_name: "Oni".to_owned(),
                bpm: 150.,
                offset: -0.05,
            },
            times,
            flags,
        }
    }

    #[test]
    fn decodes_valid_chart() {
        let buf = encode(CHART_MAGIC, 1, &raw(vec![0.5, 1.0, 1.0], vec![0, 3, 1]));
        let chart = from_reader(&buf[..]).unwrap();

        assert_eq!(chart.meta.difficulty_name, "Oni");
        assert_eq!(chart.meta.offset, Timestamp::from_millis(-50));
        let flags: Vec<_> = chart.notes().iter().map(|n| n.flags).collect();
        assert_eq!(flags, [NoteFlags::DON, NoteFlags::BIG_KAT, NoteFlags::KAT]);
    }

    #[test]
    fn rejects_length_mismatch() {
        let buf = encode(CHART_MAGIC, 1, &raw(vec![0.5, 1.0], vec![0]));
        assert!(matches!(
            from_reader(&buf[..]),
            Err(Error::ChartCorrupt { times: 2, flags: 1 })
        ));
    }

    #[test]
    fn rejects_invalid_flags() {
        let buf = encode(CHART_MAGIC, 1, &raw(vec![0.5, 1.0], vec![0, 4]));
        assert!(matches!(
            from_reader(&buf[..]),
            Err(Error::InvalidFlags { index: 1, bits: 4 })
        ));
    }

    #[test]
    fn rejects_unsorted_and_non_finite_times() {
        let buf = encode(CHART_MAGIC, 1, &raw(vec![1.0, 0.5], vec![0, 0]));
        assert!(matches!(from_reader(&buf[..]), Err(Error::Unsorted { index: 1 })));

        let buf = encode(CHART_MAGIC, 1, &raw(vec![f64::NAN], vec![0]));
        assert!(matches!(from_reader(&buf[..]), Err(Error::InvalidTime { index: 0, .. })));
    }

    #[test]
    fn rejects_times_out_of_timestamp_range() {
        let buf = encode(CHART_MAGIC, 1, &raw(vec![0.5, 1e9], vec![0, 0]));
        assert!(matches!(
            from_reader(&buf[..]),
            Err(Error::InvalidTime { index: 1, time }) if time == 1e9
        ));

        let buf = encode(CHART_MAGIC, 1, &raw(vec![-30_000.], vec![0]));
        assert!(matches!(from_reader(&buf[..]), Err(Error::InvalidTime { index: 0, .. })));
    }

    #[test]
    fn rejects_invalid_offset() {
        let mut chart = raw(vec![1.0], vec![0]);
        chart.meta.offset = -100_000.;
        let buf = encode(CHART_MAGIC, 1, &chart);
        assert!(matches!(
            from_reader(&buf[..]),
            Err(Error::InvalidOffset(offset)) if offset == -100_000.
        ));

        chart.meta.offset = f64::INFINITY;
        let buf = encode(CHART_MAGIC, 1, &chart);
        assert!(matches!(from_reader(&buf[..]), Err(Error::InvalidOffset(_))));
    }

    #[test]
    fn rejects_invalid_bpm() {
        let mut chart = raw(vec![], vec![]);
        chart.meta.bpm = 0.;
        let buf = encode(CHART_MAGIC, 1, &chart);
        assert!(matches!(from_reader(&buf[..]), Err(Error::InvalidBpm(_))));
    }

    #[test]
    fn rejects_bad_header() {
        let chart = raw(vec![], vec![]);

        let buf = encode(MAPSET_MAGIC, 1, &chart);
        assert!(matches!(from_reader(&buf[..]), Err(Error::BadMagic(m)) if m == MAPSET_MAGIC));

        let buf = encode(CHART_MAGIC, 2, &chart);
        assert!(matches!(from_reader(&buf[..]), Err(Error::UnsupportedVersion(2))));

        assert!(matches!(from_reader(&b"TK"[..]), Err(Error::Io(_))));
    }

    #[test]
    fn rejects_truncated_payload() {
        let mut buf = encode(CHART_MAGIC, 1, &raw(vec![0.5, 1.0], vec![0, 0]));
        buf.truncate(buf.len() - 3);
        assert!(matches!(from_reader(&buf[..]), Err(Error::Decoding(_))));
    }
}
