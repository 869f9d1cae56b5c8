//! Mapset directories: one directory per song with a `mapset` file and `.tko` charts.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use dondon_core::chart::{Chart, MapSetInfo};
use tracing::{debug, info, warn};

use crate::{from_reader, info_from_reader, info_to_writer, to_writer, Error};

/// Name of the mapset info file inside a mapset directory.
pub const MAPSET_FILE_NAME: &str = "mapset";
/// Extension of chart files.
pub const CHART_EXTENSION: &str = "tko";

/// A song directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapset {
    /// Path to the directory.
    pub path: PathBuf,
    /// Song information.
    pub info: MapSetInfo,
    /// Difficulty names of the charts, sorted.
    ///
    /// Each one corresponds to a `<name>.tko` file in the directory.
    pub difficulties: Vec<String>,
}

impl Mapset {
    /// Loads the mapset info and the list of charts from `path`.
    ///
    /// Charts themselves are loaded on demand with [`Mapset::load_chart()`].
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();

        let file = File::open(path.join(MAPSET_FILE_NAME))?;
        let info = info_from_reader(BufReader::new(file))?;

        let mut difficulties = Vec::new();
        for entry in fs::read_dir(&path)? {
            let entry_path = entry?.path();
            if entry_path.extension().and_then(|x| x.to_str()) != Some(CHART_EXTENSION) {
                continue;
            }
            if let Some(stem) = entry_path.file_stem().and_then(|x| x.to_str()) {
                difficulties.push(stem.to_owned());
            }
        }
        difficulties.sort_unstable();

        debug!(?path, title = %info.title, charts = difficulties.len(), "loaded mapset");

        Ok(Self {
            path,
            info,
            difficulties,
        })
    }

    /// Creates a new mapset directory at `path` with no charts.
    pub fn create(path: impl Into<PathBuf>, info: MapSetInfo) -> Result<Self, Error> {
        let path = path.into();
        fs::create_dir_all(&path)?;

        let mapset = Self {
            path,
            info,
            difficulties: Vec::new(),
        };
        mapset.save_info()?;

        info!(path = ?mapset.path, title = %mapset.info.title, "created mapset");
        Ok(mapset)
    }

    /// Writes the mapset info file.
    pub fn save_info(&self) -> Result<(), Error> {
        write_atomically(&self.path.join(MAPSET_FILE_NAME), |writer| {
            info_to_writer(writer, &self.info)
        })
    }

    /// Returns the path of the chart file for `difficulty_name`.
    pub fn chart_path(&self, difficulty_name: &str) -> Result<PathBuf, Error> {
        validate_difficulty_name(difficulty_name)?;
        Ok(self.path.join(format!("{difficulty_name}.{CHART_EXTENSION}")))
    }

    /// Loads the chart with the given difficulty name.
    pub fn load_chart(&self, difficulty_name: &str) -> Result<Chart, Error> {
        let path = self.chart_path(difficulty_name)?;
        let file = File::open(&path)?;
        let chart = from_reader(BufReader::new(file))?;

        if chart.meta.difficulty_name != difficulty_name {
            warn!(
                ?path,
                stored = %chart.meta.difficulty_name,
                "difficulty name doesn't match the file name"
            );
        }

        Ok(chart)
    }

    /// Saves `chart` as `<difficulty_name>.tko`, replacing any existing file.
    ///
    /// Returns the path of the written file.
    pub fn save_chart(&mut self, chart: &Chart) -> Result<PathBuf, Error> {
        let name = &chart.meta.difficulty_name;
        let path = self.chart_path(name)?;
        write_atomically(&path, |writer| to_writer(writer, chart))?;

        if let Err(index) = self.difficulties.binary_search(name) {
            self.difficulties.insert(index, name.clone());
        }

        info!(?path, notes = chart.len(), "saved chart");
        Ok(path)
    }

    /// Deletes the chart file for `difficulty_name`.
    pub fn delete_chart(&mut self, difficulty_name: &str) -> Result<(), Error> {
        let path = self.chart_path(difficulty_name)?;
        fs::remove_file(&path)?;
        self.difficulties.retain(|x| x != difficulty_name);

        info!(?path, "deleted chart");
        Ok(())
    }
}

fn validate_difficulty_name(name: &str) -> Result<(), Error> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name != MAPSET_FILE_NAME
        && !name.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidDifficultyName(name.to_owned()))
    }
}

/// Writes to a temporary file next to `path`, then renames it over `path`.
fn write_atomically(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> Result<(), Error>,
) -> Result<(), Error> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let mut writer = BufWriter::new(File::create(&tmp_path)?);
    let result = write(&mut writer).and_then(|()| Ok(writer.flush()?));
    drop(writer);

    if let Err(err) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Loads every mapset directory directly under `root`, sorted by title.
///
/// Subdirectories without a `mapset` file are skipped; ones that fail to load are skipped with a
/// warning.
pub fn list_mapsets(root: &Path) -> Result<Vec<Mapset>, Error> {
    let mut mapsets = Vec::new();

    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        if !path.join(MAPSET_FILE_NAME).is_file() {
            continue;
        }

        match Mapset::load(&path) {
            Ok(mapset) => mapsets.push(mapset),
            Err(err) => warn!(?path, "error loading mapset: {err}"),
        }
    }

    mapsets.sort_by(|a, b| {
        a.info
            .title
            .cmp(&b.info.title)
            .then_with(|| a.path.cmp(&b.path))
    });
    Ok(mapsets)
}
