use std::{fs::File, io::BufReader, path::PathBuf};

use anyhow::Context;
use dondon_core::chart::{NoteColor, NoteSize};
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "dump-chart", about = "Prints chart metadata and notes.")]
struct Opt {
    /// Path to a .tko chart file.
    path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();
    let file = File::open(&opt.path).with_context(|| format!("error opening {:?}", opt.path))?;
    let chart = dondon_chart::from_reader(BufReader::new(file))
        .with_context(|| format!("error reading chart {:?}", opt.path))?;

    let meta = &chart.meta;
    println!("difficulty\t{}", meta.difficulty_name);
    println!("bpm\t{}", meta.bpm);
    println!("offset\t{}", meta.offset.into_milli_hundredths());
    println!("notes\t{}", chart.len());
    for note in chart.notes() {
        let kind = match (note.flags.color, note.flags.size) {
            (NoteColor::Don, NoteSize::Normal) => "don",
            (NoteColor::Kat, NoteSize::Normal) => "kat",
            (NoteColor::Don, NoteSize::Big) => "DON",
            (NoteColor::Kat, NoteSize::Big) => "KAT",
        };
        println!("{}\t{kind}", note.timestamp.into_milli_hundredths());
    }

    Ok(())
}
