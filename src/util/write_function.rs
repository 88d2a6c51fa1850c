use crate::util::chain_types::FrameJob;
use std::{
    fs::OpenOptions,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

/// The path of the side file `{prefix}_{suffix}`.
pub fn side_file(prefix: &str, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}_{}", prefix, suffix))
}

/// Write the table mapping each frame number to the sample index and
/// the iteration label it was drawn from.
pub fn write_frame_table(path: &Path, jobs: &[FrameJob]) -> io::Result<()> {
    let write = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    let mut writer = BufWriter::new(write);

    writeln!(writer, "frame\tposition\titeration\tpath")?;
    for job in jobs {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}",
            job.frame,
            job.position,
            job.iteration,
            job.path.display()
        )?;
    }
    writer.flush()
}

/// Write the run information `info` as pretty-printed JSON.
pub fn write_meta_info(path: &Path, info: &serde_json::Value) -> io::Result<()> {
    let write = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    serde_json::ser::to_writer_pretty(BufWriter::new(write), info)?;
    Ok(())
}
