//! Per-run result files
//!
//! Run `i` writes `global{i}.txt` (the global estimate), `local{i}.txt`
//! (`vertex<TAB>estimate` per line) and `time{i}.txt` (elapsed milliseconds)
//! into the output directory.

use crate::runtime::RunOutcome;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Writes run results into one output directory
pub struct ResultWriter {
    dir: PathBuf,
}

impl ResultWriter {
    /// Use `dir` for output, creating it if needed
    pub fn new(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if dir.is_file() {
            warn!("Output path {} is a regular file", dir.display());
        }
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the three result files for run `id`
    pub fn write_run(&self, id: usize, outcome: &RunOutcome) -> std::io::Result<()> {
        fs::write(
            self.dir.join(format!("global{}.txt", id)),
            format!("{:?}\n", outcome.global_cnt),
        )?;
        fs::write(
            self.dir.join(format!("time{}.txt", id)),
            format!("{:?}\n", outcome.elapsed_ms),
        )?;

        let mut local = BufWriter::new(File::create(self.dir.join(format!("local{}.txt", id)))?);
        for (vertex, cnt) in outcome.local_cnt.iter().enumerate() {
            writeln!(local, "{}\t{}", vertex, cnt)?;
        }
        local.flush()?;

        debug!(run = id, dir = %self.dir.display(), "Wrote run results");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_run_files() {
        let dir = tempdir().unwrap();
        let writer = ResultWriter::new(dir.path().join("out")).unwrap();
        let outcome = RunOutcome {
            global_cnt: 1.0,
            local_cnt: vec![0.0, 1.0, 1.0, 1.0],
            elapsed_ms: 12.0,
            ..Default::default()
        };

        writer.write_run(3, &outcome).unwrap();

        let global = fs::read_to_string(writer.dir().join("global3.txt")).unwrap();
        assert_eq!(global.trim().parse::<f64>().unwrap(), 1.0);
        let local = fs::read_to_string(writer.dir().join("local3.txt")).unwrap();
        assert_eq!(local.lines().count(), 4);
        assert_eq!(local.lines().nth(2), Some("2\t1"));
        assert!(writer.dir().join("time3.txt").exists());
    }
}
