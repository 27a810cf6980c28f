use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use log::info;
use tensorboard_rs::summary_writer::SummaryWriter;

use crate::error::{Result, RunnerError};

pub mod config;
pub mod hidden_spec;
pub mod memory;
pub mod model;
pub mod on_policy_runner;
pub mod rl_utils;

const PROGRESS_FILE: &str = "progress.jsonl";

/// Per-run record: attributes written once at open, one row of scalars per
/// iteration, and snapshot directories.
pub struct TrainingLog {
    dir: Option<PathBuf>,
    progress: Option<BufWriter<File>>,
    writer: Option<SummaryWriter>,
    iterations_written: usize,
}

impl TrainingLog {
    /// Opens a log at `path`, writing each attribute as `<name>.json`.
    /// Without a path nothing touches the disk and rows only go to the console.
    pub fn open(path: Option<&Path>, attrs: &[(&str, &str)], debug: bool) -> Result<Self> {
        let (dir, progress) = match path {
            Some(dir) => {
                let progress_path = dir.join(PROGRESS_FILE);
                if progress_path.exists() && !debug {
                    return Err(RunnerError::LogExists(dir.to_path_buf()));
                }
                std::fs::create_dir_all(dir)?;
                for (name, value) in attrs {
                    std::fs::write(dir.join(format!("{}.json", name)), value)?;
                }
                let file = File::create(&progress_path)?;
                info!("logging to {}", dir.display());
                (Some(dir.to_path_buf()), Some(BufWriter::new(file)))
            }
            None => (None, None),
        };
        Ok(Self {
            dir,
            progress,
            writer: None,
            iterations_written: 0,
        })
    }

    pub fn with_tensorboard(mut self, logdir: &str) -> Self {
        self.writer = Some(SummaryWriter::new(logdir));
        self
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn iterations_written(&self) -> usize {
        self.iterations_written
    }

    /// Emits one row: console table, JSON line, tensorboard scalars.
    pub fn write(&mut self, iter: usize, stats: &[(&str, f64)]) -> Result<()> {
        info!("************iter={}************", iter);
        for (name, value) in stats {
            info!("{:<24}{:>16.6}", name, value);
        }

        if let Some(progress) = self.progress.as_mut() {
            let mut row = serde_json::Map::new();
            row.insert("iter".to_string(), serde_json::Value::from(iter));
            for (name, value) in stats {
                row.insert(name.to_string(), serde_json::Value::from(*value));
            }
            serde_json::to_writer(&mut *progress, &row)?;
            progress.write_all(b"\n")?;
            progress.flush()?;
        }

        if let Some(writer) = self.writer.as_mut() {
            for (name, value) in stats {
                writer.add_scalar(&format!("train/{}", name), *value as f32, iter);
            }
            writer.flush();
        }
        self.iterations_written += 1;
        Ok(())
    }

    /// Creates and returns `<dir>/snapshots/iterNNNNNNN`.
    pub fn snapshot_dir(&self, iter: usize) -> Result<Option<PathBuf>> {
        let dir = match &self.dir {
            Some(dir) => dir.join("snapshots").join(format!("iter{:07}", iter)),
            None => return Ok(None),
        };
        std::fs::create_dir_all(&dir)?;
        Ok(Some(dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_writes_attrs_and_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("run");
        let mut log = TrainingLog::open(Some(&dir), &[("args", "{\"n_iter\": 1}")], false).unwrap();
        log.write(0, &[("mean_return", -1.5), ("kl", 0.01)]).unwrap();
        log.write(1, &[("mean_return", -1.0), ("kl", 0.02)]).unwrap();
        assert_eq!(log.iterations_written(), 2);

        let args = std::fs::read_to_string(dir.join("args.json")).unwrap();
        assert!(args.contains("n_iter"));
        let progress = std::fs::read_to_string(dir.join(PROGRESS_FILE)).unwrap();
        let rows: Vec<serde_json::Value> = progress
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["iter"], 1);
        assert_eq!(rows[0]["mean_return"], -1.5);

        let snap = log.snapshot_dir(19).unwrap().unwrap();
        assert!(snap.ends_with("snapshots/iter0000019"));
        assert!(snap.is_dir());
    }

    #[test]
    fn test_refuses_to_clobber_unless_debug() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        let mut log = TrainingLog::open(Some(&dir), &[], false).unwrap();
        log.write(0, &[("x", 1.0)]).unwrap();
        drop(log);

        let err = TrainingLog::open(Some(&dir), &[], false).err().unwrap();
        assert!(matches!(err, RunnerError::LogExists(_)));

        let log = TrainingLog::open(Some(&dir), &[], true).unwrap();
        drop(log);
        let progress = std::fs::read_to_string(dir.join(PROGRESS_FILE)).unwrap();
        assert!(progress.is_empty());
    }

    #[test]
    fn test_console_only_log() {
        let mut log = TrainingLog::open(None, &[("args", "{}")], false).unwrap();
        log.write(0, &[("x", 1.0)]).unwrap();
        assert!(log.dir().is_none());
        assert!(log.snapshot_dir(0).unwrap().is_none());
    }
}
