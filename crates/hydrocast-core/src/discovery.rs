//! Artifact discovery over the `{base}/{YYYY}/{MM}/{DD}` directory
//! convention shared by the engine output, the export target and the
//! staging areas.

use crate::cycle::ForecastCycle;
use crate::error::Result;
use crate::io;
use std::path::{Path, PathBuf};

/// `{base}/{YYYY}/{MM}/{DD}` for the cycle's date.
pub fn date_dir(base: &Path, cycle: &ForecastCycle) -> PathBuf {
    let dt = cycle.datetime();
    base.join(dt.format("%Y").to_string())
        .join(dt.format("%m").to_string())
        .join(dt.format("%d").to_string())
}

/// Like [`date_dir`] but creates the directory tree.
pub fn ensure_date_dir(base: &Path, cycle: &ForecastCycle) -> Result<PathBuf> {
    let dir = date_dir(base, cycle);
    io::ensure_dir(&dir)?;
    Ok(dir)
}

/// Files in the cycle's date directory named `{YYYY-MM-DD_HH}*{extension}`,
/// sorted. A missing directory yields an empty list, not an error.
pub fn list_files(base: &Path, cycle: &ForecastCycle, extension: &str) -> Vec<PathBuf> {
    let dir = date_dir(base, cycle);
    let prefix = cycle.file_stamp();
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .filter(|e| e.path().is_file())
        .filter(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            name.starts_with(&prefix) && name.ends_with(extension)
        })
        .map(|e| e.path())
        .collect();
    files.sort();
    files
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cycle() -> ForecastCycle {
        ForecastCycle::parse("2022-10-01 06", 6).unwrap()
    }

    #[test]
    fn date_dir_layout() {
        let dir = date_dir(Path::new("/data/out"), &cycle());
        assert_eq!(dir, PathBuf::from("/data/out/2022/10/01"));
    }

    #[test]
    fn missing_directory_is_empty_not_an_error() {
        let base = TempDir::new().unwrap();
        assert!(list_files(base.path(), &cycle(), ".nc").is_empty());
    }

    #[test]
    fn lists_only_matching_files() {
        let base = TempDir::new().unwrap();
        let day = base.path().join("2022/10/01");
        std::fs::create_dir_all(&day).unwrap();
        std::fs::write(day.join("2022-10-01_06.method-a.nc"), b"").unwrap();
        std::fs::write(day.join("2022-10-01_06.method-b.nc"), b"").unwrap();
        std::fs::write(day.join("2022-10-01_00.method-a.nc"), b"").unwrap();
        std::fs::write(day.join("2022-10-01_06.method-a.csv"), b"").unwrap();
        std::fs::write(day.join("unrelated.nc"), b"").unwrap();

        let files = list_files(base.path(), &cycle(), ".nc");
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "2022-10-01_06.method-a.nc".to_string(),
                "2022-10-01_06.method-b.nc".to_string()
            ]
        );
    }

    #[test]
    fn ensure_date_dir_creates_tree() {
        let base = TempDir::new().unwrap();
        let dir = ensure_date_dir(base.path(), &cycle()).unwrap();
        assert!(dir.is_dir());
        assert!(dir.ends_with("2022/10/01"));
    }
}
