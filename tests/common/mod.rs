#![allow(dead_code)]

pub use pipectl_test_utils::{init_tracing, with_timeout};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use filetime::{FileTime, set_file_mtime};
use pipectl::config::{PipelineConfig, RawPipelineConfig};

/// Parse and validate a pipeline from TOML text.
pub fn pipeline(toml_text: &str) -> PipelineConfig {
    let raw: RawPipelineConfig = toml::from_str(toml_text).expect("valid TOML");
    PipelineConfig::try_from(raw).expect("valid pipeline")
}

/// Write `contents` to `dir/rel`, creating parent directories.
pub fn write_file(dir: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

/// Set the mtime of `path` to `secs` seconds in the past.
pub fn age(path: &Path, secs: u64) {
    let when = SystemTime::now() - Duration::from_secs(secs);
    set_file_mtime(path, FileTime::from_system_time(when)).unwrap();
}
