use std::fs::{OpenOptions, create_dir_all};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::CliError;

pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), CliError> {
    let data = serde_json::to_vec_pretty(value)?;
    write_bytes_atomic(path, &data)?;
    Ok(())
}

/// Write through a sibling temp file and rename, so readers never see a
/// partial file.
pub fn write_bytes_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path(path)?;
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;

    std::fs::rename(&tmp_path, path)
}

fn temp_path(path: &Path) -> io::Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "output path has no file name")
    })?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    Ok(path.with_file_name(tmp_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_file_sits_next_to_target() {
        let tmp = temp_path(Path::new("out/data.json")).unwrap();
        assert_eq!(tmp, PathBuf::from("out/data.json.tmp"));
        assert!(temp_path(Path::new("/")).is_err());
    }
}
