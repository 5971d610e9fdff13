use std::fs::{self, File};
use std::path::Path;

use crate::error::DatasetError;

pub(crate) fn ensure_not_empty<T>(items: &[T], what: &'static str) -> Result<(), DatasetError> {
    if items.is_empty() {
        return Err(DatasetError::Empty(what));
    }

    Ok(())
}

pub(crate) fn create_output_file(path: impl AsRef<Path>) -> Result<File, DatasetError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}
