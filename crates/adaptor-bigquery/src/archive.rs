//! Zip extraction and the `unzip` operation

use adaptor_common::Result as AdaptorResult;
use adaptor_core::{Operation, Param, State};
use async_trait::async_trait;
use serde_json::json;
use std::fs;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{ConnectorError, Result};

/// Extract every entry of a zip archive into `dest`.
///
/// `dest` is created if missing. Returns the extracted file paths relative
/// to `dest`, in archive order. Entries whose names would resolve outside
/// `dest` abort the extraction, and a failed extraction removes the files
/// and directories it had created so far.
pub fn extract_zip<R: Read + Seek>(reader: R, dest: &Path) -> Result<Vec<PathBuf>> {
    let mut archive = zip::ZipArchive::new(reader)?;
    let mut created = Created::default();

    match extract_entries(&mut archive, dest, &mut created) {
        Ok(extracted) => Ok(extracted),
        Err(e) => {
            created.remove();
            Err(e)
        },
    }
}

fn extract_entries<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    dest: &Path,
    created: &mut Created,
) -> Result<Vec<PathBuf>> {
    created.create_dir_all(dest)?;

    let mut extracted = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| ConnectorError::UnsafeEntry(entry.name().to_string()))?;
        let target = dest.join(&relative);

        if entry.is_dir() {
            created.create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            created.create_dir_all(parent)?;
        }

        if !target.exists() {
            created.files.push(target.clone());
        }
        let mut out = fs::File::create(&target)?;
        let bytes = std::io::copy(&mut entry, &mut out)?;
        debug!("Extracted {} ({} bytes)", relative.display(), bytes);
        extracted.push(relative);
    }

    Ok(extracted)
}

/// Paths an extraction created that did not exist before it
#[derive(Default)]
struct Created {
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
}

impl Created {
    fn create_dir_all(&mut self, path: &Path) -> Result<()> {
        let missing: Vec<PathBuf> = path
            .ancestors()
            .take_while(|dir| !dir.as_os_str().is_empty() && !dir.exists())
            .map(Path::to_path_buf)
            .collect();
        fs::create_dir_all(path)?;
        // Outermost first
        self.dirs.extend(missing.into_iter().rev());
        Ok(())
    }

    fn remove(self) {
        for file in &self.files {
            if let Err(e) = fs::remove_file(file) {
                warn!(path = %file.display(), error = %e, "Failed to remove extracted file");
            }
        }
        for dir in self.dirs.iter().rev() {
            if let Err(e) = fs::remove_dir(dir) {
                warn!(path = %dir.display(), error = %e, "Failed to remove extracted directory");
            }
        }
    }
}

/// Extract an in-memory zip archive into `dest`
pub fn extract_zip_bytes(data: &[u8], dest: &Path) -> Result<Vec<PathBuf>> {
    extract_zip(Cursor::new(data), dest)
}

/// Extract the zip archive at `archive` into `dest`
pub fn extract_zip_file(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let file = fs::File::open(archive)?;
    extract_zip(std::io::BufReader::new(file), dest)
}

/// Operation returned by [`unzip`]
pub struct Unzip {
    input: Param<String>,
    output: Param<String>,
}

/// Extract the archive at `input` into the directory `output`.
///
/// Advances `data` to `{"path": output, "files": [...]}`.
pub fn unzip(input: impl Into<Param<String>>, output: impl Into<Param<String>>) -> Unzip {
    Unzip {
        input: input.into(),
        output: output.into(),
    }
}

#[async_trait]
impl Operation for Unzip {
    async fn run(&self, state: State) -> AdaptorResult<State> {
        let input = self.input.resolve(&state)?;
        let output = self.output.resolve(&state)?;

        info!(archive = %input, "Unzipping");

        let dest = output.clone();
        let files = tokio::task::spawn_blocking(move || {
            extract_zip_file(Path::new(&input), Path::new(&dest))
        })
        .await
        .map_err(ConnectorError::from)??;

        info!(dest = %output, files = files.len(), "Extracted all entries");

        let files: Vec<String> = files
            .iter()
            .map(|path| path.to_string_lossy().into_owned())
            .collect();
        Ok(state.advance(json!({ "path": output, "files": files })))
    }

    fn name(&self) -> &str {
        "unzip"
    }
}
