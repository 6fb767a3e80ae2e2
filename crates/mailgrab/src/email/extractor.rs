//! Saving a message's attachments into the input directory.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use super::error::{EmailError, PartStage, Result};
use super::parser::{self, AttachmentPart};

/// Outcome of extracting one message.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Paths written, in part order.
    pub saved: Vec<PathBuf>,
    /// Attachment parts that were found but could not be saved.
    pub failed: usize,
    /// Attachment parts skipped for lack of a filename.
    pub unnamed: usize,
}

impl Extraction {
    /// True if at least one attachment reached the disk.
    pub fn any_saved(&self) -> bool {
        !self.saved.is_empty()
    }
}

/// Writes attachment parts to `<dir>/<filename>`, overwriting same-named files.
#[derive(Debug, Clone)]
pub struct AttachmentExtractor {
    dir: PathBuf,
}

impl AttachmentExtractor {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Decomposes `raw` and saves every attachment part.
    ///
    /// Returns `Err` only when the message itself cannot be decomposed, in
    /// which case nothing has been written. A part that cannot be saved is
    /// logged and counted in [`Extraction::failed`]; the remaining parts are
    /// still processed.
    pub fn extract(&self, seq: u32, raw: &[u8]) -> Result<Extraction> {
        let parts = parser::decompose(raw, seq)?;
        let mut extraction = Extraction::default();

        for attachment in parts.iter().filter_map(|p| p.as_attachment()) {
            match self.save(attachment) {
                Ok(Some(path)) => extraction.saved.push(path),
                Ok(None) => extraction.unnamed += 1,
                Err(e) => {
                    error!("extractAttachment: {}, skip", e);
                    extraction.failed += 1;
                }
            }
        }

        Ok(extraction)
    }

    /// Saves one part. `Ok(None)` means it had no usable filename.
    fn save(&self, attachment: &AttachmentPart) -> Result<Option<PathBuf>> {
        let filename = match attachment.filename.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => {
                warn!("extractAttachment: found attachment with empty filename, skip");
                return Ok(None);
            }
        };
        check_filename(filename)?;

        info!("extractAttachment: found attachment: {}", filename);
        let path = self.dir.join(filename);
        info!("extractAttachment: save attachment to: {}", path.display());

        write_file(&path, filename, &attachment.content)?;
        Ok(Some(path))
    }
}

/// A filename must name a single entry directly inside the input directory.
fn check_filename(filename: &str) -> Result<()> {
    let unsafe_name = filename == "."
        || filename == ".."
        || filename.contains(['/', '\\', '\0']);
    if unsafe_name {
        return Err(part_error(
            filename,
            PartStage::Filename,
            "not a plain file name".to_string(),
        ));
    }
    Ok(())
}

/// Creates (or truncates) `path` and copies `content` into it. If the copy or
/// the final flush fails, the partial file is removed.
fn write_file(path: &Path, filename: &str, content: &[u8]) -> Result<()> {
    let mut file = File::create(path)
        .map_err(|e| part_error(filename, PartStage::Create, e.to_string()))?;

    let written = io::copy(&mut &content[..], &mut file)
        .map_err(|e| (PartStage::Copy, e))
        .and_then(|_| file.flush().map_err(|e| (PartStage::Close, e)))
        .and_then(|_| file.sync_all().map_err(|e| (PartStage::Close, e)));
    drop(file);

    if let Err((stage, e)) = written {
        if let Err(remove_err) = std::fs::remove_file(path) {
            warn!(
                "extractAttachment: could not remove partial file {}: {}",
                path.display(),
                remove_err
            );
        }
        return Err(part_error(filename, stage, e.to_string()));
    }

    Ok(())
}

fn part_error(filename: &str, stage: PartStage, reason: String) -> EmailError {
    EmailError::AttachmentError {
        filename: filename.to_string(),
        stage,
        reason,
    }
}
