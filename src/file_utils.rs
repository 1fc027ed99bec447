use anyhow::{Result, Context};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::document::DocumentFormat;

// @module: File and directory utilities

/// Stem suffixes of files this tool generates, skipped when scanning folders
const GENERATED_SUFFIXES: &[&str] = &["_bili", "_Single"];

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.as_os_str().is_empty() && !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    // @generates: Output path for a translated document
    // @params: input_file, output_dir (input's folder when None), suffix, e.g. "bili" or the target tag
    pub fn generate_output_path(
        input_file: &Path,
        output_dir: Option<&Path>,
        suffix: &str,
    ) -> PathBuf {
        let stem = input_file.file_stem().unwrap_or_default().to_string_lossy();
        let mut output_filename = format!("{}_{}", stem, suffix);
        if let Some(ext) = input_file.extension() {
            output_filename.push('.');
            output_filename.push_str(&ext.to_string_lossy());
        }

        let dir = match output_dir {
            Some(dir) => dir.to_path_buf(),
            None => input_file.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        dir.join(output_filename)
    }

    /// Whether a file name looks like output produced by a previous run
    ///
    /// `target_language` adds the mono suffix `_{target}` to the bilingual
    /// and stripped ones.
    pub fn is_generated_output(path: &Path, target_language: Option<&str>) -> bool {
        let stem = path.file_stem().unwrap_or_default().to_string_lossy();
        if GENERATED_SUFFIXES.iter().any(|suffix| stem.ends_with(suffix)) {
            return true;
        }
        match target_language {
            Some(target) if !target.is_empty() => stem.ends_with(&format!("_{}", target)),
            _ => false,
        }
    }

    /// Expand files and folders into the list of supported documents
    ///
    /// Folders are walked recursively; files that are not a supported format
    /// or that were generated by a previous run are skipped. Explicitly named
    /// files are always kept so that an unsupported one is reported later.
    /// A file reached through several inputs is listed once.
    pub fn find_documents(inputs: &[PathBuf], target_language: Option<&str>) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();

        for input in inputs {
            let candidates = if Self::dir_exists(input) {
                let mut found = Vec::new();
                for entry in WalkDir::new(input).follow_links(true) {
                    let entry = entry.context("Failed to read directory entry")?;
                    let path = entry.path();

                    if path.is_file()
                        && DocumentFormat::from_path(path).is_some()
                        && !Self::is_generated_output(path, target_language)
                    {
                        found.push(path.to_path_buf());
                    }
                }
                found.sort();
                found
            } else {
                vec![input.clone()]
            };

            for path in candidates {
                // Missing files cannot be canonicalized, they are compared as given
                let key = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
                if seen.insert(key) {
                    result.push(path);
                }
            }
        }

        Ok(result)
    }

    /// Read a whole file
    pub fn read_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
        fs::read(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Lowercase hex SHA-256 of a byte buffer
    pub fn sha256_hex(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }

    /// Write bytes through a temp file in the destination folder, then rename it into place
    pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::ensure_dir(&parent)?;

        let mut temp = tempfile::NamedTempFile::new_in(&parent)
            .with_context(|| format!("Failed to create temp file in {:?}", parent))?;
        temp.write_all(content)
            .with_context(|| format!("Failed to write temp file for {:?}", path))?;
        temp.flush()?;
        temp.persist(path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to move temp file to {:?}", path))?;

        Ok(())
    }
}
