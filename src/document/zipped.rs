//! Zip containers (DOCX, EPUB): members are kept in memory so untouched
//! parts are written back byte-for-byte.

use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::model::{Document, TranslationUnit};
use crate::errors::{LoadError, PersistenceError};

/// One archive member
#[derive(Debug, Clone)]
pub struct ArchiveMember {
    pub name: String,
    pub data: Vec<u8>,
    pub stored: bool,
    pub is_dir: bool,
}

/// Units contributed by one archive member
#[derive(Debug, Clone, PartialEq)]
pub struct PartUnits {
    /// Position in `ArchiveLayout::members`
    pub member: usize,
    pub first_unit: usize,
    pub count: usize,
}

/// Archive members plus which ones carry units
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    pub members: Vec<ArchiveMember>,
    pub parts: Vec<PartUnits>,
}

/// Read every member of a zip archive
pub fn read_archive(bytes: &[u8]) -> Result<Vec<ArchiveMember>, LoadError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut members = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let name = file.name().to_string();
        if file.enclosed_name().is_none() {
            return Err(LoadError::Container(format!("unsafe member path: {}", name)));
        }

        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data).map_err(|e| {
            LoadError::Container(format!("failed to read member {}: {}", name, e))
        })?;

        members.push(ArchiveMember {
            stored: file.compression() == CompressionMethod::Stored,
            is_dir: file.is_dir(),
            name,
            data,
        });
    }

    Ok(members)
}

/// Write members to a new archive, members named in `first` go first and uncompressed
pub fn write_archive(members: &[ArchiveMember], first: Option<&str>) -> Result<Vec<u8>, PersistenceError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let zip_error = |name: &str, e: &dyn std::fmt::Display| PersistenceError::Write {
        path: name.to_string(),
        message: e.to_string(),
    };

    let leading = members.iter().filter(|m| Some(m.name.as_str()) == first);
    let rest = members.iter().filter(|m| Some(m.name.as_str()) != first);

    for (member, force_stored) in leading.map(|m| (m, true)).chain(rest.map(|m| (m, false))) {
        let method = if force_stored || member.stored {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };
        let options = FileOptions::default().compression_method(method);

        if member.is_dir {
            writer.add_directory(member.name.as_str(), options)
                .map_err(|e| zip_error(&member.name, &e))?;
            continue;
        }

        writer.start_file(member.name.as_str(), options)
            .map_err(|e| zip_error(&member.name, &e))?;
        writer.write_all(&member.data)
            .map_err(|e| zip_error(&member.name, &e))?;
    }

    let cursor = writer.finish().map_err(|e| zip_error("archive", &e))?;
    Ok(cursor.into_inner())
}

/// Rebuild the members that carry units, leaving the others untouched
pub(crate) fn rewrite_parts<F>(
    document: &Document,
    layout: &ArchiveLayout,
    mut rewrite: F,
) -> Result<Vec<ArchiveMember>, LoadError>
where
    F: FnMut(&ArchiveMember, &[TranslationUnit]) -> Result<Vec<u8>, LoadError>,
{
    let mut members = layout.members.clone();

    for part in &layout.parts {
        let member = layout.members.get(part.member).ok_or_else(|| {
            LoadError::Container(format!("layout refers to missing member {}", part.member))
        })?;
        let units = document
            .units
            .get(part.first_unit..part.first_unit + part.count)
            .ok_or_else(|| LoadError::Markup {
                part: member.name.clone(),
                message: "layout refers to units the document does not have".to_string(),
            })?;
        members[part.member].data = rewrite(member, units)?;
    }

    Ok(members)
}

/// Hand out the units of one member in order while it is rewritten
pub(crate) struct UnitCursor<'a> {
    part: &'a str,
    units: &'a [TranslationUnit],
    next: usize,
}

impl<'a> UnitCursor<'a> {
    pub fn new(part: &'a str, units: &'a [TranslationUnit]) -> Self {
        Self { part, units, next: 0 }
    }

    pub fn next_unit(&mut self) -> Result<&'a TranslationUnit, LoadError> {
        let unit = self.units.get(self.next).ok_or_else(|| LoadError::Markup {
            part: self.part.to_string(),
            message: "more text blocks than recorded units".to_string(),
        })?;
        self.next += 1;
        Ok(unit)
    }

    /// Fails unless every unit was consumed
    pub fn finish(&self) -> Result<(), LoadError> {
        if self.next == self.units.len() {
            Ok(())
        } else {
            Err(LoadError::Markup {
                part: self.part.to_string(),
                message: format!("{} of {} units consumed", self.next, self.units.len()),
            })
        }
    }
}
