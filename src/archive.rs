//! Publication archive handling: reading EPS zips, packaging extracted
//! patents, and quarantining archives that no longer open.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::constants::retrieval::BROKEN_DIR;
use crate::errors::HarvestError;
use crate::extract::{PatentInfo, parse_document_xml};
use crate::types::DocumentId;

fn archive_label(path: &Path) -> DocumentId {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// `EP*.zip` files directly inside `dir`, sorted by name.
pub fn patent_archive_paths(dir: &Path) -> Result<Vec<PathBuf>, HarvestError> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if entry.file_type()?.is_file() && name.starts_with("EP") && name.ends_with(".zip") {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Reads the document XML out of one publication archive.
///
/// The entry is named after the application number rather than the
/// publication number, so the archive is scanned for it: the last entry
/// with an `xml` extension that is not the table of contents wins.
pub fn document_xml_from_zip(path: &Path) -> Result<String, HarvestError> {
    let archive_err =
        |err: zip::result::ZipError| HarvestError::Archive(format!("{}: {err}", path.display()));
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file).map_err(archive_err)?;

    let mut selected = None;
    for index in 0..archive.len() {
        let name = archive.by_index(index).map_err(archive_err)?.name().to_string();
        if name.split('.').next_back() == Some("xml") && !name.eq_ignore_ascii_case("toc.xml") {
            selected = Some(index);
        }
    }
    let Some(index) = selected else {
        return Err(HarvestError::MalformedDocument {
            document: archive_label(path),
            details: "archive holds no document xml entry".to_string(),
        });
    };

    let mut entry = archive.by_index(index).map_err(archive_err)?;
    let mut xml = String::new();
    entry.read_to_string(&mut xml)?;
    Ok(xml)
}

/// `(basename, bytes)` for every `.tif` entry, in archive order.
pub fn images_from_zip(path: &Path) -> Result<Vec<(String, Vec<u8>)>, HarvestError> {
    let archive_err =
        |err: zip::result::ZipError| HarvestError::Archive(format!("{}: {err}", path.display()));
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file).map_err(archive_err)?;

    let mut images = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(archive_err)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let basename = name.rsplit('/').next().unwrap_or(&name);
        if basename.split('.').next_back() == Some("tif") {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            images.push((basename.to_string(), bytes));
        }
    }
    Ok(images)
}

/// Parses the document XML inside `path` into its [`PatentInfo`].
pub fn extract_patent_info(path: &Path) -> Result<PatentInfo, HarvestError> {
    let xml = document_xml_from_zip(path)?;
    parse_document_xml(&archive_label(path), &xml)
}

/// Extracts every `EP*.zip` under `input_dir` into one bundle named after
/// the directory, holding `{document_number}/patent_info.json` plus the
/// archive's `.tif` drawings per patent.
pub fn package_directory(input_dir: &Path, output_dir: &Path) -> Result<PathBuf, HarvestError> {
    let basename = input_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            HarvestError::Configuration(format!(
                "input directory {} has no name to bundle under",
                input_dir.display()
            ))
        })?;
    fs::create_dir_all(output_dir)?;
    let output_path = output_dir.join(format!("{basename}.zip"));
    let archive_err = |err: zip::result::ZipError| {
        HarvestError::Archive(format!("{}: {err}", output_path.display()))
    };

    let archives = patent_archive_paths(input_dir)?;
    info!(
        "[harvest:package] bundling {} archives from {} into {}",
        archives.len(),
        input_dir.display(),
        output_path.display()
    );

    let mut bundle = ZipWriter::new(File::create(&output_path)?);
    let options = SimpleFileOptions::default();
    for path in &archives {
        let info = extract_patent_info(path)?;
        let number = info.document_number.clone();
        bundle
            .start_file(format!("{number}/patent_info.json"), options)
            .map_err(archive_err)?;
        bundle.write_all(serde_json::to_string_pretty(&info)?.as_bytes())?;
        for (image_name, bytes) in images_from_zip(path)? {
            bundle
                .start_file(format!("{number}/{image_name}"), options)
                .map_err(archive_err)?;
            bundle.write_all(&bytes)?;
        }
    }
    bundle.finish().map_err(archive_err)?;
    Ok(output_path)
}

/// Moves archives that no longer open as zip files into `broken_files/`
/// under `dir` and returns their new paths.
///
/// Archives that open but carry malformed contents are logged and left in
/// place; only unopenable files are quarantined.
pub fn quarantine_broken_archives(dir: &Path) -> Result<Vec<PathBuf>, HarvestError> {
    let mut broken = Vec::new();
    for path in patent_archive_paths(dir)? {
        match extract_patent_info(&path) {
            Ok(_) => {}
            Err(HarvestError::Archive(reason)) => {
                warn!("[harvest:ops] archive does not open cleanly: {reason}");
                broken.push(path);
            }
            Err(HarvestError::MalformedDocument { document, details }) => {
                warn!(
                    "[harvest:ops] {document} opens but extracts with errors, leaving in place: {details}"
                );
            }
            Err(err) => return Err(err),
        }
    }

    let broken_dir = dir.join(BROKEN_DIR);
    fs::create_dir_all(&broken_dir)?;
    let mut moved = Vec::new();
    for path in broken {
        let Some(name) = path.file_name() else {
            continue;
        };
        let target = broken_dir.join(name);
        fs::rename(&path, &target)?;
        moved.push(target);
    }
    Ok(moved)
}
