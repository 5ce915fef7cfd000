use anyhow::{Context, Result};
use ignore::WalkBuilder;
use memmap2::Mmap;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use zip::ZipArchive;

/// Directory that holds class files inside `.jmod` archives.
const CLASSES_PREFIX: &str = "classes/";
const VERSIONED_PREFIX: &str = "META-INF/versions/";

/// Lists the fully qualified names of the classes stored in a jar or jmod.
pub fn list_classes(archive_path: &Path) -> Result<Vec<String>> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    // SAFETY: The file is opened read-only and outlives the mapping.
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to mmap archive: {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(Cursor::new(&mmap[..]))
        .with_context(|| format!("Failed to read zip structure: {}", archive_path.display()))?;

    let mut classes = Vec::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if let Some(class_name) = class_name_from_entry(entry.name()) {
            classes.push(class_name);
        }
    }
    classes.sort();
    classes.dedup();
    Ok(classes)
}

/// Lists the classes of an exploded output directory such as `target/classes`.
pub fn list_directory_classes(dir: &Path) -> Result<Vec<String>> {
    let walker = WalkBuilder::new(dir)
        .hidden(false)
        .ignore(false)
        .parents(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build();

    let mut classes = Vec::new();
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk directory: {}", dir.display()))?;
        let path = entry.path();
        if path.extension().is_none_or(|e| e != "class") {
            continue;
        }
        let Ok(relative) = path.strip_prefix(dir) else {
            continue;
        };
        if let Some(class_name) = class_name_from_entry(&relative.to_string_lossy()) {
            classes.push(class_name);
        }
    }
    classes.sort();
    classes.dedup();
    Ok(classes)
}

/// Turns an archive entry into a dotted class name.
///
/// Returns `None` for non-class entries, `module-info`/`package-info`, and
/// compiler generated anonymous or local classes (`Foo$1`, `Foo$1Local`).
/// Named nested classes keep their outer class as a prefix: `a/B$C.class`
/// becomes `a.B.C`.
pub fn class_name_from_entry(entry: &str) -> Option<String> {
    let name = entry.trim().strip_suffix(".class")?;
    let name = name.strip_prefix(CLASSES_PREFIX).unwrap_or(name);
    let name = strip_versioned(name);

    let simple = name.rsplit(['/', '\\']).next().unwrap_or(name);
    if simple == "module-info" || simple == "package-info" {
        return None;
    }
    let synthetic = simple
        .split('$')
        .skip(1)
        .any(|part| part.is_empty() || part.starts_with(|c: char| c.is_ascii_digit()));
    if synthetic {
        return None;
    }

    Some(name.replace(['/', '\\', '$'], "."))
}

fn strip_versioned(name: &str) -> &str {
    let Some(rest) = name.strip_prefix(VERSIONED_PREFIX) else {
        return name;
    };
    match rest.split_once('/') {
        Some((version, tail)) if version.chars().all(|c| c.is_ascii_digit()) => tail,
        _ => name,
    }
}
