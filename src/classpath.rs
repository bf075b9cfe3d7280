//! Classpath enumeration: class directories and jar archives.

use anyhow::{Context, Result, bail};
use ignore::{DirEntry, WalkBuilder};
use log::{debug, warn};
use memmap2::Mmap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use zip::ZipArchive;

const CLASS_SUFFIX: &str = ".class";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClasspathEntry {
    Directory(PathBuf),
    Archive(PathBuf),
}

impl ClasspathEntry {
    pub fn path(&self) -> &Path {
        match self {
            ClasspathEntry::Directory(p) | ClasspathEntry::Archive(p) => p,
        }
    }

    pub fn origin(&self) -> String {
        self.path().to_string_lossy().to_string()
    }
}

/// One `(name, bytes)` pair handed to the class filter. `name` is relative to
/// its entry, e.g. `org/example/Foo.class`.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub name: String,
    pub bytes: Vec<u8>,
    pub origin: String,
}

/// Items read from one entry, plus the parts of it the walk could not reach
/// (an unlistable subdirectory, a dangling root).
#[derive(Debug, Clone)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub failures: Vec<String>,
}

impl<T> Listing<T> {
    fn of(items: Vec<T>) -> Self {
        Self {
            items,
            failures: Vec::new(),
        }
    }
}

/// Expand scan roots into classpath entries. A directory root is a class
/// directory and contributes every jar found beneath it; a `.jar` root is an
/// archive.
pub fn discover(roots: &[PathBuf]) -> Result<Vec<ClasspathEntry>> {
    let mut entries = Vec::new();
    for root in roots {
        if root.is_dir() {
            entries.push(ClasspathEntry::Directory(root.clone()));
            let jars = scan_files(root, "jar");
            // the same failures resurface when the directory is cataloged
            for failure in &jars.failures {
                warn!("while looking for jars under {}: {failure}", root.display());
            }
            entries.extend(jars.items.into_iter().map(ClasspathEntry::Archive));
        } else if root.is_file() && root.extension().is_some_and(|e| e == "jar") {
            entries.push(ClasspathEntry::Archive(root.clone()));
        } else if root.exists() {
            bail!("Not a directory or jar archive: {}", root.display());
        } else {
            bail!("Classpath root does not exist: {}", root.display());
        }
    }
    debug!("discovered {} classpath entries", entries.len());
    Ok(entries)
}

enum Walked {
    File(PathBuf),
    Failed(String),
}

fn walked(entry: Result<DirEntry, ignore::Error>, extension: &str) -> Option<Walked> {
    match entry {
        Ok(entry) => {
            let path = entry.path();
            (path.is_file() && path.extension().is_some_and(|e| e == extension))
                .then(|| Walked::File(path.to_path_buf()))
        }
        Err(err) => Some(Walked::Failed(err.to_string())),
    }
}

/// Every file under `base_path` with the given extension, sorted so callers
/// see a stable order. Walk errors are collected, not dropped.
pub fn scan_files(base_path: &Path, extension: &str) -> Listing<PathBuf> {
    let (tx, rx) = mpsc::channel();

    let walker = WalkBuilder::new(base_path)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build_parallel();

    walker.run(|| {
        let tx = tx.clone();
        Box::new(move |entry| {
            if let Some(found) = walked(entry, extension) {
                let _ = tx.send(found);
            }
            ignore::WalkState::Continue
        })
    });

    drop(tx);
    let mut listing = Listing::of(Vec::new());
    for found in rx {
        match found {
            Walked::File(path) => listing.items.push(path),
            Walked::Failed(message) => listing.failures.push(message),
        }
    }
    listing.items.sort();
    listing.failures.sort();
    listing
}

/// Binary names (`a/b/C$D`) of every class in the entry.
pub fn catalog(entry: &ClasspathEntry) -> Result<Listing<String>> {
    match entry {
        ClasspathEntry::Archive(jar_path) => {
            let mmap = map_file(jar_path)?;
            let mut archive = open_archive(&mmap, jar_path)?;
            let mut classes = Vec::new();
            for i in 0..archive.len() {
                let entry = archive.by_index(i)?;
                if let Some(name) = entry.name().strip_suffix(CLASS_SUFFIX) {
                    classes.push(name.replace('\\', "/"));
                }
            }
            Ok(Listing::of(classes))
        }
        ClasspathEntry::Directory(dir) => {
            let files = scan_files(dir, "class");
            let classes = files
                .items
                .iter()
                .filter_map(|p| relative_name(dir, p))
                .filter_map(|n| n.strip_suffix(CLASS_SUFFIX).map(str::to_string))
                .collect();
            Ok(Listing {
                items: classes,
                failures: files.failures,
            })
        }
    }
}

/// Read every file in the entry whose name passes `accept`.
pub fn candidates(
    entry: &ClasspathEntry,
    accept: impl Fn(&str) -> bool,
) -> Result<Listing<Candidate>> {
    let origin = entry.origin();
    let mut out = Vec::new();
    match entry {
        ClasspathEntry::Archive(jar_path) => {
            let mmap = map_file(jar_path)?;
            let mut archive = open_archive(&mmap, jar_path)?;
            for i in 0..archive.len() {
                let mut file = archive.by_index(i)?;
                if file.is_dir() || !accept(file.name()) {
                    continue;
                }
                let name = file.name().replace('\\', "/");
                let mut bytes = Vec::with_capacity(file.size() as usize);
                file.read_to_end(&mut bytes)
                    .with_context(|| format!("Failed to read {name} from {}", jar_path.display()))?;
                out.push(Candidate {
                    name,
                    bytes,
                    origin: origin.clone(),
                });
            }
            Ok(Listing::of(out))
        }
        ClasspathEntry::Directory(dir) => {
            let files = scan_files(dir, "class");
            for path in &files.items {
                let Some(name) = relative_name(dir, path) else {
                    continue;
                };
                if !accept(&name) {
                    continue;
                }
                let bytes = std::fs::read(path)
                    .with_context(|| format!("Failed to read class file: {}", path.display()))?;
                out.push(Candidate {
                    name,
                    bytes,
                    origin: origin.clone(),
                });
            }
            Ok(Listing {
                items: out,
                failures: files.failures,
            })
        }
    }
}

fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path).with_context(|| format!("Failed to open jar: {}", path.display()))?;
    // SAFETY: The file is opened read-only and the map does not outlive the
    // archive reader built on top of it.
    unsafe { Mmap::map(&file) }.with_context(|| format!("Failed to mmap jar: {}", path.display()))
}

fn open_archive<'a>(mmap: &'a Mmap, path: &Path) -> Result<ZipArchive<Cursor<&'a [u8]>>> {
    ZipArchive::new(Cursor::new(&mmap[..]))
        .with_context(|| format!("Failed to read zip structure: {}", path.display()))
}

fn relative_name(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    Some(parts.join("/"))
}
