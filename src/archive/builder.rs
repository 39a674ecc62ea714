//! tar + gzip archive construction

use super::filter::PathFilter;
use super::naming::{ArchiveFormat, ArtifactNaming};
use super::Artifact;
use crate::config::TargetSettings;
use chrono::{DateTime, Local};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::borrow::Cow;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read};
use std::path::{Component, Path, PathBuf};
use tar::{EntryType, Header, HeaderMode};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Failed to resolve source path {path:?}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to walk {path:?}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to create archive {path:?}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to add {path:?} to archive: {source}")]
    Append {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to close archive ({layer} layer): {source}")]
    Close {
        layer: &'static str,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Builds one artifact from a target's source tree
pub struct ArchiveBuilder<'a> {
    settings: &'a TargetSettings,
    naming: ArtifactNaming,
}

impl<'a> ArchiveBuilder<'a> {
    pub fn new(settings: &'a TargetSettings) -> Self {
        Self {
            settings,
            naming: ArtifactNaming::for_target(settings),
        }
    }

    /// Enumerate and archive in one step
    pub fn build(&self, workdir: &Path, timestamp: DateTime<Local>) -> Result<Artifact> {
        let files = self.enumerate(workdir)?;
        self.write(workdir, &files, timestamp)
    }

    /// List the regular files to archive, in deterministic order
    ///
    /// `workdir` is skipped so a workdir inside the source tree never
    /// archives itself. Symbolic links are not followed and not archived.
    pub fn enumerate(&self, workdir: &Path) -> Result<Vec<PathBuf>> {
        let root = self.root()?;
        let filter = PathFilter::for_target(self.settings).skip_dir(workdir);

        let walker = WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || filter.includes_dir(entry.path())
            });

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|source| ArchiveError::Walk {
                path: source
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.clone()),
                source,
            })?;

            let file_type = entry.file_type();
            if file_type.is_file() {
                if filter.includes(entry.path()) {
                    files.push(entry.into_path());
                }
            } else if file_type.is_symlink() {
                debug!("Skipping symbolic link: {:?}", entry.path());
            }
        }

        Ok(files)
    }

    /// Write `files` into `<workdir>/<artifact name>`
    ///
    /// On failure the partially written file is removed.
    pub fn write(
        &self,
        workdir: &Path,
        files: &[PathBuf],
        timestamp: DateTime<Local>,
    ) -> Result<Artifact> {
        if self.naming.format() == ArchiveFormat::Unknown {
            warn!(
                "Unknown archive format '{}', writing tar.gz with '{}' extension",
                self.settings.format,
                self.naming.extension()
            );
        }

        let root = self.root()?;
        let file_name = self.naming.file_name(&timestamp);
        let path = workdir.join(&file_name);

        let result = self.write_entries(&root, &path, files);
        if result.is_err() {
            if let Err(e) = fs::remove_file(&path) {
                debug!("Failed to remove incomplete archive {:?}: {}", path, e);
            }
        }
        result?;

        let size_bytes = fs::metadata(&path)
            .map_err(|source| ArchiveError::Create {
                path: path.clone(),
                source,
            })?
            .len();

        Ok(Artifact {
            path,
            file_name,
            file_count: files.len(),
            size_bytes,
        })
    }

    fn write_entries(&self, root: &Path, path: &Path, files: &[PathBuf]) -> Result<()> {
        let mut writer = ArchiveWriter::create(path, self.settings.preserve_absolute_hierarchy)?;

        for file in files {
            let name = self.entry_name(root, file);
            if let Err(e) = writer.append_file(file, &name) {
                // Appending failed; still release every layer, but report the append error
                let _ = writer.close();
                return Err(e);
            }
        }

        writer.close()
    }

    fn root(&self) -> Result<PathBuf> {
        std::path::absolute(&self.settings.path).map_err(|source| ArchiveError::Source {
            path: self.settings.path.clone(),
            source,
        })
    }

    /// Name stored in the archive for `file`
    fn entry_name(&self, root: &Path, file: &Path) -> Vec<u8> {
        let relative: &Path = if self.settings.preserve_absolute_hierarchy {
            file
        } else {
            match file.strip_prefix(root) {
                Ok(rel) if !rel.as_os_str().is_empty() => rel,
                // The root itself is a regular file
                _ => file.file_name().map(Path::new).unwrap_or(file),
            }
        };

        let mut name = Vec::new();
        if self.settings.preserve_absolute_hierarchy {
            name.push(b'/');
        }
        let parts = relative.components().filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        });
        for (i, part) in parts.enumerate() {
            if i > 0 {
                name.push(b'/');
            }
            name.extend_from_slice(&os_bytes(part));
        }
        name
    }
}

#[cfg(unix)]
fn os_bytes(s: &OsStr) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(s.as_bytes())
}

#[cfg(not(unix))]
fn os_bytes(s: &OsStr) -> Cow<'_, [u8]> {
    Cow::Owned(s.to_string_lossy().into_owned().into_bytes())
}

#[cfg(unix)]
fn bytes_path(name: &[u8]) -> Cow<'_, Path> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(Path::new(OsStr::from_bytes(name)))
}

#[cfg(not(unix))]
fn bytes_path(name: &[u8]) -> Cow<'_, Path> {
    Cow::Owned(PathBuf::from(String::from_utf8_lossy(name).into_owned()))
}

/// Yields exactly `remaining` bytes of `inner`, failing if it ends sooner
struct ExactReader<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> ExactReader<R> {
    fn new(inner: R, len: u64) -> Self {
        Self {
            inner,
            remaining: len,
        }
    }
}

impl<R: Read> Read for ExactReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let max = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("file shrank while archiving, {} bytes missing", self.remaining),
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// tar builder over gzip over a buffered file
struct ArchiveWriter {
    path: PathBuf,
    builder: tar::Builder<GzEncoder<BufWriter<File>>>,
}

impl ArchiveWriter {
    /// `absolute` keeps leading separators in entry names
    fn create(path: &Path, absolute: bool) -> Result<Self> {
        let file = File::create(path).map_err(|source| ArchiveError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.preserve_absolute(absolute);

        Ok(Self {
            path: path.to_path_buf(),
            builder,
        })
    }

    fn append_file(&mut self, source: &Path, name: &[u8]) -> Result<()> {
        let append_err = |e: io::Error| ArchiveError::Append {
            path: source.to_path_buf(),
            source: e,
        };

        let file = File::open(source).map_err(append_err)?;
        let metadata = file.metadata().map_err(append_err)?;

        let mut header = Header::new_gnu();
        header.set_metadata_in_mode(&metadata, HeaderMode::Complete);
        header.set_entry_type(EntryType::Regular);

        trace!("Adding {:?} ({} bytes)", source, metadata.len());
        self.append_entry(header, name, file).map_err(append_err)
    }

    /// Append one entry whose body must be exactly the header's size
    fn append_entry<R: Read>(&mut self, mut header: Header, name: &[u8], data: R) -> io::Result<()> {
        let data = ExactReader::new(data, header.size()?);
        self.builder
            .append_data(&mut header, bytes_path(name).as_ref(), data)
    }

    /// Close every layer innermost first, returning the first failure
    fn close(mut self) -> Result<()> {
        let mut first: Option<ArchiveError> = None;

        keep_first(&mut first, "tar", self.builder.finish());
        let encoder = match self.builder.into_inner() {
            Ok(encoder) => encoder,
            Err(e) => return Err(first.unwrap_or(ArchiveError::Close { layer: "tar", source: e })),
        };

        // A failed gzip trailer drops the remaining layers, which still closes the file
        let buffered = match encoder.finish() {
            Ok(buffered) => buffered,
            Err(e) => return Err(first.unwrap_or(ArchiveError::Close { layer: "gzip", source: e })),
        };

        let file = match buffered.into_inner() {
            Ok(file) => file,
            Err(e) => {
                let (error, buffered) = e.into_parts();
                keep_first(&mut first, "buffer", Err(error));
                buffered.into_parts().0
            }
        };

        keep_first(&mut first, "file", file.sync_all());

        match first {
            Some(e) => Err(e),
            None => {
                debug!("Closed archive {:?}", self.path);
                Ok(())
            }
        }
    }
}

fn keep_first(first: &mut Option<ArchiveError>, layer: &'static str, result: io::Result<()>) {
    if let Err(source) = result {
        if first.is_none() {
            *first = Some(ArchiveError::Close { layer, source });
        }
    }
}
