use crate::core::format::is_image_path;
use crate::core::Storage;
use crate::domain::model::ImageSource;
use crate::utils::error::{Img2BaseError, Result};
use reqwest::Client;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;
use zip::ZipArchive;

const ARCHIVE_SEPARATOR: char = '!';

/// Parses one command line / config input into a source.
///
/// `http(s)://...` is a URL, `-` is stdin, and `icons.zip!16/save.png`
/// addresses a single entry inside a zip archive.
pub fn parse_input(input: &str) -> ImageSource {
    let trimmed = input.trim();
    if trimmed == "-" {
        return ImageSource::Stdin;
    }

    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return ImageSource::Url(trimmed.to_string());
    }

    if let Some((archive, entry)) = trimmed.split_once(ARCHIVE_SEPARATOR) {
        if is_zip_path(Path::new(archive)) && !entry.is_empty() {
            return ImageSource::Archive {
                path: PathBuf::from(archive),
                entry: entry.to_string(),
            };
        }
    }

    ImageSource::File(PathBuf::from(trimmed))
}

fn is_zip_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

type CachedArchive = ZipArchive<Cursor<Arc<[u8]>>>;

/// Upper bound on the buffer reserved up front for an archive entry. The
/// declared size comes from the archive itself and is not trusted.
const MAX_PREALLOC: usize = 16 * 1024 * 1024;

/// Inputs after expansion, plus the inputs that could not be expanded.
#[derive(Debug, Default)]
pub struct ExpandedInputs {
    pub sources: Vec<ImageSource>,
    pub failures: Vec<(String, Img2BaseError)>,
}

pub struct SourceReader<S: Storage> {
    storage: S,
    client: Client,
    // 每個壓縮檔只讀取、解析一次
    archives: Mutex<HashMap<PathBuf, CachedArchive>>,
}

impl<S: Storage> SourceReader<S> {
    pub fn new(storage: S) -> Self {
        Self::with_client(storage, Client::new())
    }

    pub fn with_client(storage: S, client: Client) -> Self {
        Self {
            storage,
            client,
            archives: Mutex::new(HashMap::new()),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Turns raw inputs into concrete sources. Directories expand to the
    /// image files they contain and bare `.zip` paths to their image entries,
    /// both sorted by name.
    ///
    /// A directory or archive that cannot be opened is recorded in
    /// `failures`; only when nothing at all could be expanded is the first
    /// of those errors returned.
    pub async fn expand(&self, inputs: &[String]) -> Result<ExpandedInputs> {
        if inputs.is_empty() {
            return Err(Img2BaseError::EmptyInput {
                message: "file list is empty".to_string(),
            });
        }

        let mut expanded = ExpandedInputs::default();
        for input in inputs {
            match parse_input(input) {
                ImageSource::File(path) => {
                    let path_str = path.to_string_lossy().to_string();
                    if self.storage.is_dir(&path_str).await {
                        match self.storage.list_dir(&path_str).await {
                            Ok(mut names) => {
                                names.sort();
                                let before = expanded.sources.len();
                                for name in names {
                                    let child = path.join(&name);
                                    if is_image_path(&child) {
                                        expanded.sources.push(ImageSource::File(child));
                                    }
                                }
                                tracing::debug!(
                                    "📂 Expanded directory {} into {} image(s)",
                                    path.display(),
                                    expanded.sources.len() - before
                                );
                            }
                            Err(e) => {
                                tracing::warn!("⚠️ Failed to list {}: {}", path.display(), e);
                                expanded.failures.push((path_str, e));
                            }
                        }
                    } else if is_zip_path(&path) {
                        match self.archive_entries(&path).await {
                            Ok(entries) => {
                                tracing::debug!(
                                    "🗜️ Archive {} holds {} image(s)",
                                    path.display(),
                                    entries.len()
                                );
                                expanded.sources.extend(entries.into_iter().map(|entry| {
                                    ImageSource::Archive {
                                        path: path.clone(),
                                        entry,
                                    }
                                }));
                            }
                            Err(e) => {
                                tracing::warn!("⚠️ Failed to open archive {}: {}", path.display(), e);
                                expanded.failures.push((path_str, e));
                            }
                        }
                    } else {
                        expanded.sources.push(ImageSource::File(path));
                    }
                }
                other => expanded.sources.push(other),
            }
        }

        if expanded.sources.is_empty() {
            if let Some((_, e)) = expanded.failures.into_iter().next() {
                return Err(e);
            }
            return Err(Img2BaseError::EmptyInput {
                message: "no images found in the given inputs".to_string(),
            });
        }
        Ok(expanded)
    }

    pub async fn read(&self, source: &ImageSource) -> Result<Vec<u8>> {
        match source {
            ImageSource::File(path) => self.storage.read_file(&path.to_string_lossy()).await,
            ImageSource::Url(url) => self.fetch(url).await,
            ImageSource::Archive { path, entry } => {
                let archive = self.open_archive(path).await?;
                read_archive_entry(archive, entry)
            }
            ImageSource::Stdin => {
                let mut data = Vec::new();
                tokio::io::stdin().read_to_end(&mut data).await?;
                Ok(data)
            }
            ImageSource::Bytes { data, .. } => Ok(data.clone()),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        tracing::debug!("Fetching image from: {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        tracing::debug!("HTTP response status: {}", status);

        if !status.is_success() {
            return Err(Img2BaseError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(content_type) = response.headers().get(reqwest::header::CONTENT_TYPE) {
            tracing::debug!("Server reported content type {:?}", content_type);
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Returns a handle on the parsed archive at `path`, reading it from
    /// storage on first use. Handles share the same buffer.
    async fn open_archive(&self, path: &Path) -> Result<CachedArchive> {
        if let Some(archive) = self.archives.lock().await.get(path) {
            return Ok(archive.clone());
        }

        let data: Arc<[u8]> = self.storage.read_file(&path.to_string_lossy()).await?.into();
        let archive = ZipArchive::new(Cursor::new(data))?;
        self.archives
            .lock()
            .await
            .insert(path.to_path_buf(), archive.clone());
        Ok(archive)
    }

    async fn archive_entries(&self, path: &Path) -> Result<Vec<String>> {
        let archive = self.open_archive(path).await?;
        let mut entries: Vec<String> = archive
            .file_names()
            .filter(|name| !name.ends_with('/') && is_image_path(Path::new(name)))
            .map(str::to_string)
            .collect();
        entries.sort();
        Ok(entries)
    }
}

fn read_archive_entry(mut archive: CachedArchive, entry: &str) -> Result<Vec<u8>> {
    let mut file = match archive.by_name(entry) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(Img2BaseError::NotFound {
                what: format!("archive entry '{}'", entry),
            })
        }
        Err(e) => return Err(e.into()),
    };

    let declared = usize::try_from(file.size()).unwrap_or(MAX_PREALLOC);
    let mut data = Vec::with_capacity(declared.min(MAX_PREALLOC));
    file.read_to_end(&mut data)?;
    Ok(data)
}
