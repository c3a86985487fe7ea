use std::io::ErrorKind;
use std::path::PathBuf;

use bytes::Bytes;
use thiserror::Error;
use tokio::fs;

use crate::mime;

const INDEX_PAGE: &str = "index.html";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("not found")]
    NotFound,

    #[error("path escapes the document root")]
    OutsideRoot,

    #[error("invalid request path")]
    InvalidPath,

    #[error(transparent)]
    Io(std::io::Error),
}

impl From<std::io::Error> for ResolveError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => Self::NotFound,
            _ => Self::Io(e),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Resolved {
    pub path: PathBuf,
    pub mimetype: &'static str,
}

/// Maps request targets onto regular files under a document root.
#[derive(Clone, Debug)]
pub struct Resolver {
    root: PathBuf,
}

impl Resolver {
    #[inline]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn resolve(&self, target: &[u8]) -> Result<Resolved, ResolveError> {
        let relative = normalize(target)?;

        let mut path = self.root.join(relative);

        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => path.push(INDEX_PAGE),
            Ok(_) => {}
            // extension-less pages are looked up as `.html`, except for the index page
            Err(_) if path.extension().is_none() => {
                let candidate = path.with_extension("html");
                if candidate.file_name().and_then(|name| name.to_str()) != Some(INDEX_PAGE) {
                    path = candidate;
                }
            }
            Err(_) => {}
        }

        // symlinks could still point outside of the root
        let root = fs::canonicalize(&self.root).await?;
        let real = fs::canonicalize(&path).await?;
        if !real.starts_with(&root) {
            return Err(ResolveError::OutsideRoot);
        }

        if !fs::metadata(&real).await?.is_file() {
            return Err(ResolveError::NotFound);
        }

        let mimetype = mime::guess(&path);
        Ok(Resolved { path, mimetype })
    }

    /// Resolve the target and read the whole file.
    pub async fn load(&self, target: &[u8]) -> Result<(Bytes, &'static str), ResolveError> {
        let Resolved { path, mimetype } = self.resolve(target).await?;
        let contents = fs::read(&path).await?;
        Ok((Bytes::from(contents), mimetype))
    }
}

/// Lexically normalize a request target into a path relative to the document root.
fn normalize(target: &[u8]) -> Result<PathBuf, ResolveError> {
    let target = std::str::from_utf8(target).map_err(|_| ResolveError::InvalidPath)?;

    let target = match target.find(['?', '#']) {
        Some(at) => &target[..at],
        None => target,
    };

    if target.contains('\0') {
        return Err(ResolveError::InvalidPath);
    }

    let mut segments = Vec::new();

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(ResolveError::OutsideRoot);
                }
            }
            segment => segments.push(segment),
        }
    }

    Ok(segments.into_iter().collect())
}
