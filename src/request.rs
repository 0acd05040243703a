//! Validation of incoming share options.
//!
//! Everything here runs before any filesystem write. The shape of the payload
//! (inline bytes, local path, URI) is decided once, in this module.

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use url::Url;

use crate::models::{ShareFileOptions, ShareMultipleOptions};
use crate::{Error, Result};

const DEFAULT_MULTIPLE_CONTENT_TYPE: &str = "*/*";

/// Prefixes webview runtimes put in front of local paths.
const ASSET_URL_PREFIXES: &[&str] = &[
    "asset://localhost/",
    "http://asset.localhost/",
    "https://asset.localhost/",
];
const CAPACITOR_FILE_MARKER: &str = "_capacitor_file_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareSource {
    /// Base64 encoded bytes, not yet decoded.
    Inline(String),
    LocalPath(PathBuf),
}

/// A validated single-file share.
#[derive(Debug, Clone)]
pub struct ShareRequest {
    pub filename: String,
    pub content_type: String,
    pub source: ShareSource,
    pub title: String,
}

impl ShareRequest {
    pub fn from_options(options: ShareFileOptions, default_title: &str) -> Result<Self> {
        let path = present(options.path).map(|raw| strip_host_prefix(&raw));

        let filename = match present(options.filename) {
            Some(name) => sanitize_filename(&name)?,
            None => match path.as_deref().and_then(Path::file_name) {
                Some(name) => name.to_string_lossy().into_owned(),
                None => return Err(Error::NoFilename),
            },
        };

        let content_type = present(options.content_type).ok_or(Error::NoContentType)?;

        let source = match (present(options.base64_data), path) {
            (Some(data), _) => ShareSource::Inline(data),
            (None, Some(path)) => ShareSource::LocalPath(path),
            (None, None) => return Err(Error::NoData),
        };

        let title = present(options.chooser_title)
            .or_else(|| options.android.and_then(|a| present(a.chooser_title)))
            .unwrap_or_else(|| default_title.to_string());

        Ok(Self {
            filename,
            content_type,
            source,
            title,
        })
    }
}

/// One entry of a multi-file share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileReference {
    /// Already shareable; passed through untouched.
    Uri(Url),
    Path(PathBuf),
}

impl FileReference {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.starts_with("content://") || raw.starts_with("file://") {
            let url = Url::parse(raw)
                .map_err(|e| Error::InvalidArgs(format!("Malformed URI {}: {}", raw, e)))?;
            return Ok(FileReference::Uri(url));
        }
        Ok(FileReference::Path(PathBuf::from(raw)))
    }

    /// Turns the entry into something the share surface can dereference.
    /// Paths become `file://` URLs; the raw path is never handed over as is.
    pub fn resolve(self) -> Result<Url> {
        match self {
            FileReference::Uri(url) => Ok(url),
            FileReference::Path(path) => {
                let absolute = path
                    .canonicalize()
                    .map_err(|_| Error::FileNotFound(path.display().to_string()))?;
                Url::from_file_path(&absolute).map_err(|_| {
                    Error::InvalidArgs(format!("Cannot address {} as a file URL", absolute.display()))
                })
            }
        }
    }
}

/// A validated multi-file share.
#[derive(Debug, Clone)]
pub struct MultiShareRequest {
    pub files: Vec<FileReference>,
    pub content_type: String,
    pub title: String,
}

impl MultiShareRequest {
    pub fn from_options(options: ShareMultipleOptions, default_title: &str) -> Result<Self> {
        let raw_files = options.files.unwrap_or_default();
        if raw_files.is_empty() {
            return Err(Error::NoFilename);
        }

        let mut files = Vec::with_capacity(raw_files.len());
        for raw in raw_files {
            let reference = FileReference::parse(&raw)?;
            if let FileReference::Path(path) = &reference {
                if !path.exists() {
                    return Err(Error::FileNotFound(raw));
                }
            }
            files.push(reference);
        }

        Ok(Self {
            files,
            content_type: present(options.content_type)
                .unwrap_or_else(|| DEFAULT_MULTIPLE_CONTENT_TYPE.to_string()),
            title: present(options.dialog_title).unwrap_or_else(|| default_title.to_string()),
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Keeps only the final component so a filename can't escape the staging dir.
fn sanitize_filename(name: &str) -> Result<String> {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidArgs(format!("Invalid file name: {}", name)))
}

/// Removes the host specific wrapping a webview puts around local paths.
pub fn strip_host_prefix(raw: &str) -> PathBuf {
    if let Some((_, rest)) = raw.split_once(CAPACITOR_FILE_MARKER) {
        return PathBuf::from(rest);
    }

    for prefix in ASSET_URL_PREFIXES {
        if let Some(encoded) = raw.strip_prefix(prefix) {
            let decoded = percent_decode_str(encoded).decode_utf8_lossy();
            return PathBuf::from(decoded.as_ref());
        }
    }

    if raw.starts_with("file://") {
        if let Some(path) = Url::parse(raw).ok().and_then(|u| u.to_file_path().ok()) {
            return path;
        }
    }

    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AndroidShareOptions;

    fn options() -> ShareFileOptions {
        ShareFileOptions {
            filename: Some("report.pdf".into()),
            content_type: Some("application/pdf".into()),
            base64_data: Some("aGVsbG8=".into()),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_inline_request() {
        let request = ShareRequest::from_options(options(), "Share").unwrap();
        assert_eq!(request.filename, "report.pdf");
        assert_eq!(request.content_type, "application/pdf");
        assert_eq!(request.source, ShareSource::Inline("aGVsbG8=".into()));
        assert_eq!(request.title, "Share");
    }

    #[test]
    fn missing_fields_map_to_their_codes() {
        let no_name = ShareFileOptions {
            filename: None,
            ..options()
        };
        assert!(matches!(
            ShareRequest::from_options(no_name, "Share"),
            Err(Error::NoFilename)
        ));

        let no_type = ShareFileOptions {
            content_type: Some("   ".into()),
            ..options()
        };
        assert!(matches!(
            ShareRequest::from_options(no_type, "Share"),
            Err(Error::NoContentType)
        ));

        let no_data = ShareFileOptions {
            base64_data: Some(String::new()),
            ..options()
        };
        assert!(matches!(
            ShareRequest::from_options(no_data, "Share"),
            Err(Error::NoData)
        ));
    }

    #[test]
    fn filename_check_comes_before_content_type() {
        let empty = ShareFileOptions::default();
        assert!(matches!(
            ShareRequest::from_options(empty, "Share"),
            Err(Error::NoFilename)
        ));
    }

    #[test]
    fn path_supplies_missing_filename() {
        let opts = ShareFileOptions {
            filename: None,
            base64_data: None,
            path: Some("/data/user/0/app/files/photo.jpg".into()),
            content_type: Some("image/jpeg".into()),
            ..Default::default()
        };
        let request = ShareRequest::from_options(opts, "Share").unwrap();
        assert_eq!(request.filename, "photo.jpg");
        assert_eq!(
            request.source,
            ShareSource::LocalPath(PathBuf::from("/data/user/0/app/files/photo.jpg"))
        );
    }

    #[test]
    fn inline_data_wins_over_path() {
        let opts = ShareFileOptions {
            path: Some("/tmp/ignored.pdf".into()),
            ..options()
        };
        let request = ShareRequest::from_options(opts, "Share").unwrap();
        assert!(matches!(request.source, ShareSource::Inline(_)));
    }

    #[test]
    fn filename_directories_are_dropped() {
        let opts = ShareFileOptions {
            filename: Some("../../etc/passwd".into()),
            ..options()
        };
        assert_eq!(
            ShareRequest::from_options(opts, "Share").unwrap().filename,
            "passwd"
        );

        let opts = ShareFileOptions {
            filename: Some("..".into()),
            ..options()
        };
        assert!(matches!(
            ShareRequest::from_options(opts, "Share"),
            Err(Error::InvalidArgs(_))
        ));
    }

    #[test]
    fn chooser_title_sources() {
        let opts = ShareFileOptions {
            android: Some(AndroidShareOptions {
                chooser_title: Some("Send via".into()),
            }),
            ..options()
        };
        assert_eq!(
            ShareRequest::from_options(opts, "Share").unwrap().title,
            "Send via"
        );

        let opts = ShareFileOptions {
            chooser_title: Some("Export".into()),
            android: Some(AndroidShareOptions {
                chooser_title: Some("Send via".into()),
            }),
            ..options()
        };
        assert_eq!(
            ShareRequest::from_options(opts, "Share").unwrap().title,
            "Export"
        );
    }

    #[test]
    fn strips_host_prefixes() {
        assert_eq!(
            strip_host_prefix("asset://localhost/%2Fhome%2Fme%2Fmy%20notes.txt"),
            PathBuf::from("/home/me/my notes.txt")
        );
        assert_eq!(
            strip_host_prefix("http://asset.localhost/%2Fdata%2Fphoto.jpg"),
            PathBuf::from("/data/photo.jpg")
        );
        assert_eq!(
            strip_host_prefix("http://localhost/_capacitor_file_/storage/doc.pdf"),
            PathBuf::from("/storage/doc.pdf")
        );
        assert_eq!(
            strip_host_prefix("/already/plain.txt"),
            PathBuf::from("/already/plain.txt")
        );
    }

    #[cfg(unix)]
    #[test]
    fn strips_file_url() {
        assert_eq!(
            strip_host_prefix("file:///tmp/with%20space.txt"),
            PathBuf::from("/tmp/with space.txt")
        );
    }

    #[test]
    fn multiple_rejects_empty_list() {
        let opts = ShareMultipleOptions {
            files: Some(vec![]),
            ..Default::default()
        };
        assert!(matches!(
            MultiShareRequest::from_options(opts, "Share"),
            Err(Error::NoFilename)
        ));
        assert!(matches!(
            MultiShareRequest::from_options(ShareMultipleOptions::default(), "Share"),
            Err(Error::NoFilename)
        ));
    }

    #[test]
    fn multiple_passes_uris_through_unchecked() {
        let opts = ShareMultipleOptions {
            files: Some(vec!["content://media/external/images/1234".into()]),
            ..Default::default()
        };
        let request = MultiShareRequest::from_options(opts, "Share").unwrap();
        assert_eq!(request.content_type, "*/*");
        assert_eq!(request.title, "Share");
        let url = request.files.into_iter().next().unwrap().resolve().unwrap();
        assert_eq!(url.as_str(), "content://media/external/images/1234");
    }

    #[test]
    fn multiple_names_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("a.txt");
        std::fs::write(&existing, b"a").unwrap();
        let missing = dir.path().join("b.txt");

        let opts = ShareMultipleOptions {
            files: Some(vec![
                existing.display().to_string(),
                missing.display().to_string(),
            ]),
            ..Default::default()
        };
        match MultiShareRequest::from_options(opts, "Share") {
            Err(err @ Error::FileNotFound(_)) => {
                assert_eq!(err.to_string(), format!("File not found: {}", missing.display()))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn existing_path_resolves_to_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("a.txt");
        std::fs::write(&existing, b"a").unwrap();

        let url = FileReference::parse(&existing.display().to_string())
            .unwrap()
            .resolve()
            .unwrap();
        assert_eq!(url.scheme(), "file");
        assert_eq!(
            url.to_file_path().unwrap(),
            existing.canonicalize().unwrap()
        );
    }
}
