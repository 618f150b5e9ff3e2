//! Multipart upload processing.
//!
//! Every file part is sniffed from a buffered prefix, checked against the
//! caller's policy, streamed to a hidden temporary file in the destination
//! and renamed onto its final name. A call either stores all of its files
//! or none: anything written before a failure (or before the request
//! future is dropped) is removed again.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use axum::{
    extract::multipart::{Field, Multipart, MultipartError},
    http::StatusCode,
};
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Bytes inspected when detecting a part's content type.
pub const SNIFF_LEN: usize = 512;

const MAX_FILE_NAME_LEN: usize = 255;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenamePolicy {
    /// Random name that keeps the original extension.
    #[default]
    GenerateUnique,
    /// Sanitized client-supplied name. Never replaces an existing file.
    KeepOriginal,
}

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub rename: RenamePolicy,
    /// Per-file limit. The whole body is additionally capped by the
    /// router's body limit.
    pub max_file_size: Option<u64>,
    /// Media types (without parameters) accepted after sniffing. `None`
    /// accepts anything.
    pub allowed_content_types: Option<BTreeSet<String>>,
    /// Only file parts with this form name are processed.
    pub field_name: Option<String>,
    pub max_files: Option<usize>,
}

impl UploadOptions {
    pub fn allow_content_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_content_types = Some(
            types
                .into_iter()
                .map(|t| media_type(t.as_ref()))
                .collect(),
        );
        self
    }

    fn allows(&self, content_type: &str) -> bool {
        match &self.allowed_content_types {
            Some(allowed) => allowed.contains(&media_type(content_type)),
            None => true,
        }
    }
}

/// Media types accepted as profile pictures.
pub const IMAGE_CONTENT_TYPES: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

/// Deployment-level upload settings, fixed at startup.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Existing, writable directory all uploads land in.
    pub dir: PathBuf,
    pub max_file_size: Option<u64>,
    pub allowed_content_types: Option<BTreeSet<String>>,
}

impl UploadConfig {
    /// Options for the generic upload endpoint.
    pub fn options(&self) -> UploadOptions {
        UploadOptions {
            max_file_size: self.max_file_size,
            allowed_content_types: self.allowed_content_types.clone(),
            ..Default::default()
        }
    }

    /// Options for a single profile picture in form field `field`.
    pub fn profile_picture_options(&self, field: &str) -> UploadOptions {
        UploadOptions {
            max_file_size: self.max_file_size,
            field_name: Some(field.to_owned()),
            max_files: Some(1),
            ..Default::default()
        }
        .allow_content_types(IMAGE_CONTENT_TYPES)
    }
}

/// One stored file. `original_name` is the name the client sent, as sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    pub original_name: String,
    pub stored_name: String,
    pub size: u64,
    pub content_type: String,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no file part found")]
    NoFile,
    #[error("disallowed content type {content_type} for {file_name}")]
    DisallowedContentType {
        file_name: String,
        content_type: String,
    },
    #[error("size limit exceeded: {0}")]
    SizeLimitExceeded(String),
    #[error("too many files: at most {0} allowed")]
    TooManyFiles(usize),
    #[error("file already exists: {0}")]
    AlreadyExists(String),
    #[error("malformed multipart stream: {0}")]
    Malformed(String),
    #[error("destination not writable: {0}")]
    Storage(#[from] std::io::Error),
}

impl From<MultipartError> for UploadError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            UploadError::SizeLimitExceeded(e.body_text())
        } else {
            UploadError::Malformed(e.body_text())
        }
    }
}

/// Store every file part of `multipart` in `dest`.
///
/// `dest` must already exist; it is never created here. Non-file parts and
/// parts not matching `options.field_name` are skipped. The first invalid
/// file fails the whole call and removes whatever the call had stored.
pub async fn upload_files(
    mut multipart: Multipart,
    dest: &Path,
    options: &UploadOptions,
) -> Result<Vec<UploadedFile>, UploadError> {
    let mut guard = CleanupGuard::default();
    let mut files = Vec::new();

    while let Some(mut field) = multipart.next_field().await? {
        let Some(file_name) = field.file_name().filter(|n| !n.is_empty()).map(str::to_owned)
        else {
            continue;
        };
        if let Some(wanted) = &options.field_name {
            if field.name() != Some(wanted.as_str()) {
                debug!(field = ?field.name(), "skipping unrelated file part");
                continue;
            }
        }
        if let Some(max) = options.max_files {
            if files.len() >= max {
                return Err(UploadError::TooManyFiles(max));
            }
        }

        let file = store_part(&mut field, &file_name, dest, options, &mut guard).await?;
        info!(
            original = %file.original_name,
            stored = %file.stored_name,
            size = file.size,
            content_type = %file.content_type,
            "audit: upload.stored"
        );
        files.push(file);
    }

    if files.is_empty() {
        return Err(UploadError::NoFile);
    }
    guard.commit();
    Ok(files)
}

async fn store_part(
    field: &mut Field<'_>,
    file_name: &str,
    dest: &Path,
    options: &UploadOptions,
    guard: &mut CleanupGuard,
) -> Result<UploadedFile, UploadError> {
    let original_name = file_name.to_owned();
    let over_limit = |size: u64| matches!(options.max_file_size, Some(max) if size > max);
    let too_large = || {
        UploadError::SizeLimitExceeded(format!(
            "{original_name} is larger than {} bytes",
            options.max_file_size.unwrap_or_default()
        ))
    };

    // The stream cannot be rewound, so the sniffed prefix is kept and
    // written out first.
    let mut head = Vec::with_capacity(SNIFF_LEN);
    while head.len() < SNIFF_LEN {
        match field.chunk().await? {
            Some(chunk) => head.extend_from_slice(&chunk),
            None => break,
        }
    }
    if over_limit(head.len() as u64) {
        return Err(too_large());
    }

    let content_type = sniff_content_type(&head[..head.len().min(SNIFF_LEN)]);
    if !options.allows(content_type) {
        return Err(UploadError::DisallowedContentType {
            file_name: original_name.clone(),
            content_type: content_type.to_owned(),
        });
    }

    let stored_name = match options.rename {
        RenamePolicy::GenerateUnique => unique_name(&sanitize_file_name(file_name)),
        RenamePolicy::KeepOriginal => sanitize_file_name(file_name),
    };
    let temp_path = dest.join(format!(".{}.part", random_hex()));
    let final_path = dest.join(&stored_name);

    guard.track(temp_path.clone());
    let mut file = tokio::fs::File::create(&temp_path).await?;
    file.write_all(&head).await?;
    let mut size = head.len() as u64;

    while let Some(chunk) = field.chunk().await? {
        size += chunk.len() as u64;
        if over_limit(size) {
            return Err(too_large());
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    drop(file);

    match options.rename {
        RenamePolicy::GenerateUnique => {
            tokio::fs::rename(&temp_path, &final_path).await?;
            guard.untrack(&temp_path);
            guard.track(final_path);
        }
        // Linking fails on an existing target, so a name owned by an
        // earlier upload is never replaced or tracked for cleanup here.
        RenamePolicy::KeepOriginal => {
            match tokio::fs::hard_link(&temp_path, &final_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    return Err(UploadError::AlreadyExists(stored_name));
                }
                Err(e) => return Err(e.into()),
            }
            guard.track(final_path);
            tokio::fs::remove_file(&temp_path).await?;
            guard.untrack(&temp_path);
        }
    }

    Ok(UploadedFile {
        original_name,
        stored_name,
        size,
        content_type: content_type.to_owned(),
    })
}

/// Removes every tracked path on drop unless committed.
#[derive(Debug, Default)]
struct CleanupGuard {
    paths: Vec<PathBuf>,
    committed: bool,
}

impl CleanupGuard {
    fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    fn untrack(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "removed partial upload"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partial upload"),
            }
        }
    }
}

/// Detect a content type from leading bytes.
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"BM", "image/bmp"),
        (b"%PDF-", "application/pdf"),
        (b"PK\x03\x04", "application/zip"),
        (b"\x1f\x8b\x08", "application/x-gzip"),
    ];

    if data.len() >= 14 && data.starts_with(b"RIFF") && &data[8..14] == b"WEBPVP" {
        return "image/webp";
    }
    if let Some((_, ct)) = SIGNATURES.iter().find(|(sig, _)| data.starts_with(sig)) {
        return ct;
    }
    if data.iter().any(|&b| is_binary_byte(b)) {
        "application/octet-stream"
    } else {
        "text/plain; charset=utf-8"
    }
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0b | 0x0e..=0x1a | 0x1c..=0x1f)
}

/// `image/png; q=1` -> `image/png`
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Reduce a client-supplied name to a safe basename.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    let truncated: String = cleaned.chars().take(MAX_FILE_NAME_LEN).collect();

    if truncated.is_empty() {
        "upload".to_owned()
    } else {
        truncated
    }
}

fn unique_name(original: &str) -> String {
    match Path::new(original).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{}.{}", random_hex(), ext.to_ascii_lowercase()),
        _ => random_hex(),
    }
}

/// 16 random bytes, hex encoded.
fn random_hex() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    hex::encode(bytes)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::{body::Body, extract::FromRequest, http::Request};

    pub(crate) const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01\x08\x06\0\0\0\x1f\x15\xc4\x89";

    const BOUNDARY: &str = "gatehouse-test-boundary";

    /// (form field, file name, bytes); a `None` file name makes a plain field.
    pub(crate) fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file_name, data) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(f) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn multipart(body: Vec<u8>) -> Multipart {
        let request = Request::builder()
            .method("POST")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn images_only() -> UploadOptions {
        UploadOptions::default().allow_content_types(["image/png", "image/jpeg", "image/gif"])
    }

    #[tokio::test]
    async fn stores_png_under_unique_name() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body(&[("file", Some("img.png"), PNG)]);

        let files = upload_files(multipart(body).await, dir.path(), &UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(files.len(), 1);
        let file = &files[0];
        assert_eq!(file.original_name, "img.png");
        assert_ne!(file.stored_name, "img.png");
        assert!(file.stored_name.ends_with(".png"));
        assert_eq!(file.size, PNG.len() as u64);
        assert_eq!(file.content_type, "image/png");
        assert_eq!(std::fs::read(dir.path().join(&file.stored_name)).unwrap(), PNG);
        assert_eq!(entries(dir.path()), vec![file.stored_name.clone()]);
    }

    fn keep_original() -> UploadOptions {
        UploadOptions {
            rename: RenamePolicy::KeepOriginal,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn keep_original_uses_sanitized_name() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body(&[("file", Some("../../etc/avatar.png"), PNG)]);

        let files = upload_files(multipart(body).await, dir.path(), &keep_original())
            .await
            .unwrap();

        assert_eq!(files[0].original_name, "../../etc/avatar.png");
        assert_eq!(files[0].stored_name, "avatar.png");
        assert_eq!(entries(dir.path()), vec!["avatar.png".to_owned()]);
    }

    #[tokio::test]
    async fn descriptor_keeps_client_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body(&[("file", Some("my photo (1).png"), PNG)]);

        let unique = upload_files(multipart(body.clone()).await, dir.path(), &UploadOptions::default())
            .await
            .unwrap();
        let kept = upload_files(multipart(body).await, dir.path(), &keep_original())
            .await
            .unwrap();

        assert_eq!(unique[0].original_name, "my photo (1).png");
        assert!(unique[0].stored_name.ends_with(".png"));
        assert_eq!(kept[0].original_name, "my photo (1).png");
        assert_eq!(kept[0].stored_name, "myphoto1.png");
    }

    #[tokio::test]
    async fn keep_original_refuses_to_replace_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"previous upload").unwrap();
        let body = multipart_body(&[("file", Some("a.png"), PNG)]);

        let err = upload_files(multipart(body).await, dir.path(), &keep_original())
            .await
            .unwrap_err();

        assert!(matches!(&err, UploadError::AlreadyExists(name) if name == "a.png"), "{err}");
        assert_eq!(std::fs::read(dir.path().join("a.png")).unwrap(), b"previous upload");
        assert_eq!(entries(dir.path()), vec!["a.png".to_owned()]);
    }

    #[tokio::test]
    async fn failed_call_only_removes_its_own_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"previous upload").unwrap();
        let body = multipart_body(&[
            ("file", Some("c.png"), PNG),
            ("file", Some("b.png"), &b"not an image"[..]),
        ]);
        let options = UploadOptions {
            rename: RenamePolicy::KeepOriginal,
            ..images_only()
        };

        let err = upload_files(multipart(body).await, dir.path(), &options)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::DisallowedContentType { .. }), "{err}");
        assert_eq!(entries(dir.path()), vec!["a.png".to_owned()]);
        assert_eq!(std::fs::read(dir.path().join("a.png")).unwrap(), b"previous upload");
    }

    #[tokio::test]
    async fn dropped_upload_removes_partial_file() {
        use futures::{channel::mpsc, SinkExt};

        let dir = tempfile::tempdir().unwrap();
        let (mut tx, rx) = mpsc::unbounded::<Result<Vec<u8>, std::io::Error>>();
        let request = Request::builder()
            .method("POST")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from_stream(rx))
            .unwrap();
        let multipart = Multipart::from_request(request, &()).await.unwrap();

        // Headers plus more than the sniffed prefix, then the client stalls.
        let mut head = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"big.txt\"\r\n\r\n"
        )
        .into_bytes();
        head.extend(std::iter::repeat(b'a').take(SNIFF_LEN * 2));
        tx.send(Ok(head)).await.unwrap();

        let dest = dir.path().to_path_buf();
        let task = tokio::spawn(async move {
            upload_files(multipart, &dest, &UploadOptions::default()).await
        });

        let mut started = false;
        for _ in 0..200 {
            if !entries(dir.path()).is_empty() {
                started = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(started, "upload never reached the temporary file");
        assert!(entries(dir.path())[0].ends_with(".part"));

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert!(entries(dir.path()).is_empty());
        drop(tx);
    }

    #[tokio::test]
    async fn disallowed_type_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body(&[
            ("file", Some("ok.png"), PNG),
            ("file", Some("notes.png"), &b"just some text"[..]),
        ]);

        let err = upload_files(multipart(body).await, dir.path(), &images_only())
            .await
            .unwrap_err();

        match err {
            UploadError::DisallowedContentType { file_name, content_type } => {
                assert_eq!(file_name, "notes.png");
                assert_eq!(content_type, "text/plain; charset=utf-8");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn size_limit_is_per_file_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let big = vec![b'a'; 4096];
        let body = multipart_body(&[("file", Some("small.txt"), &b"hi"[..]), ("file", Some("big.txt"), &big[..])]);
        let options = UploadOptions {
            max_file_size: Some(1024),
            ..Default::default()
        };

        let err = upload_files(multipart(body).await, dir.path(), &options)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::SizeLimitExceeded(_)), "{err}");
        assert!(err.to_string().starts_with("size limit exceeded"));
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn no_file_part_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body(&[("title", None, &b"hello"[..])]);

        let err = upload_files(multipart(body).await, dir.path(), &UploadOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::NoFile));
        assert_eq!(err.to_string(), "no file part found");
    }

    #[tokio::test]
    async fn field_name_filters_parts() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body(&[("other", Some("a.png"), PNG), ("file", Some("b.png"), PNG)]);
        let options = UploadOptions {
            field_name: Some("file".into()),
            ..Default::default()
        };

        let files = upload_files(multipart(body).await, dir.path(), &options).await.unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].original_name, "b.png");
        assert_eq!(entries(dir.path()).len(), 1);
    }

    #[tokio::test]
    async fn too_many_files_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body(&[("file", Some("a.png"), PNG), ("file", Some("b.png"), PNG)]);
        let options = UploadOptions {
            max_files: Some(1),
            ..Default::default()
        };

        let err = upload_files(multipart(body).await, dir.path(), &options)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::TooManyFiles(1)));
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn missing_destination_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body(&[("file", Some("img.png"), PNG)]);

        let err = upload_files(
            multipart(body).await,
            &dir.path().join("missing"),
            &UploadOptions::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, UploadError::Storage(_)));
        assert!(err.to_string().starts_with("destination not writable"));
        assert!(!dir.path().join("missing").exists());
    }

    #[tokio::test]
    async fn truncated_stream_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = multipart_body(&[("file", Some("img.png"), PNG)]);
        body.truncate(body.len() - 40);

        let err = upload_files(multipart(body).await, dir.path(), &UploadOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Malformed(_)), "{err}");
        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn sniffs_known_signatures() {
        assert_eq!(sniff_content_type(PNG), "image/png");
        assert_eq!(sniff_content_type(b"\xff\xd8\xff\xe0rest"), "image/jpeg");
        assert_eq!(sniff_content_type(b"GIF89a...."), "image/gif");
        assert_eq!(sniff_content_type(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(sniff_content_type(b"%PDF-1.7"), "application/pdf");
        assert_eq!(sniff_content_type(b"plain words\n"), "text/plain; charset=utf-8");
        assert_eq!(sniff_content_type(b"\0\x01\x02\x03"), "application/octet-stream");
        assert_eq!(sniff_content_type(b""), "text/plain; charset=utf-8");
    }

    #[test]
    fn allowed_types_ignore_parameters_and_case() {
        let options = UploadOptions::default().allow_content_types(["Text/Plain"]);
        assert!(options.allows("text/plain; charset=utf-8"));
        assert!(!options.allows("image/png"));
        assert!(UploadOptions::default().allows("anything/at-all"));
    }

    #[test]
    fn sanitize_strips_paths_and_hidden_prefix() {
        assert_eq!(sanitize_file_name("photo.JPG"), "photo.JPG");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\pic.png"), "pic.png");
        assert_eq!(sanitize_file_name("../../.bashrc"), "bashrc");
        assert_eq!(sanitize_file_name("my photo (1).png"), "myphoto1.png");
        assert_eq!(sanitize_file_name("..."), "upload");
    }

    #[test]
    fn unique_names_keep_lowercased_extension() {
        let a = unique_name("Photo.PNG");
        let b = unique_name("Photo.PNG");
        assert!(a.ends_with(".png"));
        assert_eq!(a.len(), 32 + 4);
        assert_ne!(a, b);
        assert_eq!(unique_name("README").len(), 32);
    }
}
