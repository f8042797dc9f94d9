//! Fetch pre-generated dataset files from Google Drive.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use thiserror::Error;

const DRIVE_URL: &str = "https://docs.google.com/uc";
const DRIVE_CONTENT_URL: &str = "https://drive.usercontent.google.com/download";
const CHUNK_SIZE: usize = 32 * 1024;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request for file '{id}' failed: {message}")]
    Http { id: String, message: String },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Google Drive answered with a page instead of file '{id}' (quota exceeded or file not shared?)")]
    ConfirmationPage { id: String },
}

pub type Result<T> = std::result::Result<T, DownloadError>;

/// Download the Drive file `id` into `destination`.
///
/// Large files are answered with a virus-scan warning first; the confirm
/// token from its cookie or form is sent back to get the content. The body is
/// streamed to `<destination>.part` and renamed once complete. Returns the
/// number of bytes written.
pub fn download_file_from_google_drive(id: &str, destination: &Path) -> Result<u64> {
    let http = |e: ureq::Error| DownloadError::Http {
        id: id.to_string(),
        message: e.to_string(),
    };

    info!("downloading Drive file {id} to {}", destination.display());
    let agent = ureq::AgentBuilder::new().build();

    let response = agent
        .get(DRIVE_URL)
        .query("export", "download")
        .query("id", id)
        .call()
        .map_err(http)?;

    let warning = WarningCookie::find(&response.all("set-cookie"));
    let response = if let Some(warning) = warning {
        debug!("confirming download of {id} with cookie token");
        agent
            .get(DRIVE_URL)
            .query("export", "download")
            .query("id", id)
            .query("confirm", &warning.token)
            .set("Cookie", &warning.pair)
            .call()
            .map_err(http)?
    } else if is_html(&response) {
        let page = response.into_string().map_err(|source| DownloadError::Io {
            path: destination.to_path_buf(),
            source,
        })?;
        let form = ConfirmForm::parse(&page).ok_or_else(|| DownloadError::ConfirmationPage {
            id: id.to_string(),
        })?;
        debug!("confirming download of {id} through the warning form");
        let mut request = agent
            .get(DRIVE_CONTENT_URL)
            .query("export", "download")
            .query("id", id)
            .query("confirm", &form.confirm);
        if let Some(uuid) = &form.uuid {
            request = request.query("uuid", uuid);
        }
        request.call().map_err(http)?
    } else {
        response
    };

    if is_html(&response) {
        return Err(DownloadError::ConfirmationPage { id: id.to_string() });
    }

    let written = save_response_content(response.into_reader(), destination)?;
    info!("downloaded {written} bytes to {}", destination.display());
    Ok(written)
}

fn is_html(response: &ureq::Response) -> bool {
    response.content_type().starts_with("text/html")
}

fn save_response_content(mut reader: impl Read, destination: &Path) -> Result<u64> {
    let mut part = destination.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);

    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| DownloadError::Io { path, source }
    };

    let result = File::create(&part)
        .map_err(io_err(&part))
        .and_then(|file| stream_chunks(&mut reader, file).map_err(io_err(&part)))
        .and_then(|written| {
            std::fs::rename(&part, destination)
                .map(|_| written)
                .map_err(io_err(destination))
        });

    if result.is_err() && part.exists() {
        if let Err(e) = std::fs::remove_file(&part) {
            warn!("could not remove {}: {e}", part.display());
        }
    }
    result
}

fn stream_chunks(reader: &mut impl Read, file: File) -> std::io::Result<u64> {
    let mut writer = BufWriter::new(file);
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut written = 0u64;

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        written += n as u64;
    }
    writer.flush()?;
    Ok(written)
}

/// The `download_warning*` cookie of the first answer. Drive only honours the
/// confirm token when the cookie is sent back with it.
#[derive(Debug, PartialEq)]
struct WarningCookie {
    pair: String,
    token: String,
}

impl WarningCookie {
    fn find(set_cookie: &[&str]) -> Option<Self> {
        set_cookie.iter().find_map(|header| {
            let pair = header.split(';').next()?.trim();
            let (name, value) = pair.split_once('=')?;
            name.trim().starts_with("download_warning").then(|| WarningCookie {
                pair: pair.to_string(),
                token: value.trim().to_string(),
            })
        })
    }
}

/// Hidden fields of the "can't scan this file for viruses" page.
#[derive(Debug, PartialEq)]
struct ConfirmForm {
    confirm: String,
    uuid: Option<String>,
}

impl ConfirmForm {
    fn parse(page: &str) -> Option<Self> {
        let confirm = input_value(page, "confirm").or_else(|| link_token(page))?;
        Some(ConfirmForm {
            confirm,
            uuid: input_value(page, "uuid"),
        })
    }
}

fn input_value(page: &str, name: &str) -> Option<String> {
    let marker = format!("name=\"{name}\" value=\"");
    let start = page.find(&marker)? + marker.len();
    let len = page[start..].find('"')?;
    Some(page[start..start + len].to_string())
}

/// Older pages only carry the token inside a `confirm=<token>` link.
fn link_token(page: &str) -> Option<String> {
    let start = page.find("confirm=")? + "confirm=".len();
    let token: String = page[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_cookie_is_found() {
        let headers = [
            "NID=abc; Path=/",
            "download_warning_13058876669334088843_0BxHF82g=Xy_9; Domain=.docs.google.com",
        ];
        assert_eq!(
            WarningCookie::find(&headers),
            Some(WarningCookie {
                pair: "download_warning_13058876669334088843_0BxHF82g=Xy_9".to_string(),
                token: "Xy_9".to_string(),
            })
        );
        assert_eq!(WarningCookie::find(&["NID=abc"]), None);
    }

    #[test]
    fn form_fields_are_extracted() {
        let page = r#"<form action="https://drive.usercontent.google.com/download">
            <input type="hidden" name="id" value="abc">
            <input type="hidden" name="confirm" value="t">
            <input type="hidden" name="uuid" value="1234-5678">
        </form>"#;
        assert_eq!(
            ConfirmForm::parse(page),
            Some(ConfirmForm {
                confirm: "t".to_string(),
                uuid: Some("1234-5678".to_string()),
            })
        );
    }

    #[test]
    fn legacy_link_token() {
        let page = r#"<a href="/uc?export=download&amp;confirm=AbC-1&amp;id=x">Download anyway</a>"#;
        let form = ConfirmForm::parse(page).unwrap();
        assert_eq!(form.confirm, "AbC-1");
        assert_eq!(form.uuid, None);
    }

    #[test]
    fn page_without_token() {
        assert_eq!(ConfirmForm::parse("<html>Quota exceeded</html>"), None);
    }

    #[test]
    fn content_is_streamed_then_renamed() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("data.h5");
        let body = vec![7u8; CHUNK_SIZE * 2 + 5];

        let written = save_response_content(body.as_slice(), &dest).unwrap();

        assert_eq!(written, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
        assert!(!dir.path().join("data.h5.part").exists());
    }

    struct BrokenStream {
        sent: bool,
    }

    impl Read for BrokenStream {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.sent {
                return Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"));
            }
            self.sent = true;
            buf[..4].copy_from_slice(b"HDF5");
            Ok(4)
        }
    }

    #[test]
    fn interrupted_stream_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("data.h5");

        let err = save_response_content(BrokenStream { sent: false }, &dest).unwrap_err();

        assert!(matches!(err, DownloadError::Io { .. }));
        assert!(!dest.exists());
        assert!(!dir.path().join("data.h5.part").exists());
    }
}
