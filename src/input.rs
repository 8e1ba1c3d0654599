use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedInput {
    Stdin,
    File(PathBuf),
}

#[derive(Debug, Error)]
pub enum ParseInputError {
    #[error("input is empty")]
    Empty,
    #[error("only file URLs can be read, got {0}")]
    UnsupportedScheme(String),
    #[error("file URL does not name a local path")]
    InvalidFileUrl,
}

pub fn parse_input(raw: &str) -> Result<ParsedInput, ParseInputError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseInputError::Empty);
    }
    if trimmed == "-" {
        return Ok(ParsedInput::Stdin);
    }

    // Windows drive letters parse as single-letter schemes
    if let Ok(url) = Url::parse(trimmed) {
        match url.scheme() {
            "file" => {
                return url
                    .to_file_path()
                    .map(ParsedInput::File)
                    .map_err(|_| ParseInputError::InvalidFileUrl);
            }
            scheme if scheme.len() > 1 => {
                return Err(ParseInputError::UnsupportedScheme(scheme.to_string()));
            }
            _ => {}
        }
    }

    Ok(ParsedInput::File(PathBuf::from(trimmed)))
}

impl ParsedInput {
    pub fn read(&self) -> io::Result<String> {
        match self {
            ParsedInput::Stdin => {
                let mut html = String::new();
                io::stdin().read_to_string(&mut html)?;
                Ok(html)
            }
            ParsedInput::File(path) => fs::read_to_string(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_paths() {
        assert_eq!(
            parse_input(" docs/index.html ").unwrap(),
            ParsedInput::File(PathBuf::from("docs/index.html"))
        );
        assert_eq!(parse_input("-").unwrap(), ParsedInput::Stdin);
    }

    #[test]
    fn parses_file_urls() {
        assert_eq!(
            parse_input("file:///tmp/page.html").unwrap(),
            ParsedInput::File(PathBuf::from("/tmp/page.html"))
        );
    }

    #[test]
    fn rejects_remote_urls() {
        assert!(matches!(
            parse_input("https://example.com/page.html"),
            Err(ParseInputError::UnsupportedScheme(scheme)) if scheme == "https"
        ));
    }

    #[test]
    fn rejects_empty() {
        assert!(parse_input("   ").is_err());
    }

    #[test]
    fn reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        fs::write(&path, "<p>hi</p>").unwrap();
        assert_eq!(ParsedInput::File(path).read().unwrap(), "<p>hi</p>");
    }
}
