//! Artifact naming and delivery

use crate::record::DataRecord;
use crate::Result;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

/// Default directory filled PDFs are written to
pub const DEFAULT_OUTPUT_DIR: &str = "output/filled-pdfs";

/// Filled document bytes plus the name it should be saved under
#[derive(Debug, Clone, PartialEq)]
pub struct FilledArtifact {
    pub bytes: Vec<u8>,
    pub filename: String,
}

impl FilledArtifact {
    pub fn new(bytes: Vec<u8>, filename: String) -> Self {
        Self { bytes, filename }
    }
}

/// `"<formType> - <YYYY-MM-DD> - <client name>.pdf"`
///
/// The client name is `firstName lastName`, or `client` when both are
/// missing. `form_type` falls back to `template_id`.
pub fn suggested_filename(
    form_type: Option<&str>,
    template_id: &str,
    date: NaiveDate,
    record: &DataRecord,
) -> String {
    let form_type = form_type
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(template_id);

    let part = |id: &str| record.value(id).map(|v| v.display()).unwrap_or_default();
    let full_name = format!("{} {}", part("firstName"), part("lastName"));
    let client = match full_name.trim() {
        "" => "client",
        name => name,
    };

    let name = format!("{} - {} - {}.pdf", form_type, date.format("%Y-%m-%d"), client);
    sanitize(&name)
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Host-side destination for filled artifacts
pub trait ArtifactSink {
    /// Store the artifact and return where it ended up
    fn deliver(&self, artifact: &FilledArtifact) -> Result<PathBuf>;
}

/// Writes artifacts under one fixed directory, keyed by filename
#[derive(Debug, Clone)]
pub struct OutputDirectory {
    dir: PathBuf,
}

impl Default for OutputDirectory {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_DIR)
    }
}

impl OutputDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSink for OutputDirectory {
    fn deliver(&self, artifact: &FilledArtifact) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        // Names may be built by hand rather than by `suggested_filename`
        let filename = sanitize(&artifact.filename);
        let path = self.dir.join(filename);
        fs::write(&path, &artifact.bytes)?;
        log::info!("saved {} ({} bytes)", path.display(), artifact.bytes.len());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn test_suggested_filename() {
        let record = DataRecord::new()
            .with("firstName", "محمد")
            .with("lastName", "حسن");
        assert_eq!(
            suggested_filename(Some("public"), "car-public", date(), &record),
            "public - 2024-03-09 - محمد حسن.pdf"
        );
    }

    #[test]
    fn test_suggested_filename_fallbacks() {
        let empty = DataRecord::new().with("firstName", "");
        assert_eq!(
            suggested_filename(None, "motorcycle-exam", date(), &empty),
            "motorcycle-exam - 2024-03-09 - client.pdf"
        );

        let last_only = DataRecord::new().with("lastName", "Khoury");
        assert_eq!(
            suggested_filename(Some(" "), "car-public", date(), &last_only),
            "car-public - 2024-03-09 - Khoury.pdf"
        );
    }

    #[test]
    fn test_suggested_filename_is_one_component() {
        let record = DataRecord::new().with("firstName", "../a/b");
        let name = suggested_filename(Some("x\\y"), "t", date(), &record);
        assert_eq!(name, "x_y - 2024-03-09 - .._a_b.pdf");
    }

    #[test]
    fn test_output_directory_creates_and_writes() {
        let dir = tempfile::tempdir().unwrap();
        let sink = OutputDirectory::new(dir.path().join("output").join("filled-pdfs"));
        let artifact =
            FilledArtifact::new(b"%PDF-1.5".to_vec(), "a - 2024-03-09 - client.pdf".into());

        let path = sink.deliver(&artifact).unwrap();
        assert_eq!(path, sink.dir().join("a - 2024-03-09 - client.pdf"));
        assert_eq!(fs::read(&path).unwrap(), b"%PDF-1.5");

        // Same name overwrites
        let again = FilledArtifact::new(b"%PDF-1.7".to_vec(), artifact.filename.clone());
        sink.deliver(&again).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"%PDF-1.7");
    }

    #[test]
    fn test_default_output_directory() {
        assert_eq!(OutputDirectory::default().dir(), Path::new("output/filled-pdfs"));
    }
}
