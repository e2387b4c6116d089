//! Template storage

use crate::schema::FormSchema;
use crate::{FillError, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const SOURCE_FILE: &str = "source.pdf";
const MAPPING_FILE: &str = "mapping.json";
const SCHEMA_FILE: &str = "schema.json";

/// Read access to templates keyed by id
pub trait TemplateStore {
    /// Template document bytes
    fn source(&self, template_id: &str) -> io::Result<Vec<u8>>;

    /// Arabic-capable font shared by every template
    fn font(&self) -> io::Result<Vec<u8>>;

    /// Raw `mapping.json` bytes
    fn mapping(&self, template_id: &str) -> io::Result<Vec<u8>>;

    fn schema(&self, template_id: &str) -> Result<FormSchema>;
}

/// Templates laid out as `<root>/<id>/{source.pdf,mapping.json,schema.json}`
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
    font_path: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>, font_path: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            font_path: font_path.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ids of every subdirectory holding a `source.pdf`, sorted
    pub fn template_ids(&self) -> io::Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.path().join(SOURCE_FILE).is_file() {
                continue;
            }
            if let Some(id) = entry.file_name().to_str() {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn template_file(&self, template_id: &str, file: &str) -> io::Result<PathBuf> {
        let valid = !template_id.is_empty()
            && template_id != "."
            && template_id != ".."
            && !template_id.contains(['/', '\\']);
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid template id: {template_id:?}"),
            ));
        }
        Ok(self.root.join(template_id).join(file))
    }

    fn read(&self, template_id: &str, file: &str) -> io::Result<Vec<u8>> {
        let path = self.template_file(template_id, file)?;
        log::debug!("reading {}", path.display());
        fs::read(path)
    }
}

impl TemplateStore for DirectoryStore {
    fn source(&self, template_id: &str) -> io::Result<Vec<u8>> {
        self.read(template_id, SOURCE_FILE)
    }

    fn font(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.font_path)
    }

    fn mapping(&self, template_id: &str) -> io::Result<Vec<u8>> {
        self.read(template_id, MAPPING_FILE)
    }

    fn schema(&self, template_id: &str) -> Result<FormSchema> {
        let bytes = self.read(template_id, SCHEMA_FILE)?;
        let json = String::from_utf8(bytes)
            .map_err(|e| FillError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        FormSchema::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn empty_store() -> (TempDir, DirectoryStore) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("font.ttf"), b"font").unwrap();
        let store = DirectoryStore::new(dir.path(), dir.path().join("font.ttf"));
        (dir, store)
    }

    fn add_file(dir: &TempDir, template_id: &str, name: &str, content: &str) {
        let template_dir = dir.path().join(template_id);
        fs::create_dir_all(&template_dir).unwrap();
        fs::write(template_dir.join(name), content).unwrap();
    }

    #[test]
    fn test_reads_template_files() {
        let (dir, store) = empty_store();
        add_file(&dir, "car-public", "source.pdf", "%PDF");
        add_file(&dir, "car-public", "mapping.json", r#"{"fields": []}"#);
        add_file(
            &dir,
            "car-public",
            "schema.json",
            r#"{"title": "Car", "formType": "public", "fields": []}"#,
        );

        assert_eq!(store.source("car-public").unwrap(), b"%PDF");
        assert_eq!(store.mapping("car-public").unwrap(), br#"{"fields": []}"#);
        assert_eq!(store.font().unwrap(), b"font");
        assert_eq!(store.schema("car-public").unwrap().form_type.as_deref(), Some("public"));
    }

    #[test]
    fn test_missing_files() {
        let (dir, store) = empty_store();
        add_file(&dir, "motorcycle-exam", "source.pdf", "%PDF");

        let err = store.mapping("motorcycle-exam").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(store.source("car-public").is_err());
        assert!(store.schema("motorcycle-exam").is_err());
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let (_dir, store) = empty_store();
        for id in ["", "..", "../etc", "a/b", "a\\b"] {
            let err = store.source(id).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{id}");
        }
    }

    #[test]
    fn test_template_ids() {
        let (dir, store) = empty_store();
        add_file(&dir, "motorcycle-request", "source.pdf", "%PDF");
        add_file(&dir, "car-private-auto", "source.pdf", "%PDF");
        add_file(&dir, "drafts", "notes.txt", "");
        fs::write(dir.path().join("stray.pdf"), b"").unwrap();

        assert_eq!(
            store.template_ids().unwrap(),
            vec!["car-private-auto".to_string(), "motorcycle-request".to_string()]
        );
    }
}
