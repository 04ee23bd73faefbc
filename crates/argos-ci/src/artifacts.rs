//! Workflow artifact archives: providers ship artifacts as zip files;
//! callers want the named file contents.

use std::io::{Cursor, Read};

use glob::Pattern;

use argos_core::errors::CiError;

/// One extracted file from an artifact archive.
#[derive(Debug, Clone)]
pub struct ArtifactFile {
    pub name: String,
    pub content: Vec<u8>,
}

/// Extract files from a zip archive whose names match `name_pattern`
/// (glob; `*` matches everything when the caller wants the lot).
pub fn extract_matching(archive: &[u8], name_pattern: &str) -> Result<Vec<ArtifactFile>, CiError> {
    let pattern = Pattern::new(name_pattern).map_err(|e| CiError::Archive {
        message: format!("bad artifact pattern {name_pattern}: {e}"),
    })?;

    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).map_err(|e| CiError::Archive {
        message: format!("open artifact archive: {e}"),
    })?;

    let mut files = Vec::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| CiError::Archive {
            message: format!("read archive entry {i}: {e}"),
        })?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let base_name = name.rsplit('/').next().unwrap_or(&name).to_string();
        if !pattern.matches(&name) && !pattern.matches(&base_name) {
            continue;
        }
        let mut content = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut content).map_err(|e| CiError::Archive {
            message: format!("extract {name}: {e}"),
        })?;
        files.push(ArtifactFile { name, content });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_zip() -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file("coverage.xml", options).unwrap();
            writer.write_all(b"<coverage/>").unwrap();
            writer.start_file("logs/flake8.txt", options).unwrap();
            writer.write_all(b"src/x.py:1:1: E101 bad indent").unwrap();
            writer.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn extracts_by_glob() {
        let archive = sample_zip();
        let files = extract_matching(&archive, "*.xml").unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "coverage.xml");
        assert_eq!(files[0].content, b"<coverage/>");
    }

    #[test]
    fn matches_base_name_within_directories(){
        let archive = sample_zip();
        let files = extract_matching(&archive, "flake8.txt").unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "logs/flake8.txt");
    }

    #[test]
    fn star_matches_everything() {
        let archive = sample_zip();
        let files = extract_matching(&archive, "*").unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn garbage_is_archive_error() {
        let err = extract_matching(b"not a zip", "*").unwrap_err();
        assert!(matches!(err, CiError::Archive { .. }));
    }
}
