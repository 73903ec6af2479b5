//! Find the file holding each spectral band

use super::SpectralBand;
use greenstack_core::{Error, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Where the band files of one acquisition period live
#[derive(Debug, Clone)]
pub enum BandSource {
    /// A directory, scanned recursively (an unpacked `.SAFE` product works)
    Directory(PathBuf),
    /// An explicit list of files
    Files(Vec<PathBuf>),
}

impl BandSource {
    /// Candidate files in a stable order
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        match self {
            BandSource::Files(files) => Ok(files.clone()),
            BandSource::Directory(dir) => {
                if !dir.is_dir() {
                    return Err(Error::NoInput(format!(
                        "{} is not a directory",
                        dir.display()
                    )));
                }
                let mut files = Vec::new();
                for entry in WalkDir::new(dir).sort_by_file_name() {
                    let entry = entry.map_err(|e| Error::Other(e.to_string()))?;
                    if entry.file_type().is_file() {
                        files.push(entry.into_path());
                    }
                }
                Ok(files)
            }
        }
    }
}

/// First file whose name contains the band code and whose extension is one
/// of `extensions` (compared case-insensitively).
///
/// Only the file name is matched, never the parent directories.
pub fn locate_band<'a>(
    band: SpectralBand,
    files: &'a [PathBuf],
    extensions: &[String],
) -> Option<&'a Path> {
    files
        .iter()
        .map(PathBuf::as_path)
        .find(|path| has_extension(path, extensions) && file_name_has(path, band.code()))
}

fn file_name_has(path: &Path, code: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |name| name.contains(code))
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |ext| {
            extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn exts() -> Vec<String> {
        vec!["jp2".into(), "tif".into(), "tiff".into()]
    }

    #[test]
    fn test_matches_on_file_name_and_extension() {
        let files: Vec<PathBuf> = vec![
            "T56HLH_20240415T000000_B04_10m.jp2.aux.xml".into(),
            "B08_dir/readme.txt".into(),
            "T56HLH_20240415T000000_B08_10m.JP2".into(),
            "T56HLH_20240415T000000_B04_10m.jp2".into(),
        ];

        assert_eq!(
            locate_band(SpectralBand::B04, &files, &exts()),
            Some(Path::new("T56HLH_20240415T000000_B04_10m.jp2"))
        );
        assert_eq!(
            locate_band(SpectralBand::B08, &files, &exts()),
            Some(Path::new("T56HLH_20240415T000000_B08_10m.JP2"))
        );
        assert_eq!(locate_band(SpectralBand::B02, &files, &exts()), None);
    }

    #[test]
    fn test_directory_is_scanned_recursively() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("GRANULE").join("IMG_DATA");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("T56_B03_10m.tif"), b"").unwrap();
        fs::write(dir.path().join("manifest.safe"), b"").unwrap();

        let files = BandSource::Directory(dir.path().to_path_buf()).files().unwrap();
        assert_eq!(files.len(), 2);
        let found = locate_band(SpectralBand::B03, &files, &exts()).unwrap();
        assert!(found.ends_with("GRANULE/IMG_DATA/T56_B03_10m.tif"));
    }

    #[test]
    fn test_missing_directory() {
        let source = BandSource::Directory("/definitely/not/here".into());
        assert!(matches!(source.files(), Err(Error::NoInput(_))));
    }
}
