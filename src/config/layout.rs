use std::borrow::Cow;
use std::path::Path;

use compio::fs;
use hashlink::LinkedHashMap;
use saphyr::{LoadableYamlNode, Scalar, Yaml};
use snafu::prelude::*;
use tracing::debug;

const DIRECTORIES_KEY: &str = "directories";
const FILES_KEY: &str = "files";

/// Directories and files to seed a tree with, in insertion order.
///
/// ```yaml
/// directories:
///   - /root/sub
/// files:
///   /root/x.txt: hi
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    directories: Vec<String>,
    files: Vec<(String, String)>,
}

impl Layout {
    pub async fn from_path(path: &Path) -> Result<Self, LayoutCreationError> {
        debug!("Reading layout file: {}", path.display());
        let bytes = fs::read(path).await.context(ReadSnafu {
            file_path: path.display().to_string(),
        })?;
        let contents = String::from_utf8(bytes).context(EncodingSnafu {
            file_path: path.display().to_string(),
        })?;
        debug!("Successfully read layout file: {} bytes", contents.len());

        contents.as_str().try_into()
    }

    pub fn new(directories: Vec<String>, files: Vec<(String, String)>) -> Self {
        Self { directories, files }
    }

    pub fn directories(&self) -> &[String] {
        &self.directories
    }

    pub fn files(&self) -> &[(String, String)] {
        &self.files
    }

    fn parse_directories(
        top_level: &LinkedHashMap<Yaml, Yaml>,
    ) -> Result<Vec<String>, LayoutCreationError> {
        let directories = top_level
            .get(&Yaml::Value(Scalar::String(Cow::Borrowed(DIRECTORIES_KEY))))
            .unwrap_or(&Yaml::Sequence(Vec::new()))
            .as_sequence()
            .context(DirectoriesNotSequenceSnafu)?
            .iter()
            .filter_map(|entry| match entry.as_str() {
                Some(path) => Some(path.to_string()),
                None => {
                    debug!("Skipping invalid directory entry: {:?}", entry);
                    None
                }
            })
            .collect();

        Ok(directories)
    }

    fn parse_files(
        top_level: &LinkedHashMap<Yaml, Yaml>,
    ) -> Result<Vec<(String, String)>, LayoutCreationError> {
        let files = top_level
            .get(&Yaml::Value(Scalar::String(Cow::Borrowed(FILES_KEY))))
            .unwrap_or(&Yaml::Mapping(LinkedHashMap::new()))
            .as_mapping()
            .context(FilesNotMapSnafu)?
            .iter()
            .filter_map(|(key, value)| {
                if let Yaml::Value(Scalar::String(path)) = key {
                    if let Some(contents) = value.as_str() {
                        return Some((path.to_string(), contents.to_string()));
                    }
                }
                debug!("Skipping invalid file entry: {:?}", key);
                None
            })
            .collect();

        Ok(files)
    }
}

impl TryFrom<&str> for Layout {
    type Error = LayoutCreationError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let documents = Yaml::load_from_str(contents).context(ParseSnafu)?;
        let document = documents.first().context(MalformedLayoutSnafu)?;
        let top_level = document.as_mapping().context(TopLevelNotMapSnafu)?;

        Ok(Layout {
            directories: Self::parse_directories(top_level)?,
            files: Self::parse_files(top_level)?,
        })
    }
}

#[derive(Debug, Snafu)]
pub enum LayoutCreationError {
    #[snafu(display("Failed to read the layout file: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Layout file {} is not valid UTF-8", file_path))]
    EncodingError {
        file_path: String,
        source: std::string::FromUtf8Error,
    },
    #[snafu(display("Failed to parse the layout file"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Improperly formatted layout file"))]
    MalformedLayout,
    #[snafu(display("Top level of layout should be a map"))]
    TopLevelNotMap,
    #[snafu(display("Directories section should be a list"))]
    DirectoriesNotSequence,
    #[snafu(display("Files section should be a map of paths to contents"))]
    FilesNotMap,
}
