use std::path::PathBuf;

use crate::cli::Cli;
use crate::filesystem::TreeConfig;

const CONTENTS_SEPARATOR: char = '=';

#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub layout: Option<PathBuf>,
    pub directories: Vec<String>,
    /// `(path, contents)` pairs. A file given without contents is empty.
    pub files: Vec<(String, String)>,
    pub stats: Vec<String>,
    pub tree: TreeConfig,
}

impl From<Cli> for RuntimeConfig {
    fn from(cli: Cli) -> Self {
        let defaults = TreeConfig::default();
        Self {
            layout: cli.layout,
            directories: cli.directories,
            files: cli.files.iter().map(|arg| split_file_arg(arg)).collect(),
            stats: cli.stats,
            tree: TreeConfig {
                node_limit: cli.node_limit,
                self_check: cli.self_check || defaults.self_check,
            },
        }
    }
}

fn split_file_arg(arg: &str) -> (String, String) {
    match arg.split_once(CONTENTS_SEPARATOR) {
        Some((path, contents)) => (path.to_string(), contents.to_string()),
        None => (arg.to_string(), String::new()),
    }
}
