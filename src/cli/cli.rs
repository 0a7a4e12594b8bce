use std::path::PathBuf;

use clap::Parser;

use crate::application::data::LogLevel;

/// Build an in-memory file tree and print it.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Cli {
    /// YAML layout listing directories and files to insert first
    pub layout: Option<PathBuf>,
    #[clap(long, short, default_value = "warn", value_enum)]
    pub log_level: LogLevel,
    /// Directory to insert, may be repeated
    #[clap(long = "dir", short = 'd', value_name = "PATH")]
    pub directories: Vec<String>,
    /// File to insert as PATH or PATH=CONTENTS, may be repeated
    #[clap(long = "file", short = 'f', value_name = "PATH[=CONTENTS]")]
    pub files: Vec<String>,
    /// Path to report on after the tree is built, may be repeated
    #[clap(long = "stat", short = 's', value_name = "PATH")]
    pub stats: Vec<String>,
    /// Maximum number of nodes the tree may hold at once
    #[clap(long)]
    pub node_limit: Option<usize>,
    /// Verify the tree after every change, also in release builds
    #[clap(long)]
    pub self_check: bool,
}
