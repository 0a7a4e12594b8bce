use colored::Colorize;
use snafu::prelude::*;
use tracing::{debug, info, warn};

use crate::application::RuntimeConfig;
use crate::config::{Layout, LayoutCreationError};
use crate::filesystem::{FileTree, NodeStat, TreeError};

pub struct Application;

impl Application {
    pub async fn run(runtime_config: impl Into<RuntimeConfig>) -> Result<(), ApplicationError> {
        let runtime_config: RuntimeConfig = runtime_config.into();
        let mut tree = Self::build(&runtime_config).await?;

        print!("{}", Self::listing(&tree));
        for path in &runtime_config.stats {
            match tree.stat(path) {
                Ok(stat) => println!("{}", Self::describe(path, stat)),
                Err(error) => warn!("Cannot stat {}: {}", path, error),
            }
        }

        tree.destroy().context(FileTreeSnafu)?;

        Ok(())
    }

    /// Creates an initialized tree holding the layout file's entries followed
    /// by the ones given on the command line. Entries the tree rejects are
    /// logged and skipped.
    pub async fn build(runtime_config: &RuntimeConfig) -> Result<FileTree<String>, ApplicationError> {
        let layout = match &runtime_config.layout {
            Some(path) => Layout::from_path(path).await.context(LayoutSnafu)?,
            None => Layout::default(),
        };
        debug!("Loaded layout: {:?}", layout);
        let arguments = Layout::new(
            runtime_config.directories.clone(),
            runtime_config.files.clone(),
        );

        let mut tree = FileTree::new(runtime_config.tree.clone());
        tree.init().context(FileTreeSnafu)?;
        let rejected = Self::apply(&mut tree, &layout) + Self::apply(&mut tree, &arguments);
        info!(
            "Built tree with {} nodes, {} entries rejected",
            tree.count(),
            rejected
        );

        Ok(tree)
    }

    /// Preorder listing, one node per line, directories highlighted.
    pub fn listing(tree: &FileTree<String>) -> String {
        tree.nodes()
            .into_iter()
            .map(|node| match node.file() {
                Some(file) => format!(
                    "{} {}\n",
                    node.path(),
                    format!("({} bytes)", file.length()).dimmed()
                ),
                None => format!("{}\n", node.path().as_str().blue().bold()),
            })
            .collect()
    }

    fn describe(path: &str, stat: NodeStat) -> String {
        match stat {
            NodeStat::Directory => format!("{path}: directory"),
            NodeStat::File { size } => format!("{path}: file, {size} bytes"),
        }
    }

    fn apply(tree: &mut FileTree<String>, layout: &Layout) -> usize {
        let mut rejected = 0;

        for path in layout.directories() {
            if let Err(error) = tree.insert_directory(path) {
                warn!("Skipping directory {}: {}", path, error);
                rejected += 1;
            }
        }
        for (path, contents) in layout.files() {
            if let Err(error) = tree.insert_file(path, contents.clone(), contents.len()) {
                warn!("Skipping file {}: {}", path, error);
                rejected += 1;
            }
        }

        rejected
    }
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure encountered while loading the layout"))]
    LayoutError { source: LayoutCreationError },
    #[snafu(display("Critical failure encountered while managing the file tree"))]
    FileTreeError { source: TreeError },
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::filesystem::TreeConfig;

    fn config(directories: &[&str], files: &[(&str, &str)]) -> RuntimeConfig {
        RuntimeConfig {
            directories: directories.iter().map(|path| path.to_string()).collect(),
            files: files
                .iter()
                .map(|(path, contents)| (path.to_string(), contents.to_string()))
                .collect(),
            ..RuntimeConfig::default()
        }
    }

    #[compio::test]
    async fn build_inserts_command_line_entries() {
        let runtime_config = config(&["/r/a"], &[("/r/a/x.txt", "hi")]);

        let tree = Application::build(&runtime_config)
            .await
            .expect("tree is built");

        assert_eq!(tree.count(), 3);
        assert!(tree.contains_directory("/r/a"));
        assert_eq!(
            tree.get_file_contents("/r/a/x.txt"),
            Ok(&"hi".to_string())
        );
        assert_eq!(tree.stat("/r/a/x.txt"), Ok(NodeStat::File { size: 2 }));
    }

    #[compio::test]
    async fn build_skips_rejected_entries() {
        let runtime_config = config(&["/r/a", "relative", "/other", "/r/a"], &[("/r", "")]);

        let tree = Application::build(&runtime_config)
            .await
            .expect("tree is built");

        assert_eq!(tree.count(), 2);
        assert!(tree.contains_directory("/r"));
        assert!(!tree.contains_directory("/other"));
    }

    #[compio::test]
    async fn build_applies_layout_before_arguments() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        write!(
            file,
            "directories:\n  - /r/a\nfiles:\n  /r/a/x.txt: from layout\n"
        )
        .expect("Failed to write to temp file");
        let runtime_config = RuntimeConfig {
            layout: Some(file.path().to_path_buf()),
            ..config(&["/r/b"], &[("/r/a/x.txt", "from arguments")])
        };

        let tree = Application::build(&runtime_config)
            .await
            .expect("tree is built");

        assert_eq!(tree.count(), 4);
        assert_eq!(
            tree.get_file_contents("/r/a/x.txt"),
            Ok(&"from layout".to_string())
        );
    }

    #[compio::test]
    async fn build_fails_on_missing_layout() {
        let runtime_config = RuntimeConfig {
            layout: Some(PathBuf::from("nonexistent-layout.yaml")),
            ..RuntimeConfig::default()
        };

        let result = Application::build(&runtime_config).await;

        assert!(matches!(result, Err(ApplicationError::LayoutError { .. })));
    }

    #[compio::test]
    async fn build_respects_node_limit() {
        let runtime_config = RuntimeConfig {
            tree: TreeConfig {
                node_limit: Some(2),
                self_check: true,
            },
            ..config(&["/r/a/b", "/r/a"], &[])
        };

        let tree = Application::build(&runtime_config)
            .await
            .expect("tree is built");

        assert_eq!(tree.count(), 2);
        assert!(!tree.contains_directory("/r/a/b"));
    }

    #[compio::test]
    async fn listing_follows_preorder() {
        let runtime_config = config(&["/r/b", "/r/a"], &[("/r/z.txt", "zz"), ("/r/a/y.txt", "")]);
        let tree = Application::build(&runtime_config)
            .await
            .expect("tree is built");

        let listing = Application::listing(&tree);

        let positions: Vec<_> = ["/r", "/r/z.txt", "/r/a", "/r/a/y.txt", "/r/b"]
            .iter()
            .map(|path| listing.find(path).expect("path is listed"))
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(listing.lines().count(), 5);
        assert!(listing.contains("(2 bytes)"));
    }

    #[test]
    fn describe_reports_kind_and_size() {
        assert_eq!(
            Application::describe("/r", NodeStat::Directory),
            "/r: directory"
        );
        assert_eq!(
            Application::describe("/r/x", NodeStat::File { size: 7 }),
            "/r/x: file, 7 bytes"
        );
    }

    #[compio::test]
    async fn run_destroys_the_tree() {
        let runtime_config = RuntimeConfig {
            stats: vec!["/r/a".to_string(), "/r/missing".to_string()],
            ..config(&["/r/a"], &[])
        };

        let result = Application::run(runtime_config).await;

        assert!(result.is_ok());
    }
}
