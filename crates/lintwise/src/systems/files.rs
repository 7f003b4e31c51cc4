use async_trait::async_trait;
use ignore::WalkBuilder;
use indoc::indoc;
use regex::Regex;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::capabilities::System;
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::Tool;
use crate::systems::truncate_output;

const MAX_FILE_CHARS: usize = 100_000;
const MAX_SEARCH_RESULTS: usize = 200;
const SKIPPED_DIRS: &[&str] = &["target", "node_modules", "build", "dist", "__pycache__"];

/// File reading, writing, listing and searching below a root directory
pub struct FileSystem {
    tools: Vec<Tool>,
    root: PathBuf,
}

impl FileSystem {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        let read_file = Tool::new(
            "read_file",
            "Read the full text of a file. Use this before reviewing or editing a file.",
            json!({
                "type": "object",
                "required": ["filepath"],
                "properties": {
                    "filepath": {
                        "type": "string",
                        "description": "Path of the file, absolute or relative to the project root."
                    }
                }
            }),
        );

        let write_file = Tool::new(
            "write_file",
            "Create or overwrite a file with the given content. Parent directories are created.",
            json!({
                "type": "object",
                "required": ["filepath", "content"],
                "properties": {
                    "filepath": {
                        "type": "string",
                        "description": "Path of the file, absolute or relative to the project root."
                    },
                    "content": {
                        "type": "string",
                        "description": "The complete new content of the file."
                    }
                }
            }),
        );

        let list_directory = Tool::new(
            "list_directory",
            "List the entries of a directory. Directories are suffixed with '/'.",
            json!({
                "type": "object",
                "required": [],
                "properties": {
                    "path": {
                        "type": "string",
                        "default": null,
                        "description": "Directory to list. Defaults to the project root."
                    }
                }
            }),
        );

        let search_files = Tool::new(
            "search_files",
            indoc! {"
                Search file contents with a regular expression. Returns matching lines as
                `path:line: text`. Hidden directories and build output are skipped.
            "},
            json!({
                "type": "object",
                "required": ["pattern"],
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "Regular expression to search for."
                    },
                    "path": {
                        "type": "string",
                        "default": null,
                        "description": "Directory to search. Defaults to the project root."
                    },
                    "extension": {
                        "type": "string",
                        "default": null,
                        "description": "Only search files with this extension, e.g. `java` or `sql`."
                    }
                }
            }),
        );

        Self {
            tools: vec![read_file, write_file, list_directory, search_files],
            root: root.into(),
        }
    }

    fn resolve_path(&self, path_str: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    async fn read_file(&self, params: Value) -> AgentResult<String> {
        let filepath = required_str(&params, "filepath")?;
        let path = self.resolve_path(filepath);

        if !path.exists() {
            return Err(AgentError::ExecutionError(format!(
                "File not found: {}",
                filepath
            )));
        }
        if path.is_dir() {
            return Err(AgentError::InvalidParameters(format!(
                "'{}' is a directory, use list_directory instead",
                filepath
            )));
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| AgentError::ExecutionError(format!("Failed to read file: {}", e)))?;
        Ok(truncate_output(&content, MAX_FILE_CHARS))
    }

    async fn write_file(&self, params: Value) -> AgentResult<String> {
        let filepath = required_str(&params, "filepath")?;
        let content = required_str(&params, "content")?;
        let path = self.resolve_path(filepath);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AgentError::ExecutionError(format!("Failed to create directory: {}", e))
            })?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| AgentError::ExecutionError(format!("Failed to write file: {}", e)))?;

        Ok(format!("Wrote {} bytes to {}", content.len(), filepath))
    }

    async fn list_directory(&self, params: Value) -> AgentResult<String> {
        let path_str = params.get("path").and_then(Value::as_str).unwrap_or(".");
        let path = self.resolve_path(path_str);
        if !path.is_dir() {
            return Err(AgentError::ExecutionError(format!(
                "Directory not found: {}",
                path_str
            )));
        }

        let mut reader = tokio::fs::read_dir(&path).await.map_err(|e| {
            AgentError::ExecutionError(format!("Failed to read directory: {}", e))
        })?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(|e| {
            AgentError::ExecutionError(format!("Failed to read directory entry: {}", e))
        })? {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();

        if entries.is_empty() {
            Ok(format!("{} is empty", path_str))
        } else {
            Ok(entries.join("\n"))
        }
    }

    async fn search_files(&self, params: Value) -> AgentResult<String> {
        let pattern = required_str(&params, "pattern")?;
        let regex = Regex::new(pattern).map_err(|e| {
            AgentError::InvalidParameters(format!("Invalid regular expression: {}", e))
        })?;
        let path_str = params.get("path").and_then(Value::as_str).unwrap_or(".");
        let extension = params
            .get("extension")
            .and_then(Value::as_str)
            .map(|ext| ext.trim_start_matches('.').to_string());
        let root = self.resolve_path(path_str);
        if !root.exists() {
            return Err(AgentError::ExecutionError(format!(
                "Path not found: {}",
                path_str
            )));
        }

        let display_root = self.root.clone();
        let matches = tokio::task::spawn_blocking(move || {
            search_path(&root, &display_root, &regex, extension.as_deref())
        })
        .await
        .map_err(|e| AgentError::Internal(format!("Search task failed: {}", e)))?;

        if matches.is_empty() {
            return Ok(format!("No matches for '{}'", pattern));
        }
        let mut output = matches.join("\n");
        if matches.len() >= MAX_SEARCH_RESULTS {
            output.push_str(&format!(
                "\n[results limited to {} matches]",
                MAX_SEARCH_RESULTS
            ));
        }
        Ok(output)
    }
}

fn required_str<'a>(params: &'a Value, key: &str) -> AgentResult<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::InvalidParameters(format!("Missing '{}' parameter", key)))
}

fn search_path(
    root: &Path,
    display_root: &Path,
    regex: &Regex,
    extension: Option<&str>,
) -> Vec<String> {
    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let skipped = SKIPPED_DIRS.iter().any(|d| entry.file_name() == *d);
            !(is_dir && entry.depth() > 0 && skipped)
        })
        .build();

    let mut matches = Vec::new();
    // symlinks are not followed, so link cycles cannot recurse
    for entry in walker.flatten() {
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        if let Some(ext) = extension {
            if path.extension().and_then(|e| e.to_str()) != Some(ext) {
                continue;
            }
        }

        // binary or unreadable files are skipped
        let Ok(content) = std::fs::read_to_string(path) else {
            continue;
        };
        let shown = path.strip_prefix(display_root).unwrap_or(path);
        for (number, line) in content.lines().enumerate() {
            if regex.is_match(line) {
                matches.push(format!("{}:{}: {}", shown.display(), number + 1, line.trim()));
                if matches.len() >= MAX_SEARCH_RESULTS {
                    return matches;
                }
            }
        }
    }
    matches
}

#[async_trait]
impl System for FileSystem {
    fn name(&self) -> &str {
        "files"
    }

    fn description(&self) -> &str {
        "Read, write, list and search the files of the project under review"
    }

    fn instructions(&self) -> &str {
        indoc! {"
            Paths are relative to the project root unless absolute.
            Read a file before commenting on its contents; never guess what a file contains.
            Prefer search_files to locate code before reading whole directories.
        "}
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_name: &str, arguments: Value) -> AgentResult<String> {
        match tool_name {
            "read_file" => self.read_file(arguments).await,
            "write_file" => self.write_file(arguments).await,
            "list_directory" => self.list_directory(arguments).await,
            "search_files" => self.search_files(arguments).await,
            _ => Err(AgentError::ToolNotFound(tool_name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileSystem) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(
            dir.path().join("src/Main.java"),
            "class Main {\n  // TODO remove\n  void run() {}\n}\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("schema.sql"), "SELECT * FROM users; -- TODO\n").unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), "TODO hidden\n").unwrap();
        let system = FileSystem::new(dir.path());
        (dir, system)
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let (_dir, system) = setup();
        let err = system
            .call("read_file", json!({"filepath": "missing.txt"}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "File not found: missing.txt");
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (_dir, system) = setup();
        let written = system
            .call(
                "write_file",
                json!({"filepath": "reports/summary.md", "content": "# Summary"}),
            )
            .await
            .unwrap();
        assert_eq!(written, "Wrote 9 bytes to reports/summary.md");

        let content = system
            .call("read_file", json!({"filepath": "reports/summary.md"}))
            .await
            .unwrap();
        assert_eq!(content, "# Summary");
    }

    #[tokio::test]
    async fn test_read_directory_is_rejected() {
        let (_dir, system) = setup();
        let err = system
            .call("read_file", json!({"filepath": "src"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn test_list_directory() {
        let (_dir, system) = setup();
        let listing = system.call("list_directory", json!({})).await.unwrap();
        assert_eq!(listing, ".git/\nschema.sql\nsrc/");
    }

    #[tokio::test]
    async fn test_search_files() {
        let (_dir, system) = setup();
        let found = system
            .call("search_files", json!({"pattern": "TODO"}))
            .await
            .unwrap();
        let lines: Vec<_> = found.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.contains(&"schema.sql:1: SELECT * FROM users; -- TODO"));
        assert!(found.contains("Main.java:2: // TODO remove"));
        assert!(!found.contains("hidden"));

        let java_only = system
            .call("search_files", json!({"pattern": "TODO", "extension": "java"}))
            .await
            .unwrap();
        assert_eq!(java_only.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_search_ignores_gitignored_and_build_dirs() {
        let (dir, system) = setup();
        std::fs::write(dir.path().join(".gitignore"), "generated/\n").unwrap();
        std::fs::create_dir_all(dir.path().join("generated")).unwrap();
        std::fs::write(dir.path().join("generated/Stub.java"), "// TODO generated\n").unwrap();
        std::fs::create_dir_all(dir.path().join("target/classes")).unwrap();
        std::fs::write(dir.path().join("target/classes/Main.txt"), "TODO built\n").unwrap();
        // .gitignore is only honoured inside a repository
        std::fs::create_dir_all(dir.path().join(".git/refs")).unwrap();

        let found = system
            .call("search_files", json!({"pattern": "TODO"}))
            .await
            .unwrap();
        assert!(!found.contains("generated"));
        assert!(!found.contains("built"));
        assert_eq!(found.lines().count(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_search_survives_symlink_cycles() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "plain text\n").unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("x")).unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("y")).unwrap();
        let system = FileSystem::new(dir.path());

        let search = system.call("search_files", json!({"pattern": "NEVER_MATCHES"}));
        let found = tokio::time::timeout(std::time::Duration::from_secs(10), search)
            .await
            .expect("search did not finish")
            .unwrap();
        assert_eq!(found, "No matches for 'NEVER_MATCHES'");

        let found = system
            .call("search_files", json!({"pattern": "plain"}))
            .await
            .unwrap();
        assert_eq!(found, "a.txt:1: plain text");
    }

    #[tokio::test]
    async fn test_search_results_are_capped() {
        let dir = tempfile::tempdir().unwrap();
        let body = "match\n".repeat(MAX_SEARCH_RESULTS + 50);
        std::fs::write(dir.path().join("many.txt"), body).unwrap();
        let system = FileSystem::new(dir.path());

        let found = system
            .call("search_files", json!({"pattern": "match"}))
            .await
            .unwrap();
        assert_eq!(found.lines().count(), MAX_SEARCH_RESULTS + 1);
        assert!(found.ends_with("[results limited to 200 matches]"));
    }

    #[tokio::test]
    async fn test_search_invalid_regex() {
        let (_dir, system) = setup();
        let err = system
            .call("search_files", json!({"pattern": "("}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid regular expression"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (_dir, system) = setup();
        let err = system.call("delete_file", json!({})).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolNotFound(_)));
    }
}
