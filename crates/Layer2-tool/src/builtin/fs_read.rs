//! Filesystem read tools - ls, cat, stat, readlink, find

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BinaryHeap;
use std::fs;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use toolgate_foundation::{
    Tool, ToolArgs, ToolContext, ToolError, ToolMeta, ToolOutput, ToolSchema,
};
use tracing::debug;

use super::{
    display_path, io_error, not_regular_file, open_regular, resolve_link, resolve_path,
};

#[derive(Debug, Deserialize)]
struct PathInput {
    path: String,
}

// ============================================================================
// ls
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LsInput {
    path: Option<String>,
    all: bool,
}

/// List a directory
pub struct LsTool;

impl LsTool {
    pub const NAME: &'static str = "ls";

    pub fn new() -> Self {
        Self
    }
}

impl Default for LsTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for LsTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn meta(&self) -> ToolMeta {
        ToolMeta::new(Self::NAME)
            .description("List directory contents (dirs end with '/', symlinks with '@')")
            .category("filesystem")
    }

    fn schema(&self) -> Value {
        ToolSchema::new()
            .string_param("path", "Directory to list (default: sandbox root)", false)
            .boolean_param("all", "Include entries starting with '.'", false)
            .build()
    }

    fn validate(&self, args: &ToolArgs) -> Result<(), ToolError> {
        args.parse::<LsInput>(Self::NAME).map(|_| ())
    }

    async fn execute(
        &self,
        ctx: &dyn ToolContext,
        args: &ToolArgs,
    ) -> Result<ToolOutput, ToolError> {
        ctx.checkpoint()?;
        let input: LsInput = args.parse(Self::NAME)?;
        let dir = resolve_path(ctx, input.path.as_deref().unwrap_or("."))?;

        let reader = fs::read_dir(&dir).map_err(|e| io_error(ctx, &dir, e))?;
        let max = ctx.limits().max_directory_entries;
        // the `max` smallest names seen so far; the rest are only counted
        let mut kept = BinaryHeap::with_capacity(max.saturating_add(1).min(4096));
        let mut total = 0usize;
        for entry in reader {
            ctx.checkpoint()?;
            let entry = entry.map_err(|e| io_error(ctx, &dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !input.all && name.starts_with('.') {
                continue;
            }
            total += 1;
            let suffix = match entry.file_type() {
                Ok(ft) if ft.is_symlink() => "@",
                Ok(ft) if ft.is_dir() => "/",
                _ => "",
            };
            let shown = format!("{}{}", name, suffix);
            if kept.len() == max && kept.peek().map_or(true, |largest| &shown >= largest) {
                continue;
            }
            kept.push(shown);
            if kept.len() > max {
                kept.pop();
            }
        }

        if total == 0 {
            return Ok(ToolOutput::success("(empty directory)"));
        }

        let names = kept.into_sorted_vec();
        let mut output = names.join("\n");
        if total > names.len() {
            output.push_str(&format!("\n... ({} more entries)", total - names.len()));
        }
        Ok(ToolOutput::success(output))
    }
}

// ============================================================================
// cat
// ============================================================================

/// Read a file (lossy UTF-8)
pub struct CatTool;

impl CatTool {
    pub const NAME: &'static str = "cat";

    pub fn new() -> Self {
        Self
    }
}

impl Default for CatTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for CatTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn meta(&self) -> ToolMeta {
        ToolMeta::new(Self::NAME)
            .description("Read the contents of a file")
            .category("filesystem")
    }

    fn schema(&self) -> Value {
        ToolSchema::new()
            .string_param("path", "File to read", true)
            .build()
    }

    fn validate(&self, args: &ToolArgs) -> Result<(), ToolError> {
        args.parse::<PathInput>(Self::NAME).map(|_| ())
    }

    async fn execute(
        &self,
        ctx: &dyn ToolContext,
        args: &ToolArgs,
    ) -> Result<ToolOutput, ToolError> {
        ctx.checkpoint()?;
        let input: PathInput = args.parse(Self::NAME)?;
        let path = resolve_path(ctx, &input.path)?;

        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| io_error(ctx, &path, e))?;
        if meta.is_dir() {
            return Err(ToolError::execution(
                Self::NAME,
                format!("{}: is a directory", display_path(ctx, &path)),
            ));
        }
        if !meta.is_file() {
            return Err(not_regular_file(ctx, &path));
        }

        let max = ctx.limits().max_file_size_bytes;
        if meta.len() > max {
            return Err(ToolError::execution(
                Self::NAME,
                format!(
                    "{}: file too large ({} bytes, max {})",
                    display_path(ctx, &path),
                    meta.len(),
                    max
                ),
            ));
        }

        ctx.checkpoint()?;
        let file = open_regular(ctx, &path, tokio::fs::OpenOptions::new().read(true)).await?;
        let mut bytes = Vec::new();
        file.take(max)
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| io_error(ctx, &path, e))?;
        Ok(ToolOutput::success(String::from_utf8_lossy(&bytes)))
    }
}

// ============================================================================
// stat
// ============================================================================

/// File metadata
pub struct StatTool;

impl StatTool {
    pub const NAME: &'static str = "stat";

    pub fn new() -> Self {
        Self
    }
}

impl Default for StatTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for StatTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn meta(&self) -> ToolMeta {
        ToolMeta::new(Self::NAME)
            .description("Show type, size, permissions and modification time of a path")
            .category("filesystem")
    }

    fn schema(&self) -> Value {
        ToolSchema::new()
            .string_param("path", "Path to inspect", true)
            .build()
    }

    fn validate(&self, args: &ToolArgs) -> Result<(), ToolError> {
        args.parse::<PathInput>(Self::NAME).map(|_| ())
    }

    async fn execute(
        &self,
        ctx: &dyn ToolContext,
        args: &ToolArgs,
    ) -> Result<ToolOutput, ToolError> {
        ctx.checkpoint()?;
        let input: PathInput = args.parse(Self::NAME)?;
        let path = resolve_path(ctx, &input.path)?;
        let meta = fs::metadata(&path).map_err(|e| io_error(ctx, &path, e))?;

        let kind = if meta.is_dir() {
            "directory"
        } else if meta.is_file() {
            "file"
        } else {
            "other"
        };

        let modified = meta
            .modified()
            .map(|t| DateTime::<Local>::from(t).to_rfc3339())
            .unwrap_or_else(|_| "unknown".to_string());

        let lines = [
            format!("path: {}", display_path(ctx, &path)),
            format!("type: {}", kind),
            format!("size: {}", meta.len()),
            format!("permissions: {}", permissions(&meta)),
            format!("modified: {}", modified),
        ];
        Ok(ToolOutput::success(lines.join("\n")))
    }
}

#[cfg(unix)]
fn permissions(meta: &fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    format!("{:o}", meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn permissions(meta: &fs::Metadata) -> String {
    if meta.permissions().readonly() {
        "readonly".to_string()
    } else {
        "writable".to_string()
    }
}

// ============================================================================
// readlink
// ============================================================================

/// Report a symlink's own target
pub struct ReadlinkTool;

impl ReadlinkTool {
    pub const NAME: &'static str = "readlink";

    pub fn new() -> Self {
        Self
    }
}

impl Default for ReadlinkTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ReadlinkTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn meta(&self) -> ToolMeta {
        ToolMeta::new(Self::NAME)
            .description("Print the target of a symbolic link without following it")
            .category("filesystem")
    }

    fn schema(&self) -> Value {
        ToolSchema::new()
            .string_param("path", "Symbolic link to read", true)
            .build()
    }

    fn validate(&self, args: &ToolArgs) -> Result<(), ToolError> {
        args.parse::<PathInput>(Self::NAME).map(|_| ())
    }

    async fn execute(
        &self,
        ctx: &dyn ToolContext,
        args: &ToolArgs,
    ) -> Result<ToolOutput, ToolError> {
        ctx.checkpoint()?;
        let input: PathInput = args.parse(Self::NAME)?;
        let link = resolve_link(ctx, &input.path)?;

        let meta = fs::symlink_metadata(&link).map_err(|e| io_error(ctx, &link, e))?;
        if !meta.file_type().is_symlink() {
            return Err(ToolError::execution(
                Self::NAME,
                format!("{}: not a symbolic link", display_path(ctx, &link)),
            ));
        }

        let target = fs::read_link(&link).map_err(|e| io_error(ctx, &link, e))?;
        Ok(ToolOutput::success(target.display().to_string()))
    }
}

// ============================================================================
// find
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FindInput {
    path: Option<String>,
    name: Option<String>,
    max_depth: Option<usize>,
}

/// Depth-limited walk with an optional glob on file names
pub struct FindTool;

impl FindTool {
    pub const NAME: &'static str = "find";

    pub fn new() -> Self {
        Self
    }

    fn parse(args: &ToolArgs) -> Result<(FindInput, Option<glob::Pattern>), ToolError> {
        let input: FindInput = args.parse(Self::NAME)?;
        let pattern = match input.name.as_deref() {
            Some(p) => Some(glob::Pattern::new(p).map_err(|e| {
                ToolError::validation(Self::NAME, format!("invalid pattern '{}': {}", p, e))
            })?),
            None => None,
        };
        Ok((input, pattern))
    }
}

impl Default for FindTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FindTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn meta(&self) -> ToolMeta {
        ToolMeta::new(Self::NAME)
            .description("Find files by name pattern under a directory")
            .category("filesystem")
    }

    fn schema(&self) -> Value {
        ToolSchema::new()
            .string_param("path", "Directory to search (default: sandbox root)", false)
            .string_param("name", "Glob matched against file names, e.g. '*.rs'", false)
            .integer_param("max_depth", "Maximum depth to descend", false)
            .build()
    }

    fn validate(&self, args: &ToolArgs) -> Result<(), ToolError> {
        Self::parse(args).map(|_| ())
    }

    async fn execute(
        &self,
        ctx: &dyn ToolContext,
        args: &ToolArgs,
    ) -> Result<ToolOutput, ToolError> {
        ctx.checkpoint()?;
        let (input, pattern) = Self::parse(args)?;
        let start = resolve_path(ctx, input.path.as_deref().unwrap_or("."))?;

        let limits = ctx.limits();
        let max_depth = input
            .max_depth
            .unwrap_or(limits.max_directory_depth)
            .min(limits.max_directory_depth);
        let max_entries = limits.max_directory_entries;

        let mut found = Vec::new();
        let mut truncated = false;
        let mut stack: Vec<(PathBuf, usize)> = vec![(start, 0)];

        'walk: while let Some((dir, depth)) = stack.pop() {
            ctx.checkpoint()?;
            let reader = match fs::read_dir(&dir) {
                Ok(reader) => reader,
                Err(e) => {
                    debug!("Skipping {}: {}", dir.display(), e);
                    continue;
                }
            };

            for entry in reader {
                ctx.checkpoint()?;
                let Ok(entry) = entry else { continue };
                let path = entry.path();
                let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);

                let matches = pattern
                    .as_ref()
                    .map(|p| p.matches(&entry.file_name().to_string_lossy()))
                    .unwrap_or(true);
                if matches {
                    if found.len() >= max_entries {
                        truncated = true;
                        break 'walk;
                    }
                    let mut shown = display_path(ctx, &path);
                    if is_dir {
                        shown.push('/');
                    }
                    found.push(shown);
                }

                // symlinked directories are reported but never entered
                if is_dir && depth + 1 < max_depth {
                    stack.push((path, depth + 1));
                }
            }
        }

        if found.is_empty() {
            return Ok(ToolOutput::success("(no matches)"));
        }

        found.sort();
        let mut output = found.join("\n");
        if truncated {
            output.push_str(&format!("\n... (stopped after {} entries)", max_entries));
        }
        Ok(ToolOutput::success(output))
    }
}
