//! Filesystem write tools - write_file, touch, mkdir, rm, mv

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use toolgate_foundation::{
    Tool, ToolArgs, ToolContext, ToolError, ToolMeta, ToolOutput, ToolSchema,
};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{
    display_path, io_error, not_regular_file, open_regular, resolve_link, resolve_path,
};

#[derive(Debug, Deserialize)]
struct PathInput {
    path: String,
}

// ============================================================================
// write_file
// ============================================================================

#[derive(Debug, Deserialize)]
struct WriteInput {
    path: String,
    content: String,
    #[serde(default)]
    append: bool,
}

/// Write or append text to a file
pub struct WriteFileTool;

impl WriteFileTool {
    pub const NAME: &'static str = "write_file";

    pub fn new() -> Self {
        Self
    }
}

impl Default for WriteFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn meta(&self) -> ToolMeta {
        ToolMeta::new(Self::NAME)
            .description("Write content to a file, creating missing parent directories")
            .category("filesystem")
    }

    fn schema(&self) -> Value {
        ToolSchema::new()
            .string_param("path", "File to write", true)
            .string_param("content", "Text to write", true)
            .boolean_param("append", "Append instead of overwriting", false)
            .build()
    }

    fn validate(&self, args: &ToolArgs) -> Result<(), ToolError> {
        args.parse::<WriteInput>(Self::NAME).map(|_| ())
    }

    async fn execute(
        &self,
        ctx: &dyn ToolContext,
        args: &ToolArgs,
    ) -> Result<ToolOutput, ToolError> {
        ctx.checkpoint()?;
        let input: WriteInput = args.parse(Self::NAME)?;
        let path = resolve_path(ctx, &input.path)?;

        let existing = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => {
                return Err(ToolError::execution(
                    Self::NAME,
                    format!("{}: is a directory", display_path(ctx, &path)),
                ));
            }
            Ok(meta) if !meta.is_file() => return Err(not_regular_file(ctx, &path)),
            Ok(meta) if input.append => meta.len(),
            _ => 0,
        };
        let final_size = existing + input.content.len() as u64;
        let max = ctx.limits().max_file_size_bytes;
        if final_size > max {
            return Err(ToolError::execution(
                Self::NAME,
                format!(
                    "{}: resulting file too large ({} bytes, max {})",
                    display_path(ctx, &path),
                    final_size,
                    max
                ),
            ));
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(ctx, parent, e))?;
        }

        ctx.checkpoint()?;
        let mut file = open_regular(
            ctx,
            &path,
            tokio::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .append(input.append)
                .truncate(!input.append),
        )
        .await?;
        file.write_all(input.content.as_bytes())
            .await
            .map_err(|e| io_error(ctx, &path, e))?;
        file.flush().await.map_err(|e| io_error(ctx, &path, e))?;

        let verb = if input.append { "Appended" } else { "Wrote" };
        Ok(ToolOutput::success(format!(
            "{} {} bytes to {}",
            verb,
            input.content.len(),
            display_path(ctx, &path)
        )))
    }
}

// ============================================================================
// touch
// ============================================================================

/// Create an empty file or bump its modification time
pub struct TouchTool;

impl TouchTool {
    pub const NAME: &'static str = "touch";

    pub fn new() -> Self {
        Self
    }
}

impl Default for TouchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for TouchTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn meta(&self) -> ToolMeta {
        ToolMeta::new(Self::NAME)
            .description("Create an empty file, or update the modification time of an existing one")
            .category("filesystem")
    }

    fn schema(&self) -> Value {
        ToolSchema::new()
            .string_param("path", "File to touch", true)
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

        let existed = match tokio::fs::metadata(&path).await {
            Ok(meta) if !meta.is_file() => return Err(not_regular_file(ctx, &path)),
            Ok(_) => true,
            Err(_) => false,
        };
        let file = open_regular(
            ctx,
            &path,
            tokio::fs::OpenOptions::new().create(true).append(true),
        )
        .await?;
        if existed {
            let file = file.into_std().await;
            tokio::task::spawn_blocking(move || file.set_modified(SystemTime::now()))
                .await
                .map_err(|e| ToolError::execution(Self::NAME, e.to_string()))?
                .map_err(|e| io_error(ctx, &path, e))?;
        }

        let verb = if existed { "Touched" } else { "Created" };
        Ok(ToolOutput::success(format!("{} {}", verb, display_path(ctx, &path))))
    }
}

// ============================================================================
// mkdir
// ============================================================================

#[derive(Debug, Deserialize)]
struct MkdirInput {
    path: String,
    #[serde(default)]
    parents: bool,
}

/// Create a directory
pub struct MkdirTool;

impl MkdirTool {
    pub const NAME: &'static str = "mkdir";

    pub fn new() -> Self {
        Self
    }
}

impl Default for MkdirTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for MkdirTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn meta(&self) -> ToolMeta {
        ToolMeta::new(Self::NAME)
            .description("Create a directory")
            .category("filesystem")
    }

    fn schema(&self) -> Value {
        ToolSchema::new()
            .string_param("path", "Directory to create", true)
            .boolean_param("parents", "Create missing parents, no error if it exists", false)
            .build()
    }

    fn validate(&self, args: &ToolArgs) -> Result<(), ToolError> {
        args.parse::<MkdirInput>(Self::NAME).map(|_| ())
    }

    async fn execute(
        &self,
        ctx: &dyn ToolContext,
        args: &ToolArgs,
    ) -> Result<ToolOutput, ToolError> {
        ctx.checkpoint()?;
        let input: MkdirInput = args.parse(Self::NAME)?;
        let path = resolve_path(ctx, &input.path)?;

        let result = if input.parents {
            fs::create_dir_all(&path)
        } else {
            fs::create_dir(&path)
        };
        result.map_err(|e| io_error(ctx, &path, e))?;

        Ok(ToolOutput::success(format!(
            "Created directory {}",
            display_path(ctx, &path)
        )))
    }
}

// ============================================================================
// rm
// ============================================================================

#[derive(Debug, Deserialize)]
struct RmInput {
    path: String,
    #[serde(default)]
    recursive: bool,
}

/// Remove a file, symlink or directory
pub struct RmTool;

impl RmTool {
    pub const NAME: &'static str = "rm";

    pub fn new() -> Self {
        Self
    }

    /// Post-order removal without following symlinks. Returns the number of
    /// entries removed; on failure the count so far travels with the error.
    fn remove_tree(ctx: &dyn ToolContext, root: &Path) -> Result<usize, (usize, ToolError)> {
        let mut removed = 0usize;
        let mut stack: Vec<(PathBuf, bool)> = vec![(root.to_path_buf(), false)];

        while let Some((dir, expanded)) = stack.pop() {
            ctx.checkpoint().map_err(|e| (removed, e))?;

            if expanded {
                fs::remove_dir(&dir).map_err(|e| (removed, io_error(ctx, &dir, e)))?;
                removed += 1;
                continue;
            }

            stack.push((dir.clone(), true));
            let reader = fs::read_dir(&dir).map_err(|e| (removed, io_error(ctx, &dir, e)))?;
            for entry in reader {
                ctx.checkpoint().map_err(|e| (removed, e))?;
                let entry = entry.map_err(|e| (removed, io_error(ctx, &dir, e)))?;
                let path = entry.path();
                let is_dir = entry
                    .file_type()
                    .map(|ft| ft.is_dir())
                    .map_err(|e| (removed, io_error(ctx, &path, e)))?;

                if is_dir {
                    stack.push((path, false));
                } else {
                    fs::remove_file(&path).map_err(|e| (removed, io_error(ctx, &path, e)))?;
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}

impl Default for RmTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for RmTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn meta(&self) -> ToolMeta {
        ToolMeta::new(Self::NAME)
            .description("Remove a file, or a directory with recursive=true")
            .category("filesystem")
    }

    fn schema(&self) -> Value {
        ToolSchema::new()
            .string_param("path", "Path to remove", true)
            .boolean_param("recursive", "Remove directories and their contents", false)
            .build()
    }

    fn validate(&self, args: &ToolArgs) -> Result<(), ToolError> {
        args.parse::<RmInput>(Self::NAME).map(|_| ())
    }

    async fn execute(
        &self,
        ctx: &dyn ToolContext,
        args: &ToolArgs,
    ) -> Result<ToolOutput, ToolError> {
        ctx.checkpoint()?;
        let input: RmInput = args.parse(Self::NAME)?;
        let path = resolve_link(ctx, &input.path)?;

        if path == ctx.sandbox_root() {
            return Err(ToolError::execution(
                Self::NAME,
                "refusing to remove the sandbox root",
            ));
        }

        let meta = fs::symlink_metadata(&path).map_err(|e| io_error(ctx, &path, e))?;
        let shown = display_path(ctx, &path);

        if !meta.is_dir() {
            fs::remove_file(&path).map_err(|e| io_error(ctx, &path, e))?;
            return Ok(ToolOutput::success(format!("Removed {}", shown)));
        }

        if !input.recursive {
            fs::remove_dir(&path).map_err(|e| {
                ToolError::execution(
                    Self::NAME,
                    format!("{}: {} (use recursive=true for non-empty directories)", shown, e),
                )
            })?;
            return Ok(ToolOutput::success(format!("Removed directory {}", shown)));
        }

        match Self::remove_tree(ctx, &path) {
            Ok(count) => Ok(ToolOutput::success(format!(
                "Removed {} ({} entries)",
                shown, count
            ))),
            Err((count, err)) => {
                debug!("rm stopped after {} entries: {}", count, err);
                Ok(ToolOutput::partial(
                    format!("Removed {} entries before stopping", count),
                    err,
                ))
            }
        }
    }
}

// ============================================================================
// mv
// ============================================================================

#[derive(Debug, Deserialize)]
struct MvInput {
    source: String,
    destination: String,
}

/// Rename or move inside the sandbox
pub struct MvTool;

impl MvTool {
    pub const NAME: &'static str = "mv";

    pub fn new() -> Self {
        Self
    }
}

impl Default for MvTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for MvTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn meta(&self) -> ToolMeta {
        ToolMeta::new(Self::NAME)
            .description("Move or rename a file or directory within the sandbox")
            .category("filesystem")
    }

    fn schema(&self) -> Value {
        ToolSchema::new()
            .string_param("source", "Path to move", true)
            .string_param("destination", "New path, or an existing directory to move into", true)
            .build()
    }

    fn validate(&self, args: &ToolArgs) -> Result<(), ToolError> {
        args.parse::<MvInput>(Self::NAME).map(|_| ())
    }

    async fn execute(
        &self,
        ctx: &dyn ToolContext,
        args: &ToolArgs,
    ) -> Result<ToolOutput, ToolError> {
        ctx.checkpoint()?;
        let input: MvInput = args.parse(Self::NAME)?;
        let source = resolve_link(ctx, &input.source)?;

        // an existing link is replaced itself, unless it leads to a directory to move into
        let link = resolve_link(ctx, &input.destination)?;
        let followed = resolve_path(ctx, &input.destination);
        let is_link = fs::symlink_metadata(&link)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        let (mut destination, replaces_link) = match followed {
            Ok(path) if is_link && !path.is_dir() => (link, true),
            Err(_) if is_link => (link, true),
            other => (other?, false),
        };

        if source == ctx.sandbox_root() {
            return Err(ToolError::execution(
                Self::NAME,
                "refusing to move the sandbox root",
            ));
        }
        fs::symlink_metadata(&source).map_err(|e| io_error(ctx, &source, e))?;

        if !replaces_link && destination.is_dir() {
            if let Some(name) = source.file_name() {
                destination = destination.join(name);
            }
        }

        fs::rename(&source, &destination).map_err(|e| io_error(ctx, &source, e))?;
        Ok(ToolOutput::success(format!(
            "Moved {} -> {}",
            display_path(ctx, &source),
            display_path(ctx, &destination)
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::test_support::{args, content, Fixture};
    use serde_json::json;
    use toolgate_foundation::LimitsConfig;

    #[tokio::test]
    async fn test_write_creates_parents_and_appends() {
        let fx = Fixture::new();
        let write = WriteFileTool::new();

        let out = write
            .execute(
                &fx.ctx("write_file"),
                &args(json!({"path": "a/b/notes.txt", "content": "one"})),
            )
            .await
            .unwrap();
        assert_eq!(content(out), "Wrote 3 bytes to a/b/notes.txt");

        write
            .execute(
                &fx.ctx("write_file"),
                &args(json!({"path": "a/b/notes.txt", "content": "two", "append": true})),
            )
            .await
            .unwrap();
        assert_eq!(
            fs::read_to_string(fx.root.join("a/b/notes.txt")).unwrap(),
            "onetwo"
        );
    }

    #[tokio::test]
    async fn test_write_size_limit() {
        let fx = Fixture::new();
        let ctx = fx.ctx("write_file").with_limits(LimitsConfig {
            max_file_size_bytes: 4,
            ..Default::default()
        });

        let err = WriteFileTool::new()
            .execute(&ctx, &args(json!({"path": "big.txt", "content": "too long"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("too large"));
        assert!(!fx.root.join("big.txt").exists());
    }

    #[tokio::test]
    async fn test_write_outside_creates_nothing() {
        let fx = Fixture::new();
        let err = WriteFileTool::new()
            .execute(
                &fx.ctx("write_file"),
                &args(json!({"path": "../escaped/x.txt", "content": "x"})),
            )
            .await
            .unwrap_err();
        assert!(err.is_sandbox_violation());
        assert!(!fx.root.parent().unwrap().join("escaped").exists());
    }

    #[tokio::test]
    async fn test_touch_and_mkdir() {
        let fx = Fixture::new();

        let out = TouchTool::new()
            .execute(&fx.ctx("touch"), &args(json!({"path": "empty.txt"})))
            .await
            .unwrap();
        assert_eq!(content(out), "Created empty.txt");
        assert_eq!(fs::metadata(fx.root.join("empty.txt")).unwrap().len(), 0);

        let out = TouchTool::new()
            .execute(&fx.ctx("touch"), &args(json!({"path": "empty.txt"})))
            .await
            .unwrap();
        assert_eq!(content(out), "Touched empty.txt");

        let mkdir = MkdirTool::new();
        assert!(mkdir
            .execute(&fx.ctx("mkdir"), &args(json!({"path": "x/y"})))
            .await
            .is_err());
        mkdir
            .execute(&fx.ctx("mkdir"), &args(json!({"path": "x/y", "parents": true})))
            .await
            .unwrap();
        assert!(fx.root.join("x/y").is_dir());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_and_touch_refuse_fifo() {
        let fx = Fixture::new();
        fx.mkfifo("pipe");

        let err = WriteFileTool::new()
            .execute(
                &fx.ctx("write_file"),
                &args(json!({"path": "pipe", "content": "x"})),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a regular file"), "{}", err);

        let err = TouchTool::new()
            .execute(&fx.ctx("touch"), &args(json!({"path": "pipe"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a regular file"), "{}", err);
    }

    #[tokio::test]
    async fn test_rm_file_and_tree() {
        let fx = Fixture::new();
        fx.write("tree/a.txt", "a");
        fx.write("tree/sub/b.txt", "b");
        fx.write("single.txt", "s");

        let rm = RmTool::new();
        rm.execute(&fx.ctx("rm"), &args(json!({"path": "single.txt"})))
            .await
            .unwrap();
        assert!(!fx.root.join("single.txt").exists());

        let err = rm
            .execute(&fx.ctx("rm"), &args(json!({"path": "tree"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("recursive=true"));

        let out = rm
            .execute(&fx.ctx("rm"), &args(json!({"path": "tree", "recursive": true})))
            .await
            .unwrap();
        assert_eq!(content(out), "Removed tree (4 entries)");
        assert!(!fx.root.join("tree").exists());
    }

    #[tokio::test]
    async fn test_rm_refuses_root() {
        let fx = Fixture::new();
        let err = RmTool::new()
            .execute(&fx.ctx("rm"), &args(json!({"path": ".", "recursive": true})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("sandbox root"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rm_does_not_follow_symlinks() {
        let fx = Fixture::new();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("keep.txt"), "keep").unwrap();
        fs::create_dir(fx.root.join("tree")).unwrap();
        std::os::unix::fs::symlink(outside.path(), fx.root.join("tree/link")).unwrap();

        RmTool::new()
            .execute(&fx.ctx("rm"), &args(json!({"path": "tree", "recursive": true})))
            .await
            .unwrap();

        assert!(!fx.root.join("tree").exists());
        assert!(outside.path().join("keep.txt").exists());
    }

    #[tokio::test]
    async fn test_rm_cancelled_midway_reports_partial() {
        let fx = Fixture::new();
        fx.write("tree/a.txt", "a");
        let ctx = fx.ctx("rm");

        ctx.cancel();
        let out = RmTool::remove_tree(&ctx, &fx.root.join("tree"));
        match out {
            Err((0, ToolError::DeadlineExceeded { .. })) => {}
            other => panic!("unexpected: {:?}", other),
        }
        assert!(fx.root.join("tree/a.txt").exists());
    }

    #[tokio::test]
    async fn test_mv_into_directory_and_rename() {
        let fx = Fixture::new();
        fx.write("a.txt", "a");
        fs::create_dir(fx.root.join("dest")).unwrap();

        let mv = MvTool::new();
        let out = mv
            .execute(
                &fx.ctx("mv"),
                &args(json!({"source": "a.txt", "destination": "dest"})),
            )
            .await
            .unwrap();
        assert_eq!(content(out), "Moved a.txt -> dest/a.txt");

        mv.execute(
            &fx.ctx("mv"),
            &args(json!({"source": "dest/a.txt", "destination": "b.txt"})),
        )
        .await
        .unwrap();
        assert_eq!(fs::read_to_string(fx.root.join("b.txt")).unwrap(), "a");

        let err = mv
            .execute(
                &fx.ctx("mv"),
                &args(json!({"source": "b.txt", "destination": "../b.txt"})),
            )
            .await
            .unwrap_err();
        assert!(err.is_sandbox_violation());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_mv_onto_symlink_replaces_the_link() {
        use std::os::unix::fs::symlink;

        let fx = Fixture::new();
        fx.write("target.txt", "old");
        fx.write("new.txt", "new");
        fs::create_dir(fx.root.join("dir")).unwrap();
        symlink(fx.root.join("target.txt"), fx.root.join("alias")).unwrap();
        symlink(fx.root.join("dir"), fx.root.join("dir_alias")).unwrap();

        let mv = MvTool::new();
        mv.execute(
            &fx.ctx("mv"),
            &args(json!({"source": "new.txt", "destination": "alias"})),
        )
        .await
        .unwrap();

        let alias = fs::symlink_metadata(fx.root.join("alias")).unwrap();
        assert!(alias.file_type().is_file());
        assert_eq!(fs::read_to_string(fx.root.join("alias")).unwrap(), "new");
        assert_eq!(fs::read_to_string(fx.root.join("target.txt")).unwrap(), "old");

        // a link leading out of the sandbox is replaced, never entered
        let outside = tempfile::tempdir().unwrap();
        symlink(outside.path(), fx.root.join("door")).unwrap();
        fx.write("other.txt", "other");
        mv.execute(
            &fx.ctx("mv"),
            &args(json!({"source": "other.txt", "destination": "door"})),
        )
        .await
        .unwrap();
        assert_eq!(fs::read_to_string(fx.root.join("door")).unwrap(), "other");
        assert!(!outside.path().join("other.txt").exists());

        // a link to a directory is still moved into
        mv.execute(
            &fx.ctx("mv"),
            &args(json!({"source": "target.txt", "destination": "dir_alias"})),
        )
        .await
        .unwrap();
        assert!(fx.root.join("dir/target.txt").exists());
    }
}
