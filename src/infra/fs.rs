//! # File System Operations Module / 文件系统操作模块
//!
//! This module prepares the build directory and stages runtime dependencies
//! (for example a shared library the test binary loads) next to the test binary.
//! Both operations are idempotent so a pipeline can be re-run against an
//! already-prepared directory.
//!
//! 此模块负责准备构建目录，并将运行时依赖（例如测试二进制加载的动态库）
//! 放置到测试二进制旁边。两个操作都是幂等的，因此可以在已准备好的目录上重新运行流水线。

use anyhow::{Context, Result, bail};
use fs_extra::dir::CopyOptions as DirCopyOptions;
use fs_extra::file::CopyOptions as FileCopyOptions;
use std::fs;
use std::path::{Path, PathBuf};

use crate::infra::t;

/// Creates the build directory (and its parents) if it does not exist yet.
///
/// # Arguments
/// * `build_dir` - The directory every stage runs in
///
/// # Returns
/// The canonical absolute path of the build directory
pub fn ensure_build_dir(build_dir: &Path) -> Result<PathBuf> {
    if build_dir.exists() && !build_dir.is_dir() {
        bail!(t!("fs.build_dir_not_a_directory", path = build_dir.display()));
    }
    fs::create_dir_all(build_dir)
        .with_context(|| t!("fs.create_build_dir_failed", path = build_dir.display()))?;
    absolute_path(build_dir)
}

/// Copies every runtime dependency into `build_dir`, overwriting earlier copies.
/// Files keep their file name; directories are copied as a whole.
///
/// 将每个运行时依赖复制到 `build_dir` 中，覆盖之前的副本。
/// 文件保留其文件名；目录整体复制。
///
/// # Returns
/// The destination paths, in the order the dependencies were given
pub fn stage_runtime_dependencies(dependencies: &[PathBuf], build_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut staged = Vec::with_capacity(dependencies.len());

    for source in dependencies {
        let file_name = source
            .file_name()
            .with_context(|| t!("fs.dependency_has_no_name", path = source.display()))?;
        let destination = build_dir.join(file_name);

        let copied = if source.is_dir() {
            fs::create_dir_all(&destination)
                .with_context(|| t!("fs.create_build_dir_failed", path = destination.display()))?;
            let mut options = DirCopyOptions::new();
            options.overwrite = true;
            options.content_only = true;
            fs_extra::dir::copy(source, &destination, &options)
        } else if source.is_file() {
            let mut options = FileCopyOptions::new();
            options.overwrite = true;
            fs_extra::file::copy(source, &destination, &options)
        } else {
            bail!(t!("fs.dependency_missing", path = source.display()));
        };
        copied.with_context(|| {
            t!(
                "fs.dependency_copy_failed",
                from = source.display(),
                to = destination.display()
            )
        })?;

        staged.push(destination);
    }

    Ok(staged)
}

/// Expands `~` and `$VARS` in a configured path and makes it absolute
/// relative to `base` when it is relative.
pub fn resolve_path(raw: &str, base: &Path) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw)
        .with_context(|| t!("fs.expand_failed", value = raw))?;
    let path = PathBuf::from(expanded.as_ref());
    Ok(if path.is_absolute() { path } else { base.join(path) })
}

/// Gets the absolute path from a potentially relative path.
///
/// # Arguments
/// * `path` - Path to canonicalize
///
/// # Returns
/// Canonicalized absolute path, or an error if the path doesn't exist
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).with_context(|| t!("fs.resolve_failed", path = path.display()))
}
