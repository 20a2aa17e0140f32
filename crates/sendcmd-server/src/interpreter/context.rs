//! Per-session execution state.

use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Why a `cd`, drive change or `set` could not be applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectiveError {
    #[error("directory not found: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("cannot change to {path}: {reason}")]
    Inaccessible { path: String, reason: String },

    #[error("expected NAME=VALUE, got '{0}'")]
    MalformedAssignment(String),
}

/// Working directory and environment overrides for one session.
///
/// Owned by exactly one interpreter. The process working directory is never
/// touched; every spawn receives `working_dir` explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    working_dir: PathBuf,
    env_overrides: BTreeMap<String, String>,
}

impl ExecutionContext {
    /// A relative `working_dir` is resolved against the process directory
    /// once, here, so later `cd ..` steps always have a parent to go to.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        let working_dir = working_dir.into();
        let working_dir = std::path::absolute(&working_dir).unwrap_or(working_dir);
        Self {
            working_dir: normalize(&working_dir),
            env_overrides: BTreeMap::new(),
        }
    }

    /// Starts from the process working directory.
    pub fn from_process() -> io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn env_overrides(&self) -> &BTreeMap<String, String> {
        &self.env_overrides
    }

    /// Applies `cd <path>`. Relative paths resolve against the session's
    /// current directory. On error the directory is unchanged.
    pub async fn change_dir(&mut self, path: &str) -> Result<(), DirectiveError> {
        let path = unquote(strip_drive_flag(path));
        let candidate = normalize(&self.working_dir.join(path));
        self.enter(candidate, path).await
    }

    /// Applies `X:` by switching to the root of that drive.
    pub async fn change_drive(&mut self, letter: char) -> Result<(), DirectiveError> {
        let root = format!("{}:\\", letter.to_ascii_uppercase());
        self.enter(PathBuf::from(&root), &root).await
    }

    /// Applies `set NAME=VALUE`. The value may itself contain `=` and may be
    /// empty.
    pub fn set_env(&mut self, assignment: &str) -> Result<(), DirectiveError> {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| DirectiveError::MalformedAssignment(assignment.to_string()))?;

        let name = name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) || name.contains('\0') || value.contains('\0') {
            return Err(DirectiveError::MalformedAssignment(assignment.to_string()));
        }

        self.env_overrides.insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn enter(&mut self, candidate: PathBuf, shown: &str) -> Result<(), DirectiveError> {
        match tokio::fs::metadata(&candidate).await {
            Ok(meta) if meta.is_dir() => {
                self.working_dir = candidate;
                Ok(())
            }
            Ok(_) => Err(DirectiveError::NotADirectory(shown.to_string())),
            Err(e) => Err(match e.kind() {
                io::ErrorKind::NotFound => DirectiveError::NotFound(shown.to_string()),
                io::ErrorKind::PermissionDenied => DirectiveError::PermissionDenied(shown.to_string()),
                _ => DirectiveError::Inaccessible {
                    path: shown.to_string(),
                    reason: e.to_string(),
                },
            }),
        }
    }
}

/// `cd /d D:\x` is how cmd.exe changes drive and directory together.
fn strip_drive_flag(path: &str) -> &str {
    match path.get(..3) {
        Some(flag) if flag.eq_ignore_ascii_case("/d ") => path[3..].trim_start(),
        _ => path,
    }
}

fn unquote(path: &str) -> &str {
    path.strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
        .unwrap_or(path)
}

/// Resolves `.` and `..` lexically, the way a shell's `cd` does.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `..` at the root stays at the root
                Some(Component::RootDir) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_change_dir_absolute_and_relative() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("a/b")).unwrap();

        let mut ctx = ExecutionContext::new(root.path());
        ctx.change_dir("a").await.unwrap();
        assert_eq!(ctx.working_dir(), root.path().join("a"));

        ctx.change_dir("b/..").await.unwrap();
        assert_eq!(ctx.working_dir(), root.path().join("a"));

        let absolute = root.path().join("a/b");
        ctx.change_dir(absolute.to_str().unwrap()).await.unwrap();
        assert_eq!(ctx.working_dir(), absolute);
    }

    #[tokio::test]
    async fn test_change_dir_failure_leaves_directory_unchanged() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("file.txt"), "x").unwrap();
        let mut ctx = ExecutionContext::new(root.path());

        let err = ctx.change_dir("nonexistent").await.unwrap_err();
        assert_eq!(err, DirectiveError::NotFound("nonexistent".to_string()));
        assert_eq!(ctx.working_dir(), root.path());

        let err = ctx.change_dir("file.txt").await.unwrap_err();
        assert!(matches!(err, DirectiveError::NotADirectory(_)));
        assert_eq!(ctx.working_dir(), root.path());
    }

    #[tokio::test]
    async fn test_change_dir_quoted_path() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("with space")).unwrap();

        let mut ctx = ExecutionContext::new(root.path());
        ctx.change_dir("\"with space\"").await.unwrap();
        assert_eq!(ctx.working_dir(), root.path().join("with space"));
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_drive_change_without_drives_fails() {
        let root = tempfile::tempdir().unwrap();
        let mut ctx = ExecutionContext::new(root.path());
        assert!(ctx.change_drive('q').await.is_err());
        assert_eq!(ctx.working_dir(), root.path());
    }

    #[test]
    fn test_set_env() {
        let mut ctx = ExecutionContext::new(".");
        ctx.set_env("FOO=1").unwrap();
        ctx.set_env("URL=http://x/?a=b").unwrap();
        ctx.set_env("EMPTY=").unwrap();

        assert_eq!(ctx.env_overrides().get("FOO"), Some(&"1".to_string()));
        assert_eq!(ctx.env_overrides().get("URL"), Some(&"http://x/?a=b".to_string()));
        assert_eq!(ctx.env_overrides().get("EMPTY"), Some(&String::new()));
    }

    #[test]
    fn test_set_env_overwrites() {
        let mut ctx = ExecutionContext::new(".");
        ctx.set_env("FOO=1").unwrap();
        ctx.set_env("FOO=2").unwrap();
        assert_eq!(ctx.env_overrides().len(), 1);
        assert_eq!(ctx.env_overrides()["FOO"], "2");
    }

    #[test]
    fn test_set_env_malformed() {
        let mut ctx = ExecutionContext::new(".");
        assert!(matches!(ctx.set_env("NOEQUALS"), Err(DirectiveError::MalformedAssignment(_))));
        assert!(ctx.set_env("=value").is_err());
        assert!(ctx.set_env("TWO WORDS=x").is_err());
        assert!(ctx.env_overrides().is_empty());
    }

    #[tokio::test]
    async fn test_relative_start_directory() {
        let scratch = tempfile::tempdir_in(".").unwrap();
        std::fs::create_dir_all(scratch.path().join("work/sub")).unwrap();
        let start = scratch.path().join("work");
        assert!(start.is_relative());

        let mut ctx = ExecutionContext::new(&start);
        assert!(ctx.working_dir().is_absolute());

        ctx.change_dir("sub").await.unwrap();
        ctx.change_dir("..").await.unwrap();
        ctx.change_dir("..").await.unwrap();

        let expected = std::env::current_dir().unwrap().join(scratch.path());
        assert_eq!(ctx.working_dir(), normalize(&expected));
    }

    #[tokio::test]
    async fn test_cd_dot_from_current_directory() {
        let mut ctx = ExecutionContext::new(".");
        ctx.change_dir(".").await.unwrap();
        assert_eq!(ctx.working_dir(), std::env::current_dir().unwrap());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(normalize(Path::new("/a/..")), PathBuf::from("/"));
        assert_eq!(normalize(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(normalize(Path::new("work/sub/../..")), PathBuf::from("."));
        assert_eq!(normalize(Path::new("../../x")), PathBuf::from("../../x"));
    }

    #[test]
    fn test_strip_drive_flag() {
        assert_eq!(strip_drive_flag("/d D:\\work"), "D:\\work");
        assert_eq!(strip_drive_flag("/D  E:\\"), "E:\\");
        assert_eq!(strip_drive_flag("/data"), "/data");
    }
}
