use crate::error::MapError;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Moves the image corpus between the remote repository and local disk.
#[async_trait]
pub trait CorpusTransfer: Send + Sync {
    /// Fresh shallow copy of `repo` into `dest`, which must not exist yet.
    async fn clone_corpus(&self, repo: &str, dest: &Path) -> Result<()>;

    /// Discard local modifications in `dir` and fast-forward it.
    async fn pull_corpus(&self, dir: &Path) -> Result<()>;
}

/// [`CorpusTransfer`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitTransfer {
    program: PathBuf,
}

impl GitTransfer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&str], cwd: Option<&Path>) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }
        debug!("running {} {}", self.program.display(), args.join(" "));

        let output = cmd.output().await.map_err(|err| MapError::Transfer {
            code: err.raw_os_error(),
            message: format!("failed to run {}: {err}", self.program.display()),
        })?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(MapError::Transfer {
            code: output.status.code(),
            message: if stderr.is_empty() {
                format!("{} {} exited with {}", self.program.display(), args.join(" "), output.status)
            } else {
                stderr
            },
        })
    }
}

impl Default for GitTransfer {
    fn default() -> Self {
        Self::new("git")
    }
}

#[async_trait]
impl CorpusTransfer for GitTransfer {
    async fn clone_corpus(&self, repo: &str, dest: &Path) -> Result<()> {
        let dest = dest.to_string_lossy();
        self.run(&["clone", repo, dest.as_ref(), "--depth=1"], None).await
    }

    async fn pull_corpus(&self, dir: &Path) -> Result<()> {
        self.run(&["checkout", "."], Some(dir)).await?;
        self.run(&["pull"], Some(dir)).await
    }
}
