use crate::error::MapError;
use crate::error::Result;
use crate::layout::write_atomic;
use async_trait::async_trait;
use mysmap_protocol::ImageSource;
use mysmap_protocol::IndexPage;
use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use tokio::process::Command;
use tracing::debug;

/// Turns an HTML template plus page data into an image.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, template: &Path, page: &IndexPage) -> Result<ImageSource>;
}

/// [`Renderer`] that shells out to an external screenshot tool.
///
/// The tool is run as `<program> <args..> <template> <page.json> <output.jpg>`
/// and must leave the image at `<output.jpg>`.
#[derive(Debug)]
pub struct CommandRenderer {
    program: PathBuf,
    args: Vec<String>,
    output_dir: PathBuf,
    counter: AtomicUsize,
}

impl CommandRenderer {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, output_dir: PathBuf) -> Self {
        Self {
            program: program.into(),
            args,
            output_dir,
            counter: AtomicUsize::new(0),
        }
    }

    /// Builds a renderer from a `[program, args..]` command line.
    pub fn from_command_line(command: &[String], output_dir: PathBuf) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program, args.to_vec(), output_dir))
    }
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn render(&self, template: &Path, page: &IndexPage) -> Result<ImageSource> {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let data_path = self.output_dir.join(format!("page-{seq}.json"));
        let output_path = self.output_dir.join(format!("page-{seq}.jpg"));
        write_atomic(&data_path, &serde_json::to_vec_pretty(page)?).await?;

        debug!(
            "rendering {} with {} into {}",
            template.display(),
            data_path.display(),
            output_path.display()
        );
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(template)
            .arg(&data_path)
            .arg(&output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| MapError::Render(format!("failed to run {}: {err}", self.program.display())))?;

        if !output.status.success() {
            return Err(MapError::Render(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if !tokio::fs::try_exists(&output_path).await? {
            return Err(MapError::Render(format!(
                "renderer produced no image at {}",
                output_path.display()
            )));
        }
        Ok(ImageSource::File(output_path))
    }
}

/// Renderer used when none is configured: every render fails with a
/// readable reason.
#[derive(Debug, Default)]
pub struct UnconfiguredRenderer;

#[async_trait]
impl Renderer for UnconfiguredRenderer {
    async fn render(&self, _template: &Path, _page: &IndexPage) -> Result<ImageSource> {
        Err(MapError::Render("no render_command configured".to_string()))
    }
}
