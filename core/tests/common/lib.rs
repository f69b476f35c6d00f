use async_trait::async_trait;
use mysmap_core::CorpusTransfer;
use mysmap_core::DataLayout;
use mysmap_core::MapConfig;
use mysmap_core::MapContext;
use mysmap_core::MapError;
use mysmap_core::Renderer;
use mysmap_core::ReplySink;
use mysmap_protocol::ImageSource;
use mysmap_protocol::IndexPage;
use mysmap_protocol::Reply;
use serde_json::Value;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use tempfile::TempDir;
use tokio::sync::Notify;
use wiremock::MockServer;


/// Entries written into the primary map directory by
/// [`MapFixture::installed`].
pub const INSTALLED_ENTRIES: usize = 300;

/// A data directory in a temp dir plus a config whose upstream URLs point at
/// a mock server.
pub struct MapFixture {
    pub dir: TempDir,
    pub config: MapConfig,
}

impl MapFixture {
    pub fn new(server: &MockServer) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = MapConfig::with_data_dir(dir.path());
        config.mirror_base_url = server.uri();
        config.static_base_url = server.uri();
        config.corpus_repo = "https://example.invalid/mys_map.git".to_string();
        config.request_timeout_secs = 5;
        Self { dir, config }
    }

    /// Fixture whose primary map already holds enough filler files to count
    /// as installed.
    pub fn installed(server: &MockServer) -> Self {
        let fixture = Self::new(server);
        fixture.populate_primary(INSTALLED_ENTRIES);
        fixture.write_version("20240101");
        fixture
    }

    pub fn layout(&self) -> DataLayout {
        DataLayout::new(self.dir.path())
    }

    pub fn populate_primary(&self, entries: usize) {
        fill_map_dir(&self.layout().map_dir(2), entries);
    }

    pub fn write_version(&self, version: &str) {
        write(&self.layout().version_file(), version.as_bytes());
    }

    pub fn write_aliases(&self, yaml: &str) {
        write(&self.layout().alias_file(), yaml.as_bytes());
    }

    /// Writes the sidecar and a placeholder image for `(map_id, label_id)`.
    pub fn write_record(&self, map_id: u32, label_id: &str, sidecar: Value) {
        let layout = self.layout();
        write(
            &layout.sidecar(map_id, label_id),
            &serde_json::to_vec_pretty(&sidecar).expect("serialize sidecar"),
        );
        write(&layout.image(map_id, label_id), b"cached-image");
    }

    pub fn write_label_tree(&self, tree: Value) {
        let body = serde_json::json!({ "retcode": 0, "message": "OK", "data": { "tree": tree } });
        write(
            &self.layout().label_tree_file(),
            &serde_json::to_vec(&body).expect("serialize tree"),
        );
    }

    pub fn context(&self, transfer: Arc<dyn CorpusTransfer>, renderer: Arc<dyn Renderer>) -> MapContext {
        MapContext::new(self.config.clone(), transfer, renderer).expect("build map context")
    }

    /// Context with a transfer and renderer that never get used.
    pub fn default_context(&self) -> MapContext {
        self.context(Arc::new(FakeTransfer::default()), Arc::new(CountingRenderer::default()))
    }
}

pub fn write(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dir");
    }
    std::fs::write(path, contents).expect("write fixture file");
}

/// Creates `dir` holding `entries` placeholder files.
pub fn fill_map_dir(dir: &Path, entries: usize) {
    std::fs::create_dir_all(dir).expect("create map dir");
    for index in 0..entries {
        std::fs::write(dir.join(format!("filler-{index}.jpg")), b"").expect("write filler");
    }
}

/// Sink that keeps every message it was sent.
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<Vec<Reply>>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<Vec<Reply>> {
        self.messages.lock().unwrap().clone()
    }

    /// Text of every single-segment text message, in order.
    pub fn texts(&self) -> Vec<String> {
        self.messages()
            .iter()
            .filter_map(|message| match message.as_slice() {
                [reply] => reply.as_text().map(str::to_string),
                _ => None,
            })
            .collect()
    }

    pub fn last_text(&self) -> Option<String> {
        self.texts().pop()
    }
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn send(&self, message: Vec<Reply>) {
        self.messages.lock().unwrap().push(message);
    }
}

/// In-process stand-in for git.
///
/// A successful clone creates `<dest>/2` with `entries` files and a version
/// file. A failing clone leaves a partial `<dest>` behind before erroring.
#[derive(Default)]
pub struct FakeTransfer {
    clones: AtomicUsize,
    pulls: AtomicUsize,
    entries: usize,
    failure: Option<(i32, String)>,
    gate: Option<Arc<Notify>>,
}

impl FakeTransfer {
    pub fn succeeding(entries: usize) -> Self {
        Self {
            entries,
            ..Self::default()
        }
    }

    pub fn failing(code: i32, message: &str) -> Self {
        Self {
            failure: Some((code, message.to_string())),
            ..Self::default()
        }
    }

    /// Transfers wait on `gate` before doing anything.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn clones(&self) -> usize {
        self.clones.load(Ordering::SeqCst)
    }

    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    async fn wait_for_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
    }

    fn outcome(&self) -> mysmap_core::Result<()> {
        match &self.failure {
            Some((code, message)) => Err(MapError::Transfer {
                code: Some(*code),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CorpusTransfer for FakeTransfer {
    async fn clone_corpus(&self, _repo: &str, dest: &Path) -> mysmap_core::Result<()> {
        self.clones.fetch_add(1, Ordering::SeqCst);
        self.wait_for_gate().await;
        if self.failure.is_some() {
            fill_map_dir(&dest.join("2"), 3);
            return self.outcome();
        }
        fill_map_dir(&dest.join("2"), self.entries);
        write(&dest.join("version"), b"20240202");
        Ok(())
    }

    async fn pull_corpus(&self, _dir: &Path) -> mysmap_core::Result<()> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        self.wait_for_gate().await;
        self.outcome()
    }
}

/// Renderer that records the pages it was given.
#[derive(Default)]
pub struct CountingRenderer {
    pages: Mutex<Vec<IndexPage>>,
}

impl CountingRenderer {
    pub fn renders(&self) -> usize {
        self.pages.lock().unwrap().len()
    }

    pub fn pages(&self) -> Vec<IndexPage> {
        self.pages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Renderer for CountingRenderer {
    async fn render(&self, _template: &Path, page: &IndexPage) -> mysmap_core::Result<ImageSource> {
        let mut pages = self.pages.lock().unwrap();
        pages.push(page.clone());
        Ok(ImageSource::File(PathBuf::from(format!(
            "page-{}.jpg",
            pages.len()
        ))))
    }
}
