use crate::catalog::LabelCatalog;
use crate::client::UpstreamClient;
use crate::config::MapConfig;
use crate::error::MapError;
use crate::error::Result;
use crate::image_cache::ImageCache;
use crate::installer::PackageInstaller;
use crate::layout::DataLayout;
use crate::list_render::ListRenderer;
use crate::point_detail::PointDetailFetcher;
use crate::render::CommandRenderer;
use crate::render::Renderer;
use crate::render::UnconfiguredRenderer;
use crate::resolver::Resolver;
use crate::transfer::CorpusTransfer;
use crate::transfer::GitTransfer;
use std::sync::Arc;
use tracing::info;

/// Everything a query handler needs, built once at startup and shared.
///
/// Owns the state that must exist exactly once per process: the install
/// flag (inside [`PackageInstaller`]), the in-memory label tree (inside
/// [`LabelCatalog`]) and the rendered index (inside [`ListRenderer`]).
pub struct MapContext {
    pub config: MapConfig,
    pub layout: DataLayout,
    pub resolver: Resolver,
    pub images: ImageCache,
    pub catalog: Arc<LabelCatalog>,
    pub installer: PackageInstaller,
    pub points: PointDetailFetcher,
    pub list: ListRenderer,
}

impl MapContext {
    /// Context wired to `git` and the configured render command.
    pub fn from_config(config: MapConfig) -> Result<Self> {
        let transfer: Arc<dyn CorpusTransfer> = Arc::new(GitTransfer::new(&config.git_program));
        let output_dir = DataLayout::new(&config.data_dir).render_dir();
        let renderer: Arc<dyn Renderer> = match config
            .render_command
            .as_deref()
            .and_then(|command| CommandRenderer::from_command_line(command, output_dir))
        {
            Some(renderer) => Arc::new(renderer),
            None => Arc::new(UnconfiguredRenderer),
        };
        Self::new(config, transfer, renderer)
    }

    pub fn new(
        config: MapConfig,
        transfer: Arc<dyn CorpusTransfer>,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self> {
        config.validate().map_err(MapError::Config)?;

        let layout = DataLayout::new(&config.data_dir);
        let client = UpstreamClient::new(&config)?;
        let catalog = Arc::new(LabelCatalog::new(layout.clone(), client.clone()));

        info!("map data directory: {}", layout.root().display());

        Ok(Self {
            resolver: Resolver::new(layout.clone(), config.installed_threshold),
            images: ImageCache::new(layout.clone(), client.clone(), config.installed_threshold),
            installer: PackageInstaller::new(
                layout.clone(),
                client.clone(),
                transfer,
                catalog.clone(),
                config.corpus_repo.clone(),
                config.complete_threshold,
            ),
            points: PointDetailFetcher::new(client),
            list: ListRenderer::new(layout.clone(), renderer, config.installed_threshold),
            catalog,
            layout,
            config,
        })
    }
}
