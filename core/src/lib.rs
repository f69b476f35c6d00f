//! Map resource lookup for Genshin Impact chat queries.
//!
//! A [`MapContext`] answers "where is X" questions with cached map images from
//! a third-party mirror, lists the known resources, describes individual
//! points and manages the locally cloned image corpus.

pub mod alias;
pub mod catalog;
pub mod client;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod image_cache;
pub mod installer;
pub mod layout;
pub mod list_render;
pub mod maps;
pub mod point_detail;
pub mod render;
pub mod resolver;
pub mod sink;
pub mod transfer;

pub use alias::AliasStore;
pub use alias::ResolvedLabel;
pub use catalog::BootstrapStats;
pub use catalog::LabelCatalog;
pub use client::UpstreamClient;
pub use config::MapConfig;
pub use context::MapContext;
pub use dispatch::Dispatch;
pub use dispatch::Inbound;
pub use error::MapError;
pub use error::Result;
pub use image_cache::Freshness;
pub use image_cache::ImageCache;
pub use image_cache::ImageReply;
pub use installer::InstallOutcome;
pub use installer::PackageInstaller;
pub use installer::TransferKind;
pub use installer::TransferReport;
pub use layout::DataLayout;
pub use maps::MapRef;
pub use render::CommandRenderer;
pub use render::Renderer;
pub use resolver::Resolver;
pub use sink::ReplySink;
pub use transfer::CorpusTransfer;
pub use transfer::GitTransfer;
