//! Routes inbound chat messages to the map handlers.
//!
//! Rules are tried in a fixed order. A rule whose pattern matches may still
//! decline the message, in which case the next rule gets a chance.

use crate::context::MapContext;
use crate::error::MapError;
use crate::error::Result;
use crate::installer::InstallOutcome;
use crate::installer::TransferKind;
use crate::installer::TransferReport;
use crate::maps::compile;
use crate::sink::ReplySink;
use mysmap_protocol::Reply;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Deserialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

static WHERE_IS: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"^#*((提瓦特|渊下宫|层岩巨渊|地下矿区|旧(日之)?海)?((哪有|哪里有)(.+))|((.+)(在哪|在哪里|哪有|哪里有|位置|点位))(？|\?)?)$",
    )
});
static RESOURCE_LIST: Lazy<Regex> = Lazy::new(|| compile(r"^#*(原神|米游社)?地图资源列表$"));
static HELP: Lazy<Regex> = Lazy::new(|| compile(r"^#*(地图|找资源)帮助$"));
static POINT_DETAIL: Lazy<Regex> = Lazy::new(|| compile(r"^(.*)[0-9a-zA-Z]{2}$"));
static PACKAGE: Lazy<Regex> = Lazy::new(|| compile(r"^#(安装|更新)地图资源包?$"));

const FORCE_REFRESH_KEYWORD: &str = "更新";

pub const HELP_TEXT: &str = "【#清心在哪|#旧海清心在哪】\n【#清心AK】查询坐标信息\n【#地图资源列表】全部资源名称";

/// One message as delivered by the host chat framework.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Inbound {
    pub text: String,
    /// The message carries an image attachment.
    pub has_image: bool,
    /// The sender may manage the resource package.
    pub privileged: bool,
}

impl Inbound {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }
}

/// What [`MapContext::dispatch`] did with a message.
#[derive(Debug)]
pub enum Dispatch {
    Declined,
    Handled,
    /// Handled, and a resource package transfer keeps running in the
    /// background until the handle resolves.
    Transfer(JoinHandle<TransferReport>),
}

impl Dispatch {
    pub fn is_handled(&self) -> bool {
        !matches!(self, Dispatch::Declined)
    }

    fn from_handled(handled: bool) -> Self {
        if handled {
            Dispatch::Handled
        } else {
            Dispatch::Declined
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    WhereIs,
    ResourceList,
    Help,
    PointDetail,
    Package(TransferKind),
}

/// Commands whose pattern matches `text`, in the order they are tried.
pub fn matching_commands(text: &str) -> Vec<Command> {
    let mut commands = Vec::new();
    if WHERE_IS.is_match(text) {
        commands.push(Command::WhereIs);
    }
    if RESOURCE_LIST.is_match(text) {
        commands.push(Command::ResourceList);
    }
    if HELP.is_match(text) {
        commands.push(Command::Help);
    }
    if POINT_DETAIL.is_match(text) {
        commands.push(Command::PointDetail);
    }
    if let Some(caps) = PACKAGE.captures(text) {
        let kind = match caps.get(1).as_ref().map(regex_lite::Match::as_str) {
            Some(FORCE_REFRESH_KEYWORD) => TransferKind::Update,
            _ => TransferKind::Install,
        };
        commands.push(Command::Package(kind));
    }
    commands
}

impl MapContext {
    /// Handle one inbound message. Returns whether any rule consumed it.
    pub async fn handle(&self, inbound: &Inbound, sink: Arc<dyn ReplySink>) -> bool {
        self.dispatch(inbound, sink).await.is_handled()
    }

    /// Like [`MapContext::handle`], but hands back the background transfer a
    /// package command started so the caller can wait for it.
    pub async fn dispatch(&self, inbound: &Inbound, sink: Arc<dyn ReplySink>) -> Dispatch {
        let text = inbound.text.trim();
        for command in matching_commands(text) {
            debug!("trying {command:?} for {text:?}");
            let dispatch = match command {
                Command::WhereIs => Dispatch::from_handled(self.where_is(text, sink.as_ref()).await),
                Command::ResourceList => {
                    Dispatch::from_handled(self.resource_list(sink.as_ref()).await)
                }
                Command::Help => {
                    sink.send_text(HELP_TEXT.to_string()).await;
                    Dispatch::Handled
                }
                Command::PointDetail => {
                    Dispatch::from_handled(self.point_detail(inbound, text, sink.as_ref()).await)
                }
                Command::Package(kind) => self.package(inbound, kind, sink.clone()).await,
            };
            if dispatch.is_handled() {
                return dispatch;
            }
        }
        Dispatch::Declined
    }

    async fn where_is(&self, text: &str, sink: &dyn ReplySink) -> bool {
        if let Err(err) = self.locate(text, sink).await {
            sink.send_text(err.user_message()).await;
        }
        true
    }

    async fn locate(&self, text: &str, sink: &dyn ReplySink) -> Result<()> {
        if !self.images.is_installed().await? {
            return Err(MapError::NotInstalled);
        }
        let resolution = self.resolver.resolve(text).await;
        let Some(label) = resolution.resolved() else {
            return Err(MapError::NotFound {
                map: resolution.map.name.to_string(),
                label: resolution.label.name,
            });
        };

        let force_refresh = text.contains(FORCE_REFRESH_KEYWORD);
        let reply = self.images.get(resolution.map, &label, force_refresh, sink).await?;
        info!(
            "serving {}/{} ({:?}, {} points)",
            resolution.map.id, label.id, reply.freshness, reply.label_total
        );

        sink.send(vec![
            Reply::text(format!("资源 {} 的位置如下", label.name)),
            Reply::file(reply.image),
            Reply::text(format!(
                "\n※ {} 一共找到 {} 个位置点\n※ 数据来源于米游社wiki\n※ 发送【地图帮助】查看说明",
                label.name, reply.label_total
            )),
        ])
        .await;
        Ok(())
    }

    async fn resource_list(&self, sink: &dyn ReplySink) -> bool {
        match self.list.images(&self.catalog).await {
            Ok(images) => {
                sink.send(images.into_iter().map(Reply::image).collect()).await;
            }
            Err(err) => {
                warn!("resource list unavailable: {err}");
                sink.send_text(err.user_message()).await;
            }
        }
        true
    }

    async fn point_detail(&self, inbound: &Inbound, text: &str, sink: &dyn ReplySink) -> bool {
        if inbound.has_image {
            return false;
        }
        let query = match self.resolver.resolve_point(text).await {
            Ok(Some(query)) => query,
            Ok(None) => return false,
            Err(err) => {
                warn!("point lookup for {text:?} failed: {err}");
                return false;
            }
        };
        let message = self.points.describe(&self.images, &query).await;
        sink.send(message).await;
        true
    }

    async fn package(&self, inbound: &Inbound, kind: TransferKind, sink: Arc<dyn ReplySink>) -> Dispatch {
        if !inbound.privileged {
            return Dispatch::Declined;
        }
        let outcome = match kind {
            TransferKind::Install => self.installer.install(sink.clone()).await,
            TransferKind::Update => self.installer.update(sink.clone()).await,
        };
        match outcome {
            Ok(InstallOutcome::Started(handle)) => Dispatch::Transfer(handle),
            Ok(outcome) => {
                debug!("{kind} request: {outcome:?}");
                Dispatch::Handled
            }
            Err(err) => {
                warn!("{kind} request failed: {err}");
                sink.send_text(err.user_message()).await;
                Dispatch::Handled
            }
        }
    }
}
