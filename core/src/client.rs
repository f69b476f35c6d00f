use crate::config::MapConfig;
use crate::error::MapError;
use crate::error::Result;
use crate::layout::write_atomic;
use mysmap_protocol::LabelTreeResponse;
use mysmap_protocol::MirrorResponse;
use mysmap_protocol::PointInfoResponse;
use reqwest::Response;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::debug;

const MIRROR_MAP_PATH: &str = "/api/genshin/map";
const LABEL_TREE_PATH: &str = "/common/map_user/ys_obc/v2/map/label/tree";
const POINT_INFO_PATH: &str = "/common/map_user/ys_obc/v1/map/point/info";
const APP_SN: &str = "ys_obc";
const LANG: &str = "zh-cn";

/// HTTP access to the image mirror and the wiki's static API.
#[derive(Clone, Debug)]
pub struct UpstreamClient {
    http: reqwest::Client,
    mirror_base: String,
    static_base: String,
    protocol_version: String,
}

impl UpstreamClient {
    pub fn new(config: &MapConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http,
            mirror_base: config.mirror_base_url.trim_end_matches('/').to_string(),
            static_base: config.static_base_url.trim_end_matches('/').to_string(),
            protocol_version: config.protocol_version.clone(),
        })
    }

    /// Asks the mirror for the current rendering of `label_id` on `map_id`.
    pub async fn mirror_lookup(
        &self,
        label_id: &str,
        map_id: u32,
        version: &str,
    ) -> Result<MirrorResponse> {
        let url = format!("{}{MIRROR_MAP_PATH}", self.mirror_base);
        debug!("mirror lookup label={label_id} map={map_id} version={version}");
        let map_id = map_id.to_string();
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("label_id", label_id),
                ("map_id", map_id.as_str()),
                ("version", version),
                ("p", self.protocol_version.as_str()),
            ])
            .send()
            .await?;
        json_body(resp).await
    }

    pub async fn label_tree(&self) -> Result<LabelTreeResponse> {
        let url = format!("{}{LABEL_TREE_PATH}", self.static_base);
        let resp = self
            .http
            .get(&url)
            .query(&[("map_id", "2"), ("app_sn", APP_SN), ("lang", LANG)])
            .send()
            .await?;
        json_body(resp).await
    }

    pub async fn point_info(&self, map_id: u32, point_id: &str) -> Result<PointInfoResponse> {
        let url = format!("{}{POINT_INFO_PATH}", self.static_base);
        let map_id = map_id.to_string();
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("map_id", map_id.as_str()),
                ("point_id", point_id),
                ("app_sn", APP_SN),
                ("lang", LANG),
            ])
            .send()
            .await?;
        json_body(resp).await
    }

    /// Absolute URL for a path the mirror returned.
    pub fn mirror_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}{path}", self.mirror_base)
    }

    /// Downloads `url` into `dest`. The destination is only replaced once
    /// the whole body has arrived.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        debug!("downloading {url} -> {}", dest.display());
        let resp = checked(self.http.get(url).send().await?)?;
        let body = resp.bytes().await?;
        write_atomic(dest, &body).await
    }
}

fn checked(resp: Response) -> Result<Response> {
    let status = resp.status();
    if !status.is_success() {
        return Err(MapError::HttpStatus {
            status: status.as_u16(),
            url: resp.url().to_string(),
        });
    }
    Ok(resp)
}

async fn json_body<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let body = checked(resp)?.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}
