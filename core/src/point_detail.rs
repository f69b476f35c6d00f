use crate::client::UpstreamClient;
use crate::image_cache::ImageCache;
use crate::resolver::PointQuery;
use mysmap_protocol::ImageSource;
use mysmap_protocol::Reply;
use tracing::warn;

/// Looks up the description of a single point within a resolved label.
pub struct PointDetailFetcher {
    client: UpstreamClient,
}

impl PointDetailFetcher {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }

    /// Reply segments for `query`. Always yields at least one segment.
    pub async fn describe(&self, cache: &ImageCache, query: &PointQuery) -> Vec<Reply> {
        let title = format!("{}{}", query.label.name, query.key);
        let record = match cache.load_record(query.map, &query.label.id).await {
            Ok(record) => record,
            Err(err) => {
                warn!("failed to read sidecar for {}/{}: {err}", query.map.id, query.label.id);
                None
            }
        };
        let Some(point_id) = record.and_then(|record| record.metadata.point_id(&query.key)) else {
            return vec![Reply::text(format!(
                "{}资源「{}」没有找到「{}」标点",
                query.map.name, query.label.name, query.key
            ))];
        };

        let info = match self.client.point_info(query.map.id, &point_id).await {
            Ok(response) => response.into_info().unwrap_or_default(),
            Err(err) => {
                warn!("point info request for {point_id} failed: {err}");
                return vec![Reply::text(format!("资源「{title}」描述信息获取失败，请稍后再试"))];
            }
        };

        let mut message = vec![Reply::text(format!("资源「{title}」描述信息：\n"))];
        if let Some(content) = info.content.filter(|content| !content.is_empty()) {
            message.push(Reply::text(content));
        }
        if let Some(img) = info.img.filter(|img| !img.is_empty()) {
            message.push(Reply::image(ImageSource::Url(img)));
        }
        if message.len() < 2 {
            return vec![Reply::text(format!("资源「{title}」暂无描述"))];
        }
        message
    }
}
