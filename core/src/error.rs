use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapError {
    /// The image corpus is missing or holds too few files.
    #[error("map resource package is not installed")]
    NotInstalled,

    /// The mirror no longer accepts the local corpus version.
    #[error("map resource package version is incompatible with the mirror")]
    VersionMismatch,

    /// Non-zero mirror status with a human-readable message.
    #[error("mirror error: {0}")]
    Remote(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("upstream returned HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("label catalog is not loaded yet")]
    CatalogUnavailable,

    #[error("no resource `{label}` on {map}")]
    NotFound { map: String, label: String },

    /// Bulk transfer process exited unsuccessfully.
    #[error("corpus transfer failed (code {code:?}): {message}")]
    Transfer { code: Option<i32>, message: String },

    #[error("render error: {0}")]
    Render(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Alias file error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl MapError {
    /// Transport or payload failures that the image cache may paper over
    /// with a previously cached record. Local disk failures are not among them.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            MapError::Network(_) | MapError::HttpStatus { .. } | MapError::Json(_)
        )
    }

    /// Text shown to the person who sent the query.
    pub fn user_message(&self) -> String {
        match self {
            MapError::NotInstalled => "尚未安装地图资源包\n请先【#安装地图资源包】".to_string(),
            MapError::VersionMismatch => "地图资源包发生变化\n请【#更新地图资源包】\n\n若更新失败请删除 `mysMap/images` 目录\n并重新【#安装地图资源包】".to_string(),
            MapError::Remote(message) => message.clone(),
            MapError::CatalogUnavailable => "资源列表尚未加载，请稍后再试".to_string(),
            MapError::NotFound { map, label } => format!(
                "{map}没有找到资源「{label}」，\n可能米游社wiki未更新或不存在该资源\n发送【#地图资源列表】查看所有资源名称"
            ),
            other => format!("地图服务暂时不可用：{other}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, MapError>;
