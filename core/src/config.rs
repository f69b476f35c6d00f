use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the map query layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    /// Root directory holding `data/`, `html/` and the `images/` corpus
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Base URL of the map image mirror
    #[serde(default = "default_mirror_base_url")]
    pub mirror_base_url: String,

    /// Base URL of the upstream wiki's static API (label tree, point info)
    #[serde(default = "default_static_base_url")]
    pub static_base_url: String,

    /// Protocol version sent to the mirror as `p`
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,

    /// Git remote holding the image corpus
    #[serde(default = "default_corpus_repo")]
    pub corpus_repo: String,

    /// Program used for corpus transfers
    #[serde(default = "default_git_program")]
    pub git_program: PathBuf,

    /// Entries under the primary map needed to treat the corpus as usable
    #[serde(default = "default_installed_threshold")]
    pub installed_threshold: usize,

    /// Entries under the primary map at which `install` short-circuits
    #[serde(default = "default_complete_threshold")]
    pub complete_threshold: usize,

    /// Seconds between scheduled catalog refreshes
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// External command turning an HTML template plus page data into an image.
    /// Invoked as `<program> <args..> <template> <page.json> <output.jpg>`.
    #[serde(default)]
    pub render_command: Option<Vec<String>>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./mys-map")
}

fn default_mirror_base_url() -> String {
    "https://hlhs-nb.cn".to_string()
}

fn default_static_base_url() -> String {
    "https://api-static.mihoyo.com".to_string()
}

fn default_protocol_version() -> String {
    "1.3".to_string()
}

fn default_corpus_repo() -> String {
    "https://gitee.com/QQ1146638442/mys_map.git".to_string()
}

fn default_git_program() -> PathBuf {
    PathBuf::from("git")
}

fn default_installed_threshold() -> usize {
    300
}

fn default_complete_threshold() -> usize {
    600
}

fn default_refresh_interval_secs() -> u64 {
    6 * 60 * 60
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            mirror_base_url: default_mirror_base_url(),
            static_base_url: default_static_base_url(),
            protocol_version: default_protocol_version(),
            corpus_repo: default_corpus_repo(),
            git_program: default_git_program(),
            installed_threshold: default_installed_threshold(),
            complete_threshold: default_complete_threshold(),
            refresh_interval_secs: default_refresh_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            render_command: None,
        }
    }
}

impl MapConfig {
    /// Convenience constructor rooted at `data_dir` with every other field defaulted.
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.data_dir.as_os_str().is_empty() {
            return Err("Data directory must not be empty".to_string());
        }

        for (name, url) in [
            ("mirror_base_url", &self.mirror_base_url),
            ("static_base_url", &self.static_base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("{name} must be an http(s) URL: {url}"));
            }
        }

        if self.installed_threshold == 0 {
            return Err("Installed threshold must be > 0".to_string());
        }

        if self.complete_threshold < self.installed_threshold {
            return Err(format!(
                "Complete threshold ({}) must not be below installed threshold ({})",
                self.complete_threshold, self.installed_threshold
            ));
        }

        if self.refresh_interval_secs == 0 {
            return Err("Refresh interval must be > 0".to_string());
        }

        if let Some(command) = &self.render_command
            && command.is_empty()
        {
            return Err("render_command must name a program".to_string());
        }

        Ok(())
    }
}
