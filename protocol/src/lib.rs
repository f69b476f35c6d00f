//! Wire payloads shared by the mys-map crates: what the upstream APIs send,
//! what the renderer receives, and what a reply to the host looks like.

mod index;
mod reply;
mod upstream;

pub use index::IndexCategory;
pub use index::IndexItem;
pub use index::IndexPage;
pub use reply::ImageSource;
pub use reply::Reply;
pub use upstream::LabelNode;
pub use upstream::LabelTreeData;
pub use upstream::LabelTreeResponse;
pub use upstream::MIRROR_STATUS_OK;
pub use upstream::MIRROR_STATUS_VERSION_MISMATCH;
pub use upstream::MirrorData;
pub use upstream::MirrorResponse;
pub use upstream::PointInfo;
pub use upstream::PointInfoData;
pub use upstream::PointInfoResponse;
