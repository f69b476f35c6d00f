use async_trait::async_trait;
use mysmap_protocol::Reply;

/// Delivers reply messages back to the chat a request came from.
///
/// Handlers may hold on to a sink after they return; the corpus installer
/// reports completion of its background transfer through it.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, message: Vec<Reply>);

    async fn send_text(&self, text: String) {
        self.send(vec![Reply::text(text)]).await;
    }
}
