//! Dummy completion provider — streams the prompt back word by word,
//! prefixed with `[echo]`. Used for testing the full generation loop
//! without a real API key.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::llm::{
    CompletionRequest, ProviderError, StopReason, StreamEvent, TOKEN_CHANNEL_CAPACITY,
};

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        Ok(vec!["dummy-echo".to_string()])
    }

    pub async fn stream_completion(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StreamEvent>, ProviderError> {
        let (tx, rx) = mpsc::channel(TOKEN_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let mut pieces = vec!["[echo] ".to_string()];
            // split_inclusive keeps separators so the pieces concatenate
            // back to the exact prompt.
            pieces.extend(request.prompt.split_inclusive(' ').map(str::to_string));

            for piece in pieces {
                if cancel.is_cancelled() {
                    let _ = tx.send(StreamEvent::Finished(StopReason::Cancelled)).await;
                    return;
                }
                if tx.send(StreamEvent::Token(piece)).await.is_err() {
                    return;
                }
                tokio::task::yield_now().await;
            }
            let _ = tx.send(StreamEvent::Finished(StopReason::Done)).await;
        });

        Ok(rx)
    }
}
