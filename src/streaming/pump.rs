use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::debug;

use super::assembler::DeltaAssembler;
use super::event::{AssembledMessage, ChatEvent};
use crate::error::{ChatError, Result};

/// Drive an assembler from a response body stream.
///
/// Each chunk is awaited, fed, and the resulting events are yielded. The source
/// is not polled again once the exchange is over, and dropping the returned
/// stream drops the source with it.
pub fn pump<S, E>(source: S, assembler: DeltaAssembler) -> impl Stream<Item = ChatEvent>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Into<ChatError>,
{
    let source = Box::pin(source);

    stream::unfold((source, assembler), |(mut source, mut assembler)| async move {
        if assembler.state().is_terminal() {
            return None;
        }

        let events = match source.next().await {
            Some(Ok(chunk)) => {
                debug!(
                    exchange_id = %assembler.exchange_id(),
                    bytes = chunk.len(),
                    "Received chunk"
                );
                assembler.feed(&chunk)
            }
            Some(Err(e)) => assembler.fail(e.into()).into_iter().collect(),
            None => assembler.finish(),
        };

        Some((stream::iter(events), (source, assembler)))
    })
    .flatten()
}

/// Caller-side handle on one exchange.
pub struct ChatSubscription {
    inner: Pin<Box<dyn Stream<Item = ChatEvent> + Send>>,
}

impl ChatSubscription {
    pub fn new(events: impl Stream<Item = ChatEvent> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(events),
        }
    }

    /// A subscription that fails before any content arrives.
    pub fn failed(error: ChatError) -> Self {
        Self::new(stream::iter([ChatEvent::Failed(error)]))
    }

    /// Run the exchange to the end and return the finished message.
    pub async fn collect_message(mut self) -> Result<AssembledMessage> {
        while let Some(event) = self.next().await {
            match event {
                ChatEvent::ContentUpdated(_) => {}
                ChatEvent::Completed(message) => return Ok(message),
                ChatEvent::Failed(error) => return Err(error),
            }
        }

        Err(ChatError::Transport {
            status: None,
            message: "Exchange ended without a result".to_string(),
        })
    }
}

impl Stream for ChatSubscription {
    type Item = ChatEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
