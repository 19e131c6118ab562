//! Byte stream → SSE events → provider chunks.
//!
//! [`SseStream`] turns a response body into [`SseEvent`]s. [`ProviderStream`]
//! drives a provider-specific [`ChunkAssembler`] over those events, so each
//! provider only describes how its wire events map to [`ProviderChunk`]s.

use crate::sse::{SseEvent, SseParser};
use futures_core::Stream;
use pin_project_lite::pin_project;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use toolflow_types::{ApiError, ProviderChunk};

type ByteStream = Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>;

pin_project! {
    /// An async stream of raw [`SseEvent`]s read from an HTTP body.
    pub struct SseStream {
        #[pin]
        inner: ByteStream,
        parser: SseParser,
        pending: VecDeque<SseEvent>,
        finished: bool,
    }
}

impl SseStream {
    /// Create a new SseStream from a reqwest byte stream.
    pub fn new(
        byte_stream: impl Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
    ) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            parser: SseParser::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }
}

impl Stream for SseStream {
    type Item = Result<SseEvent, ApiError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if *this.finished {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.pending.extend(this.parser.feed(&bytes));
                }
                Poll::Ready(Some(Err(e))) => {
                    *this.finished = true;
                    return Poll::Ready(Some(Err(ApiError::Network(e.to_string()))));
                }
                Poll::Ready(None) => {
                    *this.finished = true;
                    this.pending.extend(this.parser.finish());
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Provider-specific translation of SSE events into chunks.
pub trait ChunkAssembler: Send {
    /// Handle one event. An `Err` ends the stream.
    fn on_event(&mut self, event: SseEvent) -> Result<Vec<ProviderChunk>, ApiError>;

    /// Called once when the body ends. Providers that signal completion by
    /// closing the connection emit their `Done` here.
    fn on_end(&mut self) -> Vec<ProviderChunk> {
        Vec::new()
    }
}

/// Parse streamed tool arguments. Malformed JSON degrades to `{}` so the
/// call still reaches the dispatcher, which reports schema violations back
/// to the model.
pub(crate) fn parse_arguments(tool: &str, raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(tool, "malformed tool arguments ({e}), using {{}}");
        json!({})
    })
}

pin_project! {
    /// A [`ProviderChunk`] stream assembled from an [`SseStream`].
    pub struct ProviderStream<A> {
        #[pin]
        events: SseStream,
        assembler: A,
        pending: VecDeque<ProviderChunk>,
        done: bool,
    }
}

impl<A: ChunkAssembler> ProviderStream<A> {
    pub fn new(events: SseStream, assembler: A) -> Self {
        Self {
            events,
            assembler,
            pending: VecDeque::new(),
            done: false,
        }
    }
}

impl<A: ChunkAssembler> Stream for ProviderStream<A> {
    type Item = Result<ProviderChunk, ApiError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(chunk) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(chunk)));
            }
            if *this.done {
                return Poll::Ready(None);
            }

            match this.events.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => match this.assembler.on_event(event) {
                    Ok(chunks) => this.pending.extend(chunks),
                    Err(e) => {
                        *this.done = true;
                        return Poll::Ready(Some(Err(e)));
                    }
                },
                Poll::Ready(Some(Err(e))) => {
                    *this.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    *this.done = true;
                    this.pending.extend(this.assembler.on_end());
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
