//! Presents a message's content as "the buffer so far, and whether it is final".
//!
//! A [`ContentStream`] wraps either a complete string or a stream of text chunks.  It is itself a
//! [`Stream`] of [`ContentUpdate`]s: one per chunk appended, plus a final update when the source
//! ends.  The buffer is available at any point through [`ContentStream::buffer`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::observability::{STREAM_BYTES, STREAM_CANCELLATIONS, STREAM_CHUNKS, STREAM_ERRORS};
use crate::{Error, Result};

/// A boxed stream of text chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Where a message's content comes from.
pub enum ContentSource {
    /// The content is complete.
    Text(String),
    /// The content arrives in chunks.
    Chunks(ChunkStream),
}

impl ContentSource {
    /// A chunked source over an already-known sequence of chunks.
    pub fn chunked<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        ContentSource::Chunks(Box::pin(stream::iter(chunks.into_iter().map(Ok::<_, Error>))))
    }
}

impl fmt::Debug for ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentSource::Text(text) => f.debug_tuple("Text").field(text).finish(),
            ContentSource::Chunks(_) => f.debug_tuple("Chunks").finish_non_exhaustive(),
        }
    }
}

impl From<String> for ContentSource {
    fn from(text: String) -> Self {
        ContentSource::Text(text)
    }
}

impl From<&str> for ContentSource {
    fn from(text: &str) -> Self {
        ContentSource::Text(text.to_string())
    }
}

impl From<ChunkStream> for ContentSource {
    fn from(chunks: ChunkStream) -> Self {
        ContentSource::Chunks(chunks)
    }
}

/// Notification that the buffer of a [`ContentStream`] changed.
#[derive(Clone, Debug)]
pub struct ContentUpdate {
    /// Index of the chunk that produced this update.  The final update of a chunked source
    /// carries the number of chunks received.
    pub chunk_index: usize,
    /// Bytes appended to the buffer by this update.
    pub appended: usize,
    /// True if no more text will arrive.
    pub is_final: bool,
    /// Why the source ended early, reported on the final update only.
    pub failure: Option<Error>,
}

/// The buffer of one message, fed by its [`ContentSource`].
pub struct ContentStream {
    buffer: String,
    source: Option<ChunkStream>,
    unannounced_text: bool,
    chunks: usize,
    finished: bool,
    failure: Option<Error>,
    token: CancellationToken,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl ContentStream {
    /// Creates a stream over `source` with a fresh cancellation token.
    pub fn new(source: ContentSource) -> Self {
        Self::with_cancellation(source, CancellationToken::new())
    }

    /// Creates a stream over `source` that stops when `token` is cancelled.
    pub fn with_cancellation(source: ContentSource, token: CancellationToken) -> Self {
        let cancelled = Box::pin(token.clone().cancelled_owned());
        let (buffer, source, unannounced_text) = match source {
            ContentSource::Text(text) => (text, None, true),
            ContentSource::Chunks(chunks) => (String::new(), Some(chunks), false),
        };
        Self {
            buffer,
            source,
            unannounced_text,
            chunks: 0,
            finished: false,
            failure: None,
            token,
            cancelled,
        }
    }

    /// A stream whose content is already complete.  It yields exactly one update.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(ContentSource::Text(text.into()))
    }

    /// A stream fed by text chunks.
    pub fn from_chunks<S>(chunks: S) -> Self
    where
        S: Stream<Item = Result<String>> + Send + 'static,
    {
        Self::new(ContentSource::Chunks(Box::pin(chunks)))
    }

    /// A stream fed by byte chunks holding UTF-8 text.
    ///
    /// Characters split across chunks are reassembled.  Invalid UTF-8 ends the stream with an
    /// encoding failure.
    pub fn from_bytes<S>(chunks: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Self::from_chunks(decode_utf8(chunks))
    }

    /// The text received so far.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Returns true once no more text will arrive.
    pub fn is_final(&self) -> bool {
        self.finished
    }

    /// Number of chunks appended so far.
    pub fn chunks_received(&self) -> usize {
        self.chunks
    }

    /// Why the source ended early, if it did.
    pub fn failure(&self) -> Option<&Error> {
        self.failure.as_ref()
    }

    /// Stops the stream.  The source is dropped the next time the stream is polled.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns true if the stream was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The token that cancels this stream.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    fn abandon(&mut self) -> Poll<Option<ContentUpdate>> {
        if self.source.take().is_some() || self.unannounced_text {
            STREAM_CANCELLATIONS.click();
            tracing::debug!(
                chunks = self.chunks,
                bytes = self.buffer.len(),
                "content stream cancelled"
            );
        }
        self.unannounced_text = false;
        self.finished = true;
        Poll::Ready(None)
    }

    fn finish(&mut self, failure: Option<Error>) -> ContentUpdate {
        self.source = None;
        self.finished = true;
        self.failure.clone_from(&failure);
        ContentUpdate {
            chunk_index: self.chunks,
            appended: 0,
            is_final: true,
            failure,
        }
    }
}

impl Stream for ContentStream {
    type Item = ContentUpdate;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.token.is_cancelled() {
            return self.abandon();
        }
        if self.unannounced_text {
            self.unannounced_text = false;
            self.finished = true;
            return Poll::Ready(Some(ContentUpdate {
                chunk_index: 0,
                appended: self.buffer.len(),
                is_final: true,
                failure: None,
            }));
        }
        let Some(source) = self.source.as_mut() else {
            return Poll::Ready(None);
        };
        match source.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if self.token.is_cancelled() {
                    return self.abandon();
                }
                let chunk_index = self.chunks;
                self.chunks += 1;
                self.buffer.push_str(&chunk);
                STREAM_CHUNKS.click();
                STREAM_BYTES.count(chunk.len() as u64);
                Poll::Ready(Some(ContentUpdate {
                    chunk_index,
                    appended: chunk.len(),
                    is_final: false,
                    failure: None,
                }))
            }
            Poll::Ready(Some(Err(err))) => {
                STREAM_ERRORS.click();
                tracing::warn!(
                    chunks = self.chunks,
                    bytes = self.buffer.len(),
                    error = %err,
                    "content stream failed"
                );
                Poll::Ready(Some(self.finish(Some(err))))
            }
            Poll::Ready(None) => Poll::Ready(Some(self.finish(None))),
            Poll::Pending => {
                if self.cancelled.as_mut().poll(cx).is_ready() {
                    return self.abandon();
                }
                Poll::Pending
            }
        }
    }
}

impl fmt::Debug for ContentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentStream")
            .field("buffer", &self.buffer)
            .field("chunks", &self.chunks)
            .field("finished", &self.finished)
            .field("failure", &self.failure)
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Splits `text` into chunks of at most `chars` characters.
pub fn split_chunks(text: &str, chars: usize) -> Vec<String> {
    let chars = chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    for (i, c) in text.chars().enumerate() {
        if i > 0 && i % chars == 0 {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn decode_utf8<S>(bytes: S) -> impl Stream<Item = Result<String>> + Send + 'static
where
    S: Stream<Item = Result<Bytes>> + Send + 'static,
{
    let bytes = Box::pin(bytes);
    stream::unfold(
        (bytes, Vec::<u8>::new(), None::<Error>, false),
        |(mut bytes, mut carry, pending, done)| async move {
            if done {
                return None;
            }
            if let Some(err) = pending {
                return Some((Err(err), (bytes, carry, None, true)));
            }
            loop {
                match bytes.next().await {
                    Some(Ok(chunk)) => {
                        carry.extend_from_slice(&chunk);
                        let (valid, invalid) = match std::str::from_utf8(&carry) {
                            Ok(_) => (carry.len(), None),
                            Err(err) if err.error_len().is_some() => {
                                (err.valid_up_to(), Some(Error::from(err)))
                            }
                            Err(err) => (err.valid_up_to(), None),
                        };
                        if valid == 0 {
                            match invalid {
                                Some(err) => return Some((Err(err), (bytes, carry, None, true))),
                                None => continue,
                            }
                        }
                        let rest = carry.split_off(valid);
                        let text = String::from_utf8_lossy(&carry).into_owned();
                        return Some((Ok(text), (bytes, rest, invalid, false)));
                    }
                    Some(Err(err)) => return Some((Err(err), (bytes, carry, None, true))),
                    None if carry.is_empty() => return None,
                    None => {
                        let err = Error::encoding(
                            format!("stream ended inside a {}-byte UTF-8 sequence", carry.len()),
                            None,
                        );
                        return Some((Err(err), (bytes, carry, None, true)));
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&str]) -> ContentStream {
        let parts: Vec<String> = parts.iter().map(|s| s.to_string()).collect();
        ContentStream::new(ContentSource::chunked(parts))
    }

    #[tokio::test]
    async fn text_source_yields_one_update() {
        let mut content = ContentStream::from_text("hello");
        let update = content.next().await.unwrap();
        assert!(update.is_final);
        assert_eq!(update.appended, 5);
        assert!(content.next().await.is_none());
        assert_eq!(content.buffer(), "hello");
        assert!(content.is_final());
    }

    #[tokio::test]
    async fn chunks_concatenate_in_order() {
        let mut content = chunks(&["He", "llo", " world"]);
        let mut updates = Vec::new();
        while let Some(update) = content.next().await {
            updates.push(update);
        }
        assert_eq!(content.buffer(), "Hello world");
        assert_eq!(updates.len(), 4);
        assert_eq!(
            updates.iter().map(|u| u.appended).collect::<Vec<_>>(),
            vec![2, 3, 6, 0]
        );
        assert!(updates[..3].iter().all(|u| !u.is_final));
        assert!(updates[3].is_final);
        assert_eq!(updates[3].chunk_index, 3);
        assert_eq!(content.chunks_received(), 3);
    }

    #[tokio::test]
    async fn failure_is_reported_once_and_buffer_kept() {
        let source = stream::iter(vec![
            Ok("partial ".to_string()),
            Err(Error::streaming("connection reset", None)),
            Ok("never seen".to_string()),
        ]);
        let mut content = ContentStream::from_chunks(source);
        let first = content.next().await.unwrap();
        assert!(first.failure.is_none());
        let last = content.next().await.unwrap();
        assert!(last.is_final);
        assert!(last.failure.as_ref().is_some_and(Error::is_streaming));
        assert!(content.next().await.is_none());
        assert_eq!(content.buffer(), "partial ");
        assert!(content.failure().is_some());
    }

    #[tokio::test]
    async fn cancellation_stops_updates() {
        let mut content = chunks(&["a", "b", "c"]);
        assert!(content.next().await.is_some());
        content.cancel();
        assert!(content.next().await.is_none());
        assert!(content.next().await.is_none());
        assert_eq!(content.buffer(), "a");
        assert!(content.is_cancelled());
        assert!(content.is_final());
    }

    #[tokio::test]
    async fn cancellation_wakes_a_pending_source() {
        let token = CancellationToken::new();
        let mut content = ContentStream::with_cancellation(
            ContentSource::Chunks(Box::pin(stream::pending::<Result<String>>())),
            token.clone(),
        );
        let canceller = tokio::spawn(async move {
            tokio::task::yield_now().await;
            token.cancel();
        });
        assert!(content.next().await.is_none());
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_text_source_is_silent() {
        let mut content = ContentStream::from_text("done");
        content.cancellation_token().cancel();
        assert!(content.next().await.is_none());
        assert_eq!(content.buffer(), "done");
    }

    #[tokio::test]
    async fn bytes_reassemble_split_characters() {
        let text = "naïve ∑ 🦀";
        let raw = text.as_bytes();
        let pieces: Vec<Result<Bytes>> = raw
            .chunks(1)
            .map(|b| Ok(Bytes::copy_from_slice(b)))
            .collect();
        let mut content = ContentStream::from_bytes(stream::iter(pieces));
        while content.next().await.is_some() {}
        assert_eq!(content.buffer(), text);
        assert!(content.failure().is_none());
    }

    #[tokio::test]
    async fn invalid_bytes_fail_with_encoding_error() {
        let pieces: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"ok ")),
            Ok(Bytes::from_static(&[b'!', 0xff, 0x41])),
        ];
        let mut content = ContentStream::from_bytes(stream::iter(pieces));
        let mut last = None;
        while let Some(update) = content.next().await {
            last = Some(update);
        }
        assert_eq!(content.buffer(), "ok !");
        assert!(last.unwrap().failure.unwrap().is_encoding());
    }

    #[tokio::test]
    async fn truncated_character_at_end_is_an_encoding_error() {
        let pieces: Vec<Result<Bytes>> = vec![Ok(Bytes::from_static(&[b'x', 0xe2, 0x88]))];
        let mut content = ContentStream::from_bytes(stream::iter(pieces));
        while content.next().await.is_some() {}
        assert_eq!(content.buffer(), "x");
        assert!(content.failure().is_some_and(Error::is_encoding));
    }

    #[test]
    fn split_chunks_respects_characters() {
        assert_eq!(split_chunks("abcde", 2), vec!["ab", "cd", "e"]);
        assert_eq!(split_chunks("ïïï", 2), vec!["ïï", "ï"]);
        assert!(split_chunks("", 4).is_empty());
        assert_eq!(split_chunks("ab", 0), vec!["a", "b"]);
    }
}
