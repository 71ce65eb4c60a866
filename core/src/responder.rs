//! Responder - the network boundary
//!
//! A responder turns a prompt into a stream of UTF-8 text chunks. How the
//! bytes travel is up to the implementation; the engine only sees chunks.

use crate::error::ResponderError;
use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;
use futures_util::stream::{self, BoxStream, StreamExt};
use std::fmt;
use std::sync::Arc;

/// Reserved leading glyph of a control chunk.
pub const CONTROL_SENTINEL: char = '\u{1e}';

/// Metadata marker; matched case-insensitively anywhere in a chunk.
pub const CONFIDENCE_MARKER: &str = "confidence:";

pub type ChunkStream = BoxStream<'static, Result<String, ResponderError>>;

#[async_trait]
pub trait Responder: Send + Sync {
    /// Start answering `prompt`. Errors here mean no body was produced at all.
    async fn send(&self, prompt: &str) -> Result<ChunkStream, ResponderError>;
}

#[async_trait]
impl<R> Responder for Arc<R>
where
    R: Responder + ?Sized,
{
    async fn send(&self, prompt: &str) -> Result<ChunkStream, ResponderError> {
        (**self).send(prompt).await
    }
}

/// Control chunks carry metadata for the transport and are never rendered.
pub fn is_control_chunk(chunk: &str) -> bool {
    chunk.trim_start().starts_with(CONTROL_SENTINEL)
        || chunk.to_lowercase().contains(CONFIDENCE_MARKER)
}

/// A finished stream over already-known chunks.
pub fn from_chunks<I, S>(chunks: I) -> ChunkStream
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let chunks: Vec<String> = chunks.into_iter().map(Into::into).collect();
    stream::iter(chunks.into_iter().map(Ok)).boxed()
}

/// Decode a raw byte stream into text chunks.
///
/// Multi-byte sequences split across chunk boundaries are held back until
/// complete; invalid bytes become U+FFFD.
pub fn decode_utf8<S, E>(bytes: S) -> ChunkStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let state = (Box::pin(bytes), Vec::<u8>::new(), false);
    stream::unfold(state, |(mut inner, mut pending, finished)| async move {
        if finished {
            return None;
        }
        loop {
            match inner.next().await {
                Some(Ok(chunk)) => {
                    pending.extend_from_slice(&chunk);
                    let text = take_utf8(&mut pending);
                    if !text.is_empty() {
                        return Some((Ok(text), (inner, pending, false)));
                    }
                }
                Some(Err(err)) => {
                    let err = ResponderError::Stream(err.to_string());
                    return Some((Err(err), (inner, pending, true)));
                }
                None => {
                    if pending.is_empty() {
                        return None;
                    }
                    let text = String::from_utf8_lossy(&pending).into_owned();
                    pending.clear();
                    return Some((Ok(text), (inner, pending, true)));
                }
            }
        }
    })
    .boxed()
}

fn take_utf8(pending: &mut Vec<u8>) -> String {
    let mut out = String::new();
    loop {
        match std::str::from_utf8(pending) {
            Ok(valid) => {
                out.push_str(valid);
                pending.clear();
                return out;
            }
            Err(err) => {
                let valid = err.valid_up_to();
                out.push_str(std::str::from_utf8(&pending[..valid]).unwrap_or_default());
                match err.error_len() {
                    Some(bad) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        pending.drain(..valid + bad);
                    }
                    None => {
                        pending.drain(..valid);
                        return out;
                    }
                }
            }
        }
    }
}
