//! Caller-closable byte stream of execution output.

use super::ProviderResult;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{BoxStream, Stream, StreamExt};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Live log stream handed from a provider to the caller.
///
/// The platform neither buffers nor stores streamed bytes. Dropping the
/// stream, or calling [`LogStream::close`], releases the underlying engine
/// connection on every exit path.
pub struct LogStream {
    inner: Option<BoxStream<'static, ProviderResult<Bytes>>>,
    shutdown: Option<BoxFuture<'static, ()>>,
}

impl LogStream {
    /// Wraps an adapter stream.
    pub fn new(stream: impl Stream<Item = ProviderResult<Bytes>> + Send + 'static) -> Self {
        Self {
            inner: Some(stream.boxed()),
            shutdown: None,
        }
    }

    /// Ends the stream when `shutdown` resolves.
    ///
    /// The wrapped stream is dropped as soon as `shutdown` completes, so no
    /// further bytes are delivered and the engine connection is released.
    #[must_use]
    pub fn until<F>(mut self, shutdown: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let signal = match self.shutdown.take() {
            Some(existing) => futures::future::select(existing, shutdown.boxed())
                .map(|_| ())
                .boxed(),
            None => shutdown.boxed(),
        };
        self.shutdown = Some(signal);
        self
    }

    /// Closes the stream explicitly.
    pub fn close(self) {
        drop(self);
    }

    fn release(&mut self) {
        self.inner = None;
        self.shutdown = None;
    }
}

impl Stream for LogStream {
    type Item = ProviderResult<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let stopped = self
            .shutdown
            .as_mut()
            .is_some_and(|signal| signal.poll_unpin(cx).is_ready());
        if stopped {
            self.release();
            return Poll::Ready(None);
        }
        let Some(inner) = self.inner.as_mut() else {
            return Poll::Ready(None);
        };
        match inner.poll_next_unpin(cx) {
            Poll::Ready(None) => {
                self.release();
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl fmt::Debug for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogStream")
            .field("open", &self.inner.is_some())
            .finish_non_exhaustive()
    }
}
