//! Response body that reports back once the connection is done with it

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;

/// Single-chunk body stream.
///
/// `on_sent` runs when the stream is dropped, which happens only after the
/// server has written the chunk (or given up on the connection). Keeps view
/// notifications off the response path.
pub(crate) struct NotifyingBody {
    chunk: Option<Bytes>,
    len: usize,
    on_sent: Option<Box<dyn FnOnce() + Send>>,
}

impl NotifyingBody {
    pub(crate) fn new(chunk: Bytes, on_sent: impl FnOnce() + Send + 'static) -> Self {
        Self {
            len: chunk.len(),
            chunk: Some(chunk),
            on_sent: Some(Box::new(on_sent)),
        }
    }
}

impl Stream for NotifyingBody {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.chunk.take().map(Ok))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::from(self.chunk.is_some());
        (n, Some(n))
    }
}

impl Drop for NotifyingBody {
    fn drop(&mut self) {
        if let Some(on_sent) = self.on_sent.take() {
            on_sent();
        }
    }
}

impl std::fmt::Debug for NotifyingBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyingBody")
            .field("len", &self.len)
            .field("pending", &self.chunk.is_some())
            .finish()
    }
}
