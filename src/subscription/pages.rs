use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::models::Subscriber;
use crate::shared::FanoutError;

/// Finite, non-restartable sequence of subscriber batches for one event
///
/// The lookup runs when the stream is first polled and yields exactly one
/// batch; the stream is consumed by iteration and cannot be replayed. Callers
/// should still loop over it so backends that page their results can yield
/// several batches.
pub struct SubscriberPages {
    inner: BoxStream<'static, Result<Vec<Subscriber>, FanoutError>>,
}

impl SubscriberPages {
    /// Single page produced by `lookup`
    pub fn once<F>(lookup: F) -> Self
    where
        F: Future<Output = Result<Vec<Subscriber>, FanoutError>> + Send + 'static,
    {
        Self {
            inner: stream::once(lookup).boxed(),
        }
    }

    /// Drain every page into one list, stopping at the first failed page
    pub async fn collect_all(mut self) -> Result<Vec<Subscriber>, FanoutError> {
        let mut all = Vec::new();
        while let Some(page) = self.next().await {
            all.extend(page?);
        }
        Ok(all)
    }
}

impl Stream for SubscriberPages {
    type Item = Result<Vec<Subscriber>, FanoutError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.poll_next_unpin(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
