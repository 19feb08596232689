use std::future::Future;

use ferry_core::StreamError;
use tokio_util::sync::CancellationToken;

/// Await `fut` unless `cancel` fires first.
///
/// A future that is already complete wins over a cancelled token, so data
/// that has arrived is never thrown away by a late cancellation.
pub(crate) async fn cancellable<F: Future>(
    fut: F,
    cancel: Option<&CancellationToken>,
) -> Result<F::Output, StreamError> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            out = fut => Ok(out),
            _ = token.cancelled() => Err(StreamError::Cancelled),
        },
        None => Ok(fut.await),
    }
}
