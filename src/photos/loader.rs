/// Caching image manager
///
/// Every request gets an id and a [`CancellationToken`]. A cancelled request
/// never delivers, even if decoding already finished. Failed requests are
/// dropped without a result.
use iced::futures::future::{BoxFuture, FutureExt};
use log::{debug, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::imaging::thumbnail::{
    load_thumbnail, DeliveryMode, FitMode, TargetSize, Thumbnail, ThumbnailCache,
};
use crate::state::data::Asset;

/// Identifies one image request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestOptions {
    pub delivery: DeliveryMode,
}

/// An in-flight request
pub struct ImageRequest {
    pub id: RequestId,
    /// Cancel to discard the result
    pub token: CancellationToken,
    /// Resolves to None when the request failed or was cancelled
    pub image: BoxFuture<'static, Option<Thumbnail>>,
}

impl std::fmt::Debug for ImageRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRequest")
            .field("id", &self.id)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

#[derive(Debug)]
pub struct ImageManager {
    cache: Option<ThumbnailCache>,
    next_id: AtomicU64,
}

impl ImageManager {
    pub fn new(cache: Option<ThumbnailCache>) -> Self {
        Self {
            cache,
            next_id: AtomicU64::new(1),
        }
    }

    /// Request a bitmap of `asset` scaled to `target`
    pub fn request_image(
        &self,
        asset: &Asset,
        target: TargetSize,
        fit: FitMode,
        options: RequestOptions,
    ) -> ImageRequest {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let token = CancellationToken::new();

        let cancel = token.clone();
        let cache = self.cache.clone();
        let asset = asset.clone();

        let image = async move {
            if cancel.is_cancelled() {
                return None;
            }

            let asset_id = asset.id;
            let still_wanted = cancel.clone();
            let job = tokio::task::spawn_blocking(move || {
                load_thumbnail(cache.as_ref(), &asset, target, fit, options.delivery, || {
                    !still_wanted.is_cancelled()
                })
            });

            // The blocking decode cannot be interrupted; cancelling only
            // stops us from waiting for it
            let joined = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Image request {:?} cancelled", id);
                    return None;
                }
                joined = job => joined,
            };

            if cancel.is_cancelled() {
                return None;
            }

            match joined {
                Ok(Ok(thumbnail)) => Some(thumbnail),
                Ok(Err(e)) => {
                    debug!("No image for asset {}: {}", asset_id, e);
                    None
                }
                Err(e) => {
                    warn!("Image task for asset {} failed: {}", asset_id, e);
                    None
                }
            }
        }
        .boxed();

        ImageRequest { id, token, image }
    }

    /// Callback form of [`request_image`](Self::request_image).
    ///
    /// `on_image` runs at most once, and not at all when the request fails
    /// or is cancelled. Must be called from within a tokio runtime. The
    /// iced shell routes results through messages instead, so only tests
    /// drive requests this way.
    #[cfg(test)]
    pub fn request_image_with<F>(
        &self,
        asset: &Asset,
        target: TargetSize,
        fit: FitMode,
        options: RequestOptions,
        on_image: F,
    ) -> (RequestId, CancellationToken)
    where
        F: FnOnce(Thumbnail) + Send + 'static,
    {
        let request = self.request_image(asset, target, fit, options);
        let token = request.token.clone();

        tokio::spawn(async move {
            if let Some(thumbnail) = request.image.await {
                if !request.token.is_cancelled() {
                    on_image(thumbnail);
                }
            }
        });

        (request.id, token)
    }
}

/// Shared handle used by the UI
pub type SharedImageManager = Arc<ImageManager>;
