//! Bounded, shared image cache with one network fetch per URL at a time.

use crate::error::SyncError;
use crate::remote::BlobStore;
use image::DynamicImage;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::oneshot;

pub type Image = Arc<DynamicImage>;

type Waiter = oneshot::Sender<Option<Image>>;

/// What the cache knows about a URL without touching the network.
#[derive(Debug, Clone)]
pub enum Lookup {
    Ready(Image),
    Pending,
    Missing,
}

/// Cheap to clone; all clones share one cache.
pub struct ImageCache<B> {
    inner: Arc<Inner<B>>,
}

impl<B> Clone for ImageCache<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<B> {
    blobs: B,
    state: Mutex<State>,
}

/// Cached images and in-flight fetches live under the same lock so that
/// checking for a hit and registering a fetch happen in one step.
struct State {
    capacity: usize,
    tick: u64,
    images: HashMap<String, (Image, u64)>,
    recency: BTreeMap<u64, String>,
    pending: HashMap<String, Vec<Waiter>>,
}

impl State {
    fn touch(&mut self, url: &str) -> Option<Image> {
        self.tick += 1;
        let tick = self.tick;

        let (image, used) = self.images.get_mut(url)?;
        self.recency.remove(&*used);
        *used = tick;
        self.recency.insert(tick, url.to_owned());

        Some(Arc::clone(image))
    }

    fn insert(&mut self, url: String, image: Image) {
        self.tick += 1;

        if let Some((_, used)) = self.images.insert(url.clone(), (image, self.tick)) {
            self.recency.remove(&used);
        }
        self.recency.insert(self.tick, url);

        while self.images.len() > self.capacity {
            let Some((_, oldest)) = self.recency.pop_first() else {
                break;
            };
            tracing::trace!(url = %oldest, "Evicting image");
            self.images.remove(&oldest);
        }
    }
}

enum Subscription {
    Hit(Image),
    Wait(oneshot::Receiver<Option<Image>>),
}

impl<B: BlobStore + 'static> ImageCache<B> {
    /// Empty cache holding at most `capacity` images.
    pub fn new(blobs: B, capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                blobs,
                state: Mutex::new(State {
                    capacity: capacity.max(1),
                    tick: 0,
                    images: HashMap::new(),
                    recency: BTreeMap::new(),
                    pending: HashMap::new(),
                }),
            }),
        }
    }

    pub fn get(&self, url: &str) -> Lookup {
        let mut state = self.inner.state.lock();

        if let Some(image) = state.touch(url) {
            Lookup::Ready(image)
        } else if state.pending.contains_key(url) {
            Lookup::Pending
        } else {
            Lookup::Missing
        }
    }

    pub fn set(&self, url: impl Into<String>, image: Image) {
        self.inner.state.lock().insert(url.into(), image);
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached image, or the result of the fetch for `url`. `None` when the
    /// fetch failed; failures are not cached.
    pub async fn load(&self, url: &str) -> Option<Image> {
        match self.subscribe(url) {
            Subscription::Hit(image) => Some(image),
            Subscription::Wait(rx) => rx.await.ok().flatten(),
        }
    }

    /// Callback flavour of [`ImageCache::load`]. A cache hit runs `on_complete`
    /// before this returns.
    pub fn load_with<F>(&self, url: &str, on_complete: F)
    where
        F: FnOnce(Option<Image>) + Send + 'static,
    {
        match self.subscribe(url) {
            Subscription::Hit(image) => on_complete(Some(image)),
            Subscription::Wait(rx) => {
                tokio::spawn(async move {
                    on_complete(rx.await.ok().flatten());
                });
            }
        }
    }

    /// Warms the cache for upcoming rows.
    pub fn prefetch<I, S>(&self, urls: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for url in urls {
            self.load_with(url.as_ref(), |_| {});
        }
    }

    fn subscribe(&self, url: &str) -> Subscription {
        let (tx, rx) = oneshot::channel();

        {
            let mut state = self.inner.state.lock();

            if let Some(image) = state.touch(url) {
                tracing::trace!(%url, "Image cache hit");
                return Subscription::Hit(image);
            }

            if let Some(waiters) = state.pending.get_mut(url) {
                waiters.push(tx);
                return Subscription::Wait(rx);
            }

            state.pending.insert(url.to_owned(), vec![tx]);
        }

        tracing::debug!(%url, "Image cache miss, fetching");

        let cache = self.clone();
        let url = url.to_owned();
        tokio::spawn(async move { cache.fetch(url).await });

        Subscription::Wait(rx)
    }

    async fn fetch(&self, url: String) {
        let mut delivery = Delivery {
            state: &self.inner.state,
            url,
            image: None,
        };

        let image = match self.inner.blobs.fetch(&delivery.url).await {
            Ok(bytes) => image::load_from_memory(&bytes)
                .map(Arc::new)
                .map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };

        delivery.image = match image {
            Ok(image) => Some(image),
            Err(reason) => {
                let err = SyncError::ImageFetchFailed {
                    url: delivery.url.clone(),
                    reason,
                };
                tracing::warn!(%err, "Image not cached");
                None
            }
        };
    }
}

/// Settles one fetch when dropped: caches the image, if any, and answers
/// every waiter. A fetch that panics or is aborted answers with `None`.
struct Delivery<'a> {
    state: &'a Mutex<State>,
    url: String,
    image: Option<Image>,
}

impl Drop for Delivery<'_> {
    fn drop(&mut self) {
        let waiters = {
            let mut state = self.state.lock();
            if let Some(image) = &self.image {
                state.insert(self.url.clone(), Arc::clone(image));
            }
            state.pending.remove(&self.url).unwrap_or_default()
        };

        for waiter in waiters {
            // A dropped receiver only means that caller stopped waiting.
            let _ = waiter.send(self.image.clone());
        }
    }
}
