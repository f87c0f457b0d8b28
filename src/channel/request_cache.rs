use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;
use tracing::trace;

use crate::Result;

/// Connected endpoints of one operation kind, keyed by request string
///
/// Keys are the caller's request strings verbatim. Lookups are lock-free
/// across keys; creation on a miss is serialized so one request string
/// never yields two endpoints.
pub(crate) struct RequestCache<E: ?Sized> {
    kind: &'static str,
    // request string -> connected endpoint
    entries: DashMap<String, Arc<E>>,
    create_lock: Mutex<()>,
}

impl<E: ?Sized> RequestCache<E> {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: DashMap::new(),
            create_lock: Mutex::new(()),
        }
    }

    pub(crate) fn lookup(
        &self,
        request: &str,
    ) -> Option<Arc<E>> {
        self.entries.get(request).map(|entry| entry.value().clone())
    }

    /// Last write wins
    pub(crate) fn insert(
        &self,
        request: &str,
        endpoint: Arc<E>,
    ) {
        trace!(kind = self.kind, request, "cache updated");
        self.entries.insert(request.to_string(), endpoint);
    }

    /// Drops the cache's references; endpoints tear themselves down when
    /// their last reference goes away
    pub(crate) fn clear(&self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns the cached endpoint for `request`, or runs `create` and caches
    /// its result. Nothing is cached when `create` fails.
    pub(crate) fn get_or_try_insert_with<F>(
        &self,
        request: &str,
        create: F,
    ) -> Result<Arc<E>>
    where
        F: FnOnce() -> Result<Arc<E>>,
    {
        // Fast path: endpoint already negotiated
        if let Some(endpoint) = self.lookup(request) {
            return Ok(endpoint);
        }

        // Slow path: a concurrent caller may have created it meanwhile
        let _guard = self.create_lock.lock();
        if let Some(endpoint) = self.lookup(request) {
            return Ok(endpoint);
        }

        debug!(kind = self.kind, request, "creating endpoint");
        let endpoint = create()?;
        self.insert(request, endpoint.clone());
        Ok(endpoint)
    }
}
