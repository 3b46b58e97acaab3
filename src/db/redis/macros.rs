/// Read-through caching around an async computation.
///
/// Returns the cached value for `$key` when present. Otherwise awaits
/// `$block`, queues the result for a background write with `$ttl` seconds,
/// and returns it. Errors from the cache or the block propagate with `?`.
///
/// ```rust,ignore
/// let details = cached!(cache, CacheKey::MovieDetails(id), 86_400, async {
///     fetch_details(id).await
/// });
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = $key;
        match $cache.get_from_cache(&key).await? {
            Some(hit) => Ok(hit),
            None => {
                let value = $block.await?;
                $cache.set_in_background(&key, &value, $ttl);
                Ok(value)
            }
        }
    }};
}
