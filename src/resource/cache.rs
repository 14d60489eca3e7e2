//! Lazily computed native format with explicit invalidation.

/// Cached outcome of parsing a resource's bytes.
///
/// Failures are cached too, so a resource that does not parse is not
/// re-parsed on every access. Replacing the bytes marks the cache dirty and
/// the next access parses again.
#[derive(Debug, Clone)]
pub struct NativeCache<T> {
    state: Option<Result<T, String>>,
    dirty: bool,
}

impl<T> NativeCache<T> {
    pub fn new() -> Self {
        Self {
            state: None,
            dirty: false,
        }
    }

    /// Forget any cached outcome.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    /// Whether the next access will parse.
    pub fn needs_parse(&self) -> bool {
        self.dirty || self.state.is_none()
    }

    /// Return the cached value, running `parse` first if needed.
    pub fn get_or_parse<F>(&mut self, parse: F) -> Result<&T, &str>
    where
        F: FnOnce() -> Result<T, String>,
    {
        if self.dirty {
            self.state = None;
            self.dirty = false;
        }
        self.state
            .get_or_insert_with(parse)
            .as_ref()
            .map_err(|reason| reason.as_str())
    }
}

impl<T> Default for NativeCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_once() {
        let mut cache = NativeCache::new();
        let mut calls = 0;
        for _ in 0..3 {
            let value = cache.get_or_parse(|| {
                calls += 1;
                Ok::<_, String>(42)
            });
            assert_eq!(value, Ok(&42));
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_failure_is_cached_until_invalidated() {
        let mut cache: NativeCache<u32> = NativeCache::new();
        assert_eq!(cache.get_or_parse(|| Err("bad".into())), Err("bad"));
        assert!(!cache.needs_parse());
        assert_eq!(cache.get_or_parse(|| Ok(1)), Err("bad"));

        cache.invalidate();
        assert!(cache.needs_parse());
        assert_eq!(cache.get_or_parse(|| Ok(1)), Ok(&1));
    }
}
