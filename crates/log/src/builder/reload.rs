//! Reload logic for runtime filter changes

use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, Registry, layer::Layer};

use crate::core::{LogError, LogResult};

/// Handle for swapping the active filter at runtime
#[derive(Clone)]
pub struct ReloadHandle {
    filter: tracing_subscriber::reload::Handle<EnvFilter, Registry>,
    /// Current filter string, read without locking
    current_filter: Arc<ArcSwap<String>>,
}

impl std::fmt::Debug for ReloadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadHandle")
            .field("current_filter", &self.current_filter.load())
            .finish_non_exhaustive()
    }
}

impl ReloadHandle {
    /// Replace the log filter
    ///
    /// # Errors
    /// Returns error if filter parsing fails or the subscriber is gone
    pub fn reload(&self, filter: &str) -> LogResult<()> {
        let new_filter =
            EnvFilter::try_new(filter).map_err(|e| LogError::Filter(format!("{filter}: {e}")))?;
        self.filter
            .reload(new_filter)
            .map_err(|e| LogError::Config(format!("failed to reload filter: {e}")))?;
        self.current_filter.store(Arc::new(filter.to_string()));
        Ok(())
    }

    /// The filter string currently in effect
    pub fn current_filter(&self) -> Arc<String> {
        self.current_filter.load_full()
    }
}

/// Create the filter layer, wrapped in a reload layer when `reloadable`
pub(super) fn create_filter_layer(
    filter: EnvFilter,
    level_str: &str,
    reloadable: bool,
) -> (
    Box<dyn Layer<Registry> + Send + Sync + 'static>,
    Option<ReloadHandle>,
) {
    if reloadable {
        let (layer, handle) = tracing_subscriber::reload::Layer::new(filter);
        let reload_handle = ReloadHandle {
            filter: handle,
            current_filter: Arc::new(ArcSwap::from_pointee(level_str.to_string())),
        };
        (Box::new(layer), Some(reload_handle))
    } else {
        (Box::new(filter), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reload_updates_current_filter() {
        let filter = EnvFilter::try_new("info").unwrap();
        let (_layer, handle) = create_filter_layer(filter, "info", true);
        let handle = handle.unwrap();
        assert_eq!(handle.current_filter().as_str(), "info");

        // The layer is still alive, so the reload reaches it.
        handle.reload("debug").unwrap();
        assert_eq!(handle.current_filter().as_str(), "debug");
    }

    #[test]
    fn test_reload_rejects_bad_filter() {
        let filter = EnvFilter::try_new("info").unwrap();
        let (_layer, handle) = create_filter_layer(filter, "info", true);
        let err = handle.unwrap().reload("strata=verbose").unwrap_err();
        assert!(matches!(err, LogError::Filter(_)));
    }

    #[test]
    fn test_plain_filter_has_no_handle() {
        let filter = EnvFilter::try_new("warn").unwrap();
        let (_layer, handle) = create_filter_layer(filter, "warn", false);
        assert!(handle.is_none());
    }
}
