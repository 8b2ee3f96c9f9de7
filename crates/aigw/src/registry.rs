//! Process-wide map from internal request ID to the owning router filter.
//!
//! The router filter registers itself on request headers; the upstream
//! filter constructor looks the handle up to re-associate with the request;
//! OnDestroy removes the entry. Each ID maps to exactly one filter.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::filters::RouterFilter;

/// Shared handle to a per-request router filter.
///
/// Requests are pinned to one worker thread, so the mutex is uncontended; it
/// exists to let the registry and the host share ownership.
pub type FilterHandle = Arc<Mutex<RouterFilter>>;

#[derive(Default)]
pub struct FilterRegistry {
	filters: RwLock<HashMap<String, FilterHandle>>,
}

impl FilterRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&self, id: &str, filter: FilterHandle) {
		self.filters.write().insert(id.to_string(), filter);
	}

	pub fn get(&self, id: &str) -> Option<FilterHandle> {
		self.filters.read().get(id).cloned()
	}

	pub fn remove(&self, id: &str) {
		self.filters.write().remove(id);
	}

	pub fn len(&self) -> usize {
		self.filters.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.filters.read().is_empty()
	}
}

impl std::fmt::Debug for FilterRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FilterRegistry")
			.field("len", &self.len())
			.finish()
	}
}
