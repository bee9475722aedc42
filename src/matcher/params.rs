use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum number of path parameters before heap allocation.
/// Most routes bind ≤4 params (e.g., `/users/:id/posts/:post_id`).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage.
///
/// Param names use `Arc<str>` because they come from the compiled matcher and
/// are shared by every request; values are per-request data. A value of `None`
/// records an optional parameter that did not participate in the match.
pub type ParamVec = SmallVec<[(Arc<str>, Option<String>); MAX_INLINE_PARAMS]>;

/// Ordered parameter bindings produced by a match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: ParamVec,
}

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a parameter value by name.
    ///
    /// Returns `None` both when the name is unbound and when it is bound to an
    /// absent optional value; use [`Params::contains`] to tell them apart.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .and_then(|(_, v)| v.as_deref())
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k.as_ref() == name)
    }

    /// Bind `name`. An existing binding is only replaced by a present value,
    /// so a later non-participating alternative never erases an earlier capture.
    pub fn insert(&mut self, name: Arc<str>, value: Option<String>) {
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => {
                if value.is_some() {
                    entry.1 = value;
                }
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Overwrite a binding unconditionally (used by param hooks rewriting a value).
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = Some(value.into());
        match self.entries.iter_mut().find(|(k, _)| k.as_ref() == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((Arc::from(name), value)),
        }
    }

    pub(crate) fn raw(&self, name: &str) -> Option<&Option<String>> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v)
    }

    /// Layer these bindings over `parent`: parent entries come first and are
    /// overridden by same-named entries from `self`.
    #[must_use]
    pub fn merged_over(&self, parent: &Params) -> Params {
        let mut merged = parent.clone();
        for (k, v) in &self.entries {
            match merged.entries.iter_mut().find(|(pk, _)| pk == k) {
                Some(entry) => entry.1 = v.clone(),
                None => merged.entries.push((Arc::clone(k), v.clone())),
            }
        }
        merged
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_ref(), v.as_deref()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
