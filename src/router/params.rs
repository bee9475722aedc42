use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::matcher::ParamKey;
use crate::middleware::{guarded, ParamHook, Signal};
use crate::request::Request;
use crate::response::Response;

/// Param hooks of one router, keyed by parameter name.
#[derive(Clone, Default)]
pub(crate) struct ParamRegistry {
    hooks: HashMap<Arc<str>, Vec<Arc<dyn ParamHook>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    router: u64,
    name: Arc<str>,
    value: String,
}

/// Result of running the hooks for one (router, name, value) triple.
#[derive(Debug, Clone)]
struct ParamCall {
    /// Parameter value after the hooks ran (hooks may rewrite it)
    value: Option<String>,
    /// `None` when every hook continued
    outcome: Option<Signal>,
}

/// Per-request record of hooks already run.
///
/// Lives on the [`Request`] so a value seen by several layers (or by the same
/// router again after descending into a mounted child) fires its hooks once.
#[derive(Debug, Default)]
pub(crate) struct ParamCache {
    calls: HashMap<CacheKey, ParamCall>,
}

impl ParamRegistry {
    pub(crate) fn add(&mut self, name: Arc<str>, hook: Arc<dyn ParamHook>) {
        self.hooks.entry(name).or_default().push(hook);
    }

    /// Run the hooks for every hooked parameter bound by a layer, in key order.
    ///
    /// Returns the first non-`Continue` outcome. Cached outcomes are replayed
    /// without invoking the hooks again.
    pub(crate) fn process(
        &self,
        router: u64,
        keys: &[ParamKey],
        req: &mut Request,
        res: &mut Response,
    ) -> Signal {
        if self.hooks.is_empty() {
            return Signal::Continue;
        }

        for key in keys {
            let Some(hooks) = self.hooks.get(&key.name) else {
                continue;
            };
            let Some(Some(value)) = req.params.raw(&key.name).cloned() else {
                continue;
            };
            let cache_key = CacheKey {
                router,
                name: Arc::clone(&key.name),
                value,
            };

            if let Some(call) = req.param_cache.calls.get(&cache_key).cloned() {
                if let Some(value) = call.value {
                    req.params.set(&key.name, value);
                }
                match call.outcome {
                    Some(outcome) => return outcome,
                    None => continue,
                }
            }

            debug!(
                param = %key.name,
                value = %cache_key.value,
                hooks = hooks.len(),
                "running param hooks"
            );
            let mut outcome = None;
            for hook in hooks {
                match guarded(|| hook.call(req, res, &cache_key.value, &key.name)) {
                    Signal::Continue => {}
                    other => {
                        outcome = Some(other);
                        break;
                    }
                }
            }

            let call = ParamCall {
                value: req.params.get(&key.name).map(str::to_string),
                outcome: outcome.clone(),
            };
            req.param_cache.calls.insert(cache_key, call);
            if let Some(outcome) = outcome {
                return outcome;
            }
        }

        Signal::Continue
    }
}

impl fmt::Debug for ParamRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.hooks.keys().map(AsRef::as_ref).collect();
        names.sort_unstable();
        f.debug_struct("ParamRegistry").field("params", &names).finish()
    }
}
