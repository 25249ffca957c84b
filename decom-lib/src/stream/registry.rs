use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};

use tracing::trace;

use super::processor::{Name, Node, StreamProcessor};

type Registry = HashMap<String, Weak<StreamProcessor>>;

static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();

fn registry() -> &'static Mutex<Registry> {
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Record `node` under its name. Entries whose node has been dropped are pruned.
pub(super) fn register(node: &Node) {
    let Some(name) = node.name() else {
        return;
    };
    let mut reg = registry().lock().unwrap_or_else(PoisonError::into_inner);
    reg.retain(|_, weak| weak.strong_count() > 0);
    if reg.insert(name.to_string(), Arc::downgrade(node)).is_some() {
        trace!(name, "replaced registered stream processor");
    }
}

/// Look up a live stream processor by name.
///
/// The name is normalized the same way as when it was registered, so `"my node"` finds a
/// processor registered as `"my_node"`. Returns `None` if the name is invalid, was never
/// registered, or the processor has since been dropped.
#[must_use]
pub fn get_stream_processor(name: &str) -> Option<Node> {
    let name = Name::new(name).ok()?;
    registry()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name.as_str())
        .and_then(Weak::upgrade)
}
