//! Variable collection for snapshots and breakpoints

use std::collections::BTreeMap;

use super::resolver;
use crate::interp::{ExecutionFrame, NativeConverter};

/// Marker recorded when a declared variable cannot be converted
pub const CONVERSION_ERROR: &str = "[Error]";

/// Marker recorded when a breakpoint variable cannot be converted
pub const VIEW_ERROR: &str = "[View Error]";

/// Resolve each of `names` on `stack` and convert the hits to host values
///
/// The first resolution of a name wins. Names that resolve to nothing are
/// left out of the result. Conversion failures are recorded as `marker`.
pub fn collect_with_marker<S: AsRef<str>>(
    converter: &dyn NativeConverter,
    stack: &[ExecutionFrame],
    names: &[S],
    marker: &str,
) -> BTreeMap<String, serde_json::Value> {
    let mut values = BTreeMap::new();
    if stack.is_empty() || names.is_empty() {
        return values;
    }

    for name in names {
        let name = name.as_ref();
        if values.contains_key(name) {
            continue;
        }
        let Some(found) = resolver::find(stack, name) else {
            continue;
        };
        let native = match converter.to_native(&found.value) {
            Ok(native) => native,
            Err(e) => {
                tracing::warn!(name, scope = %found.scope_label, error = %e, "Failed to convert variable");
                serde_json::Value::String(marker.to_string())
            }
        };
        values.insert(name.to_string(), native);
    }

    values
}

/// [`collect_with_marker`] using the declared-variable marker
pub fn collect<S: AsRef<str>>(
    converter: &dyn NativeConverter,
    stack: &[ExecutionFrame],
    names: &[S],
) -> BTreeMap<String, serde_json::Value> {
    collect_with_marker(converter, stack, names, CONVERSION_ERROR)
}
