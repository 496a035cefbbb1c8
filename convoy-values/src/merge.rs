use convoy_types::Values;
use serde_json::Value;

/// Merge `layer` into `base`, with `layer` winning.
///
/// Maps merge key by key. Scalars and lists replace whatever was there. A `null`
/// in `layer` deletes the key from `base`.
pub fn merge_values(base: &mut Values, layer: Values) {
    for (key, value) in layer {
        match value {
            Value::Null => {
                base.remove(&key);
            }
            Value::Object(incoming) => match base.get_mut(&key) {
                Some(Value::Object(existing)) => merge_values(existing, incoming),
                _ => {
                    let mut fresh = Values::new();
                    merge_values(&mut fresh, incoming);
                    base.insert(key, Value::Object(fresh));
                }
            },
            other => {
                base.insert(key, other);
            }
        }
    }
}
