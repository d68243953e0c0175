/*
 * src/llm/schema.rs
 *
 * Strict JSON-schema rewriting for `complete_structured`.
 *
 * Purpose:
 *   Providers with strict JSON-schema mode reject requests where an object
 *   node does not set `additionalProperties: false`. This recursively
 *   enforces that on a caller-supplied schema without touching any other
 *   field.
 */

use serde_json::Value;

/// Walks `schema` and sets `additionalProperties: false` on every node whose
/// `type` is `"object"`, recursing into `properties`, `items`, and the
/// `anyOf`/`oneOf`/`allOf` combinators.
pub fn enforce_strict(schema: &Value) -> Value {
	let mut out = schema.clone();
	walk(&mut out);
	out
}

fn walk(node: &mut Value) {
	let Value::Object(map) = node else {
		return;
	};

	let is_object_type = matches!(map.get("type"), Some(Value::String(t)) if t == "object");
	if is_object_type {
		map.insert("additionalProperties".to_string(), Value::Bool(false));
	}

	if let Some(Value::Object(props)) = map.get_mut("properties") {
		for (_, v) in props.iter_mut() {
			walk(v);
		}
	}
	if let Some(items) = map.get_mut("items") {
		walk(items);
	}
	for combinator in ["anyOf", "oneOf", "allOf"] {
		if let Some(Value::Array(variants)) = map.get_mut(combinator) {
			for v in variants.iter_mut() {
				walk(v);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn sets_additional_properties_false_on_nested_objects() {
		let schema = json!({
			"type": "object",
			"properties": {
				"inner": {
					"type": "object",
					"properties": { "x": { "type": "string" } }
				},
				"items_list": {
					"type": "array",
					"items": { "type": "object", "properties": { "y": { "type": "number" } } }
				}
			}
		});

		let strict = enforce_strict(&schema);
		assert_eq!(strict["additionalProperties"], json!(false));
		assert_eq!(strict["properties"]["inner"]["additionalProperties"], json!(false));
		assert_eq!(
			strict["properties"]["items_list"]["items"]["additionalProperties"],
			json!(false)
		);
	}

	#[test]
	fn leaves_non_object_schemas_untouched() {
		let schema = json!({ "type": "string" });
		let strict = enforce_strict(&schema);
		assert_eq!(strict, schema);
	}
}
