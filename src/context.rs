//! Caller-supplied case facts injected into every rewrite prompt.
//!
//! Insertion order is preserved because it is visible to the model: the
//! context is rendered as `key: value` lines in the order the client sent
//! them. Values are not validated; non-string JSON values are rendered as
//! JSON text.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Ordered key/value facts about the case (claimant name, employer, …).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    fields: Vec<(String, String)>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `key`. A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `key: value` lines joined by `\n`.
    pub fn render(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Build from a JSON object, coercing every value to text.
    pub fn from_json_object(object: &Map<String, Value>) -> Self {
        object
            .iter()
            .map(|(k, v)| (k.clone(), value_to_text(v)))
            .collect()
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ctx = Context::new();
        for (k, v) in iter {
            ctx.insert(k, v);
        }
        ctx
    }
}

impl Serialize for Context {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Context {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let object = Map::<String, Value>::deserialize(deserializer)?;
        Ok(Context::from_json_object(&object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_preserves_insertion_order() {
        let ctx: Context = [("reclamante", "Jane"), ("empresa", "ACME"), ("cargo", "motorista")]
            .into_iter()
            .collect();
        assert_eq!(
            ctx.render(),
            "reclamante: Jane\nempresa: ACME\ncargo: motorista"
        );
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut ctx = Context::new();
        ctx.insert("a", "1");
        ctx.insert("b", "2");
        ctx.insert("a", "3");
        assert_eq!(ctx.render(), "a: 3\nb: 2");
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn empty_context_renders_empty() {
        assert_eq!(Context::new().render(), "");
        assert!(Context::new().is_empty());
    }

    #[test]
    fn deserialise_keeps_json_order_and_coerces_values() {
        let ctx: Context =
            serde_json::from_str(r#"{"zeta": "z", "anos": 5, "ativo": true, "alpha": null}"#)
                .unwrap();
        assert_eq!(ctx.render(), "zeta: z\nanos: 5\nativo: true\nalpha: null");
        assert_eq!(ctx.get("anos"), Some("5"));
    }

    #[test]
    fn nested_values_render_as_compact_json() {
        let ctx: Context = serde_json::from_str(
            r#"{"verbas": ["ferias", "13o"], "valor": 1.5, "empresa": {"cnpj": "00.000"}, "ok": false}"#,
        )
        .unwrap();
        assert_eq!(ctx.get("verbas"), Some(r#"["ferias","13o"]"#));
        assert_eq!(ctx.get("valor"), Some("1.5"));
        assert_eq!(ctx.get("empresa"), Some(r#"{"cnpj":"00.000"}"#));
        assert_eq!(ctx.get("ok"), Some("false"));
    }

    #[test]
    fn serialise_round_trips_order() {
        let ctx: Context = [("b", "1"), ("a", "2")].into_iter().collect();
        assert_eq!(serde_json::to_string(&ctx).unwrap(), r#"{"b":"1","a":"2"}"#);
    }
}
