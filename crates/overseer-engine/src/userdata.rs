//! Shared mutable userdata with scoped remap views
//!
//! The root owns the canonical store. A child never touches it directly: it
//! sees a `ScopedUserData` view that translates child-local keys through the
//! remap table declared when the child was added. Keys without a remap entry
//! pass through unchanged.

use std::collections::HashMap;

use serde_json::Value;

/// Read/write access to userdata under some key scope.
pub trait DataScope {
    fn get(&self, key: &str) -> Option<&Value>;
    fn set(&mut self, key: &str, value: Value);
    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// The canonical userdata store, owned by the root of the tree.
#[derive(Clone, Debug, Default)]
pub struct UserData {
    map: HashMap<String, Value>,
}

impl UserData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a key with an initial value. Remap targets are validated
    /// against the declared key set at confirmation time.
    pub fn declare(&mut self, key: impl Into<String>, value: Value) {
        self.map.insert(key.into(), value);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }
}

impl DataScope for UserData {
    fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    fn set(&mut self, key: &str, value: Value) {
        self.map.insert(key.to_string(), value);
    }
}

/// View of a parent scope through a child's remap table.
pub struct ScopedUserData<'a> {
    parent: &'a mut dyn DataScope,
    remap: &'a HashMap<String, String>,
}

impl<'a> ScopedUserData<'a> {
    pub fn new(parent: &'a mut dyn DataScope, remap: &'a HashMap<String, String>) -> Self {
        Self { parent, remap }
    }

    fn translate(&self, key: &str) -> String {
        self.remap.get(key).cloned().unwrap_or_else(|| key.to_string())
    }
}

impl DataScope for ScopedUserData<'_> {
    fn get(&self, key: &str) -> Option<&Value> {
        let parent_key = self.translate(key);
        self.parent.get(&parent_key)
    }

    fn set(&mut self, key: &str, value: Value) {
        let parent_key = self.translate(key);
        self.parent.set(&parent_key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scoped_view_translates_keys() {
        let mut data = UserData::new();
        data.declare("pose", json!(null));

        let mut remap = HashMap::new();
        remap.insert("target".to_string(), "pose".to_string());

        let mut view = ScopedUserData::new(&mut data, &remap);
        view.set("target", json!([1.0, 2.0]));
        assert_eq!(view.get("target"), Some(&json!([1.0, 2.0])));

        assert_eq!(data.get("pose"), Some(&json!([1.0, 2.0])));
        assert!(data.get("target").is_none());
    }

    #[test]
    fn unmapped_keys_pass_through() {
        let mut data = UserData::new();
        data.declare("shared", json!(1));

        let remap = HashMap::new();
        let view = ScopedUserData::new(&mut data, &remap);
        assert_eq!(view.get("shared"), Some(&json!(1)));
    }
}
