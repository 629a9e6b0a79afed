//! Global federation state and the execution realm that owns it.
//!
//! A [`Realm`] is one isolated global-state environment. The federation
//! record lives in the realm's global table under [`FEDERATION_GLOBAL`];
//! every bootstrap loaded into the realm shares it by convention. Modeling
//! the realm as an explicitly-injected context (rather than true
//! process-wide state) lets each test run against its own realm.

use weft_script::{Object, SharedObject, Value};

/// Well-known global key under which the federation record lives.
pub const FEDERATION_GLOBAL: &str = "__FEDERATION__";

/// Global key under which a loaded container's exported interface is
/// published for later lookup.
pub fn remote_entry_key(container_name: &str) -> String {
    format!("__FEDERATION_{}:custom__", container_name)
}

/// One execution realm: a global object table plus the federation record.
#[derive(Clone)]
pub struct Realm {
    globals: SharedObject,
}

impl Default for Realm {
    fn default() -> Self {
        Self::new()
    }
}

impl Realm {
    /// Create a realm with an empty federation record installed.
    pub fn new() -> Realm {
        let globals = Object::shared();
        globals
            .borrow_mut()
            .set(FEDERATION_GLOBAL, Value::object());
        Realm { globals }
    }

    /// The realm's global object, shared with every script evaluated in it.
    pub fn globals(&self) -> &SharedObject {
        &self.globals
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.globals.borrow().get(key)
    }

    pub fn set(&self, key: &str, value: Value) {
        self.globals.borrow_mut().set(key, value);
    }

    /// The federation record, created on first access if a loaded payload
    /// replaced it with a non-object value.
    pub fn federation(&self) -> SharedObject {
        if let Some(Value::Object(record)) = self.get(FEDERATION_GLOBAL) {
            return record;
        }
        let record = Object::shared();
        self.set(FEDERATION_GLOBAL, Value::Object(record.clone()));
        record
    }

    /// Merge a partial federation record into the realm's record.
    ///
    /// Key-by-key: a pre-existing field wins over a newly introduced one;
    /// only fields absent from the existing record are filled in. The
    /// operation is commutative and idempotent, so independently loaded
    /// bootstraps converge to the same state regardless of completion
    /// order.
    pub fn merge_federation(&self, partial: &SharedObject) {
        let record = self.federation();
        let keys = partial.borrow().keys();
        for key in keys {
            let absent = !record.borrow().has(&key);
            if absent {
                if let Some(value) = partial.borrow().get(&key) {
                    record.borrow_mut().set(&key, value);
                }
            }
        }
    }

    /// Typed view over the federation record.
    pub fn federation_view(&self) -> FederationView {
        FederationView {
            record: self.federation(),
        }
    }
}

/// Read-only typed accessors over the federation record.
pub struct FederationView {
    record: SharedObject,
}

impl FederationView {
    pub fn field(&self, name: &str) -> Option<Value> {
        self.record.borrow().get(name)
    }

    /// The installed runtime implementation, if any.
    pub fn runtime(&self) -> Option<Value> {
        self.field("runtime").filter(Value::is_truthy)
    }

    /// Options accumulated for the one-time init call.
    pub fn init_options(&self) -> Option<Value> {
        self.field("initOptions").filter(Value::is_truthy)
    }

    /// The live runtime instance, present only after init ran.
    pub fn instance(&self) -> Option<Value> {
        self.field("instance").filter(Value::is_truthy)
    }

    pub fn share_scope_map(&self) -> Option<Value> {
        self.field("shareScopeMap").filter(Value::is_truthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(key: &str, value: Value) -> SharedObject {
        let record = Object::shared();
        record.borrow_mut().set(key, value);
        record
    }

    #[test]
    fn test_merge_fills_missing_fields() {
        let realm = Realm::new();
        realm.merge_federation(&record_with("runtime", Value::string("R")));
        realm.merge_federation(&record_with("initOptions", Value::string("O")));
        let view = realm.federation_view();
        assert_eq!(view.runtime().unwrap().as_str(), Some("R"));
        assert_eq!(view.init_options().unwrap().as_str(), Some("O"));
    }

    #[test]
    fn test_merge_existing_field_wins() {
        let realm = Realm::new();
        realm.merge_federation(&record_with("runtime", Value::string("first")));
        realm.merge_federation(&record_with("runtime", Value::string("second")));
        let view = realm.federation_view();
        assert_eq!(view.runtime().unwrap().as_str(), Some("first"));
    }

    #[test]
    fn test_merge_is_commutative_across_interleavings() {
        // One loader installs {runtime: R} then {initOptions: O}; the other
        // installs {initOptions: O2} then {runtime: R2}, interleaved.
        let realm = Realm::new();
        realm.merge_federation(&record_with("runtime", Value::string("R")));
        realm.merge_federation(&record_with("initOptions", Value::string("O2")));
        realm.merge_federation(&record_with("initOptions", Value::string("O")));
        realm.merge_federation(&record_with("runtime", Value::string("R2")));
        let view = realm.federation_view();
        assert_eq!(view.runtime().unwrap().as_str(), Some("R"));
        assert_eq!(view.init_options().unwrap().as_str(), Some("O2"));
    }

    #[test]
    fn test_realms_are_isolated() {
        let a = Realm::new();
        let b = Realm::new();
        a.merge_federation(&{
            let record = Object::shared();
            record.borrow_mut().set("runtime", Value::string("R"));
            record
        });
        assert!(a.federation_view().runtime().is_some());
        assert!(b.federation_view().runtime().is_none());
    }

    #[test]
    fn test_remote_entry_key_format() {
        assert_eq!(remote_entry_key("app1"), "__FEDERATION_app1:custom__");
    }
}
