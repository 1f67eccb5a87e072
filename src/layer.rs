use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::context::Context;
use crate::error::RuntimeResult;
use crate::value::Value;

/// A compiled style-language function. The owning [`Context`] is passed in
/// first; methods receive their receiver as `args[0]`.
pub type Function = Arc<dyn Fn(&Context, &[Value]) -> RuntimeResult<Value> + Send + Sync>;

/// Wraps a closure as a [`Function`], pinning down its signature so callers
/// can write plain closures.
pub fn make_function<F>(f: F) -> Function
where
    F: Fn(&Context, &[Value]) -> RuntimeResult<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Opaque property attributes (`des`, `noui`, `grouped`, ...). Interpreted by
/// whoever renders the customize surface, never by the runtime.
pub type Attributes = BTreeMap<String, Value>;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PropMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub attr: Attributes,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PropGroup {
    pub name: String,
    pub displayname: String,
    pub members: Vec<String>,
}

/// One style layer (core, layout, theme, user) as populated by a compiled
/// program loader.
///
/// Registration performs no validation; ordering mistakes such as naming a
/// parent class that was never registered are the loader's problem. A layer is
/// treated as frozen once it is handed to [`Context::new`].
#[derive(Clone, Default)]
pub struct Layer {
    info: BTreeMap<String, String>,
    func: HashMap<String, Function>,
    set: HashMap<String, Value>,
    classchild: HashMap<String, Vec<String>>,
    prop: Vec<String>,
    propgroup: HashMap<String, PropGroup>,
    propgrouplist: Vec<String>,
    propmeta: HashMap<String, PropMeta>,
    prophide: HashMap<String, bool>,
    haspropgroups: bool,
}

impl Layer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_layer_info(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.info.insert(key.into(), value.into());
    }

    pub fn layer_info(&self, key: &str) -> Option<&str> {
        self.info.get(key).map(String::as_str)
    }

    pub fn all_layer_info(&self) -> &BTreeMap<String, String> {
        &self.info
    }

    /// Shorthand for the `type` info field (`core`, `layout`, `theme`, ...).
    pub fn layer_type(&self) -> Option<&str> {
        self.layer_info("type")
    }

    pub fn register_class(&mut self, name: &str, parent: Option<&str>) {
        self.classchild.insert(name.to_string(), Vec::new());
        if let Some(parent) = parent {
            match self.classchild.get_mut(parent) {
                Some(children) => children.push(name.to_string()),
                None => tracing::trace!(class = name, parent, "parent class not registered"),
            }
        }
    }

    /// Registers one implementation per alias. `cons` runs once for every
    /// name so aliases never share closure state.
    pub fn register_function<S, F>(&mut self, names: &[S], cons: F)
    where
        S: AsRef<str>,
        F: Fn() -> Function,
    {
        for name in names {
            self.func.insert(name.as_ref().to_string(), cons());
        }
    }

    pub fn register_property(&mut self, name: &str, ty: &str, attr: Attributes) {
        self.propmeta.insert(
            name.to_string(),
            PropMeta {
                name: name.to_string(),
                ty: ty.to_string(),
                attr,
            },
        );
        self.prop.push(name.to_string());
    }

    /// Creates or updates a propgroup. A display name given earlier through
    /// [`Layer::name_prop_group`] survives; members are replaced.
    pub fn register_prop_group<S: AsRef<str>>(&mut self, name: &str, members: &[S]) {
        let group = self
            .propgroup
            .entry(name.to_string())
            .or_insert_with(PropGroup::default);
        group.name = name.to_string();
        if group.displayname.is_empty() {
            group.displayname = name.to_string();
        }
        group.members = members.iter().map(|m| m.as_ref().to_string()).collect();
        self.haspropgroups = true;
        self.propgrouplist.push(name.to_string());
    }

    pub fn name_prop_group(&mut self, name: &str, displayname: &str) {
        let group = self
            .propgroup
            .entry(name.to_string())
            .or_insert_with(PropGroup::default);
        group.name = name.to_string();
        group.displayname = displayname.to_string();
    }

    pub fn set_property(&mut self, name: &str, value: Value) {
        self.set.insert(name.to_string(), value);
    }

    pub fn use_property(&mut self, name: &str) {
        self.prop.push(name.to_string());
    }

    pub fn hide_property(&mut self, name: &str) {
        self.prophide.insert(name.to_string(), true);
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.func.get(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = (&str, &Function)> {
        self.func.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn property_value(&self, name: &str) -> Option<&Value> {
        self.set.get(name)
    }

    pub fn property_values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.set.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.classchild.contains_key(name)
    }

    pub fn class_children(&self, name: &str) -> Option<&[String]> {
        self.classchild.get(name).map(Vec::as_slice)
    }

    /// Declared and used property names, in program order. Repeats are kept.
    pub fn declared_props(&self) -> &[String] {
        &self.prop
    }

    pub fn prop_meta(&self, name: &str) -> Option<&PropMeta> {
        self.propmeta.get(name)
    }

    pub fn prop_group(&self, name: &str) -> Option<&PropGroup> {
        self.propgroup.get(name)
    }

    /// Propgroups in registration order. A group registered twice appears
    /// twice, both times showing its latest state.
    pub fn prop_groups(&self) -> impl Iterator<Item = &PropGroup> {
        self.propgrouplist
            .iter()
            .filter_map(|name| self.propgroup.get(name))
    }

    pub fn has_prop_groups(&self) -> bool {
        self.haspropgroups
    }

    pub fn is_property_hidden(&self, name: &str) -> bool {
        self.prophide.get(name).copied().unwrap_or(false)
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.layer_info("name").unwrap_or("unnamed layer"))
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut funcs: Vec<&str> = self.func.keys().map(String::as_str).collect();
        funcs.sort_unstable();
        f.debug_struct("Layer")
            .field("info", &self.info)
            .field("func", &funcs)
            .field("set", &self.set)
            .field("classchild", &self.classchild)
            .field("prop", &self.prop)
            .field("propgrouplist", &self.propgrouplist)
            .field("haspropgroups", &self.haspropgroups)
            .finish()
    }
}
