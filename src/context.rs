use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::builtin::Builtins;
use crate::error::{RuntimeError, RuntimeResult};
use crate::layer::{Function, Layer, PropMeta};
use crate::value::Value;

/// Output sink behind the style language's `print` primitive.
pub type PrintFn = Arc<dyn Fn(&str) + Send + Sync>;

/// A propgroup as shown on the customize surface, with its members resolved
/// to their declaring metadata.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CustomizePropGroup {
    pub name: String,
    pub displayname: String,
    pub members: Vec<PropMeta>,
}

/// The override-resolved view over an ordered layer stack.
///
/// Layers are given lowest priority first: a function or property value set
/// by a later layer hides the same name from every earlier one. Once built the
/// tables are read-only; only the print sink and the builtin table can be
/// swapped afterwards.
pub struct Context {
    func: HashMap<String, Function>,
    prop: HashMap<String, Value>,
    core: Option<usize>,
    layout: Option<usize>,
    propmaster: Option<usize>,
    layers: Vec<Layer>,
    builtin: Builtins,
    print: PrintFn,
}

impl Context {
    pub fn new(layers: Vec<Layer>) -> Self {
        let mut func = HashMap::new();
        let mut prop = HashMap::new();
        let mut core = None;
        let mut layout = None;

        for (idx, layer) in layers.iter().enumerate() {
            match layer.layer_type() {
                Some("core") => {
                    if let Some(prev) = core.replace(idx) {
                        tracing::warn!(prev, idx, "more than one core layer; keeping the last");
                    }
                }
                Some("layout") => {
                    if let Some(prev) = layout.replace(idx) {
                        tracing::warn!(prev, idx, "more than one layout layer; keeping the last");
                    }
                }
                _ => {}
            }
            for (name, f) in layer.functions() {
                func.insert(name.to_string(), Arc::clone(f));
            }
            for (name, value) in layer.property_values() {
                prop.insert(name.to_string(), value.clone());
            }
        }

        let propmaster = layout.or(core);
        tracing::debug!(
            layers = layers.len(),
            functions = func.len(),
            ?core,
            ?layout,
            ?propmaster,
            "composed style context"
        );

        Self {
            func,
            prop,
            core,
            layout,
            propmaster,
            layers,
            builtin: Builtins::new(),
            print: Arc::new(|_: &str| {}),
        }
    }

    pub fn set_print<F>(&mut self, print: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.print = Arc::new(print);
    }

    pub fn print(&self, text: &str) {
        (self.print)(text);
    }

    pub fn set_builtin(&mut self, builtin: Builtins) {
        self.builtin = builtin;
    }

    pub fn builtin(&self) -> &Builtins {
        &self.builtin
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, idx: usize) -> Option<&Layer> {
        self.layers.get(idx)
    }

    pub fn core(&self) -> Option<usize> {
        self.core
    }

    pub fn layout(&self) -> Option<usize> {
        self.layout
    }

    /// Index of the layer whose declaration order drives the customize
    /// surface: the layout if there is one, else the core.
    pub fn propmaster(&self) -> Option<usize> {
        self.propmaster
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.prop.get(name)
    }

    pub fn properties(&self) -> &HashMap<String, Value> {
        &self.prop
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.func.keys().map(String::as_str)
    }

    pub fn is_property_hidden(&self, name: &str) -> bool {
        self.layers.iter().any(|layer| layer.is_property_hidden(name))
    }

    /// Flattened lookup. Builtins are not consulted.
    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.func.get(name)
    }

    /// Resolves `Class::name` from the receiver's dynamic class. There is no
    /// superclass fallback; inherited methods must already be registered under
    /// each concrete class.
    pub fn get_method(
        &self,
        obj: &Value,
        name: &str,
        layer: Option<&str>,
        line: u32,
    ) -> RuntimeResult<Option<&Function>> {
        let Some(class) = receiver_class(obj, name, layer, line)? else {
            tracing::trace!(kind = obj.kind(), method = name, "receiver has no class");
            return Ok(None);
        };
        let found = self.get_function(&format!("{class}::{name}"));
        if found.is_none() {
            tracing::trace!(class, method = name, "method not found");
        }
        Ok(found)
    }

    /// Like [`Context::get_method`], but dispatches on the class the caller
    /// names statically (a `super` call) rather than the receiver's own.
    pub fn get_super_method(
        &self,
        obj: &Value,
        apparent_class: &str,
        name: &str,
        layer: Option<&str>,
        line: u32,
    ) -> RuntimeResult<Option<&Function>> {
        receiver_class(obj, name, layer, line)?;
        Ok(self.get_function(&format!("{apparent_class}::{name}")))
    }

    pub fn run_function(&self, name: &str, args: &[Value]) -> RuntimeResult<Value> {
        let func = self
            .get_function(name)
            .ok_or_else(|| RuntimeError::UnknownFunction(name.to_string()))?;
        func(self, args)
    }

    pub fn run_method(&self, obj: &Value, name: &str, args: &[Value]) -> RuntimeResult<Value> {
        let func = self
            .get_method(obj, name, None, 0)?
            .ok_or_else(|| unknown_method(obj, name))?;
        self.invoke_method(func, obj, args)
    }

    pub fn run_super_method(
        &self,
        obj: &Value,
        apparent_class: &str,
        name: &str,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        let func = self
            .get_super_method(obj, apparent_class, name, None, 0)?
            .ok_or_else(|| RuntimeError::UnknownMethod {
                class: apparent_class.to_string(),
                method: name.to_string(),
            })?;
        self.invoke_method(func, obj, args)
    }

    fn invoke_method(&self, func: &Function, obj: &Value, args: &[Value]) -> RuntimeResult<Value> {
        let mut funcargs = Vec::with_capacity(args.len() + 1);
        funcargs.push(obj.clone());
        funcargs.extend_from_slice(args);
        func(self, &funcargs)
    }

    pub fn customize_uses_groups(&self) -> bool {
        self.propmaster_layer()
            .map(Layer::has_prop_groups)
            .unwrap_or(false)
    }

    /// Properties in the property master's declare/use order. Names with no
    /// declaration anywhere at or below the property master are skipped.
    pub fn get_customize_props(&self) -> Vec<&PropMeta> {
        let Some(master) = self.propmaster_layer() else {
            return Vec::new();
        };
        master
            .declared_props()
            .iter()
            .filter_map(|name| self.find_customize_prop(name))
            .collect()
    }

    pub fn get_customize_prop_groups(&self) -> Option<Vec<CustomizePropGroup>> {
        let master = self.propmaster_layer()?;
        if !master.has_prop_groups() {
            return None;
        }
        let groups = master
            .prop_groups()
            .map(|group| CustomizePropGroup {
                name: group.name.clone(),
                displayname: group.displayname.clone(),
                members: group
                    .members
                    .iter()
                    .filter_map(|member| self.find_customize_prop(member))
                    .cloned()
                    .collect(),
            })
            .collect();
        Some(groups)
    }

    fn propmaster_layer(&self) -> Option<&Layer> {
        self.propmaster.and_then(|idx| self.layers.get(idx))
    }

    /// Walks from the property master back toward the base layer and returns
    /// the first declaration found.
    fn find_customize_prop(&self, name: &str) -> Option<&PropMeta> {
        let master = self.propmaster?;
        self.layers[..=master.min(self.layers.len().saturating_sub(1))]
            .iter()
            .rev()
            .find_map(|layer| layer.prop_meta(name))
    }
}

/// Rejects missing and null-tagged receivers. A live value that carries no
/// class resolves to no method rather than an error.
fn receiver_class<'a>(
    obj: &'a Value,
    name: &str,
    layer: Option<&str>,
    line: u32,
) -> RuntimeResult<Option<&'a str>> {
    if obj.is_null_object() {
        return Err(RuntimeError::null_receiver(name, layer, line));
    }
    Ok(obj.type_tag())
}

fn unknown_method(obj: &Value, name: &str) -> RuntimeError {
    RuntimeError::UnknownMethod {
        class: obj.type_tag().unwrap_or_default().to_string(),
        method: name.to_string(),
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("layers", &self.layers.iter().map(|l| l.to_string()).collect::<Vec<_>>())
            .field("functions", &self.func.len())
            .field("core", &self.core)
            .field("layout", &self.layout)
            .field("propmaster", &self.propmaster)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{make_function, Attributes};
    use crate::value::Object;
    use std::sync::Mutex;

    fn constant(v: i64) -> Function {
        make_function(move |_ctx, _args| Ok(Value::Int(v)))
    }

    fn typed(ty: &str, name: &str) -> Layer {
        let mut layer = Layer::new();
        layer.set_layer_info("type", ty);
        layer.set_layer_info("name", name);
        layer
    }

    fn call(ctx: &Context, name: &str) -> Value {
        let f = ctx.get_function(name).expect("function resolves");
        f(ctx, &[]).expect("function runs")
    }

    #[test]
    fn later_layers_override_functions_and_properties() {
        let mut core = typed("core", "core");
        core.register_function(&["f"], || constant(1));
        core.set_property("p", Value::Int(1));
        let mut layout = typed("layout", "layout");
        layout.register_function(&["f"], || constant(2));
        layout.set_property("p", Value::Int(10));

        let ctx = Context::new(vec![core, layout]);
        assert_eq!(call(&ctx, "f"), Value::Int(2));
        assert_eq!(ctx.property("p"), Some(&Value::Int(10)));
        assert_eq!(ctx.core(), Some(0));
        assert_eq!(ctx.layout(), Some(1));
        assert_eq!(ctx.propmaster(), Some(1));
    }

    #[test]
    fn propmaster_falls_back_to_core() {
        let ctx = Context::new(vec![typed("core", "core"), typed("theme", "theme")]);
        assert_eq!(ctx.propmaster(), Some(0));
        assert_eq!(ctx.layout(), None);
    }

    #[test]
    fn duplicate_core_layers_keep_last_index() {
        let ctx = Context::new(vec![typed("core", "a"), typed("core", "b")]);
        assert_eq!(ctx.core(), Some(1));
    }

    #[test]
    fn get_function_ignores_builtins() {
        let mut ctx = Context::new(vec![typed("core", "core")]);
        ctx.set_builtin(Builtins::standard());
        assert!(ctx.get_function("hashSize").is_none());
        assert!(ctx.builtin().get("hashSize").is_some());
    }

    #[test]
    fn method_on_null_object_reports_context() {
        let ctx = Context::new(vec![typed("core", "core")]);
        let obj = Value::Object(Object::null("Dog"));
        let Err(err) = ctx.get_method(&obj, "speak", Some("layerX"), 42) else {
            panic!("null receiver must fail");
        };
        let msg = err.to_string();
        assert!(msg.contains("speak"), "{msg}");
        assert!(msg.contains("layerX"), "{msg}");
        assert!(msg.contains("42"), "{msg}");
    }

    #[test]
    fn method_on_undef_is_null_receiver() {
        let ctx = Context::new(Vec::new());
        let err = ctx.run_method(&Value::Undef, "speak", &[]).unwrap_err();
        assert!(err.is_null_receiver());
    }

    #[test]
    fn method_dispatch_uses_dynamic_type_without_fallback() {
        let mut core = typed("core", "core");
        core.register_class("Animal", None);
        core.register_class("Dog", Some("Animal"));
        core.register_function(&["Animal::speak"], || constant(1));
        let ctx = Context::new(vec![core]);
        let dog = Value::Object(Object::new("Dog"));
        assert!(ctx.get_method(&dog, "speak", None, 0).expect("not null").is_none());
        let err = ctx.run_method(&dog, "speak", &[]).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::UnknownMethod {
                class: "Dog".into(),
                method: "speak".into()
            }
        );
    }

    #[test]
    fn run_method_passes_receiver_first() {
        let mut core = typed("core", "core");
        core.register_function(&["Dog::name"], || {
            make_function(|_ctx, args| match args {
                [Value::Object(obj), suffix] => Ok(Value::str(format!(
                    "{}{}",
                    obj.fields.get("name").cloned().unwrap_or_default(),
                    suffix
                ))),
                _ => Err(RuntimeError::new("bad args")),
            })
        });
        let ctx = Context::new(vec![core]);
        let dog = Value::Object(Object::new("Dog").with_field("name", Value::str("rex")));
        let out = ctx.run_method(&dog, "name", &[Value::str("!")]).expect("runs");
        assert_eq!(out, Value::str("rex!"));
    }

    #[test]
    fn super_dispatch_uses_apparent_class() {
        let mut core = typed("core", "core");
        core.register_function(&["Animal::speak"], || constant(1));
        core.register_function(&["Dog::speak"], || constant(2));
        let ctx = Context::new(vec![core]);
        let dog = Value::Object(Object::new("Dog"));
        assert_eq!(ctx.run_method(&dog, "speak", &[]).expect("runs"), Value::Int(2));
        assert_eq!(
            ctx.run_super_method(&dog, "Animal", "speak", &[]).expect("runs"),
            Value::Int(1)
        );
        let null_dog = Value::Object(Object::null("Dog"));
        assert!(ctx
            .run_super_method(&null_dog, "Animal", "speak", &[])
            .unwrap_err()
            .is_null_receiver());
    }

    #[test]
    fn classless_receiver_resolves_nothing() {
        let ctx = Context::new(vec![typed("core", "core")]);
        assert!(ctx
            .get_method(&Value::Int(3), "speak", None, 0)
            .expect("not null")
            .is_none());
    }

    #[test]
    fn run_function_reports_unknown_names() {
        let ctx = Context::new(Vec::new());
        let err = ctx.run_function("missing", &[]).unwrap_err();
        assert_eq!(err, RuntimeError::UnknownFunction("missing".into()));
    }

    #[test]
    fn print_hook_receives_output() {
        let mut core = typed("core", "core");
        core.register_function(&["main"], || {
            make_function(|ctx, args| {
                for arg in args {
                    ctx.print(&arg.to_string());
                }
                Ok(Value::Undef)
            })
        });
        let mut ctx = Context::new(vec![core]);
        let sink = Arc::new(Mutex::new(String::new()));
        let writer = Arc::clone(&sink);
        ctx.set_print(move |s| writer.lock().expect("sink lock").push_str(s));
        ctx.run_function("main", &[Value::str("a"), Value::Int(1)])
            .expect("runs");
        assert_eq!(*sink.lock().expect("sink lock"), "a1");
    }

    #[test]
    fn customize_props_follow_master_order_and_skip_undeclared() {
        let mut core = typed("core", "core");
        core.register_property("title", "string", Attributes::new());
        core.register_property("color_bg", "Color", Attributes::new());
        let mut layout = typed("layout", "layout");
        layout.use_property("color_bg");
        layout.register_property("sidebar", "bool", Attributes::new());
        layout.use_property("ghost");
        layout.use_property("title");
        layout.use_property("color_bg");
        let mut theme = typed("theme", "theme");
        theme.register_property("title", "int", Attributes::new());

        let ctx = Context::new(vec![core, layout, theme]);
        let names: Vec<&str> = ctx
            .get_customize_props()
            .into_iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, ["color_bg", "sidebar", "title", "color_bg"]);
        let title = ctx.get_customize_props()[2];
        assert_eq!(title.ty, "string", "theme metadata is above the master");
    }

    #[test]
    fn customize_groups_resolve_members() {
        let mut core = typed("core", "core");
        core.register_property("font", "string", Attributes::new());
        core.register_property("color_bg", "Color", Attributes::new());
        let mut layout = typed("layout", "layout");
        layout.name_prop_group("colors", "Colours");
        layout.register_prop_group("colors", &["color_bg", "missing"]);
        layout.register_prop_group("text", &["font"]);

        let ctx = Context::new(vec![core, layout]);
        assert!(ctx.customize_uses_groups());
        let groups = ctx.get_customize_prop_groups().expect("grouped");
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].displayname, "Colours");
        assert_eq!(groups[0].members.len(), 1);
        assert_eq!(groups[0].members[0].name, "color_bg");
        assert_eq!(groups[1].name, "text");
        assert_eq!(groups[1].displayname, "text");
    }

    #[test]
    fn ungrouped_master_returns_none() {
        let mut core = typed("core", "core");
        core.register_prop_group("colors", &["color_bg"]);
        let layout = typed("layout", "layout");
        let ctx = Context::new(vec![core, layout]);
        assert!(!ctx.customize_uses_groups());
        assert!(ctx.get_customize_prop_groups().is_none());
    }

    #[test]
    fn missing_propmaster_yields_empty_customize_views() {
        let mut theme = typed("theme", "theme");
        theme.register_property("title", "string", Attributes::new());
        theme.register_prop_group("g", &["title"]);
        let ctx = Context::new(vec![theme]);
        assert_eq!(ctx.propmaster(), None);
        assert!(!ctx.customize_uses_groups());
        assert!(ctx.get_customize_props().is_empty());
        assert!(ctx.get_customize_prop_groups().is_none());
    }

    #[test]
    fn concurrent_readers_share_one_context() {
        let mut core = typed("core", "core");
        core.register_function(&["f"], || constant(5));
        let ctx = Context::new(vec![core]);
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| ctx.run_function("f", &[])))
                .collect();
            for handle in handles {
                let out = handle.join().expect("reader thread");
                assert_eq!(out, Ok(Value::Int(5)));
            }
        });
    }

    #[test]
    fn hidden_in_any_layer() {
        let core = typed("core", "core");
        let mut user = typed("user", "user");
        user.hide_property("sidebar");
        let ctx = Context::new(vec![core, user]);
        assert!(ctx.is_property_hidden("sidebar"));
        assert!(!ctx.is_property_hidden("title"));
    }
}
