//! Declarative layer descriptions.
//!
//! A manifest carries the same declarations a compiled program would feed to
//! a [`Layer`], in a form that can live in a `.toml` or `.json` file. Function
//! bodies are limited to a few fixed shapes; anything richer has to be
//! registered from Rust.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use serde::{Deserialize, Serialize};

use crate::layer::{make_function, Attributes, Function, Layer};
use crate::value::Value;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LayerManifest {
    #[serde(default)]
    pub info: BTreeMap<String, String>,
    #[serde(default)]
    pub classes: Vec<ClassDecl>,
    #[serde(default)]
    pub properties: Vec<PropertyDecl>,
    #[serde(default)]
    pub propgroups: Vec<PropGroupDecl>,
    #[serde(default)]
    pub set: BTreeMap<String, Value>,
    #[serde(default)]
    pub functions: Vec<FunctionDecl>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassDecl {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropertyDecl {
    Declare {
        name: String,
        #[serde(rename = "type")]
        ty: String,
        #[serde(default)]
        attrs: Attributes,
    },
    Use {
        name: String,
    },
    Hide {
        name: String,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PropGroupDecl {
    pub name: String,
    #[serde(default)]
    pub displayname: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FunctionDecl {
    pub names: Vec<String>,
    pub body: FunctionBody,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionBody {
    /// Constant result.
    Returns(Value),
    /// Writes the text through the context's print sink.
    Prints(String),
    /// Resolved property value at call time.
    Property(String),
}

impl FunctionBody {
    fn build(&self) -> Function {
        match self.clone() {
            FunctionBody::Returns(value) => make_function(move |_ctx, _args| Ok(value.clone())),
            FunctionBody::Prints(text) => make_function(move |ctx, _args| {
                ctx.print(&text);
                Ok(Value::Undef)
            }),
            FunctionBody::Property(name) => make_function(move |ctx, _args| {
                Ok(ctx.property(&name).cloned().unwrap_or_default())
            }),
        }
    }
}

impl LayerManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let parse: fn(&str) -> Result<Self> = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml,
            Some("json") => Self::from_json,
            _ => bail!(
                "unsupported layer manifest {} (expected .toml or .json)",
                path.display()
            ),
        };
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read layer manifest {}", path.display()))?;
        let mut manifest = parse(&raw)
            .with_context(|| format!("failed to parse layer manifest {}", path.display()))?;
        manifest.path = Some(path.to_path_buf());
        Ok(manifest)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Replays the manifest onto `layer` in declaration order.
    pub fn apply(&self, layer: &mut Layer) {
        for (key, value) in &self.info {
            layer.set_layer_info(key.as_str(), value.as_str());
        }
        for class in &self.classes {
            layer.register_class(&class.name, class.parent.as_deref());
        }
        for decl in &self.properties {
            match decl {
                PropertyDecl::Declare { name, ty, attrs } => {
                    layer.register_property(name, ty, attrs.clone())
                }
                PropertyDecl::Use { name } => layer.use_property(name),
                PropertyDecl::Hide { name } => layer.hide_property(name),
            }
        }
        for group in &self.propgroups {
            if let Some(displayname) = &group.displayname {
                layer.name_prop_group(&group.name, displayname);
            }
            layer.register_prop_group(&group.name, group.members.as_slice());
        }
        for (name, value) in &self.set {
            layer.set_property(name, value.clone());
        }
        for func in &self.functions {
            layer.register_function(func.names.as_slice(), || func.body.build());
        }
    }

    pub fn to_layer(&self) -> Layer {
        let mut layer = Layer::new();
        self.apply(&mut layer);
        layer
    }
}
