use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser as ClapParser, Subcommand};
use s2runtime::{Builtins, Context, LayerLoader, PropMeta, Value};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser, Debug)]
#[command(
    name = "s2ctx",
    version,
    about = "Compose S2 style layers and query the resulting context"
)]
struct Cli {
    /// Directory searched for `<name>.toml` / `<name>.json` layer manifests.
    #[arg(short = 'L', long = "layer-dir", value_name = "DIR")]
    layer_dirs: Vec<PathBuf>,
    /// Layer name or manifest path, lowest priority first.
    #[arg(short = 'l', long = "layer", value_name = "LAYER", required = true)]
    layers: Vec<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarise the layer stack.
    Info,
    /// Customize properties in property-master order, as JSON.
    Props {
        /// Include properties some layer hides.
        #[arg(long)]
        all: bool,
    },
    /// Customize propgroups as JSON (`null` when the stack is ungrouped).
    Groups,
    /// Run a function; arguments are parsed as JSON, falling back to strings.
    Run {
        function: String,
        args: Vec<String>,
    },
}

#[derive(Serialize)]
struct LayerSummary<'a> {
    index: usize,
    name: String,
    #[serde(rename = "type")]
    ty: Option<&'a str>,
    functions: usize,
}

#[derive(Serialize)]
struct StackSummary<'a> {
    layers: Vec<LayerSummary<'a>>,
    core: Option<usize>,
    layout: Option<usize>,
    propmaster: Option<usize>,
    uses_groups: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("S2_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut loader = LayerLoader::with_search_paths(cli.layer_dirs.iter().cloned());
    let mut ctx = loader
        .load_context(cli.layers.as_slice())
        .context("failed to assemble layer stack")?;
    ctx.set_builtin(Builtins::standard());
    tracing::debug!(?ctx, "context ready");

    match cli.command {
        Command::Info => print_json(&stack_summary(&ctx))?,
        Command::Props { all } => {
            let props: Vec<&PropMeta> = ctx
                .get_customize_props()
                .into_iter()
                .filter(|meta| all || !ctx.is_property_hidden(&meta.name))
                .collect();
            print_json(&props)?;
        }
        Command::Groups => print_json(&ctx.get_customize_prop_groups())?,
        Command::Run { function, args } => {
            ctx.set_print(|text| {
                let mut out = io::stdout().lock();
                let _ = out.write_all(text.as_bytes());
            });
            let args: Vec<Value> = args.iter().map(|raw| parse_arg(raw)).collect();
            let result = ctx
                .run_function(&function, &args)
                .with_context(|| format!("runtime error in `{function}`"))?;
            if !result.is_undef() {
                println!();
                print_json(&result)?;
            }
        }
    }

    Ok(())
}

fn stack_summary(ctx: &Context) -> StackSummary<'_> {
    StackSummary {
        layers: ctx
            .layers()
            .iter()
            .enumerate()
            .map(|(index, layer)| LayerSummary {
                index,
                name: layer.to_string(),
                ty: layer.layer_type(),
                functions: layer.functions().count(),
            })
            .collect(),
        core: ctx.core(),
        layout: ctx.layout(),
        propmaster: ctx.propmaster(),
        uses_groups: ctx.customize_uses_groups(),
    }
}

fn parse_arg(raw: &str) -> Value {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(Value::from)
        .unwrap_or_else(|_| Value::str(raw))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
