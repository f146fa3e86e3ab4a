//! CLI command definitions and dispatch.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::{Value, json};

use tandem_core::config::EngineSettings;
use tandem_core::error::AppError;
use tandem_core::types::{ModulePath, to_document};
use tandem_engine::{ActionConfig, GlobalConfig, Module, Orchestrator, StoreRegistry};
use tandem_hooks::{HookDeclarations, HookPhase, hook_fn};
use tandem_memory::{MemoryStore, ScriptedEvent};

/// Tandem: drive local and remote stores through one hook pipeline
#[derive(Debug, Parser)]
#[command(name = "tandem", version, about, long_about = None)]
pub struct Cli {
    /// Configuration directory holding `default.toml` and environment overlays
    #[arg(short, long, default_value = "config")]
    pub config: String,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Insert a document into every store of the write order
    Insert {
        /// Collection path, e.g. `pokedex`
        collection: String,
        /// Document body as JSON
        payload: String,
        /// Document id; generated by the stores when omitted
        #[arg(long)]
        id: Option<String>,
    },
    /// Read a collection or document through the read order
    Get {
        /// Collection or document path
        path: String,
        /// Seed a document into `--store` first, as `ID=JSON`
        #[arg(long = "seed", value_name = "ID=JSON")]
        seeds: Vec<String>,
        /// Store that receives the seeded documents
        #[arg(long, default_value = "remote")]
        store: String,
    },
    /// Open a stream, collect what arrives, then close it
    Stream {
        /// Collection or document path
        path: String,
        /// Scripted document emitted by `--store`, as `ID=JSON`
        #[arg(long = "event", value_name = "ID=JSON")]
        events: Vec<String>,
        /// Store that emits the scripted events
        #[arg(long, default_value = "remote")]
        store: String,
        /// How long to keep the stream open, in milliseconds
        #[arg(long, default_value_t = 2000)]
        duration_ms: u64,
    },
    /// Print the effective settings as JSON
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, settings: EngineSettings) -> Result<(), AppError> {
        match &self.command {
            Commands::Insert {
                collection,
                payload,
                id,
            } => {
                let stores = build_stores(&settings, None)?;
                let orchestrator = build_orchestrator(&settings, &stores)?;
                let payload: Value = serde_json::from_str(payload)?;

                let target = match id {
                    Some(id) => orchestrator.doc(&format!("{collection}/{id}"))?,
                    None => orchestrator.collection(collection)?,
                };
                let inserted = target.insert(payload, ActionConfig::new()).await?;
                print_json(&json!({
                    "path": inserted.path().as_str(),
                    "stores": store_contents(&stores, inserted.path()),
                }));
                Ok(())
            }
            Commands::Get { path, seeds, store } => {
                let stores = build_stores(&settings, None)?;
                let seeded = stores
                    .get(store)
                    .ok_or_else(|| AppError::unknown_store(format!("No store named '{store}'")))?;
                let collection = ModulePath::parse(path)?.collection_path();
                for seed in seeds {
                    let (id, data) = parse_doc_arg(seed)?;
                    seeded.seed(&format!("{collection}/{id}"), data)?;
                }

                let orchestrator = build_orchestrator(&settings, &stores)?;
                let read = module_at(&orchestrator, path)?
                    .get(Value::Null, ActionConfig::new())
                    .await?;
                print_json(&json!({
                    "path": read.path().as_str(),
                    "docs": read.docs(),
                }));
                Ok(())
            }
            Commands::Stream {
                path,
                events,
                store,
                duration_ms,
            } => {
                let script = events
                    .iter()
                    .map(|event| {
                        parse_doc_arg(event)
                            .map(|(id, data)| ScriptedEvent::added(&id, data))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let stores = build_stores(&settings, Some((store.as_str(), script)))?;
                let orchestrator = build_orchestrator(&settings, &stores)?;
                let module = module_at(&orchestrator, path)?;

                let subscription = module.stream(Value::Null, ActionConfig::new()).await?;
                let key = subscription.key().clone();
                tokio::time::sleep(Duration::from_millis(*duration_ms)).await;
                orchestrator.stop_stream(&key);
                subscription.await?;

                print_json(&json!({
                    "key": key.as_str(),
                    "docs": module.docs(),
                }));
                Ok(())
            }
            Commands::Config => {
                print_json(&serde_json::to_value(&settings)?);
                Ok(())
            }
        }
    }
}

/// Build every configured store. `scripted` attaches stream events to one
/// of them.
fn build_stores(
    settings: &EngineSettings,
    scripted: Option<(&str, Vec<ScriptedEvent>)>,
) -> Result<BTreeMap<String, Arc<MemoryStore>>, AppError> {
    if let Some((name, _)) = &scripted {
        if !settings.stores.contains_key(*name) {
            return Err(AppError::unknown_store(format!("No store named '{name}'")));
        }
    }

    let mut script = scripted;
    settings
        .stores
        .iter()
        .map(|(name, store_settings)| {
            let mut store = MemoryStore::from_settings(store_settings)?;
            if let Some((_, events)) = script.take_if(|(target, _)| *target == name.as_str()) {
                store = store.with_stream_script(events);
            }
            Ok((name.clone(), Arc::new(store)))
        })
        .collect()
}

fn build_orchestrator(
    settings: &EngineSettings,
    stores: &BTreeMap<String, Arc<MemoryStore>>,
) -> Result<Orchestrator, AppError> {
    let mut registry = StoreRegistry::new();
    for (name, store) in stores {
        registry.register(name, store.clone())?;
    }
    let global = GlobalConfig::from(settings).with_hooks(tracing_hooks(stores.keys()));
    Orchestrator::new(registry, global)
}

/// Hooks that trace every store turn at debug level.
fn tracing_hooks<'a>(stores: impl Iterator<Item = &'a String>) -> HookDeclarations {
    let mut declarations = HookDeclarations::new();
    for store in stores {
        for phase in HookPhase::ALL {
            declarations.register(
                store,
                phase,
                hook_fn(|event| {
                    tracing::debug!(
                        store = event.store,
                        phase = %event.phase,
                        action = %event.action,
                        path = %event.path,
                        error = ?event.error.map(ToString::to_string),
                        "Store turn"
                    );
                }),
            );
        }
    }
    declarations
}

fn module_at(orchestrator: &Orchestrator, path: &str) -> Result<Module, AppError> {
    if ModulePath::parse(path)?.is_doc() {
        orchestrator.doc(path)
    } else {
        orchestrator.collection(path)
    }
}

fn store_contents(stores: &BTreeMap<String, Arc<MemoryStore>>, path: &ModulePath) -> Value {
    stores
        .iter()
        .map(|(name, store)| {
            let doc = store.doc(path.as_str()).map(Value::Object).unwrap_or(Value::Null);
            (name.clone(), doc)
        })
        .collect::<serde_json::Map<_, _>>()
        .into()
}

/// Split an `ID=JSON` argument.
fn parse_doc_arg(arg: &str) -> Result<(String, Value), AppError> {
    let (id, data) = arg
        .split_once('=')
        .ok_or_else(|| AppError::validation(format!("Expected ID=JSON, got '{arg}'")))?;
    let data: Value = serde_json::from_str(data)?;
    if !data.is_object() {
        return Err(AppError::validation(format!("Document '{id}' must be a JSON object")));
    }
    Ok((id.to_string(), Value::Object(to_document(&data))))
}

fn print_json(value: &Value) {
    let json = serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string());
    println!("{}", json);
}
