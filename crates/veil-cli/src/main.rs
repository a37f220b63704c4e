//! Veil CLI
//!
//! Developer tool for the Veil element blocker: test URL patterns, edit a
//! JSON-file rule store, and try selectors and rules against static HTML.

mod html;
mod store;

use std::fs;
use std::future::Future;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use veil_core::{pattern, Dom, EngineConfig, HidingEngine, PatternType, SelectorGenerator, ToolMarkers};
use veil_rules::{BlockElementDraft, PresetDraft, RuleStore};

use crate::store::JsonFileStore;

#[derive(Parser)]
#[command(name = "veil")]
#[command(about = "Veil element blocker rule tools")]
struct Cli {
    /// Rule store file
    #[arg(short, long, global = true, default_value = "veil-store.json")]
    store: String,

    /// Engine configuration (JSON)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a URL matches a pattern
    Match {
        url: String,
        pattern: String,

        /// site_wide, path_pattern or exact_page
        #[arg(short = 't', long = "type", default_value = "site_wide")]
        pattern_type: String,
    },

    /// List the block elements active on a URL
    Resolve { url: String },

    /// Manage block elements
    Elements {
        #[command(subcommand)]
        command: ElementCommands,
    },

    /// Manage presets
    Presets {
        #[command(subcommand)]
        command: PresetCommands,
    },

    /// Generate a unique selector for an element of an HTML file
    Select {
        /// HTML file
        #[arg(short, long)]
        input: String,

        /// CSS selector locating the element (first match)
        target: String,
    },

    /// Show which elements of an HTML file the active rules would hide
    Preview {
        /// HTML file
        #[arg(short, long)]
        input: String,

        /// URL the page is served from
        url: String,
    },
}

#[derive(Subcommand)]
enum ElementCommands {
    List,

    Add {
        name: String,

        /// Selector; repeat for a fallback chain
        #[arg(short = 's', long = "selector", required = true)]
        selectors: Vec<String>,

        #[arg(short, long)]
        pattern: String,

        #[arg(short = 't', long = "type", default_value = "site_wide")]
        pattern_type: String,
    },

    /// Delete a block element and update the presets that use it
    Delete { id: String },
}

#[derive(Subcommand)]
enum PresetCommands {
    List,

    Add {
        name: String,

        /// Block element id; repeat to add several
        #[arg(short = 'e', long = "element", required = true)]
        elements: Vec<String>,

        /// Enable the preset right away
        #[arg(long)]
        enabled: bool,
    },

    /// Flip a preset, or set it with --on / --off
    Toggle {
        id: String,

        #[arg(long, conflicts_with = "off")]
        on: bool,

        #[arg(long)]
        off: bool,
    },

    Delete { id: String },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref()).and_then(|config| run(&cli.store, &config, cli.command));

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(store: &str, config: &EngineConfig, command: Commands) -> Result<(), String> {
    match command {
        Commands::Match {
            url,
            pattern,
            pattern_type,
        } => cmd_match(&url, &pattern, &pattern_type),
        Commands::Resolve { url } => block_on(cmd_resolve(&open_rules(store)?, &url)),
        Commands::Elements { command } => block_on(cmd_elements(&open_rules(store)?, command)),
        Commands::Presets { command } => block_on(cmd_presets(&open_rules(store)?, command)),
        Commands::Select { input, target } => cmd_select(config, &input, &target),
        Commands::Preview { input, url } => block_on(cmd_preview(&open_rules(store)?, config, &input, &url)),
    }
}

fn load_config(path: Option<&str>) -> Result<EngineConfig, String> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    EngineConfig::from_json(&text).map_err(|e| format!("Invalid config '{}': {}", path, e))
}

fn open_rules(path: &str) -> Result<RuleStore<JsonFileStore>, String> {
    Ok(RuleStore::new(Arc::new(JsonFileStore::open(path)?)))
}

fn block_on<F: Future<Output = Result<(), String>>>(future: F) -> Result<(), String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|e| format!("Failed to start tokio runtime: {}", e))?;
    runtime.block_on(future)
}

fn parse_pattern_type(name: &str) -> Result<PatternType, String> {
    PatternType::parse(name).ok_or_else(|| format!("Unknown pattern type '{}'", name))
}

// =============================================================================
// Commands
// =============================================================================

fn cmd_match(url: &str, url_pattern: &str, pattern_type: &str) -> Result<(), String> {
    let ty = parse_pattern_type(pattern_type)?;
    let matched = pattern::matches(url, url_pattern, ty).map_err(|e| e.to_string())?;
    println!("{}", if matched { "match" } else { "no match" });
    Ok(())
}

async fn cmd_resolve(rules: &RuleStore<JsonFileStore>, url: &str) -> Result<(), String> {
    let active = rules.active_block_elements(url).await;
    if active.is_empty() {
        println!("No active block elements for {}", url);
        return Ok(());
    }
    println!("{} active block elements for {}", active.len(), url);
    for element in active {
        println!("  {}  {}  {}", element.id, element.name, element.selectors.join(" | "));
    }
    Ok(())
}

async fn cmd_elements(rules: &RuleStore<JsonFileStore>, command: ElementCommands) -> Result<(), String> {
    match command {
        ElementCommands::List => {
            let elements = rules.block_elements().await;
            println!("{} block elements", elements.len());
            for element in elements {
                println!(
                    "  {}  {}  [{} {}]",
                    element.id,
                    element.name,
                    element.url_pattern_type.as_str(),
                    element.url_pattern
                );
                for selector in &element.selectors {
                    println!("      {}", selector);
                }
            }
        }
        ElementCommands::Add {
            name,
            selectors,
            pattern,
            pattern_type,
        } => {
            let draft = BlockElementDraft {
                id: None,
                name,
                selectors,
                url_pattern: pattern,
                url_pattern_type: pattern_type,
            };
            let saved = rules.save_block_element(draft).await.map_err(|e| e.to_string())?;
            println!("Saved block element {}", saved.id);
        }
        ElementCommands::Delete { id } => {
            let report = rules.delete_block_element(&id).await.map_err(|e| e.to_string())?;
            println!("Deleted block element {}", id);
            if !report.updated.is_empty() {
                println!("  Presets updated: {}", report.updated.join(", "));
            }
            if !report.deleted.is_empty() {
                println!("  Presets removed: {}", report.deleted.join(", "));
            }
        }
    }
    Ok(())
}

async fn cmd_presets(rules: &RuleStore<JsonFileStore>, command: PresetCommands) -> Result<(), String> {
    match command {
        PresetCommands::List => {
            let presets = rules.presets().await;
            println!("{} presets", presets.len());
            for preset in presets {
                println!(
                    "  {}  {}  {}  ({} elements)",
                    preset.id,
                    if preset.enabled { "on " } else { "off" },
                    preset.name,
                    preset.block_element_ids.len()
                );
            }
        }
        PresetCommands::Add { name, elements, enabled } => {
            let mut draft = PresetDraft::new(name, elements);
            draft.enabled = Some(enabled);
            let saved = rules.save_preset(draft).await.map_err(|e| e.to_string())?;
            println!("Saved preset {}", saved.id);
        }
        PresetCommands::Toggle { id, on, off } => {
            let target = match (on, off) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            let preset = rules.toggle_preset(&id, target).await.map_err(|e| e.to_string())?;
            println!("Preset {} is now {}", preset.id, if preset.enabled { "on" } else { "off" });
        }
        PresetCommands::Delete { id } => {
            rules.delete_preset(&id).await.map_err(|e| e.to_string())?;
            println!("Deleted preset {}", id);
        }
    }
    Ok(())
}

fn cmd_select(config: &EngineConfig, input: &str, target: &str) -> Result<(), String> {
    let text = fs::read_to_string(input).map_err(|e| format!("Failed to read '{}': {}", input, e))?;
    let dom = html::load_document(&text);

    let node = dom
        .query_selector_all(target)
        .map_err(|e| e.to_string())?
        .into_iter()
        .next()
        .ok_or_else(|| format!("No element matches '{}'", target))?;

    let selector = SelectorGenerator::from_config(config)
        .generate(&dom, &node)
        .map_err(|e| e.to_string())?;
    let markers = ToolMarkers::from_config(config);

    println!("{}", selector);
    println!("  Element:  {}", markers.describe(&dom, &node));
    Ok(())
}

async fn cmd_preview(
    rules: &RuleStore<JsonFileStore>,
    config: &EngineConfig,
    input: &str,
    url: &str,
) -> Result<(), String> {
    let text = fs::read_to_string(input).map_err(|e| format!("Failed to read '{}': {}", input, e))?;
    let mut dom = html::load_document(&text);

    let active = rules.active_block_elements(url).await;
    let engine = HidingEngine::from_config(config);
    let report = engine.apply(&mut dom, &active);
    let markers = ToolMarkers::from_config(config);

    println!("Active rules:  {}", report.rules);
    println!("Unmatched:     {}", report.unmatched);
    println!("Hidden:        {}", report.hidden);
    for node in engine.hidden_elements(&dom) {
        println!("  {}", markers.describe(&dom, &node));
    }
    Ok(())
}
