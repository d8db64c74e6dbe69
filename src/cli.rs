//! Command-line entry point
//!
//! Simulates page loads against a persisted storage file and exposes the
//! individual services for scripting.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use crate::app::{AppState, ModuleHandle, ModuleStatus, PerformanceMetrics};
use crate::config::Config;
use crate::data_manager::StatsStore;
use crate::document::homepage_template;
use crate::errors::HomepageError;
use crate::events::EventBus;
use crate::i18n::{I18n, Language, TranslationSource};
use crate::observability::telemetry::{init_tracing, init_tracing_verbose, install_panic_hook};
use crate::page::PageContext;
use crate::stats::{CurrentStats, UptimeSnapshot};
use crate::storage::{JsonFileStorage, Storage};
use crate::theme::{Theme, ThemeDeps, ThemeManager};

#[derive(Parser)]
#[command(name = "homepage")]
#[command(about = "Headless personal homepage runtime")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Storage file path (overrides the config)
    #[arg(short, long, value_name = "FILE", global = true)]
    storage: Option<PathBuf>,

    /// Verbose logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

/// Output format for `boot`
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default)
    #[default]
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ThemeChoice {
    Light,
    Dark,
    Toggle,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a page load and print the module status table
    Boot {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Look up a translation key
    Translate {
        key: String,
        /// Language code (zh-CN, en). Defaults to the stored preference.
        #[arg(short, long)]
        lang: Option<String>,
    },

    /// Print the site uptime
    Uptime {
        #[arg(short, long)]
        lang: Option<String>,
    },

    /// Set or toggle the persisted theme
    Theme {
        #[arg(value_enum)]
        choice: ThemeChoice,
    },

    /// Export cached statistics to a JSON file
    Export { file: PathBuf },

    /// Replace cached statistics with an exported JSON file
    Import { file: PathBuf },
}

#[derive(Serialize)]
struct BootReport {
    state: AppState,
    modules: Vec<ModuleHandle>,
    theme: Option<Theme>,
    language: Option<Language>,
    stats: Option<CurrentStats>,
    metrics: PerformanceMetrics,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        init_tracing_verbose(false);
    } else {
        init_tracing();
    }
    install_panic_hook();

    if cli.no_color || std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(storage) = cli.storage {
        config.storage_path = storage;
    }

    match cli.command {
        Commands::Boot { format } => boot(config, format).await,
        Commands::Translate { key, lang } => translate(&config, &key, lang.as_deref()).await,
        Commands::Uptime { lang } => uptime(&config, lang.as_deref()),
        Commands::Theme { choice } => theme(&config, choice),
        Commands::Export { file } => export(&config, &file).await,
        Commands::Import { file } => import(&config, &file).await,
    }
}

fn open_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    let storage = JsonFileStorage::open(&config.storage_path).map_err(HomepageError::from)?;
    Ok(Arc::new(storage))
}

fn parse_language(code: &str) -> Result<Language> {
    match Language::from_code(code) {
        Some(lang) => Ok(lang),
        None => bail!("Unsupported language '{}'", code),
    }
}

/// `--lang`, else the stored preference, else the fallback.
fn resolve_language(config: &Config, lang: Option<&str>) -> Result<Language> {
    if let Some(code) = lang {
        return parse_language(code);
    }
    let storage = open_storage(config)?;
    Ok(storage
        .get(crate::storage::keys::PREFERRED_LANGUAGE)
        .and_then(|code| Language::from_code(&code))
        .unwrap_or(Language::FALLBACK))
}

async fn boot(config: Config, format: OutputFormat) -> Result<()> {
    let page = PageContext::builder(config).build()?;
    let state = page.boot().await;

    let report = BootReport {
        state,
        modules: page.app().all_module_status(),
        theme: page.theme().map(|t| t.current_theme()),
        language: page.i18n().map(|i| i.current_language()),
        stats: page.stats().map(|s| s.current_stats()),
        metrics: page.app().performance_metrics(),
    };
    page.shutdown();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }

    if state == AppState::Failed {
        return Err(HomepageError::Init(crate::errors::InitError::DomUnavailable).into());
    }
    Ok(())
}

fn print_report(report: &BootReport) {
    let state = match report.state {
        AppState::Ready => report.state.as_str().green().bold(),
        AppState::Failed => report.state.as_str().red().bold(),
        _ => report.state.as_str().yellow().bold(),
    };
    println!("Page state: {}", state);
    println!();
    for module in &report.modules {
        let status = match module.status {
            ModuleStatus::Loaded => "loaded".green(),
            ModuleStatus::Error => "error".red(),
            ModuleStatus::Pending => "pending".yellow(),
        };
        print!("  {:<14} {}", module.name, status);
        if let Some(error) = &module.error {
            print!("  {}", error.dimmed());
        }
        println!();
    }
    println!();
    if let Some(theme) = report.theme {
        println!("Theme:     {}", theme);
    }
    if let Some(language) = report.language {
        println!("Language:  {}", language);
    }
    if let Some(stats) = &report.stats {
        let lang = report.language.unwrap_or(Language::FALLBACK);
        println!("Uptime:    {}", stats.uptime.format(lang));
        println!("Visitors:  {}", stats.visitors);
    }
    println!(
        "{}",
        format!("Bring-up took {} ms", report.metrics.total_ms).dimmed()
    );
}

async fn translate(config: &Config, key: &str, lang: Option<&str>) -> Result<()> {
    let lang = resolve_language(config, lang)?;
    let source = config
        .translations_dir
        .clone()
        .map(TranslationSource::Directory)
        .unwrap_or_default();
    let tables: BTreeMap<Language, serde_json::Value> = source
        .load_all()
        .await
        .into_iter()
        .map(|(lang, table)| (lang, Arc::unwrap_or_clone(table)))
        .collect();
    let i18n = I18n::detached(tables, lang);
    println!("{}", i18n.translate(key));
    Ok(())
}

fn uptime(config: &Config, lang: Option<&str>) -> Result<()> {
    let lang = resolve_language(config, lang)?;
    let snapshot = UptimeSnapshot::between(config.stats.epoch, Utc::now());
    println!("{}", snapshot.format(lang));
    Ok(())
}

fn theme(config: &Config, choice: ThemeChoice) -> Result<()> {
    let manager = ThemeManager::initialize(ThemeDeps {
        document: Arc::new(homepage_template()),
        storage: open_storage(config)?,
        bus: EventBus::new(),
        visitor_count: Arc::new(AtomicU64::new(0)),
        system_dark: config.environment.system_dark,
    })
    .map_err(HomepageError::from)?;

    let result = match choice {
        ThemeChoice::Light => manager.apply_theme(Theme::Light.as_str()),
        ThemeChoice::Dark => manager.apply_theme(Theme::Dark.as_str()),
        ThemeChoice::Toggle => manager.toggle_theme(),
    };
    result.map_err(HomepageError::from)?;
    println!("Theme: {}", manager.current_theme().to_string().bold());
    Ok(())
}

async fn export(config: &Config, file: &std::path::Path) -> Result<()> {
    let store = StatsStore::load(open_storage(config)?, Utc::now());
    let json = store.export_json().map_err(HomepageError::from)?;
    tokio::fs::write(file, json)
        .await
        .with_context(|| format!("Failed to write {}", file.display()))?;
    println!("{} {}", "Exported".green(), file.display());
    Ok(())
}

async fn import(config: &Config, file: &std::path::Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let store = StatsStore::load(open_storage(config)?, Utc::now());
    store.import_json(&raw).map_err(HomepageError::from)?;
    println!("{} {}", "Imported".green(), file.display());
    Ok(())
}
