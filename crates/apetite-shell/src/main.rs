//! `apetite` - CLI for the Meu Apetite offline and push runtime
//!
//! This binary drives the service-worker runtime: running it in the
//! foreground, inspecting cache and subscription state, and sending test
//! pushes through the notification pipeline.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use clap::Parser;

use apetite_shell::audio::NullAudioSink;
use apetite_shell::cli::{CacheCommand, Cli, Command, ConfigCommand, NotifyCommand};
use apetite_shell::registration::{AlwaysGranted, HostCapabilities, PushRegistrationController};
use apetite_worker::push::{LoggingPresenter, PushHandler};
use apetite_worker::{init_logging, ClientRegistry, Config, Storage, Worker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::Run => handle_run(&config).await,
        Command::Status(status_cmd) => handle_status(&config, status_cmd.json),
        Command::Notify(notify_cmd) => handle_notify(&notify_cmd).await,
        Command::Cache(cache_cmd) => handle_cache(&config, cache_cmd),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

async fn handle_run(config: &Config) -> anyhow::Result<()> {
    let storage = Storage::open(config.database_path())?;
    let worker = Worker::from_config(config, storage)?;

    let page_url = format!("{}/", config.cache.origin.trim_end_matches('/'));
    let mut controller = PushRegistrationController::new(
        HostCapabilities::full(),
        Arc::new(AlwaysGranted),
        Arc::new(NullAudioSink),
        page_url,
    );
    let status = controller.register(config, worker).await;

    println!("apetite worker running");
    println!("----------------------");
    println!("Cache version: {}", config.cache.version);
    println!("Ready:         {}", status.ready);
    println!("Permission:    {}", status.permission);
    match &status.endpoint {
        Some(endpoint) => println!("Subscription:  {endpoint}"),
        None => println!("Subscription:  none"),
    }
    println!();
    println!("Press Ctrl-C to stop.");

    tokio::signal::ctrl_c().await?;
    println!("Shutting down...");
    controller.shutdown();
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let storage = Storage::open(config.database_path())?;
    let stats = storage.stats()?;
    let caches = storage.cache_names()?;
    let subscription = storage.get_subscription()?;

    if json {
        let status = serde_json::json!({
            "cache_version": config.cache.version,
            "caches": caches,
            "resources": stats.entry_count,
            "subscription_endpoint": subscription.as_ref().map(|s| s.endpoint.clone()),
            "database_path": config.database_path(),
            "database_size_bytes": stats.db_size_bytes,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("apetite status");
        println!("--------------");
        println!("Cache version: {}", config.cache.version);
        println!("Caches:        {}", stats.cache_count);
        for name in &caches {
            let marker = if *name == config.cache.version {
                " (current)"
            } else {
                ""
            };
            println!("  {name}{marker}");
        }
        println!("Resources:     {}", stats.entry_count);
        match &subscription {
            Some(s) => println!("Subscription:  {}", s.endpoint),
            None => println!("Subscription:  none"),
        }
        println!("Database:      {}", config.database_path().display());
    }
    Ok(())
}

async fn handle_notify(cmd: &NotifyCommand) -> anyhow::Result<()> {
    let payload = notify_payload(cmd)?;

    // The full push pipeline against the log presenter; no page is
    // connected, so the audio message goes nowhere
    let handler = PushHandler::new(Arc::new(LoggingPresenter), ClientRegistry::new());
    let outcome = handler.handle(payload.as_deref()).await?;

    println!("Notification shown");
    println!("------------------");
    println!("Title:     {}", outcome.descriptor.title);
    println!("Body:      {}", outcome.descriptor.body);
    println!("Sound:     {}", outcome.descriptor.sound);
    println!("Delivered: {} client(s)", outcome.delivered);
    Ok(())
}

fn notify_payload(cmd: &NotifyCommand) -> anyhow::Result<Option<Vec<u8>>> {
    if let Some(payload) = &cmd.payload {
        return Ok(Some(payload.clone().into_bytes()));
    }
    if cmd.title.is_none() && cmd.body.is_none() {
        return Ok(None);
    }

    let mut fields = serde_json::Map::new();
    if let Some(title) = &cmd.title {
        fields.insert(
            "title".to_string(),
            serde_json::Value::String(title.clone()),
        );
    }
    if let Some(body) = &cmd.body {
        fields.insert("body".to_string(), serde_json::Value::String(body.clone()));
    }
    Ok(Some(serde_json::to_vec(&serde_json::Value::Object(
        fields,
    ))?))
}

fn handle_cache(config: &Config, cmd: CacheCommand) -> anyhow::Result<()> {
    let storage = Storage::open(config.database_path())?;

    match cmd {
        CacheCommand::List => {
            let names = storage.cache_names()?;
            if names.is_empty() {
                println!("No caches.");
                return Ok(());
            }
            println!("Caches");
            println!("------");
            for name in names {
                let count = storage.resource_count(&name)?;
                let marker = if name == config.cache.version {
                    " (current)"
                } else {
                    ""
                };
                println!("  {name}: {count} resource(s){marker}");
            }
        }
        CacheCommand::Clear { stale, yes } => {
            if !yes {
                if stale {
                    println!("This will delete every cache except the current version.");
                } else {
                    println!("This will delete all cached resources.");
                }
                println!("Use --yes to confirm.");
                return Ok(());
            }

            let evicted = if stale {
                storage.delete_caches_except(&config.cache.version)?
            } else {
                let names = storage.cache_names()?;
                for name in &names {
                    storage.delete_cache(name)?;
                }
                names
            };

            if evicted.is_empty() {
                println!("Nothing to delete.");
            } else {
                for name in evicted {
                    println!("Deleted {name}");
                }
            }
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:   {}", config.database_path().display());
                println!();
                println!("[Cache]");
                println!("  Version:         {}", config.cache.version);
                println!("  Origin:          {}", config.cache.origin);
                println!("  Precache assets: {}", config.cache.precache.len());
                println!();
                println!("[Push]");
                println!("  Endpoint base:   {}", config.push.endpoint_base);
                println!("  Fallback URL:    {}", config.push.fallback_url);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
