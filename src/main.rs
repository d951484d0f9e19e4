use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use fxproject::cli::Args;
use fxproject::config::{CONFIG_FILE_NAME, EngineConfig};
use fxproject::core::{CommandService, EffectOperationsService, EventBus, EventKind, EventPayload, ProjectStateStore};
use fxproject::entities::{Attrs, CatalogEntry, Project};
use fxproject::paths::{self, PathConfig};

fn init_logging(args: &Args, path_config: &PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| paths::data_file(paths::LOG_FILE_NAME, path_config));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging (respects RUST_LOG if set)
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level.as_str()))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

/// Catalog of the effect kinds already used by `project`.
fn catalog_from(project: &Project) -> Vec<CatalogEntry> {
    let mut entries: Vec<CatalogEntry> = Vec::new();
    for effect in project.effects.iter().flat_map(|e| std::iter::once(e).chain(e.children())) {
        if !entries.iter().any(|c| c.name == effect.name) {
            entries.push(CatalogEntry::new(&effect.name, &effect.class_name, &effect.registry_key, effect.effect_type));
        }
    }
    entries
}

fn print_summary(store: &ProjectStateStore) {
    let project = store.project();
    println!("{} by {}", project.name, if project.artist.is_empty() { "-" } else { &project.artist });
    println!(
        "  {} {} ({}), {} frames",
        project.target_resolution,
        if project.is_horizontal { "horizontal" } else { "vertical" },
        store.get_resolution_dimensions(),
        project.number_of_frames
    );
    for (i, effect) in project.effects.iter().enumerate() {
        println!(
            "  [{i}] {} ({}){}: {} secondary, {} keyframe",
            effect.label(),
            effect.effect_type.as_str(),
            if effect.visible { "" } else { " hidden" },
            effect.secondary_effects.len(),
            effect.keyframe_effects.len()
        );
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = paths::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }
    init_logging(&args, &path_config)?;
    debug!("Command-line args: {:?}", args);

    let config_path = paths::config_file(CONFIG_FILE_NAME, &path_config);
    info!("Config path: {}", config_path.display());
    let config = EngineConfig::load(&config_path)?;

    let project = Project::from_json_file(&args.project)?;
    let catalog = catalog_from(&project);
    let mut store = ProjectStateStore::with_config(project, config.center)
        .with_context(|| format!("Invalid project {}", args.project.display()))?;

    if args.check {
        print_summary(&store);
        return Ok(());
    }

    let bus = EventBus::with_history_limit(config.event_history_limit);
    bus.subscribe(EventKind::ProjectUpdated, |event| {
        if let EventPayload::ProjectUpdated { dimensions, rescaled } = &event.payload {
            info!("Canvas is now {} (rescaled: {})", dimensions, rescaled);
        }
        Ok(())
    });
    let mut ops = EffectOperationsService::builder()
        .command_service(CommandService::from_config(bus.clone(), &config))
        .event_bus(bus)
        .catalog(catalog)
        .defaults(|_: &str| -> anyhow::Result<Attrs> { Ok(Attrs::new()) })
        .build()?;

    let update = args.project_update();
    let rescaled = ops.update_project(&mut store, &update)?;

    let output = args.output.clone().unwrap_or_else(|| args.project.clone());
    let written = store.get_state().to_json_file(&output)?;
    println!(
        "{} -> {} ({}{})",
        args.project.display(),
        written.display(),
        store.get_resolution_dimensions(),
        if rescaled { ", rescaled" } else { "" }
    );
    Ok(())
}
