use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;

use pathmod_core::features::{self, FEATURES};
use pathmod_core::save_doc::{EvolutionMap, SaveDocument};
use pathmod_core::{
    install, restore, status, PatchError, PatcherConfig, Result, SaveHelper, SaveVariant,
    SystemServices,
};

#[derive(Debug, Parser)]
#[command(name = "pathmod", version, about = "PokePath TD mod installer")]
struct Cli {
    /// JSON settings file; missing file means defaults.
    #[arg(long, global = true, default_value = "pathmod.json")]
    config: PathBuf,

    /// Game install folder (the one containing `resources/`).
    #[arg(long, global = true)]
    game_root: Option<PathBuf>,

    #[arg(long, global = true)]
    fixtures: Option<PathBuf>,

    /// Folder holding node_modules/@electron/asar and save_helper.js.
    #[arg(long, global = true)]
    tools: Option<PathBuf>,

    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(short, long, global = true)]
    quiet: bool,

    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Back up, extract, patch, repack and set up the modified save.
    Install {
        /// Comma-separated feature keys; defaults to every default feature.
        #[arg(long, value_delimiter = ',')]
        features: Vec<String>,
    },
    /// Show backup, archive and per-patch state.
    Status,
    /// Put the original app.asar back.
    Restore,
    /// List available features.
    Features {
        #[arg(long)]
        json: bool,
    },
    /// Edit the save the game currently uses.
    #[command(subcommand)]
    Save(SaveCommand),
}

#[derive(Debug, Subcommand)]
enum SaveCommand {
    /// Write the active save to a JSON file.
    Export { file: PathBuf },
    /// Replace the active save with a JSON file.
    Import { file: PathBuf },
    Gold { amount: u64 },
    CompleteStages,
    InjectEggs,
    ResetEggs,
    ShinyAll,
    EvolveAll(EvolutionArgs),
    DevolveAll(EvolutionArgs),
}

#[derive(Debug, Args)]
struct EvolutionArgs {
    /// pokemon_data.json with an `evolutions` table.
    #[arg(long, default_value = "pokemon_data.json")]
    data: PathBuf,
}

fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> std::result::Result<(), fern::InitError> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());
    if let Some(path) = log_file {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }
    dispatch.apply()?;
    Ok(())
}

fn level_for(cli: &Cli) -> LevelFilter {
    if cli.quiet {
        return LevelFilter::Warn;
    }
    match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn load_config(cli: &Cli) -> Result<PatcherConfig> {
    let mut config = PatcherConfig::load(&cli.config)?;
    if let Some(root) = &cli.game_root {
        config.game_root = root.clone();
    }
    if let Some(fixtures) = &cli.fixtures {
        config.fixtures_dir = Some(fixtures.clone());
    }
    if let Some(tools) = &cli.tools {
        config.tools_dir = Some(tools.clone());
    }
    Ok(config)
}

fn list_features(json: bool) {
    if json {
        let list: Vec<_> = FEATURES
            .iter()
            .map(|f| {
                serde_json::json!({
                    "key": f.key,
                    "name": f.name,
                    "description": f.description,
                    "default": f.default,
                    "entries": f.entries,
                })
            })
            .collect();
        println!("{}", serde_json::Value::Array(list));
        return;
    }
    for f in FEATURES {
        let mark = if f.default { "*" } else { " " };
        println!("{mark} {:<16} {}", f.key, f.name);
        println!("    {}", f.description);
    }
}

fn print_status(config: &PatcherConfig) -> Result<()> {
    let layout = config.layout();
    layout.validate()?;
    let st = status(&layout)?;
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    println!("game root:      {}", layout.root.display());
    println!("backup:         {}", yes_no(st.has_backup));
    match (st.archive_present, st.archive_marker) {
        (false, _) => println!("app.asar:       missing"),
        (true, Some(marker)) => println!("app.asar:       modified ('{marker}')"),
        (true, None) => println!("app.asar:       original"),
    }
    println!("extracted:      {}", yes_no(st.has_working_dir));
    println!("modified mode:  {}", yes_no(st.modded));
    for (key, applied) in &st.entries {
        println!("  [{}] {key}", if *applied { "x" } else { " " });
    }
    Ok(())
}

fn run_install(config: &PatcherConfig, selected: Vec<String>) -> Result<()> {
    let selected = if selected.is_empty() {
        features::defaults().into_iter().map(str::to_string).collect()
    } else {
        selected
    };
    let system = SystemServices::from_config(config);
    let mut progress = |i: usize, n: usize, label: &str| log::debug!("[{i}/{n}] {label}");
    let report = install(config, &selected[..], system.services(), Some(&mut progress))?;
    print!("{report}");
    if !report.run.is_clean() {
        log::warn!(
            "{} patch(es) failed; the rest were installed",
            report.run.failed.len()
        );
    }
    Ok(())
}

/// Export the active save, edit it, import it back.
fn edit_save(
    config: &PatcherConfig,
    edit: impl FnOnce(&mut SaveDocument) -> Result<String>,
) -> Result<()> {
    let system = SystemServices::from_config(config);
    let services = system.services();
    if services.probe.is_running(&config.game_executable) {
        return Err(PatchError::GameRunning);
    }
    let variant = SaveVariant::active(&config.layout().sentinel);
    let transfer = system.helper.export(variant)?;
    let mut doc = SaveDocument::load(&transfer)?;
    let summary = edit(&mut doc)?;
    doc.store(&transfer)?;
    system.helper.import(&transfer, variant)?;
    println!("{summary} ({variant} save)");
    Ok(())
}

fn run_save(config: &PatcherConfig, command: SaveCommand) -> Result<()> {
    match command {
        SaveCommand::Export { file } => {
            let system = SystemServices::from_config(config);
            let variant = SaveVariant::active(&config.layout().sentinel);
            let transfer = system.helper.export(variant)?;
            SaveDocument::load(&transfer)?.store(&file)?;
            println!("exported {variant} save to {}", file.display());
            Ok(())
        }
        SaveCommand::Import { file } => {
            let incoming = SaveDocument::load(&file)?;
            edit_save(config, move |doc| {
                *doc = incoming;
                Ok(format!("imported {}", file.display()))
            })
        }
        SaveCommand::Gold { amount } => edit_save(config, |doc| {
            doc.set_gold(amount);
            Ok(format!("gold set to {amount}"))
        }),
        SaveCommand::CompleteStages => edit_save(config, |doc| {
            let stars = doc.complete_all_stages();
            Ok(format!("all stages completed, {stars} stars"))
        }),
        SaveCommand::InjectEggs => edit_save(config, |doc| {
            Ok(format!("added {} egg(s) to the shop", doc.inject_missing_eggs()))
        }),
        SaveCommand::ResetEggs => edit_save(config, |doc| {
            doc.reset_eggs();
            Ok("egg shop reset".to_string())
        }),
        SaveCommand::ShinyAll => edit_save(config, |doc| {
            Ok(format!("{} Pokemon made shiny", doc.set_all_shiny()))
        }),
        SaveCommand::EvolveAll(args) => {
            let evolutions = EvolutionMap::load(&args.data)?;
            edit_save(config, |doc| {
                Ok(format!("{} Pokemon evolved", doc.evolve_all(&evolutions)))
            })
        }
        SaveCommand::DevolveAll(args) => {
            let evolutions = EvolutionMap::load(&args.data)?;
            edit_save(config, |doc| {
                Ok(format!("{} Pokemon devolved", doc.devolve_all(&evolutions)))
            })
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Command::Features { json } = cli.command {
        list_features(json);
        return Ok(());
    }
    let config = load_config(&cli)?;
    match cli.command {
        Command::Install { features } => run_install(&config, features),
        Command::Status => print_status(&config),
        Command::Restore => {
            let system = SystemServices::from_config(&config);
            restore(&config, &system.probe)?;
            println!("original app.asar restored");
            Ok(())
        }
        Command::Save(command) => run_save(&config, command),
        Command::Features { .. } => Ok(()),
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_logging(level_for(&cli), cli.log_file.as_deref()) {
        eprintln!("Error: could not start logging: {err}");
        std::process::exit(1);
    }

    if let Err(err) = run(cli) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
