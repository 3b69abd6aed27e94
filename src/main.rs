use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use grid_mapgen::catalog::{builtin, TemplateCatalog};
use grid_mapgen::diagnostics::TracingSink;
use grid_mapgen::export;
use grid_mapgen::generator::generate;
use grid_mapgen::params::{GenerationParams, TerrainPreset};
use grid_mapgen::plan::EntityCatalog;

#[derive(Parser, Debug)]
#[command(name = "grid_mapgen")]
#[command(about = "Generate symmetric procedural maps for grid-based strategy games")]
struct Args {
    /// Width of the map in cells
    #[arg(short = 'W', long, default_value = "64")]
    width: usize,

    /// Height of the map in cells
    #[arg(short = 'H', long, default_value = "64")]
    height: usize,

    /// Random seed (uses random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of players (overrides the parameter file)
    #[arg(short = 'p', long)]
    players: Option<usize>,

    /// Terrain preset applied before any other setting
    #[arg(long)]
    preset: Option<TerrainPreset>,

    /// Parameter file (JSON) used as the starting parameter set
    #[arg(long)]
    params: Option<String>,

    /// Single setting as key=value; may be repeated and applies in order
    #[arg(long = "set", value_name = "KEY=VALUE")]
    settings: Vec<String>,

    /// Template catalog (JSON); the built-in temperate catalog otherwise
    #[arg(long)]
    catalog: Option<String>,

    /// Write the generated map as JSON
    #[arg(short, long)]
    output: Option<String>,

    /// Write a PNG preview of the generated map
    #[arg(long)]
    preview: Option<String>,

    /// List the terrain presets and exit
    #[arg(long)]
    list_presets: bool,
}

fn load_params(args: &Args) -> Result<GenerationParams, String> {
    let mut params = match &args.params {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| format!("reading {path}: {e}"))?;
            serde_json::from_str(&text).map_err(|e| format!("parsing {path}: {e}"))?
        }
        None => GenerationParams::default(),
    };
    if let Some(preset) = args.preset {
        preset.apply(&mut params.terrain);
    }
    for setting in &args.settings {
        let (key, value) = setting
            .split_once('=')
            .ok_or_else(|| format!("setting '{setting}' is not of the form key=value"))?;
        params.apply_setting(key.trim(), value.trim()).map_err(|e| e.to_string())?;
    }
    if let Some(players) = args.players {
        params.entities.players = players;
    }
    Ok(params)
}

fn load_catalog(args: &Args) -> Result<TemplateCatalog, String> {
    match &args.catalog {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| format!("reading {path}: {e}"))?;
            TemplateCatalog::from_json(&text).map_err(|e| e.to_string())
        }
        None => builtin::temperate().map_err(|e| e.to_string()),
    }
}

fn run(args: &Args) -> Result<(), String> {
    let params = load_params(args)?;
    let catalog = load_catalog(args)?;
    let seed = args.seed.unwrap_or_else(rand::random);

    info!(seed, width = args.width, height = args.height, "generating map");
    let map = generate(
        args.width,
        args.height,
        seed,
        &params,
        &catalog,
        &EntityCatalog::builtin(),
        &mut TracingSink,
    )
    .map_err(|e| e.to_string())?;

    let report = &map.report;
    info!(
        land = report.land_cells,
        regions = report.regions,
        spawns = report.spawns,
        entities = map.entities.len(),
        resources = report.resource_placed,
        "map generated"
    );

    if let Some(path) = &args.output {
        export::write_json(&map, path).map_err(|e| e.to_string())?;
        info!(%path, "wrote map");
    }
    if let Some(path) = &args.preview {
        export::export_preview(&map, &catalog, path).map_err(|e| e.to_string())?;
        info!(%path, "wrote preview");
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if args.list_presets {
        for preset in TerrainPreset::all() {
            println!("{:<12} {}", preset.to_string(), preset.description());
        }
        return ExitCode::SUCCESS;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{message}");
            ExitCode::FAILURE
        }
    }
}
