use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use extended_portals::commands::{self, CommonOpts};
use extended_portals::portal::models::BlockPos;

#[derive(Parser, Debug)]
#[command(name = "extended_portals", version, about = "Far-lands portals: placement, probing and transit simulation")]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the schema and register the source and mirror worlds
    InitDb {
        /// Surface height of the generated flat terrain
        #[arg(long, default_value_t = 64)]
        surface_y: i32,
    },

    /// Tell whether a region hosts a portal
    Classify {
        #[arg(long, allow_hyphen_values = true)]
        x: i32,
        #[arg(long, allow_hyphen_values = true)]
        z: i32,
    },

    /// List every portal region with its anchor column
    ListRegions {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Run one region-load event in the source world
    Place {
        #[arg(long, allow_hyphen_values = true)]
        x: i32,
        #[arg(long, allow_hyphen_values = true)]
        z: i32,
    },

    /// Look for an existing portal around an anchor
    Probe {
        #[arg(long, allow_hyphen_values = true)]
        x: i32,
        #[arg(long, allow_hyphen_values = true)]
        y: i32,
        #[arg(long, allow_hyphen_values = true)]
        z: i32,
        /// World to probe (default: the source world)
        #[arg(long)]
        world: Option<String>,
    },

    /// Probe portal regions of the source world in parallel
    Survey {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Replay a JSON scenario through the coordinator and transit tracker
    Simulate {
        #[arg(long)]
        scenario: PathBuf,
        /// Tick count (default: scenario's, else 200)
        #[arg(long)]
        ticks: Option<u64>,
        /// Sleep tick_ms between ticks
        #[arg(long)]
        realtime: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = cli.common.resolve()?;
    match cli.command {
        Commands::InitDb { surface_y } => {
            commands::init_db::cmd_init_db(&commands::db_path(&cfg), &cfg, surface_y).map(|_| ())
        }
        Commands::Classify { x, z } => commands::classify::cmd_classify(x, z),
        Commands::ListRegions { limit } => commands::list_regions::cmd_list_regions(limit),
        Commands::Place { x, z } => commands::place::cmd_place(&commands::db_path(&cfg), &cfg, x, z),
        Commands::Probe { x, y, z, world } => {
            let world = world.unwrap_or_else(|| cfg.source_world.clone());
            commands::probe::cmd_probe(&commands::db_path(&cfg), &world, BlockPos::new(x, y, z)).map(|_| ())
        }
        Commands::Survey { limit } => {
            commands::survey::cmd_survey(&commands::db_path(&cfg), &cfg.source_world, limit).map(|_| ())
        }
        Commands::Simulate { scenario, ticks, realtime, json } => {
            commands::simulate::cmd_simulate(&cfg, &scenario, ticks, realtime, json).map(|_| ())
        }
    }
}
