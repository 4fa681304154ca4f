//! Command-line front end for sminalib

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, LevelFilter};
use std::path::{Path, PathBuf};

use sminalib::atom::{AtomType, XsType};
use sminalib::config::{read_params_file, ConfigMap, ConfigValue};
use sminalib::forcefield::{ConfIndependentTerm, ScoringFunction, BUILTIN_SCORING_FUNCTIONS};

/// Command-line arguments for the application
#[derive(Parser, Debug)]
#[clap(
    name = "smina",
    version = sminalib::VERSION,
    about = "Smina-style molecular docking driven by a parameter set"
)]
struct Cli {
    /// Increase logging verbosity (-v progress and debug, -vv trace)
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[clap(subcommand)]
    command: Commands,
}

/// Options shared by the dock, score and minimize subcommands
#[derive(Args, Debug)]
struct CommonArgs {
    /// PDBQT file containing the receptor
    #[clap(long, short, value_parser)]
    receptor: PathBuf,

    /// PDBQT file(s) containing the ligands
    #[clap(long, short, value_parser, required = true)]
    ligand: Vec<PathBuf>,

    /// Builtin scoring function (vina, vinardo, ad4_scoring)
    #[clap(long, default_value = "vina")]
    scoring: String,

    /// Custom scoring function file, overrides --scoring
    #[clap(long, value_parser)]
    custom_scoring: Option<PathBuf>,

    /// Output file; format taken from the extension (.sdf or .pdbqt)
    #[clap(long, short, value_parser)]
    out: Option<PathBuf>,

    /// Write the run log to this file
    #[clap(long, value_parser)]
    log: Option<PathBuf>,

    /// Embed per-atom interaction terms in the SDF output
    #[clap(long)]
    atom_term_data: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run with a JSON or key=value parameter file
    Run {
        /// Parameter file
        #[clap(value_parser)]
        params: PathBuf,

        /// Output file instead of stdout; format taken from the extension (.sdf or .pdbqt)
        #[clap(long, short, value_parser)]
        output: Option<PathBuf>,
    },

    /// Dock ligands to a receptor
    Dock {
        #[clap(flatten)]
        common: CommonArgs,

        /// Center of the search box (x,y,z)
        #[clap(long, value_parser, value_delimiter = ',')]
        center: Option<Vec<f64>>,

        /// Size of the search box (x,y,z)
        #[clap(long, value_parser, value_delimiter = ',')]
        size: Option<Vec<f64>>,

        /// Derive the search box from this ligand
        #[clap(long, value_parser)]
        autobox_ligand: Option<PathBuf>,

        /// Padding added around an automatic box
        #[clap(long, default_value_t = 4.0)]
        autobox_add: f64,

        /// Exhaustiveness of the search (higher values increase accuracy but take longer)
        #[clap(long, default_value_t = 8)]
        exhaustiveness: usize,

        /// Number of binding modes to generate
        #[clap(long, default_value_t = 9)]
        num_modes: usize,

        /// Energy range for output poses (kcal/mol)
        #[clap(long, default_value_t = 3.0)]
        energy_range: f64,

        /// Random seed
        #[clap(long)]
        seed: Option<u64>,

        /// Worker threads (default: all cores)
        #[clap(long)]
        cpu: Option<usize>,
    },

    /// Score the input poses
    Score {
        #[clap(flatten)]
        common: CommonArgs,
    },

    /// Minimize the input poses in place
    Minimize {
        #[clap(flatten)]
        common: CommonArgs,

        /// Maximum BFGS iterations
        #[clap(long)]
        minimize_iters: Option<usize>,
    },

    /// Print the builtin scoring functions and the available terms
    Terms,

    /// Print the atom type parameters
    AtomTypes,
}

fn path_value(path: &Path) -> ConfigValue {
    ConfigValue::from(path)
}

fn common_params(common: &CommonArgs) -> ConfigMap {
    let mut params = ConfigMap::new();
    params.insert("receptor".into(), path_value(&common.receptor));
    params.insert(
        "ligand".into(),
        ConfigValue::List(common.ligand.iter().map(|p| p.display().to_string()).collect()),
    );
    params.insert("scoring".into(), common.scoring.clone().into());
    if let Some(path) = &common.custom_scoring {
        params.insert("custom_scoring".into(), path_value(path));
    }
    if let Some(path) = &common.log {
        params.insert("log".into(), path_value(path));
    }
    if common.atom_term_data {
        params.insert("atom_term_data".into(), true.into());
    }
    if let Some(path) = &common.out {
        params.insert("out".into(), path_value(path));
    }
    params
}

fn vector3(name: &str, values: &[f64]) -> Result<[f64; 3]> {
    match values {
        [x, y, z] => Ok([*x, *y, *z]),
        _ => anyhow::bail!("--{} takes three comma-separated values, got {}", name, values.len()),
    }
}

/// Run sminalib; the library writes the `out` file, otherwise the SDF text goes to stdout
fn execute(params: &ConfigMap) -> Result<()> {
    let sdf = sminalib::run(params).context("Docking run failed")?;
    match params.get("out") {
        Some(path) => info!("Wrote {}", path),
        None => print!("{}", sdf),
    }
    Ok(())
}

fn print_terms() {
    for name in BUILTIN_SCORING_FUNCTIONS {
        if let Ok(function) = ScoringFunction::builtin(name) {
            println!("# {}", name);
            for line in function.describe() {
                println!("{}", line);
            }
        }
    }
    println!("# conformation independent terms");
    for term in ConfIndependentTerm::ALL {
        println!("{}", term);
    }
}

fn print_atom_types() {
    println!("#Name radius depth solvation volume covalent_radius xs_radius xs_hydrophobe xs_donor xs_acceptor ad_heteroatom");
    for atom_type in AtomType::ALL {
        let xs = XsType::classify(atom_type, false, false);
        println!(
            "{} {} {} {} {} {} {} {} {} {} {}",
            atom_type.to_pdbqt_string(),
            atom_type.radius(),
            atom_type.depth(),
            atom_type.solvation(),
            atom_type.volume(),
            atom_type.covalent_radius(),
            xs.map_or(0.0, |x| x.radius()),
            xs.map_or(false, |x| x.is_hydrophobic()) as u8,
            xs.map_or(false, |x| x.is_donor()) as u8,
            xs.map_or(false, |x| x.is_acceptor()) as u8,
            atom_type.is_heteroatom() as u8,
        );
    }
}

fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match cli.command {
        Commands::Run { params, output } => {
            let mut map = read_params_file(&params)
                .with_context(|| format!("Failed to read parameters from {}", params.display()))?;
            if cli.verbose > 0 && !map.contains_key("verbosity") {
                map.insert("verbosity".into(), ConfigValue::Int(cli.verbose as i64 + 1));
            }
            if let Some(path) = &output {
                map.insert("out".into(), path_value(path));
            }
            execute(&map)?;
        }

        Commands::Dock {
            common,
            center,
            size,
            autobox_ligand,
            autobox_add,
            exhaustiveness,
            num_modes,
            energy_range,
            seed,
            cpu,
        } => {
            let mut params = common_params(&common);
            if let Some(center) = center {
                let [x, y, z] = vector3("center", &center)?;
                params.insert("center_x".into(), x.into());
                params.insert("center_y".into(), y.into());
                params.insert("center_z".into(), z.into());
            }
            if let Some(size) = size {
                let [x, y, z] = vector3("size", &size)?;
                params.insert("size_x".into(), x.into());
                params.insert("size_y".into(), y.into());
                params.insert("size_z".into(), z.into());
            }
            if let Some(path) = &autobox_ligand {
                params.insert("autobox_ligand".into(), path_value(path));
            }
            params.insert("autobox_add".into(), autobox_add.into());
            params.insert("exhaustiveness".into(), ConfigValue::Int(exhaustiveness as i64));
            params.insert("num_modes".into(), ConfigValue::Int(num_modes as i64));
            params.insert("energy_range".into(), energy_range.into());
            if let Some(seed) = seed {
                params.insert("seed".into(), ConfigValue::Int(seed as i64));
            }
            if let Some(cpu) = cpu {
                params.insert("cpu".into(), ConfigValue::Int(cpu as i64));
            }
            params.insert("verbosity".into(), ConfigValue::Int(cli.verbose as i64 + 1));
            params.insert("quiet".into(), false.into());
            execute(&params)?;
        }

        Commands::Score { common } => {
            let mut params = common_params(&common);
            params.insert("score_only".into(), true.into());
            params.insert("quiet".into(), false.into());
            execute(&params)?;
        }

        Commands::Minimize { common, minimize_iters } => {
            let mut params = common_params(&common);
            params.insert("minimize".into(), true.into());
            if let Some(iters) = minimize_iters {
                params.insert("minimize_iters".into(), ConfigValue::Int(iters as i64));
            }
            params.insert("quiet".into(), false.into());
            execute(&params)?;
        }

        Commands::Terms => print_terms(),

        Commands::AtomTypes => print_atom_types(),
    }

    Ok(())
}
