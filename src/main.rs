//! tda-datasets CLI: generate, download and inspect dataset files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use tda_datasets::config::Config;
use tda_datasets::datasets::one_file::{self, OneFileDatasetSpec};
use tda_datasets::{container, datasets};
use tda_datasets::download::download_file_from_google_drive;
use tda_datasets::generation::eeg::{self, SciNe01DataDirReader};
use tda_datasets::generation::eigenvalue_predict::{self, EigenvalueInput};
use tda_datasets::generation::{reddit_graph, reininghaus};

#[derive(Parser)]
#[command(name = "tda-datasets")]
#[command(about = "Persistence-diagram datasets: generation, download, inspection")]
#[command(version)]
struct Cli {
    /// TOML config file (default: ./tda-datasets.toml, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a generation pipeline over raw data
    Generate {
        #[command(subcommand)]
        pipeline: Pipeline,
    },

    /// Download a pre-generated file from Google Drive
    Download {
        /// Dataset name (e.g. animal, mpeg7, reddit_5K, reddit_12K)
        dataset: String,

        /// Target directory (default: generated data directory)
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Print the member tree and readme of a file
    Inspect {
        file: PathBuf,

        /// Members listed per group before eliding
        #[arg(long, default_value = "10")]
        max_children: usize,
    },
}

#[derive(Subcommand)]
enum Pipeline {
    /// Reddit graphs filtered by vertex degree
    Reddit {
        #[arg(long, value_enum, default_value = "5k")]
        size: RedditSize,

        /// Pickle or JSON graph collection (default: <raw>/reddit_multi_<size>.graph)
        #[arg(long)]
        input: Option<PathBuf>,

        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Anonymous graphs with their eigenvalues
    EigenvaluePredict {
        #[arg(long, value_enum, default_value = "50k")]
        size: AnonSize,

        /// Directory of METIS and eigenvalue files (default: <raw>/anon_<size>_eigenvalue_predict)
        #[arg(long)]
        input: Option<PathBuf>,

        #[arg(long, default_value = "metis")]
        graph_extension: String,

        #[arg(long, default_value = "ev")]
        eigenvalue_extension: String,

        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// SHREC 2014 DIPHA diagrams
    Reininghaus {
        #[arg(long, value_enum, default_value = "real")]
        variant: ShrecVariant,

        /// Directory of .diagram files and labels.txt (default: <raw>/reininghaus_2014_shrec_<variant>)
        #[arg(long)]
        input: Option<PathBuf>,

        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// SciNe01 EEG persistence, bottom and top height filtration
    EegPershom {
        /// Directory of subject .mat files (default: <raw>/sciNe01_eeg)
        #[arg(long)]
        input: Option<PathBuf>,

        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// SciNe01 EEG raw signal
    EegRaw {
        #[arg(long)]
        input: Option<PathBuf>,

        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RedditSize {
    #[value(name = "5k")]
    FiveK,
    #[value(name = "12k")]
    TwelveK,
}

#[derive(Clone, Copy, ValueEnum)]
enum AnonSize {
    #[value(name = "1k")]
    OneK,
    #[value(name = "10k")]
    TenK,
    #[value(name = "50k")]
    FiftyK,
}

#[derive(Clone, Copy, ValueEnum)]
enum ShrecVariant {
    Real,
    Synthetic,
}

const EEG_RAW_DIR: &str = "sciNe01_eeg";

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    info!(
        "raw data: {}, generated data: {}",
        config.raw_data_dir.display(),
        config.generated_data_dir.display()
    );

    match cli.command {
        Commands::Generate { pipeline } => cmd_generate(&config, pipeline),
        Commands::Download { dataset, root } => {
            let root = root.unwrap_or_else(|| config.generated_data_dir.clone());
            cmd_download(&dataset, &root)
        }
        Commands::Inspect { file, max_children } => cmd_inspect(&file, max_children),
    }
}

fn output_or(config: &Config, output: Option<PathBuf>, spec: &OneFileDatasetSpec) -> PathBuf {
    output.unwrap_or_else(|| config.generated_path(spec.file_name))
}

fn cmd_generate(config: &Config, pipeline: Pipeline) -> Result<()> {
    match pipeline {
        Pipeline::Reddit { size, input, output } => {
            let (raw_name, spec) = match size {
                RedditSize::FiveK => ("reddit_multi_5K.graph", &one_file::REDDIT_5K_JMLR),
                RedditSize::TwelveK => ("reddit_multi_12K.graph", &one_file::REDDIT_12K_JMLR),
            };
            let input = input.unwrap_or_else(|| config.raw_path(raw_name));
            reddit_graph::run(&input, &output_or(config, output, spec), config.max_cpu)
        }
        Pipeline::EigenvaluePredict {
            size,
            input,
            graph_extension,
            eigenvalue_extension,
            output,
        } => {
            let spec = match size {
                AnonSize::OneK => &one_file::ANON_1K_EIGENVALUE_PREDICT,
                AnonSize::TenK => &one_file::ANON_10K_EIGENVALUE_PREDICT,
                AnonSize::FiftyK => &one_file::ANON_50K_EIGENVALUE_PREDICT,
            };
            let input = input.unwrap_or_else(|| config.raw_path(spec.name));
            let input = EigenvalueInput::new(input).with_extensions(graph_extension, eigenvalue_extension);
            eigenvalue_predict::run(
                &input,
                &output_or(config, output, spec),
                eigenvalue_predict::README,
                config.max_cpu,
            )
        }
        Pipeline::Reininghaus { variant, input, output } => {
            let spec = match variant {
                ShrecVariant::Real => &one_file::REININGHAUS_2014_SHREC_REAL,
                ShrecVariant::Synthetic => &one_file::REININGHAUS_2014_SHREC_SYNTHETIC,
            };
            let input = input.unwrap_or_else(|| config.raw_path(spec.name));
            reininghaus::convert_folder_to_hdf5_file(&input, &output_or(config, output, spec))
        }
        Pipeline::EegPershom { input, output } => {
            let reader = SciNe01DataDirReader::new(input.unwrap_or_else(|| config.raw_path(EEG_RAW_DIR)))?;
            let output = output_or(config, output, &one_file::SCINE01_EEG_BOTTOM_TOP_FILTRATION);
            eeg::pershom::run(&reader, &output, config.max_cpu)
        }
        Pipeline::EegRaw { input, output } => {
            let reader = SciNe01DataDirReader::new(input.unwrap_or_else(|| config.raw_path(EEG_RAW_DIR)))?;
            let output = output_or(config, output, &one_file::SCINE01_EEG_RAW_SIGNAL);
            eeg::raw_signal::run(&reader, &output)
        }
    }
}

fn cmd_download(dataset: &str, root: &Path) -> Result<()> {
    let (id, file_name) = datasets::download_location(dataset)?;

    std::fs::create_dir_all(root).with_context(|| format!("creating {}", root.display()))?;
    let destination = root.join(file_name);
    let bytes = download_file_from_google_drive(id, &destination)?;
    println!("{} ({bytes} bytes)", destination.display());
    Ok(())
}

fn cmd_inspect(file: &Path, max_children: usize) -> Result<()> {
    let root = container::read_file(file).with_context(|| format!("reading {}", file.display()))?;

    println!("{}", file.display());
    print!("{}", root.describe(max_children));

    let readme = root.attr("readme").map(str::to_string).or_else(|| {
        root.dataset("readme")
            .and_then(|a| a.as_text())
            .and_then(|lines| lines.first().map(|s| s.to_string()))
    });
    if let Some(readme) = readme {
        println!("\nreadme:\n{readme}");
    }
    Ok(())
}
