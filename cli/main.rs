#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;

use percentile_predictor::about::model_description;
use percentile_predictor::coefficients::{CoefficientError, CoefficientSet};
use percentile_predictor::estimator::PercentileEstimator;
use percentile_predictor::export::write_table;
use percentile_predictor::summary::Summary;
use percentile_predictor::table::{load_table, predict_table, predicted_values, sample_table};

#[derive(Args)]
pub struct PredictArgs {
    /// Path to an Excel (.xlsx), CSV or TSV file with female,tenth_math_final,tenth_sci_final,pcm,general,obc,sc,st columns
    #[arg(required_unless_present = "sample", conflicts_with = "sample")]
    pub input: Option<PathBuf>,

    /// Use the built-in sample students instead of an input file
    #[arg(long)]
    pub sample: bool,

    /// TOML file with alternate regression coefficients
    #[arg(long, value_name = "FILE")]
    pub coefficients: Option<PathBuf>,

    /// Where to write the predicted table (.xlsx, .csv, .tsv or .txt)
    #[arg(long, default_value = "predicted_scores.xlsx")]
    pub output: PathBuf,

    /// Number of predicted percentiles to print
    #[arg(long, value_name = "N", default_value = "20")]
    pub preview: usize,
}

#[derive(Parser)]
#[command(
    name = "percentile-predictor",
    about = "Predict JEE Mains percentiles from class 10 marks and student background",
    long_about = "Applies a fixed regression equation, with quadratic terms for class 10 math \
                  and science marks, to every row of a student table and reports the predicted \
                  percentiles with summary statistics."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict percentiles for a student table
    #[command(about = "Predict percentiles (outputs: predicted_scores.xlsx)")]
    Predict(PredictArgs),

    /// Write the built-in sample students to a file
    #[command(about = "Write the sample student table (outputs: sample_students.xlsx)")]
    Sample {
        #[arg(long, default_value = "sample_students.xlsx")]
        output: PathBuf,
    },

    /// Print or save the default regression coefficients as TOML
    #[command(about = "Print the default coefficients as TOML, or save them with --output")]
    Coefficients {
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Describe the model, its equation and accuracy
    #[command(about = "Describe the regression model and the expected input columns")]
    About {
        /// TOML file with alternate regression coefficients
        #[arg(long, value_name = "FILE")]
        coefficients: Option<PathBuf>,
    },

    /// Display version and build information
    #[command(about = "Display version and build information")]
    Version,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let Cli { command } = cli;

    let result = match command {
        Some(Commands::Predict(args)) => predict(args),
        Some(Commands::Sample { output }) => run_sample(&output),
        Some(Commands::Coefficients { output }) => run_coefficients(output.as_deref()),
        Some(Commands::About { coefficients }) => run_about(coefficients.as_deref()),
        Some(Commands::Version) => {
            print_version_info();
            Ok(())
        }
        None => Cli::command()
            .print_help()
            .map(|()| println!())
            .map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn load_coefficients(path: Option<&Path>) -> Result<CoefficientSet, CoefficientError> {
    match path {
        Some(path) => {
            log::info!("Loading coefficients from '{}'", path.display());
            CoefficientSet::load(path)
        }
        None => Ok(CoefficientSet::default()),
    }
}

pub fn predict(args: PredictArgs) -> Result<(), Box<dyn std::error::Error>> {
    let estimator = PercentileEstimator::new(load_coefficients(args.coefficients.as_deref())?);

    let df = match &args.input {
        Some(path) => {
            println!("Loading student data from: {}", path.display());
            load_table(path)?
        }
        None => {
            println!("Using sample data.");
            sample_table()?
        }
    };

    println!("\nPreview of input data");
    println!("{}", df.head(Some(5)));

    // Nothing is written unless every row predicts.
    let mut predicted = predict_table(&estimator, &df)?;
    let values = predicted_values(&predicted)?;

    println!("\nPredicted percentiles");
    for (i, value) in values.iter().take(args.preview).enumerate() {
        println!("{i:>6}  {value:>12.6}");
    }
    if values.len() > args.preview {
        println!("   ... {} more", values.len() - args.preview);
    }

    println!("\nPerformance summary");
    print!("{}", Summary::describe(&values));

    write_table(&mut predicted, &args.output)?;
    println!("\nPredictions saved to: {}", args.output.display());
    Ok(())
}

fn run_sample(output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut df = sample_table()?;
    write_table(&mut df, output)?;
    println!("Sample data saved to: {}", output.display());
    Ok(())
}

fn run_coefficients(output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let coefficients = CoefficientSet::default();
    match output {
        Some(path) => {
            coefficients.save(path)?;
            println!("Coefficients saved to: {}", path.display());
        }
        None => print!("{}", coefficients.to_toml()?),
    }
    Ok(())
}

fn run_about(coefficients: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let coefficients = load_coefficients(coefficients)?;
    print!("{}", model_description(&coefficients));
    Ok(())
}

/// Format seconds into a human-readable duration like "2.4 hours ago"
fn format_duration_ago(seconds: u64) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;
    const WEEK: u64 = 7 * DAY;
    const YEAR: u64 = 365 * DAY;

    if seconds < MINUTE {
        format!("{seconds} seconds ago")
    } else if seconds < HOUR {
        format!("{:.1} minutes ago", seconds as f64 / MINUTE as f64)
    } else if seconds < DAY {
        format!("{:.1} hours ago", seconds as f64 / HOUR as f64)
    } else if seconds < WEEK {
        format!("{:.1} days ago", seconds as f64 / DAY as f64)
    } else if seconds < YEAR {
        format!("{:.1} weeks ago", seconds as f64 / WEEK as f64)
    } else {
        format!("{:.1} years ago", seconds as f64 / YEAR as f64)
    }
}

fn print_version_info() {
    let version = env!("CARGO_PKG_VERSION");
    let release_tag = option_env!("PREDICTOR_RELEASE_TAG");
    let build_timestamp: u64 = env!("PREDICTOR_BUILD_TIMESTAMP").parse().unwrap_or(0);

    println!("percentile-predictor {version}");

    match release_tag {
        Some(tag) => println!("Release: {tag}"),
        None => println!("Release: development build"),
    }

    if build_timestamp > 0 {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        if now > build_timestamp {
            println!("Built: {}", format_duration_ago(now - build_timestamp));
        } else {
            println!("Built: just now");
        }
    }
}
