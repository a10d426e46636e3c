// Apache-2.0 License - https://www.apache.org/licenses/LICENSE-2.0

use clap::{Args, Parser, Subcommand};

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Examples:
    sign-inference extract --dataset hello.json --model classifier.onnx --label hello --output knn_db
    sign-inference extract -d hello.json -m classifier.onnx -l hello -o knn_db --samples 8 --seed 7
    sign-inference classify --dataset session.json --model classifier.onnx --database knn_db
    sign-inference classify -d session.json -m classifier.onnx -b knn_db -k 7
    sign-inference info --dataset hello.json"#)]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract KNN feature rows from a skeleton dataset
    Extract(ExtractArgs),
    /// Classify each video in a skeleton dataset against a KNN database
    Classify(ClassifyArgs),
    /// Print statistics for a skeleton dataset file
    Info(InfoArgs),
}

/// Arguments for the extract command.
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Path to a skeleton dataset JSON file
    #[arg(short, long)]
    pub dataset: String,

    /// Path to the ONNX classifier model
    #[arg(short, long)]
    pub model: String,

    /// Class label for every video in the dataset
    #[arg(short, long)]
    pub label: String,

    /// KNN database directory (one .txt file per class)
    #[arg(short, long, default_value = "knn_db")]
    pub output: String,

    /// Augmented samples to draw per video
    #[arg(long, default_value_t = 4)]
    pub samples: usize,

    /// Seed for the augmentation RNG (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Show verbose output
    #[arg(long, default_value_t = true)]
    pub verbose: bool,
}

/// Arguments for the classify command.
#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Path to a skeleton dataset JSON file
    #[arg(short, long)]
    pub dataset: String,

    /// Path to the ONNX classifier model
    #[arg(short, long)]
    pub model: String,

    /// KNN database directory
    #[arg(short = 'b', long)]
    pub database: String,

    /// Number of nearest neighbors in the vote
    #[arg(short, long, default_value_t = 5)]
    pub k: usize,

    /// Show verbose output
    #[arg(long, default_value_t = true)]
    pub verbose: bool,
}

/// Arguments for the info command.
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Path to a skeleton dataset JSON file
    #[arg(short, long)]
    pub dataset: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_extract() {
        let cli = Cli::parse_from([
            "sign-inference",
            "extract",
            "-d",
            "hello.json",
            "-m",
            "model.onnx",
            "-l",
            "hello",
        ]);
        match cli.command {
            Commands::Extract(args) => {
                assert_eq!(args.dataset, "hello.json");
                assert_eq!(args.label, "hello");
                assert_eq!(args.output, "knn_db");
                assert_eq!(args.samples, 4);
                assert_eq!(args.seed, None);
            }
            _ => panic!("expected extract"),
        }
    }

    #[test]
    fn test_parse_classify_k() {
        let cli = Cli::parse_from([
            "sign-inference",
            "classify",
            "-d",
            "s.json",
            "-m",
            "model.onnx",
            "-b",
            "db",
            "-k",
            "9",
        ]);
        match cli.command {
            Commands::Classify(args) => assert_eq!(args.k, 9),
            _ => panic!("expected classify"),
        }
    }
}
