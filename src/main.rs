// Apache-2.0 License - https://www.apache.org/licenses/LICENSE-2.0

use std::process;

use clap::Parser;

use sign_inference::cli::args::{Cli, Commands};
use sign_inference::cli::logging::set_verbose;
use sign_inference::cli::{classify, extract, info};
use sign_inference::error;

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Extract(args) => {
            set_verbose(args.verbose);
            extract::run_extract(&args)
        }
        Commands::Classify(args) => {
            set_verbose(args.verbose);
            classify::run_classify(&args)
        }
        Commands::Info(args) => info::run_info(&args),
    };

    if let Err(e) = result {
        error!("{e}");
        process::exit(1);
    }
}
