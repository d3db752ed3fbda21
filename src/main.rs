//! AguaForm CLI — role-based container stacks on Terraform.

use aguaform::cli::Cli;
use clap::Parser;

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            level
        })
        .format_timestamp(None)
        .parse_env("AGUAFORM_LOG")
        .init();

    if let Err(e) = aguaform::cli::run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
