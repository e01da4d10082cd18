mod config;
mod telemetry;

use clap::{Parser, Subcommand};
use config::Config;
use geocoder::{GridKey, HeuristicClassifier, Location, Point};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "fogwar", about = "Shared fog of war map and pixel canvas backend")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the game API and the admin endpoints
    Serve {
        #[arg(long, short)]
        config: PathBuf,
    },
    /// Print the grid cell and country attribution of a coordinate
    Classify {
        #[arg(allow_hyphen_values = true)]
        lat: f64,
        #[arg(allow_hyphen_values = true)]
        lng: f64,
        /// Report open water instead of a country where applicable
        #[arg(long)]
        water_filter: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        CliCommand::Serve { config } => serve(&config),
        CliCommand::Classify {
            lat,
            lng,
            water_filter,
        } => classify(lat, lng, water_filter),
    }
}

fn serve(path: &std::path::Path) -> ExitCode {
    let config = match Config::from_file(path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let _telemetry = match telemetry::init(config.logging.as_ref(), config.metrics.as_ref()) {
        Ok(telemetry) => telemetry,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(error = %err, "could not start runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(ingest::run(config.service)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "service stopped");
            ExitCode::FAILURE
        }
    }
}

fn classify(lat: f64, lng: f64, water_filter: bool) -> ExitCode {
    let Some(point) = Point::new(lat, lng) else {
        eprintln!("coordinate out of range: {lat},{lng}");
        return ExitCode::FAILURE;
    };

    let key = GridKey::from_point(point);
    let attribution = match HeuristicClassifier::new(water_filter).locate(point) {
        Location::Water => "water".to_string(),
        Location::Country(code) => code.to_string(),
    };
    println!("{key} {attribution}");
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_classify_command() {
        let cli = Cli::try_parse_from(["fogwar", "classify", "-33.87", "151.21", "--water-filter"])
            .expect("parse");
        match cli.command {
            CliCommand::Classify {
                lat,
                lng,
                water_filter,
            } => {
                assert_eq!(lat, -33.87);
                assert_eq!(lng, 151.21);
                assert!(water_filter);
            }
            CliCommand::Serve { .. } => panic!("expected classify"),
        }
    }

    #[test]
    fn test_parse_serve_command() {
        let cli = Cli::try_parse_from(["fogwar", "serve", "--config", "fogwar.yaml"]).expect("parse");
        assert!(matches!(
            cli.command,
            CliCommand::Serve { config } if config == PathBuf::from("fogwar.yaml")
        ));
    }
}
