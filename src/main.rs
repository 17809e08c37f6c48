use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use vast_ad_driver::async_api;
use vast_ad_driver::fetch;
use vast_ad_driver::models::AdDefinition;
use vast_ad_driver::timeline::{BreakPosition, TimelineEntry};

/// VAST ad-break parser and scheduler
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a VAST file or URL into normalized ads
    Parse {
        /// Path to the VAST file or URL
        #[arg(short, long)]
        input: String,

        /// Pretty print the output
        #[arg(short, long)]
        pretty: bool,

        /// Print JSON instead of debug output
        #[arg(short, long)]
        json: bool,
    },

    /// Resolve a VAST file or URL into its pod and timeline entry
    Timeline {
        /// Path to the VAST file or URL
        #[arg(short, long)]
        input: String,

        /// Break position: seconds, "immediate" or "end"
        #[arg(long, default_value = "immediate")]
        position: BreakPosition,

        /// apiFramework a media file must declare
        #[arg(long, default_value = "VPAID")]
        framework: String,

        /// Pretty print the JSON output
        #[arg(short, long)]
        pretty: bool,
    },
}

#[derive(Serialize)]
struct TimelineReport<'a> {
    entry: &'a TimelineEntry,
    pod: Vec<&'a AdDefinition>,
    fallback: Option<&'a AdDefinition>,
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), serde_json::Error> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Parse {
            input,
            pretty,
            json,
        } => {
            let content = fetch::fetch_vast_content_async(input).await?;
            let response = async_api::parse_vast(&content).await?;

            if *json {
                print_json(&response, *pretty)?;
            } else if *pretty {
                println!("{:#?}", response);
            } else {
                println!("{:?}", response);
            }
        }
        Commands::Timeline {
            input,
            position,
            framework,
            pretty,
        } => {
            let scheduled = async_api::fetch_ad_break(input, *position, framework).await?;
            let ad_break = &scheduled.ad_break;

            let mut pod = Vec::new();
            let mut next = Some(scheduled.entry.head);
            while let Some(index) = next {
                pod.push(ad_break.ad(index));
                next = ad_break.next_in_pod(index);
            }
            let report = TimelineReport {
                entry: &scheduled.entry,
                pod,
                fallback: ad_break
                    .fallback_for(scheduled.entry.head)
                    .map(|index| ad_break.ad(index)),
            };
            print_json(&report, *pretty)?;
        }
    }

    Ok(())
}
