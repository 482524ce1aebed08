use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "shiftlog")]
#[command(about = "Record work shifts offline and sync them to a live view")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local store file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the client config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a shift at the current location
    Start(StartArgs),
    /// Record a location sample on the active shift
    Location(LocationArgs),
    /// Record a photo on the active shift
    Photo {
        /// Path to the image file
        path: PathBuf,
        #[command(flatten)]
        location: OptionalLocationArgs,
    },
    /// Record a note on the active shift
    Note {
        /// Note text
        #[arg(required = true)]
        text: Vec<String>,
        #[command(flatten)]
        location: OptionalLocationArgs,
    },
    /// End the active shift
    End,
    /// Show the shift state and sync queue health
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List ended shifts, newest first
    History {
        /// Number of shifts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List items waiting to be delivered
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one delivery pass now
    Sync,
    /// Keep delivering in the background until interrupted
    ///
    /// Events recorded by other `shiftlog` invocations are noticed within a
    /// few seconds; failed deliveries are retried on the sync interval.
    Run,
    /// Print the encoded trail of the active or latest shift
    Trail {
        /// Drop GPS jitter before encoding
        #[arg(long)]
        filtered: bool,
    },
    /// Fetch the live view of a shift from the API
    View {
        /// Pair code shared by the device
        pair_code: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct StartArgs {
    /// Staff member on shift
    #[arg(long)]
    pub staff: String,
    /// Site name
    #[arg(long)]
    pub site: String,
    #[command(flatten)]
    pub location: LocationArgs,
    /// Record site entry/exit notes within this radius of the start point
    #[arg(long, value_name = "METRES")]
    pub fence_radius: Option<f64>,
}

#[derive(Args, Debug, Clone)]
pub struct LocationArgs {
    /// Latitude in degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,
    /// Longitude in degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,
    /// Accuracy radius in metres
    #[arg(long, default_value = "10")]
    pub accuracy: f64,
    /// Resolved street address
    #[arg(long)]
    pub address: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OptionalLocationArgs {
    /// Latitude in degrees
    #[arg(long, allow_negative_numbers = true, requires = "lon")]
    pub lat: Option<f64>,
    /// Longitude in degrees
    #[arg(long, allow_negative_numbers = true, requires = "lat")]
    pub lon: Option<f64>,
    /// Accuracy radius in metres
    #[arg(long, default_value = "10")]
    pub accuracy: f64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
