//! Command-line interface for wfs-export
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and argument overrides
//! - Building the export context and options from arguments
//! - Subcommands (version, completion, config)
//! - The export summary table

pub mod completion;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::config::{Config, LogLevel};
use crate::error::{ConfigError, Result};
use crate::export::{ExportContext, ExportFormat, ExportOptions, ExportReport};
use crate::geo::ReferenceSystemCode;
use crate::model::LayerDescriptor;

/// Formats selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatChoice {
    /// GeoJSON with geometry
    Geojson,
    /// CSV attributes only
    Csv,
    /// Both files, exported concurrently
    Both,
}

impl FormatChoice {
    /// Export lanes to run
    pub fn formats(self) -> Vec<ExportFormat> {
        match self {
            FormatChoice::Geojson => vec![ExportFormat::GeoJson],
            FormatChoice::Csv => vec![ExportFormat::Tabular],
            FormatChoice::Both => ExportFormat::ALL.to_vec(),
        }
    }
}

/// WFS layer exporter
#[derive(Parser, Debug)]
#[command(
    name = "wfs-export",
    version,
    about = "Export WFS layers to GeoJSON and CSV",
    long_about = "Retrieve a feature layer from an OGC WFS service and save it as GeoJSON
(reprojected to WGS84 unless native coordinates are kept) and/or CSV attributes."
)]
pub struct CliArgs {
    /// WFS service endpoint
    #[arg(value_name = "SERVICE_URL")]
    pub service_url: Option<String>,

    /// Layer (feature type) to export, e.g. parks:trees
    #[arg(short = 'l', long, value_name = "ID")]
    pub layer: Option<String>,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = FormatChoice::Both)]
    pub format: FormatChoice,

    /// Feature cap when not downloading everything (0 = no cap)
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub max_features: u64,

    /// Total number of features in the layer, if known
    #[arg(long = "total-features", value_name = "N")]
    pub total_features: Option<u64>,

    /// Number of features already loaded
    #[arg(long = "loaded-features", value_name = "N", default_value_t = 0)]
    pub loaded_features: u64,

    /// Projection of retrieved coordinates when the payload declares none
    #[arg(long, value_name = "CODE")]
    pub source_projection: Option<String>,

    /// Native projection of the layer
    #[arg(long, value_name = "CODE")]
    pub native_projection: Option<String>,

    /// Retrieve native coordinates because the standard projection is unreliable
    #[arg(long)]
    pub projection_issue: bool,

    /// Respect --max-features even when more features exist
    #[arg(long = "no-download-all")]
    pub no_download_all: bool,

    /// Keep native coordinates in GeoJSON output
    #[arg(long)]
    pub keep_native: bool,

    /// Directory to save files to
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Features per request (0 = single request)
    #[arg(long, value_name = "N")]
    pub page_size: Option<u64>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,

    /// Disable progress spinners
    #[arg(long)]
    pub no_progress: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands for wfs-export
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information
    Version,

    /// Generate shell completion script
    Completion {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        #[arg(value_name = "SHELL")]
        shell: String,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Create a new CLI interface from the process arguments
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Create a CLI interface from parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and merge with arguments
    ///
    /// # Arguments
    /// * `args` - Command-line arguments
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load(args.config_file.as_deref())?;
        Self::apply_args_to_config(&mut config, args);
        config.validate()?;
        Ok(config)
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the CLI arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Get the config file path given on the command line
    pub fn config_path(&self) -> Option<&Path> {
        self.args.config_file.as_deref()
    }

    /// Apply CLI arguments to configuration
    ///
    /// Overrides configuration values with CLI arguments where provided
    ///
    /// # Arguments
    /// * `config` - Configuration to modify
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        Self::apply_logging_args(config, args);
        Self::apply_service_args(config, args);
        Self::apply_export_args(config, args);
    }

    /// Apply logging-related CLI arguments to configuration
    fn apply_logging_args(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };
    }

    /// Apply service-related CLI arguments to configuration
    fn apply_service_args(config: &mut Config, args: &CliArgs) {
        if let Some(timeout) = args.timeout {
            config.service.timeout = timeout;
        }
        if let Some(page_size) = args.page_size {
            config.service.page_size = page_size;
        }
    }

    /// Apply export-related CLI arguments to configuration
    fn apply_export_args(config: &mut Config, args: &CliArgs) {
        if let Some(dir) = &args.output_dir {
            config.export.download_dir = dir.clone();
        }
        if args.no_progress || args.quiet {
            config.export.show_progress = false;
        }
    }

    /// Formats selected on the command line
    pub fn formats(&self) -> Vec<ExportFormat> {
        self.args.format.formats()
    }

    /// Build the export context from arguments
    ///
    /// # Returns
    /// * `Result<ExportContext>` - Context or error if the service URL or layer is missing
    pub fn export_context(&self) -> Result<ExportContext> {
        let service_url = self
            .args
            .service_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| missing_argument("SERVICE_URL"))?;
        let layer_id = self
            .args
            .layer
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| missing_argument("--layer"))?;

        let mut layer = LayerDescriptor::new(layer_id.trim());
        if let Some(code) = &self.args.native_projection {
            layer = layer.with_default_projection(ReferenceSystemCode::new(code));
        }

        let mut context = ExportContext::new(service_url.trim(), layer)
            .with_max_features(self.args.max_features)
            .with_feature_counts(self.args.total_features, self.args.loaded_features)
            .with_projection_issue(self.args.projection_issue);
        if let Some(code) = &self.args.source_projection {
            context = context.with_source_projection(ReferenceSystemCode::new(code));
        }
        Ok(context)
    }

    /// Build the user toggles from arguments
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            download_all: !self.args.no_download_all,
            keep_native_projection: self.args.keep_native,
        }
    }

    /// Handle subcommands
    ///
    /// # Returns
    /// * `Result<bool>` - True if subcommand was handled, false to continue
    pub fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Some(Commands::Version) => {
                self.show_version();
                Ok(true)
            }
            Some(Commands::Completion { shell }) => {
                completion::generate_completion(shell)?;
                Ok(true)
            }
            Some(Commands::Config { show, validate }) => {
                self.handle_config_command(*show, *validate)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Show version information
    fn show_version(&self) {
        println!("wfs-export version {}", env!("CARGO_PKG_VERSION"));
        println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }

    /// Handle config subcommand
    ///
    /// # Arguments
    /// * `show` - Whether to show configuration
    /// * `validate` - Whether to validate configuration
    ///
    /// # Returns
    /// * `Result<()>` - Success or error
    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            self.validate_config_file()?;
        }

        if show || !validate {
            self.show_config()?;
        }

        Ok(())
    }

    /// Validate configuration file
    fn validate_config_file(&self) -> Result<()> {
        let path = self.get_config_path();
        println!("Validating configuration file: {}", path.display());

        if !path.exists() {
            println!("Configuration file does not exist, defaults are used");
            return Ok(());
        }

        match Config::from_file(&path).and_then(|config| config.validate()) {
            Ok(()) => println!("Configuration is valid"),
            Err(e) => println!("Configuration is invalid: {}", e),
        }

        Ok(())
    }

    /// Show effective configuration
    fn show_config(&self) -> Result<()> {
        let path = self.get_config_path();
        println!("Configuration file: {}", path.display());
        println!();
        println!("=== Effective Configuration ===");
        println!();
        println!("{}", self.config.to_toml()?);
        Ok(())
    }

    /// Get configuration file path (from args or default)
    fn get_config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_path)
    }

    /// Print the export summary unless in quiet mode
    pub fn print_summary(&self, reports: &[ExportReport]) {
        if !self.args.quiet && !reports.is_empty() {
            println!("{}", render_summary(reports));
        }
    }
}

fn missing_argument(name: &str) -> crate::error::ExportError {
    ConfigError::InvalidValue {
        field: name.to_string(),
        value: "<missing>".to_string(),
    }
    .into()
}

/// One line of the export summary
#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Format")]
    format: String,
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Features")]
    features: usize,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Reprojected")]
    reprojected: String,
    #[tabled(rename = "Time")]
    time: String,
}

/// Render completed exports as a table
pub fn render_summary(reports: &[ExportReport]) -> String {
    let rows = reports.iter().map(|report| SummaryRow {
        format: report.format.to_string(),
        file: report.location.clone(),
        features: report.features,
        size: format_size(report.bytes),
        reprojected: if report.reprojected { "yes" } else { "no" }.to_string(),
        time: format!("{} ms", report.elapsed_ms),
    });
    Table::new(rows).with(Style::modern()).to_string()
}

/// Human-readable byte size
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
