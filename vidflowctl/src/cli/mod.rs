pub mod convert;
pub mod prompt;
pub mod undo;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use vidflow_config::{ConfigLoader, ConfigLoaderOptions, ConfigOverrides};
use vidflow_core::{EncoderPreset, RecyclePolicy};

#[derive(Debug, Parser)]
#[command(
    name = "vidflowctl",
    version,
    about = "Convert every video under a folder to H.264/AAC MP4",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Arguments for the default `convert` command.
    #[command(flatten)]
    pub convert: ConvertArgs,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Convert(self.convert))
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert a folder (the default when no subcommand is given)
    Convert(ConvertArgs),
    /// Reverse the most recent move recorded in an undo log
    Undo(UndoArgs),
}

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct CommonArgs {
    /// TOML configuration file (defaults to ./vidflow.toml if present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Environment file to load before reading VIDFLOW_* variables
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,
}

impl CommonArgs {
    pub fn loader(&self, overrides: ConfigOverrides) -> ConfigLoader {
        ConfigLoader::with_options(ConfigLoaderOptions {
            config_path: self.config.clone(),
            env_file: self.env_file.clone(),
            env: None,
            overrides,
        })
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct ConvertArgs {
    /// Folder to convert; prompted for when omitted
    #[arg(value_name = "SOURCE")]
    pub source: Option<PathBuf>,

    /// Do not pause between batches
    #[arg(long)]
    pub auto_continue: bool,

    /// Files per batch before asking whether to continue
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Convert several files at once
    #[arg(long)]
    pub parallel: bool,

    /// Encoder speed/quality preset
    #[arg(long, value_enum, value_name = "PRESET")]
    pub ffmpeg_preset: Option<PresetArg>,

    /// Use one worker per core instead of leaving one free
    #[arg(long)]
    pub all_cores: bool,

    /// Keep running and convert files that appear later (implies --parallel)
    #[arg(long)]
    pub watch: bool,

    /// Exact number of workers for parallel and watch runs
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Path to the ffmpeg executable
    #[arg(long, value_name = "PATH")]
    pub encoder: Option<PathBuf>,

    /// What to do with originals after a successful conversion
    #[arg(long, value_enum)]
    pub recycle: Option<RecycleArg>,

    /// Where to record moves into the error folder
    #[arg(long, value_name = "PATH")]
    pub undo_log: Option<PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl ConvertArgs {
    /// Flags only override lower layers when they were actually given.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            encoder_path: self.encoder.clone(),
            preset: self.ffmpeg_preset.map(Into::into),
            auto_continue: self.auto_continue.then_some(true),
            batch_size: self.batch_size,
            parallel: self.parallel.then_some(true),
            all_cores: self.all_cores.then_some(true),
            workers: self.workers,
            watch: self.watch.then_some(true),
            recycle: self.recycle.map(Into::into),
            undo_log: self.undo_log.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct UndoArgs {
    /// Source folder whose default undo log should be used
    #[arg(value_name = "SOURCE", required_unless_present = "log")]
    pub source: Option<PathBuf>,

    /// Undo log to read instead of the one next to SOURCE
    #[arg(long, value_name = "PATH")]
    pub log: Option<PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PresetArg {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    Medium,
    Slow,
    Slower,
    Veryslow,
}

impl From<PresetArg> for EncoderPreset {
    fn from(val: PresetArg) -> Self {
        match val {
            PresetArg::Ultrafast => EncoderPreset::Ultrafast,
            PresetArg::Superfast => EncoderPreset::Superfast,
            PresetArg::Veryfast => EncoderPreset::Veryfast,
            PresetArg::Faster => EncoderPreset::Faster,
            PresetArg::Fast => EncoderPreset::Fast,
            PresetArg::Medium => EncoderPreset::Medium,
            PresetArg::Slow => EncoderPreset::Slow,
            PresetArg::Slower => EncoderPreset::Slower,
            PresetArg::Veryslow => EncoderPreset::Veryslow,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecycleArg {
    /// Move to the system trash; fail if unavailable
    Trash,
    /// Delete permanently
    Delete,
    /// Try the trash, delete permanently if that fails
    TrashOrDelete,
}

impl From<RecycleArg> for RecyclePolicy {
    fn from(val: RecycleArg) -> Self {
        match val {
            RecycleArg::Trash => RecyclePolicy::Trash,
            RecycleArg::Delete => RecyclePolicy::Delete,
            RecycleArg::TrashOrDelete => RecyclePolicy::TrashOrDelete,
        }
    }
}
