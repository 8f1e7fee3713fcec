//! CLI Module
//!
//! Command-line interface for the Refmaster mastering core.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::dsp::Preset;
use crate::render::QualityMode;

/// Refmaster - reference-matched audio mastering
#[derive(Parser, Debug)]
#[command(name = "refmaster")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Master a target track against an optional reference
    #[command(name = "master")]
    Master {
        /// Track to master
        #[arg(short, long)]
        target: PathBuf,

        /// Track whose level the target should approach
        #[arg(short, long)]
        reference: Option<PathBuf>,

        /// Chain preset (overrides the config file)
        #[arg(short, long, value_enum)]
        preset: Option<Preset>,

        /// Mastering params as JSON (overrides the preset)
        #[arg(long)]
        params: Option<String>,

        /// Waveform quality (overrides the config file)
        #[arg(short, long, value_enum)]
        quality: Option<QualityMode>,

        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Artifact directory (overrides the config file)
        #[arg(short, long)]
        storage: Option<PathBuf>,
    },

    /// Render a waveform PNG for an audio file
    #[command(name = "render")]
    Render {
        /// Audio file to draw
        #[arg(short, long)]
        input: PathBuf,

        /// PNG output path
        #[arg(short, long)]
        output: PathBuf,

        /// Chart title
        #[arg(short, long, default_value = "Waveform")]
        title: String,

        /// Point budget
        #[arg(short, long, value_enum, default_value_t = QualityMode::High)]
        quality: QualityMode,
    },

    /// Print sample rate, duration and levels of an audio file
    #[command(name = "analyze")]
    Analyze {
        /// Audio file to inspect
        #[arg(short, long)]
        input: PathBuf,
    },
}
