use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "appbundle")]
#[command(about = "Inspect, validate and re-import application export bundles")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print format versions and contents of a bundle
    Inspect {
        /// Bundle file
        path: PathBuf,
    },

    /// Migrate and check every reference of a bundle
    Validate {
        /// Bundle file
        path: PathBuf,
    },

    /// Import a bundle into a scratch store and export it again
    Reimport {
        /// Bundle file to import
        input: PathBuf,

        /// Where to write the re-exported bundle
        output: PathBuf,

        /// Reset widget styling to the bundled themes while importing
        #[arg(long)]
        reset_widget_styles: bool,
    },
}
