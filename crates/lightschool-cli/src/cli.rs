//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// lightschool - offline lesson client.
#[derive(Parser, Debug)]
#[command(name = "lightschool")]
#[command(
    author,
    version,
    about,
    long_about = r#"lightschool keeps a versioned offline copy of the lesson app and serves
every request through it.

Lifecycle:
- install:  populate the configured generation from the manifest
- activate: make it current and delete every other generation
- upgrade:  install, then activate

Examples:
    lightschool upgrade
    lightschool fetch /school/data/lessons/en/math/grade1.json
    lightschool lesson math 1 u1
    lightschool tutor --subject math --grade 2 "what is 7 plus 5?"
"#
)]
pub struct Cli {
    /// Server origin (overrides config and LIGHTSCHOOL_ORIGIN).
    #[arg(long, global = true, value_name = "URL")]
    pub origin: Option<String>,

    /// Cache generation to operate on (overrides config).
    #[arg(long, global = true, value_name = "NAME")]
    pub generation: Option<String>,

    /// Also write logs to a daily rolling file in this directory.
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Populate the generation's store from the manifest.
    Install,

    /// Make the generation current and remove older stores.
    Activate,

    /// Install and activate in one step.
    Upgrade,

    /// Route one GET request through the cache and print the body.
    Fetch {
        /// Path (or absolute URL) to request.
        #[arg(value_name = "PATH")]
        path: String,

        /// Accept header to send.
        #[arg(long, value_name = "MIME")]
        accept: Option<String>,
    },

    /// List stores and their entries.
    Status,

    /// Step through the cards of one unit.
    Lesson {
        subject: String,
        grade: u32,
        /// Unit id within the lesson pack.
        unit: String,
        #[arg(long)]
        locale: Option<String>,
    },

    /// Take the quiz of one unit and record the score.
    Quiz {
        subject: String,
        grade: u32,
        unit: String,
        #[arg(long)]
        locale: Option<String>,
        /// Grade locally without posting progress.
        #[arg(long)]
        no_save: bool,
    },

    /// Ask the tutor. Without a message, reads questions from stdin.
    Tutor {
        #[arg(long, default_value = "math")]
        subject: String,
        #[arg(long, default_value_t = 1)]
        grade: u32,
        #[arg(long)]
        locale: Option<String>,
        #[arg(value_name = "MESSAGE", trailing_var_arg = true)]
        message: Vec<String>,
    },

    /// Show the config file path and effective settings.
    Config {
        /// Write the effective settings to the config file.
        #[arg(long)]
        init: bool,
    },
}
