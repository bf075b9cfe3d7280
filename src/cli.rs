use crate::scanner::ResolutionPolicy;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "annotation-scanner")]
#[command(about = "Find public, annotated classes on a classpath without loading them")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, value_name = "FILE", global = true)]
    pub db: Option<PathBuf>,

    /// Neither read nor write the verdict cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    Scan {
        /// Class directories or jar archives; directories are searched for jars too
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,

        /// Annotation type to look for (dotted name); defaults to JAX-RS @Path and @Provider
        #[arg(short = 'a', long = "annotation", value_name = "NAME")]
        annotations: Vec<String>,

        /// `strict` aborts on the first unresolvable match; `lenient` records it and continues
        #[arg(long, value_enum, default_value_t = ResolutionPolicy::Strict)]
        policy: ResolutionPolicy,

        #[arg(long, value_name = "N", default_value_t = 0)]
        threads: usize,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    Stats,
    Clear,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}
