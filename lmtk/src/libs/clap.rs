use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::time::OffsetTime;

use crate::adapters::asmap::CLONE_THRESHOLD;
use crate::adapters::backcross::BackcrossOptions;
use crate::adapters::carthagene::DriverConfig;
use crate::args::{AliasArgs, EngineArgs, GenotypeArgs, Listing, OutputArgs, Tool};
use crate::linkage::StatKind;
use crate::subcommands::{carthagene, clones, decode, encode, reconcile, segregation};

#[derive(Parser, Debug)]
#[command(author, version, about, styles=get_styles())]
pub struct Arguments {
    #[command(subcommand)]
    pub cmd: SubCommand,
}

#[derive(Args, Debug, Clone)]
pub struct LogAndVerbosity {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, default_value_t = 3)]
    pub verbosity: u8,

    /// A file path to save logs to
    #[arg(short, long)]
    pub log_file: Option<PathBuf>,

    /// Silence all warning and info messages
    #[arg(long)]
    pub silent: bool,
}

#[derive(Subcommand, Debug)]
pub enum SubCommand {
    /// Classify the loci of a parents plus offspring genotype table into a JoinMap style table
    Segregation {
        #[command(flatten)]
        args: GenotypeArgs,

        #[command(flatten)]
        aliases: AliasArgs,

        #[command(flatten)]
        out: OutputArgs,

        #[command(flatten)]
        log_and_verbosity: LogAndVerbosity,
    },

    /// Write per-parent input files for a mapping engine from a segregation table
    Encode {
        /// Segregation table (.loc)
        file: PathBuf,

        /// Target engine
        #[arg(short = 'T', long, value_enum, default_value_t = Tool::Backcross)]
        tool: Tool,

        #[command(flatten)]
        aliases: AliasArgs,

        #[command(flatten)]
        options: BackcrossOptions,

        /// Drop loci with a minor allele frequency below the threshold (asmap)
        #[arg(long, default_value_t = 0.0)]
        maf: f64,

        #[command(flatten)]
        out: OutputArgs,

        #[command(flatten)]
        log_and_verbosity: LogAndVerbosity,
    },

    /// Convert an engine listing into a TSV table
    Decode {
        /// Engine listing
        file: PathBuf,

        /// Kind of the listing
        #[arg(short = 'L', long, value_enum)]
        listing: Listing,

        /// Marker info listing used to resolve marker indices
        #[arg(short = 'm', long)]
        markers: Option<PathBuf>,

        /// Statistic held by a pairwise listing
        #[arg(long, value_enum, default_value_t = StatKind::RecombinationFraction)]
        stat: StatKind,

        /// Output file, stdout when not given
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        log_and_verbosity: LogAndVerbosity,
    },

    /// Flag individual pairs with near identical calls in an encoded matrix
    Clones {
        /// Encoded matrix
        file: PathBuf,

        /// Format of the encoded matrix
        #[arg(short = 'T', long, value_enum, default_value_t = Tool::Asmap)]
        tool: Tool,

        /// Individual ids, one per row (carthagene raw files)
        #[arg(short = 'i', long)]
        individuals: Option<PathBuf>,

        #[command(flatten)]
        aliases: AliasArgs,

        /// Minimum congruence of a flagged pair
        #[arg(long, default_value_t = CLONE_THRESHOLD)]
        threshold: f64,

        /// Also write the full congruence matrix
        #[arg(long)]
        matrix: Option<PathBuf>,

        /// Output file, stdout when not given
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Number of threads
        #[arg(short = 't', long, default_value_t = 8)]
        threads: usize,

        #[command(flatten)]
        log_and_verbosity: LogAndVerbosity,
    },

    /// Phase a segregation table with the linkage groups of both parents
    Reconcile {
        /// Segregation table (.loc)
        file: PathBuf,

        /// Linkage groups of P1 (locus, group)
        #[arg(long)]
        p1_groups: PathBuf,

        /// Linkage groups of P2 (locus, group)
        #[arg(long)]
        p2_groups: PathBuf,

        /// Group of P1 whose loci are in coupling
        #[arg(long, default_value_t = 1)]
        p1_reference: u32,

        /// Group of P2 whose loci are in coupling
        #[arg(long, default_value_t = 1)]
        p2_reference: u32,

        #[command(flatten)]
        out: OutputArgs,

        #[command(flatten)]
        log_and_verbosity: LogAndVerbosity,
    },

    /// Group and order the loci of both parents with CarthaGene
    Carthagene {
        /// Segregation table (.loc)
        file: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,

        #[command(flatten)]
        aliases: AliasArgs,

        /// Recombination fraction threshold for grouping
        #[arg(long, default_value_t = 0.3)]
        distance: f64,

        /// LOD threshold for grouping
        #[arg(long, default_value_t = 3.0)]
        lod: f64,

        /// Number of candidate orders kept while building the maps
        #[arg(long, default_value_t = 10)]
        candidates: usize,

        /// Order the linkage groups in parallel sessions
        #[arg(long)]
        parallel: bool,

        /// Number of threads
        #[arg(short = 't', long, default_value_t = 8)]
        threads: usize,

        #[command(flatten)]
        out: OutputArgs,

        #[command(flatten)]
        log_and_verbosity: LogAndVerbosity,
    },
}

impl SubCommand {
    pub fn threads(&self) -> usize {
        match self {
            SubCommand::Clones { threads, .. } | SubCommand::Carthagene { threads, .. } => *threads,
            _ => 1,
        }
    }

    #[rustfmt::skip]
    pub fn log_and_verbosity(&self) -> (u8, &Option<PathBuf>, bool) {
        match self {
            SubCommand::Segregation { log_and_verbosity, .. }
            | SubCommand::Encode { log_and_verbosity, .. }
            | SubCommand::Decode { log_and_verbosity, .. }
            | SubCommand::Clones { log_and_verbosity, .. }
            | SubCommand::Reconcile { log_and_verbosity, .. }
            | SubCommand::Carthagene { log_and_verbosity, .. }
            => (log_and_verbosity.verbosity, &log_and_verbosity.log_file, log_and_verbosity.silent),
        }
    }

    #[rustfmt::skip]
    pub fn output(&self) -> Option<PathBuf> {
        match self {
            SubCommand::Segregation { out: OutputArgs { output, .. }, .. }
            | SubCommand::Encode { out: OutputArgs { output, .. }, .. }
            | SubCommand::Reconcile { out: OutputArgs { output, .. }, .. }
            | SubCommand::Carthagene { out: OutputArgs { output, .. }, .. }
            => Some(output.clone()),
            SubCommand::Decode { .. }
            | SubCommand::Clones { .. } => None,
        }
    }
}

pub fn run_args(args: Arguments) -> Result<()> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(args.cmd.threads())
        .build_global()?;

    let (verbosity, log_file, is_silent) = args.cmd.log_and_verbosity();

    let (level, wrtr, _guard) = init_tracing(verbosity, log_file, is_silent)?;

    let timer = time::format_description::parse("[hour]:[minute]:[second].[subsecond digits:3]")?;
    let time_offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = OffsetTime::new(time_offset, timer);

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(wrtr)
        .with_timer(timer)
        .init();

    if let Some(output) = args.cmd.output() {
        if let Err(e) = std::fs::create_dir_all(output.clone()) {
            match e.kind() {
                std::io::ErrorKind::AlreadyExists => (),
                _ => return Err(eyre!("Error creating directory {output:?}")),
            }
        }
    }

    run_cmd(args.cmd)?;

    Ok(())
}

#[rustfmt::skip]
pub fn run_cmd(cmd: SubCommand) -> Result<()> {
    match cmd {
        SubCommand::Segregation { args, aliases, out, .. } => segregation::run(args, aliases, out)?,

        SubCommand::Encode { file, tool, aliases, options, maf, out, .. }
            => encode::run(file, tool, aliases, options, maf, out)?,

        SubCommand::Decode { file, listing, markers, stat, output, .. }
            => decode::run(file, listing, markers, stat, output)?,

        SubCommand::Clones { file, tool, individuals, aliases, threshold, matrix, output, .. }
            => clones::run(file, tool, individuals, aliases, threshold, matrix, output)?,

        SubCommand::Reconcile { file, p1_groups, p2_groups, p1_reference, p2_reference, out, .. }
            => reconcile::run(file, p1_groups, p2_groups, p1_reference, p2_reference, out)?,

        SubCommand::Carthagene { file, engine, aliases, distance, lod, candidates, parallel, out, .. } => {
            let config = DriverConfig { distance, lod, candidates, parallel, ..Default::default() };
            carthagene::run(file, engine, aliases, config, out)?
        }
    };
    Ok(())
}

pub fn init_tracing(
    verbosity: u8,
    log_file: &Option<PathBuf>,
    is_silent: bool,
) -> Result<(Level, NonBlocking, WorkerGuard)> {
    let level = if is_silent {
        Level::ERROR
    } else {
        match verbosity {
            0 => unreachable!(),
            1 => Level::ERROR,
            2 => Level::WARN,
            3 => Level::INFO,
            4 => Level::DEBUG,
            5..=u8::MAX => Level::TRACE,
        }
    };

    // Write logs to stderr or file
    let (wrtr, _guard) = match log_file {
        Some(path) => {
            let file = std::fs::File::options()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    Ok((level, wrtr, _guard))
}

pub fn get_styles() -> clap::builder::Styles {
    let color = |c| Some(anstyle::Color::Ansi(c));
    clap::builder::Styles::styled()
        .usage(anstyle::Style::new().bold().underline().fg_color(color(anstyle::AnsiColor::Yellow)))
        .header(anstyle::Style::new().bold().underline().fg_color(color(anstyle::AnsiColor::Yellow)))
        .literal(anstyle::Style::new().fg_color(color(anstyle::AnsiColor::Green)))
        .invalid(anstyle::Style::new().bold().fg_color(color(anstyle::AnsiColor::Red)))
        .error(anstyle::Style::new().bold().fg_color(color(anstyle::AnsiColor::Red)))
        .valid(anstyle::Style::new().bold().underline().fg_color(color(anstyle::AnsiColor::Green)))
        .placeholder(anstyle::Style::new().fg_color(color(anstyle::AnsiColor::White)))
}
