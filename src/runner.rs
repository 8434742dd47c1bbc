use std::path::{Path, PathBuf};

use clap::{Args, Command, FromArgMatches as _};
use log::info;

use crate::context::Context;
use crate::error::ModelError;
use crate::log::{set_log_level, set_module_filters, LevelFilter};
use crate::parameters::ContextParametersExt;
use crate::random::ContextRandomExt;
use crate::report::ContextReportExt;

/// Default cli arguments for the model runner
#[derive(Args, Debug, Clone, Default)]
pub struct BaseArgs {
    /// Random seed. Overrides the seed in the configuration file
    #[arg(short, long)]
    pub random_seed: Option<u64>,

    /// Optional path for a parameters config file
    #[arg(short, long, default_value = "")]
    pub config: String,

    /// Optional path for report output
    #[arg(short, long, default_value = "")]
    pub output_dir: String,

    /// Optional prefix for report files
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Overwrite existing report files
    #[arg(short, long)]
    pub force_overwrite: bool,

    /// Enable logging, either a level (`info`) or a list of module filters
    /// (`commuter_sir=info,commuter_sir::mobility=trace`)
    #[arg(short, long, default_value = "")]
    pub log_level: String,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Args)]
pub struct PlaceholderCustom {}

fn create_cli() -> Command {
    let cli = Command::new("commuter-sir");
    BaseArgs::augment_args(cli)
}

/// Runs a simulation with custom cli arguments.
///
/// This function allows you to define custom arguments and a setup function
///
/// # Parameters
/// - `setup_fn`: A function that takes a mutable reference to a `Context`, a `BaseArgs` struct,
///   and an `Option<A>` where A is the custom cli arguments struct
///
/// # Errors
/// Returns an error if argument parsing, the setup function or the run fails
pub fn run_with_custom_args<A, F>(setup_fn: F) -> Result<Context, Box<dyn std::error::Error>>
where
    A: Args,
    F: Fn(&mut Context, BaseArgs, Option<A>) -> Result<(), ModelError>,
{
    let mut cli = create_cli();
    cli = A::augment_args(cli);
    let matches = cli.get_matches();

    let base_args_matches = BaseArgs::from_arg_matches(&matches)?;
    let custom_matches = A::from_arg_matches(&matches)?;
    run_with_args_internal(base_args_matches, Some(custom_matches), setup_fn)
}

/// Runs a simulation with default cli arguments
///
/// This function parses command line arguments and calls the setup function
///
/// # Parameters
/// - `setup_fn`: A function that takes a mutable reference to a `Context` and a `BaseArgs` struct
///
/// # Errors
/// Returns an error if argument parsing, the setup function or the run fails
pub fn run_with_args<F>(setup_fn: F) -> Result<Context, Box<dyn std::error::Error>>
where
    F: Fn(&mut Context, BaseArgs, Option<PlaceholderCustom>) -> Result<(), ModelError>,
{
    let cli = create_cli();
    let matches = cli.get_matches();

    let base_args_matches = BaseArgs::from_arg_matches(&matches)?;
    run_with_args_internal(base_args_matches, None, setup_fn)
}

fn level_from_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Off,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Parses `--log-level`: either a bare level, or a comma separated list whose
/// entries are bare levels or `module=level` pairs.
fn parse_log_level(spec: &str) -> Result<(Option<LevelFilter>, Vec<(String, LevelFilter)>), ModelError> {
    let mut global = None;
    let mut modules = Vec::new();
    for entry in spec.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let parse = |level: &str| {
            level.trim().parse::<LevelFilter>().map_err(|_| {
                ModelError::ConfigError(format!("Invalid log level format: {level}"))
            })
        };
        match entry.split_once('=') {
            Some((module, level)) => modules.push((module.trim().to_string(), parse(level)?)),
            None => global = Some(parse(entry)?),
        }
    }
    Ok((global, modules))
}

fn configure_logging(args: &BaseArgs) -> Result<(), ModelError> {
    let (global, modules) = parse_log_level(&args.log_level)?;
    let verbosity = level_from_verbosity(args.verbose);
    let level = global.map_or(verbosity, |global| global.max(verbosity));

    if level != LevelFilter::Off {
        set_log_level(level);
        println!("Logging enabled at level {level}");
    } else if !modules.is_empty() {
        // Module filters only matter once the root logger is on.
        set_log_level(LevelFilter::Error);
    }
    if !modules.is_empty() {
        let filters: Vec<(&str, LevelFilter)> = modules
            .iter()
            .map(|(module, level)| (module.as_str(), *level))
            .collect();
        set_module_filters(&filters);
        for (module, level) in &filters {
            println!(
                "Logging enabled for {module} at level {}",
                level.to_string().to_uppercase()
            );
        }
    }
    Ok(())
}

fn run_with_args_internal<A, F>(
    args: BaseArgs,
    custom_args: Option<A>,
    setup_fn: F,
) -> Result<Context, Box<dyn std::error::Error>>
where
    F: Fn(&mut Context, BaseArgs, Option<A>) -> Result<(), ModelError>,
{
    configure_logging(&args)?;

    // Instantiate a context
    let mut context = Context::new();

    // Optionally load parameters from a file
    if !args.config.is_empty() {
        println!("Loading parameters from: {}", args.config);
        context.init_parameters(Path::new(&args.config))?;
    }

    // Optionally set output dir, prefix and overwrite for reports
    let report_config = context.report_options();
    if !args.output_dir.is_empty() {
        report_config.directory(PathBuf::from(&args.output_dir));
    }
    if !args.prefix.is_empty() {
        report_config.file_prefix(args.prefix.clone());
    }
    report_config.overwrite(args.force_overwrite);

    // The command line seed wins over the configured one
    let configured_seed = context.get_parameters().ok().and_then(|p| p.seed);
    let seed = args.random_seed.or(configured_seed).unwrap_or(0);
    info!("using random seed {seed}");
    context.init_random(seed);

    // Run the provided Fn
    setup_fn(&mut context, args, custom_args)?;

    // Execute the context
    context.execute()?;
    Ok(context)
}
