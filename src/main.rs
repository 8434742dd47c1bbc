use std::path::{Path, PathBuf};
use std::process::ExitCode;

use commuter_sir::collector::ContextCollectorExt;
use commuter_sir::loader::load_inputs;
use commuter_sir::model;
use commuter_sir::parameters::ContextParametersExt;
use commuter_sir::runner::run_with_args;

/// A relative `data_dir` is taken relative to the config file.
fn resolve_data_dir(config: &str, data_dir: &Path) -> PathBuf {
    if data_dir.is_absolute() || config.is_empty() {
        return data_dir.to_path_buf();
    }
    Path::new(config)
        .parent()
        .map_or_else(|| data_dir.to_path_buf(), |dir| dir.join(data_dir))
}

fn main() -> ExitCode {
    let result = run_with_args(|context, args, _| {
        let data_dir = resolve_data_dir(&args.config, &context.get_parameters()?.data_dir);
        let inputs = load_inputs(&data_dir)?;
        context.add_model_reports()?;
        model::init(context, inputs)
    });

    match result {
        Ok(context) => {
            if let Some(last) = context.get_step_counts().last() {
                println!(
                    "Final counts on {} ({} steps): S={} I={} R={}",
                    last.date,
                    last.step + 1,
                    last.counts.susceptible,
                    last.counts.infected,
                    last.counts.recovered
                );
            }
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("Error: {error}");
            ExitCode::FAILURE
        }
    }
}
