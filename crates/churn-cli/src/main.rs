use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;
use std::str::FromStr;

use churn_classifiers::config::{BalancingChoice, PipelineConfig};
use churn_classifiers::metrics::Scoring;
use churn_cli::train::{
    default_report_path, load_pipeline_config, train_from_csv, write_report, TrainOverrides,
};

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("CHURN_LOG", "error,churn=info"))
        .init();

    let matches = Command::new("churn")
        .version(clap::crate_version!())
        .about("Churn classifier training pipeline")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("train")
                .about("Prepare, balance, tune, prune and bag a churn classifier")
                .arg(
                    Arg::new("input")
                        .help("Path to the delimited churn table (header row required)")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .help("Path to a pipeline JSON configuration file")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output_file")
                        .short('o')
                        .long("output")
                        .help("Path to write the JSON report. Defaults to <input>_report.json.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("split")
                        .long("split")
                        .help("Share of rows held out for testing.")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .help("Seed for every random step.")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    Arg::new("balancing")
                        .long("balancing")
                        .help("Balanced variants to build.")
                        .value_parser(["oversample", "undersample", "both"]),
                )
                .arg(
                    Arg::new("scoring")
                        .long("scoring")
                        .help("Metric used to compare models.")
                        .value_parser(["accuracy", "precision", "recall", "f1"]),
                )
                .arg(
                    Arg::new("n_iter")
                        .long("n-iter")
                        .help("Number of sampled search configurations.")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("cv_folds")
                        .long("cv-folds")
                        .help("Cross-validation folds used by the search.")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("threshold")
                        .long("threshold")
                        .help("Importance threshold for feature selection.")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    Arg::new("estimators")
                        .long("estimators")
                        .help("Number of bagged estimators.")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("no_scale")
                        .long("no-scale")
                        .help("Disable feature standardisation.")
                        .action(ArgAction::SetTrue),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("train", sub_m)) => handle_train(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn overrides_from_matches(matches: &ArgMatches) -> Result<TrainOverrides> {
    let balancing = matches
        .get_one::<String>("balancing")
        .map(|s| BalancingChoice::from_str(s))
        .transpose()
        .map_err(anyhow::Error::msg)?;
    let scoring = matches
        .get_one::<String>("scoring")
        .map(|s| Scoring::from_str(s))
        .transpose()
        .map_err(anyhow::Error::msg)?;

    Ok(TrainOverrides {
        split_fraction: matches.get_one::<f64>("split").copied(),
        seed: matches.get_one::<u64>("seed").copied(),
        balancing,
        scoring,
        n_iter: matches.get_one::<usize>("n_iter").copied(),
        cv_folds: matches.get_one::<usize>("cv_folds").copied(),
        selection_threshold: matches.get_one::<f64>("threshold").copied(),
        bagging_estimators: matches.get_one::<usize>("estimators").copied(),
        no_scale: matches.get_flag("no_scale"),
    })
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let input: &PathBuf = matches
        .get_one("input")
        .context("input path is required")?;
    log::info!("[Churn::Train] Training on: {:?}", input);

    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => {
            log::info!("[Churn::Train] Using config: {:?}", path);
            load_pipeline_config(path)?
        }
        None => {
            log::info!("[Churn::Train] No config provided; using defaults.");
            PipelineConfig::default()
        }
    };
    overrides_from_matches(matches)?.apply(&mut config);
    log::debug!(
        "[Churn::Train] Effective config:\n{}",
        serde_json::to_string_pretty(&config).unwrap_or_default()
    );

    let outcome = match train_from_csv(input, &config) {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("Training failed: {:#}", e);
            std::process::exit(1)
        }
    };

    for stage in &outcome.report.stages {
        eprintln!(
            "[Churn::Train] {:<22} {:<28} accuracy {:.4}  f1 {:.4}",
            stage.stage, stage.model, stage.evaluation.accuracy, stage.evaluation.f1
        );
    }

    let output = matches
        .get_one::<PathBuf>("output_file")
        .cloned()
        .unwrap_or_else(|| default_report_path(input));
    write_report(&output, input, &config, &outcome)?;
    eprintln!(
        "[Churn::Train] Final model uses {} features; report at {:?}",
        outcome.schema.len(),
        output
    );
    Ok(())
}
