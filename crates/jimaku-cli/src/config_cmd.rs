use crate::config::{Config, ConfigError, ConfigPaths};
use clap::Args;
use std::process::Command;

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Print the effective config
    #[arg(long)]
    pub print: bool,

    /// Edit config in $EDITOR
    #[arg(long)]
    pub edit: bool,

    /// Set a config value (dotted key=value)
    #[arg(long, value_name = "key=value")]
    pub set: Vec<String>,
}

pub fn run(args: &ConfigArgs, paths: &ConfigPaths) -> Result<(), ConfigError> {
    if args.edit && (!args.set.is_empty() || args.print) {
        return Err(ConfigError::Validation(
            "--edit cannot be combined with --set or --print".into(),
        ));
    }

    let mut config = Config::load_or_create(paths)?;

    if args.edit {
        edit_config(paths)?;
        config = Config::load(paths)?;
        config.validate()?;
        return Ok(());
    }

    if !args.set.is_empty() {
        for assignment in &args.set {
            apply_set(&mut config, assignment)?;
        }
        config.validate()?;
        Config::write(paths, &config)?;
    }

    if args.print || args.set.is_empty() {
        let output = toml::to_string_pretty(&config)?;
        println!("{output}");
    }

    Ok(())
}

fn edit_config(paths: &ConfigPaths) -> Result<(), ConfigError> {
    let editor = std::env::var("EDITOR")
        .map_err(|_| ConfigError::Validation("$EDITOR not set; use --set or set EDITOR".into()))?;
    let mut parts = editor.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| ConfigError::Validation("$EDITOR is empty".into()))?;
    let status = Command::new(program)
        .args(parts)
        .arg(&paths.config_path)
        .status()
        .map_err(ConfigError::Io)?;
    if !status.success() {
        return Err(ConfigError::Validation(
            "editor exited with a non-zero status".into(),
        ));
    }
    Ok(())
}

fn apply_set(config: &mut Config, assignment: &str) -> Result<(), ConfigError> {
    let (key, value) = assignment
        .split_once('=')
        .ok_or_else(|| ConfigError::Validation("expected key=value for --set".into()))?;
    let value = value.trim();
    match key {
        "reconciler.continuation_threshold" => {
            config.reconciler.continuation_threshold = parse_f64(value, key)?;
        }
        "reconciler.new_line_threshold" => {
            config.reconciler.new_line_threshold = parse_f64(value, key)?;
        }
        "reconciler.stability_ms" => {
            config.reconciler.stability_ms = parse_i64(value, key)?;
        }
        "reconciler.silence_ms" => {
            config.reconciler.silence_ms = parse_i64(value, key)?;
        }
        "reconciler.min_candidate_chars" => {
            config.reconciler.min_candidate_chars = parse_usize(value, key)?;
        }
        "reconciler.history_window" => {
            config.reconciler.history_window = parse_usize(value, key)?;
        }
        "reconciler.line_queue_capacity" => {
            config.reconciler.line_queue_capacity = parse_usize(value, key)?;
        }
        "output.session" => {
            config.output.session = parse_bool(value, key)?;
        }
        "output.timestamps" => {
            config.output.timestamps = parse_bool(value, key)?;
        }
        other => {
            return Err(ConfigError::Validation(format!(
                "unknown config key: {other}"
            )));
        }
    }
    Ok(())
}

fn parse_f64(value: &str, key: &str) -> Result<f64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Validation(format!("{key} expects a number, got {value}")))
}

fn parse_i64(value: &str, key: &str) -> Result<i64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Validation(format!("{key} expects an integer, got {value}")))
}

fn parse_usize(value: &str, key: &str) -> Result<usize, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Validation(format!("{key} expects an integer, got {value}")))
}

fn parse_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Validation(format!(
            "{key} expects true or false, got {value}"
        ))),
    }
}
