use anyhow::Result;
use clap::{CommandFactory, Parser};
use narrate::app::{run_batch_command, run_clone_command, run_speak_command};
use narrate::cli::{Cli, Commands, ConfigAction};
use narrate::config::Config;
use narrate::error::NarrateError;
use narrate::output::{print_failure, print_stopped};
use owo_colors::OwoColorize;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let outcome = match cli.command {
        Commands::Speak {
            input,
            voice,
            enhancements,
            output,
        } => {
            let config = load_config(cli.config.as_deref())?;
            run_speak_command(config, input, voice, enhancements, output, cli.quiet).await
        }
        Commands::Clone {
            reference,
            input,
            chunk_chars,
            enhancements,
            output,
        } => {
            let config = load_config(cli.config.as_deref())?;
            run_clone_command(
                config,
                reference,
                input,
                chunk_chars,
                enhancements,
                output,
                cli.quiet,
            )
            .await
        }
        Commands::Batch {
            file,
            output_dir,
            prefix,
            voice,
            enhancements,
        } => {
            let config = load_config(cli.config.as_deref())?;
            run_batch_command(
                config,
                file,
                output_dir,
                prefix,
                voice,
                enhancements,
                cli.quiet,
            )
            .await
            .map(|summary| {
                if !cli.quiet {
                    eprintln!(
                        "{} {} succeeded, {} failed",
                        "Batch done:".green(),
                        summary.succeeded,
                        summary.failed
                    );
                }
            })
        }
        Commands::Effects => {
            let config = load_config(cli.config.as_deref())?;
            for (key, source) in config.effect_clips() {
                println!("{:<14} {}", key, source.dimmed());
            }
            Ok(())
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
            Ok(())
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "narrate", &mut std::io::stdout());
            Ok(())
        }
    };

    match outcome {
        Ok(()) => Ok(()),
        Err(NarrateError::Aborted) => {
            print_stopped();
            std::process::exit(130);
        }
        Err(e) => {
            print_failure(&e);
            std::process::exit(1);
        }
    }
}

/// Install env_logger: RUST_LOG wins, otherwise warn / -v info / -vv debug.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// Load configuration from custom path or default location.
fn load_config(custom_path: Option<&std::path::Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    Ok(config.with_env_overrides())
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&std::path::Path>) -> Result<()> {
    let config_path = custom_path
        .map(std::path::Path::to_path_buf)
        .unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Get { key } => {
            let config = Config::load_or_default(&config_path)?.with_env_overrides();
            match config.get_value_by_path(&key) {
                Ok(value) => println!("{}", value),
                Err(e) => {
                    eprintln!("{}", format!("Error: {}", e).red());
                    std::process::exit(1);
                }
            }
        }
        ConfigAction::Set { key, value } => {
            Config::set_value_by_path(&config_path, &key, &value)?;
            println!("Set {} = {}", key, value);
        }
        ConfigAction::List { section } => {
            let mut config = Config::load_or_default(&config_path)?.with_env_overrides();
            if config.provider.api_key.is_some() {
                config.provider.api_key = Some("********".to_string());
            }
            config.effects = config.effect_clips();
            let rendered = match section.as_deref() {
                Some(section) => config.get_value_by_path(section)?,
                None => toml::to_string_pretty(&config)?,
            };
            println!("{}", rendered.trim_end());
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }
    Ok(())
}
