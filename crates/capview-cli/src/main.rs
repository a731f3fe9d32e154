// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result, anyhow};
use capview_app::AppState;
use capview_store::CaptureStore;
use config::Config;
use runtime::CaptureRuntime;
use std::env;
use std::path::PathBuf;
use time::OffsetDateTime;
use tracing::info;

const DEMO_SEED: u64 = 2026;
const DEMO_CAPTURES: usize = 40;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `capview --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    // Held until exit so the seeded demo directory outlives the TUI.
    let mut demo_dir = None;
    let captures_dir = if options.demo {
        let (temp, dir) = capview_testkit::temp_captures_dir()?;
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        capview_testkit::seed_captures(&dir, DEMO_SEED, DEMO_CAPTURES, now)?;
        demo_dir = Some(temp);
        dir
    } else if let Some(dir) = &options.captures_dir {
        capview_store::validate_captures_dir(&dir.to_string_lossy())?;
        dir.clone()
    } else {
        config.captures_dir()?
    };
    if options.print_captures_dir {
        println!("{}", captures_dir.display());
        return Ok(());
    }

    let log_file = config.log_file()?;
    logging::init(config.log_level(), &log_file)?;
    info!(
        config = %options.config_path.display(),
        captures = %captures_dir.display(),
        demo = demo_dir.is_some(),
        "starting capview"
    );

    let store = CaptureStore::open(&captures_dir).with_context(|| {
        format!(
            "open captures directory {} -- if this path is wrong, set [storage].captures_dir or CAPVIEW_CAPTURES_DIR",
            captures_dir.display()
        )
    })?;
    let removed = store.prune(config.max_captures())?;
    if !removed.is_empty() {
        info!(
            count = removed.len(),
            limit = config.max_captures(),
            "pruned captures"
        );
    }

    let client = if config.server_enabled() && !options.demo {
        Some(
            capview_client::Client::new(config.server_base_url(), config.server_timeout()?)
                .with_context(|| {
                    format!(
                        "invalid [server] config in {}; fix base_url/timeout values",
                        options.config_path.display()
                    )
                })?,
        )
    } else {
        None
    };
    if options.check_only {
        return Ok(());
    }

    let mut state = AppState {
        sort_order: config.default_sort(),
        ..AppState::default()
    };
    let mut runtime = CaptureRuntime::new(&store, client);
    let result = capview_tui::run_app(&mut state, &mut runtime);
    info!("capview exiting");
    drop(demo_dir);
    result
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    captures_dir: Option<PathBuf>,
    print_config_path: bool,
    print_captures_dir: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        captures_dir: None,
        print_config_path: false,
        print_captures_dir: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--captures-dir" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--captures-dir requires a directory path"))?;
                options.captures_dir = Some(PathBuf::from(value.as_ref()));
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-captures-dir" => {
                options.print_captures_dir = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    if options.demo && options.print_captures_dir {
        return Err(anyhow!(
            "--print-captures-dir cannot be combined with --demo; the demo directory is removed when capview exits"
        ));
    }

    Ok(options)
}

fn print_help() {
    println!("capview - browse camera detection captures");
    println!("  --config <path>          Use a specific config path");
    println!("  --captures-dir <path>    Browse this directory instead of the configured one");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-captures-dir     Print resolved captures directory");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Launch with seeded demo captures (temporary directory)");
    println!("  --check                  Validate config, captures directory and server settings");
    println!("  --help                   Show this help");
}
