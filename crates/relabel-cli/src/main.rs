// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result};
use config::Config;
use relabel_app::ViewSession;
use relabel_db::{SettingKey, Store};
use runtime::DbRuntime;
use std::env;
use std::path::PathBuf;

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
            "load config {}; run `relabel --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    if options.print_db_path {
        if options.demo {
            println!(":memory:");
        } else {
            println!("{}", config.db_path()?.display());
        }
        return Ok(());
    }

    let mut store = if options.demo {
        Store::open_memory()?
    } else {
        let db_path = config.db_path()?;
        Store::open(&db_path).with_context(|| {
            format!(
                "open database {} -- if this path is wrong, set [storage].db_path or RELABEL_DB_PATH",
                db_path.display()
            )
        })?
    };
    store.bootstrap()?;

    let (dataset, split) = if options.demo {
        store.seed_demo_data()?;
        (
            relabel_db::DEMO_DATASET.to_owned(),
            relabel_db::DEMO_SPLIT.to_owned(),
        )
    } else {
        (
            config.hub_dataset().to_owned(),
            config.hub_split().to_owned(),
        )
    };
    store.set_setting(SettingKey::LastDataset, &dataset)?;
    store.set_setting(SettingKey::LastSplit, &split)?;

    let client = if options.demo || options.offline || !config.hub_enabled() {
        None
    } else {
        Some(
            relabel_hub::Client::new(
                config.hub_base_url(),
                &dataset,
                &split,
                config.hub_timeout()?,
            )
            .with_context(|| {
                format!(
                    "invalid [hub] config in {}; fix base_url/dataset/split values",
                    options.config_path.display()
                )
            })?,
        )
    };

    if options.check_only {
        if let Some(client) = &client {
            client
                .health()
                .context("annotation hub health check failed")?;
        }
        return Ok(());
    }

    let mut session = ViewSession::new();
    let mut runtime = DbRuntime::new(
        store,
        client,
        &dataset,
        &split,
        config.resume_last_view(),
        options.link,
    );
    relabel_tui::run_app(&mut session, &mut runtime)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    print_example: bool,
    demo: bool,
    offline: bool,
    check_only: bool,
    link: Option<String>,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        print_example: false,
        demo: false,
        offline: false,
        check_only: false,
        link: None,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--link" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--link requires a view query string"))?;
                options.link = Some(value.as_ref().to_owned());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-path" => {
                options.print_db_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--offline" => {
                options.offline = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("relabel");
    println!("  --config <path>          Use a specific config path");
    println!("  --link <query>           Open a specific view (for example \"row=7&prompts=a\")");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Launch with seeded demo data (in-memory)");
    println!("  --offline                Skip the hub; browse and annotate stored rows only");
    println!("  --check                  Validate config, database, and hub reachability");
    println!("  --help                   Show this help");
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, parse_cli_args};
    use anyhow::Result;
    use std::path::PathBuf;

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/relabel-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_provided_config_path() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                print_config_path: false,
                print_db_path: false,
                print_example: false,
                demo: false,
                offline: false,
                check_only: false,
                link: None,
                show_help: false,
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_config_path_override() -> Result<()> {
        let options = parse_cli_args(
            vec!["--config", "/custom/config.toml"],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/custom/config.toml"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_missing_config_value() {
        let error = parse_cli_args(vec!["--config"], default_options_path())
            .expect_err("missing config value should fail");
        assert!(error.to_string().contains("--config requires a file path"));
    }

    #[test]
    fn parse_cli_args_captures_link_query() -> Result<()> {
        let options = parse_cli_args(
            vec!["--link", "row=7&prompts=room_admin_v1"],
            default_options_path(),
        )?;
        assert_eq!(options.link.as_deref(), Some("row=7&prompts=room_admin_v1"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_missing_link_value() {
        let error = parse_cli_args(vec!["--link"], default_options_path())
            .expect_err("missing link value should fail");
        assert!(error.to_string().contains("--link requires"));
    }

    #[test]
    fn parse_cli_args_errors_for_unknown_argument() {
        let error = parse_cli_args(vec!["--wat"], default_options_path())
            .expect_err("unknown arg should fail");
        let message = error.to_string();
        assert!(message.contains("unknown argument"));
        assert!(message.contains("--help"));
    }

    #[test]
    fn parse_cli_args_sets_print_and_check_flags() -> Result<()> {
        let options = parse_cli_args(
            vec!["--print-config-path", "--print-example-config", "--check"],
            default_options_path(),
        )?;
        assert!(options.print_config_path);
        assert!(!options.print_db_path);
        assert!(!options.demo);
        assert!(options.print_example);
        assert!(options.check_only);
        assert!(!options.show_help);
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_demo_offline_and_db_path_print_flags() -> Result<()> {
        let options = parse_cli_args(
            vec!["--demo", "--offline", "--print-path"],
            default_options_path(),
        )?;
        assert!(!options.print_config_path);
        assert!(options.print_db_path);
        assert!(options.demo);
        assert!(options.offline);
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_help_flag_for_long_and_short_variants() -> Result<()> {
        let long = parse_cli_args(vec!["--help"], default_options_path())?;
        assert!(long.show_help);

        let short = parse_cli_args(vec!["-h"], default_options_path())?;
        assert!(short.show_help);
        Ok(())
    }
}
