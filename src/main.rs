use anyhow::{Context, Result};
use clap::Parser;
use colored::control::set_override as set_color_override;
use query_test::engine::RunSettings;
use query_test::i18n::{self, Localizer};
use query_test::report::{ReportOptions, print_human};
use query_test::suite::{discover, load_suites};
use query_test::types::Summary;
use query_test::{t, t_args};
use std::path::PathBuf;
use tracing::{error, info};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug, Clone)]
#[command(
    version,
    author,
    about = t!("cli-about")
)]
struct Cli {
    // TEST_PATHS: suite files (.yaml/.yml/.json) or directories containing them
    #[arg(value_name = "TEST_PATHS", required = true)]
    tests: Vec<PathBuf>,

    // Locale test titles are shown in
    #[arg(
        long,
        value_name = "LOCALE",
        help = t!("cli-locale")
    )]
    locale: Option<String>,

    // Only list the test titles
    #[arg(
        short = 'l',
        long = "list",
        help = t!("cli-list")
    )]
    list: bool,

    // Silent mode
    #[arg(
        short = 'q',
        long = "silent",
        help = t!("cli-silent")
    )]
    silent: bool,

    #[arg(
        long = "no-color",
        help = t!("cli-no-color")
    )]
    no_color: bool,

    // Verbose
    #[arg(
        short = 'v',
        long = "verbose",
        help = t!("cli-verbose")
    )]
    verbose: bool,

    // Filtering of report lines
    #[arg(
        short = 'f',
        long = "hide-fails",
        conflicts_with = "hide_passes",
        help = t!("cli-hide-fails")
    )]
    hide_fails: bool,

    #[arg(
        short = 'p',
        long = "hide-passes",
        conflicts_with = "hide_fails",
        help = t!("cli-hide-passes")
    )]
    hide_passes: bool,
}

fn main() -> Result<()> {
    // Initialize localization first
    i18n::init();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        // With -v, show INFO and above, but allow RUST_LOG to override for debug/trace
        std::env::var("RUST_LOG").unwrap_or_else(|_| "query_test=info".to_string())
    } else {
        // Without -v, only show warnings and errors
        std::env::var("RUST_LOG").unwrap_or_else(|_| "query_test=warn".to_string())
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    set_color_override(!cli.no_color);

    let mut settings = RunSettings::default();
    if let Some(locale) = &cli.locale {
        settings = settings.with_locale(locale.trim());
    }
    let localizer = Localizer::for_language(&settings.locale);

    let files = discover(&cli.tests).context(t!("error-discover"))?;
    if files.is_empty() {
        error!("{}", t!("error-no-suites"));
        std::process::exit(2);
    }

    if cli.verbose && !cli.silent {
        info!(
            "{}",
            t_args!("info-version",
                "name" => env!("CARGO_PKG_NAME"),
                "version" => env!("CARGO_PKG_VERSION")
            )
        );
    }

    let options = ReportOptions {
        hide_passes: cli.hide_passes,
        hide_fails: cli.hide_fails,
    };
    let mut aggregate = Summary::default();
    let mut load_failed = false;
    let mut index = 0;

    for (file, loaded) in load_suites(&files) {
        let suite = match loaded {
            Ok(suite) => suite,
            Err(e) => {
                error!(
                    "{}",
                    t_args!("error-suite-load", "file" => file.display(), "error" => e)
                );
                load_failed = true;
                continue;
            }
        };

        if cli.list {
            println!("{}", t_args!("available-tests-in", "suite" => &suite.name));
            for case in &suite.tests {
                index += 1;
                println!(
                    "{}",
                    t_args!("test-list-item",
                        "index" => index,
                        "title" => case.title.resolve(&localizer)
                    )
                );
            }
            continue;
        }

        if cli.verbose && !cli.silent {
            info!(
                "{}",
                t_args!("info-suite",
                    "name" => &suite.name,
                    "installations" => suite.installations.len(),
                    "tests" => suite.tests.len()
                )
            );
        }

        let summary = suite.check(&localizer);
        if !cli.silent {
            print_human(&summary, options);
        }
        aggregate.absorb(summary);
    }

    if cli.verbose && !cli.silent {
        info!(
            "{}",
            t_args!("info-all-finished",
                "total" => aggregate.total,
                "passed" => aggregate.passed,
                "failed" => aggregate.failed
            )
        );
    }

    if load_failed {
        std::process::exit(2);
    }
    if aggregate.failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
