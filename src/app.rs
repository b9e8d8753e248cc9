use std::collections::HashMap;
use std::time::Duration;

use clap::{error::ErrorKind, CommandFactory, Parser};
use colored::Colorize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::notification::DEFAULT_DISMISS_DELAY;
use crate::output::{self, OutputFormat};
use crate::query::{ListingQuery, SortOrder};
use crate::runner::{self, RunReport, Runner};

fn print_banner() {
    println!(
        "{} v{} - server-rendered pagination, headless",
        "pagesplice".bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();
}

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<10}: {}", label, value);
}

fn render_custom_help() -> String {
    let cmd = CliArgs::command();
    let mut out = String::new();

    out.push_str(cmd.get_name());
    if let Some(version) = cmd.get_version() {
        out.push(' ');
        out.push_str(version);
    }
    out.push('\n');

    if let Some(about) = cmd.get_about() {
        out.push_str(&about.to_string());
        out.push('\n');
    }
    if let Some(long_about) = cmd.get_long_about() {
        out.push('\n');
        out.push_str(&long_about.to_string());
        out.push('\n');
    }

    out.push_str("\nUsage: ");
    out.push_str(cmd.get_name());
    out.push_str(" [OPTIONS]\n\n");

    let mut sections: Vec<(String, Vec<&clap::Arg>)> = Vec::new();
    let mut section_idx: HashMap<String, usize> = HashMap::new();
    for arg in cmd.get_arguments() {
        if arg.is_hide_set() {
            continue;
        }
        let heading = arg.get_help_heading().unwrap_or("Options").to_string();
        let idx = match section_idx.get(&heading).copied() {
            Some(i) => i,
            None => {
                sections.push((heading.clone(), Vec::new()));
                section_idx.insert(heading, sections.len() - 1);
                sections.len() - 1
            }
        };
        sections[idx].1.push(arg);
    }

    for (heading, args) in sections {
        out.push_str(&heading);
        out.push_str(":\n");
        for arg in args {
            let mut parts: Vec<String> = Vec::new();
            if let Some(short) = arg.get_short() {
                parts.push(format!("-{short}"));
            }
            if let Some(long) = arg.get_long() {
                parts.push(format!("--{long}"));
            }
            if let Some(aliases) = arg.get_visible_aliases() {
                parts.extend(aliases.into_iter().map(|a| format!("--{a}")));
            }
            let mut flags = parts.join(", ");
            if arg.get_action().takes_values() {
                let value_name = arg
                    .get_value_names()
                    .and_then(|names| names.first())
                    .map(|name| name.as_str())
                    .unwrap_or("VALUE");
                flags.push_str(&format!(" <{value_name}>"));
            }

            out.push_str("  ");
            out.push_str(&flags);
            out.push('\n');
            if let Some(help) = arg.get_help() {
                let help = help.to_string();
                if !help.trim().is_empty() {
                    out.push_str("          ");
                    out.push_str(help.trim());
                    out.push('\n');
                }
            }
        }
        out.push('\n');
    }
    out
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

struct RunConfig {
    options: runner::Options,
    output: Option<String>,
    output_format: OutputFormat,
    no_color: bool,
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let no_color = args.no_color || cfg.no_color.unwrap_or(false);
    let timeout = args.timeout.or(cfg.timeout).unwrap_or(10);
    if timeout == 0 {
        return Err("invalid timeout, expected positive integer".to_string());
    }

    let page_url = args.url.or(cfg.url).filter(|u| !u.trim().is_empty());
    let file = args
        .file
        .or(cfg.file)
        .filter(|f| !f.trim().is_empty())
        .map(|f| config::expand_tilde_string(&f));
    if page_url.is_none() && file.is_none() {
        return Err("a page must be specified (--url or --file)".to_string());
    }

    let sort_order = match args.sort_order.as_deref() {
        Some(raw) => Some(
            SortOrder::parse(raw).ok_or_else(|| format!("invalid --sort-order '{raw}'"))?,
        ),
        None => cfg.sort_order,
    };
    let query = ListingQuery {
        search: args.search.or(cfg.search),
        house: args.house.or(cfg.house),
        role: args.role.or(cfg.role),
        strength: args.strength.or(cfg.strength),
        age_more_than: args.age_more_than.or(cfg.age_more_than),
        age_less_than: args.age_less_than.or(cfg.age_less_than),
        sort_column: args.sort_column.or(cfg.sort_column),
        sort_order,
        page: args.page.or(cfg.page),
    };
    if query.page == Some(0) {
        return Err("invalid page, expected positive integer".to_string());
    }

    let dismiss_delay = args
        .dismiss_delay
        .or(cfg.dismiss_delay_ms)
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_DISMISS_DELAY);
    let wait_dismiss = args.wait_dismiss || cfg.wait_dismiss.unwrap_or(false);
    let discard_stale = !args.keep_stale && cfg.discard_stale.unwrap_or(true);

    let output = args
        .output
        .or(cfg.output)
        .filter(|o| !o.trim().is_empty())
        .map(|o| config::expand_tilde_string(&o));
    let output_format = match args.output_format.or(cfg.output_format) {
        Some(raw) => OutputFormat::parse(&raw)
            .ok_or_else(|| format!("invalid output format '{raw}', expected text, json or html"))?,
        None => output
            .as_deref()
            .and_then(output::infer_format_from_path)
            .unwrap_or(OutputFormat::Text),
    };

    Ok(RunConfig {
        options: runner::Options {
            page_url,
            file,
            query,
            clicks: args.click,
            dismiss_delay,
            wait_dismiss,
            discard_stale,
            timeout_seconds: timeout,
            proxy: args.proxy.or(cfg.proxy).filter(|p| !p.trim().is_empty()),
            header: args.header.or(cfg.header).filter(|h| !h.trim().is_empty()),
            markup: cfg.markup.unwrap_or_default(),
        },
        output,
        output_format,
        no_color,
    })
}

fn print_summary(report: &RunReport) {
    for click in report.clicks.iter() {
        let outcome = match click.outcome {
            "updated" => click.outcome.green(),
            "failed" => click.outcome.red(),
            "stale" => click.outcome.yellow(),
            other => other.normal(),
        };
        let target = click.url.as_deref().unwrap_or("-");
        println!("[{}] {:<10} {}", outcome, click.label, target);
        if let Some(error) = click.error.as_deref() {
            println!("    {}", error.dimmed());
        }
    }
    match report.dismissed {
        Some(n) => println!(":: {n} notification(s) dismissed"),
        None => println!(":: notification timer torn down before firing"),
    }
    println!(
        ":: Completed :: {} updated, {} failed ::",
        report.updated(),
        report.failed()
    );
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }
    // Machine-readable reports on stdout get no banner.
    let report_on_stdout = run.output.is_none() && run.output_format != OutputFormat::Text;
    if !report_on_stdout {
        print_banner();
        format_kv_line(
            "Page",
            run.options
                .file
                .as_deref()
                .or(run.options.page_url.as_deref())
                .unwrap_or("-"),
        );
        format_kv_line("Clicks", &run.options.clicks.join(", "));
        format_kv_line(
            "Dismiss",
            &format!("{}ms", run.options.dismiss_delay.as_millis()),
        );
        format_kv_line("Stale", format_bool(!run.options.discard_stale));
        println!();
    }

    let runner = Runner::new(run.options).map_err(|e| e.to_string())?;
    let report = runner.run().await.map_err(|e| e.to_string())?;

    let rendered = output::render(&report, run.output_format);
    match run.output.as_deref() {
        Some(path) => {
            let mut outfile = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)
                .await
                .map_err(|e| format!("failed to open output file: {e}"))?;
            outfile
                .write_all(&rendered)
                .await
                .map_err(|e| format!("failed to write output file: {e}"))?;
            print_summary(&report);
        }
        None if run.output_format == OutputFormat::Text => print_summary(&report),
        None => {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(&rendered)
                .await
                .map_err(|e| format!("failed to write report: {e}"))?;
            stdout
                .flush()
                .await
                .map_err(|e| format!("failed to write report: {e}"))?;
        }
    }
    Ok(())
}

fn load_user_config(explicit: Option<&str>) -> Result<ConfigFile, String> {
    if let Some(path) = explicit {
        return config::load_config(&config::expand_tilde(path), false);
    }
    let Some(path) = config::default_config_path() else {
        return Ok(ConfigFile::default());
    };
    if let Err(e) = config::ensure_default_config_file(&path) {
        warn!(event = "config.default_not_written", error = %e);
    }
    config::load_config(&path, true)
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp => {
                print!("{}", render_custom_help());
                return Ok(());
            }
            ErrorKind::DisplayVersion => {
                let cmd = CliArgs::command();
                print!("{}", cmd.render_version());
                return Ok(());
            }
            _ => e.exit(),
        },
    };

    crate::logging::init_logging(args.verbose);

    let cfg = load_user_config(args.config.as_deref())?;
    let run = build_run_config(args, cfg)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))
}
