use crate::cli::args::CliArgs;

pub const MAX_DISMISS_DELAY_MS: u64 = 10 * 60 * 1000;

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(raw) = args.sort_order.as_deref() {
        if crate::query::SortOrder::parse(raw).is_none() {
            return Err(format!("invalid --sort-order '{raw}', expected asc or desc"));
        }
    }
    if args.page == Some(0) {
        return Err("invalid page, expected positive integer".to_string());
    }
    if let (Some(min), Some(max)) = (args.age_more_than, args.age_less_than) {
        if min > max {
            return Err(format!(
                "invalid age range, --age-more-than {min} is above --age-less-than {max}"
            ));
        }
    }
    if let Some(delay) = args.dismiss_delay {
        if delay > MAX_DISMISS_DELAY_MS {
            return Err(format!(
                "invalid dismiss-delay {delay}, expected at most {MAX_DISMISS_DELAY_MS} ms"
            ));
        }
    }
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid timeout, expected positive integer".to_string());
        }
    }
    if let Some(raw) = args.output_format.as_deref() {
        if crate::output::OutputFormat::parse(raw).is_none() {
            return Err(format!("invalid --format '{raw}', expected text, json or html"));
        }
    }
    if let Some(raw) = args.header.as_deref() {
        crate::runner::parse_header(raw).map_err(|e| format!("invalid --header '{raw}': {e}"))?;
    }
    if args.click.iter().any(|label| label.trim().is_empty()) {
        return Err("invalid --click, label must not be empty".to_string());
    }
    Ok(())
}
