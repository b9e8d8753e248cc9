use crate::runner::RunReport;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    /// The final document after every click was applied.
    Html,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            "html" | "htm" => Some(Self::Html),
            _ => None,
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".html") || lower.ends_with(".htm") {
        return Some(OutputFormat::Html);
    }
    if lower.ends_with(".txt") {
        return Some(OutputFormat::Text);
    }
    None
}

pub fn render(report: &RunReport, format: OutputFormat) -> Vec<u8> {
    match format {
        OutputFormat::Text => render_text(report),
        OutputFormat::Json => render_json(report),
        OutputFormat::Html => render_html(report),
    }
}

pub fn render_text(report: &RunReport) -> Vec<u8> {
    let mut out = String::new();
    out.push_str(&format!("source: {}\n", report.source));
    match report.dismissed {
        Some(n) => out.push_str(&format!("dismissed: {n}\n")),
        None => out.push_str("dismissed: pending\n"),
    }
    for click in report.clicks.iter() {
        out.push_str(&format!("click {:?}: {}", click.label, click.outcome));
        if let Some(url) = click.url.as_deref() {
            out.push_str(&format!(" {url}"));
        }
        if let Some(error) = click.error.as_deref() {
            out.push_str(&format!(" ({error})"));
        }
        out.push('\n');
    }
    for entry in report.console.iter() {
        out.push_str(&format!("console.{}: {}\n", entry.level.as_str(), entry.message));
    }
    if let Some(table) = report.table_html.as_deref() {
        out.push_str("\n-- table --\n");
        out.push_str(table.trim());
        out.push('\n');
    }
    if let Some(pagination) = report.pagination_html.as_deref() {
        out.push_str("\n-- pagination --\n");
        out.push_str(pagination.trim());
        out.push('\n');
    }
    out.into_bytes()
}

pub fn render_json(report: &RunReport) -> Vec<u8> {
    serde_json::to_vec_pretty(report).unwrap_or_else(|_| b"{}\n".to_vec())
}

pub fn render_html(report: &RunReport) -> Vec<u8> {
    report.document.clone().into_bytes()
}
