use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pagesplice",
    version,
    about = "headless pagination splicing for server-rendered listings",
    long_about = "pagesplice loads a server-rendered character listing, dismisses its success banners and follows pagination controls the way the page's own scripts do: by requesting fragments with the AJAX header and splicing the table and pagination regions in place.\n\nExamples:\n  pagesplice -u http://localhost:5000/user/characters -k Next\n  pagesplice -u http://localhost:5000/user/characters --house Stark -k 2 -k Next --format json\n  pagesplice --file ./characters.html -u http://localhost:5000/user/characters -k 3\n\nTip: Use --config to persist the markup contract and session header."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase log verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        long = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write the report to a file instead of stdout."
    )]
    pub output: Option<String>,

    #[arg(
        long = "format",
        visible_alias = "output-format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Report format: text, json or html (defaults to the output file extension, else text)."
    )]
    pub output_format: Option<String>,

    #[arg(
        short = 'u',
        long = "url",
        value_name = "URL",
        help_heading = "Input",
        help = "Listing page to load; also the base for relative pagination links."
    )]
    pub url: Option<String>,

    #[arg(
        long = "file",
        value_name = "FILE",
        help_heading = "Input",
        help = "Load the page HTML from a file instead of requesting --url."
    )]
    pub file: Option<String>,

    #[arg(
        short = 'C',
        long = "config",
        value_name = "FILE",
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.pagesplice/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(long = "search", value_name = "TEXT", help_heading = "Listing")]
    pub search: Option<String>,

    #[arg(long = "house", value_name = "NAME", help_heading = "Listing")]
    pub house: Option<String>,

    #[arg(long = "role", value_name = "ID", help_heading = "Listing")]
    pub role: Option<String>,

    #[arg(long = "strength", value_name = "ID", help_heading = "Listing")]
    pub strength: Option<String>,

    #[arg(long = "age-more-than", value_name = "AGE", help_heading = "Listing")]
    pub age_more_than: Option<u32>,

    #[arg(long = "age-less-than", value_name = "AGE", help_heading = "Listing")]
    pub age_less_than: Option<u32>,

    #[arg(
        long = "sort-column",
        value_name = "COLUMN",
        help_heading = "Listing",
        help = "Column to sort by (server default: name)."
    )]
    pub sort_column: Option<String>,

    #[arg(
        long = "sort-order",
        value_name = "ORDER",
        help_heading = "Listing",
        help = "asc or desc."
    )]
    pub sort_order: Option<String>,

    #[arg(
        short = 'p',
        long = "page",
        value_name = "N",
        help_heading = "Listing",
        help = "Initial page number (1-based)."
    )]
    pub page: Option<u32>,

    #[arg(
        short = 'k',
        long = "click",
        value_name = "LABEL",
        action = ArgAction::Append,
        help_heading = "Navigation",
        help = "Click the pagination control with this label, e.g. 3, Next, Previous (repeatable, applied in order)."
    )]
    pub click: Vec<String>,

    #[arg(
        long = "keep-stale",
        help_heading = "Navigation",
        help = "Apply responses in arrival order even when a newer click has been issued."
    )]
    pub keep_stale: bool,

    #[arg(
        long = "dismiss-delay",
        value_name = "MS",
        help_heading = "Notifications",
        help = "Delay before success banners are hidden (default 2000)."
    )]
    pub dismiss_delay: Option<u64>,

    #[arg(
        long = "wait-dismiss",
        help_heading = "Notifications",
        help = "Wait for the banner timer before reporting instead of tearing the page down."
    )]
    pub wait_dismiss: bool,

    #[arg(
        long = "timeout",
        value_name = "SECS",
        help_heading = "HTTP",
        help = "Request timeout in seconds."
    )]
    pub timeout: Option<usize>,

    #[arg(
        long = "proxy",
        value_name = "URL",
        help_heading = "HTTP",
        help = "HTTP proxy to use for requests."
    )]
    pub proxy: Option<String>,

    #[arg(
        short = 'H',
        long = "header",
        value_name = "HEADER",
        help_heading = "HTTP",
        help = "Extra request header, e.g. \"Cookie: session=...\"."
    )]
    pub header: Option<String>,
}
