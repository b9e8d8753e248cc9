use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::pagination::Markup;
use crate::query::SortOrder;

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub file: Option<String>,
    pub timeout: Option<usize>,
    pub proxy: Option<String>,
    pub header: Option<String>,
    pub dismiss_delay_ms: Option<u64>,
    pub wait_dismiss: Option<bool>,
    pub discard_stale: Option<bool>,
    pub output: Option<String>,
    pub output_format: Option<String>,
    pub no_color: Option<bool>,
    pub markup: Option<Markup>,
    pub search: Option<String>,
    pub house: Option<String>,
    pub role: Option<String>,
    pub strength: Option<String>,
    pub age_more_than: Option<u32>,
    pub age_less_than: Option<u32>,
    pub sort_column: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<u32>,
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(home_dir()?.join(".pagesplice").join("config.yml"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn expand_tilde_string(path: &str) -> String {
    expand_tilde(path).to_string_lossy().to_string()
}

pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_config(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

pub fn parse_config(contents: &str) -> Result<ConfigFile, serde_yaml::Error> {
    // An all-comments file deserializes as null.
    if contents.lines().all(|l| {
        let l = l.trim();
        l.is_empty() || l.starts_with('#')
    }) {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str::<ConfigFile>(contents)
}

fn default_config_yaml() -> String {
    r#"# pagesplice config
#
# Location (default):
#   ~/.pagesplice/config.yml

# Page to load (choose one; file still uses url as the base for relative links)
# url: http://localhost:5000/user/characters
# file: ./characters.html

# Output (optional)
# output: ./report.json
# output_format: json

# HTTP
timeout: 10
# proxy: http://127.0.0.1:8080
# header: "Cookie: session=..."

# Notifications
dismiss_delay_ms: 2000
wait_dismiss: false

# Pagination
discard_stale: true

# Listing query (optional)
# search: stark
# house: Stark
# role: "1"
# strength: "2"
# age_more_than: 16
# age_less_than: 40
# sort_column: name
# sort_order: asc
# page: 1

# Markup contract with the server templates
markup:
  success_class: alert-success
  pagination_class: pagination
  page_item_class: page-item
  page_link_class: page-link
  disabled_class: disabled
  previous_label: Previous
  next_label: Next
  table_source_id: character-table
  table_target_id: character-table-container
  pagination_id: pagination-container-characters

# Output styling
no_color: false
"#
    .to_string()
}

pub fn ensure_default_config_file(path: &PathBuf) -> Result<(), String> {
    if path.exists() {
        return Ok(());
    }
    let parent = path
        .parent()
        .ok_or_else(|| format!("invalid config path '{}'", path.display()))?;
    std::fs::create_dir_all(parent).map_err(|e| {
        format!(
            "failed to create config directory '{}': {e}",
            parent.display()
        )
    })?;
    let contents = default_config_yaml();
    std::fs::write(path, contents)
        .map_err(|e| format!("failed to write config file '{}': {e}", path.display()))?;
    Ok(())
}
