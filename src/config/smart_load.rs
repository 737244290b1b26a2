use figment::providers::{Format, Json, Toml, Yaml};
use std::path::Path;

/// Pick a figment provider from the file extension.
///
/// Unknown extensions are sniffed from content; unreadable files fall back to TOML,
/// which figment treats as an empty source when the file is missing.
pub fn auto<P: AsRef<Path>>(path: P) -> impl figment::Provider {
    let path = path.as_ref();
    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

    match extension.to_lowercase().as_str() {
        "toml" => SmartProvider::Toml(Toml::file(path)),
        "json" => SmartProvider::Json(Json::file(path)),
        "yaml" | "yml" => SmartProvider::Yaml(Yaml::file(path)),
        _ => match std::fs::read_to_string(path)
            .ok()
            .and_then(|content| detect_format_from_content(&content))
        {
            Some(ConfigFormat::Json) => SmartProvider::Json(Json::file(path)),
            Some(ConfigFormat::Yaml) => SmartProvider::Yaml(Yaml::file(path)),
            _ => {
                tracing::debug!("Treating {} as TOML", path.display());
                SmartProvider::Toml(Toml::file(path))
            }
        },
    }
}

#[derive(Debug, PartialEq)]
enum ConfigFormat {
    Toml,
    Json,
    Yaml,
}

enum SmartProvider {
    Toml(figment::providers::Data<Toml>),
    Json(figment::providers::Data<Json>),
    Yaml(figment::providers::Data<Yaml>),
}

impl figment::Provider for SmartProvider {
    fn metadata(&self) -> figment::Metadata {
        match self {
            SmartProvider::Toml(p) => p.metadata(),
            SmartProvider::Json(p) => p.metadata(),
            SmartProvider::Yaml(p) => p.metadata(),
        }
    }

    fn data(
        &self,
    ) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        match self {
            SmartProvider::Toml(p) => p.data(),
            SmartProvider::Json(p) => p.data(),
            SmartProvider::Yaml(p) => p.data(),
        }
    }
}

fn detect_format_from_content(content: &str) -> Option<ConfigFormat> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('{') {
        return Some(ConfigFormat::Json);
    }
    if trimmed.lines().any(|line| line.trim_start().starts_with('[')) {
        return Some(ConfigFormat::Toml);
    }
    if trimmed
        .lines()
        .any(|line| line.contains(": ") || line.trim_end().ends_with(':'))
    {
        return Some(ConfigFormat::Yaml);
    }
    None
}
