//! Output formatting for CLI

use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

/// Pretty JSON rendering of `data`
pub fn to_json<T: Serialize>(data: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// Render rows as a table
pub fn to_table<T: Tabled>(rows: &[T]) -> String {
    Table::new(rows).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!(OutputFormat::from("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from("table"), OutputFormat::Table);
        assert_eq!(OutputFormat::from("anything"), OutputFormat::Text);
    }

    #[derive(Tabled, Serialize)]
    struct Row {
        name: String,
        value: String,
    }

    #[test]
    fn test_render() {
        let rows = vec![Row {
            name: "src".into(),
            value: "https://player.example".into(),
        }];
        assert!(to_table(&rows).contains("https://player.example"));
        assert!(to_json(&rows).unwrap().contains(r#""name": "src""#));
    }
}
