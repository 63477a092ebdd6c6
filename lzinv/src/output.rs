use anstyle::{AnsiColor, Color, Style};
use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tabled::{settings::Style as TableStyle, Table, Tabled};

/// Format used to print the records collected
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
  /// Fixed width table
  #[default]
  Table,
  /// Pretty printed JSON array
  Json,
}

/// Render records in the requested format
pub fn render<T>(rows: &[T], format: OutputFormat) -> Result<String>
where
  T: Tabled + Serialize,
{
  match format {
    OutputFormat::Table => {
      let mut table = Table::new(rows);
      table.with(TableStyle::blank());
      Ok(table.to_string())
    }
    OutputFormat::Json => Ok(serde_json::to_string_pretty(rows)?),
  }
}

/// Print records to stdout, with a title when printing a table
pub fn print<T>(title: &str, rows: &[T], format: OutputFormat) -> Result<()>
where
  T: Tabled + Serialize,
{
  if format == OutputFormat::Table {
    println!();
    println!("{title}");
    if rows.is_empty() {
      println!("  (none found)");
      return Ok(());
    }
  }

  println!("{}", render(rows, format)?);
  Ok(())
}

/// Several tables printed by one command
///
/// Tables are printed as they are added; JSON is gathered into a single object keyed by
/// table and printed by [`Report::finish`] so stdout holds one JSON document
#[derive(Debug)]
pub struct Report {
  format: OutputFormat,
  sections: serde_json::Map<String, serde_json::Value>,
}

impl Report {
  pub fn new(format: OutputFormat) -> Self {
    Self {
      format,
      sections: serde_json::Map::new(),
    }
  }

  pub fn add<T>(&mut self, key: &str, title: &str, rows: &[T]) -> Result<()>
  where
    T: Tabled + Serialize,
  {
    match self.format {
      OutputFormat::Table => print(title, rows, self.format),
      OutputFormat::Json => {
        self.sections.insert(key.to_owned(), serde_json::to_value(rows)?);
        Ok(())
      }
    }
  }

  /// The JSON document gathered so far; `None` when printing tables
  pub fn render(&self) -> Result<Option<String>> {
    match self.format {
      OutputFormat::Table => Ok(None),
      OutputFormat::Json => Ok(Some(serde_json::to_string_pretty(&self.sections)?)),
    }
  }

  pub fn finish(self) -> Result<()> {
    if let Some(document) = self.render()? {
      println!("{document}");
    }
    Ok(())
  }
}

/// Print a summary line, green when things are fine and red when they are not
///
/// Summaries are suppressed when printing JSON so stdout stays machine readable
pub fn summary(ok: bool, text: &str, format: OutputFormat, color: bool) {
  if format == OutputFormat::Table {
    println!("{}", paint(ok, text, color));
  }
}

/// Wrap text in green (ok) or red ANSI styling
pub fn paint(ok: bool, text: &str, color: bool) -> String {
  if !color {
    return text.to_string();
  }

  let fg = match ok {
    true => AnsiColor::Green,
    false => AnsiColor::Red,
  };
  let style = Style::new().fg_color(Some(Color::Ansi(fg)));

  format!("{}{text}{}", style.render(), style.render_reset())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Serialize, Tabled)]
  struct Row {
    #[tabled(rename = "Account")]
    account_id: String,
    #[tabled(rename = "Region")]
    region: String,
  }

  fn rows() -> Vec<Row> {
    vec![
      Row {
        account_id: "111111111111".to_string(),
        region: "us-east-1".to_string(),
      },
      Row {
        account_id: "222222222222".to_string(),
        region: "eu-west-1".to_string(),
      },
    ]
  }

  #[test]
  fn it_renders_table_with_headings() {
    let out = render(&rows(), OutputFormat::Table).unwrap();
    let mut lines = out.lines();

    let header = lines.next().unwrap();
    assert!(header.contains("Account"));
    assert!(header.contains("Region"));
    assert!(out.contains("222222222222"));
    assert!(out.contains("eu-west-1"));
  }

  #[test]
  fn it_renders_json() {
    let out = render(&rows(), OutputFormat::Json).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();

    assert_eq!(parsed.as_array().unwrap().len(), 2);
    assert_eq!(parsed[0]["account_id"], "111111111111");
  }

  #[test]
  fn it_gathers_json_sections_into_one_document() {
    let mut report = Report::new(OutputFormat::Json);
    report.add("recorders", "Configuration recorders", &rows()).unwrap();
    report.add("channels", "Delivery channels", &Vec::<Row>::new()).unwrap();

    let out = report.render().unwrap().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();

    assert_eq!(parsed["recorders"].as_array().unwrap().len(), 2);
    assert_eq!(parsed["recorders"][1]["region"], "eu-west-1");
    assert!(parsed["channels"].as_array().unwrap().is_empty());
  }

  #[test]
  fn table_report_has_no_document() {
    let report = Report::new(OutputFormat::Table);
    assert!(report.render().unwrap().is_none());
  }

  #[test]
  fn it_paints_only_with_color() {
    assert_eq!(paint(true, "ok", false), "ok");

    let painted = paint(false, "bad", true);
    assert!(painted.contains("bad"));
    assert!(painted.starts_with("\u{1b}["));
  }
}
