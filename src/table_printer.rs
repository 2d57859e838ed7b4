//! Box drawn text tables for the command line tools.

use std::fmt::Display;

use unicode_width::UnicodeWidthStr;

/// Collects columns of values and renders them as a table.
#[derive(Default, Debug)]
pub struct TablePrinter {
    title: Option<String>,
    header: Option<String>,
    footer: Option<String>,
    column_names: Vec<String>,
    columns: Vec<Vec<String>>,
    fill: String,
}

impl TablePrinter {
    /// An empty table.
    pub fn new() -> Self {
        TablePrinter::default()
    }

    /// Centered title above everything else.
    pub fn with_title<T: Into<String>>(self, title: T) -> Self {
        TablePrinter {
            title: Some(title.into()),
            ..self
        }
    }

    /// Text between the title and the column names, wrapped to the table width.
    pub fn with_header<T: Into<String>>(self, header: T) -> Self {
        TablePrinter {
            header: Some(header.into()),
            ..self
        }
    }

    /// Text below the rows, wrapped to the table width.
    pub fn with_footer<T: Into<String>>(self, footer: T) -> Self {
        TablePrinter {
            footer: Some(footer.into()),
            ..self
        }
    }

    /// Printed in place of values missing from shorter columns.
    pub fn with_fill<T: AsRef<str>>(self, fill: T) -> Self {
        TablePrinter {
            fill: fill.as_ref().to_owned(),
            ..self
        }
    }

    /// Add a column.
    pub fn with_column<T, V>(mut self, col_name: T, col_vals: &[V]) -> Self
    where
        T: Display,
        V: Display,
    {
        self.column_names.push(col_name.to_string());
        self.columns
            .push(col_vals.iter().map(|v| v.to_string()).collect());
        self
    }

    /// Render the table.
    pub fn render(&self) -> String {
        let col_widths: Vec<usize> = self
            .column_names
            .iter()
            .zip(&self.columns)
            .map(|(name, vals)| {
                vals.iter()
                    .map(|v| v.width())
                    .chain(Some(name.width()))
                    .chain(Some(self.fill.width()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let cols_width = col_widths.iter().sum::<usize>() + col_widths.len().saturating_sub(1);
        let table_width = self
            .title
            .as_ref()
            .map(|t| t.width())
            .unwrap_or(0)
            .max(cols_width);

        let mut out = String::new();

        let (mut left, mut right) = ('\u{250c}', '\u{2510}');
        if let Some(ref title) = self.title {
            out += &format!("{}{}{}\n", left, "\u{2500}".repeat(table_width), right);
            out += &format!("\u{2502}{}\u{2502}\n", center(title, table_width));
            left = '\u{251c}';
            right = '\u{2524}';
        }

        if let Some(ref header) = self.header {
            out += &format!("{}{}{}\n", left, "\u{2500}".repeat(table_width), right);
            for line in wrap(header, table_width) {
                out += &format!("\u{2502}{}\u{2502}\n", pad_right(&line, table_width));
            }
            left = '\u{251c}';
            right = '\u{2524}';
        }

        if col_widths.is_empty() {
            return out;
        }

        // Column widths padded to fill a wide title.
        let mut col_widths = col_widths;
        if let Some(last) = col_widths.last_mut() {
            *last += table_width - cols_width;
        }

        out += &rule(left, '\u{252c}', right, &col_widths);
        for (name, &width) in self.column_names.iter().zip(&col_widths) {
            out += &format!("\u{2502}{}", center(name, width));
        }
        out += "\u{2502}\n";
        out += &rule('\u{251c}', '\u{253c}', '\u{2524}', &col_widths);

        let n_rows = self.columns.iter().map(Vec::len).max().unwrap_or(0);
        for row in 0..n_rows {
            for (col, &width) in self.columns.iter().zip(&col_widths) {
                let val = col.get(row).unwrap_or(&self.fill);
                out += &format!("\u{2502}{}", pad_left(val, width));
            }
            out += "\u{2502}\n";
        }

        match self.footer {
            Some(ref footer) => {
                out += &rule('\u{251c}', '\u{2534}', '\u{2524}', &col_widths);
                for line in wrap(footer, table_width) {
                    out += &format!("\u{2502}{}\u{2502}\n", pad_right(&line, table_width));
                }
                out += &format!("\u{2514}{}\u{2518}\n", "\u{2500}".repeat(table_width));
            }
            None => out += &rule('\u{2514}', '\u{2534}', '\u{2518}', &col_widths),
        }

        out
    }

    /// Print the table to stdout.
    pub fn print(&self) {
        println!("\n{}", self.render());
    }
}

fn rule(left: char, sep: char, right: char, widths: &[usize]) -> String {
    let segments: Vec<String> = widths.iter().map(|&w| "\u{2500}".repeat(w)).collect();
    format!("{}{}{}\n", left, segments.join(&sep.to_string()), right)
}

fn center(text: &str, width: usize) -> String {
    let extra = width.saturating_sub(text.width());
    format!("{}{}{}", " ".repeat(extra / 2), text, " ".repeat(extra - extra / 2))
}

fn pad_left(text: &str, width: usize) -> String {
    format!("{}{}", " ".repeat(width.saturating_sub(text.width())), text)
}

fn pad_right(text: &str, width: usize) -> String {
    format!("{}{}", text, " ".repeat(width.saturating_sub(text.width())))
}

// Break on whitespace so no line is wider than the table.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = vec![];

    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            if !line.is_empty() && line.width() + 1 + word.width() > width {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        lines.push(line);
    }

    lines
}

#[cfg(test)]
mod unit {
    use super::*;

    #[test]
    fn test_render_columns() {
        let table = TablePrinter::new()
            .with_title("Satellites")
            .with_column("short", &["j3", "3a"])
            .with_column("long", &["Jason-3", "Sentinel-3A"])
            .render();

        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 8);
        assert!(lines[1].contains("Satellites"));
        assert!(lines[3].contains("short"));
        assert!(lines[6].ends_with("Sentinel-3A\u{2502}"));

        let widths: Vec<usize> = lines.iter().map(|l| l.width()).collect();
        assert!(widths.iter().all(|&w| w == widths[0]));
    }

    #[test]
    fn test_fill_and_footer() {
        let table = TablePrinter::new()
            .with_fill("-")
            .with_footer("Counts from the service, which may lag behind by a day or so.")
            .with_column("date", &["2021-01-01", "2021-01-02"])
            .with_column("count", &[7])
            .render();

        assert!(table.contains("\u{2502}    -\u{2502}"));
        assert!(table.contains("Counts"));

        let widths: Vec<usize> = table.lines().map(|l| l.width()).collect();
        assert!(widths.iter().all(|&w| w == widths[0]));
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("a bb ccc", 4), vec!["a bb", "ccc"]);
        assert_eq!(wrap("one\ntwo", 10), vec!["one", "two"]);
    }
}
