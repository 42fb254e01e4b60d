use colored::*;
use unicode_width::UnicodeWidthStr;

/// A bordered text table with a heavy header rule.
///
/// ```text
/// ┏━━━━━━━━━━━━━━┳━━━━━━━━━┓
/// ┃ Cluster Name ┃ Current ┃
/// ┡━━━━━━━━━━━━━━╇━━━━━━━━━┩
/// │ prod         │ *       │
/// └──────────────┴─────────┘
/// ```
#[derive(Debug, Clone)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    styled: bool,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            styled: true,
        }
    }

    /// Disable header colouring.
    pub fn plain(mut self) -> Self {
        self.styled = false;
        self
    }

    /// Rows shorter than the header are padded with empty cells; extra
    /// cells are dropped.
    pub fn add_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut row: Vec<String> = cells
            .into_iter()
            .take(self.headers.len())
            .map(Into::into)
            .collect();
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    fn column_widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                self.rows
                    .iter()
                    .map(|row| row[i].width())
                    .chain(std::iter::once(header.width()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    pub fn render(&self) -> String {
        let widths = self.column_widths();
        let mut out = String::new();

        out.push_str(&rule(&widths, '┏', '━', '┳', '┓'));
        out.push('┃');
        for (header, width) in self.headers.iter().zip(&widths) {
            let padded = pad(header, *width);
            if self.styled {
                out.push_str(&format!(" {} ┃", padded.magenta().bold()));
            } else {
                out.push_str(&format!(" {} ┃", padded));
            }
        }
        out.push('\n');
        out.push_str(&rule(&widths, '┡', '━', '╇', '┩'));

        for row in &self.rows {
            out.push('│');
            for (cell, width) in row.iter().zip(&widths) {
                out.push_str(&format!(" {} │", pad(cell, *width)));
            }
            out.push('\n');
        }

        out.push_str(&rule(&widths, '└', '─', '┴', '┘'));
        out
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(text.width());
    format!("{}{}", text, " ".repeat(fill))
}

fn rule(widths: &[usize], left: char, line: char, join: char, right: char) -> String {
    let segments: Vec<String> = widths
        .iter()
        .map(|w| line.to_string().repeat(w + 2))
        .collect();
    format!("{}{}{}\n", left, segments.join(&join.to_string()), right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_clusters_table() {
        let mut table = Table::new(["Cluster Name", "Current"]).plain();
        table.add_row(["prod", "*"]);
        table.add_row(["staging-long-name", ""]);

        let expected = "\
┏━━━━━━━━━━━━━━━━━━━┳━━━━━━━━━┓
┃ Cluster Name      ┃ Current ┃
┡━━━━━━━━━━━━━━━━━━━╇━━━━━━━━━┩
│ prod              │ *       │
│ staging-long-name │         │
└───────────────────┴─────────┘
";
        assert_eq!(table.render(), expected);
    }

    #[test]
    fn test_empty_table_renders_headers() {
        let table = Table::new(["Name"]).plain();
        assert_eq!(
            table.render(),
            "┏━━━━━━┓\n┃ Name ┃\n┡━━━━━━┩\n└──────┘\n"
        );
    }

    #[test]
    fn test_short_rows_are_padded() {
        let mut table = Table::new(["A", "B"]).plain();
        table.add_row(["x"]);
        assert!(table.render().contains("│ x │   │"));
    }

    #[test]
    fn test_wide_characters_align() {
        let mut table = Table::new(["Name"]).plain();
        table.add_row(["日本"]);
        let rendered = table.render();
        assert!(rendered.contains("│ 日本 │"));
        assert!(rendered.starts_with("┏━━━━━━┓"));
    }
}
