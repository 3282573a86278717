//! Grouping positioned glyphs into words and lines, and rendering page text.

use super::{PageLayout, TextChar};

/// Tuning for glyph grouping.
#[derive(Debug, Clone, Copy)]
pub struct LayoutOptions {
    /// Horizontal gap, as a fraction of font size, that starts a new word.
    pub word_gap_ratio: f64,
    /// Baselines within this distance (points) share a line.
    pub y_tolerance: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            word_gap_ratio: 0.15,
            y_tolerance: 3.0,
        }
    }
}

/// A run of glyphs without internal whitespace.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    pub x0: f64,
    pub x1: f64,
    pub top: f64,
    pub bottom: f64,
    pub size: f64,
}

impl Word {
    fn from_chars(chars: &[&TextChar]) -> Option<Self> {
        let first = chars.first()?;
        let mut word = Word {
            text: String::new(),
            x0: first.x0,
            x1: first.x1,
            top: first.top,
            bottom: first.bottom,
            size: first.size,
        };
        for c in chars {
            word.text.push_str(&c.text);
            word.x0 = word.x0.min(c.x0);
            word.x1 = word.x1.max(c.x1);
            word.top = word.top.min(c.top);
            word.bottom = word.bottom.max(c.bottom);
            word.size = word.size.max(c.size);
        }
        Some(word)
    }

    /// Horizontal center.
    pub fn center_x(&self) -> f64 {
        (self.x0 + self.x1) / 2.0
    }

    /// Vertical center.
    pub fn center_y(&self) -> f64 {
        (self.top + self.bottom) / 2.0
    }
}

/// Words sharing a baseline, left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub words: Vec<Word>,
    pub top: f64,
    pub bottom: f64,
}

impl TextLine {
    /// Words joined by single spaces.
    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn x0(&self) -> f64 {
        self.words.first().map(|w| w.x0).unwrap_or(0.0)
    }

    pub fn x1(&self) -> f64 {
        self.words.iter().map(|w| w.x1).fold(0.0, f64::max)
    }

    /// Largest font size on the line.
    pub fn size(&self) -> f64 {
        self.words.iter().map(|w| w.size).fold(0.0, f64::max)
    }

    pub fn height(&self) -> f64 {
        (self.bottom - self.top).max(self.size())
    }
}

/// Group the page's glyphs into lines of words, top to bottom.
pub fn text_lines(layout: &PageLayout, options: &LayoutOptions) -> Vec<TextLine> {
    let mut chars: Vec<&TextChar> = layout.chars.iter().collect();
    chars.sort_by(|a, b| a.bottom.total_cmp(&b.bottom).then(a.x0.total_cmp(&b.x0)));

    let mut rows: Vec<Vec<&TextChar>> = Vec::new();
    let mut row_bottom = f64::NEG_INFINITY;
    for c in chars {
        match rows.last_mut() {
            Some(row) if (c.bottom - row_bottom).abs() <= options.y_tolerance => row.push(c),
            _ => {
                row_bottom = c.bottom;
                rows.push(vec![c]);
            }
        }
    }

    rows.into_iter()
        .filter_map(|mut row| {
            row.sort_by(|a, b| a.x0.total_cmp(&b.x0));
            let words = split_words(&row, options.word_gap_ratio);
            if words.is_empty() {
                return None;
            }
            let top = words.iter().map(|w| w.top).fold(f64::INFINITY, f64::min);
            let bottom = words.iter().map(|w| w.bottom).fold(f64::NEG_INFINITY, f64::max);
            Some(TextLine { words, top, bottom })
        })
        .collect()
}

fn split_words(row: &[&TextChar], gap_ratio: f64) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current: Vec<&TextChar> = Vec::new();

    for c in row {
        if c.is_blank() {
            words.extend(Word::from_chars(&current));
            current.clear();
            continue;
        }
        if let Some(prev) = current.last() {
            if c.x0 - prev.x1 > gap_ratio * c.size.max(prev.size) {
                words.extend(Word::from_chars(&current));
                current.clear();
            }
        }
        current.push(c);
    }
    words.extend(Word::from_chars(&current));
    words
}

/// Plain reading-order text: words joined by spaces, lines by newlines.
pub fn plain_text(lines: &[TextLine]) -> String {
    lines
        .iter()
        .map(TextLine::text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text that approximates the visual layout, so columns stay aligned.
pub fn layout_text(lines: &[TextLine]) -> String {
    let char_width = typical_char_width(lines);
    let line_height = median(lines.iter().map(TextLine::height).collect()).unwrap_or(10.0);

    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut prev_bottom: Option<f64> = None;

    for line in lines {
        if let Some(prev) = prev_bottom {
            let gap = line.bottom - prev;
            let blanks = ((gap / line_height) - 1.0).round().clamp(0.0, 2.0) as usize;
            out.extend(std::iter::repeat_n(String::new(), blanks));
        }
        prev_bottom = Some(line.bottom);

        let mut rendered = String::new();
        for word in &line.words {
            let column = (word.x0 / char_width).round().max(0.0) as usize;
            let len = rendered.chars().count();
            if column > len {
                rendered.push_str(&" ".repeat(column - len));
            } else if len > 0 {
                rendered.push(' ');
            }
            rendered.push_str(&word.text);
        }
        out.push(rendered);
    }

    out.join("\n")
}

fn typical_char_width(lines: &[TextLine]) -> f64 {
    let widths: Vec<f64> = lines
        .iter()
        .flat_map(|l| &l.words)
        .filter_map(|w| {
            let n = w.text.chars().count();
            (n > 0 && w.x1 > w.x0).then(|| (w.x1 - w.x0) / n as f64)
        })
        .collect();
    median(widths).filter(|w| *w > 0.5).unwrap_or(5.0)
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    Some(values[values.len() / 2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Lay out `text` at a fixed 5pt advance starting at `x`.
    fn run(text: &str, x: f64, baseline: f64) -> Vec<TextChar> {
        text.chars()
            .enumerate()
            .map(|(i, ch)| TextChar {
                text: ch.to_string(),
                x0: x + i as f64 * 5.0,
                x1: x + (i + 1) as f64 * 5.0,
                top: baseline - 10.0,
                bottom: baseline,
                size: 10.0,
            })
            .collect()
    }

    fn page(runs: Vec<Vec<TextChar>>) -> PageLayout {
        PageLayout {
            page: 1,
            width: 612.0,
            height: 792.0,
            chars: runs.into_iter().flatten().collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_words_and_lines() {
        let layout = page(vec![
            run("Net Income", 50.0, 100.0),
            run("1,234", 300.0, 101.0),
            run("Total", 50.0, 120.0),
        ]);
        let lines = text_lines(&layout, &LayoutOptions::default());

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "Net Income 1,234");
        assert_eq!(lines[0].words.len(), 3);
        assert_eq!(lines[0].words[2].x0, 300.0);
        assert_eq!(lines[1].text(), "Total");
    }

    #[test]
    fn test_gap_splits_words() {
        // No blank glyph between, but a 20pt gap.
        let layout = page(vec![run("100", 50.0, 100.0), run("200", 85.0, 100.0)]);
        let lines = text_lines(&layout, &LayoutOptions::default());
        assert_eq!(lines[0].words.len(), 2);
    }

    #[test]
    fn test_plain_and_layout_text() {
        let layout = page(vec![
            run("Revenue", 0.0, 100.0),
            run("500", 100.0, 100.0),
            run("Costs", 0.0, 112.0),
            run("20", 105.0, 112.0),
            run("Note", 0.0, 160.0),
        ]);
        let lines = text_lines(&layout, &LayoutOptions::default());

        assert_eq!(plain_text(&lines), "Revenue 500\nCosts 20\nNote");

        let text = layout_text(&lines);
        let rendered: Vec<&str> = text.lines().collect();
        assert_eq!(rendered[0], format!("Revenue{}500", " ".repeat(13)));
        assert_eq!(rendered[1], format!("Costs{}20", " ".repeat(16)));
        // 48pt gap collapses to at most two blank lines.
        assert_eq!(rendered[2], "");
        assert_eq!(rendered[3], "");
        assert_eq!(rendered[4], "Note");
    }
}
