use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

pub const CODE_BLOCK_STYLE: Style = Style::new().fg(Color::White).bg(Color::Black);
pub const INLINE_CODE_STYLE: Style = Style::new().fg(Color::LightYellow).bg(Color::DarkGray);
const GUTTER_STYLE: Style = Style::new().fg(Color::DarkGray).bg(Color::Black);
const MUTED_STYLE: Style = Style::new().fg(Color::DarkGray);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(String),
    Heading { level: u8, text: String },
    ListItem { marker: String, text: String },
    Quote(String),
    CodeBlock { lang: Option<String>, code: String },
    Table { header: Vec<String>, rows: Vec<Vec<String>> },
    Rule,
    Blank,
}

/// Render message markup. Fenced code is never inline-parsed.
pub fn render_markdown(text: &str) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for block in parse_blocks(text) {
        render_block(block, &mut lines);
    }
    lines
}

pub fn parse_blocks(text: &str) -> Vec<Block> {
    let lines: Vec<&str> = text.lines().collect();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim_start();

        if let Some(fence) = fence_marker(trimmed) {
            let info = trimmed[fence.len()..].trim();
            let lang = if info.is_empty() { None } else { Some(info.to_string()) };

            let mut code = Vec::new();
            i += 1;
            while i < lines.len() && !closes_fence(lines[i], fence) {
                code.push(lines[i]);
                i += 1;
            }
            // Step over the closing fence; an unclosed fence runs to the end.
            i += 1;

            blocks.push(Block::CodeBlock {
                lang,
                code: code.join("\n"),
            });
            continue;
        }

        if trimmed.contains('|') && i + 1 < lines.len() && is_delimiter_row(lines[i + 1], line) {
            let header = split_row(line);
            let mut rows = Vec::new();
            i += 2;
            while i < lines.len() && lines[i].contains('|') && !lines[i].trim().is_empty() {
                rows.push(split_row(lines[i]));
                i += 1;
            }
            blocks.push(Block::Table { header, rows });
            continue;
        }

        blocks.push(parse_line_block(trimmed));
        i += 1;
    }

    blocks
}

fn parse_line_block(trimmed: &str) -> Block {
    if trimmed.is_empty() {
        return Block::Blank;
    }

    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&hashes) {
        let rest = &trimmed[hashes..];
        if rest.is_empty() || rest.starts_with(' ') {
            return Block::Heading {
                level: hashes as u8,
                text: rest.trim().trim_end_matches('#').trim_end().to_string(),
            };
        }
    }

    if is_rule(trimmed) {
        return Block::Rule;
    }

    for bullet in ["- ", "* ", "+ "] {
        if let Some(text) = trimmed.strip_prefix(bullet) {
            return Block::ListItem {
                marker: "•".to_string(),
                text: text.to_string(),
            };
        }
    }

    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &trimmed[digits..];
        if let Some(text) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return Block::ListItem {
                marker: format!("{}.", &trimmed[..digits]),
                text: text.to_string(),
            };
        }
    }

    if let Some(text) = trimmed.strip_prefix('>') {
        return Block::Quote(text.trim_start().to_string());
    }

    Block::Paragraph(trimmed.to_string())
}

/// Opening fence: three or more backticks or tildes.
fn fence_marker(trimmed: &str) -> Option<&str> {
    let first = trimmed.chars().next()?;
    if first != '`' && first != '~' {
        return None;
    }
    let len = trimmed.chars().take_while(|c| *c == first).count();
    if len < 3 {
        return None;
    }
    Some(&trimmed[..len])
}

fn closes_fence(line: &str, fence: &str) -> bool {
    let trimmed = line.trim();
    let Some(fence_char) = fence.chars().next() else {
        return false;
    };
    trimmed.len() >= fence.len() && trimmed.chars().all(|c| c == fence_char)
}

fn is_rule(trimmed: &str) -> bool {
    let compact: Vec<char> = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && matches!(compact[0], '-' | '*' | '_')
        && compact.iter().all(|c| *c == compact[0])
}

fn split_row(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|cell| cell.trim().to_string()).collect()
}

/// A GFM delimiter row (`---|:---:`) with one cell per header cell.
fn is_delimiter_row(line: &str, header: &str) -> bool {
    if !line.contains('|') && !header.trim_start().starts_with('|') {
        return false;
    }
    let cells = split_row(line);
    cells.len() == split_row(header).len()
        && cells.iter().all(|cell| {
            let body = cell.trim_start_matches(':').trim_end_matches(':');
            !body.is_empty() && body.chars().all(|c| c == '-')
        })
}

fn render_block(block: Block, lines: &mut Vec<Line<'static>>) {
    match block {
        Block::Paragraph(text) => lines.push(parse_inline(&text)),
        Block::Heading { level, text } => {
            let mut style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
            if level == 1 {
                style = style.add_modifier(Modifier::UNDERLINED);
            }
            lines.push(Line::from(inline_spans(&text, style)));
        }
        Block::ListItem { marker, text } => {
            let mut spans = vec![Span::raw(format!("  {} ", marker))];
            spans.extend(inline_spans(&text, Style::default()));
            lines.push(Line::from(spans));
        }
        Block::Quote(text) => {
            let style = MUTED_STYLE.add_modifier(Modifier::ITALIC);
            let mut spans = vec![Span::styled("▎ ", MUTED_STYLE)];
            spans.extend(inline_spans(&text, style));
            lines.push(Line::from(spans));
        }
        Block::CodeBlock { lang, code } => {
            if let Some(lang) = lang {
                lines.push(Line::from(Span::styled(format!("╭─ {}", lang), GUTTER_STYLE)));
            }
            if code.is_empty() {
                lines.push(Line::from(Span::styled("│ ", GUTTER_STYLE)));
            }
            for code_line in code.lines() {
                lines.push(Line::from(vec![
                    Span::styled("│ ", GUTTER_STYLE),
                    Span::styled(code_line.replace('\t', "    "), CODE_BLOCK_STYLE),
                ]));
            }
        }
        Block::Table { header, rows } => render_table(header, rows, lines),
        Block::Rule => lines.push(Line::from(Span::styled("─".repeat(40), MUTED_STYLE))),
        Block::Blank => lines.push(Line::default()),
    }
}

fn render_table(header: Vec<String>, rows: Vec<Vec<String>>, lines: &mut Vec<Line<'static>>) {
    let header_style = Style::default().add_modifier(Modifier::BOLD);
    let header: Vec<Vec<Span<'static>>> =
        header.iter().map(|cell| inline_spans(cell, header_style)).collect();
    let rows: Vec<Vec<Vec<Span<'static>>>> = rows
        .iter()
        .map(|row| row.iter().map(|cell| inline_spans(cell, Style::default())).collect())
        .collect();

    let cell_width = |cell: &[Span]| -> usize { cell.iter().map(Span::width).sum() };

    let columns = rows.iter().map(Vec::len).chain(std::iter::once(header.len())).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in std::iter::once(&header).chain(rows.iter()) {
        for (col, cell) in row.iter().enumerate() {
            widths[col] = widths[col].max(cell_width(cell.as_slice()));
        }
    }

    let format_row = |row: &[Vec<Span<'static>>]| -> Line<'static> {
        let mut spans = Vec::new();
        for (col, width) in widths.iter().enumerate() {
            if col > 0 {
                spans.push(Span::raw(" │ "));
            }
            let cell = row.get(col).map(Vec::as_slice).unwrap_or(&[]);
            spans.extend(cell.iter().cloned());
            let pad = width - cell_width(cell);
            if pad > 0 {
                spans.push(Span::raw(" ".repeat(pad)));
            }
        }
        Line::from(spans)
    };

    lines.push(format_row(&header));
    let separator = widths
        .iter()
        .map(|w| "─".repeat(*w))
        .collect::<Vec<_>>()
        .join("─┼─");
    lines.push(Line::from(Span::styled(separator, MUTED_STYLE)));
    for row in &rows {
        lines.push(format_row(row));
    }
}

/// Parse a line of text, converting emphasis, strong, strikethrough and
/// code spans into styled spans
pub fn parse_inline(text: &str) -> Line<'static> {
    let spans = inline_spans(text, Style::default());
    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

fn inline_spans(text: &str, base: Style) -> Vec<Span<'static>> {
    const DELIMITERS: [(&str, Modifier); 5] = [
        ("**", Modifier::BOLD),
        ("__", Modifier::BOLD),
        ("~~", Modifier::CROSSED_OUT),
        ("*", Modifier::ITALIC),
        ("_", Modifier::ITALIC),
    ];

    let chars: Vec<char> = text.chars().collect();
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut current_text = String::new();
    let mut i = 0;

    'outer: while i < chars.len() {
        let c = chars[i];

        if c == '`' {
            let ticks = run_length(&chars, i, '`');
            if let Some(end) = find_backtick_run(&chars, i + ticks, ticks) {
                if !current_text.is_empty() {
                    spans.push(Span::styled(std::mem::take(&mut current_text), base));
                }
                let code: String = chars[i + ticks..end].iter().collect();
                spans.push(Span::styled(code, base.patch(INLINE_CODE_STYLE)));
                i = end + ticks;
            } else {
                current_text.extend(std::iter::repeat('`').take(ticks));
                i += ticks;
            }
            continue;
        }

        for (delim, modifier) in DELIMITERS {
            let delim: Vec<char> = delim.chars().collect();
            if !opens_at(&chars, i, &delim) {
                continue;
            }
            match find_closing(&chars, i + delim.len(), &delim) {
                Some(end) => {
                    if !current_text.is_empty() {
                        spans.push(Span::styled(std::mem::take(&mut current_text), base));
                    }
                    let inner: String = chars[i + delim.len()..end].iter().collect();
                    spans.extend(inline_spans(&inner, base.add_modifier(modifier)));
                    i = end + delim.len();
                    continue 'outer;
                }
                None if delim.len() == 2 => {
                    // No closing pair, treat as literal
                    current_text.extend(delim.iter());
                    i += 2;
                    continue 'outer;
                }
                None => {}
            }
        }

        current_text.push(c);
        i += 1;
    }

    if !current_text.is_empty() {
        spans.push(Span::styled(current_text, base));
    }
    spans
}

fn run_length(chars: &[char], start: usize, c: char) -> usize {
    chars[start..].iter().take_while(|x| **x == c).count()
}

fn find_backtick_run(chars: &[char], from: usize, ticks: usize) -> Option<usize> {
    let mut j = from;
    while j < chars.len() {
        if chars[j] == '`' {
            let run = run_length(chars, j, '`');
            if run == ticks {
                return Some(j);
            }
            j += run;
        } else {
            j += 1;
        }
    }
    None
}

fn matches_at(chars: &[char], at: usize, delim: &[char]) -> bool {
    at + delim.len() <= chars.len() && chars[at..at + delim.len()] == *delim
}

fn is_word_char(c: Option<&char>) -> bool {
    c.map(|c| c.is_alphanumeric()).unwrap_or(false)
}

fn opens_at(chars: &[char], i: usize, delim: &[char]) -> bool {
    if !matches_at(chars, i, delim) {
        return false;
    }
    let after = i + delim.len();
    // A single delimiter must not be the start of a double one
    if delim.len() == 1 && chars.get(after) == Some(&delim[0]) {
        return false;
    }
    match chars.get(after) {
        Some(next) if !next.is_whitespace() => {}
        _ => return false,
    }
    // Underscores never open inside a word (snake_case stays plain)
    if delim[0] == '_' && i > 0 && is_word_char(chars.get(i - 1)) {
        return false;
    }
    true
}

fn find_closing(chars: &[char], from: usize, delim: &[char]) -> Option<usize> {
    let mut j = from + 1;
    while j < chars.len() {
        if matches_at(chars, j, delim)
            && !chars[j - 1].is_whitespace()
            && (delim.len() == 2 || chars.get(j + 1) != Some(&delim[0]))
            && (delim[0] != '_' || !is_word_char(chars.get(j + delim.len())))
        {
            return Some(j);
        }
        j += 1;
    }
    None
}
