//! Low-level HTML helpers for the leaderboard page
//!
//! Naive string slicing, case-insensitive on ASCII tag names. Enough for
//! one results table; not a general parser.

/// ASCII-only lowercasing; byte offsets stay valid in the original string
fn to_lowercase_fast(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii() { c.to_ascii_lowercase() } else { c })
        .collect()
}

/// Next complete `<tag ...> ... </tag>` block at or after `from`.
///
/// Returns byte offsets of the block start and the end of the closing tag.
pub fn next_tag_block_ci(
    s: &str,
    open_tag: &str,
    close_tag: &str,
    from: usize,
) -> Option<(usize, usize)> {
    let lc = to_lowercase_fast(s);
    let open_lc = to_lowercase_fast(open_tag);
    let close_lc = to_lowercase_fast(close_tag);

    let start = lc.get(from..)?.find(&open_lc)? + from;
    let open_end = s[start..].find('>')? + start + 1;
    let end_rel = lc[open_end..].find(&close_lc)?;
    let end = open_end + end_rel + close_tag.len();
    Some((start, end))
}

/// All complete blocks of one tag inside `s`
fn tag_blocks<'a>(s: &'a str, open_tag: &str, close_tag: &str) -> Vec<&'a str> {
    let mut blocks = Vec::new();
    let mut pos = 0;
    while let Some((start, end)) = next_tag_block_ci(s, open_tag, close_tag, pos) {
        blocks.push(&s[start..end]);
        pos = end;
    }
    blocks
}

/// INNER of `<tag ...>INNER</tag>`, nested tags included
fn inner_after_open_tag(block: &str) -> &str {
    match (block.find('>'), block.rfind('<')) {
        (Some(open_end), Some(close_start)) if close_start > open_end => {
            &block[open_end + 1..close_start]
        }
        _ => "",
    }
}

/// Drop every `<...>`, decode entities, collapse whitespace
pub fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    normalize_ws(&decode_entities(&out))
}

/// The handful of entities player names and numbers actually use
pub fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&amp;", "&")
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `<table>` whose opening tag mentions `class_name`
pub fn find_table_with_class<'a>(html: &'a str, class_name: &str) -> Option<&'a str> {
    let class_lc = to_lowercase_fast(class_name);
    tag_blocks(html, "<table", "</table>")
        .into_iter()
        .find(|block| {
            let open_end = block.find('>').unwrap_or(block.len());
            to_lowercase_fast(&block[..open_end]).contains(&class_lc)
        })
}

/// Text of each `<td>` cell, row by row. Header rows (`<th>` only) are skipped.
pub fn table_rows(table: &str) -> Vec<Vec<String>> {
    tag_blocks(table, "<tr", "</tr>")
        .into_iter()
        .map(|row| {
            tag_blocks(row, "<td", "</td>")
                .into_iter()
                .map(|cell| strip_tags(inner_after_open_tag(cell)))
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect()
}

/// Cells of the first row whose second column is exactly `name`
pub fn find_player_row(table: &str, name: &str) -> Option<Vec<String>> {
    table_rows(table)
        .into_iter()
        .find(|cells| cells.get(1).map(String::as_str) == Some(name))
}
