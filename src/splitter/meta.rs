use crate::syntax::{
    is_empty_line, is_table_delimiter, list_marker, parse_code_fence_header_from_block,
    split_table_row,
};
use crate::types::{Alignment, BlockMeta};

pub(crate) fn code_block(content: &str) -> BlockMeta {
    match parse_code_fence_header_from_block(content) {
        Some(header) => BlockMeta::CodeBlock {
            language: header.language.map(str::to_string),
            info: header.info.to_string(),
        },
        None => BlockMeta::CodeBlock {
            language: None,
            info: String::new(),
        },
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

pub(crate) fn list(content: &str) -> BlockMeta {
    let mut lines = content.lines();
    let Some(first) = lines.next() else {
        return BlockMeta::None;
    };
    let Some(marker) = list_marker(first) else {
        return BlockMeta::None;
    };

    let mut items = vec![first.to_string()];
    for line in lines {
        let top_level = indent_of(line) < marker.content_offset && list_marker(line).is_some();
        match items.last_mut() {
            Some(item) if !top_level => {
                item.push('\n');
                item.push_str(line);
            }
            _ => items.push(line.to_string()),
        }
    }
    for item in &mut items {
        item.truncate(item.trim_end().len());
    }

    BlockMeta::List {
        ordered: marker.ordered,
        start: marker.start,
        items,
    }
}

fn alignment(cell: &str) -> Alignment {
    match (cell.starts_with(':'), cell.ends_with(':') && cell.len() > 1) {
        (true, true) => Alignment::Center,
        (true, false) => Alignment::Left,
        (false, true) => Alignment::Right,
        (false, false) => Alignment::None,
    }
}

pub(crate) fn table(content: &str) -> BlockMeta {
    let mut lines = content.lines().filter(|l| !is_empty_line(l));
    let headers = lines.next().map(split_table_row).unwrap_or_default();
    let alignments = match lines.next() {
        Some(delim) if is_table_delimiter(delim) => {
            split_table_row(delim).iter().map(|c| alignment(c)).collect()
        }
        _ => Vec::new(),
    };
    let rows = lines.map(split_table_row).collect();
    BlockMeta::Table {
        headers,
        alignments,
        rows,
    }
}
