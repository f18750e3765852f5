//! Plain-text rendering of the rating summary.

use std::fmt::Write;

use crate::domain::Rating;
use crate::storage::Summary;

const NAME_WIDTH: usize = 24;
const COLUMN_WIDTH: usize = 14;

/// Render totals and the category x rating matrix as a fixed-width table.
pub fn render(summary: &Summary) -> String {
    let mut out = String::new();

    if summary.total_entries == 0
        && summary.by_rating.is_empty()
        && summary.category_rating.is_empty()
    {
        out.push_str("(no data)\n");
        return out;
    }

    // Writing to a String cannot fail
    let _ = writeln!(out, "Rating Summary");
    let _ = writeln!(out, "==============");
    let _ = writeln!(out, "Total: {} entries", summary.total_entries);
    for rating in Rating::ALL {
        let count = summary.by_rating.get(&rating).copied().unwrap_or(0);
        let _ = writeln!(out, "  {:<14} {}", rating.as_str(), count);
    }
    out.push('\n');
    let _ = writeln!(out, "Category x Rating:");

    let mut header = format!("| {:<NAME_WIDTH$} ", "");
    for rating in Rating::ALL {
        let _ = write!(header, "| {:<COLUMN_WIDTH$} ", rating.as_str());
    }
    header.push('|');
    let rule = "-".repeat(header.len());

    let _ = writeln!(out, "{header}");
    let _ = writeln!(out, "{rule}");

    for (category_id, counts) in &summary.category_rating {
        let name = match summary.category_names.get(category_id) {
            Some(title) => format!("{category_id} ({title})"),
            None => category_id.to_string(),
        };
        let mut row = format!("| {:<NAME_WIDTH$} ", truncate(&name, NAME_WIDTH));
        for rating in Rating::ALL {
            let count = counts.get(&rating).copied().unwrap_or(0);
            let _ = write!(row, "| {:<COLUMN_WIDTH$} ", count);
        }
        row.push('|');
        let _ = writeln!(out, "{row}");
    }
    let _ = writeln!(out, "{rule}");

    out
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
