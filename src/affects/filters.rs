// src/affects/filters.rs

/// Filter option that matches rows whose cell is blank, distinguishing
/// "field has no value" from "field doesn't match".
pub const EMPTY_FILTER_OPTION: &str = "EMPTY";

/// Multi-select value filter. An empty selection matches everything; the
/// EMPTY sentinel matches only blank cells.
pub fn arr_includes_with_blanks(cell: &str, selected: &[String]) -> bool {
    if selected.is_empty() {
        return true;
    }
    selected.iter().any(|option| {
        if option == EMPTY_FILTER_OPTION {
            cell.is_empty()
        } else {
            option == cell
        }
    })
}

/// Numeric CVSS filter: a fractional filter value must match to two
/// decimals, an integral one matches the truncated score.
pub fn cvss_score_matches(score: f64, filter: &str) -> bool {
    let Ok(wanted) = filter.trim().parse::<f64>() else {
        return false;
    };
    if wanted.fract() != 0.0 {
        format!("{wanted:.2}") == format!("{score:.2}")
    } else {
        wanted == score.trunc()
    }
}

/// Case-insensitive substring match used by the global filter.
pub fn matches_text(cell: &str, needle: &str) -> bool {
    cell.to_lowercase().contains(&needle.to_lowercase())
}
