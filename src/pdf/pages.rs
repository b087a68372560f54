//! Page selection parsing

/// Parse a page selection string (e.g. "1,3,5-7") leniently.
///
/// Tokens are 1-based page numbers or inclusive `a-b` ranges, separated by
/// commas. Tokens that are not numbers, are zero, are reversed ranges, or lie
/// outside `1..=page_count` are dropped. Ranges are clipped to the document.
/// The result is sorted and de-duplicated.
pub fn parse_page_selection(selection: &str, page_count: usize) -> Vec<usize> {
    let mut pages = Vec::new();

    for part in selection.split(',') {
        let part: String = part.chars().filter(|c| !c.is_whitespace()).collect();
        if part.is_empty() {
            continue;
        }

        if let Some((start, end)) = part.split_once('-') {
            let (Ok(start), Ok(end)) = (start.parse::<usize>(), end.parse::<usize>()) else {
                tracing::debug!(token = %part, "dropping unparsable page range");
                continue;
            };
            if start < 1 || start > end || start > page_count {
                tracing::debug!(token = %part, "dropping out-of-range page range");
                continue;
            }
            pages.extend(start..=end.min(page_count));
        } else {
            match part.parse::<usize>() {
                Ok(page) if (1..=page_count).contains(&page) => pages.push(page),
                _ => tracing::debug!(token = %part, "dropping invalid page token"),
            }
        }
    }

    // Remove duplicates and sort
    pages.sort_unstable();
    pages.dedup();

    pages
}
