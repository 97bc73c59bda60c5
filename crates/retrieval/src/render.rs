use kompas_core::ListingRecord;

const TRUNCATION_MARKER: &str = "[context truncated]";
const CONTENT_EXCERPT_CHARS: usize = 160;

/// One listing rendered as a single self-contained block. The bounded
/// writer drops whole blocks, so a record is either fully present or
/// absent from the assembled text.
pub(crate) fn render_record(record: &ListingRecord) -> String {
    let mut line = format!(
        "- {} ({}): {}",
        record.display_name, record.city, record.website_url
    );
    if let Some(content) = record.content.as_deref() {
        let excerpt = excerpt(content, CONTENT_EXCERPT_CHARS);
        if !excerpt.is_empty() {
            line.push_str("\n  ");
            line.push_str(&excerpt);
        }
    }
    line
}

fn excerpt(input: &str, max_chars: usize) -> String {
    let compact = input.split_whitespace().collect::<Vec<_>>().join(" ");
    if compact.chars().count() <= max_chars {
        compact
    } else {
        compact.chars().take(max_chars).collect::<String>() + "..."
    }
}

/// Append-while-it-fits writer. Blocks are kept whole; once one no longer
/// fits, the remainder is dropped and an explicit truncation marker is
/// appended so consumers can detect the cut.
pub(crate) struct BoundedText {
    max_chars: usize,
    blocks: Vec<String>,
    used: usize,
    truncated: bool,
}

impl BoundedText {
    pub(crate) fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            blocks: Vec::new(),
            used: 0,
            truncated: false,
        }
    }

    pub(crate) fn push_block(&mut self, block: String) {
        if self.truncated {
            return;
        }
        let separator = usize::from(!self.blocks.is_empty());
        let cost = block.chars().count() + separator;
        if self.used + cost > self.max_chars {
            self.truncated = true;
            return;
        }
        self.used += cost;
        self.blocks.push(block);
    }

    pub(crate) fn finish(mut self) -> (String, bool) {
        if self.truncated {
            let marker_cost = TRUNCATION_MARKER.chars().count() + 1;
            while !self.blocks.is_empty() && self.used + marker_cost > self.max_chars {
                let dropped = self.blocks.pop().expect("blocks is non-empty");
                self.used -= dropped.chars().count() + usize::from(!self.blocks.is_empty());
            }
            if self.blocks.is_empty() {
                let marker: String = TRUNCATION_MARKER
                    .chars()
                    .take(self.max_chars)
                    .collect();
                return (marker, true);
            }
            self.blocks.push(TRUNCATION_MARKER.to_string());
        }

        (self.blocks.join("\n"), self.truncated)
    }
}
