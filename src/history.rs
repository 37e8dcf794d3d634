use std::collections::VecDeque;

pub const HISTORY_LIMIT: usize = 10;
const PREVIEW_CHARS: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub source_preview: String,
    pub translation_preview: String,
    pub detected: String,
    pub target: String,
}

/// Recent translations, oldest evicted first.
#[derive(Debug, Default)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
}

pub fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

impl History {
    pub fn record(&mut self, source: &str, translation: &str, detected: &str, target: &str) {
        if self.entries.len() == HISTORY_LIMIT {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            source_preview: preview(source),
            translation_preview: preview(translation),
            detected: detected.to_string(),
            target: target.to_string(),
        });
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn newest_first(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().rev()
    }

    pub fn render(&self) -> String {
        self.newest_first()
            .enumerate()
            .map(|(i, e)| {
                format!(
                    "{}. {} → {}\nSource: {}\nTranslation: {}\n\n",
                    i + 1,
                    e.detected,
                    e.target,
                    e.source_preview,
                    e.translation_preview
                )
            })
            .collect()
    }
}
