//! Metric extraction from free-form experiment output.
//!
//! Every number in a line becomes a metric. Its label is the text between
//! the previous number and this one, so `accuracy: 0.95` yields the label
//! `accuracy: `. No line format is assumed.

/// Labelled values scraped from one experiment, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metrics {
    entries: Vec<(String, String)>,
}

impl Metrics {
    /// Record a value, replacing the previous value under the same label.
    pub fn insert(&mut self, label: String, value: String) {
        match self.entries.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((label, value)),
        }
    }

    /// Exact-label lookup.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    /// Value for a requested metric column: the first label containing the
    /// metric name, case-insensitively.
    #[must_use]
    pub fn column(&self, metric: &str) -> Option<&str> {
        let metric = metric.to_lowercase();
        self.entries
            .iter()
            .find(|(l, _)| l.to_lowercase().contains(&metric))
            .map(|(_, v)| v.as_str())
    }

    /// Requested metrics with no matching label.
    #[must_use]
    pub fn missing<'m>(&self, metrics: &'m [String]) -> Vec<&'m str> {
        metrics
            .iter()
            .filter(|m| self.column(m).is_none())
            .map(String::as_str)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scrape every labelled number from `text`, keeping only labels that match
/// one of `metrics` (all labels when `metrics` is empty).
#[must_use]
pub fn parse_output(text: &str, metrics: &[String]) -> Metrics {
    let filter: Vec<String> = metrics.iter().map(|m| m.to_lowercase()).collect();
    let mut parsed = Metrics::default();

    // `\r` splits progress-bar refreshes so only the last one survives
    for line in text.split(['\n', '\r']) {
        let line = line.trim();
        if !line.is_empty() {
            extract_line(line, &filter, &mut parsed);
        }
    }

    parsed
}

fn extract_line(line: &str, filter: &[String], out: &mut Metrics) {
    let chars: Vec<char> = line.chars().collect();
    let mut label_start = 0;
    let mut i = 0;

    while i < chars.len() {
        // Digits glued to a word (`F1`, `v2`) are part of the word.
        let starts_number = (chars[i].is_ascii_digit()
            || (chars[i] == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)))
            && (i == 0 || !chars[i - 1].is_alphanumeric());
        if !starts_number {
            i += 1;
            continue;
        }

        let start = i;
        let mut seen_dot = false;
        while i < chars.len() {
            if chars[i].is_ascii_digit() {
                i += 1;
            } else if chars[i] == '.'
                && !seen_dot
                && chars.get(i + 1).is_some_and(char::is_ascii_digit)
            {
                seen_dot = true;
                i += 1;
            } else {
                break;
            }
        }

        let number: String = chars[start..i].iter().collect();
        let mut label: String = chars[label_start..start].iter().collect();
        if label.is_empty() {
            label = "value".to_string();
        }
        if keep_label(&label, filter) {
            out.insert(label, number);
        }
        label_start = i;
    }
}

fn keep_label(label: &str, filter: &[String]) -> bool {
    if filter.is_empty() {
        return true;
    }
    let label = label.to_lowercase();
    filter.iter().any(|m| label.contains(m.as_str()))
}
