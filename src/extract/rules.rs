use regex::Regex;

use crate::structures::errors::SoilwatchError;

/// Unsigned decimal token as it appears in dashboard text.
pub const DECIMAL: &str = r"\d+\.?\d*";

/// A matched numeric token and its parsed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate<'t> {
    pub raw: &'t str,
    pub value: f64,
}

#[derive(Debug, Clone)]
pub struct Rule {
    name: &'static str,
    pattern: Regex,
    accept: Option<fn(f64) -> bool>,
}

impl Rule {
    /// Case-insensitive rule without a range check.
    pub fn new(name: &'static str, pattern: &str) -> Result<Self, SoilwatchError> {
        Ok(Self {
            name,
            pattern: Regex::new(&format!("(?i){pattern}"))?,
            accept: None,
        })
    }

    /// Case-insensitive rule whose candidate must satisfy `accept`.
    pub fn bounded(
        name: &'static str,
        pattern: &str,
        accept: fn(f64) -> bool,
    ) -> Result<Self, SoilwatchError> {
        Ok(Self {
            accept: Some(accept),
            ..Self::new(name, pattern)?
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// First occurrence of the pattern, if its value is acceptable.
    pub fn apply<'t>(&self, text: &'t str) -> Option<Candidate<'t>> {
        let raw = self.pattern.captures(text)?.get(1)?.as_str();
        let value = raw.parse::<f64>().ok()?;
        match self.accept {
            Some(accept) if !accept(value) => None,
            _ => Some(Candidate { raw, value }),
        }
    }
}

/// Evaluate `rules` in order and return the first success.
pub fn first_match<'t>(rules: &[Rule], text: &'t str) -> Option<Candidate<'t>> {
    rules.iter().find_map(|rule| {
        let hit = rule.apply(text);
        if let Some(candidate) = &hit {
            log::debug!("rule '{}' matched '{}'", rule.name(), candidate.raw);
        }
        hit
    })
}

/// Proximity search: for every occurrence of `label` (in order), look at the
/// `radius`-character window around it and return the first number matched by
/// `number` that passes `accept`.
pub fn search_near<'t>(
    text: &'t str,
    label: &Regex,
    number: &Regex,
    radius: usize,
    accept: fn(f64) -> bool,
) -> Option<Candidate<'t>> {
    label.find_iter(text).find_map(|hit| {
        let window = window(text, hit.start(), hit.end(), radius);
        number.captures_iter(window).find_map(|caps| {
            let raw = caps.get(1)?.as_str();
            let value = raw.parse::<f64>().ok()?;
            accept(value).then_some(Candidate { raw, value })
        })
    })
}

/// Slice of `text` spanning `radius` characters either side of `start..end`,
/// clamped to the text bounds.
pub fn window(text: &str, start: usize, end: usize, radius: usize) -> &str {
    if radius == 0 {
        return &text[start..end];
    }
    let lo = text[..start]
        .char_indices()
        .rev()
        .nth(radius - 1)
        .map_or(0, |(i, _)| i);
    let hi = text[end..]
        .char_indices()
        .nth(radius)
        .map_or(text.len(), |(i, _)| end + i);
    &text[lo..hi]
}

/// Count case-insensitive, non-overlapping occurrences of `needle`.
pub fn count_ci(haystack_lower: &str, needle: &str) -> usize {
    haystack_lower.matches(&needle.to_lowercase()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positive(v: f64) -> bool {
        v > 0.0
    }

    #[test]
    fn first_rule_in_list_wins_even_if_later_in_text() {
        let rules = vec![
            Rule::new("celsius", r"(\d+)\s*°C").unwrap(),
            Rule::new("label", r"Temperature[:\s]*(\d+)").unwrap(),
        ];
        let hit = first_match(&rules, "Temperature: 12 ... 30 °C").unwrap();
        assert_eq!(hit.raw, "30");
    }

    #[test]
    fn rejected_candidate_falls_through_to_next_rule() {
        let rules = vec![
            Rule::bounded("a", r"a=(\d+)", positive).unwrap(),
            Rule::bounded("b", r"b=(\d+)", positive).unwrap(),
        ];
        // only the first occurrence of `a=` is considered
        let hit = first_match(&rules, "a=0 a=5 b=7").unwrap();
        assert_eq!(hit.value, 7.0);
    }

    #[test]
    fn window_counts_characters_not_bytes() {
        let text = "µµµµµXµµµµµ";
        let start = text.find('X').unwrap();
        assert_eq!(window(text, start, start + 1, 2), "µµXµµ");
        assert_eq!(window(text, start, start + 1, 40), text);
    }

    #[test]
    fn search_near_skips_out_of_range_numbers_in_window() {
        let label = Regex::new("(?i)ph").unwrap();
        let number = Regex::new(r"(\d+(?:\.\d{1,2})?)").unwrap();
        let hit = search_near("pH 99 6.5", &label, &number, 40, |v| v > 0.0 && v <= 14.0);
        assert_eq!(hit.map(|c| c.value), Some(6.5));
    }

    #[test]
    fn counts_indicators_case_insensitively() {
        let text = "No data | NO DATA | no data".to_lowercase();
        assert_eq!(count_ci(&text, "No Data"), 3);
    }
}
