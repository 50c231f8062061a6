//! Name extraction from raw recognizer output
//!
//! Splits recognized text into one candidate name per line and repairs the
//! character confusions the recognizer makes on game fonts. Corrections
//! live in a [`RuleSet`] so they can be reordered, dropped or replaced.

use crate::config::CorrectionConfig;
use std::collections::HashSet;
use std::fmt;

/// One character-confusion correction applied to a single line
pub trait CorrectionRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn apply(&self, line: &str) -> String;
}

/// `\w` in the usual regex sense
fn is_word(c: Option<char>) -> bool {
    c.is_some_and(|c| c.is_alphanumeric() || c == '_')
}

/// Rewrite each char given its neighbours
fn rewrite_chars(line: &str, f: impl Fn(char, Option<char>, Option<char>) -> char) -> String {
    let chars: Vec<char> = line.chars().collect();
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let prev = i.checked_sub(1).map(|j| chars[j]);
            let next = chars.get(i + 1).copied();
            f(c, prev, next)
        })
        .collect()
}

/// Removes every occurrence of the configured noise characters
#[derive(Debug, Clone)]
pub struct StripNoise {
    chars: Vec<char>,
}

impl StripNoise {
    pub fn new(chars: &str) -> Self {
        Self {
            chars: chars.chars().collect(),
        }
    }
}

impl CorrectionRule for StripNoise {
    fn name(&self) -> &'static str {
        "strip-noise"
    }

    fn apply(&self, line: &str) -> String {
        line.chars().filter(|c| !self.chars.contains(c)).collect()
    }
}

/// A lone `I` is almost always a misread lowercase `i`
#[derive(Debug, Clone, Copy, Default)]
pub struct IsolatedI;

impl CorrectionRule for IsolatedI {
    fn name(&self) -> &'static str {
        "isolated-i"
    }

    fn apply(&self, line: &str) -> String {
        rewrite_chars(line, |c, prev, next| {
            if matches!(c, 'i' | 'I') && !is_word(prev) && !is_word(next) {
                'i'
            } else {
                c
            }
        })
    }
}

/// Lone `O` and stray `0` digits are a misread letter.
///
/// A `0` next to another digit is left alone so numeric suffixes such as
/// `Player10` survive.
#[derive(Debug, Clone, Copy)]
pub struct MisreadZero {
    letter: char,
}

impl MisreadZero {
    pub fn new(letter: char) -> Self {
        Self { letter }
    }
}

impl CorrectionRule for MisreadZero {
    fn name(&self) -> &'static str {
        "misread-zero"
    }

    fn apply(&self, line: &str) -> String {
        let is_digit = |c: Option<char>| c.is_some_and(|c| c.is_ascii_digit());
        rewrite_chars(line, |c, prev, next| match c {
            'O' if !is_word(prev) && !is_word(next) => self.letter,
            '0' if !is_digit(prev) && !is_digit(next) => self.letter,
            _ => c,
        })
    }
}

/// Ordered list of correction rules
#[derive(Default)]
pub struct RuleSet {
    rules: Vec<Box<dyn CorrectionRule>>,
}

impl RuleSet {
    /// An empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule; rules run in insertion order
    pub fn with(mut self, rule: impl CorrectionRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn from_config(config: &CorrectionConfig) -> Self {
        let mut rules = Self::new();
        if !config.noise_chars.is_empty() {
            rules = rules.with(StripNoise::new(&config.noise_chars));
        }
        if config.isolated_i {
            rules = rules.with(IsolatedI);
        }
        if let Some(letter) = config.zero_letter {
            rules = rules.with(MisreadZero::new(letter));
        }
        rules
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn apply(&self, line: &str) -> String {
        self.rules
            .iter()
            .fold(line.to_string(), |acc, rule| rule.apply(&acc))
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Zero-width and other invisible format characters (soft hyphen, BOM)
fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{061C}'
            | '\u{180E}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{206F}'
            | '\u{FEFF}'
            | '\u{FFF9}'..='\u{FFFB}'
    )
}

/// Control and invisible characters go, any other whitespace becomes a plain space
fn scrub(line: &str) -> String {
    line.chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some(' ')
            } else if c.is_control() || is_invisible(c) {
                None
            } else {
                Some(c)
            }
        })
        .collect()
}

fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Raw text to an ordered list of player names
#[derive(Debug)]
pub struct NameExtractor {
    rules: RuleSet,
    dedupe: bool,
}

impl Default for NameExtractor {
    fn default() -> Self {
        Self::from_config(&CorrectionConfig::default())
    }
}

impl NameExtractor {
    pub fn new(rules: RuleSet, dedupe: bool) -> Self {
        Self { rules, dedupe }
    }

    pub fn from_config(config: &CorrectionConfig) -> Self {
        Self::new(RuleSet::from_config(config), config.dedupe)
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Clean one line; empty when nothing is left
    pub fn clean_line(&self, line: &str) -> String {
        let scrubbed = scrub(line.trim());
        let corrected = self.rules.apply(&scrubbed);
        collapse_whitespace(&corrected)
    }

    /// Split, clean and filter `raw`, keeping line order
    pub fn extract_names(&self, raw: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        raw.lines()
            .map(|line| self.clean_line(line))
            .filter(|name| !name.is_empty())
            .filter(|name| !self.dedupe || seen.insert(name.clone()))
            .collect()
    }
}

/// [`NameExtractor::extract_names`] with the default corrections
pub fn extract_names(raw: &str) -> Vec<String> {
    NameExtractor::default().extract_names(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_example() {
        assert_eq!(
            extract_names("Alice\n;Bob:\n\nCarl0\n"),
            vec!["Alice", "Bob", "CarlD"]
        );
    }

    #[test]
    fn test_idempotent_on_own_output() {
        let inputs = [
            "Alice\n;Bob:\n\nCarl0\n",
            "  O  Player10 \r\nx0y\n I am\tBob\n",
            "0\nO\n:;:\n\u{7}Zed\n",
        ];
        for raw in inputs {
            let once = extract_names(raw);
            let twice = extract_names(&once.join("\n"));
            assert_eq!(once, twice, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_invisible_characters_are_removed() {
        assert_eq!(
            extract_names("\u{FEFF}Alice\u{200B}\nB\u{200B}0b\n\u{200B}\n\u{2060}\u{00AD}\n"),
            vec!["Alice", "BDb"]
        );
    }

    #[test]
    fn test_isolated_i_is_lowercased() {
        let extractor = NameExtractor::default();
        assert_eq!(extractor.clean_line("I am here"), "i am here");
        assert_eq!(extractor.clean_line("Ivan"), "Ivan");
        assert_eq!(extractor.clean_line("-I-"), "-i-");
    }

    #[test]
    fn test_zero_and_o_corrections() {
        let extractor = NameExtractor::default();
        assert_eq!(extractor.clean_line("Player10"), "Player10");
        assert_eq!(extractor.clean_line("0"), "D");
        assert_eq!(extractor.clean_line("x0y"), "xDy");
        assert_eq!(extractor.clean_line("O Kane"), "D Kane");
        assert_eq!(extractor.clean_line("Oscar"), "Oscar");
    }

    #[test]
    fn test_zero_letter_is_configurable() {
        let config = CorrectionConfig {
            zero_letter: Some('O'),
            ..Default::default()
        };
        let extractor = NameExtractor::from_config(&config);
        assert_eq!(extractor.extract_names("Carl0"), vec!["CarlO"]);
    }

    #[test]
    fn test_rules_can_be_disabled() {
        let config = CorrectionConfig {
            noise_chars: String::new(),
            isolated_i: false,
            zero_letter: None,
            dedupe: false,
        };
        let extractor = NameExtractor::from_config(&config);
        assert!(extractor.rules().names().is_empty());
        assert_eq!(extractor.extract_names("I:0"), vec!["I:0"]);
    }

    #[test]
    fn test_control_chars_removed_and_whitespace_collapsed() {
        assert_eq!(
            extract_names("Big\u{7}Gun\n  Lone \t  Wolf  \n"),
            vec!["BigGun", "Lone Wolf"]
        );
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let raw = "Alice\nBob\nAlice\n";
        assert_eq!(extract_names(raw), vec!["Alice", "Bob", "Alice"]);

        let config = CorrectionConfig {
            dedupe: true,
            ..Default::default()
        };
        assert_eq!(
            NameExtractor::from_config(&config).extract_names(raw),
            vec!["Alice", "Bob"]
        );
    }

    #[test]
    fn test_custom_rule_set() {
        struct Upper;
        impl CorrectionRule for Upper {
            fn name(&self) -> &'static str {
                "upper"
            }
            fn apply(&self, line: &str) -> String {
                line.to_uppercase()
            }
        }

        let extractor = NameExtractor::new(RuleSet::new().with(Upper), false);
        assert_eq!(extractor.extract_names("bob\n"), vec!["BOB"]);
        assert_eq!(format!("{:?}", extractor.rules()), "[\"upper\"]");
    }
}
