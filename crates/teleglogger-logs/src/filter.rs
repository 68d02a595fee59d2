use regex::Regex;

use teleglogger_types::LogLine;

/// Pattern used when none is configured
pub const DEFAULT_PATTERN: &str = "(?i).*error.*";

/// Compiled pattern every log line is tested against
#[derive(Clone)]
pub struct LineFilter {
    regex: Regex,

    /// Original pattern string
    pattern: String,
}

impl LineFilter {
    /// Create a new filter from a pattern string
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            pattern: pattern.to_string(),
        })
    }

    /// Check if a log line matches this filter
    pub fn matches(&self, line: &LogLine) -> bool {
        self.is_match(&line.text)
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Pattern as given on the command line
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl Default for LineFilter {
    fn default() -> Self {
        Self {
            regex: Regex::new(DEFAULT_PATTERN).expect("default pattern is valid"),
            pattern: DEFAULT_PATTERN.to_string(),
        }
    }
}

impl std::fmt::Debug for LineFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineFilter")
            .field("pattern", &self.pattern)
            .finish()
    }
}
