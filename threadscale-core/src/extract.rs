//! Statistics Extraction
//!
//! Scrapes named metrics out of a run's text log.
//!
//! Each [`MetricRule`] pairs a metric name with a line pattern. The scan is
//! one pass over the log: every line is tested against every rule that has
//! not fired yet, and a rule fires at most once (first occurrence in file
//! order wins). Lines before the optional section marker are skipped.
//!
//! ```text
//!   rule state:  Armed ──first match──▶ Fired
//! ```
//!
//! Required rules still armed at end of input are an error; optional ones
//! are simply absent from the resulting [`StatsRecord`].

use fxhash::FxHashMap;
use regex::Regex;
use std::io::BufRead;
use thiserror::Error;

/// Errors from statistics extraction
#[derive(Debug, Error)]
pub enum ExtractError {
    /// A required rule never matched
    #[error("missing value from log: {0}")]
    MissingRequiredMetric(String),

    /// Captured text is not a number
    #[error("malformed value for {name}: '{value}'")]
    MalformedMetricValue {
        /// Rule name
        name: String,
        /// Offending capture
        value: String,
    },

    /// Pattern failed to compile or has no capture group
    #[error("invalid pattern for {name}: {message}")]
    InvalidPattern {
        /// Rule name
        name: String,
        /// Compiler message
        message: String,
    },

    /// Reading the log failed
    #[error("I/O error reading log: {0}")]
    Io(#[from] std::io::Error),
}

/// Shape of the value a rule captures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// One number
    Scalar,
    /// Comma-separated numbers
    Vector,
}

/// A single extracted metric value
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    /// One number
    Scalar(f64),
    /// Samples in log order
    Vector(Vec<f64>),
}

impl MetricValue {
    /// The scalar value, if this is a scalar
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MetricValue::Scalar(v) => Some(*v),
            MetricValue::Vector(_) => None,
        }
    }

    /// The samples, if this is a vector
    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            MetricValue::Scalar(_) => None,
            MetricValue::Vector(v) => Some(v),
        }
    }
}

/// How to find one metric in a log
#[derive(Debug, Clone)]
pub struct MetricRule {
    name: String,
    required: bool,
    kind: MetricKind,
    pattern: Regex,
}

impl MetricRule {
    /// Build a rule. The pattern is anchored at the start of the line and
    /// must contain at least one capture group; group 1 is the value.
    pub fn new(
        name: impl Into<String>,
        required: bool,
        kind: MetricKind,
        pattern: &str,
    ) -> Result<Self, ExtractError> {
        let name = name.into();
        let pattern = Regex::new(&format!("^(?:{})", pattern)).map_err(|e| {
            ExtractError::InvalidPattern {
                name: name.clone(),
                message: e.to_string(),
            }
        })?;
        // Group 0 is the whole match
        if pattern.captures_len() < 2 {
            return Err(ExtractError::InvalidPattern {
                name,
                message: "pattern has no capture group".to_string(),
            });
        }
        Ok(Self {
            name,
            required,
            kind,
            pattern,
        })
    }

    /// Required scalar rule
    pub fn scalar(name: impl Into<String>, pattern: &str) -> Result<Self, ExtractError> {
        Self::new(name, true, MetricKind::Scalar, pattern)
    }

    /// Required vector rule
    pub fn vector(name: impl Into<String>, pattern: &str) -> Result<Self, ExtractError> {
        Self::new(name, true, MetricKind::Vector, pattern)
    }

    /// Optional scalar rule
    pub fn optional(name: impl Into<String>, pattern: &str) -> Result<Self, ExtractError> {
        Self::new(name, false, MetricKind::Scalar, pattern)
    }

    /// Column name the value is stored under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a missing match fails extraction
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Value shape
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    fn parse_value(&self, raw: &str) -> Result<MetricValue, ExtractError> {
        let number = |s: &str| {
            s.trim()
                .parse::<f64>()
                .map_err(|_| ExtractError::MalformedMetricValue {
                    name: self.name.clone(),
                    value: s.to_string(),
                })
        };
        match self.kind {
            MetricKind::Scalar => number(raw).map(MetricValue::Scalar),
            MetricKind::Vector => raw
                .split(',')
                .map(number)
                .collect::<Result<Vec<_>, _>>()
                .map(MetricValue::Vector),
        }
    }
}

/// Ordered rule collection. Adding a rule under an existing name replaces it
/// in place.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<MetricRule>,
    index: FxHashMap<String, usize>,
}

impl RuleSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule, or replace the one with the same name
    pub fn push(&mut self, rule: MetricRule) {
        match self.index.get(rule.name()) {
            Some(&i) => self.rules[i] = rule,
            None => {
                self.index.insert(rule.name.clone(), self.rules.len());
                self.rules.push(rule);
            }
        }
    }

    /// Look a rule up by name
    pub fn get(&self, name: &str) -> Option<&MetricRule> {
        self.index.get(name).map(|&i| &self.rules[i])
    }

    /// Rules in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &MetricRule> {
        self.rules.iter()
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rules are present
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromIterator<MetricRule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = MetricRule>>(iter: I) -> Self {
        let mut set = RuleSet::new();
        for rule in iter {
            set.push(rule);
        }
        set
    }
}

/// Metrics extracted from one log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsRecord {
    values: FxHashMap<String, MetricValue>,
}

impl StatsRecord {
    /// Raw value by name
    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.values.get(name)
    }

    /// Scalar value by name
    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(MetricValue::as_scalar)
    }

    /// Vector value by name
    pub fn vector(&self, name: &str) -> Option<&[f64]> {
        self.get(name).and_then(MetricValue::as_vector)
    }

    /// Whether `name` was extracted
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of extracted values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when nothing was extracted
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Store a value, replacing any previous one
    pub fn insert(&mut self, name: impl Into<String>, value: MetricValue) {
        self.values.insert(name.into(), value);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleState {
    Armed,
    Fired,
}

/// One-pass multi-pattern log scanner
#[derive(Debug, Clone)]
pub struct StatsExtractor {
    rules: RuleSet,
    section_marker: Option<String>,
}

impl StatsExtractor {
    /// Extractor over `rules`, scanning from the first line
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            section_marker: None,
        }
    }

    /// Skip everything before the first line containing `marker`
    pub fn with_section_marker(mut self, marker: impl Into<String>) -> Self {
        self.section_marker = Some(marker.into());
        self
    }

    /// The rule table
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Extract from a sequence of lines
    pub fn extract<'a, I>(&self, lines: I) -> Result<StatsRecord, ExtractError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut scan = Scan::new(self);
        for line in lines {
            scan.feed(line)?;
        }
        scan.finish()
    }

    /// Extract from log text
    pub fn extract_str(&self, text: &str) -> Result<StatsRecord, ExtractError> {
        self.extract(text.lines())
    }

    /// Extract from a buffered reader, line by line. Bytes that are not
    /// valid UTF-8 are replaced rather than treated as a read error.
    pub fn extract_reader<R: BufRead>(&self, mut reader: R) -> Result<StatsRecord, ExtractError> {
        let mut scan = Scan::new(self);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let decoded = String::from_utf8_lossy(&buf);
            let line = decoded.strip_suffix('\n').unwrap_or(&decoded);
            let line = line.strip_suffix('\r').unwrap_or(line);
            scan.feed(line)?;
        }
        scan.finish()
    }
}

/// Per-scan state, kept apart from the rule table
struct Scan<'a> {
    extractor: &'a StatsExtractor,
    states: Vec<RuleState>,
    in_section: bool,
    record: StatsRecord,
}

impl<'a> Scan<'a> {
    fn new(extractor: &'a StatsExtractor) -> Self {
        Self {
            extractor,
            states: vec![RuleState::Armed; extractor.rules.len()],
            in_section: extractor.section_marker.is_none(),
            record: StatsRecord::default(),
        }
    }

    fn feed(&mut self, line: &str) -> Result<(), ExtractError> {
        if !self.in_section {
            match &self.extractor.section_marker {
                Some(marker) if line.contains(marker.as_str()) => self.in_section = true,
                _ => return Ok(()),
            }
        }

        for (rule, state) in self.extractor.rules.iter().zip(self.states.iter_mut()) {
            if *state == RuleState::Fired {
                continue;
            }
            let Some(caps) = rule.pattern.captures(line) else {
                continue;
            };
            let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let value = rule.parse_value(raw)?;
            self.record.insert(rule.name.clone(), value);
            *state = RuleState::Fired;
        }
        Ok(())
    }

    fn finish(self) -> Result<StatsRecord, ExtractError> {
        let missing = self
            .extractor
            .rules
            .iter()
            .zip(&self.states)
            .find(|(rule, state)| rule.required && **state == RuleState::Armed);
        if let Some((rule, _)) = missing {
            return Err(ExtractError::MissingRequiredMetric(rule.name.clone()));
        }
        Ok(self.record)
    }
}
