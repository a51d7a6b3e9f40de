//! Lazy log pipelines over a synthetic source.
//!
//! [`SyntheticLog`] produces log lines on demand and counts how many it has
//! actually been asked for, so a pipeline can prove it only pulled what the
//! final consumer needed. Stages are plain iterator adapters layered through
//! [`PipelineExt`]: level filtering, substring search, regex matching, and
//! first-occurrence deduplication.
//!
//! # Example
//!
//! ```
//! use glassbox::pipeline::{LogLevel, PipelineExt, SyntheticLog};
//!
//! let log = SyntheticLog::new(1_000_000);
//! let scanned = log.scan_count();
//!
//! let hits: Vec<String> = log
//!     .filter_level(LogLevel::Error)
//!     .search("logline")
//!     .take(2)
//!     .collect();
//!
//! assert_eq!(hits.len(), 2);
//! // Only the lines up to the second error were ever produced.
//! assert_eq!(scanned.get(), 26);
//! ```

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Severity carried by a synthetic log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Routine line.
    Ok,
    /// Every 7th line.
    Warn,
    /// Every 13th line, taking precedence over [`LogLevel::Warn`].
    Error,
}

impl LogLevel {
    fn for_line(line_number: usize) -> Self {
        if line_number % 13 == 0 {
            Self::Error
        } else if line_number % 7 == 0 {
            Self::Warn
        } else {
            Self::Ok
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "OK",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OK" => Ok(Self::Ok),
            "WARN" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            other => Err(Error::ConfigValidation {
                message: format!("unknown log level {other:?}, expected OK, WARN, or ERROR"),
            }),
        }
    }
}

/// Shared count of lines a [`SyntheticLog`] has produced.
///
/// Clones share the counter, so a handle taken before the log is consumed
/// still reads the final tally afterwards.
#[derive(Debug, Clone, Default)]
pub struct ScanCount {
    lines: Arc<AtomicUsize>,
}

impl ScanCount {
    /// Lines produced so far.
    #[must_use]
    pub fn get(&self) -> usize {
        self.lines.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.lines.fetch_add(1, Ordering::SeqCst);
    }
}

/// An on-demand source of log lines.
///
/// Line `i` (1-based) reads `logline {i} level={LEVEL} at={timestamp}`,
/// where every 7th line is a `WARN` and every 13th an `ERROR`. Lines are
/// only built when pulled, and each pull bumps the shared [`ScanCount`].
#[derive(Debug)]
pub struct SyntheticLog {
    produced: usize,
    total: usize,
    base: DateTime<Utc>,
    scanned: ScanCount,
}

impl SyntheticLog {
    /// Create a source that can produce `total` lines.
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            produced: 0,
            total,
            base: DateTime::UNIX_EPOCH,
            scanned: ScanCount::default(),
        }
    }

    /// A handle onto the source's produced-line counter.
    #[must_use]
    pub fn scan_count(&self) -> ScanCount {
        self.scanned.clone()
    }
}

impl Iterator for SyntheticLog {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.produced >= self.total {
            return None;
        }
        self.produced += 1;
        self.scanned.bump();

        let i = self.produced;
        let level = LogLevel::for_line(i);
        let offset = Duration::seconds(i64::try_from(i).unwrap_or(i64::MAX));
        let at = self.base + offset;
        Some(format!("logline {i} level={level} at={}", at.to_rfc3339()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total - self.produced;
        (left, Some(left))
    }
}

impl ExactSizeIterator for SyntheticLog {}

fn line_level(line: &str) -> Option<LogLevel> {
    let tail = line.split_once("level=")?.1;
    let token = tail.split_whitespace().next()?;
    token.parse().ok()
}

/// Stage that keeps lines carrying one severity.
#[derive(Debug)]
pub struct LevelFilter<I> {
    inner: I,
    level: LogLevel,
}

impl<I: Iterator<Item = String>> Iterator for LevelFilter<I> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let level = self.level;
        self.inner.find(|line| line_level(line) == Some(level))
    }
}

/// Stage that keeps lines containing a substring.
#[derive(Debug)]
pub struct Search<I> {
    inner: I,
    needle: String,
}

impl<I: Iterator<Item = String>> Iterator for Search<I> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let needle = &self.needle;
        self.inner.find(|line| line.contains(needle.as_str()))
    }
}

/// Stage that keeps lines matching a compiled regex.
#[derive(Debug)]
pub struct MatchPattern<I> {
    inner: I,
    regex: Regex,
}

impl<I: Iterator<Item = String>> Iterator for MatchPattern<I> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let regex = &self.regex;
        self.inner.find(|line| regex.is_match(line))
    }
}

/// Stage that keeps the first occurrence of each distinct line.
///
/// Lines are remembered by `blake3` digest rather than by content, so the
/// stage's memory stays flat no matter how long the lines run.
#[derive(Debug)]
pub struct DedupLines<I> {
    inner: I,
    seen: HashSet<[u8; 32]>,
}

impl<I: Iterator<Item = String>> Iterator for DedupLines<I> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let line = self.inner.next()?;
            let digest = *blake3::hash(line.as_bytes()).as_bytes();
            if self.seen.insert(digest) {
                return Some(line);
            }
        }
    }
}

/// Pipeline stages available on any iterator of lines.
pub trait PipelineExt: Iterator<Item = String> + Sized {
    /// Keep lines carrying the given severity.
    fn filter_level(self, level: LogLevel) -> LevelFilter<Self> {
        LevelFilter { inner: self, level }
    }

    /// Keep lines containing `needle`.
    fn search(self, needle: impl Into<String>) -> Search<Self> {
        Search {
            inner: self,
            needle: needle.into(),
        }
    }

    /// Keep lines matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid regex.
    fn match_pattern(self, pattern: &str) -> Result<MatchPattern<Self>> {
        let regex =
            Regex::new(pattern).map_err(|source| Error::invalid_pattern(pattern, source))?;
        Ok(MatchPattern { inner: self, regex })
    }

    /// Drop every repeat of a line already seen.
    fn dedup_lines(self) -> DedupLines<Self> {
        DedupLines {
            inner: self,
            seen: HashSet::new(),
        }
    }
}

impl<I: Iterator<Item = String>> PipelineExt for I {}

/// Inline state of a composed pipeline, in bytes.
///
/// A chain's state is the sum of its stage structs, independent of how many
/// lines the source can produce.
#[must_use]
pub fn stage_state_bytes<I: Iterator<Item = String>>(pipeline: &I) -> usize {
    std::mem::size_of_val(pipeline)
}

/// A pipeline to run: source size, stages, and how much to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePlan {
    /// Lines the synthetic source can produce.
    pub lines: usize,
    /// Severity the level stage keeps.
    pub level: LogLevel,
    /// Substring the search stage requires.
    pub needle: String,
    /// Optional regex stage.
    pub pattern: Option<String>,
    /// Whether to deduplicate surviving lines.
    pub dedup: bool,
    /// Matches to keep before stopping the source.
    pub preview: usize,
}

impl Default for PipelinePlan {
    fn default() -> Self {
        Self {
            lines: 1_000_000,
            level: LogLevel::Ok,
            needle: "logline".to_string(),
            pattern: None,
            dedup: false,
            preview: 5,
        }
    }
}

/// What a pipeline run kept and what it cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    /// Lines that survived every stage, up to the preview limit.
    pub matches: Vec<String>,
    /// Lines the source actually produced.
    pub scanned: usize,
    /// Lines the source could have produced.
    pub total: usize,
}

/// Assemble the stages a plan asks for and run them to the preview limit.
///
/// # Errors
///
/// Returns an error if the plan's regex pattern does not compile.
pub fn run_pipeline_demo(plan: &PipelinePlan) -> Result<PipelineReport> {
    let log = SyntheticLog::new(plan.lines);
    let scanned = log.scan_count();

    let mut stage: Box<dyn Iterator<Item = String>> =
        Box::new(log.filter_level(plan.level).search(plan.needle.clone()));
    if let Some(pattern) = &plan.pattern {
        stage = Box::new(stage.match_pattern(pattern)?);
    }
    if plan.dedup {
        stage = Box::new(stage.dedup_lines());
    }

    let matches: Vec<String> = stage.take(plan.preview).collect();
    debug!(
        "pipeline kept {} of {} scanned lines ({} available)",
        matches.len(),
        scanned.get(),
        plan.lines
    );

    Ok(PipelineReport {
        matches,
        scanned: scanned.get(),
        total: plan.lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_line_format() {
        let first: Vec<String> = SyntheticLog::new(1).collect();
        assert_eq!(
            first,
            vec!["logline 1 level=OK at=1970-01-01T00:00:01+00:00"]
        );
    }

    #[test]
    fn test_level_cycle() {
        assert_eq!(LogLevel::for_line(1), LogLevel::Ok);
        assert_eq!(LogLevel::for_line(7), LogLevel::Warn);
        assert_eq!(LogLevel::for_line(13), LogLevel::Error);
        assert_eq!(LogLevel::for_line(14), LogLevel::Warn);
        assert_eq!(LogLevel::for_line(26), LogLevel::Error);
        // Divisible by both: the error wins.
        assert_eq!(LogLevel::for_line(91), LogLevel::Error);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("warn".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("ERROR".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert!("bogus".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_source_is_exact_size() {
        let mut log = SyntheticLog::new(10);
        assert_eq!(log.len(), 10);

        let _ = log.next();
        assert_eq!(log.len(), 9);
    }

    #[test]
    fn test_filter_level_keeps_matching_lines() {
        let errors: Vec<String> = SyntheticLog::new(30).filter_level(LogLevel::Error).collect();

        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("logline 13 level=ERROR"));
        assert!(errors[1].starts_with("logline 26 level=ERROR"));
    }

    #[test]
    fn test_search_keeps_containing_lines() {
        let warns: Vec<String> = SyntheticLog::new(30).search("level=WARN").collect();

        assert_eq!(warns.len(), 4);
        assert!(warns[0].starts_with("logline 7 "));
        assert!(warns[3].starts_with("logline 28 "));
    }

    #[test]
    fn test_match_pattern_applies_regex() {
        let hits: Vec<String> = SyntheticLog::new(30)
            .match_pattern(r"^logline \d+ level=ERROR")
            .unwrap()
            .collect();

        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_match_pattern_rejects_bad_regex() {
        let err = SyntheticLog::new(1).match_pattern("(").unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let unique: Vec<String> = lines(&["a", "b", "a", "c", "b", "a"])
            .into_iter()
            .dedup_lines()
            .collect();

        assert_eq!(unique, lines(&["a", "b", "c"]));
    }

    #[test]
    fn test_take_limits_how_much_is_scanned() {
        let log = SyntheticLog::new(1_000_000);
        let scanned = log.scan_count();

        let kept: Vec<String> = log
            .filter_level(LogLevel::Ok)
            .search("logline")
            .take(5)
            .collect();

        assert_eq!(kept.len(), 5);
        assert_eq!(scanned.get(), 5);
    }

    #[test]
    fn test_scan_count_tracks_filtered_pulls() {
        let log = SyntheticLog::new(1_000_000);
        let scanned = log.scan_count();

        let kept: Vec<String> = log.filter_level(LogLevel::Error).take(2).collect();

        assert_eq!(kept.len(), 2);
        // Everything up to the second error was produced, nothing past it.
        assert_eq!(scanned.get(), 26);
    }

    #[test]
    fn test_pipeline_demo_report() {
        let plan = PipelinePlan {
            lines: 200,
            level: LogLevel::Error,
            needle: "logline".to_string(),
            pattern: None,
            dedup: false,
            preview: 3,
        };
        let report = run_pipeline_demo(&plan).unwrap();

        assert_eq!(report.matches.len(), 3);
        assert!(report.matches[2].starts_with("logline 39 "));
        assert_eq!(report.scanned, 39);
        assert_eq!(report.total, 200);
    }

    #[test]
    fn test_pipeline_demo_with_pattern_and_dedup() {
        let plan = PipelinePlan {
            lines: 50,
            level: LogLevel::Warn,
            needle: "logline".to_string(),
            pattern: Some("level=WARN".to_string()),
            dedup: true,
            preview: 2,
        };
        let report = run_pipeline_demo(&plan).unwrap();

        assert_eq!(report.matches.len(), 2);
        assert!(report.matches[0].starts_with("logline 7 "));
        assert!(report.matches[1].starts_with("logline 14 "));
        assert_eq!(report.scanned, 14);
    }

    #[test]
    fn test_pipeline_demo_empty_source() {
        let plan = PipelinePlan {
            lines: 0,
            ..PipelinePlan::default()
        };
        let report = run_pipeline_demo(&plan).unwrap();

        assert!(report.matches.is_empty());
        assert_eq!(report.scanned, 0);
        assert_eq!(report.total, 0);
    }

    #[test]
    fn test_unmatched_needle_scans_the_whole_source() {
        let plan = PipelinePlan {
            lines: 200,
            needle: "heartbeat".to_string(),
            ..PipelinePlan::default()
        };
        let report = run_pipeline_demo(&plan).unwrap();

        // Nothing matches, so the search stage drained the source looking.
        assert!(report.matches.is_empty());
        assert_eq!(report.scanned, 200);
        assert_eq!(report.total, 200);
    }

    #[test]
    fn test_pipeline_demo_rejects_bad_pattern() {
        let plan = PipelinePlan {
            pattern: Some("(".to_string()),
            ..PipelinePlan::default()
        };

        assert!(run_pipeline_demo(&plan).is_err());
    }

    #[test]
    fn test_default_plan() {
        let plan = PipelinePlan::default();

        assert_eq!(plan.lines, 1_000_000);
        assert_eq!(plan.level, LogLevel::Ok);
        assert_eq!(plan.preview, 5);
        assert!(!plan.dedup);
    }

    #[test]
    fn test_exhausted_source_reports_everything_scanned() {
        let log = SyntheticLog::new(10);
        let scanned = log.scan_count();

        let all: Vec<String> = log.collect();

        assert_eq!(all.len(), 10);
        assert_eq!(scanned.get(), 10);
    }

    #[test]
    fn test_stage_state_is_independent_of_line_count() {
        let small = SyntheticLog::new(10)
            .filter_level(LogLevel::Ok)
            .search("logline");
        let large = SyntheticLog::new(1_000_000)
            .filter_level(LogLevel::Ok)
            .search("logline");

        assert_eq!(stage_state_bytes(&small), stage_state_bytes(&large));
        assert!(stage_state_bytes(&large) < 1_024);
    }
}
