//! Plain-English workflow requests.
//!
//! [`RequestParser`] turns text such as "move screenshots from my desktop to
//! a Screenshots folder daily at 6pm" into triggers and file-operation steps
//! using a fixed set of case-insensitive regexes. Anything it does not
//! recognise is simply left out; the result is validated like any other
//! workflow before it is stored.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;

use autoflow_types::workflow::{FileOperation, Step, StepAction, Trigger, TriggerKind};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid parser pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Triggers and steps extracted from a request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedWorkflow {
    pub name: String,
    /// The original request text.
    pub description: String,
    pub triggers: Vec<Trigger>,
    pub steps: Vec<Step>,
}

const WEEKDAYS: [&str; 7] = [
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
];

const SCREENSHOT_PATTERNS: &[&str] = &["*.png", "*.jpg", "*screenshot*.*"];
const IMAGE_PATTERNS: &[&str] = &["*.jpg", "*.jpeg", "*.png", "*.gif", "*.bmp", "*.webp"];
const DOCUMENT_PATTERNS: &[&str] = &["*.pdf", "*.doc", "*.docx", "*.txt"];

pub struct RequestParser {
    daily: Regex,
    hourly: Regex,
    weekly: Regex,
    time_of_day: Regex,
    weekday: Regex,

    copy: Regex,
    delete: Regex,
    create: Regex,
    archive: Regex,

    screenshots: Regex,
    images: Regex,
    documents: Regex,
    downloads: Regex,
    desktop: Regex,

    to_folder: Regex,
    into_folder: Regex,
    documents_subfolder: Regex,
}

fn compile(pattern: &str) -> Result<Regex, ParseError> {
    Regex::new(pattern).map_err(|e| ParseError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

impl RequestParser {
    pub fn new() -> Result<Self, ParseError> {
        Ok(Self {
            daily: compile(r"(?i)\b(daily|every day|each day)\b")?,
            hourly: compile(r"(?i)\b(hourly|every hour|each hour)\b")?,
            weekly: compile(r"(?i)\b(weekly|every week|each week)\b")?,
            time_of_day: compile(r"(?i)(?:\bat|@)\s*(\d{1,2}):?(\d{2})?\s*(am|pm)?\b")?,
            weekday: compile(
                r"(?i)\b(?:on|every)\s+(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
            )?,

            copy: compile(r"(?i)\b(copy|duplicate|backup)\b")?,
            delete: compile(r"(?i)\b(delete|remove|clean|clear)\b")?,
            create: compile(r"(?i)\b(create|make|new)\s+(folder|directory)\b")?,
            archive: compile(r"(?i)\b(archive|zip|compress)\b")?,

            screenshots: compile(r"(?i)\b(screenshots?|screen\s*shots?|screen\s*captures?)\b")?,
            images: compile(r"(?i)\b(images?|photos?|pictures?|jpg|jpeg|png|gif)\b")?,
            documents: compile(r"(?i)\b(documents?|pdfs?|docx?|txt)\b")?,
            downloads: compile(r"(?i)\b(downloads?|downloaded)\b")?,
            desktop: compile(r"(?i)\bdesktop\b")?,

            to_folder: compile(r"(?i)to\s+(?:a\s+)?([/\w\s]+?)\s+folder")?,
            into_folder: compile(r"(?i)\b(?:in|into)\s+([/\w\s]+?)(?:\s+folder)?(?:\s|$)")?,
            documents_subfolder: compile(r"(?i)documents[/\s]+(\w+)")?,
        })
    }

    /// Parse `request`, resolving folder names under `home`.
    pub fn parse(&self, request: &str, home: &Path) -> ParsedWorkflow {
        let triggers = self.parse_schedule(request).into_iter().collect();
        let steps = self.parse_file_operations(request, home);
        let name = workflow_name(request);
        tracing::debug!(%name, "parsed workflow request");

        ParsedWorkflow {
            name,
            description: request.to_string(),
            triggers,
            steps,
        }
    }

    fn parse_schedule(&self, text: &str) -> Option<Trigger> {
        let (cron, description) = if self.daily.is_match(text) {
            self.daily_at(text)
                .unwrap_or_else(|| ("0 9 * * *".to_string(), "Daily at 9:00 AM".to_string()))
        } else if self.hourly.is_match(text) {
            ("0 * * * *".to_string(), "Every hour".to_string())
        } else if self.weekly.is_match(text) {
            let day = self.weekday.captures(text)?.get(1)?.as_str().to_lowercase();
            let index = WEEKDAYS.iter().position(|d| *d == day)?;
            (format!("0 9 * * {index}"), format!("Weekly on {}", capitalize(&day)))
        } else {
            return None;
        };

        Some(Trigger::new(TriggerKind::Schedule {
            cron,
            description: Some(description),
        }))
    }

    /// Explicit "at H[:MM] [am|pm]" for a daily schedule. Out-of-range times
    /// fall back to the default.
    ///
    /// A bare hour up to 12 reads as AM, so "at 12" is midnight. Hours 13-23
    /// without a suffix are taken as 24-hour clock times.
    fn daily_at(&self, text: &str) -> Option<(String, String)> {
        let caps = self.time_of_day.captures(text)?;
        let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
        let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
        let meridiem = caps.get(3).map(|m| m.as_str().to_lowercase());

        let (hour24, label) = match meridiem.as_deref() {
            Some("pm") if hour <= 12 => (if hour == 12 { 12 } else { hour + 12 }, format!("{hour}:{minute:02} PM")),
            _ if hour <= 12 => (if hour == 12 { 0 } else { hour }, format!("{hour}:{minute:02} AM")),
            Some(_) => return None,
            None => (hour, format!("{hour}:{minute:02}")),
        };
        if hour24 > 23 || minute > 59 {
            return None;
        }
        Some((format!("{minute} {hour24} * * *"), format!("Daily at {label}")))
    }

    fn operation(&self, text: &str) -> FileOperation {
        if self.copy.is_match(text) {
            FileOperation::Copy
        } else if self.delete.is_match(text) {
            FileOperation::Delete
        } else if self.create.is_match(text) {
            FileOperation::CreateDirectory
        } else if self.archive.is_match(text) {
            FileOperation::Archive
        } else {
            FileOperation::Move
        }
    }

    fn parse_file_operations(&self, text: &str, home: &Path) -> Vec<Step> {
        let operation = self.operation(text);

        let mut patterns: Vec<&str> = Vec::new();
        if self.screenshots.is_match(text) {
            patterns.extend(SCREENSHOT_PATTERNS);
        }
        if self.images.is_match(text) {
            patterns.extend(IMAGE_PATTERNS);
        }
        if self.documents.is_match(text) {
            patterns.extend(DOCUMENT_PATTERNS);
        }
        // Screenshots and images overlap.
        let mut seen = std::collections::HashSet::new();
        patterns.retain(|p| seen.insert(*p));

        let source = if !self.desktop.is_match(text) && self.downloads.is_match(text) {
            home.join("Downloads")
        } else {
            home.join("Desktop")
        };
        let destination = self.destination(text, home);

        if patterns.is_empty() {
            if operation == FileOperation::CreateDirectory {
                let description = format!("Create directory {}", base_name(&destination));
                return vec![
                    Step::new(StepAction::FileOperation {
                        operation,
                        source: Some(destination),
                        destination: None,
                        pattern: None,
                        options: None,
                    })
                    .with_description(description),
                ];
            }
            return Vec::new();
        }

        patterns
            .into_iter()
            .map(|pattern| {
                let description = format!(
                    "{operation} {pattern} files from {} to {}",
                    base_name(&source),
                    base_name(&destination)
                );
                Step::new(StepAction::FileOperation {
                    operation,
                    source: Some(source.clone()),
                    destination: Some(destination.clone()),
                    pattern: Some(pattern.to_string()),
                    options: None,
                })
                .with_description(description)
            })
            .collect()
    }

    fn destination(&self, text: &str, home: &Path) -> PathBuf {
        let documents = home.join("Documents");

        if let Some(folder) = self.to_folder.captures(text).and_then(|c| c.get(1)) {
            let folder = folder.as_str().trim();
            if folder.contains('/') {
                let parts: Vec<&str> = folder
                    .split('/')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .collect();
                let base = match parts.first() {
                    Some(first) if first.eq_ignore_ascii_case("documents") => home.to_path_buf(),
                    _ => documents,
                };
                return parts.iter().fold(base, |acc, part| acc.join(part));
            }
            return match folder.to_lowercase().as_str() {
                "documents" => documents,
                "pictures" | "photos" => home.join("Pictures"),
                "downloads" => home.join("Downloads"),
                _ => documents.join(folder),
            };
        }

        if let Some(path) = self.into_folder.captures(text).and_then(|c| c.get(1)) {
            if let Some(sub) = self
                .documents_subfolder
                .captures(path.as_str())
                .and_then(|c| c.get(1))
            {
                return documents.join(sub.as_str());
            }
        }

        documents
    }
}

/// "Daily Move Screenshots", or "Custom Workflow" when nothing matched.
fn workflow_name(text: &str) -> String {
    let lower = text.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    let mut parts = Vec::new();
    for (needle, word) in [("daily", "Daily"), ("hourly", "Hourly"), ("weekly", "Weekly")] {
        if lower.contains(needle) {
            parts.push(word);
        }
    }
    for (needle, word) in [("move", "Move"), ("copy", "Copy"), ("delete", "Delete"), ("archive", "Archive")] {
        if lower.contains(needle) {
            parts.push(word);
        }
    }
    if has(&["screenshot"]) {
        parts.push("Screenshots");
    }
    if has(&["image", "photo"]) {
        parts.push("Images");
    }
    if has(&["document", "pdf"]) {
        parts.push("Documents");
    }
    if has(&["download"]) {
        parts.push("Downloads");
    }

    if parts.is_empty() {
        "Custom Workflow".to_string()
    } else {
        parts.join(" ")
    }
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn home() -> PathBuf {
        PathBuf::from("/home/ada")
    }

    fn parse(text: &str) -> ParsedWorkflow {
        RequestParser::new().unwrap().parse(text, &home())
    }

    fn cron_of(parsed: &ParsedWorkflow) -> Option<(String, Option<String>)> {
        parsed.triggers.first().and_then(|t| match &t.kind {
            TriggerKind::Schedule { cron, description } => Some((cron.clone(), description.clone())),
            _ => None,
        })
    }

    fn file_steps(parsed: &ParsedWorkflow) -> Vec<(FileOperation, Option<PathBuf>, Option<PathBuf>, Option<String>)> {
        parsed
            .steps
            .iter()
            .filter_map(|s| match &s.action {
                StepAction::FileOperation {
                    operation,
                    source,
                    destination,
                    pattern,
                    ..
                } => Some((*operation, source.clone(), destination.clone(), pattern.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_daily_screenshots_to_named_folder() {
        let parsed = parse("Move screenshots from desktop to a Screenshots folder daily at 6pm");
        assert_eq!(
            cron_of(&parsed),
            Some(("0 18 * * *".to_string(), Some("Daily at 6:00 PM".to_string())))
        );

        let steps = file_steps(&parsed);
        assert_eq!(steps.len(), 3);
        for (op, source, destination, _) in &steps {
            assert_eq!(*op, FileOperation::Move);
            assert_eq!(source.as_deref(), Some(Path::new("/home/ada/Desktop")));
            assert_eq!(destination.as_deref(), Some(Path::new("/home/ada/Documents/Screenshots")));
        }
        let patterns: Vec<_> = steps.iter().filter_map(|s| s.3.clone()).collect();
        assert_eq!(patterns, vec!["*.png", "*.jpg", "*screenshot*.*"]);
        assert_eq!(parsed.name, "Daily Move Screenshots");
        assert_eq!(
            parsed.steps[0].description.as_deref(),
            Some("move *.png files from Desktop to Screenshots")
        );
    }

    #[test]
    fn test_daily_defaults_to_nine_am() {
        let parsed = parse("every day clean up my downloads");
        assert_eq!(
            cron_of(&parsed),
            Some(("0 9 * * *".to_string(), Some("Daily at 9:00 AM".to_string())))
        );
    }

    #[test]
    fn test_daily_with_minutes_and_midnight() {
        let parsed = parse("daily at 12:30am backup documents");
        assert_eq!(cron_of(&parsed).unwrap().0, "30 0 * * *");
        let parsed = parse("daily at 17:45 copy photos");
        assert_eq!(cron_of(&parsed).unwrap().0, "45 17 * * *");
    }

    #[test]
    fn test_twelve_oclock_meridiem() {
        assert_eq!(
            cron_of(&parse("daily at 12am move images")),
            Some(("0 0 * * *".to_string(), Some("Daily at 12:00 AM".to_string())))
        );
        assert_eq!(
            cron_of(&parse("daily at 12pm move images")),
            Some(("0 12 * * *".to_string(), Some("Daily at 12:00 PM".to_string())))
        );
        assert_eq!(
            cron_of(&parse("daily at 12 move images")),
            Some(("0 0 * * *".to_string(), Some("Daily at 12:00 AM".to_string())))
        );
        assert_eq!(cron_of(&parse("daily at 7 move images")).unwrap().0, "0 7 * * *");
    }

    #[test]
    fn test_hourly_and_weekly() {
        assert_eq!(cron_of(&parse("hourly move images")).unwrap().0, "0 * * * *");
        let weekly = parse("weekly on friday delete documents in downloads");
        assert_eq!(
            cron_of(&weekly),
            Some(("0 9 * * 5".to_string(), Some("Weekly on Friday".to_string())))
        );
        assert!(parse("weekly tidy").triggers.is_empty(), "weekly needs a day");
        assert!(parse("move images").triggers.is_empty());
    }

    #[test]
    fn test_operation_keywords() {
        let op = |text: &str| file_steps(&parse(text))[0].0;
        assert_eq!(op("copy pdf files"), FileOperation::Copy);
        assert_eq!(op("backup photos"), FileOperation::Copy);
        assert_eq!(op("remove old images"), FileOperation::Delete);
        assert_eq!(op("zip documents"), FileOperation::Archive);
        assert_eq!(op("relocate images"), FileOperation::Move);
    }

    #[test]
    fn test_downloads_source() {
        let steps = file_steps(&parse("move pdf documents from downloads"));
        assert_eq!(steps[0].1.as_deref(), Some(Path::new("/home/ada/Downloads")));
        assert_eq!(steps[0].2.as_deref(), Some(Path::new("/home/ada/Documents")));
    }

    #[test]
    fn test_known_destination_folders() {
        let dest = |text: &str| file_steps(&parse(text))[0].2.clone().unwrap();
        assert_eq!(dest("move images to pictures folder"), home().join("Pictures"));
        assert_eq!(dest("move images to Documents/Photos/2024 folder"), home().join("Documents/Photos/2024"));
        assert_eq!(dest("move images to Archive/Old folder"), home().join("Documents/Archive/Old"));
        assert_eq!(dest("move images into Documents/Receipts"), home().join("Documents/Receipts"));
    }

    #[test]
    fn test_create_directory_without_targets() {
        let parsed = parse("create folder to a Projects folder");
        let steps = file_steps(&parsed);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].0, FileOperation::CreateDirectory);
        assert_eq!(steps[0].1.as_deref(), Some(Path::new("/home/ada/Documents/Projects")));
        assert_eq!(parsed.steps[0].description.as_deref(), Some("Create directory Projects"));
    }

    #[test]
    fn test_unrecognised_request() {
        let parsed = parse("make me a sandwich");
        assert!(parsed.steps.is_empty());
        assert!(parsed.triggers.is_empty());
        assert_eq!(parsed.name, "Custom Workflow");
        assert_eq!(parsed.description, "make me a sandwich");
    }

    #[test]
    fn test_overlapping_targets_are_deduplicated() {
        let patterns: Vec<_> = file_steps(&parse("move screenshots and images"))
            .into_iter()
            .filter_map(|s| s.3)
            .collect();
        assert_eq!(
            patterns,
            vec!["*.png", "*.jpg", "*screenshot*.*", "*.jpeg", "*.gif", "*.bmp", "*.webp"]
        );
    }
}
