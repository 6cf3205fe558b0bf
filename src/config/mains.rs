/// Mains files
///
/// A mains file lists several guests to run side by side, one launch
/// command line per line. Blank lines and lines starting with `#` are
/// skipped; `sleep <ms>` pauses the reader before the next launch.
use crate::config::types::{GuestboxError, Result};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MainsEntry {
    Launch { line: usize, words: Vec<String> },
    Sleep { line: usize, duration: Duration },
}

impl MainsEntry {
    pub fn line(&self) -> usize {
        match self {
            MainsEntry::Launch { line, .. } | MainsEntry::Sleep { line, .. } => *line,
        }
    }

    /// Parses every line of `text`. Lines are numbered from 1. A malformed
    /// `sleep` line is returned as an error in place so other lines still run.
    pub fn parse_str(text: &str) -> Vec<Result<MainsEntry>> {
        text.lines()
            .enumerate()
            .filter_map(|(index, raw)| {
                let line = index + 1;
                let trimmed = raw.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    return None;
                }
                let words: Vec<String> = trimmed.split_whitespace().map(str::to_string).collect();
                if words[0] == "sleep" {
                    return Some(parse_sleep(line, &words));
                }
                Some(Ok(MainsEntry::Launch { line, words }))
            })
            .collect()
    }

    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Vec<Result<MainsEntry>>> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            GuestboxError::Config(format!(
                "Failed to read mains file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(Self::parse_str(&text))
    }
}

fn parse_sleep(line: usize, words: &[String]) -> Result<MainsEntry> {
    match words {
        [_, millis] => millis
            .parse::<u64>()
            .map(|ms| MainsEntry::Sleep {
                line,
                duration: Duration::from_millis(ms),
            })
            .map_err(|e| GuestboxError::Config(format!("line {line}: bad sleep '{millis}': {e}"))),
        _ => Err(GuestboxError::Config(format!(
            "line {line}: sleep takes exactly one argument"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_keeps_line_numbers() {
        let entries = MainsEntry::parse_str(
            "# two guests\n\n-cp demo echo hi\nsleep 25\n  -cp demo props  \nsleep soon\n",
        );
        assert_eq!(entries.len(), 4);

        match entries[0].as_ref().unwrap() {
            MainsEntry::Launch { line, words } => {
                assert_eq!(*line, 3);
                assert_eq!(words, &vec!["-cp", "demo", "echo", "hi"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            entries[1].as_ref().unwrap(),
            &MainsEntry::Sleep {
                line: 4,
                duration: Duration::from_millis(25)
            }
        );
        assert_eq!(entries[2].as_ref().unwrap().line(), 5);

        let err = entries[3].as_ref().unwrap_err().to_string();
        assert!(err.contains("line 6"), "{err}");
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let path = std::env::temp_dir().join(format!("guestbox-missing-{}", uuid::Uuid::new_v4()));
        assert!(matches!(
            MainsEntry::parse_file(&path),
            Err(GuestboxError::Config(_))
        ));
    }
}
