//! `comment.dat` metadata lookup.

use std::path::Path;

use eva_core::CommentData;

/// Name of the metadata file in a working directory.
pub const COMMENT_FILE: &str = "comment.dat";

/// Finds a run's block in the text of a comment file.
///
/// The block starts at the first line containing `Run {run_num}`; start
/// time, end time and event count follow on the next three lines and the
/// free-text comment sits five lines below the match. Lines past the end of
/// the file fall back to a single space.
#[must_use]
pub fn find_comment(text: &str, run_num: &str) -> Option<CommentData> {
    let needle = format!("Run {run_num}");
    let lines: Vec<&str> = text.lines().collect();
    let index = lines.iter().position(|line| line.contains(&needle))?;
    let line_at = |offset: usize| {
        lines
            .get(index + offset)
            .map_or_else(|| " ".to_string(), |line| (*line).to_string())
    };
    Some(CommentData {
        start_time: line_at(1),
        end_time: line_at(2),
        events: line_at(3),
        comment: line_at(5),
    })
}

/// Reads `comment.dat` from `dir` and looks up `run_num`.
///
/// Returns `None` if the file cannot be read or holds no entry for the run.
#[must_use]
pub fn load_comment(dir: &Path, run_num: &str) -> Option<CommentData> {
    let path = dir.join(COMMENT_FILE);
    let text = match std::fs::read(&path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            log::warn!("Could not read {}: {e}", path.display());
            return None;
        }
    };
    let found = find_comment(&text, run_num);
    if found.is_none() {
        log::warn!("No entry for run {run_num} in {}", path.display());
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TEXT: &str = "\
Run 2629
Run start time     : 2024-03-01 08:00:00
Run end time       : 2024-03-01 09:00:00
Number of events :  1500
Title    : calibration
Comment  : Eu-152 source
Run 2630
Run start time     : 2024-03-01 10:00:00
Run end time       : 2024-03-01 11:30:00
Number of events :  2000
Title    : sample
Comment  : Cu target
";

    #[test]
    fn test_find_comment() {
        let data = find_comment(TEXT, "2630").unwrap();
        assert_eq!(data.start_time, "Run start time     : 2024-03-01 10:00:00");
        assert_eq!(data.events, "Number of events :  2000");
        assert_eq!(data.comment, "Comment  : Cu target");
        assert_eq!(data.event_count().unwrap(), 2000);
    }

    #[test]
    fn test_find_comment_truncated_block() {
        let data = find_comment("Run 7\nstart\nend\n", "7").unwrap();
        assert_eq!(data.end_time, "end");
        assert_eq!(data.events, " ");
        assert_eq!(data.comment, " ");
        assert!(find_comment(TEXT, "9999").is_none());
    }

    #[test]
    fn test_load_comment_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(load_comment(dir.path(), "2630").is_none());

        std::fs::write(dir.path().join(COMMENT_FILE), TEXT).unwrap();
        let data = load_comment(dir.path(), "2629").unwrap();
        assert_eq!(data.comment, "Comment  : Eu-152 source");
    }
}
