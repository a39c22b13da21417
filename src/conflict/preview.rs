//! Conflict-marker parsing and binary-file advice.
//!
//! The marker parser is a small state machine over the lines of a file:
//! states `{outside, in_ours, in_theirs}`, transitions on `<<<<<<< `,
//! `=======` and `>>>>>>> `.

/// Extracted sides of the conflicts in one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConflictPreview {
    /// Lines between `<<<<<<<` and `=======`, capped.
    pub ours: Vec<String>,
    /// Lines between `=======` and `>>>>>>>`, capped.
    pub theirs: Vec<String>,
    /// 1-based line number of the first conflict marker.
    pub first_conflict_line: Option<usize>,
    pub conflict_count: usize,
    /// How many side lines were dropped by the cap.
    pub truncated_ours: usize,
    pub truncated_theirs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerState {
    Outside,
    InOurs,
    InTheirs,
}

/// Parse conflict markers out of file content, keeping at most `max_lines`
/// per side.
pub fn parse_conflict_markers(content: &str, max_lines: usize) -> ConflictPreview {
    let mut preview = ConflictPreview::default();
    let mut state = MarkerState::Outside;

    for (i, line) in content.lines().enumerate() {
        if line.starts_with("<<<<<<< ") {
            state = MarkerState::InOurs;
            preview.conflict_count += 1;
            if preview.first_conflict_line.is_none() {
                preview.first_conflict_line = Some(i + 1);
            }
        } else if line.starts_with("=======") && state == MarkerState::InOurs {
            state = MarkerState::InTheirs;
        } else if line.starts_with(">>>>>>> ") {
            state = MarkerState::Outside;
        } else {
            match state {
                MarkerState::Outside => {}
                MarkerState::InOurs => {
                    if preview.ours.len() < max_lines {
                        preview.ours.push(line.to_string());
                    } else {
                        preview.truncated_ours += 1;
                    }
                }
                MarkerState::InTheirs => {
                    if preview.theirs.len() < max_lines {
                        preview.theirs.push(line.to_string());
                    } else {
                        preview.truncated_theirs += 1;
                    }
                }
            }
        }
    }

    preview
}

/// Advice for conflicts in files that cannot be previewed as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryAdvice {
    /// Compiled/generated artifact: accept the remote version, it will be
    /// regenerated from source.
    GeneratedArtifact,
    /// Image: no automatic recommendation, the user has to look.
    Image,
    /// Archive or other opaque blob.
    Opaque,
}

const GENERATED_EXTENSIONS: &[&str] = &[".mo", ".pyc", ".so", ".o", ".a", ".exe", ".dll", ".bin"];
const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".ico", ".svg"];
const ARCHIVE_EXTENSIONS: &[&str] = &[".pdf", ".zip", ".tar", ".gz", ".bz2", ".xz", ".rar", ".7z"];

/// Classify a path by extension; `None` means it is treated as text.
pub fn binary_advice(path: &str) -> Option<BinaryAdvice> {
    let lower = path.to_lowercase();
    if GENERATED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        Some(BinaryAdvice::GeneratedArtifact)
    } else if IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        Some(BinaryAdvice::Image)
    } else if ARCHIVE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        Some(BinaryAdvice::Opaque)
    } else {
        None
    }
}
