//! Final artifact naming and writing.

use crate::errors::WorkflowError;
use crate::workflow::CandidateArtifact;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-zA-Z0-9\x{4e00}-\x{9fa5}]").expect("static regex is valid")
});

/// Longest stem in bytes. Leaves room for the `.` and `.md.tmp` affixes
/// under the common 255-byte file name limit.
pub const MAX_STEM_BYTES: usize = 200;

/// File stem for a title: ASCII alphanumerics and CJK ideographs
/// (U+4E00..=U+9FA5) are kept, everything else becomes `_`. Long stems are
/// cut at a char boundary to `MAX_STEM_BYTES`.
pub fn sanitize_title(title: &str) -> String {
    let mut stem = UNSAFE_CHARS.replace_all(title.trim(), "_").into_owned();
    if stem.len() > MAX_STEM_BYTES {
        let mut end = MAX_STEM_BYTES;
        while !stem.is_char_boundary(end) {
            end -= 1;
        }
        stem.truncate(end);
    }
    if stem.is_empty() {
        "untitled".to_string()
    } else {
        stem
    }
}

/// Path the final artifact for `title` is written to.
pub fn final_output_path(output_dir: &Path, title: &str) -> PathBuf {
    output_dir.join(format!("{}.md", sanitize_title(title)))
}

/// Write the candidate as the run's final output.
///
/// Content goes to a hidden temp file first and is renamed into place, so an
/// interrupted write never leaves a partial final file.
pub fn write_final(output_dir: &Path, candidate: &CandidateArtifact) -> Result<PathBuf, WorkflowError> {
    let path = final_output_path(output_dir, &candidate.title);
    let tmp = output_dir.join(format!(".{}.md.tmp", sanitize_title(&candidate.title)));

    let result = fs::create_dir_all(output_dir)
        .and_then(|_| fs::write(&tmp, &candidate.content))
        .and_then(|_| fs::rename(&tmp, &path));

    if let Err(source) = result {
        let _ = fs::remove_file(&tmp);
        return Err(WorkflowError::OutputWriteFailed { path, source });
    }
    Ok(path)
}
