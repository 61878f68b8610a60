//! Stage files and subject discovery.
//!
//! A stage file holds one whitespace-separated token per epoch. Lines whose
//! first non-blank character is `#` are comments.

use std::path::{Path, PathBuf};

use hypnogram_core::StageLabel;
use hypnogram_core::stage::parse_stage_tokens;

use crate::error::{HarnessError, HarnessResult};

/// File extensions recognised as stage files in a batch directory.
pub const STAGE_EXTENSIONS: &[&str] = &["txt", "stages", "eannot"];

/// One subject's staged night.
#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    pub id: String,
    pub stages: Vec<StageLabel>,
}

/// Parse stage text, skipping comment lines.
pub fn parse_stage_text(text: &str) -> Result<Vec<StageLabel>, hypnogram_core::HypnoError> {
    let body: String = text
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");
    parse_stage_tokens(&body)
}

/// Read one stage file.
pub fn load_stage_file(path: &Path) -> HarnessResult<Vec<StageLabel>> {
    let text = std::fs::read_to_string(path)?;
    parse_stage_text(&text).map_err(|source| HarnessError::Input {
        path: path.to_path_buf(),
        source,
    })
}

/// Subject id for a stage file: its file stem.
#[must_use]
pub fn subject_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Stage files directly inside `dir`, sorted by path.
pub fn discover_stage_files(dir: &Path) -> HarnessResult<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| STAGE_EXTENSIONS.contains(&ext))
        })
        .collect();
    paths.sort();
    if paths.is_empty() {
        return Err(HarnessError::NoSubjects(dir.to_path_buf()));
    }
    Ok(paths)
}

/// Load every stage file in `dir`. Unparseable files are returned as errors
/// alongside the subjects that loaded.
pub fn load_subjects(dir: &Path) -> HarnessResult<(Vec<Subject>, Vec<HarnessError>)> {
    let mut subjects = Vec::new();
    let mut failures = Vec::new();
    for path in discover_stage_files(dir)? {
        match load_stage_file(&path) {
            Ok(stages) => subjects.push(Subject {
                id: subject_id(&path),
                stages,
            }),
            Err(err) => failures.push(err),
        }
    }
    Ok((subjects, failures))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_are_skipped() {
        let stages = parse_stage_text("# subject 7\nW W N1\n  # mid-night note\nN2 R\n").unwrap();
        assert_eq!(
            stages,
            vec![
                StageLabel::Wake,
                StageLabel::Wake,
                StageLabel::Nrem1,
                StageLabel::Nrem2,
                StageLabel::Rem
            ]
        );
    }

    #[test]
    fn subject_id_is_file_stem() {
        assert_eq!(subject_id(Path::new("/data/s001.stages")), "s001");
    }
}
