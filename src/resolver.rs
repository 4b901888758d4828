//! Backend entry point discovery.
//!
//! Candidates are checked in order and the first existing file wins, so a
//! packaged layout can be listed ahead of the development tree.

use glob::glob;
use std::path::{Path, PathBuf};

use crate::config::BackendConfig;

const EXE_DIR_TOKEN: &str = "{exe_dir}";

#[derive(Debug, Clone)]
pub struct EntryResolver {
    candidates: Vec<PathBuf>,
    base_dir: Option<PathBuf>,
    fixed: bool,
}

impl EntryResolver {
    pub fn new<I, P>(candidates: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
            base_dir: None,
            fixed: false,
        }
    }

    /// 이미 결정된 엔트리 경로. 탐색 없이 시작 시 존재 여부만 확인한다.
    pub fn fixed(path: impl Into<PathBuf>) -> Self {
        Self {
            candidates: vec![path.into()],
            base_dir: None,
            fixed: true,
        }
    }

    pub fn from_config(cfg: &BackendConfig) -> Self {
        let resolver = match &cfg.entry {
            Some(entry) => Self::fixed(entry.clone()),
            None => {
                let exe_dir = current_exe_dir();
                Self::new(
                    cfg.candidates
                        .iter()
                        .map(|c| expand_exe_dir(c, exe_dir.as_deref())),
                )
            }
        };
        match &cfg.base_dir {
            Some(dir) => resolver.with_base_dir(dir.clone()),
            None => resolver,
        }
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Candidates as displayable strings, for error reporting.
    pub fn describe(&self) -> Vec<String> {
        self.candidates
            .iter()
            .map(|c| self.absolutize(c).display().to_string())
            .collect()
    }

    pub fn resolve(&self) -> Option<PathBuf> {
        for candidate in &self.candidates {
            let path = self.absolutize(candidate);

            if !self.fixed && is_pattern(&path) {
                let Some(pattern) = path.to_str() else {
                    continue;
                };
                match glob(pattern) {
                    Ok(paths) => {
                        if let Some(hit) = paths.flatten().find(|p| p.is_file()) {
                            tracing::info!("Resolved backend entry: {}", hit.display());
                            return Some(hit);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Skipping invalid entry pattern '{}': {}", pattern, e);
                    }
                }
                continue;
            }

            if path.is_file() {
                tracing::info!("Resolved backend entry: {}", path.display());
                return Some(path);
            }
            tracing::debug!("Entry candidate missing: {}", path.display());
        }

        tracing::warn!("No backend entry point found among {} candidate(s)", self.candidates.len());
        None
    }

    fn absolutize(&self, candidate: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if candidate.is_relative() => base.join(candidate),
            _ => candidate.to_path_buf(),
        }
    }
}

fn is_pattern(path: &Path) -> bool {
    path.to_str()
        .map(|s| s.contains(['*', '?', '[']))
        .unwrap_or(false)
}

fn current_exe_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

fn expand_exe_dir(candidate: &str, exe_dir: Option<&Path>) -> PathBuf {
    match (candidate.strip_prefix(EXE_DIR_TOKEN), exe_dir) {
        (Some(rest), Some(dir)) => dir.join(rest.trim_start_matches(['/', '\\'])),
        // no executable dir: leave the remainder relative
        (Some(rest), None) => PathBuf::from(rest.trim_start_matches(['/', '\\'])),
        (None, _) => PathBuf::from(candidate),
    }
}
