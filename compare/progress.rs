use std::fmt;

/// Stages reported while building a dataset collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadStage {
    Parsing,
    Ranking,
}

impl LoadStage {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Parsing => "call file parsing",
            Self::Ranking => "marker count ranking",
        }
    }
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Observer for reporting progress while sources are loaded. Sources are parsed
/// in parallel, so callbacks may arrive from several threads at once.
pub trait LoadProgress: Sync {
    fn on_stage_start(&self, stage: LoadStage, total_sources: usize) {
        let _ = (stage, total_sources);
    }
    fn on_source_loaded(&self, source: &str, markers: usize) {
        let _ = (source, markers);
    }
    fn on_stage_finish(&self, stage: LoadStage) {
        let _ = stage;
    }
}

#[derive(Default)]
pub struct NoopLoadProgress;

impl LoadProgress for NoopLoadProgress {}
