pub mod optimize;
pub mod sample;
pub mod scenes;
pub mod scorer;
pub mod state;

#[cfg(test)]
pub mod stub;

pub use optimize::{OptimizeReport, OptimizeRequest, run_optimized_encode};
pub use scorer::TrialScore;

use crate::config::types::{SamplingConfig, SearchConfig};
use crate::encoder::EncodeConfig;
use crate::error::AppError;
use crate::tools::MediaTools;
use sample::prepare_sample;
use scorer::score_trial;
use state::SearchState;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How a search ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A trial landed within tolerance of the target
    Matched,
    /// The target lies outside what the CRF range can reach
    OutOfRange,
    /// Interpolation stopped making progress
    Stagnated,
    /// The iteration cap was hit
    IterationLimit,
}

impl fmt::Display for SearchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchOutcome::Matched => "matched",
            SearchOutcome::OutOfRange => "out of range",
            SearchOutcome::Stagnated => "stagnated",
            SearchOutcome::IterationLimit => "iteration limit",
        };
        f.write_str(name)
    }
}

/// One measured trial
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreSample {
    pub crf: i32,
    pub vmaf: f64,
}

/// Everything one search needs
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub source: PathBuf,
    pub params: SearchConfig,
    pub sampling: SamplingConfig,
    /// Trial encodes copy this config with the candidate CRF
    pub base_config: EncodeConfig,
    pub vmaf_speed: u32,
}

impl SearchRequest {
    fn validate(&self) -> Result<(), AppError> {
        let p = &self.params;
        if p.max_crf > p.min_crf {
            return Err(AppError::Config(format!(
                "max_crf ({}) must not exceed min_crf ({})",
                p.max_crf, p.min_crf
            )));
        }
        if p.initial_crf < p.max_crf || p.initial_crf > p.min_crf {
            return Err(AppError::Config(format!(
                "initial_crf ({}) must lie between {} and {}",
                p.initial_crf, p.max_crf, p.min_crf
            )));
        }
        if p.tolerance < 0.0 {
            return Err(AppError::Config("tolerance must not be negative".to_string()));
        }
        Ok(())
    }

    fn work_dir(&self) -> PathBuf {
        self.sampling
            .work_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Selected CRF and how it was reached
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub crf: i32,
    pub vmaf: f64,
    pub outcome: SearchOutcome,
    /// Every trial in the order it ran
    pub trials: Vec<ScoreSample>,
}

/// Find the CRF whose sample encode scores within tolerance of the target.
///
/// The sample is built once and removed when the search returns, whatever
/// the outcome. A failing trial aborts the search with the CRF it was run at.
pub fn run_search<T: MediaTools + ?Sized>(
    tools: &T,
    request: &SearchRequest,
) -> Result<SearchResult, AppError> {
    request.validate()?;
    let work_dir = request.work_dir();

    info!(
        "Searching CRF {}..{} for VMAF {:.2} +/- {:.2} on {}",
        request.params.max_crf,
        request.params.min_crf,
        request.params.target_vmaf,
        request.params.tolerance,
        request.source.display()
    );

    let sample = prepare_sample(tools, &request.source, &request.sampling, &work_dir)?;
    let search = CrfSearch {
        tools,
        request,
        sample: sample.path(),
        work_dir: &work_dir,
        trials: Vec::new(),
    };
    search.run()
}

struct CrfSearch<'a, T: ?Sized> {
    tools: &'a T,
    request: &'a SearchRequest,
    sample: &'a Path,
    work_dir: &'a Path,
    trials: Vec<ScoreSample>,
}

impl<T: MediaTools + ?Sized> CrfSearch<'_, T> {
    fn run(mut self) -> Result<SearchResult, AppError> {
        let target = self.request.params.target_vmaf;
        let initial_crf = self.request.params.initial_crf;

        let initial_score = self.trial(initial_crf)?;
        if self.within_tolerance(initial_score) {
            return Ok(self.finish(initial_crf, initial_score, SearchOutcome::Matched));
        }

        // The initial trial replaces whichever end of the range it beats
        let (crf_min, crf_max) = if initial_score > target {
            (self.request.params.min_crf, initial_crf)
        } else {
            (initial_crf, self.request.params.max_crf)
        };
        let mut state = SearchState::new(crf_min, crf_max);
        if let Some(position) = state.position_of(initial_crf) {
            state.record(position, initial_score);
        }

        let low_score = self.endpoint(&mut state, 0)?;
        if self.within_tolerance(low_score) {
            return Ok(self.finish(crf_min, low_score, SearchOutcome::Matched));
        }
        let span = state.span();
        let high_score = self.endpoint(&mut state, span)?;
        if self.within_tolerance(high_score) {
            return Ok(self.finish(crf_max, high_score, SearchOutcome::Matched));
        }

        if high_score < target {
            warn!(
                "VMAF {:.2} unreachable, best is {:.2} at crf {}",
                target, high_score, crf_max
            );
            return Ok(self.finish(crf_max, high_score, SearchOutcome::OutOfRange));
        }
        if low_score > target {
            warn!(
                "VMAF {:.2} exceeded at the cheapest crf {} ({:.2})",
                target, crf_min, low_score
            );
            return Ok(self.finish(crf_min, low_score, SearchOutcome::OutOfRange));
        }

        let mut last_trial = None;
        let mut iterations = 0;
        let outcome = loop {
            let Some(position) = state.next_position(target) else {
                break SearchOutcome::Stagnated;
            };
            if iterations >= self.request.params.max_iterations {
                break SearchOutcome::IterationLimit;
            }
            iterations += 1;

            let crf = state.crf_at(position);
            debug!(
                "Bracket crf {}..{}, trying crf {}",
                state.crf_at(state.low()),
                state.crf_at(state.high()),
                crf
            );
            let score = self.trial(crf)?;
            if self.within_tolerance(score) {
                return Ok(self.finish(crf, score, SearchOutcome::Matched));
            }
            state.observe(position, score, target);
            last_trial = Some((crf, score));
        };

        let (crf, vmaf) = last_trial.unwrap_or((crf_max, high_score));
        Ok(self.finish(crf, vmaf, outcome))
    }

    /// Score at a bracket end, reusing an earlier measurement
    fn endpoint(&mut self, state: &mut SearchState, position: i32) -> Result<f64, AppError> {
        if let Some(score) = state.score_at(position) {
            return Ok(score);
        }
        let score = self.trial(state.crf_at(position))?;
        state.record(position, score);
        Ok(score)
    }

    fn trial(&mut self, crf: i32) -> Result<f64, AppError> {
        let config = self.request.base_config.with_crf(crf);
        let score = score_trial(
            self.tools,
            self.sample,
            &config,
            self.request.vmaf_speed,
            self.work_dir,
        )
        .map_err(|e| match e {
            AppError::Cancelled => AppError::Cancelled,
            other => AppError::Trial {
                crf,
                source: Box::new(other),
            },
        })?;

        self.trials.push(ScoreSample {
            crf,
            vmaf: score.vmaf,
        });
        Ok(score.vmaf)
    }

    fn within_tolerance(&self, score: f64) -> bool {
        (score - self.request.params.target_vmaf).abs() <= self.request.params.tolerance
    }

    fn finish(self, crf: i32, vmaf: f64, outcome: SearchOutcome) -> SearchResult {
        info!(
            "Selected crf {} (VMAF {:.2}, {}) after {} trials",
            crf,
            vmaf,
            outcome,
            self.trials.len()
        );
        SearchResult {
            crf,
            vmaf,
            outcome,
            trials: self.trials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::SceneCut;
    use super::stub::StubTools;
    use std::collections::HashMap;

    fn request(work_dir: &Path, target_vmaf: f64) -> SearchRequest {
        SearchRequest {
            source: PathBuf::from("movie.mkv"),
            params: SearchConfig {
                target_vmaf,
                ..SearchConfig::default()
            },
            sampling: SamplingConfig {
                work_dir: Some(work_dir.to_path_buf()),
                ..SamplingConfig::default()
            },
            base_config: EncodeConfig {
                codec: Some("libx264".to_string()),
                ..Default::default()
            },
            vmaf_speed: 5,
        }
    }

    fn stub(scores: &[(i32, f64)]) -> StubTools {
        StubTools {
            scores: scores.iter().copied().collect::<HashMap<_, _>>(),
            cuts: vec![
                SceneCut {
                    pts_secs: 42.0,
                    significance: 0.7,
                    is_key_frame: true,
                },
                SceneCut {
                    pts_secs: 310.0,
                    significance: 0.5,
                    is_key_frame: false,
                },
            ],
            ..StubTools::default()
        }
    }

    fn is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[test]
    fn test_initial_match_needs_one_trial() {
        let tools = stub(&[(20, 95.2)]);
        let work = tempfile::tempdir().unwrap();

        let result = run_search(&tools, &request(work.path(), 95.2)).unwrap();

        assert_eq!((result.crf, result.vmaf), (20, 95.2));
        assert_eq!(result.outcome, SearchOutcome::Matched);
        assert_eq!(*tools.encodes.borrow(), vec![20]);
    }

    #[test]
    fn test_interpolates_into_tolerance() {
        let tools = stub(&[(30, 70.0), (15, 98.0), (20, 85.0), (18, 90.2)]);
        let work = tempfile::tempdir().unwrap();

        let result = run_search(&tools, &request(work.path(), 90.0)).unwrap();

        // 85 < 90 moves crf_min to 20; crf 15 bounds the top; position 2 is crf 18
        assert_eq!(*tools.encodes.borrow(), vec![20, 15, 18]);
        assert_eq!((result.crf, result.vmaf), (18, 90.2));
        assert_eq!(result.outcome, SearchOutcome::Matched);
        assert_eq!(result.trials.len(), 3);
        assert!(is_empty(work.path()));
    }

    #[test]
    fn test_stagnation_returns_last_trial() {
        let tools = stub(&[(20, 85.0), (15, 98.0), (18, 91.5)]);
        let work = tempfile::tempdir().unwrap();

        let result = run_search(&tools, &request(work.path(), 90.0)).unwrap();

        assert_eq!(*tools.encodes.borrow(), vec![20, 15, 18]);
        assert_eq!((result.crf, result.vmaf), (18, 91.5));
        assert_eq!(result.outcome, SearchOutcome::Stagnated);
    }

    #[test]
    fn test_immediate_stagnation_returns_high_end() {
        // 80.2 interpolates onto the already measured crf 30
        let tools = stub(&[(20, 96.0), (30, 80.0)]);
        let work = tempfile::tempdir().unwrap();

        let result = run_search(&tools, &request(work.path(), 80.7)).unwrap();

        assert_eq!(*tools.encodes.borrow(), vec![20, 30]);
        assert_eq!((result.crf, result.vmaf), (20, 96.0));
        assert_eq!(result.outcome, SearchOutcome::Stagnated);
    }

    #[test]
    fn test_iteration_cap() {
        let tools = stub(&[(20, 85.0), (15, 98.0), (18, 88.0)]);
        let work = tempfile::tempdir().unwrap();
        let mut req = request(work.path(), 90.0);
        req.params.max_iterations = 1;

        let result = run_search(&tools, &req).unwrap();

        assert_eq!(*tools.encodes.borrow(), vec![20, 15, 18]);
        assert_eq!((result.crf, result.vmaf), (18, 88.0));
        assert_eq!(result.outcome, SearchOutcome::IterationLimit);
    }

    #[test]
    fn test_unreachable_target_picks_max_crf() {
        let tools = stub(&[(20, 85.0), (15, 98.0)]);
        let work = tempfile::tempdir().unwrap();

        let result = run_search(&tools, &request(work.path(), 99.0)).unwrap();

        assert_eq!((result.crf, result.vmaf), (15, 98.0));
        assert_eq!(result.outcome, SearchOutcome::OutOfRange);
        assert_eq!(*tools.encodes.borrow(), vec![20, 15]);
    }

    #[test]
    fn test_exceeded_target_picks_min_crf() {
        let tools = stub(&[(20, 85.0), (30, 70.0)]);
        let work = tempfile::tempdir().unwrap();

        let result = run_search(&tools, &request(work.path(), 60.0)).unwrap();

        assert_eq!((result.crf, result.vmaf), (30, 70.0));
        assert_eq!(result.outcome, SearchOutcome::OutOfRange);
    }

    #[test]
    fn test_endpoint_match_returns_early() {
        let tools = stub(&[(20, 85.0), (15, 90.3)]);
        let work = tempfile::tempdir().unwrap();

        let result = run_search(&tools, &request(work.path(), 90.0)).unwrap();

        assert_eq!((result.crf, result.outcome), (15, SearchOutcome::Matched));
        assert_eq!(*tools.encodes.borrow(), vec![20, 15]);
    }

    #[test]
    fn test_trial_failure_carries_crf() {
        let mut tools = stub(&[(20, 85.0)]);
        tools.fail_encode_at = Some(15);
        let work = tempfile::tempdir().unwrap();

        let err = run_search(&tools, &request(work.path(), 90.0)).unwrap_err();

        match err {
            AppError::Trial { crf, source } => {
                assert_eq!(crf, 15);
                assert!(matches!(*source, AppError::Encode(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(is_empty(work.path()));
    }

    #[test]
    fn test_cancel_stops_and_cleans_up() {
        let mut tools = stub(&[(20, 85.0), (15, 98.0), (18, 91.5)]);
        tools.cancel_on_encode = Some(2);
        let work = tempfile::tempdir().unwrap();

        let err = run_search(&tools, &request(work.path(), 90.0)).unwrap_err();

        assert!(matches!(err, AppError::Cancelled));
        assert_eq!(tools.encodes.borrow().len(), 2);
        assert!(is_empty(work.path()));
    }

    #[test]
    fn test_sample_is_built_once() {
        let tools = stub(&[(30, 70.0), (15, 98.0), (20, 85.0), (18, 90.2)]);
        let work = tempfile::tempdir().unwrap();

        run_search(&tools, &request(work.path(), 90.0)).unwrap();

        assert_eq!(tools.extracts.borrow().len(), 2);
        assert_eq!(tools.concats.get(), 1);
    }

    #[test]
    fn test_inverted_range_rejected() {
        let tools = stub(&[]);
        let work = tempfile::tempdir().unwrap();
        let mut req = request(work.path(), 90.0);
        req.params.min_crf = 10;

        let err = run_search(&tools, &req).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(tools.encodes.borrow().is_empty());
    }
}
