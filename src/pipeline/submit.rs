use std::time::Duration;

use anyhow::anyhow;

use crate::progress::ConsoleProgress;
use crate::service::TranslationService;

/// Sleep dependency of the poll loop, swapped out in tests.
pub trait Clock {
    fn sleep(&self, d: Duration);
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

/// Lifecycle of one submitted job. Polling is unbounded: a job only
/// leaves the loop through a terminal state reported by the service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobPhase {
    Submitted { job_id: String },
    Polling { job_id: String, status: String },
    Completed { output_file_id: String },
    Failed { status: String },
}

/// Terminal result of [`wait_for_job`]. A failed job is skipped by the
/// caller, not propagated as an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { output_file_id: String },
    Failed { status: String },
}

/// One status fetch. Terminal phases pass through unchanged.
pub fn advance(service: &dyn TranslationService, phase: JobPhase) -> anyhow::Result<JobPhase> {
    let job_id = match phase {
        JobPhase::Submitted { job_id } => job_id,
        JobPhase::Polling { job_id, .. } => job_id,
        terminal @ (JobPhase::Completed { .. } | JobPhase::Failed { .. }) => return Ok(terminal),
    };

    let status = service.job_status(&job_id)?;
    if status.is_success() {
        let output_file_id = status
            .output_file_id
            .ok_or_else(|| anyhow!("job {job_id} completed without an output file id"))?;
        return Ok(JobPhase::Completed { output_file_id });
    }
    if status.is_failure() {
        return Ok(JobPhase::Failed {
            status: status.status,
        });
    }

    Ok(JobPhase::Polling {
        job_id,
        status: status.status,
    })
}

/// Block until the job reaches a terminal state, sleeping `interval`
/// between polls. No backoff, no retry cap, no timeout ceiling.
pub fn wait_for_job(
    service: &dyn TranslationService,
    clock: &dyn Clock,
    interval: Duration,
    job_id: String,
    progress: &ConsoleProgress,
) -> anyhow::Result<JobOutcome> {
    let mut phase = JobPhase::Submitted { job_id };

    loop {
        phase = match advance(service, phase)? {
            JobPhase::Completed { output_file_id } => {
                return Ok(JobOutcome::Completed { output_file_id })
            }
            JobPhase::Failed { status } => return Ok(JobOutcome::Failed { status }),
            other => other,
        };

        if let JobPhase::Polling { job_id, status } = &phase {
            progress.info(format!("job {job_id}: {status}"));
            clock.sleep(interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{advance, wait_for_job, Clock, JobOutcome, JobPhase};
    use crate::progress::ConsoleProgress;
    use crate::service::{JobStatus, TranslationService};

    use std::cell::RefCell;
    use std::path::Path;
    use std::time::Duration;

    /// Plays back a scripted sequence of status responses.
    struct ScriptedService {
        statuses: RefCell<Vec<JobStatus>>,
    }

    impl ScriptedService {
        fn new(script: &[(&str, Option<&str>)]) -> Self {
            let statuses = script
                .iter()
                .map(|(status, output)| JobStatus {
                    status: status.to_string(),
                    output_file_id: output.map(|s| s.to_string()),
                })
                .collect();
            Self {
                statuses: RefCell::new(statuses),
            }
        }
    }

    impl TranslationService for ScriptedService {
        fn upload_batch_file(&self, _path: &Path) -> anyhow::Result<String> {
            Ok("file-1".to_string())
        }

        fn create_job(&self, _input_file_id: &str) -> anyhow::Result<String> {
            Ok("job-1".to_string())
        }

        fn job_status(&self, _job_id: &str) -> anyhow::Result<JobStatus> {
            let mut statuses = self.statuses.borrow_mut();
            anyhow::ensure!(!statuses.is_empty(), "polled past end of script");
            Ok(statuses.remove(0))
        }

        fn download_output(&self, _file_id: &str) -> anyhow::Result<Vec<u8>> {
            Ok(b"payload".to_vec())
        }
    }

    struct RecordingClock {
        sleeps: RefCell<Vec<Duration>>,
    }

    impl RecordingClock {
        fn new() -> Self {
            Self {
                sleeps: RefCell::new(Vec::new()),
            }
        }
    }

    impl Clock for RecordingClock {
        fn sleep(&self, d: Duration) {
            self.sleeps.borrow_mut().push(d);
        }
    }

    #[test]
    fn advance_moves_submitted_to_polling() {
        let service = ScriptedService::new(&[("in_progress", None)]);
        let phase = advance(
            &service,
            JobPhase::Submitted {
                job_id: "job-1".to_string(),
            },
        )
        .expect("advance");
        assert_eq!(
            phase,
            JobPhase::Polling {
                job_id: "job-1".to_string(),
                status: "in_progress".to_string(),
            }
        );
    }

    #[test]
    fn advance_leaves_terminal_phases_untouched() {
        let service = ScriptedService::new(&[]);
        let done = JobPhase::Completed {
            output_file_id: "file-9".to_string(),
        };
        assert_eq!(advance(&service, done.clone()).expect("advance"), done);

        let failed = JobPhase::Failed {
            status: "expired".to_string(),
        };
        assert_eq!(advance(&service, failed.clone()).expect("advance"), failed);
    }

    #[test]
    fn completed_without_output_file_is_an_error() {
        let service = ScriptedService::new(&[("completed", None)]);
        let err = advance(
            &service,
            JobPhase::Submitted {
                job_id: "job-1".to_string(),
            },
        )
        .expect_err("no output id");
        assert!(err.to_string().contains("without an output file id"));
    }

    #[test]
    fn wait_polls_until_completed_without_real_sleeps() {
        let service = ScriptedService::new(&[
            ("validating", None),
            ("in_progress", None),
            ("finalizing", None),
            ("completed", Some("file-out")),
        ]);
        let clock = RecordingClock::new();
        let progress = ConsoleProgress::new(false);

        let outcome = wait_for_job(
            &service,
            &clock,
            Duration::from_secs(10),
            "job-1".to_string(),
            &progress,
        )
        .expect("wait");

        assert_eq!(
            outcome,
            JobOutcome::Completed {
                output_file_id: "file-out".to_string(),
            }
        );
        // One sleep per non-terminal status.
        assert_eq!(clock.sleeps.borrow().len(), 3);
        assert!(clock
            .sleeps
            .borrow()
            .iter()
            .all(|d| *d == Duration::from_secs(10)));
    }

    #[test]
    fn terminal_failure_states_end_the_wait() {
        for status in ["failed", "expired", "cancelling", "cancelled"] {
            let service = ScriptedService::new(&[("in_progress", None), (status, None)]);
            let clock = RecordingClock::new();
            let progress = ConsoleProgress::new(false);

            let outcome = wait_for_job(
                &service,
                &clock,
                Duration::from_secs(1),
                "job-1".to_string(),
                &progress,
            )
            .expect("wait");

            assert_eq!(
                outcome,
                JobOutcome::Failed {
                    status: status.to_string(),
                }
            );
            assert_eq!(clock.sleeps.borrow().len(), 1);
        }
    }
}
