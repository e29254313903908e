use super::device::ExecutionMode;

/// Events emitted by long-running workflows so a front end can render progress.
#[derive(Debug, Clone)]
pub enum Progress {
    /// A run of one execution mode begins.
    RunStart { mode: ExecutionMode, total_steps: u64 },
    StepDone,
    RunFinish { mode: ExecutionMode },

    /// A compute's autotuner settled on a block size.
    Tuned { compute: String, block_size: u32 },

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn report_without_callback_is_a_no_op() {
        ProgressReporter::new().report(Progress::StepDone);
    }

    #[test]
    fn report_forwards_events_in_order() {
        let seen = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            let label = match event {
                Progress::RunStart { mode, total_steps } => format!("{mode} x{total_steps}"),
                Progress::StepDone => "step".to_string(),
                Progress::Tuned { compute, block_size } => format!("{compute}@{block_size}"),
                other => format!("{other:?}"),
            };
            seen.lock().unwrap().push(label);
        }));
        reporter.report(Progress::RunStart {
            mode: ExecutionMode::Gpu,
            total_steps: 2,
        });
        reporter.report(Progress::StepDone);
        reporter.report(Progress::Tuned {
            compute: "pair.lj".to_string(),
            block_size: 64,
        });
        drop(reporter);
        assert_eq!(
            seen.into_inner().unwrap(),
            vec!["gpu x2", "step", "pair.lj@64"]
        );
    }
}
