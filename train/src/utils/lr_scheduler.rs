use crate::{common::*, config::LearningRateSchedule};

/// Per-epoch learning rate.
#[derive(Debug, Clone)]
pub enum LrScheduler {
    Constant {
        lr: R64,
    },
    StepDecay {
        lr: R64,
        decay_rate: R64,
        decay_epochs: usize,
    },
    StepWise {
        steps: Vec<(usize, R64)>,
    },
}

impl LrScheduler {
    pub fn new(config: &LearningRateSchedule) -> Result<Self> {
        let scheduler = match *config {
            LearningRateSchedule::Constant { lr } => {
                ensure!(lr >= 0.0, "the lr must be positive");
                Self::Constant { lr }
            }
            LearningRateSchedule::StepDecay {
                lr,
                decay_rate,
                decay_epochs,
            } => {
                ensure!(lr >= 0.0, "the lr must be positive");
                ensure!(decay_rate > 0.0, "the decay_rate must be positive");
                Self::StepDecay {
                    lr,
                    decay_rate,
                    decay_epochs: decay_epochs.get(),
                }
            }
            LearningRateSchedule::StepWise { ref steps } => {
                ensure!(
                    !steps.is_empty() && steps[0].0 == 0,
                    "the steps must start from zero"
                );

                steps.iter().try_fold(None, |prev_epoch, (curr_epoch, lr)| {
                    if let Some(prev_epoch) = prev_epoch {
                        ensure!(curr_epoch > prev_epoch, "the steps must be monotonic");
                    }
                    ensure!(lr.raw() > 0.0, "lr must be positive");
                    Ok(Some(curr_epoch))
                })?;

                Self::StepWise {
                    steps: steps.clone(),
                }
            }
        };

        Ok(scheduler)
    }

    pub fn lr(&self, epoch: usize) -> f64 {
        match self {
            Self::Constant { lr } => lr.raw(),
            Self::StepDecay {
                lr,
                decay_rate,
                decay_epochs,
            } => {
                let decay = decay_rate.raw().powi((epoch / decay_epochs) as i32);
                lr.raw() * decay
            }
            Self::StepWise { steps } => {
                let index = match steps.binary_search_by_key(&epoch, |(from_epoch, _lr)| *from_epoch)
                {
                    Ok(index) => index,
                    Err(index) => index.saturating_sub(1),
                };
                steps[index].1.raw()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_decay_test() -> Result<()> {
        let scheduler = LrScheduler::new(&LearningRateSchedule::StepDecay {
            lr: r64(1e-4),
            decay_rate: r64(0.1),
            decay_epochs: NonZeroUsize::new(50).unwrap(),
        })?;
        assert_abs_diff_eq!(scheduler.lr(1), 1e-4);
        assert_abs_diff_eq!(scheduler.lr(49), 1e-4);
        assert_abs_diff_eq!(scheduler.lr(50), 1e-5, epsilon = 1e-12);
        assert_abs_diff_eq!(scheduler.lr(99), 1e-5, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn step_wise_test() -> Result<()> {
        let scheduler = LrScheduler::new(&LearningRateSchedule::StepWise {
            steps: vec![(0, r64(0.1)), (10, r64(0.01))],
        })?;
        assert_abs_diff_eq!(scheduler.lr(0), 0.1);
        assert_abs_diff_eq!(scheduler.lr(9), 0.1);
        assert_abs_diff_eq!(scheduler.lr(10), 0.01);
        assert_abs_diff_eq!(scheduler.lr(20), 0.01);

        assert!(LrScheduler::new(&LearningRateSchedule::StepWise {
            steps: vec![(1, r64(0.1))],
        })
        .is_err());
        Ok(())
    }
}
