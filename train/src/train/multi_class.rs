use super::{build_optimizer, optimize_step};
use crate::{
    common::*,
    config::{Config, DatasetConfig, TrainingConfig},
    logging::{LoggingMessage, Split},
    utils::{self, LrScheduler},
};
use inf_net::model::UNet;

/// Start the multi-class U-Net training worker.
///
/// A checkpoint is saved whenever the mean validation loss improves.
pub fn multi_class_training_worker(
    config: Arc<Config>,
    logging_dir: Arc<PathBuf>,
    checkpoint_dir: Arc<PathBuf>,
    logging_tx: broadcast::Sender<LoggingMessage>,
) -> Result<()> {
    let Config {
        model: ref model_config,
        dataset: ref dataset_config,
        training:
            TrainingConfig {
                epochs,
                batch_size,
                shuffle,
                seed,
                ref optimizer,
                ref lr_schedule,
                clip,
                log_steps,
                ref load_checkpoint,
                device,
                ..
            },
        ..
    } = *config;
    let (train_dir, val_dir, val_prior_dir, augment) = match dataset_config {
        DatasetConfig::MultiClass {
            train_dir,
            val_dir,
            val_prior_dir,
            augment,
        } => (train_dir, val_dir, val_prior_dir, augment),
        _ => bail!("multi-class training requires a MultiClass dataset"),
    };
    info!("use device {:?}", device);

    // init model
    let mut vs = nn::VarStore::new(device);
    let model = match model_config.build(&vs.root())? {
        Model::UNet(model) => model,
        _ => bail!("multi-class training requires a UNet model"),
    };
    info!(
        "U-Net has {} parameters",
        inf_checkpoint::parameter_count(&vs)
    );
    let loss_fn = MultiClassLoss::default();
    let mut optimizer = build_optimizer(&vs, optimizer)?;
    let lr_scheduler = LrScheduler::new(lr_schedule)?;
    let init_epoch = utils::try_load_checkpoint(&mut vs, &logging_dir, load_checkpoint)?
        .and_then(|path| utils::checkpoint_epoch(&path))
        .unwrap_or(0);

    // load datasets
    let mut train_batcher = Batcher::new(
        MultiClassDataset::new(train_dir)?,
        batch_size.get(),
        shuffle,
        seed,
    )?;
    let val_dataset = match val_prior_dir {
        Some(prior_dir) => MultiClassDataset::with_prior_dir(val_dir, prior_dir)?,
        None => MultiClassDataset::new(val_dir)?,
    };
    let mut val_batcher = Batcher::new(val_dataset, batch_size.get(), false, seed)?;
    let total_steps = train_batcher.num_batches();

    info!("start training");
    let mut best_loss = f64::INFINITY;
    let mut global_iteration = 0;

    for epoch in init_epoch..epochs {
        optimizer.set_lr(lr_scheduler.lr(epoch));

        let batches = train_batcher.epoch(|sample, rng| sample.augment(augment, rng));
        for (step, batch) in batches.enumerate() {
            global_iteration += 1;
            let MultiClassBatch { inputs, masks, .. } = batch?.to_device(device);

            let logits = model.forward_t(&inputs, true)?;
            let loss = loss_fn.forward(&logits, &masks)?;
            optimize_step(&mut optimizer, &loss, clip);

            let loss = f64::from(&loss);
            if step % log_steps.get() == 0 {
                info!(
                    "Epoch: {}/{}, Step: {}/{}, Train loss is {}",
                    epoch, epochs, step, total_steps, loss
                );
            }
            logging_tx
                .send(LoggingMessage::new_scalars(
                    Split::Training,
                    global_iteration,
                    [("train/loss", loss)],
                ))
                .map_err(|_| format_err!("cannot send message to logger"))?;
        }

        let validation = validate(&model, &loss_fn, &mut val_batcher, device)?;
        info!(
            "Epoch: {}/{}, validation loss {:.5}, dice {:.4}",
            epoch, epochs, validation.loss, validation.dice
        );
        logging_tx
            .send(LoggingMessage::new_scalars(
                Split::Testing,
                epoch,
                validation.scalars(),
            ))
            .map_err(|_| format_err!("cannot send message to logger"))?;

        if validation.loss < best_loss {
            best_loss = validation.loss;
            utils::save_checkpoint(
                &vs,
                &checkpoint_dir,
                &utils::multi_class_checkpoint_name(epoch + 1),
            )?;
        }
    }

    Ok(())
}

fn validate(
    model: &UNet,
    loss_fn: &MultiClassLoss,
    batcher: &mut Batcher<MultiClassDataset>,
    device: Device,
) -> Result<ValidationSummary> {
    tch::no_grad(|| -> Result<_> {
        let summaries: Vec<_> = batcher
            .epoch(|sample, _| Ok(sample))
            .map(|batch| -> Result<_> {
                let MultiClassBatch { inputs, masks, .. } = batch?.to_device(device);
                let logits = model.forward_t(&inputs, false)?;
                let loss = f64::from(&loss_fn.forward(&logits, &masks)?);
                let counts = ConfusionCounts::from_tensors(&logits.sigmoid(), &masks, 0.5)?;
                Ok(ValidationSummary::from_batch(loss, &counts))
            })
            .try_collect()?;
        ValidationSummary::mean(&summaries)
    })
}

/// Batch-level validation metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ValidationSummary {
    loss: f64,
    dice: f64,
    jaccard: f64,
    sensitivity: f64,
    precision: f64,
}

impl ValidationSummary {
    fn from_batch(loss: f64, counts: &ConfusionCounts) -> Self {
        Self {
            loss,
            dice: counts.dice(),
            jaccard: counts.jaccard(),
            sensitivity: counts.sensitivity(),
            precision: counts.precision(),
        }
    }

    /// Per-field mean over batches, skipping NaN values.
    fn mean(summaries: &[Self]) -> Result<Self> {
        ensure!(!summaries.is_empty(), "the validation split is empty");
        let mean = |get: fn(&Self) -> f64| {
            let (sum, count) = summaries
                .iter()
                .map(get)
                .filter(|value| !value.is_nan())
                .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
            if count == 0 {
                f64::NAN
            } else {
                sum / count as f64
            }
        };

        Ok(Self {
            loss: mean(|summary| summary.loss),
            dice: mean(|summary| summary.dice),
            jaccard: mean(|summary| summary.jaccard),
            sensitivity: mean(|summary| summary.sensitivity),
            precision: mean(|summary| summary.precision),
        })
    }

    fn scalars(&self) -> [(&'static str, f64); 5] {
        [
            ("test/loss", self.loss),
            ("test/dice", self.dice),
            ("test/jaccard", self.jaccard),
            ("test/sensitivity", self.sensitivity),
            ("test/precision", self.precision),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_mean_test() -> Result<()> {
        let counts = ConfusionCounts {
            true_pos: 2,
            false_pos: 1,
            true_neg: 5,
            false_neg: 1,
        };
        let empty = ConfusionCounts {
            true_neg: 9,
            ..Default::default()
        };
        let summaries = [
            ValidationSummary::from_batch(0.2, &counts),
            ValidationSummary::from_batch(0.4, &empty),
        ];
        let mean = ValidationSummary::mean(&summaries)?;
        assert_abs_diff_eq!(mean.loss, 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(mean.dice, 4.0 / 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mean.jaccard, 0.5, epsilon = 1e-12);
        assert_eq!(mean.scalars()[0].0, "test/loss");
        Ok(())
    }
}
