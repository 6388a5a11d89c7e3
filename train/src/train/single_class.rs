use super::{build_optimizer, optimize_step, scaled_size};
use crate::{
    common::*,
    config::{Config, DatasetConfig, TrainingConfig},
    logging::{LoggingMessage, Split},
    utils::{self, AvgMeter, LrScheduler, RateCounter},
};

/// Start the single-class Inf-Net training worker.
pub fn single_class_training_worker(
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
                ref size_rates,
                log_steps,
                test_iterations,
                save_epochs,
                ref load_checkpoint,
                device,
            },
        ..
    } = *config;
    let (train_dir, test_dir, train_size, test_size, augment) = match dataset_config {
        DatasetConfig::LungInf {
            train_dir,
            test_dir,
            train_size,
            test_size,
            augment,
        } => (
            train_dir,
            test_dir,
            train_size.get(),
            test_size.get(),
            *augment,
        ),
        _ => bail!("single-class training requires a LungInf dataset"),
    };
    info!("use device {:?}", device);

    // init model
    info!("initializing model");
    let mut vs = nn::VarStore::new(device);
    let model = match model_config.build(&vs.root())? {
        Model::InfNet(model) => model,
        _ => bail!("single-class training requires an InfNet model"),
    };
    info!(
        "Inf-Net ({}) has {} parameters",
        model.backbone_kind(),
        inf_checkpoint::parameter_count(&vs)
    );
    let loss_fn = InfNetLoss::default();
    let mut optimizer = build_optimizer(&vs, optimizer)?;
    let lr_scheduler = LrScheduler::new(lr_schedule)?;

    // load checkpoint
    let init_epoch = utils::try_load_checkpoint(&mut vs, &logging_dir, load_checkpoint)?
        .and_then(|path| utils::checkpoint_epoch(&path))
        .unwrap_or(1);

    // load datasets
    let mut train_batcher = Batcher::new(
        LungInfDataset::new(train_dir, train_size)?,
        batch_size.get(),
        shuffle,
        seed,
    )?;
    let test_dataset = LungInfTestDataset::new(test_dir, test_size)?;
    let total_steps = train_batcher.num_batches();

    info!("start training");
    let mut global_iteration = 0;
    let mut rate_counter = RateCounter::with_second_interval();
    let mut meters: [AvgMeter; 5] = Default::default();

    for epoch in init_epoch..epochs {
        let lr = lr_scheduler.lr(epoch);
        optimizer.set_lr(lr);
        meters.iter_mut().for_each(AvgMeter::reset);

        let batches = train_batcher.epoch(|sample, rng| match &augment {
            Some(augment) => Ok(sample.augment(augment, rng)),
            None => Ok(sample),
        });

        for (step, batch) in (1..).zip(batches) {
            global_iteration += 1;
            let batch = batch?.to_device(device);

            for &rate in size_rates {
                let resized;
                let LungInfBatch {
                    images,
                    gts,
                    edges,
                } = if rate == 1.0 {
                    &batch
                } else {
                    resized = batch.resize(scaled_size(train_size, rate))?;
                    &resized
                };

                let output = model.forward_t(images, true)?;
                let losses = loss_fn.forward(&output, gts, edges)?;
                optimize_step(&mut optimizer, &losses.total_loss, clip);

                let values = LossValues::new(&losses);
                logging_tx
                    .send(LoggingMessage::new_scalars(
                        Split::Training,
                        global_iteration,
                        values.scalars(),
                    ))
                    .map_err(|_| format_err!("cannot send message to logger"))?;

                if rate == 1.0 {
                    izip!(&mut meters, values.per_head()).for_each(|(meter, value)| {
                        meter.update(value);
                    });
                }
            }

            rate_counter.add(batch.batch_size() as f64);
            if step % log_steps.get() == 0 || step == total_steps {
                let [edge, lateral_2, lateral_3, lateral_4, lateral_5] =
                    meters.clone().map(|meter| meter.show());
                info!(
                    "Epoch [{:03}/{:03}], Step [{:04}/{:04}], [lateral-edge: {:.4}, lateral-2: {:.4}, lateral-3: {:.4}, lateral-4: {:.4}, lateral-5: {:.4}]",
                    epoch, epochs, step, total_steps, edge, lateral_2, lateral_3, lateral_4, lateral_5
                );
                if let Some(rate) = rate_counter.rate() {
                    info!("{:.2} records/s", rate);
                }
            }

            if global_iteration % test_iterations.get() == 0 {
                let values = run_test(&model, &loss_fn, &test_dataset, device)?;
                logging_tx
                    .send(LoggingMessage::new_scalars(
                        Split::Testing,
                        global_iteration,
                        values.scalars(),
                    ))
                    .map_err(|_| format_err!("cannot send message to logger"))?;
            }
        }

        if should_save(epoch, epochs, save_epochs.get()) {
            utils::save_checkpoint(
                &vs,
                &checkpoint_dir,
                &utils::single_class_checkpoint_name(epoch + 1),
            )?;
        }
    }

    Ok(())
}

/// Whether the weights after `epoch` are saved.
///
/// Epochs run over `1..epochs` and the checkpoint after `epoch` is named
/// `epoch + 1`, so the final epoch yields `Inf-Net-<epochs>`. The final epoch
/// is always saved.
fn should_save(epoch: usize, epochs: usize, save_epochs: usize) -> bool {
    (epoch + 1) % save_epochs == 0 || epoch + 1 == epochs
}

/// Mean test losses over the whole test split.
fn run_test(
    model: &inf_net::model::InfNet,
    loss_fn: &InfNetLoss,
    dataset: &LungInfTestDataset,
    device: Device,
) -> Result<LossValues> {
    tch::no_grad(|| -> Result<_> {
        let values: Vec<_> = (0..dataset.num_records())
            .map(|index| -> Result<_> {
                let sample = dataset.nth(index)?.to_device(device);
                let (height, width) = sample.gt.size_hw()?;
                let output = model.forward_t(&sample.image, false)?;
                let output = output.resized(height, width)?;
                let losses = loss_fn.evaluate(&output, &sample.gt)?;
                Ok(LossValues::new(&losses))
            })
            .try_collect()?;
        LossValues::mean(&values)
    })
}

/// Scalar copies of the loss terms.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LossValues {
    edge_loss: Option<f64>,
    loss_2: f64,
    loss_3: f64,
    loss_4: f64,
    loss_5: f64,
}

impl LossValues {
    fn new(losses: &InfNetLossOutput) -> Self {
        Self {
            edge_loss: losses.edge_loss.as_ref().map(f64::from),
            loss_2: f64::from(&losses.loss_2),
            loss_3: f64::from(&losses.loss_3),
            loss_4: f64::from(&losses.loss_4),
            loss_5: f64::from(&losses.loss_5),
        }
    }

    fn mean(values: &[Self]) -> Result<Self> {
        ensure!(!values.is_empty(), "no loss values to average");
        let count = values.len() as f64;
        let mean = |get: fn(&Self) -> f64| values.iter().map(get).sum::<f64>() / count;
        let edge_loss = values
            .iter()
            .map(|value| value.edge_loss)
            .collect::<Option<Vec<_>>>()
            .map(|losses| losses.iter().sum::<f64>() / count);

        Ok(Self {
            edge_loss,
            loss_2: mean(|value| value.loss_2),
            loss_3: mean(|value| value.loss_3),
            loss_4: mean(|value| value.loss_4),
            loss_5: mean(|value| value.loss_5),
        })
    }

    /// Segmentation losses of the four heads, excluding the edge loss.
    fn total_loss(&self) -> f64 {
        self.loss_2 + self.loss_3 + self.loss_4 + self.loss_5
    }

    /// Values ordered as edge, lateral-2, lateral-3, lateral-4 and lateral-5.
    fn per_head(&self) -> [f64; 5] {
        [
            self.edge_loss.unwrap_or(f64::NAN),
            self.loss_2,
            self.loss_3,
            self.loss_4,
            self.loss_5,
        ]
    }

    fn scalars(&self) -> Vec<(&'static str, f64)> {
        let Self {
            edge_loss,
            loss_2,
            loss_3,
            loss_4,
            loss_5,
        } = *self;

        edge_loss
            .map(|loss| ("edge_loss", loss))
            .into_iter()
            .chain([
                ("loss2", loss_2),
                ("loss3", loss_3),
                ("loss4", loss_4),
                ("loss5", loss_5),
                ("total_loss", self.total_loss()),
            ])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loss_values_test() -> Result<()> {
        let values = [
            LossValues {
                edge_loss: None,
                loss_2: 1.0,
                loss_3: 2.0,
                loss_4: 3.0,
                loss_5: 4.0,
            },
            LossValues {
                edge_loss: None,
                loss_2: 3.0,
                loss_3: 2.0,
                loss_4: 1.0,
                loss_5: 0.0,
            },
        ];
        let mean = LossValues::mean(&values)?;
        assert_abs_diff_eq!(mean.loss_2, 2.0);
        assert_abs_diff_eq!(mean.total_loss(), 8.0);
        assert_eq!(mean.edge_loss, None);

        let scalars = mean.scalars();
        assert_eq!(scalars.len(), 5);
        assert_eq!(scalars[4], ("total_loss", 8.0));
        assert!(LossValues::mean(&[]).is_err());
        Ok(())
    }

    #[test]
    fn save_schedule_test() {
        let saved: Vec<_> = (1..100)
            .filter(|&epoch| should_save(epoch, 100, 10))
            .map(|epoch| utils::single_class_checkpoint_name(epoch + 1))
            .collect();
        assert_eq!(saved.len(), 10);
        assert_eq!(saved[0], "Inf-Net-10.ckpt");
        assert_eq!(saved[9], "Inf-Net-100.ckpt");

        // the final epoch is kept even off the save period
        assert!(should_save(6, 7, 5));
        assert!(should_save(4, 7, 5));
        assert!(!should_save(5, 7, 5));
    }
}
