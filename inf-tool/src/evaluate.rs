use crate::common::*;
use inf_net::metrics::{
    ClassReport, ClassThresholds, MetricsLog, MultiClassEvaluator, MultiClassReport, Summary,
    CLASS_NAMES,
};

#[derive(Debug, Clone)]
pub struct EvaluateArgs {
    pub pred_dir: PathBuf,
    pub gt_dir: PathBuf,
    pub checkpoint: String,
    pub log_file: PathBuf,
    pub ggo_threshold: f64,
    pub consolidation_threshold: f64,
}

pub fn evaluate(args: EvaluateArgs) -> Result<MultiClassReport> {
    let EvaluateArgs {
        pred_dir,
        gt_dir,
        checkpoint,
        log_file,
        ggo_threshold,
        consolidation_threshold,
    } = args;

    let evaluator = evaluate_dirs(
        &pred_dir,
        &gt_dir,
        ClassThresholds {
            ggo: ggo_threshold,
            consolidation: consolidation_threshold,
        },
    )?;
    let report = evaluator.report()?;

    report_table(&report).printstd();
    println!("{}", report);

    let log = MetricsLog::new(&log_file);
    log.append(&checkpoint, evaluator.ggo_dice(), evaluator.consolidation_dice())?;
    info!("appended Dice scores to '{}'", log.path().display());

    Ok(report)
}

/// Evaluates every prediction in `pred_dir` against the mask of the same stem in `gt_dir`.
pub fn evaluate_dirs(
    pred_dir: &Path,
    gt_dir: &Path,
    thresholds: ClassThresholds,
) -> Result<MultiClassEvaluator> {
    let mut evaluator = MultiClassEvaluator::new(thresholds);

    for pred_file in list_images(pred_dir)? {
        let gt_file = find_counterpart(gt_dir, file_stem(&pred_file)?)?;
        let mask = class_index_to_one_hot(
            &gt_to_class_index(&load_gray_image(&gt_file)?.to_raw_tensor())?,
            3,
        )?;
        let (height, width) = mask.size_hw()?;
        let scores = prediction_scores(&load_rgb_image(&pred_file)?.to_tensor())?
            .resize2d_bilinear(height, width, false)?;

        evaluator
            .update(&scores, &mask)
            .with_context(|| format!("unable to evaluate '{}'", pred_file.display()))?;
    }

    info!("evaluated {} images", evaluator.len());
    Ok(evaluator)
}

/// Recovers `[3, H, W]` class scores from a color-coded prediction.
///
/// The red channel holds ground-glass opacities and the green channel holds
/// consolidation. Background is what neither of them covers.
pub fn prediction_scores(rgb: &Tensor) -> Result<Tensor> {
    ensure!(
        rgb.dim() == 3 && rgb.size()[0] == 3,
        "expect a [3, H, W] image, but get {:?}",
        rgb.size()
    );
    let ggo = rgb.i(0);
    let consolidation = rgb.i(1);
    let background = 1.0 - ggo.maximum(&consolidation);
    Ok(Tensor::stack(&[background, ggo, consolidation], 0))
}

fn report_table(report: &MultiClassReport) -> Table {
    let cell_text = |summary: &Summary| format!("{:.4} ± {:.4}", summary.mean, summary.error);

    let mut table = Table::new();
    table.add_row(row![
        "class",
        "dice",
        "jaccard",
        "sensitivity",
        "precision",
        "specificity",
        "MAE"
    ]);

    let sections = CLASS_NAMES
        .iter()
        .zip(&report.classes)
        .chain(std::iter::once((&"overall", &report.overall)));
    for (name, class) in sections {
        let ClassReport {
            loss,
            dice,
            jaccard,
            sensitivity,
            precision,
            specificity,
        } = class;
        table.add_row(row![
            name,
            cell_text(dice),
            cell_text(jaccard),
            cell_text(sensitivity),
            cell_text(precision),
            cell_text(specificity),
            cell_text(loss)
        ]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("inf-tool-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("pred")).unwrap();
        std::fs::create_dir_all(dir.join("gt")).unwrap();
        dir
    }

    #[test]
    fn prediction_scores_test() -> Result<()> {
        let rgb = Tensor::of_slice(&[
            1f32, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0,
        ])
        .view([3, 1, 3]);
        let scores = prediction_scores(&rgb)?;
        let classes = Vec::<i64>::from(&scores.argmax(0, false).view([-1]));
        assert_eq!(classes, vec![1, 2, 0]);
        assert!(prediction_scores(&rgb.i(0..2)).is_err());
        Ok(())
    }

    #[test]
    fn evaluate_dirs_test() -> Result<()> {
        let dir = temp_dir("evaluate");

        // left half GGO, right half consolidation
        let gt = GrayImage::from_fn(4, 4, |x, _| if x < 2 { Luma([128]) } else { Luma([255]) });
        gt.save(dir.join("gt/Patient1_0.png"))?;
        let pred = RgbImage::from_fn(4, 4, |x, _| {
            if x < 2 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 255, 0])
            }
        });
        pred.save(dir.join("pred/Patient1_0.png"))?;

        let evaluator = evaluate_dirs(&dir.join("pred"), &dir.join("gt"), Default::default())?;
        assert_eq!(evaluator.len(), 1);
        let report = evaluator.report()?;
        assert_abs_diff_eq!(report.classes[1].dice.mean, 1.0);
        assert_abs_diff_eq!(report.classes[2].dice.mean, 1.0);
        assert_eq!(report.classes[0].dice.count, 0);

        let table = report_table(&report);
        assert_eq!(table.len(), 5);

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn missing_ground_truth_test() -> Result<()> {
        let dir = temp_dir("missing-gt");
        RgbImage::new(2, 2).save(dir.join("pred/Patient2_1.png"))?;
        assert!(evaluate_dirs(&dir.join("pred"), &dir.join("gt"), Default::default()).is_err());
        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
