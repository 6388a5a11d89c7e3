use crate::common::*;
use inf_net::{
    checkpoint as inf_checkpoint,
    metrics::ClassificationReport,
    model::{BackboneKind, InfNet, InfNetInit},
    severity::{infection_ratio, patient_id, Severity, SeverityScore, SeverityTable, SeverityThresholds},
};

/// Side length the slices are resized to before entering the network.
const INPUT_SIZE: i64 = 352;

#[derive(Debug, Clone)]
pub struct SeverityArgs {
    pub input_dir: PathBuf,
    pub parenchyma_dir: PathBuf,
    pub csv_severity_file: PathBuf,
    pub load_net_path: Option<PathBuf>,
    pub backbone: BackboneKind,
    pub net_channel: usize,
    pub n_classes: usize,
    pub device: Device,
    pub mild_threshold: f64,
    pub critical_threshold: f64,
    pub output_csv: Option<PathBuf>,
}

/// The severity of one scored slice.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceScore {
    pub name: String,
    pub patient: String,
    pub ratio: f64,
    pub pred: SeverityScore,
    pub truth: SeverityScore,
}

pub fn severity(args: SeverityArgs) -> Result<ClassificationReport> {
    let SeverityArgs {
        input_dir,
        parenchyma_dir,
        csv_severity_file,
        load_net_path,
        backbone,
        net_channel,
        n_classes,
        device,
        mild_threshold,
        critical_threshold,
        output_csv,
    } = args;

    let thresholds = SeverityThresholds::new(mild_threshold, critical_threshold)?;
    let table = SeverityTable::from_csv(&csv_severity_file)?;

    let mut vs = nn::VarStore::new(device);
    let model = InfNetInit {
        backbone,
        channel: net_channel,
        n_classes,
    }
    .build(&vs.root())?;
    if let Some(path) = &load_net_path {
        info!("loading weights from '{}'", path.display());
        inf_checkpoint::load_partial(&mut vs, path)?;
    }

    let scores = score_slices(
        &input_dir,
        &parenchyma_dir,
        &table,
        &thresholds,
        |image_file, height, width| {
            let input = imagenet_normalize(
                &load_rgb_image(image_file)?
                    .to_tensor()
                    .resize2d_bilinear(INPUT_SIZE, INPUT_SIZE, false)?,
            )?
            .unsqueeze(0)
            .to_device(device);
            tch::no_grad(|| predict(&model, &input, height, width))
        },
    )?;

    if let Some(path) = &output_csv {
        write_scores_csv(path, &scores)?;
        info!("wrote slice scores to '{}'", path.display());
    }

    let (truths, preds): (Vec<_>, Vec<_>) = scores.iter().map(|score| (score.truth, score.pred)).unzip();
    let report = ClassificationReport::micro(&truths, &preds)?;
    print_report(&report, &truths, &preds);
    Ok(report)
}

/// Scores every `Patient*` slice in `input_dir` against the parenchyma mask
/// of the same stem.
///
/// `predict` receives the slice path and the mask size and returns the
/// `[1, H, W]` infection probabilities.
pub fn score_slices<F>(
    input_dir: &Path,
    parenchyma_dir: &Path,
    table: &SeverityTable,
    thresholds: &SeverityThresholds,
    mut predict: F,
) -> Result<Vec<SliceScore>>
where
    F: FnMut(&Path, i64, i64) -> Result<Tensor>,
{
    let mut scores = vec![];

    for image_file in list_images(input_dir)? {
        let stem = file_stem(&image_file)?;
        let patient = match patient_id(stem) {
            Some(patient) => patient,
            None => continue,
        };
        let label = table
            .label(patient)
            .ok_or_else(|| format_err!("patient '{}' is not in the severity table", patient))?;
        let truth = match label.parse::<Severity>() {
            Ok(severity) => severity.score(),
            Err(_) => {
                warn!("skip '{}' with unknown severity '{}'", stem, label);
                continue;
            }
        };

        let parenchyma_file = find_counterpart(parenchyma_dir, stem)?;
        let parenchyma = load_gray_image(&parenchyma_file)?.to_raw_tensor();
        let (height, width) = parenchyma.size_hw()?;
        let prediction = predict(&image_file, height, width)?;

        let ratio = infection_ratio(&prediction, &parenchyma)
            .with_context(|| format!("unable to score '{}'", image_file.display()))?;
        let pred = thresholds.score_ratio(ratio)?;
        info!("{}: ratio {:.4}, predicted {}, labeled {}", stem, ratio, pred, truth);

        scores.push(SliceScore {
            name: stem.to_owned(),
            patient: patient.to_owned(),
            ratio,
            pred,
            truth,
        });
    }

    Ok(scores)
}

/// Writes one `image,patient,ratio,predicted,labeled` row per slice.
pub fn write_scores_csv(path: &Path, scores: &[SliceScore]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("unable to create '{}'", path.display()))?;
    writer.write_record(&["image", "patient", "ratio", "predicted", "labeled"])?;
    for score in scores {
        writer.write_record(&[
            score.name.clone(),
            score.patient.clone(),
            score.ratio.to_string(),
            score.pred.to_string(),
            score.truth.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Infection probabilities of the first class as a `[1, H, W]` CPU tensor.
fn predict(model: &InfNet, input: &Tensor, height: i64, width: i64) -> Result<Tensor> {
    let probability = model
        .forward_t(input, false)?
        .probability_map(height, width)?
        .i((0, 0..1))
        .to_device(Device::Cpu);
    Ok(probability)
}

fn print_report(report: &ClassificationReport, truths: &[SeverityScore], preds: &[SeverityScore]) {
    let scores = [
        SeverityScore::Regular,
        SeverityScore::Severe,
        SeverityScore::CriticallyIll,
    ];

    let mut table = Table::new();
    table.add_row(row!["labeled \\ predicted", scores[0], scores[1], scores[2]]);
    for truth in scores {
        let counts = scores.map(|pred| {
            truths
                .iter()
                .zip(preds)
                .filter(|&(&t, &p)| t == truth && p == pred)
                .count()
        });
        table.add_row(row![truth, counts[0], counts[1], counts[2]]);
    }
    table.printstd();

    println!("f1 score: {}", report.f1);
    println!("precision score: {}", report.precision);
    println!("recall score: {}", report.recall);
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, RgbImage};
    use inf_net::severity::SeverityError;

    const TABLE: &str = "\
Patient ID,Hospital,Age,Gender,Temperature,Morbidity
Patient1,Union,45,M,37.2,Mild
Patient2,Union,60,F,38.0,Severe
Patient3,Liyuan,71,M,38.9,Critically ill
Patient4,Liyuan,30,F,36.8,Suspected
";

    /// A 10x10 slice and a fully covering parenchyma mask.
    fn write_pair(dir: &Path, stem: &str) -> Result<()> {
        RgbImage::new(10, 10).save(dir.join("Imgs").join(format!("{}.png", stem)))?;
        GrayImage::from_pixel(10, 10, Luma([255]))
            .save(dir.join("Parenchyma").join(format!("{}.png", stem)))?;
        Ok(())
    }

    fn test_dir(name: &str) -> Result<PathBuf> {
        let dir = std::env::temp_dir().join(format!("inf-tool-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("Imgs"))?;
        std::fs::create_dir_all(dir.join("Parenchyma"))?;
        Ok(dir)
    }

    /// Lights the first `count` pixels of a `[1, H, W]` map.
    fn lit_pixels(count: i64, height: i64, width: i64) -> Tensor {
        let values: Vec<f32> = (0..height * width)
            .map(|index| if index < count { 1.0 } else { 0.0 })
            .collect();
        Tensor::of_slice(&values).view([1, height, width])
    }

    fn lit_count(path: &Path) -> i64 {
        match file_stem(path).unwrap() {
            "Patient1_0" => 0,
            "Patient1_1" => 1,
            "Patient2_0" => 49,
            "Patient2_1" => 50,
            "Patient3_0" => 100,
            _ => 0,
        }
    }

    #[test]
    fn score_slices_test() -> Result<()> {
        let dir = test_dir("severity")?;
        for stem in [
            "Patient1_0",
            "Patient1_1",
            "Patient2_0",
            "Patient2_1",
            "Patient3_0",
            "Patient4_0",
            "Control_0",
        ] {
            write_pair(&dir, stem)?;
        }
        let table = SeverityTable::from_reader(TABLE.as_bytes())?;

        let scores = score_slices(
            &dir.join("Imgs"),
            &dir.join("Parenchyma"),
            &table,
            &SeverityThresholds::default(),
            |path, height, width| Ok(lit_pixels(lit_count(path), height, width)),
        )?;

        // Patient4 has an unknown label and Control_0 is not a patient slice
        let summary: Vec<_> = scores
            .iter()
            .map(|score| (score.name.as_str(), score.ratio, score.pred))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Patient1_0", 0.0, SeverityScore::Regular),
                ("Patient1_1", 0.01, SeverityScore::Severe),
                ("Patient2_0", 0.49, SeverityScore::Severe),
                ("Patient2_1", 0.5, SeverityScore::CriticallyIll),
                ("Patient3_0", 1.0, SeverityScore::CriticallyIll),
            ]
        );
        assert_eq!(scores[2].truth, SeverityScore::Severe);
        assert_eq!(scores[4].truth, SeverityScore::CriticallyIll);

        let csv_file = dir.join("scores.csv");
        write_scores_csv(&csv_file, &scores)?;
        let text = std::fs::read_to_string(&csv_file)?;
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "image,patient,ratio,predicted,labeled");
        assert_eq!(lines[2], "Patient1_1,Patient1,0.01,Severe,Regular");
        assert_eq!(lines[5], "Patient3_0,Patient3,1,Critically ill,Critically ill");

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn missing_parenchyma_test() -> Result<()> {
        let dir = test_dir("severity-missing")?;
        RgbImage::new(10, 10).save(dir.join("Imgs/Patient1_0.png"))?;
        let table = SeverityTable::from_reader(TABLE.as_bytes())?;

        let result = score_slices(
            &dir.join("Imgs"),
            &dir.join("Parenchyma"),
            &table,
            &SeverityThresholds::default(),
            |_, height, width| Ok(lit_pixels(1, height, width)),
        );
        assert!(result.is_err());

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn empty_parenchyma_test() -> Result<()> {
        let dir = test_dir("severity-empty")?;
        RgbImage::new(10, 10).save(dir.join("Imgs/Patient2_0.png"))?;
        GrayImage::new(10, 10).save(dir.join("Parenchyma/Patient2_0.png"))?;
        let table = SeverityTable::from_reader(TABLE.as_bytes())?;

        let err = score_slices(
            &dir.join("Imgs"),
            &dir.join("Parenchyma"),
            &table,
            &SeverityThresholds::default(),
            |_, height, width| Ok(lit_pixels(1, height, width)),
        )
        .unwrap_err();
        assert!(err
            .chain()
            .any(|cause| cause.downcast_ref::<SeverityError>() == Some(&SeverityError::EmptyParenchyma)));

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn unknown_patient_test() -> Result<()> {
        let dir = test_dir("severity-unknown")?;
        write_pair(&dir, "Patient9_0")?;
        let table = SeverityTable::from_reader(TABLE.as_bytes())?;

        let result = score_slices(
            &dir.join("Imgs"),
            &dir.join("Parenchyma"),
            &table,
            &SeverityThresholds::default(),
            |_, height, width| Ok(lit_pixels(0, height, width)),
        );
        assert!(result.is_err());

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
