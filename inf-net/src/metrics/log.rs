use crate::common::*;

pub const DEFAULT_METRICS_LOG: &str = "metric.txt";
const SEPARATOR: &str = "===========================";

/// Flat-text log of per-image Dice scores, appended by every evaluation run.
#[derive(Debug, Clone)]
pub struct MetricsLog {
    path: PathBuf,
}

impl Default for MetricsLog {
    fn default() -> Self {
        Self::new(DEFAULT_METRICS_LOG)
    }
}

impl MetricsLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_owned(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, checkpoint: &str, ggo_dice: &[f64], consolidation_dice: &[f64]) -> Result<()> {
        let mut text = format!("{}\nground glass opacities\n", checkpoint);
        ggo_dice
            .iter()
            .for_each(|value| text.push_str(&format!("{:?}\n", value)));
        text.push_str("\nconsolidation\n");
        consolidation_dice
            .iter()
            .for_each(|value| text.push_str(&format!("{:?}\n", value)));
        text.push_str(SEPARATOR);

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("unable to open '{}'", self.path.display()))?;
        file.write_all(text.as_bytes())?;
        Ok(())
    }
}
