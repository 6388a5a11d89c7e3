mod common;
mod evaluate;
mod severity;

use crate::common::*;
use clap::Parser;
use inf_net::{metrics::DEFAULT_METRICS_LOG, model::BackboneKind};

#[derive(Debug, Clone, Parser)]
/// Evaluation and severity scoring tools for Inf-Net
enum Opts {
    /// Evaluate multi-class predictions against ground truth masks
    Evaluate {
        /// directory of predicted RGB masks
        #[clap(long)]
        pred_dir: PathBuf,
        /// directory of ground truth masks
        #[clap(long)]
        gt_dir: PathBuf,
        /// checkpoint name recorded in the metrics log
        #[clap(long, default_value = "")]
        checkpoint: String,
        /// metrics log to append to
        #[clap(long, default_value = DEFAULT_METRICS_LOG)]
        log_file: PathBuf,
        #[clap(long, default_value = "0.5")]
        ggo_threshold: f64,
        #[clap(long, default_value = "0.5")]
        consolidation_threshold: f64,
    },
    /// Score severity from predicted infection areas
    Severity {
        /// directory of CT slices
        #[clap(long)]
        input_dir: PathBuf,
        /// directory of lung parenchyma masks
        #[clap(long)]
        parenchyma_dir: PathBuf,
        /// clinician severity table
        #[clap(long)]
        csv_severity_file: PathBuf,
        /// Inf-Net checkpoint
        #[clap(long)]
        load_net_path: Option<PathBuf>,
        #[clap(long, default_value = "ResNet50")]
        backbone: BackboneKind,
        #[clap(long, default_value = "32")]
        net_channel: usize,
        #[clap(long, default_value = "1")]
        n_classes: usize,
        #[clap(long, default_value = "cpu", parse(try_from_str = parse_device))]
        device: Device,
        #[clap(long, default_value = "0.01")]
        mild_threshold: f64,
        #[clap(long, default_value = "0.5")]
        critical_threshold: f64,
        /// write per-slice scores to this CSV file
        #[clap(long)]
        output_csv: Option<PathBuf>,
    },
    /// Copy the iCTCF slices matching the parenchyma masks
    PrepareIctcf {
        #[clap(long)]
        ictcf_input_dir: PathBuf,
        #[clap(long)]
        parenchyma_dir: PathBuf,
        #[clap(long)]
        ictcf_output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();

    match Opts::parse() {
        Opts::Evaluate {
            pred_dir,
            gt_dir,
            checkpoint,
            log_file,
            ggo_threshold,
            consolidation_threshold,
        } => {
            evaluate::evaluate(evaluate::EvaluateArgs {
                pred_dir,
                gt_dir,
                checkpoint,
                log_file,
                ggo_threshold,
                consolidation_threshold,
            })?;
        }
        Opts::Severity {
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
        } => {
            severity::severity(severity::SeverityArgs {
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
            })?;
        }
        Opts::PrepareIctcf {
            ictcf_input_dir,
            parenchyma_dir,
            ictcf_output_dir,
        } => {
            let count =
                inf_net::severity::prepare_ictcf(ictcf_input_dir, parenchyma_dir, ictcf_output_dir)?;
            info!("copied {} slices", count);
        }
    }

    Ok(())
}

/// Parses `cpu`, `cuda` or `cuda(N)`.
fn parse_device(text: &str) -> Result<Device> {
    let device = match text {
        "cpu" => Device::Cpu,
        "cuda" => Device::Cuda(0),
        _ => {
            let index = text
                .strip_prefix("cuda(")
                .and_then(|rest| rest.strip_suffix(')'))
                .ok_or_else(|| format_err!("invalid device '{}'", text))?;
            Device::Cuda(index.parse()?)
        }
    };
    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_device_test() {
        assert_eq!(parse_device("cpu").unwrap(), Device::Cpu);
        assert_eq!(parse_device("cuda").unwrap(), Device::Cuda(0));
        assert_eq!(parse_device("cuda(2)").unwrap(), Device::Cuda(2));
        assert!(parse_device("tpu").is_err());
        assert!(parse_device("cuda(x)").is_err());
    }

    #[test]
    fn parse_opts_test() {
        let opts = Opts::try_parse_from([
            "inf-tool",
            "severity",
            "--input-dir",
            "Imgs",
            "--parenchyma-dir",
            "Parenchyma",
            "--csv-severity-file",
            "severity.csv",
            "--device",
            "cuda(1)",
        ])
        .unwrap();
        match opts {
            Opts::Severity {
                backbone,
                device,
                mild_threshold,
                ..
            } => {
                assert_eq!(backbone, BackboneKind::ResNet50);
                assert_eq!(device, Device::Cuda(1));
                assert_eq!(mild_threshold, 0.01);
            }
            _ => unreachable!(),
        }
    }
}
