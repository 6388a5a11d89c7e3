use crate::{common::*, config::LoadCheckpoint};

pub const FILE_STRFTIME: &str = "%Y-%m-%d-%H-%M-%S.%3f%z";

static CHECKPOINT_FILENAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:Inf-Net-|unet_model_)(\d+)\.ckpt$").unwrap());

/// The single-class checkpoint name, e.g. `Inf-Net-10.ckpt`.
pub fn single_class_checkpoint_name(epoch: usize) -> String {
    format!("Inf-Net-{}.ckpt", epoch)
}

/// The multi-class checkpoint name, e.g. `unet_model_3.ckpt`.
pub fn multi_class_checkpoint_name(epoch: usize) -> String {
    format!("unet_model_{}.ckpt", epoch)
}

/// The epoch encoded in a checkpoint file name.
pub fn checkpoint_epoch(path: &Path) -> Option<usize> {
    let file_name = path.file_name()?.to_str()?;
    let captures = CHECKPOINT_FILENAME_REGEX.captures(file_name)?;
    captures.get(1)?.as_str().parse().ok()
}

/// Save parameters to a checkpoint file.
pub fn save_checkpoint(vs: &nn::VarStore, checkpoint_dir: &Path, file_name: &str) -> Result<PathBuf> {
    let path = checkpoint_dir.join(file_name);
    vs.save(&path)
        .with_context(|| format!("unable to save checkpoint '{}'", path.display()))?;
    info!("saved checkpoint '{}'", path.display());
    Ok(path)
}

/// Load parameters with the configured method.
///
/// Returns the loaded file, if any.
pub fn try_load_checkpoint(
    vs: &mut nn::VarStore,
    logging_dir: &Path,
    load_checkpoint: &LoadCheckpoint,
) -> Result<Option<PathBuf>> {
    let path = match load_checkpoint {
        LoadCheckpoint::Disabled => {
            info!("checkpoint loading is disabled");
            None
        }
        LoadCheckpoint::FromRecent => {
            let checkpoint_file = find_recent_checkpoint(logging_dir)?;
            if checkpoint_file.is_none() {
                warn!("no checkpoint file found");
            }
            checkpoint_file
        }
        LoadCheckpoint::FromFile { file } => {
            ensure!(file.is_file(), "{} is not a file", file.display());
            Some(file.to_owned())
        }
    };

    if let Some(path) = &path {
        info!("load checkpoint file {}", path.display());
        inf_checkpoint::load_partial(vs, path)?;
    }

    Ok(path)
}

/// The most recently modified checkpoint under `<logging_dir>/*/checkpoints/`.
pub fn find_recent_checkpoint(logging_dir: &Path) -> Result<Option<PathBuf>> {
    let pattern = format!("{}/*/checkpoints/*.ckpt", logging_dir.display());
    let paths: Vec<_> = glob::glob(&pattern)?.try_collect()?;

    let candidates: Vec<(PathBuf, SystemTime)> = paths
        .into_iter()
        .filter(|path| checkpoint_epoch(path).is_some())
        .map(|path| -> Result<_> {
            let modified = fs::metadata(&path)?.modified()?;
            Ok((path, modified))
        })
        .try_collect()?;

    let recent = candidates
        .into_iter()
        .max_by_key(|(_path, modified)| *modified)
        .map(|(path, _modified)| path);
    Ok(recent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_name_test() {
        let name = single_class_checkpoint_name(30);
        assert_eq!(name, "Inf-Net-30.ckpt");
        assert_eq!(checkpoint_epoch(Path::new(&name)), Some(30));

        let name = multi_class_checkpoint_name(7);
        assert_eq!(name, "unet_model_7.ckpt");
        assert_eq!(checkpoint_epoch(Path::new(&name)), Some(7));

        assert_eq!(checkpoint_epoch(Path::new("weights.ckpt")), None);
    }

    #[test]
    fn recent_checkpoint_test() -> Result<()> {
        let logging_dir = std::env::temp_dir().join("inf-net-train-recent-checkpoint-test");
        if logging_dir.exists() {
            fs::remove_dir_all(&logging_dir)?;
        }
        assert_eq!(find_recent_checkpoint(&logging_dir)?, None);

        let checkpoint_dir = logging_dir.join("run").join("checkpoints");
        fs::create_dir_all(&checkpoint_dir)?;
        let vs = nn::VarStore::new(Device::Cpu);
        let _weight = vs.root().var("weight", &[3], nn::Init::Const(1.0));

        save_checkpoint(&vs, &checkpoint_dir, &single_class_checkpoint_name(10))?;
        std::thread::sleep(Duration::from_millis(20));
        let latest = save_checkpoint(&vs, &checkpoint_dir, &single_class_checkpoint_name(20))?;

        assert_eq!(find_recent_checkpoint(&logging_dir)?, Some(latest.clone()));

        let mut restored = nn::VarStore::new(Device::Cpu);
        let weight = restored.root().var("weight", &[3], nn::Init::Const(0.0));
        let loaded = try_load_checkpoint(&mut restored, &logging_dir, &LoadCheckpoint::FromRecent)?;
        assert_eq!(loaded, Some(latest));
        assert_abs_diff_eq!(f64::from(&weight.sum(Kind::Float)), 3.0);
        Ok(())
    }
}
