//! Weight loading helpers over [nn::VarStore].

use crate::common::*;

/// Restore the variables that exist in both the file and the store.
///
/// Returns the names of variables left at their initial values.
pub fn load_partial(vs: &mut nn::VarStore, path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    ensure!(
        path.is_file(),
        "the checkpoint file '{}' does not exist",
        path.display()
    );

    let missing = vs
        .load_partial(path)
        .with_context(|| format!("unable to load checkpoint '{}'", path.display()))?;

    if missing.is_empty() {
        info!("restored all variables from '{}'", path.display());
    } else {
        warn!(
            "{} variables are not restored from '{}': {}",
            missing.len(),
            path.display(),
            missing.iter().join(", ")
        );
    }
    Ok(missing)
}

/// The total number of trainable scalar parameters.
pub fn parameter_count(vs: &nn::VarStore) -> i64 {
    vs.trainable_variables()
        .iter()
        .map(|tensor| tensor.numel() as i64)
        .sum()
}
