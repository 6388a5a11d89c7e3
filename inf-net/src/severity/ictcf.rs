use crate::common::*;

/// Copies the iCTCF CT slices that correspond to the parenchyma masks.
///
/// A mask named `Patient<ID>[_<index>].<ext>` selects
/// `<ictcf_dir>/Patient<ID>/<index>.jpg` (index 0 when absent), which is
/// copied to `<output_dir>/Patient<ID>[_<index>].jpg`. Returns the number of
/// copied files.
pub fn prepare_ictcf(
    ictcf_dir: impl AsRef<Path>,
    parenchyma_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
) -> Result<usize> {
    let ictcf_dir = ictcf_dir.as_ref();
    let parenchyma_dir = parenchyma_dir.as_ref();
    let output_dir = output_dir.as_ref();

    fs::create_dir_all(output_dir)
        .with_context(|| format!("unable to create '{}'", output_dir.display()))?;

    let mut file_names: Vec<String> = fs::read_dir(parenchyma_dir)
        .with_context(|| format!("unable to read '{}'", parenchyma_dir.display()))?
        .map(|entry| -> Result<_> { Ok(entry?.file_name().to_string_lossy().into_owned()) })
        .try_collect()?;
    file_names.sort();

    let mut count = 0;
    for file_name in file_names {
        if !file_name.contains("Patient") {
            continue;
        }

        let stem = file_name.split('.').next().unwrap_or(&file_name);
        let mut parts = stem.split('_');
        let (patient, index) = match (parts.next(), parts.next()) {
            (Some(patient), Some(index)) => (patient, index),
            (Some(patient), None) => (patient, "0"),
            _ => continue,
        };

        let source = ictcf_dir.join(patient).join(format!("{}.jpg", index));
        let target = output_dir.join(format!("{}.jpg", stem));
        fs::copy(&source, &target).with_context(|| {
            format!(
                "unable to copy '{}' to '{}'",
                source.display(),
                target.display()
            )
        })?;
        count += 1;
    }

    info!("copied {} iCTCF slices to '{}'", count, output_dir.display());
    Ok(count)
}
