use super::score::Severity;
use crate::common::*;

const PATIENT_COLUMN: usize = 0;
const SEVERITY_COLUMN: usize = 5;

/// Clinician severity labels keyed by patient id.
#[derive(Debug, Clone, Default)]
pub struct SeverityTable {
    labels: HashMap<String, String>,
}

impl SeverityTable {
    /// Loads a comma separated table. The first row is a header, column 0 holds
    /// the patient id and column 5 the severity label.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file =
            fs::File::open(path).with_context(|| format!("unable to open '{}'", path.display()))?;
        Self::from_reader(file).with_context(|| format!("invalid severity table '{}'", path.display()))
    }

    pub fn from_reader(reader: impl io::Read) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let labels: HashMap<_, _> = reader
            .records()
            .enumerate()
            .map(|(index, record)| -> Result<_> {
                let record = record?;
                let (patient, label) = match (record.get(PATIENT_COLUMN), record.get(SEVERITY_COLUMN)) {
                    (Some(patient), Some(label)) => (patient, label),
                    _ => bail!(
                        "row {} has {} columns, but at least {} are required",
                        index + 2,
                        record.len(),
                        SEVERITY_COLUMN + 1
                    ),
                };
                Ok((patient.to_owned(), label.to_owned()))
            })
            .try_collect()?;

        Ok(Self { labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The raw label text of a patient.
    pub fn label(&self, patient: &str) -> Option<&str> {
        self.labels.get(patient).map(String::as_str)
    }

    pub fn severity(&self, patient: &str) -> Result<Severity> {
        let label = self
            .label(patient)
            .ok_or_else(|| format_err!("patient '{}' is not in the severity table", patient))?;
        label
            .parse()
            .map_err(|_| format_err!("unknown severity label '{}' of patient '{}'", label, patient))
    }
}

/// Extracts the patient id from file names like `Patient12_3.png`.
///
/// Returns `None` unless the name contains `Patient`.
pub fn patient_id(file_name: &str) -> Option<&str> {
    if !file_name.contains("Patient") {
        return None;
    }
    let stem = file_name.split('.').next()?;
    stem.split('_').next()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
Patient ID,Hospital,Age,Gender,Temperature,Morbidity
Patient1,Union,45,M,37.2,Mild
Patient2,Union,60,F,38.0,Severe
Patient3,Liyuan,71,M,38.9,Critically ill
Patient4,Liyuan,30,F,36.8,Suspected
";

    #[test]
    fn severity_table_test() -> Result<()> {
        let table = SeverityTable::from_reader(TABLE.as_bytes())?;
        assert_eq!(table.len(), 4);
        assert_eq!(table.severity("Patient1")?, Severity::Mild);
        assert_eq!(table.severity("Patient3")?, Severity::CriticallyIll);
        assert_eq!(table.label("Patient4"), Some("Suspected"));
        assert!(table.severity("Patient4").is_err());
        assert!(table.severity("Patient9").is_err());
        Ok(())
    }

    #[test]
    fn short_rows_are_rejected() {
        let text = "id,a,b,c,d,label\nPatient1,x,y\n";
        assert!(SeverityTable::from_reader(text.as_bytes()).is_err());
    }

    #[test]
    fn patient_id_test() {
        assert_eq!(patient_id("Patient12_3.png"), Some("Patient12"));
        assert_eq!(patient_id("Patient7.jpg"), Some("Patient7"));
        assert_eq!(patient_id("case_001.png"), None);
    }
}
