use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use pedigraph_core::{DogRecord, PedigreeSource, RegistryId, Result};

/// A `PedigreeSource` backed by a JSON file of dog records, used by the
/// CLI and as a fixture source in tests. Records are indexed under their
/// canonical id and every alias.
pub struct JsonFileSource {
    by_id: HashMap<RegistryId, Arc<DogRecord>>,
    canonical: Vec<RegistryId>,
}

impl JsonFileSource {
    pub fn from_records(records: Vec<DogRecord>) -> Self {
        let mut by_id = HashMap::new();
        let mut canonical = Vec::with_capacity(records.len());
        for record in records {
            let record = Arc::new(record);
            canonical.push(record.id.clone());
            for alias in &record.aliases {
                by_id.insert(alias.clone(), Arc::clone(&record));
            }
            by_id.insert(record.id.clone(), record);
        }
        Self { by_id, canonical }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let records: Vec<DogRecord> = serde_json::from_str(&data)?;
        Ok(Self::from_records(records))
    }

    /// Canonical ids of every record in the file, in file order.
    pub fn canonical_ids(&self) -> &[RegistryId] {
        &self.canonical
    }
}

#[async_trait]
impl PedigreeSource for JsonFileSource {
    async fn find_by_id(&self, id: &RegistryId) -> Result<Option<DogRecord>> {
        Ok(self.by_id.get(id).map(|record| (**record).clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn resolves_aliases_to_canonical_record() {
        let mut record = DogRecord::minimal("NO/1/01", "Rex", "boxer");
        record.aliases.push(RegistryId::from("OLD/1"));
        let source = JsonFileSource::from_records(vec![record]);

        let by_alias = source
            .find_by_id(&RegistryId::from("OLD/1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_alias.id, RegistryId::from("NO/1/01"));
        assert!(source
            .find_by_id(&RegistryId::from("NO/9/99"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn loads_records_from_disk() {
        let records = vec![
            DogRecord::minimal("NO/1/01", "Rex", "boxer"),
            DogRecord::minimal("NO/2/01", "Laika", "boxer"),
        ];
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&records).unwrap()).unwrap();

        let source = JsonFileSource::load(file.path()).unwrap();
        assert_eq!(source.canonical_ids().len(), 2);
        let rex = source
            .find_by_id(&RegistryId::from("NO/1/01"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rex.name, "Rex");
    }
}
