use crate::{DogRecord, RegistryId, Result};
use async_trait::async_trait;

/// External pedigree registry client.
///
/// `Ok(None)` is the normal pedigree boundary (no record for the id), not
/// an error; `Err` is reserved for transport and protocol failures, which
/// callers may retry.
#[async_trait]
pub trait PedigreeSource: Send + Sync {
    async fn find_by_id(&self, id: &RegistryId) -> Result<Option<DogRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SingleDog(DogRecord);

    #[async_trait]
    impl PedigreeSource for SingleDog {
        async fn find_by_id(&self, id: &RegistryId) -> Result<Option<DogRecord>> {
            Ok((self.0.id == *id).then(|| self.0.clone()))
        }
    }

    #[tokio::test]
    async fn missing_record_is_ok_none() {
        let source = SingleDog(DogRecord::minimal("NO/1/01", "Rex", "boxer"));
        assert!(source
            .find_by_id(&RegistryId::from("NO/1/01"))
            .await
            .unwrap()
            .is_some());
        assert!(source
            .find_by_id(&RegistryId::from("NO/2/02"))
            .await
            .unwrap()
            .is_none());
    }
}
