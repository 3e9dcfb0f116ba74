use crate::{KnowledgeStore, LookupFuture};
use parking_lot::RwLock;
use schema::{ClassIdentity, DiseaseRecord};
use std::collections::HashMap;

/// In-memory records. Used when no remote store is configured.
#[derive(Default)]
pub struct StaticKnowledgeStore {
    records: RwLock<HashMap<ClassIdentity, DiseaseRecord>>,
}

impl StaticKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = (ClassIdentity, DiseaseRecord)>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().collect()),
        }
    }

    /// Offline catalog covering every disease class.
    pub fn builtin() -> Self {
        Self::with_records(ClassIdentity::ALL.into_iter().filter_map(|class| {
            let (description, treatment) = builtin_text(class)?;
            Some((
                class,
                DiseaseRecord {
                    description: description.to_string(),
                    treatment: treatment.to_string(),
                    symptoms: class.default_symptoms().to_string(),
                },
            ))
        }))
    }

    pub fn insert(&self, class: ClassIdentity, record: DiseaseRecord) {
        self.records.write().insert(class, record);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

fn builtin_text(class: ClassIdentity) -> Option<(&'static str, &'static str)> {
    match class {
        ClassIdentity::AppleScab => Some((
            "Fungal disease caused by Venturia inaequalis, spread by rain splash in spring.",
            "Rake and destroy fallen leaves; apply a protective fungicide from green tip \
             until petal fall.",
        )),
        ClassIdentity::AppleBlackRot => Some((
            "Fungal disease caused by Botryosphaeria obtusa, overwintering in cankers and \
             mummified fruit.",
            "Prune out dead wood and cankers; remove mummified fruit and keep a fungicide \
             cover through summer.",
        )),
        ClassIdentity::CedarAppleRust => Some((
            "Rust fungus that alternates between apple trees and nearby junipers.",
            "Remove galls from nearby junipers; apply fungicide at pink bud and repeat \
             through early summer.",
        )),
        ClassIdentity::Healthy => None,
    }
}

impl KnowledgeStore for StaticKnowledgeStore {
    fn lookup(&self, class: ClassIdentity) -> LookupFuture<'_> {
        let record = self.records.read().get(&class).cloned();
        Box::pin(async move { Ok(record) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builtin_covers_diseases_only() {
        let store = StaticKnowledgeStore::builtin();
        assert_eq!(store.len(), 3);

        let record = store.lookup(ClassIdentity::AppleScab).await.unwrap().unwrap();
        assert!(record.treatment.contains("fungicide"));
        assert_eq!(record.symptoms, ClassIdentity::AppleScab.default_symptoms());

        assert_eq!(store.lookup(ClassIdentity::Healthy).await.unwrap(), None);
    }

    #[tokio::test]
    async fn inserted_records_are_visible() {
        let store = StaticKnowledgeStore::new();
        assert!(store.is_empty());

        let record = DiseaseRecord {
            description: "d".to_string(),
            treatment: "t".to_string(),
            symptoms: "s".to_string(),
        };
        store.insert(ClassIdentity::AppleBlackRot, record.clone());

        assert_eq!(
            store.lookup(ClassIdentity::AppleBlackRot).await.unwrap(),
            Some(record)
        );
    }
}
