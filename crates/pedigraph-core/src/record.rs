use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{Gender, RegistryId};

/// A possibly partial birth date as reported by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialDate {
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
}

impl PartialDate {
    /// Full calendar date, when the registry reported all three parts and
    /// they form a real date.
    pub fn as_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month?, self.day?)
    }
}

/// A health diagnosis attached to a dog record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

/// Breed reference as reported by the source: a literal breed-name string
/// plus whatever taxonomy ids the registry knows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreedRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federation_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kennel_club_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub club_id: Option<i64>,
    /// Federation group code, when the registry reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_code: Option<String>,
}

impl BreedRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            federation_id: None,
            kennel_club_id: None,
            club_id: None,
            group_code: None,
        }
    }
}

/// One puppy entry inside a litter record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuppyRecord {
    pub id: RegistryId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
}

/// One litter of the dog, reported one level deep by the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LitterRecord {
    /// Litter id; an empty string means an anonymous litter that gets a
    /// fresh graph node on every import.
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth: Option<PartialDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub puppy_count: Option<u32>,
    #[serde(default)]
    pub puppies: Vec<PuppyRecord>,
}

/// A dog as resolved by the pedigree source.
///
/// `id` is the canonical registry id; `aliases` lists query ids known to
/// resolve to the same dog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DogRecord {
    pub id: RegistryId,
    pub name: String,
    #[serde(default)]
    pub gender: Gender,
    pub breed: BreedRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth: Option<PartialDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father: Option<RegistryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mother: Option<RegistryId>,
    #[serde(default)]
    pub litters: Vec<LitterRecord>,
    #[serde(default)]
    pub aliases: Vec<RegistryId>,
}

impl DogRecord {
    /// Minimal record used by tests and stubs.
    pub fn minimal(id: impl Into<String>, name: impl Into<String>, breed: &str) -> Self {
        Self {
            id: RegistryId::new(id),
            name: name.into(),
            gender: Gender::Unknown,
            breed: BreedRef::named(breed),
            registration: None,
            chip: None,
            birth: None,
            health: None,
            father: None,
            mother: None,
            litters: Vec::new(),
            aliases: Vec::new(),
        }
    }

    pub fn parent(&self, role: crate::ParentRole) -> Option<&RegistryId> {
        match role {
            crate::ParentRole::Father => self.father.as_ref(),
            crate::ParentRole::Mother => self.mother.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_dates_convert_only_when_complete() {
        let full = PartialDate {
            year: 2005,
            month: Some(7),
            day: Some(12),
        };
        assert_eq!(full.as_date(), NaiveDate::from_ymd_opt(2005, 7, 12));

        let year_only = PartialDate {
            year: 2005,
            month: None,
            day: None,
        };
        assert!(year_only.as_date().is_none());

        let bogus = PartialDate {
            year: 2005,
            month: Some(2),
            day: Some(30),
        };
        assert!(bogus.as_date().is_none());
    }
}
