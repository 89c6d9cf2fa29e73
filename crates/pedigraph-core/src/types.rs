use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// External registry identifier of a dog, e.g. `"NO/12345/09"`.
///
/// A query id may alias a canonical id; the import pipeline resolves
/// aliases through the pedigree source and keys all dedup state by the
/// canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistryId(String);

static WELL_FORMED_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Z0-9/-]*[0-9][A-Z0-9/-]*$").expect("valid regex"));

impl RegistryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id looks like a real registry number. Litter entries
    /// sometimes carry free-text placeholders instead of ids; those are
    /// resolved through the source client rather than stubbed directly.
    pub fn is_well_formed(&self) -> bool {
        WELL_FORMED_ID.is_match(&self.0)
    }
}

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RegistryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Node labels of the pedigree graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Dog,
    BreedSynonym,
    Breed,
    BreedGroup,
    Litter,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Label::Dog => "Dog",
            Label::BreedSynonym => "BreedSynonym",
            Label::Breed => "Breed",
            Label::BreedGroup => "BreedGroup",
            Label::Litter => "Litter",
        };
        write!(f, "{}", s)
    }
}

/// Relationship types of the pedigree graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelType {
    /// Dog -> Dog, carries a `role` property (`father` | `mother`).
    HasParent,
    /// Dog -> Dog quarantine edge written in place of `HasParent` when the
    /// candidate parent is already an ancestor of the child.
    OwnAncestor,
    /// Dog -> BreedSynonym.
    IsBreed,
    /// BreedSynonym -> Breed, Breed -> BreedGroup.
    MemberOf,
    /// Dog -> Litter, carries a `role` property inferred from gender.
    HasLitter,
    /// Dog -> Litter.
    InLitter,
}

impl fmt::Display for RelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelType::HasParent => "HAS_PARENT",
            RelType::OwnAncestor => "OWN_ANCESTOR",
            RelType::IsBreed => "IS_BREED",
            RelType::MemberOf => "MEMBER_OF",
            RelType::HasLitter => "HAS_LITTER",
            RelType::InLitter => "IN_LITTER",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for RelType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "HAS_PARENT" => Ok(RelType::HasParent),
            "OWN_ANCESTOR" => Ok(RelType::OwnAncestor),
            "IS_BREED" => Ok(RelType::IsBreed),
            "MEMBER_OF" => Ok(RelType::MemberOf),
            "HAS_LITTER" => Ok(RelType::HasLitter),
            "IN_LITTER" => Ok(RelType::InLitter),
            other => Err(format!("unknown relationship type: {}", other)),
        }
    }
}

/// Role of a parent edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParentRole {
    Father,
    Mother,
}

impl ParentRole {
    pub const ALL: [ParentRole; 2] = [ParentRole::Father, ParentRole::Mother];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParentRole::Father => "father",
            ParentRole::Mother => "mother",
        }
    }
}

impl fmt::Display for ParentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Gender {
    /// The `HAS_LITTER` role a dog of this gender plays towards a litter.
    pub fn litter_role(&self) -> ParentRole {
        match self {
            Gender::Female => ParentRole::Mother,
            _ => ParentRole::Father,
        }
    }
}

/// Traversal direction for relationship queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// Property value stored on nodes and relationships.
///
/// Kept deliberately small: everything the pedigree graph stores is a
/// string, an integer or a flag, which keeps values hashable for the
/// unique-property indexes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::Str(s.to_string())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        PropValue::Str(s)
    }
}

impl From<i64> for PropValue {
    fn from(i: i64) -> Self {
        PropValue::Int(i)
    }
}

impl From<&RegistryId> for PropValue {
    fn from(id: &RegistryId) -> Self {
        PropValue::Str(id.as_str().to_string())
    }
}

/// Property key constants shared by builders, analytics and the store's
/// uniqueness constraints.
pub mod props {
    pub const REGISTRY_ID: &str = "registry_id";
    pub const NAME: &str = "name";
    pub const GENDER: &str = "gender";
    pub const REGISTRATION: &str = "registration";
    pub const CHIP: &str = "chip";
    pub const BIRTH_YEAR: &str = "birth_year";
    pub const BIRTH_MONTH: &str = "birth_month";
    pub const BIRTH_DAY: &str = "birth_day";
    pub const HEALTH_CODE: &str = "health_code";
    pub const HEALTH_YEAR: &str = "health_year";
    pub const FEDERATION_ID: &str = "federation_id";
    pub const KENNEL_CLUB_ID: &str = "kennel_club_id";
    pub const CLUB_ID: &str = "club_id";
    pub const GROUP_CODE: &str = "code";
    pub const LITTER_ID: &str = "litter_id";
    pub const PUPPY_COUNT: &str = "puppy_count";
    pub const ROLE: &str = "role";
}
