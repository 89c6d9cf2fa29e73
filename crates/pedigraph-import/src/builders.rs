//! Graph-write closures submitted to the [`WriteCoalescer`].
//!
//! Every builder is idempotent: re-running it against an already-imported
//! graph updates mutable fields and corrects stale relationship edges but
//! never duplicates nodes or per-role parent edges.

use pedigraph_core::{
    props, BreedRef, Direction, DogRecord, Gender, Label, LitterRecord, ParentRole, PropValue,
    PuppyRecord, RegistryId, RelType, Result,
};
use pedigraph_store::WriteTx;

use crate::coalescer::BuildFn;

fn gender_str(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "male",
        Gender::Female => "female",
        Gender::Unknown => "unknown",
    }
}

/// Write or update the Dog node for a resolved source record, including
/// its breed linkage.
pub fn upsert_dog(record: DogRecord) -> BuildFn {
    Box::new(move |tx| {
        let dog = tx.find_or_create_node(Label::Dog, props::REGISTRY_ID, (&record.id).into())?;
        tx.set_property(dog, props::NAME, record.name.as_str().into())?;
        tx.set_property(dog, props::GENDER, gender_str(record.gender).into())?;
        if let Some(ref registration) = record.registration {
            tx.set_property(dog, props::REGISTRATION, registration.as_str().into())?;
        }
        if let Some(ref chip) = record.chip {
            tx.set_property(dog, props::CHIP, chip.as_str().into())?;
        }
        if let Some(birth) = record.birth {
            tx.set_property(dog, props::BIRTH_YEAR, i64::from(birth.year).into())?;
            if let Some(month) = birth.month {
                tx.set_property(dog, props::BIRTH_MONTH, i64::from(month).into())?;
            }
            if let Some(day) = birth.day {
                tx.set_property(dog, props::BIRTH_DAY, i64::from(day).into())?;
            }
        }
        if let Some(ref health) = record.health {
            tx.set_property(dog, props::HEALTH_CODE, health.code.as_str().into())?;
            if let Some(year) = health.year {
                tx.set_property(dog, props::HEALTH_YEAR, i64::from(year).into())?;
            }
        }
        ensure_breed(tx, dog, &record.breed)?;
        Ok(Some(dog))
    })
}

/// Minimal Dog node for a litter entry whose id is well formed but whose
/// record has not been resolved. Never overwrites richer data.
pub fn stub_dog(puppy: PuppyRecord) -> BuildFn {
    Box::new(move |tx| {
        let dog = tx.find_or_create_node(Label::Dog, props::REGISTRY_ID, (&puppy.id).into())?;
        if !puppy.name.is_empty() && !tx.has_property(dog, props::NAME) {
            tx.set_property(dog, props::NAME, puppy.name.as_str().into())?;
        }
        if let Some(ref breed) = puppy.breed {
            if tx
                .relationships(dog, Some(RelType::IsBreed), Direction::Outgoing)
                .is_empty()
            {
                let synonym =
                    tx.find_or_create_node(Label::BreedSynonym, props::NAME, breed.as_str().into())?;
                tx.create_relationship(dog, synonym, RelType::IsBreed, vec![])?;
            }
        }
        Ok(Some(dog))
    })
}

/// Connect `child` to `parent` for `role`, replacing any previous edge for
/// that role. With `quarantine` the edge is written as `OWN_ANCESTOR`
/// instead of `HAS_PARENT`, recording a detected self-ancestry anomaly.
pub fn set_parent(
    child: RegistryId,
    parent: RegistryId,
    role: ParentRole,
    quarantine: bool,
) -> BuildFn {
    Box::new(move |tx| {
        let child_node = tx.find_or_create_node(Label::Dog, props::REGISTRY_ID, (&child).into())?;
        let parent_node =
            tx.find_or_create_node(Label::Dog, props::REGISTRY_ID, (&parent).into())?;
        let rel_type = if quarantine {
            RelType::OwnAncestor
        } else {
            RelType::HasParent
        };

        // Replace, not accumulate: at most one outgoing parent edge per
        // role, across both the normal and the quarantine type.
        let mut already_linked = false;
        for existing_type in [RelType::HasParent, RelType::OwnAncestor] {
            for rel in tx.relationships(child_node, Some(existing_type), Direction::Outgoing) {
                if rel.role() != Some(role.as_str()) {
                    continue;
                }
                if existing_type == rel_type && rel.to == parent_node {
                    already_linked = true;
                } else {
                    tx.delete_relationship(rel.id)?;
                }
            }
        }
        if !already_linked {
            tx.create_relationship(
                child_node,
                parent_node,
                rel_type,
                vec![(props::ROLE, role.as_str().into())],
            )?;
        }
        Ok(Some(child_node))
    })
}

/// Delete a stale `HAS_PARENT` edge for a role the source record no
/// longer reports.
pub fn clear_parent(child: RegistryId, role: ParentRole) -> BuildFn {
    Box::new(move |tx| {
        let Some(child_node) = tx.find_node(Label::Dog, props::REGISTRY_ID, &(&child).into())
        else {
            return Ok(None);
        };
        for rel in tx.relationships(child_node, Some(RelType::HasParent), Direction::Outgoing) {
            if rel.role() == Some(role.as_str()) {
                tx.delete_relationship(rel.id)?;
            }
        }
        Ok(Some(child_node))
    })
}

/// Ensure the Litter node for one litter record and wire the dog and its
/// resolved puppies to it. Anonymous litters (empty id) get a fresh node
/// on every import.
pub fn link_litter(
    dog_id: RegistryId,
    gender: Gender,
    litter: LitterRecord,
    members: Vec<RegistryId>,
) -> BuildFn {
    Box::new(move |tx| {
        let dog = tx.find_or_create_node(Label::Dog, props::REGISTRY_ID, (&dog_id).into())?;
        let litter_node = if litter.id.is_empty() {
            tx.create_node(Label::Litter)
        } else {
            tx.find_or_create_node(Label::Litter, props::LITTER_ID, litter.id.as_str().into())?
        };
        if let Some(birth) = litter.birth {
            tx.set_property(litter_node, props::BIRTH_YEAR, i64::from(birth.year).into())?;
            if let Some(month) = birth.month {
                tx.set_property(litter_node, props::BIRTH_MONTH, i64::from(month).into())?;
            }
            if let Some(day) = birth.day {
                tx.set_property(litter_node, props::BIRTH_DAY, i64::from(day).into())?;
            }
        }
        if let Some(count) = litter.puppy_count {
            tx.set_property(litter_node, props::PUPPY_COUNT, i64::from(count).into())?;
        }

        let role = gender.litter_role();
        if !tx
            .relationships(dog, Some(RelType::HasLitter), Direction::Outgoing)
            .iter()
            .any(|rel| rel.to == litter_node)
        {
            tx.create_relationship(
                dog,
                litter_node,
                RelType::HasLitter,
                vec![(props::ROLE, role.as_str().into())],
            )?;
        }

        for member in &members {
            let puppy = tx.find_or_create_node(Label::Dog, props::REGISTRY_ID, member.into())?;
            if !tx
                .relationships(puppy, Some(RelType::InLitter), Direction::Outgoing)
                .iter()
                .any(|rel| rel.to == litter_node)
            {
                tx.create_relationship(puppy, litter_node, RelType::InLitter, vec![])?;
            }
        }
        Ok(Some(litter_node))
    })
}

/// Link a dog to its breed synonym and the synonym to the canonical breed
/// taxonomy, correcting a stale linkage if the breed changed.
fn ensure_breed(tx: &mut WriteTx<'_>, dog: pedigraph_store::NodeId, breed: &BreedRef) -> Result<()> {
    let synonym =
        tx.find_or_create_node(Label::BreedSynonym, props::NAME, breed.name.as_str().into())?;
    replace_single_edge(tx, dog, synonym, RelType::IsBreed)?;

    let has_taxonomy = breed.federation_id.is_some()
        || breed.kennel_club_id.is_some()
        || breed.club_id.is_some()
        || breed.group_code.is_some();
    if !has_taxonomy {
        return Ok(());
    }

    let canonical = tx.find_or_create_node(Label::Breed, props::NAME, breed.name.as_str().into())?;
    if let Some(id) = breed.federation_id {
        tx.set_property(canonical, props::FEDERATION_ID, id.into())?;
    }
    if let Some(id) = breed.kennel_club_id {
        tx.set_property(canonical, props::KENNEL_CLUB_ID, id.into())?;
    }
    if let Some(id) = breed.club_id {
        tx.set_property(canonical, props::CLUB_ID, id.into())?;
    }
    replace_single_edge(tx, synonym, canonical, RelType::MemberOf)?;

    if let Some(ref code) = breed.group_code {
        let group =
            tx.find_or_create_node(Label::BreedGroup, props::GROUP_CODE, code.as_str().into())?;
        replace_single_edge(tx, canonical, group, RelType::MemberOf)?;
    }
    Ok(())
}

/// Keep exactly one outgoing edge of `rel_type` from `from`, pointing at
/// `to`.
fn replace_single_edge(
    tx: &mut WriteTx<'_>,
    from: pedigraph_store::NodeId,
    to: pedigraph_store::NodeId,
    rel_type: RelType,
) -> Result<()> {
    let mut linked = false;
    for rel in tx.relationships(from, Some(rel_type), Direction::Outgoing) {
        if rel.to == to {
            linked = true;
        } else {
            tx.delete_relationship(rel.id)?;
        }
    }
    if !linked {
        tx.create_relationship(from, to, rel_type, vec![])?;
    }
    Ok(())
}
