use std::collections::BTreeSet;

use crate::{
    constants::GET_OR_CREATE_ATTEMPTS,
    error::ApiError,
    schema::{Id, Label, LabelKind},
    store::StoreTx,
};

/// Resolves `(owner, name)` to a label, creating it when missing.
///
/// The insert is conditional on the unique `(owner, name)` constraint, so a
/// concurrent writer that gets there first makes it return nothing; the next
/// lookup then sees that writer's row.
pub async fn get_or_create_label<T: StoreTx>(
    tx: &mut T,
    kind: LabelKind,
    owner: Id,
    name: &str,
) -> Result<Label, ApiError> {
    for attempt in 1..=GET_OR_CREATE_ATTEMPTS {
        if let Some(label) = tx.find_label_by_name(kind, owner, name).await? {
            return Ok(label);
        }

        if let Some(label) = tx.insert_label(kind, owner, name).await? {
            log::debug!("Created {kind} {name:?} ({}) for user {owner}", label.id);
            return Ok(label);
        }

        log::warn!("Lost race creating {kind} {name:?} for user {owner} (attempt {attempt})");
    }

    Err(ApiError::Internal(format!(
        "Could not resolve {kind} {name:?} for user {owner}"
    )))
}

/// Applies a tag or ingredient list to a recipe.
///
/// `None` leaves the current associations alone. With `replace`, existing
/// associations of this kind are cleared first, so an empty list removes
/// them all. Repeated names resolve to the same label.
///
/// Names are resolved in sorted order so that concurrent writers take the
/// `(owner, name)` locks in the same sequence.
pub async fn assign_labels<T: StoreTx>(
    tx: &mut T,
    kind: LabelKind,
    owner: Id,
    recipe_id: Id,
    names: Option<&[String]>,
    replace: bool,
) -> Result<(), ApiError> {
    let Some(names) = names else {
        return Ok(());
    };

    if replace {
        tx.clear_recipe_labels(kind, recipe_id).await?;
    }

    let names: BTreeSet<&str> = names.iter().map(String::as_str).collect();
    for name in names {
        let label = get_or_create_label(tx, kind, owner, name).await?;
        tx.link_recipe_label(kind, recipe_id, label.id).await?;
    }

    Ok(())
}

pub async fn list_labels<T: StoreTx>(
    tx: &mut T,
    kind: LabelKind,
    owner: Id,
    assigned_only: bool,
) -> Result<Vec<Label>, ApiError> {
    tx.list_labels(kind, owner, assigned_only).await
}

pub async fn get_label<T: StoreTx>(
    tx: &mut T,
    kind: LabelKind,
    owner: Id,
    id: Id,
) -> Result<Label, ApiError> {
    tx.find_label(kind, owner, id)
        .await?
        .ok_or(ApiError::NotFound)
}

pub async fn create_label<T: StoreTx>(
    tx: &mut T,
    kind: LabelKind,
    owner: Id,
    name: &str,
) -> Result<Label, ApiError> {
    tx.insert_label(kind, owner, name)
        .await?
        .ok_or_else(|| ApiError::duplicate_name(&kind.to_string()))
}

/// `None` keeps the current name, which makes an empty partial update a read.
pub async fn update_label<T: StoreTx>(
    tx: &mut T,
    kind: LabelKind,
    owner: Id,
    id: Id,
    name: Option<&str>,
) -> Result<Label, ApiError> {
    match name {
        Some(name) => tx
            .rename_label(kind, owner, id, name)
            .await?
            .ok_or(ApiError::NotFound),
        None => get_label(tx, kind, owner, id).await,
    }
}

pub async fn delete_label<T: StoreTx>(
    tx: &mut T,
    kind: LabelKind,
    owner: Id,
    id: Id,
) -> Result<(), ApiError> {
    if !tx.delete_label(kind, owner, id).await? {
        return Err(ApiError::NotFound);
    }

    Ok(())
}
