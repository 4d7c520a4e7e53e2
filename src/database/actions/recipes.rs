use std::collections::HashMap;

use crate::{
    error::ApiError,
    form::RecipePayload,
    schema::{Id, Label, LabelKind, Operation, Recipe, RecipeRecord},
    store::StoreTx,
};

use super::labels::assign_labels;

async fn labels_by_recipe<T: StoreTx>(
    tx: &mut T,
    kind: LabelKind,
    recipe_ids: &[Id],
) -> Result<HashMap<Id, Vec<Label>>, ApiError> {
    let mut grouped: HashMap<Id, Vec<Label>> = HashMap::new();
    for (recipe_id, label) in tx.recipe_labels(kind, recipe_ids).await? {
        grouped.entry(recipe_id).or_default().push(label);
    }

    Ok(grouped)
}

async fn with_labels<T: StoreTx>(
    tx: &mut T,
    recipes: Vec<Recipe>,
) -> Result<Vec<RecipeRecord>, ApiError> {
    let ids: Vec<Id> = recipes.iter().map(|recipe| recipe.id).collect();
    let mut tags = labels_by_recipe(tx, LabelKind::Tag, &ids).await?;
    let mut ingredients = labels_by_recipe(tx, LabelKind::Ingredient, &ids).await?;

    Ok(recipes
        .into_iter()
        .map(|recipe| RecipeRecord {
            tags: tags.remove(&recipe.id).unwrap_or_default(),
            ingredients: ingredients.remove(&recipe.id).unwrap_or_default(),
            recipe,
        })
        .collect())
}

async fn record<T: StoreTx>(tx: &mut T, recipe: Recipe) -> Result<RecipeRecord, ApiError> {
    with_labels(tx, vec![recipe])
        .await?
        .pop()
        .ok_or(ApiError::NotFound)
}

pub async fn list_recipes<T: StoreTx>(tx: &mut T, owner: Id) -> Result<Vec<RecipeRecord>, ApiError> {
    let recipes = tx.list_recipes(owner).await?;

    with_labels(tx, recipes).await
}

pub async fn get_recipe<T: StoreTx>(tx: &mut T, owner: Id, id: Id) -> Result<RecipeRecord, ApiError> {
    let recipe = tx.find_recipe(owner, id).await?.ok_or(ApiError::NotFound)?;

    record(tx, recipe).await
}

pub async fn create_recipe<T: StoreTx>(
    tx: &mut T,
    owner: Id,
    payload: RecipePayload,
) -> Result<RecipeRecord, ApiError> {
    let input = payload.validate(Operation::Create, None)?;
    let recipe = tx.insert_recipe(owner, &input.fields).await?;

    assign_labels(tx, LabelKind::Tag, owner, recipe.id, input.tags.as_deref(), false).await?;
    assign_labels(
        tx,
        LabelKind::Ingredient,
        owner,
        recipe.id,
        input.ingredients.as_deref(),
        false,
    )
    .await?;

    log::info!("User {owner} created recipe {}", recipe.id);
    record(tx, recipe).await
}

/// Full or partial update. The owner is never part of the write, so a `user`
/// key in the payload has no effect.
pub async fn update_recipe<T: StoreTx>(
    tx: &mut T,
    owner: Id,
    id: Id,
    payload: RecipePayload,
    operation: Operation,
) -> Result<RecipeRecord, ApiError> {
    let current = tx.lock_recipe(owner, id).await?.ok_or(ApiError::NotFound)?;
    let input = payload.validate(operation, Some(&current))?;
    let recipe = tx
        .update_recipe(owner, id, &input.fields)
        .await?
        .ok_or(ApiError::NotFound)?;

    assign_labels(tx, LabelKind::Tag, owner, id, input.tags.as_deref(), true).await?;
    assign_labels(
        tx,
        LabelKind::Ingredient,
        owner,
        id,
        input.ingredients.as_deref(),
        true,
    )
    .await?;

    record(tx, recipe).await
}

/// Returns the deleted recipe so its image can be cleaned up.
pub async fn delete_recipe<T: StoreTx>(tx: &mut T, owner: Id, id: Id) -> Result<Recipe, ApiError> {
    let recipe = tx.delete_recipe(owner, id).await?.ok_or(ApiError::NotFound)?;
    log::info!("User {owner} deleted recipe {id}");

    Ok(recipe)
}
