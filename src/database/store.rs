use std::future::Future;

use crate::constants::TRANSACTION_ATTEMPTS;

use super::{
    error::ApiError,
    schema::{Id, Label, LabelKind, Recipe, RecipeFields, User},
};

/// A persistence backend. Every request works inside one transaction so a
/// write either lands completely or not at all.
pub trait Store: Clone + Send + Sync + 'static {
    type Tx: StoreTx;

    fn begin(&self) -> impl Future<Output = Result<Self::Tx, ApiError>> + Send;
}

/// Runs `attempt` until it succeeds, fails with a non-retryable error, or
/// `TRANSACTION_ATTEMPTS` runs were aborted by the database. Each run must
/// begin and commit its own transaction.
pub async fn retry_transaction<F, Fut, R>(mut attempt: F) -> Result<R, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, ApiError>>,
{
    let mut run = 1;
    loop {
        match attempt().await {
            Err(e) if e.is_retryable() && run < TRANSACTION_ATTEMPTS => {
                log::warn!("Transaction aborted, retrying (run {run}): {e}");
                run += 1;
            }
            result => return result,
        }
    }
}

/// Operations available inside a transaction. Dropping the transaction
/// without calling `commit` discards everything it wrote.
///
/// Recipe and label lookups take the owner so that records belonging to
/// someone else are indistinguishable from missing ones.
pub trait StoreTx: Send + Sized {
    fn commit(self) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn find_user(&mut self, id: Id) -> impl Future<Output = Result<Option<User>, ApiError>> + Send;

    /// Returns `None` if the email is already taken.
    fn insert_user(
        &mut self,
        email: &str,
        name: &str,
        password: &str,
    ) -> impl Future<Output = Result<Option<User>, ApiError>> + Send;

    /// Newest first.
    fn list_recipes(
        &mut self,
        owner: Id,
    ) -> impl Future<Output = Result<Vec<Recipe>, ApiError>> + Send;

    fn find_recipe(
        &mut self,
        owner: Id,
        id: Id,
    ) -> impl Future<Output = Result<Option<Recipe>, ApiError>> + Send;

    /// Like `find_recipe`, but holds the row until the transaction ends so
    /// that concurrent writers of the same recipe queue behind each other.
    fn lock_recipe(
        &mut self,
        owner: Id,
        id: Id,
    ) -> impl Future<Output = Result<Option<Recipe>, ApiError>> + Send;

    fn insert_recipe(
        &mut self,
        owner: Id,
        fields: &RecipeFields,
    ) -> impl Future<Output = Result<Recipe, ApiError>> + Send;

    fn update_recipe(
        &mut self,
        owner: Id,
        id: Id,
        fields: &RecipeFields,
    ) -> impl Future<Output = Result<Option<Recipe>, ApiError>> + Send;

    fn set_recipe_image(
        &mut self,
        owner: Id,
        id: Id,
        image: Option<&str>,
    ) -> impl Future<Output = Result<Option<Recipe>, ApiError>> + Send;

    /// Returns the deleted row.
    fn delete_recipe(
        &mut self,
        owner: Id,
        id: Id,
    ) -> impl Future<Output = Result<Option<Recipe>, ApiError>> + Send;

    /// Ordered by descending name. With `assigned_only`, only labels linked to
    /// at least one of the owner's recipes, each once.
    fn list_labels(
        &mut self,
        kind: LabelKind,
        owner: Id,
        assigned_only: bool,
    ) -> impl Future<Output = Result<Vec<Label>, ApiError>> + Send;

    fn find_label(
        &mut self,
        kind: LabelKind,
        owner: Id,
        id: Id,
    ) -> impl Future<Output = Result<Option<Label>, ApiError>> + Send;

    fn find_label_by_name(
        &mut self,
        kind: LabelKind,
        owner: Id,
        name: &str,
    ) -> impl Future<Output = Result<Option<Label>, ApiError>> + Send;

    /// Returns `None` when `(owner, name)` already exists.
    fn insert_label(
        &mut self,
        kind: LabelKind,
        owner: Id,
        name: &str,
    ) -> impl Future<Output = Result<Option<Label>, ApiError>> + Send;

    /// Fails with a validation error when the new name is taken.
    fn rename_label(
        &mut self,
        kind: LabelKind,
        owner: Id,
        id: Id,
        name: &str,
    ) -> impl Future<Output = Result<Option<Label>, ApiError>> + Send;

    fn delete_label(
        &mut self,
        kind: LabelKind,
        owner: Id,
        id: Id,
    ) -> impl Future<Output = Result<bool, ApiError>> + Send;

    /// `(recipe id, label)` pairs for the given recipes, labels in id order.
    fn recipe_labels(
        &mut self,
        kind: LabelKind,
        recipe_ids: &[Id],
    ) -> impl Future<Output = Result<Vec<(Id, Label)>, ApiError>> + Send;

    fn clear_recipe_labels(
        &mut self,
        kind: LabelKind,
        recipe_id: Id,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Linking an already linked label is a no-op.
    fn link_recipe_label(
        &mut self,
        kind: LabelKind,
        recipe_id: Id,
        label_id: Id,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}
