use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    error::ApiError,
    schema::{Id, Label, LabelKind, Recipe, RecipeFields, User},
    store::{Store, StoreTx},
};

#[derive(Clone, Debug, Default)]
struct State {
    sequence: Id,
    users: BTreeMap<Id, User>,
    recipes: BTreeMap<Id, Recipe>,
    labels: BTreeMap<(LabelKind, Id), Label>,
    /// `(kind, recipe id, label id)`
    links: BTreeSet<(LabelKind, Id, Id)>,
}

impl State {
    fn next_id(&mut self) -> Id {
        self.sequence += 1;
        self.sequence
    }

    fn owned_label(&self, kind: LabelKind, owner: Id, id: Id) -> Option<&Label> {
        self.labels
            .get(&(kind, id))
            .filter(|label| label.user_id == owner)
    }

    fn label_named(&self, kind: LabelKind, owner: Id, name: &str) -> Option<&Label> {
        self.labels
            .iter()
            .find(|((k, _), label)| *k == kind && label.user_id == owner && label.name == name)
            .map(|(_, label)| label)
    }

    fn owned_recipe_mut(&mut self, owner: Id, id: Id) -> Option<&mut Recipe> {
        self.recipes
            .get_mut(&id)
            .filter(|recipe| recipe.user_id == owner)
    }
}

/// Process-local store. Transactions are serialized: `begin` takes the lock,
/// works on a copy and `commit` swaps the copy in.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, ApiError> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();

        Ok(MemoryTx { guard, work })
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    work: State,
}

impl StoreTx for MemoryTx {
    async fn commit(self) -> Result<(), ApiError> {
        let MemoryTx { mut guard, work } = self;
        *guard = work;

        Ok(())
    }

    async fn find_user(&mut self, id: Id) -> Result<Option<User>, ApiError> {
        Ok(self.work.users.get(&id).cloned())
    }

    async fn insert_user(
        &mut self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<Option<User>, ApiError> {
        let taken = self
            .work
            .users
            .values()
            .any(|user| user.email.eq_ignore_ascii_case(email));
        if taken {
            return Ok(None);
        }

        let user = User {
            id: self.work.next_id(),
            email: email.to_string(),
            name: name.to_string(),
            password: password.to_string(),
        };
        self.work.users.insert(user.id, user.clone());

        Ok(Some(user))
    }

    async fn list_recipes(&mut self, owner: Id) -> Result<Vec<Recipe>, ApiError> {
        Ok(self
            .work
            .recipes
            .values()
            .rev()
            .filter(|recipe| recipe.user_id == owner)
            .cloned()
            .collect())
    }

    async fn find_recipe(&mut self, owner: Id, id: Id) -> Result<Option<Recipe>, ApiError> {
        Ok(self
            .work
            .recipes
            .get(&id)
            .filter(|recipe| recipe.user_id == owner)
            .cloned())
    }

    /// Transactions already hold the whole store.
    async fn lock_recipe(&mut self, owner: Id, id: Id) -> Result<Option<Recipe>, ApiError> {
        self.find_recipe(owner, id).await
    }

    async fn insert_recipe(&mut self, owner: Id, fields: &RecipeFields) -> Result<Recipe, ApiError> {
        if !self.work.users.contains_key(&owner) {
            return Err(ApiError::Internal(format!("User {owner} does not exist")));
        }

        let recipe = Recipe {
            id: self.work.next_id(),
            user_id: owner,
            title: fields.title.to_owned(),
            description: fields.description.to_owned(),
            time_minutes: fields.time_minutes,
            price: fields.price,
            link: fields.link.to_owned(),
            image: None,
        };
        self.work.recipes.insert(recipe.id, recipe.clone());

        Ok(recipe)
    }

    async fn update_recipe(
        &mut self,
        owner: Id,
        id: Id,
        fields: &RecipeFields,
    ) -> Result<Option<Recipe>, ApiError> {
        Ok(self.work.owned_recipe_mut(owner, id).map(|recipe| {
            recipe.title = fields.title.to_owned();
            recipe.description = fields.description.to_owned();
            recipe.time_minutes = fields.time_minutes;
            recipe.price = fields.price;
            recipe.link = fields.link.to_owned();
            recipe.clone()
        }))
    }

    async fn set_recipe_image(
        &mut self,
        owner: Id,
        id: Id,
        image: Option<&str>,
    ) -> Result<Option<Recipe>, ApiError> {
        Ok(self.work.owned_recipe_mut(owner, id).map(|recipe| {
            recipe.image = image.map(str::to_string);
            recipe.clone()
        }))
    }

    async fn delete_recipe(&mut self, owner: Id, id: Id) -> Result<Option<Recipe>, ApiError> {
        if self.work.owned_recipe_mut(owner, id).is_none() {
            return Ok(None);
        }

        self.work.links.retain(|(_, recipe_id, _)| *recipe_id != id);
        Ok(self.work.recipes.remove(&id))
    }

    async fn list_labels(
        &mut self,
        kind: LabelKind,
        owner: Id,
        assigned_only: bool,
    ) -> Result<Vec<Label>, ApiError> {
        let state = &self.work;
        let mut labels: Vec<Label> = state
            .labels
            .iter()
            .filter(|((k, _), label)| *k == kind && label.user_id == owner)
            .map(|(_, label)| label)
            .filter(|label| {
                !assigned_only
                    || state.links.iter().any(|(k, recipe_id, label_id)| {
                        *k == kind
                            && *label_id == label.id
                            && state
                                .recipes
                                .get(recipe_id)
                                .is_some_and(|recipe| recipe.user_id == owner)
                    })
            })
            .cloned()
            .collect();
        labels.sort_by(|a, b| b.name.cmp(&a.name));

        Ok(labels)
    }

    async fn find_label(
        &mut self,
        kind: LabelKind,
        owner: Id,
        id: Id,
    ) -> Result<Option<Label>, ApiError> {
        Ok(self.work.owned_label(kind, owner, id).cloned())
    }

    async fn find_label_by_name(
        &mut self,
        kind: LabelKind,
        owner: Id,
        name: &str,
    ) -> Result<Option<Label>, ApiError> {
        Ok(self.work.label_named(kind, owner, name).cloned())
    }

    async fn insert_label(
        &mut self,
        kind: LabelKind,
        owner: Id,
        name: &str,
    ) -> Result<Option<Label>, ApiError> {
        if self.work.label_named(kind, owner, name).is_some() {
            return Ok(None);
        }

        let label = Label {
            id: self.work.next_id(),
            user_id: owner,
            name: name.to_string(),
        };
        self.work.labels.insert((kind, label.id), label.clone());

        Ok(Some(label))
    }

    async fn rename_label(
        &mut self,
        kind: LabelKind,
        owner: Id,
        id: Id,
        name: &str,
    ) -> Result<Option<Label>, ApiError> {
        if self.work.owned_label(kind, owner, id).is_none() {
            return Ok(None);
        }
        if self
            .work
            .label_named(kind, owner, name)
            .is_some_and(|other| other.id != id)
        {
            return Err(ApiError::duplicate_name(&kind.to_string()));
        }

        Ok(self.work.labels.get_mut(&(kind, id)).map(|label| {
            label.name = name.to_string();
            label.clone()
        }))
    }

    async fn delete_label(&mut self, kind: LabelKind, owner: Id, id: Id) -> Result<bool, ApiError> {
        if self.work.owned_label(kind, owner, id).is_none() {
            return Ok(false);
        }

        self.work.labels.remove(&(kind, id));
        self.work
            .links
            .retain(|(k, _, label_id)| !(*k == kind && *label_id == id));

        Ok(true)
    }

    async fn recipe_labels(
        &mut self,
        kind: LabelKind,
        recipe_ids: &[Id],
    ) -> Result<Vec<(Id, Label)>, ApiError> {
        let mut rows: Vec<(Id, Label)> = self
            .work
            .links
            .iter()
            .filter(|(k, recipe_id, _)| *k == kind && recipe_ids.contains(recipe_id))
            .filter_map(|(_, recipe_id, label_id)| {
                self.work
                    .labels
                    .get(&(kind, *label_id))
                    .map(|label| (*recipe_id, label.clone()))
            })
            .collect();
        rows.sort_by_key(|(_, label)| label.id);

        Ok(rows)
    }

    async fn clear_recipe_labels(&mut self, kind: LabelKind, recipe_id: Id) -> Result<(), ApiError> {
        self.work
            .links
            .retain(|(k, r, _)| !(*k == kind && *r == recipe_id));

        Ok(())
    }

    async fn link_recipe_label(
        &mut self,
        kind: LabelKind,
        recipe_id: Id,
        label_id: Id,
    ) -> Result<(), ApiError> {
        if !self.work.recipes.contains_key(&recipe_id)
            || !self.work.labels.contains_key(&(kind, label_id))
        {
            return Err(ApiError::Internal(format!(
                "Cannot link {kind} {label_id} to recipe {recipe_id}"
            )));
        }

        self.work.links.insert((kind, recipe_id, label_id));

        Ok(())
    }
}
