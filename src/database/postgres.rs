use sqlx::{Pool, Postgres, Transaction};

use super::{
    error::{ApiError, QueryError},
    schema::{Id, Label, LabelKind, LinkedLabel, Recipe, RecipeFields, User},
    store::{Store, StoreTx},
};

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), QueryError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;

        Ok(())
    }
}

impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, ApiError> {
        let inner = self.pool.begin().await?;

        Ok(PgTx { inner })
    }
}

pub struct PgTx {
    inner: Transaction<'static, Postgres>,
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(e) => e.is_unique_violation(),
        _ => false,
    }
}

impl StoreTx for PgTx {
    async fn commit(self) -> Result<(), ApiError> {
        self.inner.commit().await?;

        Ok(())
    }

    async fn find_user(&mut self, id: Id) -> Result<Option<User>, ApiError> {
        let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.inner)
            .await?;

        Ok(row)
    }

    async fn insert_user(
        &mut self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<Option<User>, ApiError> {
        let row: Option<User> = sqlx::query_as(
            "
            INSERT INTO users (email, name, password)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING RETURNING *
        ",
        )
        .bind(email)
        .bind(name)
        .bind(password)
        .fetch_optional(&mut *self.inner)
        .await?;

        Ok(row)
    }

    async fn list_recipes(&mut self, owner: Id) -> Result<Vec<Recipe>, ApiError> {
        let rows: Vec<Recipe> =
            sqlx::query_as("SELECT * FROM recipes WHERE user_id = $1 ORDER BY id DESC")
                .bind(owner)
                .fetch_all(&mut *self.inner)
                .await?;

        Ok(rows)
    }

    async fn find_recipe(&mut self, owner: Id, id: Id) -> Result<Option<Recipe>, ApiError> {
        let row: Option<Recipe> =
            sqlx::query_as("SELECT * FROM recipes WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(owner)
                .fetch_optional(&mut *self.inner)
                .await?;

        Ok(row)
    }

    async fn lock_recipe(&mut self, owner: Id, id: Id) -> Result<Option<Recipe>, ApiError> {
        let row: Option<Recipe> =
            sqlx::query_as("SELECT * FROM recipes WHERE id = $1 AND user_id = $2 FOR UPDATE")
                .bind(id)
                .bind(owner)
                .fetch_optional(&mut *self.inner)
                .await?;

        Ok(row)
    }

    async fn insert_recipe(&mut self, owner: Id, fields: &RecipeFields) -> Result<Recipe, ApiError> {
        let row: Recipe = sqlx::query_as(
            "
            INSERT INTO recipes (user_id, title, description, time_minutes, price, link)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
        ",
        )
        .bind(owner)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.time_minutes)
        .bind(fields.price)
        .bind(&fields.link)
        .fetch_one(&mut *self.inner)
        .await?;

        Ok(row)
    }

    async fn update_recipe(
        &mut self,
        owner: Id,
        id: Id,
        fields: &RecipeFields,
    ) -> Result<Option<Recipe>, ApiError> {
        let row: Option<Recipe> = sqlx::query_as(
            "
            UPDATE recipes SET
            title = $3,
            description = $4,
            time_minutes = $5,
            price = $6,
            link = $7
            WHERE id = $1 AND user_id = $2
            RETURNING *
        ",
        )
        .bind(id)
        .bind(owner)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.time_minutes)
        .bind(fields.price)
        .bind(&fields.link)
        .fetch_optional(&mut *self.inner)
        .await?;

        Ok(row)
    }

    async fn set_recipe_image(
        &mut self,
        owner: Id,
        id: Id,
        image: Option<&str>,
    ) -> Result<Option<Recipe>, ApiError> {
        let row: Option<Recipe> = sqlx::query_as(
            "UPDATE recipes SET image = $3 WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(owner)
        .bind(image)
        .fetch_optional(&mut *self.inner)
        .await?;

        Ok(row)
    }

    async fn delete_recipe(&mut self, owner: Id, id: Id) -> Result<Option<Recipe>, ApiError> {
        let row: Option<Recipe> =
            sqlx::query_as("DELETE FROM recipes WHERE id = $1 AND user_id = $2 RETURNING *")
                .bind(id)
                .bind(owner)
                .fetch_optional(&mut *self.inner)
                .await?;

        Ok(row)
    }

    async fn list_labels(
        &mut self,
        kind: LabelKind,
        owner: Id,
        assigned_only: bool,
    ) -> Result<Vec<Label>, ApiError> {
        let table = kind.table();
        let sql = if assigned_only {
            let link_table = kind.link_table();
            let link_column = kind.link_column();
            format!(
                "
                SELECT DISTINCT l.id, l.user_id, l.name
                FROM {table} l
                INNER JOIN {link_table} rl ON rl.{link_column} = l.id
                INNER JOIN recipes r ON r.id = rl.recipe_id AND r.user_id = $1
                WHERE l.user_id = $1
                ORDER BY l.name DESC
            "
            )
        } else {
            format!("SELECT * FROM {table} WHERE user_id = $1 ORDER BY name DESC")
        };

        let rows: Vec<Label> = sqlx::query_as(&sql)
            .bind(owner)
            .fetch_all(&mut *self.inner)
            .await?;

        Ok(rows)
    }

    async fn find_label(
        &mut self,
        kind: LabelKind,
        owner: Id,
        id: Id,
    ) -> Result<Option<Label>, ApiError> {
        let table = kind.table();
        let row: Option<Label> =
            sqlx::query_as(&format!("SELECT * FROM {table} WHERE id = $1 AND user_id = $2"))
                .bind(id)
                .bind(owner)
                .fetch_optional(&mut *self.inner)
                .await?;

        Ok(row)
    }

    async fn find_label_by_name(
        &mut self,
        kind: LabelKind,
        owner: Id,
        name: &str,
    ) -> Result<Option<Label>, ApiError> {
        let table = kind.table();
        let row: Option<Label> =
            sqlx::query_as(&format!("SELECT * FROM {table} WHERE user_id = $1 AND name = $2"))
                .bind(owner)
                .bind(name)
                .fetch_optional(&mut *self.inner)
                .await?;

        Ok(row)
    }

    async fn insert_label(
        &mut self,
        kind: LabelKind,
        owner: Id,
        name: &str,
    ) -> Result<Option<Label>, ApiError> {
        let table = kind.table();
        let row: Option<Label> = sqlx::query_as(&format!(
            "INSERT INTO {table} (user_id, name) VALUES ($1, $2) ON CONFLICT (user_id, name) DO NOTHING RETURNING *"
        ))
        .bind(owner)
        .bind(name)
        .fetch_optional(&mut *self.inner)
        .await?;

        Ok(row)
    }

    async fn rename_label(
        &mut self,
        kind: LabelKind,
        owner: Id,
        id: Id,
        name: &str,
    ) -> Result<Option<Label>, ApiError> {
        let table = kind.table();
        let row: Result<Option<Label>, sqlx::Error> = sqlx::query_as(&format!(
            "UPDATE {table} SET name = $3 WHERE id = $1 AND user_id = $2 RETURNING *"
        ))
        .bind(id)
        .bind(owner)
        .bind(name)
        .fetch_optional(&mut *self.inner)
        .await;

        match row {
            Ok(row) => Ok(row),
            Err(e) if is_unique_violation(&e) => Err(ApiError::duplicate_name(&kind.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_label(&mut self, kind: LabelKind, owner: Id, id: Id) -> Result<bool, ApiError> {
        let table = kind.table();
        let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = $1 AND user_id = $2"))
            .bind(id)
            .bind(owner)
            .execute(&mut *self.inner)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn recipe_labels(
        &mut self,
        kind: LabelKind,
        recipe_ids: &[Id],
    ) -> Result<Vec<(Id, Label)>, ApiError> {
        if recipe_ids.is_empty() {
            return Ok(vec![]);
        }

        let table = kind.table();
        let link_table = kind.link_table();
        let link_column = kind.link_column();
        let rows: Vec<LinkedLabel> = sqlx::query_as(&format!(
            "
            SELECT rl.recipe_id AS recipe_id, l.id AS id, l.user_id AS user_id, l.name AS name
            FROM {link_table} rl
            INNER JOIN {table} l ON l.id = rl.{link_column}
            WHERE rl.recipe_id = ANY($1)
            ORDER BY l.id
        "
        ))
        .bind(recipe_ids.to_vec())
        .fetch_all(&mut *self.inner)
        .await?;

        Ok(rows.into_iter().map(<(Id, Label)>::from).collect())
    }

    async fn clear_recipe_labels(&mut self, kind: LabelKind, recipe_id: Id) -> Result<(), ApiError> {
        let link_table = kind.link_table();
        sqlx::query(&format!("DELETE FROM {link_table} WHERE recipe_id = $1"))
            .bind(recipe_id)
            .execute(&mut *self.inner)
            .await?;

        Ok(())
    }

    async fn link_recipe_label(
        &mut self,
        kind: LabelKind,
        recipe_id: Id,
        label_id: Id,
    ) -> Result<(), ApiError> {
        let link_table = kind.link_table();
        let link_column = kind.link_column();
        sqlx::query(&format!(
            "INSERT INTO {link_table} (recipe_id, {link_column}) VALUES ($1, $2) ON CONFLICT DO NOTHING"
        ))
        .bind(recipe_id)
        .bind(label_id)
        .execute(&mut *self.inner)
        .await?;

        Ok(())
    }
}
