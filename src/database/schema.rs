use std::fmt::{self, Display};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::media::MediaStore;

pub type Id = i32;

/// Tags and ingredients share one shape; the kind picks the tables they live in.
#[derive(
    Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize, Eq, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    Tag,
    Ingredient,
}

impl LabelKind {
    pub fn table(&self) -> &'static str {
        match self {
            LabelKind::Tag => "tags",
            LabelKind::Ingredient => "ingredients",
        }
    }

    pub fn link_table(&self) -> &'static str {
        match self {
            LabelKind::Tag => "recipe_tags",
            LabelKind::Ingredient => "recipe_ingredients",
        }
    }

    pub fn link_column(&self) -> &'static str {
        match self {
            LabelKind::Tag => "tag_id",
            LabelKind::Ingredient => "ingredient_id",
        }
    }

    /// Payload field and URL segment for this kind.
    pub fn field(&self) -> &'static str {
        self.table()
    }
}

impl Display for LabelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelKind::Tag => write!(f, "tag"),
            LabelKind::Ingredient => write!(f, "ingredient"),
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub id: Id,
    pub user_id: Id,
    pub title: String,
    pub description: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub image: Option<String>,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub id: Id,
    #[serde(skip)]
    pub user_id: Id,
    pub name: String,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct LinkedLabel {
    pub recipe_id: Id,
    pub id: Id,
    pub user_id: Id,
    pub name: String,
}

impl From<LinkedLabel> for (Id, Label) {
    fn from(row: LinkedLabel) -> Self {
        (
            row.recipe_id,
            Label {
                id: row.id,
                user_id: row.user_id,
                name: row.name,
            },
        )
    }
}

/// The writable columns of a recipe. The owner is deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeFields {
    pub title: String,
    pub description: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
}

impl From<&Recipe> for RecipeFields {
    fn from(recipe: &Recipe) -> Self {
        Self {
            title: recipe.title.to_owned(),
            description: recipe.description.to_owned(),
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link.to_owned(),
        }
    }
}

/// A recipe together with its resolved associations.
#[derive(Debug, Clone)]
pub struct RecipeRecord {
    pub recipe: Recipe,
    pub tags: Vec<Label>,
    pub ingredients: Vec<Label>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    List,
    Retrieve,
    Create,
    Update,
    PartialUpdate,
    UploadImage,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecipeShape {
    Summary,
    Detail,
    Image,
}

impl Operation {
    pub fn shape(&self) -> RecipeShape {
        match self {
            Operation::List => RecipeShape::Summary,
            Operation::Retrieve
            | Operation::Create
            | Operation::Update
            | Operation::PartialUpdate => RecipeShape::Detail,
            Operation::UploadImage => RecipeShape::Image,
        }
    }

    /// Whether every required field must be present in the payload.
    pub fn is_full_write(&self) -> bool {
        matches!(self, Operation::Create | Operation::Update)
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct RecipeSummary {
    pub id: Id,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub tags: Vec<Label>,
    pub ingredients: Vec<Label>,
}

#[derive(Serialize, Debug, Clone)]
pub struct RecipeDetail {
    #[serde(flatten)]
    pub summary: RecipeSummary,
    pub description: String,
    pub image: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
pub struct RecipeImage {
    pub id: Id,
    pub image: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(untagged)]
pub enum RecipeView {
    Summary(RecipeSummary),
    Detail(RecipeDetail),
    Image(RecipeImage),
}

impl RecipeView {
    pub fn new(operation: Operation, record: RecipeRecord, media: &MediaStore) -> Self {
        let RecipeRecord {
            recipe,
            tags,
            ingredients,
        } = record;
        let image = recipe.image.as_deref().map(|path| media.url(path));

        match operation.shape() {
            RecipeShape::Image => RecipeView::Image(RecipeImage {
                id: recipe.id,
                image,
            }),
            shape => {
                let summary = RecipeSummary {
                    id: recipe.id,
                    title: recipe.title,
                    time_minutes: recipe.time_minutes,
                    price: recipe.price,
                    link: recipe.link,
                    tags,
                    ingredients,
                };

                if shape == RecipeShape::Summary {
                    RecipeView::Summary(summary)
                } else {
                    RecipeView::Detail(RecipeDetail {
                        summary,
                        description: recipe.description,
                        image,
                    })
                }
            }
        }
    }
}
