use image::ImageFormat;

use crate::{
    constants::{IMAGE_FIELD, RECIPE_UPLOAD_DIR},
    error::ApiError,
    media::MediaStore,
    schema::{Id, Recipe},
    store::{Store, StoreTx},
};

const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
const NO_FILE: &str = "No file was submitted.";

/// Decodes `bytes` fully and reports the detected format.
pub fn inspect_image(bytes: &[u8]) -> Result<ImageFormat, ApiError> {
    let invalid = |_| ApiError::validation(IMAGE_FIELD, INVALID_IMAGE);

    let format = image::guess_format(bytes).map_err(invalid)?;
    image::load_from_memory_with_format(bytes, format).map_err(invalid)?;

    Ok(format)
}

/// Stores `upload` as the image of an owned recipe, replacing any previous one.
///
/// The recipe row is locked for the whole upload, so concurrent uploads to one
/// recipe each see the image the previous one committed. The row is only
/// written once the payload decoded and the blob is on disk. If the row update
/// does not commit, the new blob is removed again; the old blob is removed only
/// after the commit.
pub async fn attach_image<S: Store>(
    store: &S,
    media: &MediaStore,
    owner: Id,
    recipe_id: Id,
    upload: Option<Vec<u8>>,
) -> Result<Recipe, ApiError> {
    let mut tx = store.begin().await?;
    let current = tx
        .lock_recipe(owner, recipe_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let bytes = upload.ok_or_else(|| ApiError::validation(IMAGE_FIELD, NO_FILE))?;
    let (format, bytes) = tokio::task::spawn_blocking(move || {
        inspect_image(&bytes).map(|format| (format, bytes))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Image inspection failed: {e}")))??;

    let extension = format.extensions_str().first().copied().unwrap_or("img");
    let relative = media.save(RECIPE_UPLOAD_DIR, extension, &bytes).await?;

    let updated = match store_reference(tx, owner, recipe_id, &relative).await {
        Ok(updated) => updated,
        Err(e) => {
            media.remove(&relative).await;
            return Err(e);
        }
    };

    if let Some(previous) = current.image {
        media.remove(&previous).await;
    }
    log::info!("User {owner} attached image {relative} to recipe {recipe_id}");

    Ok(updated)
}

async fn store_reference<T: StoreTx>(
    mut tx: T,
    owner: Id,
    recipe_id: Id,
    relative: &str,
) -> Result<Recipe, ApiError> {
    let updated = tx
        .set_recipe_image(owner, recipe_id, Some(relative))
        .await?
        .ok_or(ApiError::NotFound)?;
    tx.commit().await?;

    Ok(updated)
}
