use std::{collections::HashMap, convert::Infallible, sync::Arc};

use bytes::{BufMut, Bytes};
use futures_util::TryStreamExt;
use warp::{
    http::StatusCode,
    multipart::FormData,
    reject::{self, Rejection},
    reply::Response,
    Filter, Reply,
};

use crate::{
    actions,
    constants::{IMAGE_FIELD, MAX_JSON_BODY},
    error::{ApiError, NON_FIELD_ERRORS},
    form::{parse_flag, parse_json, LabelPayload, RecipePayload},
    jwt::SessionData,
    middleware::with_session,
    schema::{Id, LabelKind, Operation, RecipeRecord, RecipeView},
    state::{with_state, AppState},
    store::{retry_transaction, Store, StoreTx},
};

const ASSIGNED_ONLY: &str = "assigned_only";

/// The full HTTP surface: the JSON API under `/api/recipe` and stored media
/// under `/static/media`.
pub fn routes<S: Store>(
    state: Arc<AppState<S>>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    recipe_routes(state.clone())
        .or(label_routes(LabelKind::Tag, state.clone()))
        .or(label_routes(LabelKind::Ingredient, state.clone()))
        .or(media_files(state))
        .recover(handle_rejection)
}

fn api() -> impl Filter<Extract = (), Error = Rejection> + Copy {
    warp::path("api").and(warp::path("recipe"))
}

fn json_body() -> impl Filter<Extract = (Bytes,), Error = Rejection> + Copy {
    warp::body::content_length_limit(MAX_JSON_BODY).and(warp::body::bytes())
}

fn media_files<S: Store>(
    state: Arc<AppState<S>>,
) -> impl Filter<Extract = (warp::fs::File,), Error = Rejection> + Clone {
    warp::path("static")
        .and(warp::path("media"))
        .and(warp::fs::dir(state.media.root().to_path_buf()))
}

fn respond(result: Result<Response, ApiError>) -> Result<Response, Rejection> {
    result.map_err(reject::custom)
}

fn recipe_routes<S: Store>(
    state: Arc<AppState<S>>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let collection = api().and(warp::path("recipes")).and(warp::path::end());
    let member = api()
        .and(warp::path("recipes"))
        .and(warp::path::param::<Id>())
        .and(warp::path::end());
    let upload = api()
        .and(warp::path("recipes"))
        .and(warp::path::param::<Id>())
        .and(warp::path("upload-image"))
        .and(warp::path::end());

    let list = collection
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(with_session(state.clone()))
        .and_then(|state: Arc<AppState<S>>, session: SessionData| async move {
            respond(list_recipes(state, session).await)
        });

    let create = collection
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(with_session(state.clone()))
        .and(json_body())
        .and_then(
            |state: Arc<AppState<S>>, session: SessionData, body: Bytes| async move {
                respond(create_recipe(state, session, body).await)
            },
        );

    let retrieve = member
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(with_session(state.clone()))
        .and_then(
            |id: Id, state: Arc<AppState<S>>, session: SessionData| async move {
                respond(retrieve_recipe(state, session, id).await)
            },
        );

    let update = member
        .and(
            warp::put()
                .map(|| Operation::Update)
                .or(warp::patch().map(|| Operation::PartialUpdate))
                .unify(),
        )
        .and(with_state(state.clone()))
        .and(with_session(state.clone()))
        .and(json_body())
        .and_then(
            |id: Id,
             operation: Operation,
             state: Arc<AppState<S>>,
             session: SessionData,
             body: Bytes| async move {
                respond(update_recipe(state, session, id, operation, body).await)
            },
        );

    let delete = member
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and(with_session(state.clone()))
        .and_then(
            |id: Id, state: Arc<AppState<S>>, session: SessionData| async move {
                respond(delete_recipe(state, session, id).await)
            },
        );

    let upload_limit = state.upload_limit;
    let upload_image = upload
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(with_session(state))
        .and(warp::multipart::form().max_length(upload_limit))
        .and_then(
            |id: Id, state: Arc<AppState<S>>, session: SessionData, form: FormData| async move {
                respond(upload_recipe_image(state, session, id, form).await)
            },
        );

    list.or(create)
        .unify()
        .or(retrieve)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(upload_image)
        .unify()
}

fn label_routes<S: Store>(
    kind: LabelKind,
    state: Arc<AppState<S>>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let collection = api().and(warp::path(kind.table())).and(warp::path::end());
    let member = api()
        .and(warp::path(kind.table()))
        .and(warp::path::param::<Id>())
        .and(warp::path::end());

    let list = collection
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state(state.clone()))
        .and(with_session(state.clone()))
        .and_then(
            move |query: HashMap<String, String>,
                  state: Arc<AppState<S>>,
                  session: SessionData| async move {
                respond(list_labels(state, session, kind, query).await)
            },
        );

    let create = collection
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(with_session(state.clone()))
        .and(json_body())
        .and_then(
            move |state: Arc<AppState<S>>, session: SessionData, body: Bytes| async move {
                respond(create_label(state, session, kind, body).await)
            },
        );

    let retrieve = member
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(with_session(state.clone()))
        .and_then(
            move |id: Id, state: Arc<AppState<S>>, session: SessionData| async move {
                respond(retrieve_label(state, session, kind, id).await)
            },
        );

    let update = member
        .and(
            warp::put()
                .map(|| Operation::Update)
                .or(warp::patch().map(|| Operation::PartialUpdate))
                .unify(),
        )
        .and(with_state(state.clone()))
        .and(with_session(state.clone()))
        .and(json_body())
        .and_then(
            move |id: Id,
                  operation: Operation,
                  state: Arc<AppState<S>>,
                  session: SessionData,
                  body: Bytes| async move {
                respond(update_label(state, session, kind, id, operation, body).await)
            },
        );

    let delete = member
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and(with_session(state))
        .and_then(
            move |id: Id, state: Arc<AppState<S>>, session: SessionData| async move {
                respond(delete_label(state, session, kind, id).await)
            },
        );

    list.or(create)
        .unify()
        .or(retrieve)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
}

fn recipe_reply<S: Store>(
    state: &AppState<S>,
    operation: Operation,
    record: RecipeRecord,
    status: StatusCode,
) -> Response {
    let view = RecipeView::new(operation, record, &state.media);

    warp::reply::with_status(warp::reply::json(&view), status).into_response()
}

async fn list_recipes<S: Store>(
    state: Arc<AppState<S>>,
    session: SessionData,
) -> Result<Response, ApiError> {
    let mut tx = state.store.begin().await?;
    let records = actions::list_recipes(&mut tx, session.user_id).await?;

    let views: Vec<RecipeView> = records
        .into_iter()
        .map(|record| RecipeView::new(Operation::List, record, &state.media))
        .collect();

    Ok(warp::reply::json(&views).into_response())
}

async fn retrieve_recipe<S: Store>(
    state: Arc<AppState<S>>,
    session: SessionData,
    id: Id,
) -> Result<Response, ApiError> {
    let mut tx = state.store.begin().await?;
    let record = actions::get_recipe(&mut tx, session.user_id, id).await?;

    Ok(recipe_reply(&state, Operation::Retrieve, record, StatusCode::OK))
}

async fn create_recipe<S: Store>(
    state: Arc<AppState<S>>,
    session: SessionData,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payload: RecipePayload = parse_json(&body)?;
    let record =
        retry_transaction(|| insert_recipe(&state.store, session.user_id, &payload)).await?;

    Ok(recipe_reply(&state, Operation::Create, record, StatusCode::CREATED))
}

async fn insert_recipe<S: Store>(
    store: &S,
    owner: Id,
    payload: &RecipePayload,
) -> Result<RecipeRecord, ApiError> {
    let mut tx = store.begin().await?;
    let record = actions::create_recipe(&mut tx, owner, payload.clone()).await?;
    tx.commit().await?;

    Ok(record)
}

async fn update_recipe<S: Store>(
    state: Arc<AppState<S>>,
    session: SessionData,
    id: Id,
    operation: Operation,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payload: RecipePayload = parse_json(&body)?;
    let record = retry_transaction(|| {
        save_recipe(&state.store, session.user_id, id, &payload, operation)
    })
    .await?;

    Ok(recipe_reply(&state, operation, record, StatusCode::OK))
}

async fn save_recipe<S: Store>(
    store: &S,
    owner: Id,
    id: Id,
    payload: &RecipePayload,
    operation: Operation,
) -> Result<RecipeRecord, ApiError> {
    let mut tx = store.begin().await?;
    let record = actions::update_recipe(&mut tx, owner, id, payload.clone(), operation).await?;
    tx.commit().await?;

    Ok(record)
}

async fn delete_recipe<S: Store>(
    state: Arc<AppState<S>>,
    session: SessionData,
    id: Id,
) -> Result<Response, ApiError> {
    let mut tx = state.store.begin().await?;
    let recipe = actions::delete_recipe(&mut tx, session.user_id, id).await?;
    tx.commit().await?;

    if let Some(image) = recipe.image {
        state.media.remove(&image).await;
    }

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Collects the bytes of the `image` part, ignoring any other parts.
async fn read_image_part(form: FormData) -> Result<Option<Vec<u8>>, ApiError> {
    let multipart_error =
        |e: warp::Error| ApiError::validation(NON_FIELD_ERRORS, format!("Multipart form parse error - {e}"));

    futures_util::pin_mut!(form);
    while let Some(part) = form.try_next().await.map_err(multipart_error)? {
        if part.name() != IMAGE_FIELD {
            continue;
        }

        let bytes = part
            .stream()
            .try_fold(Vec::new(), |mut bytes, chunk| async move {
                bytes.put(chunk);
                Ok(bytes)
            })
            .await
            .map_err(multipart_error)?;

        return Ok(Some(bytes));
    }

    Ok(None)
}

async fn upload_recipe_image<S: Store>(
    state: Arc<AppState<S>>,
    session: SessionData,
    id: Id,
    form: FormData,
) -> Result<Response, ApiError> {
    let upload = read_image_part(form).await?;
    let recipe =
        actions::attach_image(&state.store, &state.media, session.user_id, id, upload).await?;

    let record = RecipeRecord {
        recipe,
        tags: Vec::new(),
        ingredients: Vec::new(),
    };

    Ok(recipe_reply(&state, Operation::UploadImage, record, StatusCode::OK))
}

async fn list_labels<S: Store>(
    state: Arc<AppState<S>>,
    session: SessionData,
    kind: LabelKind,
    query: HashMap<String, String>,
) -> Result<Response, ApiError> {
    let assigned_only = parse_flag(ASSIGNED_ONLY, query.get(ASSIGNED_ONLY).map(String::as_str))?;

    let mut tx = state.store.begin().await?;
    let labels = actions::list_labels(&mut tx, kind, session.user_id, assigned_only).await?;

    Ok(warp::reply::json(&labels).into_response())
}

async fn retrieve_label<S: Store>(
    state: Arc<AppState<S>>,
    session: SessionData,
    kind: LabelKind,
    id: Id,
) -> Result<Response, ApiError> {
    let mut tx = state.store.begin().await?;
    let label = actions::get_label(&mut tx, kind, session.user_id, id).await?;

    Ok(warp::reply::json(&label).into_response())
}

async fn create_label<S: Store>(
    state: Arc<AppState<S>>,
    session: SessionData,
    kind: LabelKind,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payload: LabelPayload = parse_json(&body)?;
    let Some(name) = payload.validate(Operation::Create)? else {
        return Err(ApiError::validation("name", "This field is required."));
    };

    let mut tx = state.store.begin().await?;
    let label = actions::create_label(&mut tx, kind, session.user_id, &name).await?;
    tx.commit().await?;
    log::info!("User {} created {kind} {}", session.user_id, label.id);

    Ok(warp::reply::with_status(warp::reply::json(&label), StatusCode::CREATED).into_response())
}

async fn update_label<S: Store>(
    state: Arc<AppState<S>>,
    session: SessionData,
    kind: LabelKind,
    id: Id,
    operation: Operation,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payload: LabelPayload = parse_json(&body)?;

    let mut tx = state.store.begin().await?;
    actions::get_label(&mut tx, kind, session.user_id, id).await?;
    let name = payload.validate(operation)?;
    let label = actions::update_label(&mut tx, kind, session.user_id, id, name.as_deref()).await?;
    tx.commit().await?;

    Ok(warp::reply::json(&label).into_response())
}

async fn delete_label<S: Store>(
    state: Arc<AppState<S>>,
    session: SessionData,
    kind: LabelKind,
    id: Id,
) -> Result<Response, ApiError> {
    let mut tx = state.store.begin().await?;
    actions::delete_label(&mut tx, kind, session.user_id, id).await?;
    tx.commit().await?;
    log::info!("User {} deleted {kind} {id}", session.user_id);

    Ok(StatusCode::NO_CONTENT.into_response())
}

fn error_reply(status: StatusCode, detail: &str) -> Response {
    warp::reply::with_status(
        warp::reply::json(&serde_json::json!({ "detail": detail })),
        status,
    )
    .into_response()
}

/// Turns every rejection into a JSON response.
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(e) = err.find::<ApiError>() {
        return Ok(e.to_response());
    }

    let response = if err.is_not_found() {
        error_reply(StatusCode::NOT_FOUND, "Not found.")
    } else if err.find::<reject::PayloadTooLarge>().is_some() {
        error_reply(StatusCode::PAYLOAD_TOO_LARGE, "Request body is too large.")
    } else if err.find::<reject::LengthRequired>().is_some() {
        error_reply(StatusCode::LENGTH_REQUIRED, "Content-Length header is required.")
    } else if err.find::<reject::UnsupportedMediaType>().is_some() {
        error_reply(StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported media type.")
    } else if let Some(e) = err.find::<reject::InvalidQuery>() {
        error_reply(StatusCode::BAD_REQUEST, &e.to_string())
    } else if let Some(e) = err.find::<reject::MissingHeader>() {
        error_reply(StatusCode::BAD_REQUEST, &e.to_string())
    } else if let Some(e) = err.find::<reject::InvalidHeader>() {
        error_reply(StatusCode::BAD_REQUEST, &e.to_string())
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        // Sibling routes on the same path reject with 405 whenever another
        // route matched the method, so this goes last.
        error_reply(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed.")
    } else {
        log::error!("Unhandled rejection: {err:?}");
        error_reply(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
    };

    Ok(response)
}
