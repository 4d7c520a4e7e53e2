use std::{convert::Infallible, sync::Arc};

use warp::Filter;

use crate::{jwt::SessionKeys, media::MediaStore, store::Store};

/// Everything a request handler needs, shared between requests.
pub struct AppState<S: Store> {
    pub store: S,
    pub media: MediaStore,
    pub keys: SessionKeys,
    pub upload_limit: u64,
}

impl<S: Store> AppState<S> {
    pub fn new(store: S, media: MediaStore, keys: SessionKeys, upload_limit: u64) -> Arc<Self> {
        Arc::new(Self {
            store,
            media,
            keys,
            upload_limit,
        })
    }
}

pub fn with_state<S: Store>(
    state: Arc<AppState<S>>,
) -> impl Filter<Extract = (Arc<AppState<S>>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}
