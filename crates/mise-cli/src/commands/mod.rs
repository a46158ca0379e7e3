pub mod auth;
pub mod completions;
pub mod config;
pub mod convert;
pub mod converter;
pub mod pages;
pub mod run;
pub mod timer;

use std::sync::Arc;

use mise_core::{
    AuthSession, CompletionNotifier, Config, EntityId, HttpStore, PageSession, PageStore, SessionError, StoreError,
    TokioScheduler,
};

use crate::credentials::Credentials;

/// Store client for the configured backend, authenticated with the saved
/// login when there is one.
pub fn connect() -> Result<(Config, HttpStore), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let token = Credentials::load()?.map(|c| c.token);
    let store = HttpStore::new(&config.api.base_url, Arc::new(AuthSession::new(token)))?;
    Ok((config, store))
}

/// Like [`connect`], but refuses to continue without a saved login.
pub fn connect_authenticated() -> Result<(Config, HttpStore), Box<dyn std::error::Error>> {
    let (config, store) = connect()?;
    if !store.auth().is_authenticated() {
        return Err("not logged in; run `mise login` first".into());
    }
    Ok((config, store))
}

/// Drop a credential the backend no longer accepts.
pub fn forget_rejected_login(store: &HttpStore, err: &StoreError) {
    if matches!(err, StoreError::Unauthorized) {
        store.auth().end();
        if let Err(e) = Credentials::clear() {
            tracing::warn!(error = %e, "could not remove saved credentials");
        }
        eprintln!("session expired; run `mise login` again");
    }
}

/// Report a failed page operation, dropping the saved login if the backend
/// rejected it.
pub fn session_failure(store: &HttpStore, err: SessionError) -> Box<dyn std::error::Error> {
    match &err {
        SessionError::LoadFailed(store_err) | SessionError::SaveRejected(store_err) | SessionError::Store(store_err) => {
            forget_rejected_login(store, store_err)
        }
        _ => {}
    }
    err.into()
}

/// A loaded page and the store behind it.
pub struct OpenPage {
    pub config: Config,
    pub store: Arc<HttpStore>,
    pub session: Arc<PageSession>,
}

/// Load `page_id` into a page session on the current runtime.
pub async fn open_page(
    page_id: &str,
    notifier: Arc<dyn CompletionNotifier>,
) -> Result<OpenPage, Box<dyn std::error::Error>> {
    let (config, http) = connect_authenticated()?;
    let http = Arc::new(http);
    let store: Arc<dyn PageStore> = http.clone();

    let session = Arc::new(PageSession::with_default_category(
        EntityId::new(page_id),
        store,
        Arc::new(TokioScheduler::from_current()?),
        notifier,
        config.converters.default_category,
    ));
    if let Err(err) = session.load().await {
        return Err(session_failure(&http, err));
    }
    Ok(OpenPage {
        config,
        store: http,
        session,
    })
}
