//! REST client for the page store.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use super::{ConverterRecord, NewConverter, PageRecord, PageStore, TimerRecord};
use crate::error::StoreError;
use crate::ids::EntityId;
use crate::session::AuthSession;

/// Default backend address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5690";

/// Successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    #[serde(default)]
    pub user: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DashboardResponse {
    #[serde(default)]
    pages: Vec<PageRecord>,
}

pub struct HttpStore {
    client: Client,
    base_url: Url,
    auth: Arc<AuthSession>,
}

impl HttpStore {
    /// Client for the store at `base_url`, authenticating with `auth`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Transport`] if `base_url` is not a valid URL.
    pub fn new(base_url: &str, auth: Arc<AuthSession>) -> Result<Self, StoreError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            base_url,
            auth,
        })
    }

    pub fn auth(&self) -> &Arc<AuthSession> {
        &self.auth
    }

    /// Exchange credentials for a bearer token. The token is installed on
    /// this store's [`AuthSession`].
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResponse, StoreError> {
        let request = self
            .client
            .post(self.endpoint("api/users/login")?)
            .json(&json!({ "username": username, "password": password }));
        let response = check(request.send().await?).await?;
        let auth: AuthResponse = response.json().await?;
        self.auth.set_token(auth.token.clone());
        tracing::info!(username, "logged in");
        Ok(auth)
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<(), StoreError> {
        let request = self
            .client
            .post(self.endpoint("api/users/register")?)
            .json(&json!({ "username": username, "password": password }));
        check(request.send().await?).await?;
        tracing::info!(username, "registered");
        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        Ok(self.base_url.join(path)?)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let request = match self.auth.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await.map_err(|err| {
            tracing::warn!(error = %err, "store request failed");
            StoreError::from(err)
        })?;
        check(response).await
    }

    /// Body of a create call, if it is JSON at all.
    async fn body(&self, response: Response) -> Result<Option<Value>, StoreError> {
        let text = response.text().await?;
        Ok(serde_json::from_str(&text).ok())
    }
}

/// Map non-success statuses onto the store error taxonomy.
async fn check(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| status.to_string());
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized,
        StatusCode::NOT_FOUND => StoreError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            StoreError::Validation(message)
        }
        _ => StoreError::Transport(format!("{status}: {message}")),
    })
}

fn segment(id: &EntityId) -> String {
    urlencoding::encode(id.as_str()).into_owned()
}

/// Pull a record out of a create response. The backend answers with the
/// record itself, a wrapper object, or the whole parent; accept each.
fn extract<T>(body: &Value, wrapper: &str, list: &str, pick: impl Fn(&T) -> bool) -> Option<T>
where
    T: for<'de> Deserialize<'de>,
{
    if let Ok(record) = serde_json::from_value::<T>(body.clone()) {
        return Some(record);
    }
    if let Some(inner) = body.get(wrapper) {
        if let Ok(record) = serde_json::from_value::<T>(inner.clone()) {
            return Some(record);
        }
    }
    let items = body.get(list).or_else(|| body.get("page").and_then(|p| p.get(list)))?;
    let items: Vec<T> = serde_json::from_value(items.clone()).ok()?;
    items.into_iter().rev().find(|r| pick(r))
}

#[async_trait]
impl PageStore for HttpStore {
    async fn list_pages(&self) -> Result<Vec<PageRecord>, StoreError> {
        let response = self
            .send(self.client.get(self.endpoint("api/users/dashboard")?))
            .await?;
        let dashboard: DashboardResponse = response.json().await?;
        Ok(dashboard.pages)
    }

    async fn create_page(&self, label: &str) -> Result<PageRecord, StoreError> {
        let request = self
            .client
            .post(self.endpoint("api/users/addPage")?)
            .json(&json!({ "label": label }));
        let body = self.body(self.send(request).await?).await?;

        if let Some(page) = body
            .as_ref()
            .and_then(|b| extract::<PageRecord>(b, "page", "pages", |p| p.label == label))
        {
            return Ok(page);
        }
        self.list_pages()
            .await?
            .into_iter()
            .rev()
            .find(|p| p.label == label)
            .ok_or_else(|| StoreError::Decode("created page missing from dashboard".into()))
    }

    async fn delete_page(&self, page_id: &EntityId) -> Result<(), StoreError> {
        let url = self.endpoint(&format!("api/users/deletePage/{}", segment(page_id)))?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    async fn create_timer(
        &self,
        page_id: &EntityId,
        label: &str,
        duration_secs: i64,
    ) -> Result<TimerRecord, StoreError> {
        let request = self
            .client
            .post(self.endpoint("api/users/addTimer")?)
            .json(&json!({ "label": label, "duration": duration_secs, "pageId": page_id }));
        let body = self.body(self.send(request).await?).await?;

        let matches = |t: &TimerRecord| t.label == label && t.duration == duration_secs;
        if let Some(timer) = body
            .as_ref()
            .and_then(|b| extract::<TimerRecord>(b, "timer", "timers", matches))
        {
            return Ok(timer);
        }
        self.get_page(page_id)
            .await?
            .and_then(|page| page.timers.into_iter().rev().find(matches))
            .ok_or_else(|| StoreError::Decode("created timer missing from page".into()))
    }

    async fn delete_timer(&self, timer_id: &EntityId) -> Result<(), StoreError> {
        let url = self.endpoint(&format!("api/users/deleteTimer/{}", segment(timer_id)))?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    async fn create_converter(
        &self,
        page_id: &EntityId,
        converter: &NewConverter,
    ) -> Result<ConverterRecord, StoreError> {
        let url = self.endpoint(&format!("api/users/pages/{}/unitConverters", segment(page_id)))?;
        let mut payload = serde_json::to_value(converter).map_err(|e| StoreError::Decode(e.to_string()))?;
        payload["pageId"] = json!(page_id);
        let body = self.body(self.send(self.client.post(url).json(&payload)).await?).await?;

        let matches = |c: &ConverterRecord| c.category == converter.category;
        if let Some(record) = body
            .as_ref()
            .and_then(|b| extract::<ConverterRecord>(b, "unitConverter", "unitConverters", matches))
        {
            return Ok(record);
        }
        self.get_page(page_id)
            .await?
            .and_then(|page| page.converters.into_iter().rev().find(matches))
            .ok_or_else(|| StoreError::Decode("saved converter missing from page".into()))
    }

    async fn delete_converter(
        &self,
        page_id: &EntityId,
        converter_id: &EntityId,
    ) -> Result<(), StoreError> {
        let url = self.endpoint(&format!(
            "api/users/pages/{}/unitConverters/{}",
            segment(page_id),
            segment(converter_id)
        ))?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const DASHBOARD: &str = r#"{"pages":[
        {"_id":"p1","label":"Bread","timers":[{"_id":"t1","label":"Proof","duration":3600}],"unitConverters":[]},
        {"_id":"p2","label":"Soup","timers":[],"unitConverters":[]}
    ]}"#;

    fn store(server: &mockito::ServerGuard, token: Option<&str>) -> HttpStore {
        let auth = Arc::new(AuthSession::new(token.map(str::to_string)));
        HttpStore::new(&server.url(), auth).unwrap()
    }

    #[tokio::test]
    async fn get_page_sends_bearer_and_finds_page() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/users/dashboard")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(DASHBOARD)
            .expect(2)
            .create_async()
            .await;

        let store = store(&server, Some("secret"));
        let page = store.get_page(&EntityId::new("p1")).await.unwrap().unwrap();
        assert_eq!(page.label, "Bread");
        assert_eq!(page.timers.len(), 1);
        assert!(store.get_page(&EntityId::new("nope")).await.unwrap().is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn status_codes_map_to_store_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/users/dashboard")
            .with_status(401)
            .create_async()
            .await;
        server
            .mock("DELETE", "/api/users/deleteTimer/gone")
            .with_status(404)
            .with_body(r#"{"message":"Timer not found"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/api/users/addTimer")
            .with_status(400)
            .with_body(r#"{"message":"Duration must be positive"}"#)
            .create_async()
            .await;
        server
            .mock("DELETE", "/api/users/deletePage/p1")
            .with_status(500)
            .create_async()
            .await;

        let store = store(&server, Some("t"));
        assert_eq!(store.list_pages().await.unwrap_err(), StoreError::Unauthorized);
        assert_eq!(
            store.delete_timer(&EntityId::new("gone")).await.unwrap_err(),
            StoreError::NotFound("Timer not found".into())
        );
        assert_eq!(
            store.create_timer(&EntityId::new("p1"), "Boil", 5).await.unwrap_err(),
            StoreError::Validation("Duration must be positive".into())
        );
        assert!(matches!(
            store.delete_page(&EntityId::new("p1")).await.unwrap_err(),
            StoreError::Transport(_)
        ));
    }

    #[tokio::test]
    async fn create_timer_sends_page_id_and_reads_record() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/users/addTimer")
            .match_body(Matcher::Json(json!({"label":"Boil","duration":600,"pageId":"p1"})))
            .with_status(201)
            .with_body(r#"{"timer":{"_id":"t9","label":"Boil","duration":600}}"#)
            .create_async()
            .await;

        let store = store(&server, Some("t"));
        let timer = store.create_timer(&EntityId::new("p1"), "Boil", 600).await.unwrap();
        assert_eq!(timer.id.as_str(), "t9");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn create_timer_falls_back_to_dashboard() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/users/addTimer")
            .with_status(200)
            .with_body(r#"{"message":"Timer added"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/users/dashboard")
            .with_status(200)
            .with_body(DASHBOARD)
            .create_async()
            .await;

        let store = store(&server, Some("t"));
        let timer = store.create_timer(&EntityId::new("p1"), "Proof", 3600).await.unwrap();
        assert_eq!(timer.id.as_str(), "t1");
    }

    #[tokio::test]
    async fn create_converter_takes_last_entry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/users/pages/p1/unitConverters")
            .match_body(Matcher::PartialJson(json!({
                "pageId": "p1",
                "category": "grams",
                "fromUnit": "oz",
                "toUnit": "g"
            })))
            .with_status(201)
            .with_body(
                r#"{"unitConverters":[
                    {"_id":"c1","category":"grams","fromUnit":"oz","toUnit":"g","conversionFactor":28.35},
                    {"_id":"c2","category":"grams","fromUnit":"oz","toUnit":"g","conversionFactor":28.35}
                ]}"#,
            )
            .create_async()
            .await;

        let store = store(&server, Some("t"));
        let request = NewConverter {
            category: "grams".into(),
            from_unit: "oz".into(),
            to_unit: "g".into(),
            conversion_factor: 28.35,
        };
        let record = store.create_converter(&EntityId::new("p1"), &request).await.unwrap();
        assert_eq!(record.id.as_str(), "c2");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn delete_converter_encodes_path() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/api/users/pages/p%201/unitConverters/c1")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let store = store(&server, Some("t"));
        store
            .delete_converter(&EntityId::new("p 1"), &EntityId::new("c1"))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn login_installs_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/users/login")
            .match_body(Matcher::Json(json!({"username":"ada","password":"pw"})))
            .with_status(200)
            .with_body(r#"{"token":"abc","user":{"username":"ada"}}"#)
            .create_async()
            .await;

        let store = store(&server, None);
        let auth = store.login("ada", "pw").await.unwrap();
        assert_eq!(auth.token, "abc");
        assert_eq!(store.auth().token().as_deref(), Some("abc"));
    }

    #[test]
    fn base_url_keeps_prefix() {
        let auth = Arc::new(AuthSession::new(None));
        let store = HttpStore::new("http://example.test/backend", auth).unwrap();
        assert_eq!(
            store.endpoint("api/users/dashboard").unwrap().as_str(),
            "http://example.test/backend/api/users/dashboard"
        );
        assert!(HttpStore::new("not a url", Arc::new(AuthSession::new(None))).is_err());
    }
}
