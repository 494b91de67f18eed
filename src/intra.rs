// 42 intranet API client (OAuth2 client credentials, blocking)

use crate::config::ApiConfig;
use crate::error::AppError;
use crate::roster::Attendee;
use crate::source::ItemKind;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Attendees requested per page of the users listing
const USERS_PAGE_SIZE: usize = 100;

/// Safety stop for the users listing
const MAX_USER_PAGES: usize = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Metadata of a single event or exam
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ApiItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub begin_at: String,
    #[serde(default)]
    pub end_at: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUser {
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
}

/// One row of `/events/{id}/events_users` or `/exams/{id}/exams_users`
#[derive(Debug, Deserialize)]
struct ItemUser {
    #[serde(default)]
    user: ApiUser,
}

impl From<ItemUser> for Attendee {
    fn from(row: ItemUser) -> Self {
        Attendee::new(row.user.first_name, row.user.last_name)
    }
}

pub fn join_url(endpoint: &str, path: &str) -> String {
    format!(
        "{}/{}",
        endpoint.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn map_request_error(e: ureq::Error) -> AppError {
    match e {
        ureq::Error::Status(status, response) => AppError::ApiStatus {
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => AppError::ApiError(transport.to_string()),
    }
}

pub struct IntraClient {
    agent: ureq::Agent,
    endpoint: String,
    token: String,
}

impl IntraClient {
    /// Request an access token with the configured client credentials.
    pub fn connect(config: &ApiConfig) -> Result<Self, AppError> {
        if config.endpoint.is_empty() || config.token_url.is_empty() {
            return Err(AppError::ApiError(
                "42API.endpoint and 42API.tokenUrl must be set".to_string(),
            ));
        }

        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();

        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "client_credentials"),
            ("client_id", config.uid.as_str()),
            ("client_secret", config.secret.as_str()),
        ];
        if !config.scope.is_empty() {
            form.push(("scope", config.scope.as_str()));
        }

        let token: TokenResponse = agent
            .post(&config.token_url)
            .send_form(&form)
            .map_err(map_request_error)?
            .into_json()
            .map_err(|e| AppError::ApiError(format!("failed to parse token response: {}", e)))?;

        log::debug!("Obtained API token from {}", config.token_url);
        Ok(IntraClient {
            agent,
            endpoint: config.endpoint.clone(),
            token: token.access_token,
        })
    }

    fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, AppError> {
        let url = join_url(&self.endpoint, path);
        log::debug!("GET {}", url);

        let mut request = self
            .agent
            .get(&url)
            .set("Authorization", &format!("Bearer {}", self.token));
        for (name, value) in query {
            request = request.query(name, value);
        }

        request
            .call()
            .map_err(map_request_error)?
            .into_json()
            .map_err(|e| AppError::ApiError(format!("failed to parse JSON: {}", e)))
    }

    pub fn test_connection(&self, path: &str) -> Result<(), AppError> {
        self.get::<serde_json::Value>(path, &[]).map(|_| ())
    }

    pub fn fetch_item(&self, kind: ItemKind, id: u64) -> Result<ApiItem, AppError> {
        let item: ApiItem = self.get(&kind.item_path(id), &[])?;
        log::info!("Fetched {:?} {}: '{}' at {}", kind, id, item.name, item.location);
        Ok(item)
    }

    /// Every registered user of the item, following the listing's pages.
    pub fn fetch_attendees(&self, kind: ItemKind, id: u64) -> Result<Vec<Attendee>, AppError> {
        let path = kind.users_path(id);
        let page_size = USERS_PAGE_SIZE.to_string();
        let mut attendees = Vec::new();

        for page in 1..=MAX_USER_PAGES {
            let page_number = page.to_string();
            let rows: Vec<ItemUser> = self.get(
                &path,
                &[
                    ("page[size]", page_size.as_str()),
                    ("page[number]", page_number.as_str()),
                ],
            )?;
            let count = rows.len();
            attendees.extend(rows.into_iter().map(Attendee::from));
            if count < USERS_PAGE_SIZE {
                break;
            }
        }

        log::info!("Fetched {} attendees for {:?} {}", attendees.len(), kind, id);
        Ok(attendees)
    }
}
