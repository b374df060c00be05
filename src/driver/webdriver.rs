use std::path::Path;
use std::time::Duration;

use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{BrowserDriver, DriverError, DriverLauncher, DriverResult, Element, Locator};
use crate::error::{FailureKind, ScoutError};

/// JSON key the W3C protocol uses for element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

#[derive(Debug, Deserialize)]
struct WireResponse {
    value: Value,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

/// Maps a W3C WebDriver error code to a failure kind.
pub fn classify_error_code(code: &str) -> FailureKind {
    match code {
        "invalid session id" | "no such window" | "session not created" => {
            FailureKind::CrashShaped
        }
        "timeout" | "script timeout" | "unknown error" => FailureKind::Transient,
        _ => FailureKind::Logical,
    }
}

fn transport_error(err: reqwest::Error) -> DriverError {
    let kind = if err.is_timeout() {
        FailureKind::Transient
    } else if err.is_decode() {
        FailureKind::Logical
    } else {
        FailureKind::CrashShaped
    };
    DriverError::new(kind, err.to_string())
}

fn build_http_client() -> Result<Client, ScoutError> {
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(120))
        .build()?;
    Ok(client)
}

async fn send_command(
    http: &Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> DriverResult<Value> {
    let mut request = http.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await.map_err(transport_error)?;
    let status = response.status();
    let wire = response
        .json::<WireResponse>()
        .await
        .map_err(transport_error)?;

    if !status.is_success() {
        let err: WireError = serde_json::from_value(wire.value).unwrap_or(WireError {
            error: "unknown error".into(),
            message: format!("status {status}"),
        });
        return Err(DriverError::new(
            classify_error_code(&err.error),
            format!("{}: {}", err.error, err.message),
        ));
    }
    Ok(wire.value)
}

/// Creates browser sessions on a WebDriver server (chromedriver and friends).
pub struct WebDriverLauncher {
    http: Client,
    base_url: String,
    headless: bool,
}

impl WebDriverLauncher {
    pub fn new(base_url: impl Into<String>, headless: bool) -> Result<Self, ScoutError> {
        Ok(Self {
            http: build_http_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            headless,
        })
    }

    fn capabilities(&self, profile_dir: &Path) -> Value {
        let mut args = vec![
            format!("--user-data-dir={}", profile_dir.display()),
            "--no-first-run".to_string(),
            "--disable-dev-shm-usage".to_string(),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        })
    }
}

impl DriverLauncher for WebDriverLauncher {
    type Driver = WebDriverClient;

    async fn launch(&self, profile_dir: &Path) -> DriverResult<WebDriverClient> {
        let url = format!("{}/session", self.base_url);
        let value = send_command(
            &self.http,
            Method::POST,
            &url,
            Some(self.capabilities(profile_dir)),
        )
        .await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::crash("new session response carried no sessionId"))?
            .to_string();

        Ok(WebDriverClient {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            session_id,
        })
    }
}

/// One live WebDriver session.
pub struct WebDriverClient {
    http: Client,
    base_url: String,
    session_id: String,
}

impl WebDriverClient {
    #[cfg(test)]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn session_url(&self, suffix: &str) -> String {
        format!("{}/session/{}{}", self.base_url, self.session_id, suffix)
    }

    async fn get(&self, suffix: &str) -> DriverResult<Value> {
        send_command(&self.http, Method::GET, &self.session_url(suffix), None).await
    }

    async fn post(&self, suffix: &str, body: Value) -> DriverResult<Value> {
        send_command(&self.http, Method::POST, &self.session_url(suffix), Some(body)).await
    }
}

fn element_from_value(value: &Value) -> Option<Element> {
    value.get(ELEMENT_KEY).and_then(Value::as_str).map(Element::new)
}

impl BrowserDriver for WebDriverClient {
    async fn navigate(&self, url: &str) -> DriverResult<()> {
        self.post("/url", json!({ "url": url })).await?;
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        let value = self.get("/url").await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DriverError::logical("current url was not a string"))
    }

    async fn find_elements(&self, locator: &Locator) -> DriverResult<Vec<Element>> {
        let body = serde_json::to_value(locator).map_err(|e| DriverError::logical(e.to_string()))?;
        let value = self.post("/elements", body).await?;
        let items = value
            .as_array()
            .ok_or_else(|| DriverError::logical("find elements returned a non-array"))?;
        Ok(items.iter().filter_map(element_from_value).collect())
    }

    async fn attribute(&self, element: &Element, name: &str) -> DriverResult<Option<String>> {
        let value = self
            .get(&format!("/element/{}/attribute/{name}", element.id))
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn text(&self, element: &Element) -> DriverResult<String> {
        let value = self.get(&format!("/element/{}/text", element.id)).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn run_script(&self, script: &str) -> DriverResult<Value> {
        self.post("/execute/sync", json!({ "script": script, "args": [] }))
            .await
    }

    async fn click(&self, element: &Element) -> DriverResult<()> {
        self.post(&format!("/element/{}/click", element.id), json!({}))
            .await?;
        Ok(())
    }

    async fn send_keys(&self, element: &Element, text: &str) -> DriverResult<()> {
        self.post(
            &format!("/element/{}/value", element.id),
            json!({ "text": text }),
        )
        .await?;
        Ok(())
    }

    async fn is_alive(&self) -> bool {
        self.get("/window").await.is_ok()
    }

    async fn close(&self) -> DriverResult<()> {
        send_command(&self.http, Method::DELETE, &self.session_url(""), None).await?;
        Ok(())
    }
}
