#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use tickflux::{Client, ClientConfig};

/// Canned answer for one method + path.
#[derive(Debug, Clone)]
pub struct Route {
    method: &'static str,
    path: &'static str,
    status: u16,
    content_type: &'static str,
    body: String,
}

impl Route {
    pub fn new(method: &'static str, path: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self {
            method,
            path,
            status,
            content_type: "application/json",
            body: body.into(),
        }
    }

    pub fn csv(path: &'static str, body: impl Into<String>) -> Self {
        Self {
            content_type: "text/csv; charset=utf-8",
            ..Self::new("POST", path, 200, body)
        }
    }

    pub fn healthy() -> Self {
        Self::new(
            "GET",
            "/health",
            200,
            r#"{"name":"influxdb","message":"ready for queries and writes","status":"pass","checks":[],"version":"v2.7.1","commit":"407fa622e9"}"#,
        )
    }

    pub fn accept_writes() -> Self {
        Self::new("POST", "/api/v2/write", 204, "")
    }
}

/// A request as the mock saw it.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: String,
    pub path: String,
    pub query: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn param(&self, key: &str) -> Option<String> {
        url::form_urlencoded::parse(self.query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

struct MockState {
    routes: Vec<Route>,
    captured: Mutex<Vec<Captured>>,
}

/// In-process HTTP server answering from a fixed route table and recording
/// every request it sees.
pub struct MockServer {
    pub url: String,
    state: Arc<MockState>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock");
        let addr = listener.local_addr().expect("mock addr");
        let state = Arc::new(MockState {
            routes,
            captured: Mutex::new(Vec::new()),
        });

        let app = Router::new().fallback(respond).with_state(state.clone());
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            url: format!("http://{addr}"),
            state,
            task,
        }
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.state.captured.lock().expect("captured lock").clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Captured> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.url.clone(), "secret-token")
    }

    pub async fn connect(&self) -> Client {
        Client::connect(self.config()).await.expect("connect to mock")
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn respond(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let path = uri.path().to_string();
    let route = state
        .routes
        .iter()
        .find(|r| r.method == method.as_str() && r.path == path)
        .cloned();

    state.captured.lock().expect("captured lock").push(Captured {
        method: method.to_string(),
        path,
        query: uri.query().unwrap_or_default().to_string(),
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect(),
        body,
    });

    let Some(route) = route else {
        return (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "application/json")],
            r#"{"code":"not found","message":"no route"}"#,
        )
            .into_response();
    };
    let status = StatusCode::from_u16(route.status).expect("route status");
    if status == StatusCode::NO_CONTENT {
        return status.into_response();
    }
    (status, [(header::CONTENT_TYPE, route.content_type)], route.body).into_response()
}

/// One single-field row of a query response.
pub struct Row<'a> {
    pub time: OffsetDateTime,
    pub field: &'a str,
    pub value: String,
    pub tags: Vec<(&'a str, &'a str)>,
}

/// Render rows as the annotated CSV a flux query would return. All rows must
/// carry the same tag keys.
pub fn annotated_csv(measurement: &str, rows: &[Row<'_>]) -> String {
    let tag_keys: Vec<&str> = rows
        .first()
        .map(|r| r.tags.iter().map(|(k, _)| *k).collect())
        .unwrap_or_default();
    let start = "2023-03-23T00:00:00Z";
    let stop = "2030-01-01T00:00:00Z";

    let mut out = String::new();
    out.push_str("#group,false,false,true,true,false,false,true,true");
    out.push_str(&",true".repeat(tag_keys.len()));
    out.push_str("\r\n#datatype,string,long,dateTime:RFC3339,dateTime:RFC3339,dateTime:RFC3339,double,string,string");
    out.push_str(&",string".repeat(tag_keys.len()));
    out.push_str("\r\n#default,mean,,,,,,,");
    out.push_str(&",".repeat(tag_keys.len()));
    out.push_str("\r\n,result,table,_start,_stop,_time,_value,_field,_measurement");
    for key in &tag_keys {
        out.push(',');
        out.push_str(key);
    }
    out.push_str("\r\n");

    for (table, row) in rows.iter().enumerate() {
        let time = row.time.format(&Rfc3339).expect("format time");
        out.push_str(&format!(
            ",,{table},{start},{stop},{time},{},{},{measurement}",
            row.value, row.field
        ));
        for (_, value) in &row.tags {
            out.push(',');
            out.push_str(value);
        }
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    out
}
