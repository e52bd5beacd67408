//! Serves the `/api/...` contract from a [`RecordStore`].
//!
//! Requests are matched against a fixed route table. Exact routes are tried
//! first, then item routes (`/api/<collection>/<id>`), then prefix routes.
//! A request that matches nothing is handed to the [`Transport`] untouched.
//!
//! | Method | Path                          | Action                     |
//! |--------|-------------------------------|----------------------------|
//! | GET    | `/api/dashboard`              | dashboard summary          |
//! | GET    | `/api/<collection>`           | raw list                   |
//! | POST   | `/api/<collection>`           | insert body                |
//! | GET    | `/api/<collection>/<id>`      | get one (`null` if absent) |
//! | PUT    | `/api/<collection>/<id>`      | replace (`null` if absent) |
//! | DELETE | `/api/<collection>/<id>`      | delete, no body            |
//! | GET    | `/api/attendance*`            | raw attendance list        |
//!
//! `<collection>` is one of `storage`, `workers`, `sales`, `expenses`.

use log::debug;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::app_response::{AppResponse, Result};
use crate::kv_backend::KeyValueBackend;
use crate::local_db_model::{Collection, Fields};
use crate::record_store::RecordStore;

/// Collections exposed with full CRUD routes.
pub const WRITABLE: [Collection; 4] = [
    Collection::Storage,
    Collection::Workers,
    Collection::Sales,
    Collection::Expenses,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    /// Kept as given so pass-through forwards it unchanged.
    pub method: String,
    pub body: Option<String>,
}

impl Request {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            body: None,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// `None` for verbs no route uses. An empty string means `GET`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("GET") {
            Some(Method::Get)
        } else if raw.eq_ignore_ascii_case("POST") {
            Some(Method::Post)
        } else if raw.eq_ignore_ascii_case("PUT") {
            Some(Method::Put)
        } else if raw.eq_ignore_ascii_case("DELETE") {
            Some(Method::Delete)
        } else {
            None
        }
    }
}

/// The external network call unmatched requests fall through to.
pub trait Transport {
    type Response;

    fn fetch(&self, request: &Request) -> Self::Response;
}

impl<F, R> Transport for F
where
    F: Fn(&Request) -> R,
{
    type Response = R;

    fn fetch(&self, request: &Request) -> R {
        self(request)
    }
}

/// Response for a matched route. `ok` is always true; errors surface as `Err`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatedResponse {
    ok: bool,
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<JsonValue>,
}

impl SimulatedResponse {
    pub fn with_body(body: JsonValue) -> Self {
        Self {
            ok: true,
            status: 200,
            body: Some(body),
        }
    }

    pub fn empty() -> Self {
        Self {
            ok: true,
            status: 200,
            body: None,
        }
    }

    pub fn ok(&self) -> bool {
        self.ok
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Decoded body. `None` for responses that carry no body (DELETE).
    pub fn json(&self) -> Option<&JsonValue> {
        self.body.as_ref()
    }

    pub fn into_json(self) -> Option<JsonValue> {
        self.body
    }
}

#[derive(Debug)]
pub enum Dispatch<R> {
    Handled(SimulatedResponse),
    PassThrough(R),
}

impl<R> Dispatch<R> {
    pub fn handled(&self) -> Option<&SimulatedResponse> {
        match self {
            Dispatch::Handled(response) => Some(response),
            Dispatch::PassThrough(_) => None,
        }
    }

    pub fn is_pass_through(&self) -> bool {
        matches!(self, Dispatch::PassThrough(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pattern {
    Exact(&'static str),
    /// Literal prefix ending in `/`; the segment after the last `/` is the id.
    Item(&'static str),
    Prefix(&'static str),
}

impl Pattern {
    fn rank(&self) -> u8 {
        match self {
            Pattern::Exact(_) => 0,
            Pattern::Item(_) => 1,
            Pattern::Prefix(_) => 2,
        }
    }

    fn matches<'u>(&self, url: &'u str) -> Option<&'u str> {
        match *self {
            Pattern::Exact(path) => (url == path).then_some(""),
            Pattern::Item(prefix) => url
                .starts_with(prefix)
                .then(|| url.rsplit('/').next().unwrap_or("")),
            Pattern::Prefix(prefix) => url.starts_with(prefix).then_some(""),
        }
    }
}

/// Arguments are the store, the verbatim last path segment (empty for
/// non-item routes) and the raw request body.
type Handler<'a, B> =
    Box<dyn Fn(&RecordStore<B>, &str, Option<&str>) -> Result<SimulatedResponse> + 'a>;

struct Route<'a, B: KeyValueBackend> {
    method: Method,
    pattern: Pattern,
    handler: Handler<'a, B>,
}

pub struct RequestInterceptor<'a, B: KeyValueBackend, T: Transport> {
    store: &'a RecordStore<B>,
    transport: T,
    routes: Vec<Route<'a, B>>,
}

impl<'a, B: KeyValueBackend + 'a, T: Transport> RequestInterceptor<'a, B, T> {
    pub fn new(store: &'a RecordStore<B>, transport: T) -> Self {
        Self {
            store,
            transport,
            routes: route_table(),
        }
    }

    pub fn store(&self) -> &RecordStore<B> {
        self.store
    }

    pub fn handle(&self, request: &Request) -> Result<Dispatch<T::Response>> {
        let url = request.url.as_str();

        if let Some(method) = Method::parse(&request.method) {
            for route in self.routes.iter().filter(|r| r.method == method) {
                let Some(id) = route.pattern.matches(url) else {
                    continue;
                };

                debug!("{:?} {url} -> {:?}", method, route.pattern);
                let response = (route.handler)(self.store, id, request.body.as_deref())?;
                return Ok(Dispatch::Handled(response));
            }
        }

        debug!("{} {url} passed through", request.method);
        Ok(Dispatch::PassThrough(self.transport.fetch(request)))
    }
}

fn route_table<'a, B: KeyValueBackend + 'a>() -> Vec<Route<'a, B>> {
    let mut routes: Vec<Route<'a, B>> = vec![Route {
        method: Method::Get,
        pattern: Pattern::Exact("/api/dashboard"),
        handler: Box::new(|store: &RecordStore<B>, _: &str, _: Option<&str>| {
            respond(store.summary())
        }),
    }];

    for collection in WRITABLE {
        let (base, item) = collection_paths(collection);

        routes.push(Route {
            method: Method::Get,
            pattern: Pattern::Exact(base),
            handler: Box::new(move |store: &RecordStore<B>, _: &str, _: Option<&str>| {
                respond(store.list_raw(collection))
            }),
        });
        routes.push(Route {
            method: Method::Post,
            pattern: Pattern::Exact(base),
            handler: Box::new(move |store: &RecordStore<B>, _: &str, body: Option<&str>| {
                insert_route(store, collection, body)
            }),
        });
        routes.push(Route {
            method: Method::Get,
            pattern: Pattern::Item(item),
            handler: Box::new(move |store: &RecordStore<B>, id: &str, _: Option<&str>| {
                respond(store.get(collection, id))
            }),
        });
        routes.push(Route {
            method: Method::Put,
            pattern: Pattern::Item(item),
            handler: Box::new(move |store: &RecordStore<B>, id: &str, body: Option<&str>| {
                update_route(store, collection, id, body)
            }),
        });
        routes.push(Route {
            method: Method::Delete,
            pattern: Pattern::Item(item),
            handler: Box::new(move |store: &RecordStore<B>, id: &str, _: Option<&str>| {
                delete_route(store, collection, id)
            }),
        });
    }

    routes.push(Route {
        method: Method::Get,
        pattern: Pattern::Prefix("/api/attendance"),
        handler: Box::new(|store: &RecordStore<B>, _: &str, _: Option<&str>| {
            respond(store.list_raw(Collection::Attendance))
        }),
    });

    // Stable sort keeps table order within a rank.
    routes.sort_by_key(|r| r.pattern.rank());
    routes
}

fn insert_route<B: KeyValueBackend>(
    store: &RecordStore<B>,
    collection: Collection,
    body: Option<&str>,
) -> Result<SimulatedResponse> {
    let created = store.insert(collection, decode_fields(body)?)?;
    respond(created)
}

fn update_route<B: KeyValueBackend>(
    store: &RecordStore<B>,
    collection: Collection,
    id: &str,
    body: Option<&str>,
) -> Result<SimulatedResponse> {
    let updated = store.update(collection, id, decode_fields(body)?)?;
    respond(updated)
}

fn delete_route<B: KeyValueBackend>(
    store: &RecordStore<B>,
    collection: Collection,
    id: &str,
) -> Result<SimulatedResponse> {
    store.delete(collection, id)?;
    Ok(SimulatedResponse::empty())
}

fn respond<S: Serialize>(value: S) -> Result<SimulatedResponse> {
    Ok(SimulatedResponse::with_body(serde_json::to_value(value)?))
}

fn collection_paths(collection: Collection) -> (&'static str, &'static str) {
    match collection {
        Collection::Storage => ("/api/storage", "/api/storage/"),
        Collection::Workers => ("/api/workers", "/api/workers/"),
        Collection::Sales => ("/api/sales", "/api/sales/"),
        Collection::Expenses => ("/api/expenses", "/api/expenses/"),
        Collection::Attendance => ("/api/attendance", "/api/attendance/"),
    }
}

fn decode_fields(body: Option<&str>) -> Result<Fields> {
    let body =
        body.ok_or_else(|| AppResponse::BadRequest("Request body is required".to_string()))?;

    match serde_json::from_str::<JsonValue>(body)? {
        JsonValue::Object(fields) => Ok(fields),
        other => Err(AppResponse::BadRequest(format!(
            "Request body must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
