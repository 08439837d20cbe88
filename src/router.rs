use crate::engine::view::{FilterType, ViewQuery};
use crate::engine::{EngineHandle, WriteIntent};
use crate::errors::ServerError;
use crate::responses::{html_response, redirect, ResultResp};
use crate::templates;
use crate::templates::pages::DashboardVm;
use astra::Request;
use chrono::Utc;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::debug;
use url::form_urlencoded;

/// Bytes escaped when a record id becomes one path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Everything a request handler can reach.
#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub page_size: usize,
}

/// The viewer's transient selection, carried entirely in the query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardParams {
    pub filter: FilterType,
    pub search: String,
    pub page: usize,
    pub selected: Option<String>,
}

impl Default for DashboardParams {
    fn default() -> Self {
        Self {
            filter: FilterType::All,
            search: String::new(),
            page: 1,
            selected: None,
        }
    }
}

impl DashboardParams {
    pub fn from_query(query: Option<&str>) -> Self {
        let mut params = Self::default();
        let Some(query) = query else {
            return params;
        };

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "filter" => params.filter = FilterType::parse(&value),
                "q" => params.search = value.into_owned(),
                "page" => params.page = value.trim().parse().unwrap_or(1),
                "selected" if !value.is_empty() => params.selected = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    pub fn to_query(&self) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());
        out.append_pair("filter", self.filter.as_str());
        if !self.search.is_empty() {
            out.append_pair("q", &self.search);
        }
        out.append_pair("page", &self.page.to_string());
        if let Some(id) = &self.selected {
            out.append_pair("selected", id);
        }
        out.finish()
    }

    /// A new filter starts again from the first page.
    pub fn with_filter(&self, filter: FilterType) -> Self {
        Self {
            filter,
            page: 1,
            ..self.clone()
        }
    }

    pub fn with_page(&self, page: usize) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }

    pub fn with_selected(&self, id: Option<&str>) -> Self {
        Self {
            selected: id.map(str::to_string),
            ..self.clone()
        }
    }

    pub fn view_query(&self, page_size: usize) -> ViewQuery {
        ViewQuery {
            filter: self.filter,
            search: self.search.clone(),
            page: self.page,
            page_size,
        }
    }
}

pub fn handle(req: Request, app: &AppState) -> ResultResp {
    let method = req.method().as_str();
    let path = req.uri().path();
    let query = req.uri().query();
    let segments = path_segments(path)?;
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

    debug!(method, path, "request");

    match (method, segments.as_slice()) {
        ("GET", []) => html_response(templates::pages::home_page()),

        ("GET", ["dashboard"]) => {
            let vm = dashboard_vm(app, query, true)?;
            html_response(templates::pages::dashboard_page(&vm))
        }

        // Polled by the page to pick up pushes from the stores.
        ("GET", ["dashboard", "live"]) => {
            let vm = dashboard_vm(app, query, false)?;
            html_response(templates::pages::live_section(&vm))
        }

        ("GET", ["applications", id]) => {
            let detail = app.engine.record(id)?.ok_or(ServerError::NotFound)?;
            html_response(templates::pages::detail_page(&detail, Utc::now()))
        }

        ("POST", ["applications", id, "approve"]) => {
            app.engine.request(WriteIntent::approve(*id))?;
            back_to_dashboard(query)
        }

        ("POST", ["applications", id, "delete"]) => {
            app.engine.request(WriteIntent::delete(*id))?;
            back_to_dashboard(query)
        }

        ("POST", ["notifications", id, "dismiss"]) => {
            let id: u64 = id
                .parse()
                .map_err(|_| ServerError::BadRequest(format!("invalid notification id: {id}")))?;
            app.engine.dismiss(id)?;
            back_to_dashboard(query)
        }

        _ => Err(ServerError::NotFound),
    }
}

/// `/applications/{id}/{action}?{query}` with the id escaped.
pub fn application_action(id: &str, action: &str, query: &str) -> String {
    format!("/applications/{}/{action}?{query}", utf8_percent_encode(id, PATH_SEGMENT))
}

/// Non-empty path segments, each percent-decoded after splitting.
fn path_segments(path: &str) -> Result<Vec<String>, ServerError> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            percent_decode_str(s)
                .decode_utf8()
                .map(|decoded| decoded.into_owned())
                .map_err(|_| ServerError::BadRequest(format!("invalid path segment: {s}")))
        })
        .collect()
}

fn dashboard_vm(app: &AppState, query: Option<&str>, with_selection: bool) -> Result<DashboardVm, ServerError> {
    let params = DashboardParams::from_query(query);
    let snapshot = app.engine.dashboard(params.view_query(app.page_size))?;

    let selected = match (&params.selected, with_selection) {
        (Some(id), true) => app.engine.record(id)?,
        _ => None,
    };

    Ok(DashboardVm {
        snapshot,
        params,
        selected,
        now: Utc::now(),
    })
}

fn back_to_dashboard(query: Option<&str>) -> ResultResp {
    let params = DashboardParams::from_query(query);
    redirect(&format!("/dashboard?{}", params.to_query()))
}
