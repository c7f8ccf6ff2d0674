use std::sync::Arc;

use anyhow::{anyhow, Result};
use tiny_http::{Header, Method, Request, Response};
use tracing::{debug, error, info, warn};

use crate::data::FeedService;
use crate::render;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:27010";

/// HTML front end: `/` shows the first page, `/feed/` the next one.
///
/// Requests are answered one at a time on the calling thread, which keeps
/// feed fetches strictly sequential.
pub struct Server {
    http: tiny_http::Server,
    service: Arc<dyn FeedService>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    fn html(status: u16, body: String) -> Self {
        Self { status, body }
    }
}

impl Server {
    pub fn bind(addr: &str, service: Arc<dyn FeedService>) -> Result<Self> {
        let http = tiny_http::Server::http(addr)
            .map_err(|err| anyhow!("server: listen on {}: {}", addr, err))?;
        Ok(Self { http, service })
    }

    pub fn local_addr(&self) -> String {
        self.http.server_addr().to_string()
    }

    pub fn run(&self) {
        info!(addr = %self.local_addr(), "serving feed");
        for request in self.http.incoming_requests() {
            self.handle(request);
        }
    }

    fn handle(&self, req: Request) {
        debug!(remote = ?req.remote_addr(), "connection");
        debug!(method = ?req.method(), url = req.url(), "request");

        let reply = route(req.method(), req.url(), self.service.as_ref());
        let response = Response::from_string(reply.body)
            .with_status_code(reply.status)
            .with_header(
                Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..])
                    .expect("valid header"),
            );
        if let Err(err) = req.respond(response) {
            warn!(error = %err, "failed to write response");
        }
    }
}

pub fn route(method: &Method, url: &str, service: &dyn FeedService) -> Reply {
    if method != &Method::Get {
        return Reply::html(405, render::error("method not allowed"));
    }
    let path = url.split('?').next().unwrap_or(url);
    let result = match path {
        "/" => service.first_page(),
        "/feed" | "/feed/" => service.next_page(),
        _ => return Reply::html(404, render::error("not found")),
    };
    match result {
        Ok(view) => Reply::html(200, render::page(&view)),
        Err(err) => {
            error!(error = ?err, path, "feed request failed");
            Reply::html(502, render::error(&format!("{err:#}")))
        }
    }
}
