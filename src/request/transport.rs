use super::{Params, TransportErr};
use crate::config::Config;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use std::fmt;
use std::time::Duration;
use strum::Display;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub params: Params,
    /// Whole-request deadline; `None` for long-lived streams.
    pub timeout: Option<Duration>,
}

pub struct Response {
    pub status: u16,
    pub body: BoxStream<'static, Result<Vec<u8>, TransportErr>>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Reads the rest of the body into memory.
    pub async fn bytes(self) -> Result<Vec<u8>, TransportErr> {
        self.body
            .try_fold(Vec::new(), |mut buf, chunk| async move {
                buf.extend_from_slice(&chunk);
                Ok(buf)
            })
            .await
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Sends one request and hands back the status plus a streaming body.
pub trait Transport: Send + Sync {
    fn send(&self, request: Request) -> BoxFuture<'static, Result<Response, TransportErr>>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    bearer_token: Option<String>,
}

impl HttpTransport {
    pub fn new(cfg: &Config) -> Result<Self, TransportErr> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            bearer_token: cfg.bearer_token.0.clone(),
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: Request) -> BoxFuture<'static, Result<Response, TransportErr>> {
        let mut builder = match request.method {
            Method::Get => self.client.get(request.url).query(&request.params),
            Method::Post => self.client.post(request.url).form(&request.params),
        };
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }

        async move {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let body = response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(TransportErr::from))
                .boxed();
            Ok(Response { status, body })
        }
        .boxed()
    }
}
