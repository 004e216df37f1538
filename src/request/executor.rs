use super::{Method, Params, Request, RequestErr, Response, Scheduler, StatusErr, Transport};
use crate::config::Config;

use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use url::Url;


/// Runs requests through the shared [`Scheduler`].
///
/// One-shot calls hold the queue until their whole body has been read; streaming calls hold it
/// only until the response headers arrive.
#[derive(Clone)]
pub struct Executor {
    scheduler: Scheduler,
    transport: Arc<dyn Transport>,
    request_timeout: Duration,
}

impl Executor {
    pub fn new(scheduler: Scheduler, transport: Arc<dyn Transport>, cfg: &Config) -> Self {
        Self {
            scheduler,
            transport,
            request_timeout: *cfg.request_timeout,
        }
    }

    pub async fn get(&self, url: &Url, params: Params) -> Result<Value, RequestErr> {
        self.buffered(Method::Get, url, params).await
    }

    pub async fn post(&self, url: &Url, params: Params) -> Result<Value, RequestErr> {
        self.buffered(Method::Post, url, params).await
    }

    async fn buffered(&self, method: Method, url: &Url, params: Params) -> Result<Value, RequestErr> {
        let transport = self.transport.clone();
        let request = Request {
            method,
            url: url.clone(),
            params,
            timeout: Some(self.request_timeout),
        };
        log::debug!("{} {}", method, url);

        let outcome = self
            .scheduler
            .submit(move |slot| async move {
                let outcome = match transport.send(request).await {
                    Ok(response) => {
                        let status = response.status;
                        response.bytes().await.map(|body| (status, body))
                    }
                    Err(e) => Err(e),
                };
                slot.release();
                outcome
            })
            .await?;

        let (status, body) = outcome.map_err(|inner| RequestErr::Transport {
            url: url.to_string(),
            inner,
        })?;
        if !(200..300).contains(&status) {
            return Err(RequestErr::Status {
                url: url.to_string(),
                inner: StatusErr::new(status),
            });
        }
        parse_body(url, &body)
    }

    /// Opens a long-lived response.  Resolves once headers arrive; a non-2xx status is an error.
    pub fn stream(
        &self,
        method: Method,
        url: Url,
        params: Params,
    ) -> impl Future<Output = Result<Response, RequestErr>> + Send + 'static {
        let transport = self.transport.clone();
        let request = Request {
            method,
            url: url.clone(),
            params,
            timeout: None,
        };
        let queued = self.scheduler.submit(move |slot| async move {
            let outcome = transport.send(request).await;
            slot.release();
            outcome
        });

        async move {
            let response = queued.await?.map_err(|inner| RequestErr::Transport {
                url: url.to_string(),
                inner,
            })?;
            if response.is_success() {
                Ok(response)
            } else {
                Err(RequestErr::Status {
                    url: url.to_string(),
                    inner: StatusErr::new(response.status),
                })
            }
        }
    }
}

fn parse_body(url: &Url, body: &[u8]) -> Result<Value, RequestErr> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    let value: Value = serde_json::from_slice(body).map_err(|inner| RequestErr::Json {
        url: url.to_string(),
        inner,
    })?;
    match value["errors"][0]["message"].as_str() {
        Some(message) => Err(RequestErr::Application {
            url: url.to_string(),
            message: message.to_string(),
            body: value.clone(),
        }),
        None => Ok(value),
    }
}
