// Remote task API: the trait the store talks to and its HTTP implementation

use crate::config::Config;
use crate::task::{NewTask, Task, TaskId, TitleUpdate};
use async_trait::async_trait;
use eyre::{Result, WrapErr};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Remote collaborator holding the authoritative copy of the tasks
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// GET `url`, returning task records
    async fn fetch(&self, url: &str) -> Result<Vec<Task>>;

    /// POST a new task, returning the echoed body
    async fn create(&self, task: &NewTask) -> Result<NewTask>;

    /// PUT a new title for `id`, returning the echoed body
    async fn update_title(&self, id: TaskId, update: &TitleUpdate) -> Result<TitleUpdate>;

    /// DELETE `id`
    async fn delete(&self, id: TaskId) -> Result<()>;
}

/// `TaskApi` over HTTP/JSON
#[derive(Clone)]
pub struct HttpTaskApi {
    client: Client,
    base_url: String,
}

impl HttpTaskApi {
    /// Build a client for `base_url` with an optional per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().wrap_err("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.base_url, config.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn task_url(&self, id: TaskId) -> String {
        format!("{}/{}", self.base_url, id)
    }
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn fetch(&self, url: &str) -> Result<Vec<Task>> {
        debug!(url, "GET tasks");
        let tasks = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .wrap_err_with(|| format!("GET {} failed", url))?
            .json::<Vec<Task>>()
            .await
            .wrap_err("Failed to decode task list")?;
        Ok(tasks)
    }

    async fn create(&self, task: &NewTask) -> Result<NewTask> {
        debug!(url = %self.base_url, title = %task.title, "POST task");
        let echo = self
            .client
            .post(&self.base_url)
            .json(task)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .wrap_err_with(|| format!("POST {} failed", self.base_url))?
            .json::<NewTask>()
            .await
            .wrap_err("Failed to decode created task")?;
        Ok(echo)
    }

    async fn update_title(&self, id: TaskId, update: &TitleUpdate) -> Result<TitleUpdate> {
        let url = self.task_url(id);
        debug!(url = %url, title = %update.title, "PUT task");
        let echo = self
            .client
            .put(&url)
            .json(update)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .wrap_err_with(|| format!("PUT {} failed", url))?
            .json::<TitleUpdate>()
            .await
            .wrap_err("Failed to decode updated task")?;
        Ok(echo)
    }

    async fn delete(&self, id: TaskId) -> Result<()> {
        let url = self.task_url(id);
        debug!(url = %url, "DELETE task");
        self.client
            .delete(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .wrap_err_with(|| format!("DELETE {} failed", url))?;
        Ok(())
    }
}
