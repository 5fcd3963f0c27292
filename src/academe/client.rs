use color_eyre::{eyre::eyre, Result};
use reqwest::{Method, RequestBuilder, Response};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::cache::FetchError;
use crate::config::Config;

use super::api_types::{
  normalize_all, normalize_one, ApiEvaluation, ApiRecord, ApiReport, ApiTask, ApiTaskFiles,
};
use super::cache::ResourceKind;
use super::types::{Evaluation, Report, Task, TaskFile, TaskStatus};

/// Academe REST API client
#[derive(Clone)]
pub struct AcademeClient {
  http: reqwest::Client,
  base_url: Url,
  token: Option<String>,
}

impl AcademeClient {
  pub fn new(config: &Config) -> Result<Self> {
    Self::with_base_url(&config.api.url, Config::get_api_token())
  }

  pub fn with_base_url(base_url: &str, token: Option<String>) -> Result<Self> {
    let mut base_url =
      Url::parse(base_url).map_err(|e| eyre!("Invalid API url '{}': {}", base_url, e))?;

    // Url::join replaces the last path segment unless the base ends with '/'
    if !base_url.path().ends_with('/') {
      let path = format!("{}/", base_url.path());
      base_url.set_path(&path);
    }

    let http = reqwest::Client::builder()
      .user_agent(concat!("academe/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      token,
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, FetchError> {
    let url = self
      .base_url
      .join(path.trim_start_matches('/'))
      .map_err(|e| FetchError::Http {
        message: format!("invalid path '{}': {}", path, e),
      })?;

    debug!(%method, %url, "Backend request");

    let builder = self
      .http
      .request(method, url)
      .header(reqwest::header::ACCEPT, "application/json");

    Ok(match &self.token {
      Some(token) => builder.bearer_auth(token),
      None => builder,
    })
  }

  async fn get_json(&self, path: &str) -> Result<Value, FetchError> {
    let response = self.request(Method::GET, path)?.send().await?;
    let response = check_status(response).await?;
    Ok(response.json().await?)
  }

  /// Get a collection endpoint as raw JSON records.
  pub async fn get_collection(&self, path: &str) -> Result<Vec<Value>, FetchError> {
    match self.get_json(path).await? {
      Value::Array(records) => Ok(records),
      _ => Err(FetchError::Decode {
        message: format!("expected a JSON array from '{}'", path),
      }),
    }
  }

  /// Fetch and normalize a whole collection.
  pub async fn fetch_collection<A: ApiRecord>(
    &self,
    kind: ResourceKind,
  ) -> Result<Vec<A::Domain>, FetchError> {
    let records = self.get_collection(kind.path()).await?;
    Ok(normalize_all::<A>(kind.key(), records)?)
  }

  /// Get a single task by id
  pub async fn get_task(&self, task_id: &str) -> Result<Task, FetchError> {
    let record = self.get_json(&format!("tasks/{}", task_id)).await?;
    Ok(normalize_one::<ApiTask>("tasks", 0, record)?)
  }

  /// Move a task to `status`, keeping its other fields.
  pub async fn update_task_status(&self, task: &Task, status: TaskStatus) -> Result<(), FetchError> {
    let body = json!({
      "title": task.title,
      "description": task.description,
      "group_id": task.group_id,
      "assigned_student_ids": task.assignees.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(),
      "status": status.as_str(),
      "deadline": task.due_date,
    });

    let response = self
      .request(Method::PUT, &format!("tasks/{}", task.id))?
      .json(&body)
      .send()
      .await?;
    check_status(response).await?;

    Ok(())
  }

  /// File a progress report against a task
  pub async fn create_report(&self, task_id: &str, content: &str) -> Result<Report, FetchError> {
    let body = json!({
      "content": content,
      "task_id": task_id,
    });

    let response = self
      .request(Method::POST, "reports/")?
      .json(&body)
      .send()
      .await?;
    let record: Value = check_status(response).await?.json().await?;

    Ok(normalize_one::<ApiReport>("reports", 0, record)?)
  }

  pub async fn get_report(&self, report_id: &str) -> Result<Report, FetchError> {
    let record = self.get_json(&format!("reports/{}", report_id)).await?;
    Ok(normalize_one::<ApiReport>("reports", 0, record)?)
  }

  /// Evaluate a student's work on a project as the current user
  pub async fn create_evaluation(
    &self,
    student_id: &str,
    project_id: &str,
    score: Option<f64>,
    comment: Option<&str>,
  ) -> Result<Evaluation, FetchError> {
    let body = json!({
      "student_id": student_id,
      "project_id": project_id,
      "score": score,
      "comment": comment,
    });

    let response = self
      .request(Method::POST, "evaluations/")?
      .json(&body)
      .send()
      .await?;
    let record: Value = check_status(response).await?.json().await?;

    Ok(normalize_one::<ApiEvaluation>("evaluations", 0, record)?)
  }

  /// Evaluations written by the current user
  pub async fn list_evaluations(&self) -> Result<Vec<Evaluation>, FetchError> {
    let records = self.get_collection("evaluations/").await?;
    Ok(normalize_all::<ApiEvaluation>("evaluations", records)?)
  }

  pub async fn list_task_files(&self, task_id: &str) -> Result<Vec<TaskFile>, FetchError> {
    let record = self
      .get_json(&format!("upload/tasks/{}/list-files/", task_id))
      .await?;
    Ok(normalize_one::<ApiTaskFiles>("task files", 0, record)?)
  }

  /// Attach a file to a task. Returns the backend's confirmation message.
  pub async fn upload_task_file(
    &self,
    task_id: &str,
    filename: &str,
    contents: Vec<u8>,
  ) -> Result<String, FetchError> {
    let part = reqwest::multipart::Part::bytes(contents)
      .file_name(filename.to_string())
      .mime_str("application/octet-stream")?;
    let form = reqwest::multipart::Form::new().part("file", part);

    let response = self
      .request(Method::POST, &format!("upload/tasks/{}/upload-file/", task_id))?
      .multipart(form)
      .send()
      .await?;
    let record: Value = check_status(response).await?.json().await?;

    Ok(
      record
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string(),
    )
  }
}

/// Turn a non-success response into `FetchError::Status`, keeping the body.
async fn check_status(response: Response) -> Result<Response, FetchError> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }

  let body = response.text().await.unwrap_or_default();
  Err(FetchError::Status {
    status: status.as_u16(),
    body,
  })
}
