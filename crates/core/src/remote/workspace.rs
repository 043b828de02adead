//! Workspace REST API client.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::RemoteWorkspace;
use crate::errors::RemoteError;
use crate::language::LanguageTag;
use crate::models::RemoteNode;

const API_PREFIX: &str = "/api/2.0/workspace";

/// One entry of `get-status` / `list`.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceObject {
    pub path: String,
    pub object_type: String,
    #[serde(default)]
    pub language: Option<String>,
}

impl WorkspaceObject {
    /// Directories are containers; notebooks are leaves. Any other object type
    /// (files, libraries, repos) becomes a leaf with no known language and is
    /// skipped by the engine.
    pub fn into_node(self) -> RemoteNode {
        match self.object_type.as_str() {
            "DIRECTORY" => RemoteNode::container(self.path),
            "NOTEBOOK" => {
                let language = self.language.as_deref().and_then(LanguageTag::from_wire);
                RemoteNode::leaf(self.path, language)
            }
            _ => RemoteNode::leaf(self.path, None),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    objects: Vec<WorkspaceObject>,
}

#[derive(Debug, Deserialize)]
struct ExportResponse {
    content: String,
}

#[derive(Debug, Serialize)]
struct ImportRequest<'a> {
    path: &'a str,
    format: &'static str,
    language: LanguageTag,
    content: &'a str,
    overwrite: bool,
}

/// Error body returned by the API on failure.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Asynchronous workspace REST API client.
#[derive(Clone)]
pub struct WorkspaceClient {
    http: reqwest::Client,
    host: String,
    token: String,
}

impl WorkspaceClient {
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Result<Self, RemoteError> {
        let host = host.into().trim_end_matches('/').to_string();
        let token = token.into();
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("nbsync/", env!("CARGO_PKG_VERSION"))),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        info!(host = %host, "created WorkspaceClient");
        Ok(Self { http, host, token })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}/{}", self.host, API_PREFIX, endpoint)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        path: &str,
        extra: &[(&str, &str)],
    ) -> Result<T, RemoteError> {
        let resp = self
            .http
            .get(self.url(endpoint))
            .bearer_auth(&self.token)
            .query(&[("path", path)])
            .query(extra)
            .send()
            .await?;
        let resp = check_response(path, resp).await?;
        resp.json::<T>()
            .await
            .map_err(|e| RemoteError::Parse(format!("{}: {}", endpoint, e)))
    }

    async fn post(&self, endpoint: &str, path: &str, body: &impl Serialize) -> Result<(), RemoteError> {
        let resp = self
            .http
            .post(self.url(endpoint))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        check_response(path, resp).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteWorkspace for WorkspaceClient {
    #[instrument(skip(self))]
    async fn probe_existence(&self, path: &str) -> Result<RemoteNode, RemoteError> {
        let object: WorkspaceObject = self.get_json("get-status", path, &[]).await?;
        debug!(object_type = %object.object_type, "probed remote path");
        Ok(object.into_node())
    }

    #[instrument(skip(self))]
    async fn list_children(&self, path: &str) -> Result<Vec<RemoteNode>, RemoteError> {
        let listing: ListResponse = self.get_json("list", path, &[]).await?;
        debug!(count = listing.objects.len(), "listed remote children");
        Ok(listing
            .objects
            .into_iter()
            .map(WorkspaceObject::into_node)
            .collect())
    }

    #[instrument(skip(self))]
    async fn fetch_content(&self, path: &str) -> Result<String, RemoteError> {
        let export: ExportResponse = self
            .get_json("export", path, &[("format", "SOURCE")])
            .await?;
        debug!(encoded_len = export.content.len(), "exported leaf");
        Ok(export.content)
    }

    #[instrument(skip(self, content), fields(encoded_len = content.len()))]
    async fn push_content(
        &self,
        path: &str,
        language: LanguageTag,
        content: &str,
    ) -> Result<(), RemoteError> {
        let body = ImportRequest {
            path,
            format: "SOURCE",
            language,
            content,
            overwrite: false,
        };
        self.post("import", path, &body).await?;
        debug!("imported leaf");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_container(&self, path: &str) -> Result<(), RemoteError> {
        self.post("mkdirs", path, &serde_json::json!({ "path": path }))
            .await?;
        debug!("created remote container");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_subtree(&self, path: &str) -> Result<(), RemoteError> {
        self.post(
            "delete",
            path,
            &serde_json::json!({ "path": path, "recursive": true }),
        )
        .await?;
        info!("deleted remote subtree");
        Ok(())
    }
}

async fn check_response(path: &str, resp: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let err = classify_error(path, status.as_u16(), &body);
    if !err.is_not_found() {
        warn!(path, status = status.as_u16(), error = %err, "workspace request failed");
    }
    Err(err)
}

/// Turn a failed response into a typed error.
///
/// The decision uses the HTTP status and the structured `error_code` field of
/// the body; the free-form message is only carried along for display. Only
/// `RESOURCE_DOES_NOT_EXIST` means absent: a bare 404 may come from a proxy
/// or a wrong host and stays an `Api` error.
fn classify_error(path: &str, status: u16, body: &str) -> RemoteError {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let error_code = parsed.error_code.unwrap_or_default();
    let message = parsed.message.unwrap_or_else(|| format!("HTTP {}", status));

    match (status, error_code.as_str()) {
        (_, "RESOURCE_DOES_NOT_EXIST") => RemoteError::NotFound {
            path: path.to_string(),
        },
        (_, "RESOURCE_ALREADY_EXISTS") => RemoteError::Conflict {
            path: path.to_string(),
            detail: message,
        },
        (401, _) | (403, _) => RemoteError::AuthenticationFailed(format!("HTTP {}: {}", status, message)),
        _ => RemoteError::Api {
            status,
            error_code,
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeKind;

    #[test]
    fn test_classify_not_found_by_error_code() {
        let body = r#"{"error_code":"RESOURCE_DOES_NOT_EXIST","message":"Path (/x) doesn't exist."}"#;
        assert!(classify_error("/x", 404, body).is_not_found());
        assert!(classify_error("/x", 400, body).is_not_found());
    }

    #[test]
    fn test_classify_bare_404_is_not_absence() {
        let err = classify_error("/x", 404, "<html>Not Found</html>");
        assert!(!err.is_not_found());
        assert!(matches!(err, RemoteError::Api { status: 404, ref error_code, .. } if error_code.is_empty()));
        assert!(matches!(
            classify_error("/x", 404, ""),
            RemoteError::Api { status: 404, .. }
        ));
    }

    #[test]
    fn test_message_text_is_not_inspected() {
        // A server error whose message happens to mention the not-found code
        // must stay a transport error.
        let body = r#"{"error_code":"INTERNAL_ERROR","message":"RESOURCE_DOES_NOT_EXIST"}"#;
        let err = classify_error("/x", 500, body);
        assert!(!err.is_not_found());
        assert!(matches!(err, RemoteError::Api { status: 500, .. }));
    }

    #[test]
    fn test_classify_conflict_and_auth() {
        let body = r#"{"error_code":"RESOURCE_ALREADY_EXISTS","message":"exists"}"#;
        assert!(matches!(
            classify_error("/a", 400, body),
            RemoteError::Conflict { .. }
        ));
        assert!(matches!(
            classify_error("/a", 403, "{}"),
            RemoteError::AuthenticationFailed(_)
        ));
    }

    #[test]
    fn test_workspace_object_into_node() {
        let list: ListResponse = serde_json::from_str(
            r#"{"objects":[
                {"path":"/r/sub","object_type":"DIRECTORY","object_id":1},
                {"path":"/r/a","object_type":"NOTEBOOK","language":"PYTHON","object_id":2},
                {"path":"/r/j","object_type":"NOTEBOOK","language":"JULIA","object_id":3},
                {"path":"/r/f","object_type":"FILE","object_id":4}
            ]}"#,
        )
        .unwrap();
        let nodes: Vec<RemoteNode> = list.objects.into_iter().map(WorkspaceObject::into_node).collect();
        assert_eq!(nodes[0], RemoteNode::container("/r/sub"));
        assert_eq!(nodes[1], RemoteNode::leaf("/r/a", Some(LanguageTag::Python)));
        assert_eq!(nodes[2].kind, NodeKind::Leaf { language: None });
        assert_eq!(nodes[3].kind, NodeKind::Leaf { language: None });
    }

    #[test]
    fn test_empty_listing_has_no_objects_field() {
        let list: ListResponse = serde_json::from_str("{}").unwrap();
        assert!(list.objects.is_empty());
    }

    #[test]
    fn test_import_request_shape() {
        let body = ImportRequest {
            path: "/root/a",
            format: "SOURCE",
            language: LanguageTag::Sql,
            content: "U0VMRUNUIDE=",
            overwrite: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["language"], "SQL");
        assert_eq!(json["format"], "SOURCE");
        assert_eq!(json["overwrite"], false);
    }

    #[test]
    fn test_client_construction() {
        let client = WorkspaceClient::new("https://adb-1.example.net/", "tok").unwrap();
        assert_eq!(
            client.url("list"),
            "https://adb-1.example.net/api/2.0/workspace/list"
        );
    }
}
