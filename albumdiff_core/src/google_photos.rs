use albumdiff_common::{AlbumDiffError, Album, AlbumSource, PhotoItem, Snapshot};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://photoslibrary.googleapis.com/v1/";

const ALBUM_PAGE_SIZE: u32 = 50;
const MEDIA_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiAlbum {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: Option<String>,
    /// The API reports counts as decimal strings
    #[serde(default)]
    media_items_count: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlbumPage {
    #[serde(default)]
    albums: Vec<ApiAlbum>,
    #[serde(default)]
    shared_albums: Vec<ApiAlbum>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaMetadata {
    #[serde(default)]
    creation_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMediaItem {
    #[serde(default)]
    id: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    media_metadata: Option<MediaMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaItemPage {
    #[serde(default)]
    media_items: Vec<ApiMediaItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MediaSearchRequest<'a> {
    album_id: &'a str,
    page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<&'a str>,
}

#[derive(Debug, Clone, Copy)]
enum AlbumListing {
    Owned,
    Shared,
}

impl AlbumListing {
    fn endpoint(&self) -> &'static str {
        match self {
            AlbumListing::Owned => "albums",
            AlbumListing::Shared => "sharedAlbums",
        }
    }
}

/// Read-only client for the Google Photos Library API
pub struct GooglePhotosClient {
    access_token: String,
    client: Arc<Client>,
    base_url: Url,
    runtime: Arc<Runtime>,
}

impl GooglePhotosClient {
    pub fn new(access_token: impl Into<String>) -> Result<Self, AlbumDiffError> {
        let runtime = Runtime::new()
            .map_err(|e| AlbumDiffError::Service(format!("Failed to create async runtime: {}", e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AlbumDiffError::Service(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            access_token: access_token.into(),
            client: Arc::new(client),
            base_url: Url::parse(DEFAULT_BASE_URL)
                .map_err(|e| AlbumDiffError::Config(e.to_string()))?,
            runtime: Arc::new(runtime),
        })
    }

    /// Point the client at another API root (must end with `/`)
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, AlbumDiffError> {
        self.base_url = Url::parse(base_url)
            .map_err(|e| AlbumDiffError::Config(format!("Invalid Google Photos URL: {}", e)))?;
        Ok(self)
    }

    fn endpoint(&self, path: &str) -> Result<Url, AlbumDiffError> {
        self.base_url
            .join(path)
            .map_err(|e| AlbumDiffError::Config(format!("Failed to construct API URL: {}", e)))
    }

    /// Fetch owned and shared albums into a snapshot.
    ///
    /// Owned albums are inserted first, so a shared album with the same title
    /// replaces the owned one.
    pub fn scan(&self) -> Result<Snapshot, AlbumDiffError> {
        self.runtime.block_on(async {
            let owned = self.list_albums(AlbumListing::Owned).await?;
            let shared = self.list_albums(AlbumListing::Shared).await?;
            info!(
                "Fetched {} owned and {} shared Google Photos albums",
                owned.len(),
                shared.len()
            );

            Ok(Snapshot::from_albums(
                AlbumSource::GooglePhotos,
                owned.into_iter().chain(shared).map(album_from_api),
            ))
        })
    }

    async fn list_albums(&self, listing: AlbumListing) -> Result<Vec<ApiAlbum>, AlbumDiffError> {
        let url = self.endpoint(listing.endpoint())?;
        let mut albums = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(url.clone())
                .bearer_auth(&self.access_token)
                .query(&[("pageSize", ALBUM_PAGE_SIZE.to_string())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let page: AlbumPage = send_json(request).await?;
            let batch = match listing {
                AlbumListing::Owned => page.albums,
                AlbumListing::Shared => page.shared_albums,
            };
            debug!("Fetched page of {} {} entries", batch.len(), listing.endpoint());
            albums.extend(batch);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(albums)
    }

    /// List the items of one album, stopping after `limit` items if given.
    ///
    /// Accepts either the raw API id or the namespaced `google-<id>` form.
    pub fn album_items(
        &self,
        album_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<PhotoItem>, AlbumDiffError> {
        let raw_id = album_id.strip_prefix("google-").unwrap_or(album_id);
        // Leading "./" keeps "mediaItems:" from parsing as a URL scheme
        let url = self.endpoint("./mediaItems:search")?;

        self.runtime.block_on(async {
            let mut items = Vec::new();
            let mut page_token: Option<String> = None;

            loop {
                let body = MediaSearchRequest {
                    album_id: raw_id,
                    page_size: MEDIA_PAGE_SIZE,
                    page_token: page_token.as_deref(),
                };
                let request = self
                    .client
                    .post(url.clone())
                    .bearer_auth(&self.access_token)
                    .json(&body);

                let page: MediaItemPage = send_json(request).await?;
                if page.media_items.is_empty() {
                    break;
                }

                for media_item in page.media_items {
                    if limit.map_or(false, |limit| items.len() >= limit) {
                        return Ok(items);
                    }
                    items.push(item_from_api(media_item, album_id));
                }

                match page.next_page_token.filter(|t| !t.is_empty()) {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }

            Ok(items)
        })
    }
}

async fn send_json<T: for<'de> Deserialize<'de>>(
    request: reqwest::RequestBuilder,
) -> Result<T, AlbumDiffError> {
    let response = request
        .send()
        .await
        .map_err(|e| AlbumDiffError::Service(format!("Google Photos request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AlbumDiffError::Service(format!(
            "Google Photos returned {}: {}",
            status,
            body.trim()
        )));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| AlbumDiffError::Service(format!("Invalid Google Photos response: {}", e)))
}

fn album_from_api(api: ApiAlbum) -> Album {
    let name = api
        .title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());
    let item_count = api
        .media_items_count
        .as_deref()
        .and_then(|count| count.trim().parse::<u64>().ok())
        .unwrap_or(0);

    Album::new(format!("google-{}", api.id), name, AlbumSource::GooglePhotos, item_count)
}

fn item_from_api(api: ApiMediaItem, album_id: &str) -> PhotoItem {
    PhotoItem {
        id: api.id,
        name: api.filename,
        source: AlbumSource::GooglePhotos,
        album_id: album_id.to_string(),
        // The search endpoint does not echo the album title
        album_name: String::new(),
        created_at: api.media_metadata.and_then(|m| m.creation_time),
        size_bytes: None,
        mime_type: api.mime_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{
        body_partial_json, header, method, path, query_param, query_param_is_missing,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Mock API server plus the runtime that owns it.
    ///
    /// The client under test drives its own runtime with `block_on`, so the
    /// tests stay synchronous and keep the mock on a separate runtime.
    struct MockApi {
        server: MockServer,
        runtime: Runtime,
    }

    impl MockApi {
        fn start() -> Self {
            let runtime = Runtime::new().unwrap();
            let server = runtime.block_on(MockServer::start());
            MockApi { server, runtime }
        }

        fn mount(&self, mock: Mock) {
            self.runtime.block_on(mock.mount(&self.server));
        }

        fn client(&self, token: &str) -> GooglePhotosClient {
            GooglePhotosClient::new(token)
                .unwrap()
                .with_base_url(&format!("{}/v1/", self.server.uri()))
                .unwrap()
        }

        fn received_paths(&self) -> Vec<String> {
            self.runtime
                .block_on(self.server.received_requests())
                .unwrap_or_default()
                .iter()
                .map(|request| request.url.path().to_string())
                .collect()
        }
    }

    #[test]
    fn test_album_from_api() {
        let api: ApiAlbum = serde_json::from_str(
            r#"{"id": "AF1Qip", "title": "Vacation", "mediaItemsCount": "42", "productUrl": "x"}"#,
        )
        .unwrap();

        let album = album_from_api(api);
        assert_eq!(album.id, "google-AF1Qip");
        assert_eq!(album.name, "Vacation");
        assert_eq!(album.item_count, 42);
        assert_eq!(album.source, AlbumSource::GooglePhotos);
        assert!(album.items.is_empty());
    }

    #[test]
    fn test_album_from_api_defaults() {
        let api: ApiAlbum = serde_json::from_str(r#"{"id": "abc"}"#).unwrap();

        let album = album_from_api(api);
        assert_eq!(album.name, "Untitled");
        assert_eq!(album.item_count, 0);
    }

    #[test]
    fn test_item_from_api() {
        let api: ApiMediaItem = serde_json::from_str(
            r#"{
                "id": "item1",
                "filename": "IMG_0001.HEIC",
                "mimeType": "image/heif",
                "mediaMetadata": {"creationTime": "2023-07-14T10:00:00Z", "width": "4032"}
            }"#,
        )
        .unwrap();

        let item = item_from_api(api, "google-AF1Qip");
        assert_eq!(item.name, "IMG_0001.HEIC");
        assert_eq!(item.album_id, "google-AF1Qip");
        assert_eq!(item.mime_type.as_deref(), Some("image/heif"));
        assert!(item.created_at.is_some());
    }

    #[test]
    fn test_with_base_url_rejects_garbage() {
        let client = GooglePhotosClient::new("token").unwrap();
        assert!(matches!(
            client.with_base_url("not a url"),
            Err(AlbumDiffError::Config(_))
        ));
    }

    #[test]
    fn test_scan_follows_pagination_and_merges_shared() {
        let api = MockApi::start();
        api.mount(
            Mock::given(method("GET"))
                .and(path("/v1/albums"))
                .and(header("authorization", "Bearer token"))
                .and(query_param("pageSize", "50"))
                .and(query_param_is_missing("pageToken"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "albums": [{"id": "a1", "title": "Vacation", "mediaItemsCount": "5"}],
                    "nextPageToken": "p2"
                })))
                .expect(1),
        );
        api.mount(
            Mock::given(method("GET"))
                .and(path("/v1/albums"))
                .and(query_param("pageToken", "p2"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "albums": [
                        {"id": "a2", "title": "Family", "mediaItemsCount": "10"},
                        {"id": "a3", "title": "Shared Trip", "mediaItemsCount": "1"}
                    ]
                })))
                .expect(1),
        );
        api.mount(
            Mock::given(method("GET"))
                .and(path("/v1/sharedAlbums"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "sharedAlbums": [{"id": "s1", "title": "Shared Trip", "mediaItemsCount": "7"}]
                })))
                .expect(1),
        );

        let snapshot = api.client("token").scan().unwrap();

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.get("Vacation").unwrap().item_count, 5);
        assert_eq!(snapshot.get("Family").unwrap().item_count, 10);
        assert_eq!(snapshot.get("Shared Trip").unwrap().id, "google-s1");
        assert_eq!(snapshot.get("Shared Trip").unwrap().item_count, 7);
        assert_eq!(
            api.received_paths(),
            vec!["/v1/albums", "/v1/albums", "/v1/sharedAlbums"]
        );
    }

    #[test]
    fn test_scan_surfaces_http_errors() {
        let api = MockApi::start();
        api.mount(
            Mock::given(method("GET"))
                .respond_with(
                    ResponseTemplate::new(401).set_body_json(json!({"error": "unauthenticated"})),
                ),
        );

        match api.client("expired").scan() {
            Err(AlbumDiffError::Service(message)) => assert!(message.contains("401")),
            other => panic!("expected service error, got {:?}", other.map(|s| s.len())),
        }
    }

    #[test]
    fn test_album_items_respects_limit_and_strips_prefix() {
        let api = MockApi::start();
        api.mount(
            Mock::given(method("POST"))
                .and(path("/v1/mediaItems:search"))
                .and(body_partial_json(json!({"albumId": "AF1Qip", "pageToken": "next"})))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "mediaItems": [{"id": "3", "filename": "c.jpg"}]
                })))
                .with_priority(1),
        );
        api.mount(
            Mock::given(method("POST"))
                .and(path("/v1/mediaItems:search"))
                .and(body_partial_json(json!({"albumId": "AF1Qip", "pageSize": 100})))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "mediaItems": [
                        {"id": "1", "filename": "a.jpg"},
                        {"id": "2", "filename": "b.jpg"}
                    ],
                    "nextPageToken": "next"
                }))),
        );

        let client = api.client("token");

        let all = client.album_items("google-AF1Qip", None).unwrap();
        assert_eq!(
            all.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
            vec!["a.jpg", "b.jpg", "c.jpg"]
        );
        assert!(all.iter().all(|i| i.album_id == "google-AF1Qip"));

        let limited = client.album_items("AF1Qip", Some(2)).unwrap();
        assert_eq!(limited.len(), 2);
    }
}
