use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::blobstore::BlobStore;
use crate::errors::{Error, Result};
use crate::recordstore::RecordStore;
use crate::service::PhotoService;

pub const PHOTO_PATH: &str = "/users/{user}/photo";

/// Builds the HTTP surface over a photo service. Generic over the stores so
/// tests can serve the same routes from the in-memory store.
pub fn router<B, R>(service: PhotoService<B, R>) -> Router
where
    B: BlobStore + Send + Sync + 'static,
    R: RecordStore + Send + Sync + 'static,
{
    Router::new()
        .route(PHOTO_PATH, get(read_photo).post(write_photo))
        .with_state(Arc::new(service))
}

async fn read_photo<B, R>(
    State(service): State<Arc<PhotoService<B, R>>>,
    Path(user): Path<u64>,
) -> Result<impl IntoResponse>
where
    B: BlobStore + Send + Sync + 'static,
    R: RecordStore + Send + Sync + 'static,
{
    let photo = service.read_photo(user).await?;

    Ok(([(header::CONTENT_TYPE, photo.content_type)], photo.bytes))
}

async fn write_photo<B, R>(
    State(service): State<Arc<PhotoService<B, R>>>,
    Path(user): Path<u64>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse>
where
    B: BlobStore + Send + Sync + 'static,
    R: RecordStore + Send + Sync + 'static,
{
    let mut file = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .ok_or_else(|| Error::BadRequest {
                message: "`file` part has no content type".into(),
            })?
            .to_string();
        let bytes = field.bytes().await.map_err(bad_multipart)?;

        file = Some((content_type, bytes));
        break;
    }
    let Some((content_type, bytes)) = file else {
        return Err(Error::BadRequest {
            message: "missing `file` part".into(),
        });
    };

    service.write_photo(user, &content_type, bytes.to_vec()).await?;

    let location = format!("/users/{user}/photo");
    Ok((StatusCode::CREATED, [(header::LOCATION, location)]))
}

fn bad_multipart(err: axum::extract::multipart::MultipartError) -> Error {
    Error::BadRequest {
        message: format!("malformed multipart request: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;

    use super::*;
    use crate::mem_impl::MemStore;

    fn test_server() -> TestServer {
        let store = MemStore::new();
        let service = PhotoService::new(store.clone(), store);
        TestServer::new(router(service)).unwrap()
    }

    fn photo_form(bytes: &[u8], mime: &str) -> MultipartForm {
        let part = Part::bytes(bytes.to_vec())
            .file_name("photo.bin")
            .mime_type(mime);
        MultipartForm::new().add_part("file", part)
    }

    #[tokio::test]
    async fn test_upload_returns_created_with_location() {
        let server = test_server();

        let response = server
            .post("/users/42/photo")
            .multipart(photo_form(b"\xff\xd8\xff jpeg bytes", "image/jpeg"))
            .await;

        response.assert_status(StatusCode::CREATED);
        assert_eq!(response.header("location"), "/users/42/photo");
        assert!(response.as_bytes().is_empty());
    }

    #[tokio::test]
    async fn test_upload_then_download_roundtrip() {
        let server = test_server();
        let bytes: Vec<u8> = (0..1024).map(|i| i as u8).collect();

        server
            .post("/users/42/photo")
            .multipart(photo_form(&bytes, "image/png"))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server.get("/users/42/photo").await;
        response.assert_status_ok();
        assert_eq!(response.header("content-type"), "image/png");
        assert_eq!(response.as_bytes().as_ref(), &bytes[..]);
    }

    #[tokio::test]
    async fn test_second_upload_wins() {
        let server = test_server();

        server
            .post("/users/42/photo")
            .multipart(photo_form(b"first", "image/png"))
            .await
            .assert_status(StatusCode::CREATED);
        server
            .post("/users/42/photo")
            .multipart(photo_form(b"second", "image/jpeg"))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server.get("/users/42/photo").await;
        response.assert_status_ok();
        assert_eq!(response.header("content-type"), "image/jpeg");
        assert_eq!(response.as_bytes().as_ref(), b"second".as_slice());
    }

    #[tokio::test]
    async fn test_download_without_upload_is_404() {
        let server = test_server();

        let response = server.get("/users/42/photo").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_without_file_part_is_400() {
        let server = test_server();

        let form = MultipartForm::new().add_text("note", "no file here");
        let response = server.post("/users/42/photo").multipart(form).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_non_numeric_user_is_rejected() {
        let server = test_server();

        let response = server.get("/users/bob/photo").await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }
}
