use std::path::PathBuf;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use configs::{AppConfig, StorageConfig};
use serde_json::{json, Value};
use tower::Service;
use uuid::Uuid;

use server::startup::build_app;

const BOUNDARY: &str = "drinkboundary7479";
// base64("admin:Slug123") and base64("admin:wrong")
const GOOD_AUTH: &str = "Basic YWRtaW46U2x1ZzEyMw==";
const BAD_AUTH: &str = "Basic YWRtaW46d3Jvbmc=";

struct TestApp {
    root: PathBuf,
    app: Router,
}

impl TestApp {
    async fn new() -> anyhow::Result<Self> {
        Self::with_config(|_, _| Ok(())).await
    }

    /// Like `new`, but lets the test place files and adjust the config first.
    async fn with_config<F>(prepare: F) -> anyhow::Result<Self>
    where
        F: FnOnce(&mut AppConfig, &std::path::Path) -> anyhow::Result<()>,
    {
        let root = std::env::temp_dir().join(format!("drink_router_{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&root).await?;
        tokio::fs::write(root.join("index.html"), "<h1>menu</h1>").await?;
        tokio::fs::write(root.join("modify.html"), "<h1>admin</h1>").await?;

        let mut cfg = AppConfig { storage: StorageConfig::rooted_at(&root), ..AppConfig::default() };
        prepare(&mut cfg, &root)?;
        let app = build_app(&cfg).await?;
        Ok(Self { root, app })
    }

    async fn send(&self, req: Request<Body>) -> anyhow::Result<(StatusCode, Vec<u8>)> {
        let resp = self.app.clone().call(req).await?;
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await?;
        Ok((status, body.to_vec()))
    }

    async fn catalog(&self) -> anyhow::Result<Value> {
        Ok(serde_json::from_slice(&tokio::fs::read(self.root.join("specs.json")).await?)?)
    }

    async fn cleanup(self) {
        let _ = tokio::fs::remove_dir_all(&self.root).await;
    }
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes());
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, filename, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn add_drink_request(parts: &[Part<'_>]) -> anyhow::Result<Request<Body>> {
    Ok(Request::builder()
        .method("POST")
        .uri("/addDrink")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(multipart_body(parts)))?)
}

#[tokio::test]
async fn add_drink_without_image_stores_null_image() -> anyhow::Result<()> {
    let t = TestApp::new().await?;
    let req = add_drink_request(&[Part::Text("name", "Mojito"), Part::Text("ingredients", r#"["rum","mint","soda"]"#)])?;
    let (status, body) = t.send(req).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());

    assert_eq!(t.catalog().await?, json!({"Mojito": {"image": null, "ingredients": ["rum", "mint", "soda"]}}));
    t.cleanup().await;
    Ok(())
}

#[tokio::test]
async fn add_drink_missing_fields_is_bad_request() -> anyhow::Result<()> {
    let t = TestApp::new().await?;
    let (status, body) = t.send(add_drink_request(&[Part::Text("name", "Mojito")])?).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(String::from_utf8(body)?, "Missing data");

    let (status, _) = t
        .send(add_drink_request(&[
            Part::Text("name", ""),
            Part::Text("ingredients", "[]"),
            Part::File("image", "orphan.png", b"bytes"),
        ])?)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(t.catalog().await?, json!({}));

    // rejected requests leave no uploaded file behind
    let mut entries = tokio::fs::read_dir(t.root.join("Images")).await?;
    assert!(entries.next_entry().await?.is_none());
    t.cleanup().await;
    Ok(())
}

#[tokio::test]
async fn add_drink_with_malformed_ingredients_discards_image() -> anyhow::Result<()> {
    let t = TestApp::new().await?;
    let req = add_drink_request(&[
        Part::Text("name", "Broken"),
        Part::Text("ingredients", "[rum"),
        Part::File("image", "broken.png", b"bytes"),
    ])?;
    let (status, body) = t.send(req).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(String::from_utf8(body)?, "Malformed ingredients");
    assert_eq!(t.catalog().await?, json!({}));

    let mut entries = tokio::fs::read_dir(t.root.join("Images")).await?;
    assert!(entries.next_entry().await?.is_none());
    t.cleanup().await;
    Ok(())
}

#[tokio::test]
async fn add_then_remove_drink_with_image() -> anyhow::Result<()> {
    let t = TestApp::new().await?;
    let req = add_drink_request(&[
        Part::Text("name", "Old Fashioned"),
        Part::Text("ingredients", r#"{"bourbon": "2oz", "bitters": "2 dash"}"#),
        Part::File("image", "of.png", b"\x89PNG"),
    ])?;
    assert_eq!(t.send(req).await?.0, StatusCode::OK);

    let catalog = t.catalog().await?;
    let image = catalog["Old Fashioned"]["image"].as_str().unwrap_or_default().to_string();
    assert!(image.ends_with("-of.png"));
    let image_path = t.root.join("Images").join(&image);
    assert_eq!(tokio::fs::read(&image_path).await?, b"\x89PNG");

    // the stored image is reachable through static serving
    let get = Request::builder().uri(format!("/Images/{image}")).body(Body::empty())?;
    assert_eq!(t.send(get).await?.0, StatusCode::OK);

    let del = Request::builder()
        .method("DELETE")
        .uri("/removeDrink/Old%20Fashioned")
        .body(Body::empty())?;
    assert_eq!(t.send(del).await?.0, StatusCode::OK);
    assert_eq!(t.catalog().await?, json!({}));
    assert!(!image_path.exists());
    t.cleanup().await;
    Ok(())
}

#[tokio::test]
async fn remove_unknown_drink_is_not_found() -> anyhow::Result<()> {
    let t = TestApp::new().await?;
    let req = add_drink_request(&[Part::Text("name", "Negroni"), Part::Text("ingredients", r#"["gin"]"#)])?;
    t.send(req).await?;

    let del = Request::builder().method("DELETE").uri("/removeDrink/negroni").body(Body::empty())?;
    let (status, body) = t.send(del).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(String::from_utf8(body)?, "Not found");
    assert!(t.catalog().await?.get("Negroni").is_some());
    t.cleanup().await;
    Ok(())
}

#[tokio::test]
async fn save_calculator_json_backs_up_previous_blob() -> anyhow::Result<()> {
    let t = TestApp::new().await?;
    let post = |blob: Value| -> anyhow::Result<Request<Body>> {
        Ok(Request::builder()
            .method("POST")
            .uri("/save-calculator-json")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&blob)?))?)
    };

    let (status, body) = t.send(post(json!({"markup": 1.5}))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body)?, "Saved successfully");

    let (status, body) = t.send(post(json!({"markup": 2.0}))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body)?, "Saved successfully (backup created)");

    let mut backups = tokio::fs::read_dir(t.root.join("backups")).await?;
    let backup = backups.next_entry().await?.expect("one backup");
    assert!(backups.next_entry().await?.is_none());
    let snapshot: Value = serde_json::from_slice(&tokio::fs::read(backup.path()).await?)?;
    assert_eq!(snapshot, json!({"markup": 1.5}));

    let current: Value = serde_json::from_slice(&tokio::fs::read(t.root.join("calculator.json")).await?)?;
    assert_eq!(current, json!({"markup": 2.0}));
    t.cleanup().await;
    Ok(())
}

#[tokio::test]
async fn protected_page_requires_credentials() -> anyhow::Result<()> {
    let t = TestApp::new().await?;

    let anon = Request::builder().uri("/modify.html").body(Body::empty())?;
    let resp = t.app.clone().call(anon).await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().get(header::WWW_AUTHENTICATE).is_some());

    let wrong = Request::builder()
        .uri("/modify.html")
        .header(header::AUTHORIZATION, BAD_AUTH)
        .body(Body::empty())?;
    assert_eq!(t.send(wrong).await?.0, StatusCode::UNAUTHORIZED);

    let good = Request::builder()
        .uri("/modify.html")
        .header(header::AUTHORIZATION, GOOD_AUTH)
        .body(Body::empty())?;
    let (status, body) = t.send(good).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body)?, "<h1>admin</h1>");

    let public = Request::builder().uri("/index.html").body(Body::empty())?;
    assert_eq!(t.send(public).await?.0, StatusCode::OK);

    let missing = Request::builder().uri("/nope.html").body(Body::empty())?;
    assert_eq!(t.send(missing).await?.0, StatusCode::NOT_FOUND);
    t.cleanup().await;
    Ok(())
}

#[tokio::test]
async fn config_and_dotfiles_are_not_served() -> anyhow::Result<()> {
    let t = TestApp::with_config(|cfg, root| {
        let path = root.join("config.toml");
        std::fs::write(&path, "[admin]\npassword = \"hunter2\"\n")?;
        std::fs::write(root.join(".env"), "ADMIN_PASSWORD=hunter2\n")?;
        cfg.source = Some(path);
        Ok(())
    })
    .await?;

    for uri in ["/config.toml", "/config%2Etoml", "//config.toml", "/.env", "/%2Eenv"] {
        let req = Request::builder().uri(uri).body(Body::empty())?;
        let (status, body) = t.send(req).await?;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert!(!String::from_utf8_lossy(&body).contains("hunter2"), "{uri}");
    }

    // credentials do not unlock private files
    let req = Request::builder().uri("/.env").header(header::AUTHORIZATION, GOOD_AUTH).body(Body::empty())?;
    assert_eq!(t.send(req).await?.0, StatusCode::NOT_FOUND);

    // the rest of the directory is still served
    let req = Request::builder().uri("/index.html").body(Body::empty())?;
    assert_eq!(t.send(req).await?.0, StatusCode::OK);
    t.cleanup().await;
    Ok(())
}

#[tokio::test]
async fn health_reports_ok() -> anyhow::Result<()> {
    let t = TestApp::new().await?;
    let (status, body) = t.send(Request::builder().uri("/health").body(Body::empty())?).await?;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body)?;
    assert_eq!(body["status"], "ok");
    t.cleanup().await;
    Ok(())
}
