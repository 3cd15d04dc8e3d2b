//! End-to-end behaviour of the request pipeline, driven through the compiled
//! transport router without a socket.

mod common;

use axum::http::{header, Request, StatusCode};
use axum::body::Body;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use common::{eventually, get, post_json, post_raw, send};
use endpoint_router::error::ErrorReport;
use endpoint_router::{
    DomainError, Endpoint, HttpError, JsonType, Mime, ParameterSchema, RequestContext, Response,
    Router, Server, ServerError, ServerResult, UploadPolicy, Validator,
};

async fn foo(_ctx: Arc<RequestContext>) -> ServerResult<Response> {
    Ok(Response::json(json!({ "foo": 1 })))
}

async fn echo_body(ctx: Arc<RequestContext>) -> ServerResult<Response> {
    Ok(Response::json(Value::Object(ctx.parsed_body().clone())))
}

fn recording_observer(server: &mut Server) -> Arc<Mutex<Vec<ErrorReport>>> {
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    server.set_error_observer(move |report| sink.lock().unwrap().push(report.clone()));
    reports
}

#[tokio::test]
async fn test_get_endpoint_returns_handler_payload() {
    let app = common::app(Router::new().endpoint(Endpoint::get("/foo", foo)));

    let (status, headers, body) = send(&app, get("/foo")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "foo": 1 }));
    assert!(headers.get("x-powered-by").is_some());
    assert!(headers.get("x-request-id").is_some());
}

#[tokio::test]
async fn test_type_check_failure_skips_handler() {
    let called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&called);
    let endpoint = Endpoint::post("/people", move |_ctx| {
        let flag = Arc::clone(&flag);
        async move {
            flag.store(true, Ordering::SeqCst);
            Ok(Response::empty())
        }
    })
    .validator(Validator::from_type_check(ParameterSchema::new().field("name", JsonType::String)));
    let app = common::app(Router::new().endpoint(endpoint));

    let (status, _, body) = send(&app, post_json("/people", "{}")).await;

    assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
    assert_eq!(body["errors"][0]["field"], "name");
    assert_eq!(body["errors"][0]["found"], "missing");
    assert!(!called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_validator_failure_status_override() {
    let endpoint = Endpoint::post("/people", echo_body).validator(
        Validator::from_type_check(ParameterSchema::new().field("age", JsonType::Integer)).failure_status(422),
    );
    let app = common::app(Router::new().endpoint(endpoint));

    let (status, _, _) = send(&app, post_json("/people", r#"{"age":"old"}"#)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _, body) = send(&app, post_json("/people", r#"{"age":30}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "age": 30 }));
}

#[tokio::test]
async fn test_nested_type_check_reports_field_paths() {
    let schema = ParameterSchema::new()
        .field("user", JsonType::Shape(ParameterSchema::new().field("name", JsonType::String)))
        .field("tags", JsonType::array_of(JsonType::String));
    let endpoint = Endpoint::post("/people", echo_body).validator(Validator::from_type_check(schema));
    let app = common::app(Router::new().endpoint(endpoint));

    let (status, _, body) = send(&app, post_json("/people", r#"{"user":{"name":5},"tags":["a","b",3]}"#)).await;
    assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
    assert_eq!(body["errors"][0]["field"], "user.name");
    assert_eq!(body["errors"][1]["field"], "tags[2]");

    let (status, _, _) = send(&app, post_json("/people", r#"{"user":{"name":"ann"},"tags":["a"]}"#)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_domain_error_envelope() {
    let endpoint = Endpoint::get("/secret", |_ctx| async {
        Err::<Response, _>(DomainError::permission_denied("document").into())
    });
    let app = common::app(Router::new().endpoint(endpoint));

    let (status, _, body) = send(&app, get("/secret")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "You do not have access to this document.");
    assert_eq!(body["origin"], json!({ "value": 0, "readable": "User" }));
    assert_eq!(body["type"], json!({ "value": 8, "readable": "Permission Denied" }));
    assert!(body["timeStamp"].is_u64());
}

#[tokio::test]
async fn test_upload_rejects_wrong_mime() {
    let called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&called);
    let endpoint = Endpoint::post("/avatar", move |_ctx| {
        let flag = Arc::clone(&flag);
        async move {
            flag.store(true, Ordering::SeqCst);
            Ok(Response::empty())
        }
    })
    .upload(UploadPolicy::new(Mime::new("image", "*"), 1024));
    let app = common::app(Router::new().endpoint(endpoint));

    let (status, _, body) = send(&app, post_raw("/avatar", "application/json", b"{}".to_vec())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"]["readable"], "File Incorrect Type");
    assert!(!called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_upload_requires_content_type() {
    let endpoint = Endpoint::post("/avatar", foo).upload(UploadPolicy::any());
    let app = common::app(Router::new().endpoint(endpoint));

    let request = Request::post("/avatar").body(Body::from("abc")).unwrap();
    let (status, _, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"]["readable"], "Null Or Undefined");
}

#[tokio::test]
async fn test_upload_delivers_raw_bytes() {
    let endpoint = Endpoint::post("/avatar", |ctx: Arc<RequestContext>| async move {
        let bytes = ctx.raw_body().cloned().unwrap_or_default();
        Ok(Response::raw(bytes, Mime::new("image", "png")).file_name("avatar").status(201))
    })
    .upload(UploadPolicy::new(Mime::new("image", "*"), 1024));
    let app = common::app(Router::new().endpoint(endpoint));

    let response = tower::ServiceExt::oneshot(app, post_raw("/avatar", "image/png", vec![1, 2, 3, 4]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(response.headers()[header::CONTENT_DISPOSITION], "inline; filename=avatar.png");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], &[1, 2, 3, 4]);
}

#[tokio::test]
async fn test_upload_too_large() {
    let endpoint = Endpoint::post("/avatar", foo).upload(UploadPolicy::new(Mime::any(), 4));
    let app = common::app(Router::new().endpoint(endpoint));

    let (status, _, body) = send(&app, post_raw("/avatar", "text/plain", vec![b'x'; 10])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"]["readable"], "File Too Large");
}

#[tokio::test]
async fn test_malformed_json_body() {
    let app = common::app(Router::new().endpoint(Endpoint::post("/data", echo_body)));

    let (status, _, body) = send(&app, post_json("/data", "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"]["readable"], "Failed To Parse JSON");

    let (status, _, _) = send(&app, post_json("/data", "[1, 2]")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_query_becomes_parsed_body() {
    let app = common::app(Router::new().endpoint(Endpoint::get("/search", echo_body)));

    let (status, _, body) = send(&app, get("/search?q=rust&tag=a&tag=b")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "q": "rust", "tag": ["a", "b"] }));
}

#[tokio::test]
async fn test_path_params_and_mount_prefix() {
    let users = Router::new().endpoint(Endpoint::get("/:id", |ctx: Arc<RequestContext>| async move {
        Ok(Response::json(json!({
            "id": ctx.param("id"),
            "path": ctx.path(),
            "url": ctx.full_url(),
        })))
    }));
    let app = common::app(Router::new().nest("users", users));

    let (status, _, body) = send(&app, get("/users/42?x=1")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "42");
    assert_eq!(body["path"], "/42");
    assert_eq!(body["url"], "/users/42?x=1");
}

#[tokio::test]
async fn test_non_utf8_path_param_is_incorrect_format() {
    let called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&called);
    let endpoint = Endpoint::get("/files/:name", move |_ctx| {
        let flag = Arc::clone(&flag);
        async move {
            flag.store(true, Ordering::SeqCst);
            Ok(Response::empty())
        }
    });
    let app = common::app(Router::new().endpoint(endpoint));

    let (status, _, body) = send(&app, get("/files/%FF%FE")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"]["readable"], "Parameter Incorrect Format");
    assert!(body["error"].as_str().unwrap().contains("'name'"));
    assert!(!called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_mount_prefix_forms_are_equivalent() {
    for prefix in ["a", "/a", "a/"] {
        let app = common::app(Router::new().nest(prefix, Router::new().endpoint(Endpoint::get("x", foo))));
        let (status, _, _) = send(&app, get("/a/x")).await;
        assert_eq!(status, StatusCode::OK, "prefix {:?}", prefix);
    }
}

#[tokio::test]
async fn test_middleware_order_and_short_circuit() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handled = Arc::new(AtomicBool::new(false));

    let mut server = Server::default();
    let first = Arc::clone(&seen);
    server.add_middleware(move |_ctx| {
        let first = Arc::clone(&first);
        async move {
            first.lock().unwrap().push("first");
            Ok(())
        }
    });
    let second = Arc::clone(&seen);
    server.add_middleware(move |ctx: Arc<RequestContext>| {
        let second = Arc::clone(&second);
        async move {
            second.lock().unwrap().push("second");
            if ctx.header("authorization").is_none() {
                return Err(HttpError::new("Missing credentials.").code(401).show().into());
            }
            Ok(())
        }
    });
    let flag = Arc::clone(&handled);
    server.add_endpoint(Endpoint::get("/private", move |_ctx| {
        let flag = Arc::clone(&flag);
        async move {
            flag.store(true, Ordering::SeqCst);
            Ok(Response::json(json!({ "ok": true })))
        }
    }));
    let app = server.into_router().unwrap();

    let (status, _, body) = send(&app, get("/private")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "Missing credentials." }));
    assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    assert!(!handled.load(Ordering::SeqCst));

    let request = Request::get("/private")
        .header("Authorization", "Bearer t")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(handled.load(Ordering::SeqCst));
}

#[derive(Debug)]
struct Session {
    user: String,
}

#[tokio::test]
async fn test_auth_injector_runs_before_validator() {
    let mut server = Server::default();
    server.set_auth_injector(|mut ctx: RequestContext| async move {
        if let Some(user) = ctx.header("x-user").map(str::to_string) {
            ctx.set_session(Session { user })?;
        }
        Ok(ctx)
    });

    let validator = Validator::from_auth(|ctx: Arc<RequestContext>| async move {
        match ctx.session::<Session>() {
            Some(_) => Ok(None),
            None => Ok(Some(Response::json(json!({ "error": "login" })).status(403))),
        }
    });
    server.add_endpoint(
        Endpoint::get("/me", |ctx: Arc<RequestContext>| async move {
            let user = ctx.session::<Session>().map(|s| s.user.clone());
            Ok(Response::json(json!({ "user": user })))
        })
        .validator(validator),
    );
    let app = server.into_router().unwrap();

    let (status, _, body) = send(&app, get("/me")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({ "error": "login" }));

    let request = Request::get("/me").header("x-user", "ann").body(Body::empty()).unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "user": "ann" }));
}

#[tokio::test]
async fn test_type_check_runs_before_auth_check() {
    let auth_called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&auth_called);
    let validator = Validator::from_type_check(ParameterSchema::new().field("id", JsonType::Integer))
        .with_auth_check(move |_ctx: Arc<RequestContext>| {
            let flag = Arc::clone(&flag);
            async move {
                flag.store(true, Ordering::SeqCst);
                ServerResult::<Option<Response>>::Ok(None)
            }
        });
    let app = common::app(Router::new().endpoint(Endpoint::post("/x", foo).validator(validator)));

    let (status, _, _) = send(&app, post_json("/x", r#"{"id":"nope"}"#)).await;

    assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
    assert!(!auth_called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_http_error_obfuscation() {
    let mut server = Server::default();
    let reports = recording_observer(&mut server);
    server.add_endpoint(Endpoint::get("/down", |_ctx| async {
        Err::<Response, _>(HttpError::new("database password rejected").code(503).into())
    }));
    let app = server.into_router().unwrap();

    let (status, _, body) = send(&app, get("/down")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({ "error": "Internal server error." }));
    let reports = reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].message, "database password rejected");
}

#[tokio::test]
async fn test_internal_errors_and_panics_are_contained() {
    let app = common::app(
        Router::new()
            .endpoint(Endpoint::get("/fail", |_ctx| async {
                Err::<Response, _>(ServerError::internal("disk on fire"))
            }))
            .endpoint(Endpoint::get("/panic", |_ctx| async {
                if true {
                    panic!("boom");
                }
                Ok(Response::empty())
            })),
    );

    for uri in ["/fail", "/panic"] {
        let (status, _, body) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error.");
        assert!(body["timeStamp"].is_u64());
    }
}

#[tokio::test]
async fn test_post_process_failure_does_not_affect_response() {
    let mut server = Server::default();
    let reports = recording_observer(&mut server);
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    server.add_endpoint(Endpoint::get("/report", foo).post_process(move |_ctx| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DomainError::file_not_found().into())
        }
    }));
    let app = server.into_router().unwrap();

    let (status, _, body) = send(&app, get("/report")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "foo": 1 }));

    assert!(eventually(|| reports.lock().unwrap().len() == 1).await);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(reports.lock().unwrap().len(), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_post_process_waits_for_body() {
    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    let endpoint = Endpoint::get("/report", foo).post_process(move |_ctx| {
        let flag = Arc::clone(&flag);
        async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        }
    });
    let app = common::app(Router::new().endpoint(endpoint));

    let response = tower::ServiceExt::oneshot(app, get("/report")).await.unwrap();
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "9");
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(!ran.load(Ordering::SeqCst));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], br#"{"foo":1}"#);
    assert!(eventually(|| ran.load(Ordering::SeqCst)).await);
}

#[tokio::test]
async fn test_unmatched_request_gets_json_404() {
    let app = common::app(Router::new().endpoint(Endpoint::get("/foo", foo)));

    let (status, headers, body) = send(&app, get("/nope")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found.");
    assert!(body["timeStamp"].is_u64());
    assert!(headers.get("x-powered-by").is_some());
}

#[tokio::test]
async fn test_duplicate_registration_fails_to_compile() {
    let mut server = Server::default();
    server.add_endpoint(Endpoint::get("/a/b", foo));
    server.mount("a", Router::new().endpoint(Endpoint::get("b", foo)));

    assert!(server.into_router().is_err());
}
