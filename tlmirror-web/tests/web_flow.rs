use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use axum_extra::extract::cookie::Key;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tlmirror_config::RunEnvironment;
use tlmirror_social::twitter::{ListSettings, TwitterApi, TwitterCredentials};
use tlmirror_web::{AppState, router};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app(server: &MockServer, environment: RunEnvironment) -> Router {
    let api = TwitterApi::with_base_url(
        TwitterCredentials {
            consumer_key: "consumer-key".into(),
            consumer_secret: "consumer-secret".into(),
            bearer_token: "bearer-token".into(),
        },
        &server.uri(),
    )
    .unwrap();
    let state = AppState::new(api, ListSettings::default(), Key::generate())
        .with_environment(environment)
        .with_secure_cookies(false);
    router(state)
}

async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.unwrap()
}

async fn body_text(res: Response) -> String {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn session_cookie(res: &Response) -> Option<String> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

fn create_request(user_id: &str, href: &str, cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::post("/lists/create").header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    req.body(Body::from(json!({ "user_id": user_id, "href": href }).to_string()))
        .unwrap()
}

async fn mount_user(server: &MockServer, screen_name: &str, id: &str) {
    Mock::given(method("GET"))
        .and(path("/1.1/users/show.json"))
        .and(query_param("screen_name", screen_name))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_str": id,
            "screen_name": screen_name,
            "name": "Jack",
            "friends_count": 2
        })))
        .mount(server)
        .await;
}

async fn mount_request_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/request_token"))
        .and(query_param("oauth_callback", "https://tl.example/lists/callback"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "oauth_token=req-token&oauth_token_secret=req-secret&oauth_callback_confirmed=true",
        ))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn create_then_callback_then_index_shows_notice() {
    let server = MockServer::start().await;
    mount_user(&server, "jack", "1").await;
    mount_request_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .and(query_param("oauth_verifier", "verifier"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "oauth_token=access-token&oauth_token_secret=access-secret&user_id=42&screen_name=me",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/1.1/lists/create.json"))
        .and(query_param("mode", "private"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_str": "555", "name": "TL再現リスト", "mode": "private"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1.1/friends/ids.json"))
        .and(query_param("screen_name", "jack"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ids": ["10", "11"],
            "next_cursor_str": "0"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/1.1/lists/members/create_all.json"))
        .and(query_param("list_id", "555"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_str": "555", "name": "TL再現リスト"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let app = app(&server, RunEnvironment::Production);

    let res = send(&app, create_request("@jack", "https://tl.example/?from=form", None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let cookie = session_cookie(&res).expect("session cookie set");
    assert!(!cookie.contains("req-secret"));
    let body: Value = serde_json::from_str(&body_text(res).await).unwrap();
    assert_eq!(
        body["url"],
        format!("{}/oauth/authorize?oauth_token=req-token", server.uri())
    );

    let res = send(
        &app,
        Request::get("/lists/callback?oauth_token=req-token&oauth_verifier=verifier")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(res.headers()[header::LOCATION], "/");
    let cookie = session_cookie(&res).expect("session keeps the user");

    let res = send(
        &app,
        Request::get("/")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let html = body_text(res).await;
    assert!(html.contains("@jack のタイムラインを再現したリストを作成しました。"));

    let access = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.url.path() == "/oauth/access_token")
        .unwrap();
    let auth = access.headers.get("authorization").unwrap().to_str().unwrap();
    assert!(auth.contains("oauth_token=\"req-token\""));
}

#[tokio::test]
async fn unknown_user_gets_a_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.1/users/show.json"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errors": [{ "code": 50, "message": "User not found." }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/request_token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let app = app(&server, RunEnvironment::Production);
    let res = send(&app, create_request("nobody", "https://tl.example/", None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(session_cookie(&res).is_none());
    let body: Value = serde_json::from_str(&body_text(res).await).unwrap();
    assert_eq!(body, json!({ "message": "対象ユーザーが存在しません。" }));
}

#[tokio::test]
async fn any_client_error_from_lookup_reads_as_unknown_user() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.1/users/show.json"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "errors": [{ "code": 89, "message": "Invalid or expired token." }]
        })))
        .mount(&server)
        .await;

    let app = app(&server, RunEnvironment::Production);
    let res = send(&app, create_request("jack", "https://tl.example/", None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(res).await).unwrap();
    assert_eq!(body, json!({ "message": "対象ユーザーが存在しません。" }));
}

#[tokio::test]
async fn blank_user_id_gets_a_message_without_a_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.1/users/show.json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let app = app(&server, RunEnvironment::Production);
    for user_id in ["", "  ", "@"] {
        let res = send(&app, create_request(user_id, "https://tl.example/", None)).await;
        assert_eq!(res.status(), StatusCode::OK, "{user_id:?}");
        assert!(session_cookie(&res).is_none());
        let body: Value = serde_json::from_str(&body_text(res).await).unwrap();
        assert_eq!(body, json!({ "message": "対象ユーザーが存在しません。" }));
    }
}

#[tokio::test]
async fn callback_for_user_that_no_longer_resolves_redirects_home() {
    let server = MockServer::start().await;
    mount_request_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/1.1/users/show.json"))
        .and(query_param("screen_name", "jack"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_str": "1", "screen_name": "jack", "name": "Jack"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1.1/users/show.json"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let app = app(&server, RunEnvironment::Production);
    let res = send(&app, create_request("jack", "https://tl.example/", None)).await;
    let cookie = session_cookie(&res).expect("session cookie set");

    let res = send(
        &app,
        Request::get("/lists/callback?oauth_token=req-token&oauth_verifier=v")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(res.headers()[header::LOCATION], "/");
}

#[tokio::test]
async fn callback_without_session_redirects_home() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let app = app(&server, RunEnvironment::Production);
    let res = send(
        &app,
        Request::get("/lists/callback?oauth_token=t&oauth_verifier=v")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(res.headers()[header::LOCATION], "/");
}

#[tokio::test]
async fn denied_authorization_redirects_home() {
    let server = MockServer::start().await;
    mount_user(&server, "jack", "1").await;
    mount_request_token(&server).await;

    let app = app(&server, RunEnvironment::Production);
    let res = send(&app, create_request("jack", "https://tl.example/", None)).await;
    let cookie = session_cookie(&res).unwrap();

    let res = send(
        &app,
        Request::get("/lists/callback?denied=req-token")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    // The session is cleared, so the index shows no notice.
    let cleared = session_cookie(&res).unwrap_or_default();
    let res = send(
        &app,
        Request::get("/")
            .header(header::COOKIE, cleared)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert!(!body_text(res).await.contains("notice"));
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let server = MockServer::start().await;
    let app = app(&server, RunEnvironment::Production);

    for uri in ["/", "/javascripts/scripts.js", "/missing"] {
        let res = send(&app, Request::get(uri).body(Body::empty()).unwrap()).await;
        let headers = res.headers();
        assert_eq!(headers["x-frame-options"], "SAMEORIGIN", "{uri}");
        assert_eq!(headers["x-content-type-options"], "nosniff", "{uri}");
        let csp = headers[header::CONTENT_SECURITY_POLICY].to_str().unwrap();
        assert!(csp.contains("script-src 'self' cdn.jsdelivr.net"), "{uri}");
    }
}

#[tokio::test]
async fn static_assets_are_served() {
    let server = MockServer::start().await;
    let app = app(&server, RunEnvironment::Production);

    let res = send(
        &app,
        Request::get("/javascripts/scripts.js").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("/lists/create"));
}

#[tokio::test]
async fn unknown_path_renders_the_error_page() {
    let server = MockServer::start().await;
    let app = app(&server, RunEnvironment::Production);

    let res = send(&app, Request::get("/nope").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(
        res.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    let html = body_text(res).await;
    assert!(html.contains("404"));
    assert!(html.contains("Not Found"));
}

#[tokio::test]
async fn invalid_href_is_a_bad_request() {
    let server = MockServer::start().await;
    let app = app(&server, RunEnvironment::Production);

    let res = send(&app, create_request("jack", "not a url", None)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn error_detail_is_shown_only_in_development() {
    let server = MockServer::start().await;
    mount_user(&server, "jack", "1").await;
    Mock::given(method("POST"))
        .and(path("/oauth/request_token"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "errors": [{ "code": 131, "message": "Internal error" }]
        })))
        .mount(&server)
        .await;

    let dev = app(&server, RunEnvironment::Development);
    let res = send(&dev, create_request("jack", "https://tl.example/", None)).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(res).await.contains("requesting oauth request token"));

    let prod = app(&server, RunEnvironment::Production);
    let res = send(&prod, create_request("jack", "https://tl.example/", None)).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body_text(res).await.contains("requesting oauth request token"));
}
