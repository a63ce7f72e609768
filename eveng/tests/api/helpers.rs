use eveng::config::Endpoints;
use eveng::{Authenticate, EveSession};
use serde_json::json;
use wiremock::matchers::{any, header, method, path};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

pub const LAB: &str = "demo.unl";
pub const COOKIE: &str = "unetlab_session=3c4e0a2f";

pub fn credentials(server: &MockServer) -> Authenticate {
	Authenticate {
		base_url: server.uri(),
		username: "admin".into(),
		password: "eve".into(),
		endpoints: Endpoints::default(),
		timeout: None,
	}
}

/// Mounts a login endpoint that hands out the session cookie, plus [`mount_rejection`].
pub async fn mount_auth(server: &MockServer) {
	Mock::given(method("POST"))
		.and(path("/api/auth/login"))
		.respond_with(
			ResponseTemplate::new(200)
				.insert_header("set-cookie", format!("{}; Path=/", COOKIE).as_str())
				.set_body_json(json!({"code": 200, "status": "success", "message": "User logged in (90013)."})),
		)
		.mount(server)
		.await;

	mount_rejection(server).await;
}

/// Anything no other mock claims is answered the way the platform answers requests without a session.
pub async fn mount_rejection(server: &MockServer) {
	Mock::given(any())
		.respond_with(ResponseTemplate::new(401).set_body_json(json!({
			"code": 401, "status": "unauthorized", "message": "User is not authenticated or session timed out (90001).",
		})))
		.with_priority(u8::MAX)
		.mount(server)
		.await;
}

pub async fn setup() -> (MockServer, EveSession) {
	setup_with(|_| {}).await
}

/// [`setup`] with the login settings adjusted first, eg. custom endpoints or a timeout.
pub async fn setup_with(configure: impl FnOnce(&mut Authenticate)) -> (MockServer, EveSession) {
	let server = MockServer::start().await;
	mount_auth(&server).await;
	let mut auth = credentials(&server);
	configure(&mut auth);
	let session = auth.login().await.unwrap();
	(server, session)
}

/// A request that only matches for a logged in client.
pub fn authed(verb: &str, url_path: &str) -> MockBuilder {
	Mock::given(method(verb))
		.and(path(url_path))
		.and(header("cookie", COOKIE))
}

pub fn data(value: serde_json::Value) -> serde_json::Value {
	json!({"code": 200, "status": "success", "message": "", "data": value})
}
