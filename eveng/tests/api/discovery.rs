use crate::helpers::{authed, data, setup, setup_with, LAB};
use serde_json::json;
use wiremock::ResponseTemplate;

#[tokio::test]
async fn empty_folder_is_no_labs_not_an_error() {
	// Arrange
	let (server, session) = setup().await;
	authed("GET", "/api/folders/")
		.respond_with(ResponseTemplate::new(200).set_body_json(data(json!({"folders": [], "labs": []}))))
		.mount(&server)
		.await;

	// Act
	let result = session.labs().await;

	// Assert
	assert!(result.unwrap().is_empty());
}

#[tokio::test]
async fn non_json_folder_listing_is_a_decode_error() {
	// Arrange
	let (server, session) = setup().await;
	authed("GET", "/api/folders/")
		.respond_with(ResponseTemplate::new(200).set_body_string("<html><body>Service Unavailable</body></html>"))
		.mount(&server)
		.await;

	// Act
	let result = session.labs().await;

	// Assert
	let error = result.unwrap_err();
	assert!(error.is_decode());
	assert_eq!(error.status(), None);
}

#[tokio::test]
async fn folder_listing_with_unexpected_shape_is_a_decode_error() {
	// Arrange
	let (server, session) = setup().await;
	authed("GET", "/api/folders/")
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 200, "labs": "none"})))
		.mount(&server)
		.await;

	// Act
	let result = session.labs().await;

	// Assert
	let error = result.unwrap_err();
	assert!(error.is_decode());
	assert!(error.to_string().contains(r#""labs":"none""#), "{}", error);
}

#[tokio::test]
async fn lists_labs_and_subfolders() {
	// Arrange
	let (server, session) = setup().await;
	authed("GET", "/api/folders/")
		.respond_with(ResponseTemplate::new(200).set_body_json(data(json!({
			"folders": [{"name": "Class A", "path": "/Class A"}],
			"labs": [
				{"file": "demo.unl", "path": "/demo.unl", "mtime": "12 Mar 2024 10:34"},
				{"file": "bgp.unl", "path": "/bgp.unl", "mtime": 1710239640},
			],
		}))))
		.mount(&server)
		.await;

	// Act
	let listing = session.folder("").await.unwrap();

	// Assert
	assert_eq!(listing.folders[0].path, "/Class A");
	let files: Vec<_> = listing.labs.iter().map(|l| l.file.as_str()).collect();
	assert_eq!(files, ["demo.unl", "bgp.unl"]);
}

#[tokio::test]
async fn missing_lab_is_none() {
	// Arrange
	let (server, session) = setup().await;
	authed("GET", "/api/labs/missing.unl")
		.respond_with(ResponseTemplate::new(404).set_body_json(json!({
			"code": 404, "status": "fail", "message": "Lab does not exist (60038).",
		})))
		.mount(&server)
		.await;
	authed("GET", &format!("/api/labs/{}", LAB))
		.respond_with(ResponseTemplate::new(200).set_body_json(data(json!({
			"author": "netops", "description": "Two routers", "filename": LAB,
			"id": "1d2f3a", "name": "demo", "version": "1",
		}))))
		.mount(&server)
		.await;

	// Act
	let missing = session.lab("missing.unl").await;
	let found = session.lab(LAB).await;

	// Assert
	assert!(missing.unwrap().is_none());
	let info = found.unwrap().unwrap();
	assert_eq!(info.name.as_deref(), Some("demo"));
	assert_eq!(info.author.as_deref(), Some("netops"));
}

#[tokio::test]
async fn node_types_from_object_keys() {
	// Arrange
	let (server, session) = setup().await;
	authed("GET", "/api/list/nodetypes")
		.respond_with(ResponseTemplate::new(200).set_body_json(data(json!({
			"iol": "IOL", "qemu": "QEMU", "dynamips": "Dynamips",
		}))))
		.mount(&server)
		.await;

	// Act
	let types = session.node_types().await.unwrap();

	// Assert
	assert_eq!(types, ["dynamips", "iol", "qemu"]);
}

#[tokio::test]
async fn unavailable_templates_are_filtered_out() {
	// Arrange
	let (server, session) = setup().await;
	authed("GET", "/api/list/templates/qemu")
		.respond_with(ResponseTemplate::new(200).set_body_json(data(json!({
			"vios": {"name": "vIOS", "image": "vios-adventerprisek9-m.SPA.159-3.M6"},
			"asav": {"name": "ASAv"},
			"linux": {"name": "Linux", "path": "/opt/unetlab/addons/qemu/linux"},
			"fortinet": {"name": "FortiGate", "available": true},
			"paloalto": "Palo Alto.missing",
		}))))
		.mount(&server)
		.await;

	// Act
	let templates = session.templates("qemu").await.unwrap();

	// Assert
	let ids: Vec<_> = templates.iter().map(|t| t.id.as_str()).collect();
	assert_eq!(ids, ["fortinet", "linux", "vios"]);
}

#[tokio::test]
async fn templates_endpoint_without_placeholder_gets_the_type_appended() {
	// Arrange
	let (server, session) = setup_with(|auth| auth.endpoints.templates = "/api/list/templates/".into()).await;
	authed("GET", "/api/list/templates/qemu")
		.respond_with(ResponseTemplate::new(200).set_body_json(data(json!({
			"vios": {"name": "vIOS", "image": "vios-adventerprisek9-m.SPA.159-3.M6"},
		}))))
		.expect(1)
		.mount(&server)
		.await;
	authed("GET", "/api/list/templates/")
		.respond_with(ResponseTemplate::new(200).set_body_json(data(json!({
			"iol": {"name": "IOL", "image": "i86bi-linux-l3"},
		}))))
		.expect(0)
		.mount(&server)
		.await;

	// Act
	let templates = session.templates("qemu").await.unwrap();

	// Assert
	let ids: Vec<_> = templates.iter().map(|t| t.id.as_str()).collect();
	assert_eq!(ids, ["vios"]);
}

#[tokio::test]
async fn folders_endpoint_without_placeholder_gets_the_path_appended() {
	// Arrange
	let (server, session) = setup_with(|auth| auth.endpoints.folders = "/api/folders/".into()).await;
	authed("GET", "/api/folders/Class%20A")
		.respond_with(ResponseTemplate::new(200).set_body_json(data(json!({
			"folders": [],
			"labs": [{"file": "ospf.unl", "path": "/Class A/ospf.unl"}],
		}))))
		.expect(1)
		.mount(&server)
		.await;
	authed("GET", "/api/folders/")
		.respond_with(ResponseTemplate::new(200).set_body_json(data(json!({"folders": [], "labs": []}))))
		.expect(1)
		.mount(&server)
		.await;

	// Act
	let nested = session.folder("Class A").await.unwrap();
	let root = session.labs().await.unwrap();

	// Assert
	assert_eq!(nested.labs[0].file, "ospf.unl");
	assert!(root.is_empty());
}

#[tokio::test]
async fn lab_nodes_sorted_by_id() {
	// Arrange
	let (server, session) = setup().await;
	authed("GET", &format!("/api/labs/{}/nodes", LAB))
		.respond_with(ResponseTemplate::new(200).set_body_json(data(json!({
			"10": {"id": 10, "name": "FW1", "status": 2, "template": "asav", "type": "qemu"},
			"9": {"id": 9, "name": "R1", "status": 0, "template": "iol", "type": "iol"},
		}))))
		.mount(&server)
		.await;

	// Act
	let nodes = session.lab_nodes(LAB).await.unwrap();

	// Assert
	let names: Vec<_> = nodes.iter().map(|n| n.name.as_str()).collect();
	assert_eq!(names, ["R1", "FW1"]);
}
