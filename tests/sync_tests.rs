use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use grocery_list_client::config::ClientOptions;
use grocery_list_client::error::Error;
use grocery_list_client::events::ClientEvent;
use grocery_list_client::list::CategorySelection;
use grocery_list_client::storage::{FileKvStore, KvStore, MemoryKvStore};
use grocery_list_client::GroceryClient;

fn manual(name: &str) -> CategorySelection {
    CategorySelection::Manual(name.to_string())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn next_event(events: &mut UnboundedReceiver<ClientEvent>) -> ClientEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

async fn wait_for<F>(events: &mut UnboundedReceiver<ClientEvent>, accept: F) -> ClientEvent
where
    F: Fn(&ClientEvent) -> bool,
{
    loop {
        let event = next_event(events).await;
        if accept(&event) {
            return event;
        }
    }
}

/// Mount a login endpoint plus an empty user payload
async fn mount_auth(server: &MockServer) {
    init_tracing();
    Mock::given(method("POST"))
        .and(path("/grocery/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/grocery/loadUserData"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [],
            "categories": [],
            "categoryUsage": {},
            "userHistory": []
        })))
        .mount(server)
        .await;
}

async fn logged_in_client(server: &MockServer) -> (GroceryClient, Arc<MemoryKvStore>) {
    mount_auth(server).await;
    let storage = Arc::new(MemoryKvStore::new());
    let client =
        GroceryClient::with_storage(&server.uri(), ClientOptions::default(), storage.clone());
    client.login("alice", "password123").await.expect("login");
    (client, storage)
}

#[tokio::test]
async fn login_replaces_local_state_with_the_server_copy() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/grocery/login"))
        .and(body_json(json!({"username": "alice", "password": "password123"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/grocery/loadUserData"))
        .and(header("Authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": 1, "name": "Milk", "category": "Dairy & Eggs", "checked": false}],
            "categories": [{"id": 3, "name": "Dairy & Eggs"}],
            "categoryUsage": {"Dairy & Eggs": 1},
            "userHistory": [{"item": "Milk", "category": "Dairy & Eggs"}]
        })))
        .mount(&server)
        .await;

    let client = GroceryClient::new(&server.uri());
    let mut events = client.take_events().expect("events");

    client.login("alice", "password123").await.expect("login");

    assert!(client.is_authenticated());
    assert_eq!(client.username().as_deref(), Some("alice"));
    client.with_state(|s| {
        assert_eq!(s.items().all().len(), 1);
        assert_eq!(s.items().all()[0].name, "Milk");
        assert_eq!(s.categories().all().len(), 1);
        assert_eq!(s.ledger().usage_of("Dairy & Eggs"), 1);
        s.check_invariants().expect("invariants");
    });

    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::LoggedIn { username } if username == "alice"
    ));
    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::StateLoaded { items: 1, categories: 1 }
    ));
}

#[tokio::test]
async fn rejected_login_keeps_defaults_and_stays_unauthenticated() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/grocery/login"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": "Invalid username or password"})),
        )
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryKvStore::new());
    let client =
        GroceryClient::with_storage(&server.uri(), ClientOptions::default(), storage.clone());

    let err = client.login("alice", "wrong").await.expect_err("401 login");
    match err {
        Error::Auth(message) => assert_eq!(message, "Invalid username or password"),
        other => panic!("unexpected error: {:?}", other),
    }

    assert!(!client.is_authenticated());
    assert!(storage.get("authToken").is_none());
    assert!(storage.get("username").is_none());
    assert!(client.cached_snapshot("alice").is_none());
    client.with_state(|s| {
        assert!(s.items().all().is_empty());
        assert_eq!(s.categories().all().len(), 15);
    });
}

#[tokio::test]
async fn blank_credentials_never_reach_the_network() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/grocery/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
        .expect(0)
        .mount(&server)
        .await;

    let client = GroceryClient::new(&server.uri());

    assert!(matches!(
        client.login("", "password123").await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        client.login("alice", "").await,
        Err(Error::Validation(_))
    ));
}

#[tokio::test]
async fn failed_load_keeps_local_defaults() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/grocery/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/grocery/loadUserData"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "Server error"})))
        .mount(&server)
        .await;

    let client = GroceryClient::new(&server.uri());
    let mut events = client.take_events().expect("events");

    client.login("alice", "password123").await.expect("login");

    assert!(client.is_authenticated());
    client.with_state(|s| {
        assert!(s.items().all().is_empty());
        assert_eq!(s.categories().all().len(), 15);
    });

    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::LoggedIn { .. }
    ));
    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::LoadFailed { .. }
    ));
}

#[tokio::test]
async fn signup_logs_the_new_account_in() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/grocery/signup"))
        .and(body_json(json!({"username": "bob", "password": "password123"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "message": "User created successfully",
            "access_token": "tok"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/grocery/loadUserData"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [],
            "categories": [],
            "categoryUsage": {},
            "userHistory": []
        })))
        .mount(&server)
        .await;

    let client = GroceryClient::new(&server.uri());
    client.signup("bob", "password123").await.expect("signup");

    assert!(client.is_authenticated());
    assert_eq!(client.username().as_deref(), Some("bob"));
}

#[tokio::test]
async fn duplicate_signup_surfaces_the_server_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/grocery/signup"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "Username already exists"})),
        )
        .mount(&server)
        .await;

    let client = GroceryClient::new(&server.uri());
    let err = client.signup("bob", "password123").await.expect_err("400 signup");

    match err {
        Error::Auth(message) => assert_eq!(message, "Username already exists"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn persisted_sessions_are_picked_back_up() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/grocery/loadUserData"))
        .and(header("Authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [],
            "categories": [{"id": 1, "name": "Produce"}],
            "categoryUsage": {},
            "userHistory": []
        })))
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryKvStore::new());
    storage.set("authToken", "tok");
    storage.set("username", "alice");

    let client = GroceryClient::with_storage(&server.uri(), ClientOptions::default(), storage);
    let mut events = client.take_events().expect("events");

    let restored = client.restore_session().await;
    assert_eq!(restored.as_deref(), Some("alice"));
    assert!(client.is_authenticated());
    client.with_state(|s| assert_eq!(s.categories().all().len(), 1));

    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::SessionRestored { username } if username == "alice"
    ));
    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::StateLoaded { .. }
    ));
}

#[tokio::test]
async fn restore_without_stored_keys_does_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/grocery/loadUserData"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let client = GroceryClient::new(&server.uri());
    assert_eq!(client.restore_session().await, None);
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn detached_item_saves_reach_the_server() {
    let server = MockServer::start().await;
    let (client, _storage) = logged_in_client(&server).await;
    let mut events = client.take_events().expect("events");

    Mock::given(method("POST"))
        .and(path("/grocery/saveItem"))
        .and(header("Authorization", "Bearer tok"))
        .and(body_json(json!({"itemName": "Milk", "category": "Dairy"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Item saved successfully"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    client.add_item("Milk", manual("Dairy")).expect("add");

    let event = wait_for(&mut events, |e| matches!(e, ClientEvent::ItemSaved { .. })).await;
    assert!(matches!(event, ClientEvent::ItemSaved { name } if name == "Milk"));
}

#[tokio::test]
async fn failed_item_saves_keep_the_item_local() {
    let server = MockServer::start().await;
    let (client, _storage) = logged_in_client(&server).await;
    let mut events = client.take_events().expect("events");

    Mock::given(method("POST"))
        .and(path("/grocery/saveItem"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "Server error"})))
        .mount(&server)
        .await;

    client.add_item("Milk", manual("Dairy")).expect("add");

    let event = wait_for(&mut events, |e| {
        matches!(e, ClientEvent::ItemSaveFailed { .. })
    })
    .await;
    assert!(matches!(event, ClientEvent::ItemSaveFailed { name, .. } if name == "Milk"));
    client.with_state(|s| assert_eq!(s.items().all().len(), 1));
}

#[tokio::test]
async fn mutations_mirror_into_the_per_user_cache() {
    let server = MockServer::start().await;
    let (client, _storage) = logged_in_client(&server).await;
    let mut events = client.take_events().expect("events");

    Mock::given(method("POST"))
        .and(path("/grocery/saveItem"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Item saved successfully"})),
        )
        .mount(&server)
        .await;

    let item = client.add_item("Milk", manual("Dairy")).expect("add");
    wait_for(&mut events, |e| matches!(e, ClientEvent::ItemSaved { .. })).await;

    let cached = client.cached_snapshot("alice").expect("cache written");
    assert_eq!(cached.items.len(), 1);
    assert_eq!(cached.items[0].name, "Milk");
    assert_eq!(cached.category_usage.get("Dairy"), Some(&1));
    assert_eq!(cached.user_history.len(), 1);
    assert!(client.cached_snapshot("bob").is_none());

    client.toggle_checked(item.id);
    let cached = client.cached_snapshot("alice").expect("cache written");
    assert!(cached.items[0].checked);

    // the cache mirrors the live aggregate
    let live = client.snapshot();
    assert_eq!(live.items, cached.items);
    assert_eq!(live.category_usage, cached.category_usage);
    assert_eq!(live.user_history, cached.user_history);
}

#[tokio::test]
async fn logout_saves_state_then_resets_everything() {
    let server = MockServer::start().await;
    let (client, storage) = logged_in_client(&server).await;
    let mut events = client.take_events().expect("events");

    Mock::given(method("POST"))
        .and(path("/grocery/saveItem"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Item saved successfully"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/grocery/saveState"))
        .and(header("Authorization", "Bearer tok"))
        .and(body_partial_json(json!({
            "categoryUsage": {"Dairy": 1},
            "userHistory": [{"item": "Milk", "category": "Dairy"}]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"message": "State saved successfully"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    client.add_item("Milk", manual("Dairy")).expect("add");
    wait_for(&mut events, |e| matches!(e, ClientEvent::ItemSaved { .. })).await;

    client.logout().await;

    assert!(matches!(
        wait_for(&mut events, |e| matches!(
            e,
            ClientEvent::StateSaved | ClientEvent::LoggedOut
        ))
        .await,
        ClientEvent::StateSaved
    ));
    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::LoggedOut
    ));

    assert!(!client.is_authenticated());
    assert_eq!(client.username(), None);
    assert!(storage.get("authToken").is_none());
    assert!(storage.get("username").is_none());
    client.with_state(|s| {
        assert!(s.items().all().is_empty());
        assert_eq!(s.categories().all().len(), 15);
    });

    // the per-user cache outlives the session
    let cached = client.cached_snapshot("alice").expect("cache survives logout");
    assert_eq!(cached.items.len(), 1);
}

#[tokio::test]
async fn logout_clears_the_session_even_when_the_save_fails() {
    let server = MockServer::start().await;
    let (client, storage) = logged_in_client(&server).await;
    let mut events = client.take_events().expect("events");

    Mock::given(method("POST"))
        .and(path("/grocery/saveState"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "Server error"})))
        .mount(&server)
        .await;

    client.logout().await;

    assert!(matches!(
        wait_for(&mut events, |e| matches!(
            e,
            ClientEvent::SaveFailed { .. } | ClientEvent::LoggedOut
        ))
        .await,
        ClientEvent::SaveFailed { .. }
    ));
    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::LoggedOut
    ));
    assert!(!client.is_authenticated());
    assert!(storage.get("authToken").is_none());
}

#[tokio::test]
async fn logout_gives_up_on_a_save_that_takes_too_long() {
    let server = MockServer::start().await;
    mount_auth(&server).await;

    Mock::given(method("POST"))
        .and(path("/grocery/saveState"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"message": "State saved successfully"}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let options = ClientOptions::default().with_logout_save_timeout(Duration::from_millis(100));
    let client =
        GroceryClient::with_storage(&server.uri(), options, Arc::new(MemoryKvStore::new()));
    client.login("alice", "password123").await.expect("login");
    let mut events = client.take_events().expect("events");

    client.logout().await;

    let event = wait_for(&mut events, |e| {
        matches!(e, ClientEvent::SaveFailed { .. } | ClientEvent::StateSaved)
    })
    .await;
    assert!(matches!(event, ClientEvent::SaveFailed { reason } if reason.contains("timed out")));
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn explicit_save_posts_the_full_aggregate() {
    let server = MockServer::start().await;
    let (client, _storage) = logged_in_client(&server).await;

    Mock::given(method("POST"))
        .and(path("/grocery/saveItem"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Item saved successfully"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/grocery/saveState"))
        .and(body_partial_json(json!({
            "categoryUsage": {"Dairy": 1}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"message": "State saved successfully"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    client.add_item("Milk", manual("Dairy")).expect("add");
    client.save_state().await.expect("save");
}

#[tokio::test]
async fn explicit_save_surfaces_server_errors() {
    let server = MockServer::start().await;
    let (client, _storage) = logged_in_client(&server).await;

    Mock::given(method("POST"))
        .and(path("/grocery/saveState"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "Server error"})))
        .mount(&server)
        .await;

    let err = client.save_state().await.expect_err("500 save");
    assert_eq!(err.status_code(), Some(500));
}

#[tokio::test]
async fn saving_without_a_session_is_an_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/grocery/saveState"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let client = GroceryClient::new(&server.uri());
    assert!(matches!(client.save_state().await, Err(Error::Auth(_))));
}

#[tokio::test]
async fn sessions_survive_process_restarts_via_file_storage() {
    let server = MockServer::start().await;
    mount_auth(&server).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("client-store.json");

    {
        let storage = Arc::new(FileKvStore::open(&path));
        let client =
            GroceryClient::with_storage(&server.uri(), ClientOptions::default(), storage);
        client.login("alice", "password123").await.expect("login");
    }

    let storage = Arc::new(FileKvStore::open(&path));
    let client = GroceryClient::with_storage(&server.uri(), ClientOptions::default(), storage);

    let restored = client.restore_session().await;
    assert_eq!(restored.as_deref(), Some("alice"));
    assert!(client.is_authenticated());
}

#[tokio::test]
async fn events_before_the_receiver_is_taken_are_dropped() {
    let server = MockServer::start().await;
    let (client, _storage) = logged_in_client(&server).await;

    // login fired LoggedIn and StateLoaded with nobody listening
    let mut events = client.take_events().expect("events");

    Mock::given(method("POST"))
        .and(path("/grocery/saveItem"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Item saved successfully"})),
        )
        .mount(&server)
        .await;

    client.add_item("Milk", manual("Dairy")).expect("add");

    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::ItemSaved { name } if name == "Milk"
    ));
    assert!(events.try_recv().is_err());
    assert!(client.take_events().is_none());
}
