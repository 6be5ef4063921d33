//! Record managers for the six tables.
//!
//! Reference columns are select inputs over the parent table. Parent rows are
//! loaded once when the view is built; if that fails the select starts empty
//! and references render with a fallback label.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::warn;

use crate::backend::{Backend, Record};
use crate::cache::QueryCache;
use crate::manager::{Column, InputKind, ManagerConfig, RecordManager, SelectOption, display_value};
use crate::models::{Album, Comment, Entity, EntityKind, Photo, Post, Todo, User};
use crate::service::{RecordService, Service};

type Parents = Vec<(i64, String)>;

fn user_name(user: &User) -> &str {
    &user.name
}

fn post_title(post: &Post) -> &str {
    &post.title
}

fn album_title(album: &Album) -> &str {
    &album.title
}

async fn parent_labels<P: Entity>(backend: &Arc<dyn Backend>, label: fn(&P) -> &str) -> Parents {
    match Service::<P>::new(Arc::clone(backend)).get_all().await {
        Ok(rows) => rows.iter().map(|row| (row.id(), label(row).to_string())).collect(),
        Err(e) => {
            warn!("Error fetching {}: {e}", P::KIND);
            Vec::new()
        }
    }
}

fn id_column() -> Column {
    Column::new("id", "ID").input(InputKind::Number).hidden()
}

/// Select over `parents`, rendered as the parent's label or `"<fallback> <id>"`.
fn reference_column(key: &str, label: &str, fallback: &'static str, parents: &Parents) -> Column {
    let options = parents
        .iter()
        .map(|(id, name)| SelectOption::new(*id, name.clone()))
        .collect();
    let names: HashMap<i64, String> = parents.iter().cloned().collect();
    Column::new(key, label)
        .input(InputKind::Select(options))
        .render(move |value| {
            let id = value
                .as_i64()
                .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()));
            match id.and_then(|id| names.get(&id)) {
                Some(name) => name.clone(),
                None => format!("{fallback} {}", display_value(Some(value))),
            }
        })
}

fn first_id(parents: &Parents) -> i64 {
    parents.first().map(|(id, _)| *id).unwrap_or(1)
}

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

fn manager<E: Entity>(
    config: ManagerConfig,
    backend: Arc<dyn Backend>,
    cache: Arc<QueryCache>,
) -> RecordManager<E> {
    let service: Arc<dyn RecordService<E>> = Arc::new(Service::<E>::new(backend));
    RecordManager::new(config, service, cache)
}

fn website(value: &Value) -> String {
    let site = value.as_str().unwrap_or_default();
    if site.starts_with("http://") || site.starts_with("https://") {
        site.to_string()
    } else {
        format!("https://{site}")
    }
}

pub async fn users(backend: Arc<dyn Backend>, cache: Arc<QueryCache>) -> RecordManager<User> {
    let config = ManagerConfig::new(
        "Users",
        "Manage user profiles with contact and company information",
    )
    .column(id_column())
    .column(Column::new("name", "Full Name"))
    .column(
        Column::new("username", "Username")
            .render(|v| format!("@{}", v.as_str().unwrap_or_default())),
    )
    .column(Column::new("email", "Email").input(InputKind::Email))
    .column(Column::new("phone", "Phone"))
    // Plain text so bare domain names are accepted.
    .column(Column::new("website", "Website").render(website))
    .defaults(record(json!({
        "name": "",
        "username": "",
        "email": "",
        "phone": "",
        "website": "",
        "address": null,
        "company": null,
    })))
    .search_fields(["name", "username", "email"]);
    manager(config, backend, cache)
}

pub async fn posts(backend: Arc<dyn Backend>, cache: Arc<QueryCache>) -> RecordManager<Post> {
    let users = parent_labels(&backend, user_name).await;
    let config = ManagerConfig::new("Posts", "Manage blog posts with title and body content")
        .column(id_column())
        .column(reference_column("user_id", "User", "User", &users))
        .column(Column::new("title", "Title"))
        .column(Column::new("body", "Content").input(InputKind::TextArea))
        .defaults(record(json!({
            "user_id": first_id(&users),
            "title": "",
            "body": "",
        })))
        .search_fields(["title", "body"]);
    manager(config, backend, cache)
}

pub async fn comments(backend: Arc<dyn Backend>, cache: Arc<QueryCache>) -> RecordManager<Comment> {
    let posts = parent_labels(&backend, post_title).await;
    let config = ManagerConfig::new(
        "Comments",
        "Manage comments on posts with author information",
    )
    .column(id_column())
    .column(reference_column("post_id", "Post", "Post", &posts))
    .column(Column::new("name", "Author"))
    .column(Column::new("email", "Email").input(InputKind::Email))
    .column(Column::new("body", "Comment").input(InputKind::TextArea))
    .defaults(record(json!({
        "post_id": first_id(&posts),
        "name": "",
        "email": "",
        "body": "",
    })))
    .search_fields(["name", "email", "body"]);
    manager(config, backend, cache)
}

pub async fn albums(backend: Arc<dyn Backend>, cache: Arc<QueryCache>) -> RecordManager<Album> {
    let users = parent_labels(&backend, user_name).await;
    let config = ManagerConfig::new("Albums", "Manage photo albums organized by users")
        .column(id_column())
        .column(reference_column("user_id", "Owner", "User", &users))
        .column(Column::new("title", "Title"))
        .defaults(record(json!({
            "user_id": first_id(&users),
            "title": "",
        })))
        .search_fields(["title"]);
    manager(config, backend, cache)
}

pub async fn photos(backend: Arc<dyn Backend>, cache: Arc<QueryCache>) -> RecordManager<Photo> {
    let albums = parent_labels(&backend, album_title).await;
    let config = ManagerConfig::new(
        "Photos",
        "Manage individual photos with URLs and thumbnails",
    )
    .column(id_column())
    .column(reference_column("album_id", "Album", "Album", &albums))
    .column(Column::new("title", "Title"))
    .column(Column::new("url", "Image").input(InputKind::Url))
    .column(Column::new("thumbnail_url", "Thumbnail").input(InputKind::Url))
    .defaults(record(json!({
        "album_id": first_id(&albums),
        "title": "",
        "url": "",
        "thumbnail_url": "",
    })))
    .search_fields(["title"]);
    manager(config, backend, cache)
}

pub async fn todos(backend: Arc<dyn Backend>, cache: Arc<QueryCache>) -> RecordManager<Todo> {
    let users = parent_labels(&backend, user_name).await;
    let config = ManagerConfig::new("Todos", "Manage todo items with completion status")
        .column(id_column())
        .column(reference_column("user_id", "Assigned To", "User", &users))
        .column(Column::new("title", "Task"))
        .column(
            Column::new("completed", "Status")
                .input(InputKind::Boolean)
                .render(|v| {
                    if v.as_bool().unwrap_or(false) {
                        "Completed".to_string()
                    } else {
                        "Pending".to_string()
                    }
                }),
        )
        .defaults(record(json!({
            "user_id": first_id(&users),
            "title": "",
            "completed": false,
        })))
        .search_fields(["title"]);
    manager(config, backend, cache)
}

/// Rendered snapshot of one table, as a terminal front end prints it.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    /// `"Posts (12)"`
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub error: Option<String>,
    pub empty_message: String,
}

async fn snapshot<E: Entity>(mut manager: RecordManager<E>, term: &str) -> Listing {
    manager.load().await;
    manager.set_search(term);
    Listing {
        title: manager.title_count(),
        headers: manager.headers().into_iter().map(String::from).collect(),
        rows: manager.rows(),
        error: manager.load_error(),
        empty_message: manager.empty_message(),
    }
}

/// Loads the view for `kind` and renders its rows matching `term`.
pub async fn listing(
    kind: EntityKind,
    backend: Arc<dyn Backend>,
    cache: Arc<QueryCache>,
    term: &str,
) -> Listing {
    match kind {
        EntityKind::Users => snapshot(users(backend, cache).await, term).await,
        EntityKind::Posts => snapshot(posts(backend, cache).await, term).await,
        EntityKind::Comments => snapshot(comments(backend, cache).await, term).await,
        EntityKind::Albums => snapshot(albums(backend, cache).await, term).await,
        EntityKind::Photos => snapshot(photos(backend, cache).await, term).await,
        EntityKind::Todos => snapshot(todos(backend, cache).await, term).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::{FormTarget, Outcome, Widget};
    use crate::memory::MemoryBackend;
    use crate::models::{NewTodo, NewUser};

    async fn backend_with_users(names: &[&str]) -> (Arc<dyn Backend>, Vec<User>) {
        let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
        let drafts: Vec<NewUser> = names
            .iter()
            .map(|name| NewUser {
                name: name.to_string(),
                username: name.to_lowercase(),
                email: format!("{}@example.com", name.to_lowercase()),
                website: Some("hildegard.org".into()),
                ..Default::default()
            })
            .collect();
        let users = Service::<User>::new(backend.clone())
            .create_many(&drafts)
            .await
            .unwrap();
        (backend, users)
    }

    #[test]
    fn test_reference_fallback_label() {
        let column = reference_column("user_id", "User", "User", &vec![(3, "Ann".into())]);
        assert_eq!(column.display(Some(&json!(3))), "Ann");
        assert_eq!(column.display(Some(&json!(7))), "User 7");
        assert_eq!(column.display(Some(&json!("7"))), "User 7");
        assert_eq!(column.display(Some(&json!("3"))), "Ann");
    }

    #[test]
    fn test_website_prefix() {
        assert_eq!(website(&json!("example.com")), "https://example.com");
        assert_eq!(website(&json!("http://example.com")), "http://example.com");
    }

    #[tokio::test]
    async fn test_users_view_renders_and_searches() {
        let (backend, _) = backend_with_users(&["Leanne Graham", "Ervin Howell"]).await;
        let mut view = users(backend, Arc::new(QueryCache::new())).await;
        view.load().await;

        assert_eq!(
            view.headers(),
            vec!["ID", "Full Name", "Username", "Email", "Phone", "Website"]
        );
        let rows = view.rows();
        assert_eq!(rows[0][2], "@leanne graham");
        assert_eq!(rows[0][4], "-");
        assert_eq!(rows[0][5], "https://hildegard.org");

        view.set_search("ERVIN");
        assert_eq!(view.title_count(), "Users (1)");
    }

    #[tokio::test]
    async fn test_posts_view_defaults_to_first_user() {
        let (backend, users) = backend_with_users(&["Ann", "Bob"]).await;
        let mut view = posts(backend, Arc::new(QueryCache::new())).await;
        view.load().await;
        view.open_create();

        let fields = view.form_fields(FormTarget::Create);
        match &fields[0].widget {
            Widget::Dropdown { options, selected, .. } => {
                assert_eq!(options.len(), 2);
                assert_eq!(options[1].label, "Bob");
                assert_eq!(*selected, Some(0));
            }
            other => panic!("unexpected widget {other:?}"),
        }
        assert_eq!(
            view.create_form().unwrap().get("user_id"),
            Some(&json!(users[0].id))
        );
        assert_eq!(view.create_heading(), "Add Post");
        assert_eq!(view.create_prompt(), "Fill in the details to create a new post.");
    }

    #[tokio::test]
    async fn test_views_without_parents_default_to_one() {
        let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
        let mut view = albums(backend, Arc::new(QueryCache::new())).await;
        view.open_create();
        assert_eq!(view.create_form().unwrap().get("user_id"), Some(&json!(1)));
        assert!(view.form_fields(FormTarget::Create).iter().all(|f| !matches!(
            &f.widget,
            Widget::Dropdown { options, .. } if !options.is_empty()
        )));
    }

    #[tokio::test]
    async fn test_todos_view_status_and_toggle() {
        let (backend, users) = backend_with_users(&["Ann"]).await;
        Service::<Todo>::new(backend.clone())
            .create(&NewTodo {
                user_id: users[0].id,
                title: "water plants".into(),
                completed: false,
            })
            .await
            .unwrap();

        let mut view = todos(backend, Arc::new(QueryCache::new())).await;
        view.load().await;
        assert_eq!(view.rows()[0][1], "Ann");
        assert_eq!(view.rows()[0][3], "Pending");

        let id = view.visible()[0]["id"].as_i64().unwrap();
        view.begin_edit(id).unwrap();
        view.set_checked(FormTarget::Edit, "completed", true).unwrap();
        let todo = match view.submit_edit().await {
            Outcome::Applied(todo) => todo,
            other => panic!("edit failed: {other:?}"),
        };
        assert!(todo.completed);
        assert_eq!(view.rows()[0][3], "Completed");
        assert_eq!(view.edit_prompt(), "Update the details of this todo.");
    }

    #[tokio::test]
    async fn test_comments_and_photos_columns() {
        let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
        let cache = Arc::new(QueryCache::new());
        let comments = comments(backend.clone(), cache.clone()).await;
        assert_eq!(
            comments.headers(),
            vec!["ID", "Post", "Author", "Email", "Comment"]
        );
        let photos = photos(backend, cache).await;
        assert_eq!(
            photos.headers(),
            vec!["ID", "Album", "Title", "Image", "Thumbnail"]
        );
        assert_eq!(photos.empty_message(), "No photos found.");
    }

    #[tokio::test]
    async fn test_listing_snapshot() {
        let (backend, _) = backend_with_users(&["Ann", "Bob"]).await;
        let listing = listing(EntityKind::Users, backend, Arc::new(QueryCache::new()), "bob").await;
        assert_eq!(listing.title, "Users (1)");
        assert_eq!(listing.rows.len(), 1);
        assert_eq!(listing.rows[0][1], "Bob");
        assert_eq!(listing.error, None);
    }
}
