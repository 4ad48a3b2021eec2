use newsniche::models::{
    CategoryRef, CreateCategory, CreatePost, Language, PostStatus, Session, UpdateCategory,
    UpdatePost, User, UserRole,
};
use newsniche::services::posts::{self, ListQuery, PostRules};
use newsniche::services::search::{SearchEngine, SearchRequest};
use newsniche::services::slug::SlugResolver;
use newsniche::services::{auth, categories, sitemap, tags, ContentError};
use newsniche::Database;
use rusqlite::Connection;
use uuid::Uuid;

fn create_test_db() -> Database {
    let db = Database::open_memory().expect("Failed to create test database");
    db.migrate().expect("Failed to run migrations");
    db
}

const TEST_PASSWORD: &str = "secret123";

fn body(topic: &str) -> String {
    format!(
        "<p>This is a long enough article body about {}. It keeps going so that the minimum content length is comfortably met by every test post.</p>",
        topic
    )
}

fn new_post(title: &str, category: Uuid, status: PostStatus) -> CreatePost {
    CreatePost {
        title: title.to_string(),
        content: body(title),
        excerpt: format!("Excerpt for {}", title),
        category: category.to_string(),
        tags: Vec::new(),
        featured_image: "https://example.com/cover.jpg".to_string(),
        status,
        is_featured: false,
        seo_title: None,
        seo_description: None,
        seo_keywords: None,
        affiliate_links: Vec::new(),
        content_images: Vec::new(),
    }
}

fn session_for(user: User) -> Session {
    Session {
        user,
        token: "test-token".to_string(),
    }
}

struct Fixture {
    db: Database,
    admin: User,
    category: Uuid,
}

impl Fixture {
    fn new() -> Self {
        let db = create_test_db();
        let (admin, category) = {
            let conn = db.get().unwrap();
            let admin = auth::register(&conn, "Admin", "admin@example.com", TEST_PASSWORD).unwrap();
            let category = categories::create_category(
                &conn,
                CreateCategory {
                    name: "Technology".to_string(),
                    description: None,
                    language: Language::En,
                },
                &SlugResolver::default(),
            )
            .unwrap();
            (admin, category.id)
        };
        Self {
            db,
            admin,
            category,
        }
    }

    fn conn(&self) -> newsniche::db::PooledConnection {
        self.db.get().unwrap()
    }

    fn publish(&self, conn: &Connection, title: &str) -> newsniche::models::Post {
        posts::create_post(
            conn,
            new_post(title, self.category, PostStatus::Published),
            self.admin.id,
            &PostRules::default(),
        )
        .unwrap()
    }
}

fn content_error(err: &anyhow::Error) -> &ContentError {
    err.downcast_ref::<ContentError>()
        .unwrap_or_else(|| panic!("expected ContentError, got {err:?}"))
}

mod auth_integration_tests {
    use super::*;

    #[test]
    fn test_first_user_is_admin_then_users() {
        let db = create_test_db();
        let conn = db.get().unwrap();

        let first = auth::register(&conn, "First", "first@example.com", TEST_PASSWORD).unwrap();
        let second = auth::register(&conn, "Second", "second@example.com", TEST_PASSWORD).unwrap();

        assert_eq!(first.role, UserRole::Admin);
        assert_eq!(second.role, UserRole::User);
    }

    #[test]
    fn test_email_is_normalized_and_unique() {
        let db = create_test_db();
        let conn = db.get().unwrap();

        let user = auth::register(&conn, "Rahim", "  Rahim@Example.COM ", TEST_PASSWORD).unwrap();
        assert_eq!(user.email, "rahim@example.com");

        let err = auth::register(&conn, "Other", "rahim@example.com", TEST_PASSWORD).unwrap_err();
        assert!(matches!(content_error(&err), ContentError::Conflict(_)));
    }

    #[test]
    fn test_short_password_rejected() {
        let db = create_test_db();
        let conn = db.get().unwrap();

        let err = auth::register(&conn, "Rahim", "rahim@example.com", "12345").unwrap_err();
        assert!(matches!(content_error(&err), ContentError::Validation(_)));
        assert!(!auth::has_users(&conn).unwrap());
    }

    #[test]
    fn test_login_and_validate_session() {
        let db = create_test_db();
        let conn = db.get().unwrap();
        auth::register(&conn, "Rahim", "rahim@example.com", TEST_PASSWORD).unwrap();

        let session = auth::login(&conn, "RAHIM@example.com", TEST_PASSWORD, 7)
            .unwrap()
            .expect("login should succeed");
        assert!(session.user.last_login.is_some());

        let validated = auth::validate_session(&conn, &session.token)
            .unwrap()
            .expect("session should be valid");
        assert_eq!(validated.user.id, session.user.id);

        auth::delete_session(&conn, &session.token).unwrap();
        assert!(auth::validate_session(&conn, &session.token).unwrap().is_none());
    }

    #[test]
    fn test_login_wrong_password() {
        let db = create_test_db();
        let conn = db.get().unwrap();
        auth::register(&conn, "Rahim", "rahim@example.com", TEST_PASSWORD).unwrap();

        assert!(auth::login(&conn, "rahim@example.com", "wrongpass", 7)
            .unwrap()
            .is_none());
        assert!(auth::login(&conn, "nobody@example.com", TEST_PASSWORD, 7)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_inactive_user_cannot_login() {
        let db = create_test_db();
        let conn = db.get().unwrap();
        let user = auth::register(&conn, "Rahim", "rahim@example.com", TEST_PASSWORD).unwrap();
        conn.execute(
            "UPDATE users SET is_active = 0 WHERE id = ?",
            [user.id.to_string()],
        )
        .unwrap();

        assert!(auth::login(&conn, "rahim@example.com", TEST_PASSWORD, 7)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_expired_sessions_are_invalid_and_cleaned() {
        let db = create_test_db();
        let conn = db.get().unwrap();
        let user = auth::register(&conn, "Rahim", "rahim@example.com", TEST_PASSWORD).unwrap();
        let token = auth::create_session(&conn, user.id, -1).unwrap();

        assert!(auth::validate_session(&conn, &token).unwrap().is_none());
        assert_eq!(auth::cleanup_expired_sessions(&conn).unwrap(), 1);
    }

    #[test]
    fn test_update_password() {
        let db = create_test_db();
        let conn = db.get().unwrap();
        auth::register(&conn, "Rahim", "rahim@example.com", TEST_PASSWORD).unwrap();

        assert!(auth::update_password(&conn, "rahim@example.com", "newsecret").unwrap());
        assert!(auth::authenticate(&conn, "rahim@example.com", TEST_PASSWORD)
            .unwrap()
            .is_none());
        assert!(auth::authenticate(&conn, "rahim@example.com", "newsecret")
            .unwrap()
            .is_some());
        assert!(!auth::update_password(&conn, "nobody@example.com", "newsecret").unwrap());
    }
}

mod category_integration_tests {
    use super::*;

    fn create(
        conn: &Connection,
        name: &str,
        language: Language,
    ) -> anyhow::Result<newsniche::models::Category> {
        categories::create_category(
            conn,
            CreateCategory {
                name: name.to_string(),
                description: Some("desc".to_string()),
                language,
            },
            &SlugResolver::default(),
        )
    }

    #[test]
    fn test_category_slugs_resolve_collisions() {
        let db = create_test_db();
        let conn = db.get().unwrap();

        let en = create(&conn, "News", Language::En).unwrap();
        let bn = create(&conn, "News", Language::Bn).unwrap();
        assert_eq!(en.slug, "news");
        assert_eq!(bn.slug, "news-1");
    }

    #[test]
    fn test_duplicate_name_in_language_conflicts() {
        let db = create_test_db();
        let conn = db.get().unwrap();

        create(&conn, "খেলা", Language::Bn).unwrap();
        let err = create(&conn, "খেলা", Language::Bn).unwrap_err();
        assert!(matches!(content_error(&err), ContentError::Conflict(_)));
    }

    #[test]
    fn test_symbol_name_gets_prefixed_slug() {
        let db = create_test_db();
        let conn = db.get().unwrap();

        let category = create(&conn, "★★★", Language::En).unwrap();
        assert!(category.slug.starts_with("category-"));
    }

    #[test]
    fn test_update_keeps_or_reresolves_slug() {
        let db = create_test_db();
        let conn = db.get().unwrap();
        let resolver = SlugResolver::default();

        let category = create(&conn, "Travel", Language::En).unwrap();
        create(&conn, "Food", Language::En).unwrap();

        let same = categories::update_category(
            &conn,
            category.id,
            UpdateCategory {
                name: Some("TRAVEL".to_string()),
                ..UpdateCategory::default()
            },
            &resolver,
        )
        .unwrap();
        assert_eq!(same.slug, "travel");

        let renamed = categories::update_category(
            &conn,
            category.id,
            UpdateCategory {
                name: Some("Food".to_string()),
                language: Some(Language::Bn),
                ..UpdateCategory::default()
            },
            &resolver,
        )
        .unwrap();
        assert_eq!(renamed.slug, "food-1");
        assert_eq!(
            categories::get_category_by_slug(&conn, "food-1").unwrap().map(|c| c.id),
            Some(category.id)
        );
    }

    #[test]
    fn test_list_filters_by_language() {
        let db = create_test_db();
        let conn = db.get().unwrap();
        create(&conn, "Zeta", Language::En).unwrap();
        create(&conn, "Alpha", Language::En).unwrap();
        create(&conn, "বিজ্ঞান", Language::Bn).unwrap();

        let all = categories::list_categories(&conn, None).unwrap();
        assert_eq!(all.len(), 3);
        let english: Vec<_> = categories::list_categories(&conn, Some(Language::En))
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(english, vec!["Alpha", "Zeta"]);
    }

    #[test]
    fn test_delete_refused_while_in_use() {
        let fx = Fixture::new();
        let conn = fx.conn();
        fx.publish(&conn, "Attached");

        let err = categories::delete_category(&conn, fx.category).unwrap_err();
        assert!(matches!(content_error(&err), ContentError::Conflict(_)));

        let empty = create(&conn, "Empty", Language::En).unwrap();
        categories::delete_category(&conn, empty.id).unwrap();
        assert!(categories::get_category(&conn, empty.id).unwrap().is_none());
    }
}

mod post_integration_tests {
    use super::*;
    use newsniche::services::slug::{SlugCheck, SlugKind, TableSlugs, SLUG_CONFLICT_RETRIES};
    use std::cell::Cell;

    #[test]
    fn test_create_post_derives_fields() {
        let fx = Fixture::new();
        let conn = fx.conn();

        let mut input = new_post("আমার প্রথম Post 2024!", fx.category, PostStatus::Published);
        input.tags = vec![" rust ".to_string(), "বাংলা".to_string(), "rust".to_string()];
        input.content.push_str("<script>alert('x')</script>");
        let post = posts::create_post(&conn, input, fx.admin.id, &PostRules::default()).unwrap();

        assert_eq!(post.slug, "আমার-প্রথম-post-2024");
        assert_eq!(post.tags, vec!["rust", "বাংলা"]);
        assert_eq!(post.seo_title.as_deref(), Some("আমার প্রথম Post 2024!"));
        assert_eq!(post.seo_description.as_deref(), Some(post.excerpt.as_str()));
        assert_eq!(post.seo_keywords, post.tags);
        assert!(post.published_at.is_some());
        assert!(!post.content.contains("<script>"));
        assert_eq!(post.read_time, 1);
        assert_eq!(post.author.as_ref().map(|a| a.id), Some(fx.admin.id));
        match &post.category {
            CategoryRef::Resolved(category) => assert_eq!(category.name, "Technology"),
            CategoryRef::Unresolved(_) => panic!("category should be joined"),
        }
    }

    #[test]
    fn test_draft_has_no_publish_date() {
        let fx = Fixture::new();
        let conn = fx.conn();
        let post = posts::create_post(
            &conn,
            new_post("Draft", fx.category, PostStatus::Draft),
            fx.admin.id,
            &PostRules::default(),
        )
        .unwrap();
        assert!(post.published_at.is_none());
    }

    #[test]
    fn test_colliding_titles_get_suffixes() {
        let fx = Fixture::new();
        let conn = fx.conn();

        let first = fx.publish(&conn, "Foo");
        let second = fx.publish(&conn, "foo");
        let third = fx.publish(&conn, "FOO!");

        assert_eq!(first.slug, "foo");
        assert_eq!(second.slug, "foo-1");
        assert_eq!(third.slug, "foo-2");
    }

    #[test]
    fn test_create_validation() {
        let fx = Fixture::new();
        let conn = fx.conn();
        let rules = PostRules::default();

        let mut short = new_post("Short", fx.category, PostStatus::Draft);
        short.content = "too short".to_string();
        let err = posts::create_post(&conn, short, fx.admin.id, &rules).unwrap_err();
        assert!(matches!(content_error(&err), ContentError::Validation(_)));

        let bad_category = CreatePost {
            category: "not-a-uuid".to_string(),
            ..new_post("Bad", fx.category, PostStatus::Draft)
        };
        let err = posts::create_post(&conn, bad_category, fx.admin.id, &rules).unwrap_err();
        assert!(matches!(content_error(&err), ContentError::Validation(_)));

        let missing_category = new_post("Missing", Uuid::new_v4(), PostStatus::Draft);
        let err = posts::create_post(&conn, missing_category, fx.admin.id, &rules).unwrap_err();
        assert!(matches!(content_error(&err), ContentError::Validation(_)));

        let mut no_title = new_post("x", fx.category, PostStatus::Draft);
        no_title.title = "   ".to_string();
        let err = posts::create_post(&conn, no_title, fx.admin.id, &rules).unwrap_err();
        assert!(matches!(content_error(&err), ContentError::Validation(_)));
    }

    #[test]
    fn test_update_same_title_keeps_slug() {
        let fx = Fixture::new();
        let conn = fx.conn();
        let post = fx.publish(&conn, "Hello World");
        let session = session_for(fx.admin.clone());

        let updated = posts::update_post(
            &conn,
            post.id,
            UpdatePost {
                title: Some("HELLO WORLD".to_string()),
                ..UpdatePost::default()
            },
            &session,
            &PostRules::default(),
        )
        .unwrap();
        assert_eq!(updated.slug, "hello-world");
        assert_eq!(updated.title, "HELLO WORLD");
    }

    #[test]
    fn test_update_new_title_reresolves_slug() {
        let fx = Fixture::new();
        let conn = fx.conn();
        fx.publish(&conn, "Taken");
        let post = fx.publish(&conn, "Original");
        let session = session_for(fx.admin.clone());

        let updated = posts::update_post(
            &conn,
            post.id,
            UpdatePost {
                title: Some("Taken".to_string()),
                ..UpdatePost::default()
            },
            &session,
            &PostRules::default(),
        )
        .unwrap();
        assert_eq!(updated.slug, "taken-1");
    }

    #[test]
    fn test_update_without_title_leaves_slug() {
        let fx = Fixture::new();
        let conn = fx.conn();
        let post = fx.publish(&conn, "Stable");
        let session = session_for(fx.admin.clone());

        let updated = posts::update_post(
            &conn,
            post.id,
            UpdatePost {
                excerpt: Some("A new excerpt".to_string()),
                tags: Some(vec!["one".to_string()]),
                ..UpdatePost::default()
            },
            &session,
            &PostRules::default(),
        )
        .unwrap();
        assert_eq!(updated.slug, "stable");
        assert_eq!(updated.excerpt, "A new excerpt");
        assert_eq!(updated.tags, vec!["one"]);
    }

    #[test]
    fn test_publishing_sets_publish_date_once() {
        let fx = Fixture::new();
        let conn = fx.conn();
        let session = session_for(fx.admin.clone());
        let rules = PostRules::default();
        let draft = posts::create_post(
            &conn,
            new_post("Later", fx.category, PostStatus::Draft),
            fx.admin.id,
            &rules,
        )
        .unwrap();

        let publish = UpdatePost {
            status: Some(PostStatus::Published),
            ..UpdatePost::default()
        };
        let published = posts::update_post(&conn, draft.id, publish.clone(), &session, &rules).unwrap();
        let first_date = published.published_at.clone().expect("publish date set");

        let again = posts::update_post(&conn, draft.id, publish, &session, &rules).unwrap();
        assert_eq!(again.published_at, Some(first_date));
    }

    #[test]
    fn test_only_author_or_admin_may_modify() {
        let fx = Fixture::new();
        let conn = fx.conn();
        let post = fx.publish(&conn, "Guarded");
        let stranger =
            auth::register(&conn, "Stranger", "stranger@example.com", TEST_PASSWORD).unwrap();
        let session = session_for(stranger);

        let err = posts::update_post(
            &conn,
            post.id,
            UpdatePost {
                title: Some("Hijacked".to_string()),
                ..UpdatePost::default()
            },
            &session,
            &PostRules::default(),
        )
        .unwrap_err();
        assert!(matches!(content_error(&err), ContentError::Forbidden));

        let err = posts::delete_post(&conn, post.id, &session).unwrap_err();
        assert!(matches!(content_error(&err), ContentError::Forbidden));

        posts::delete_post(&conn, post.id, &session_for(fx.admin.clone())).unwrap();
        assert!(posts::get_post(&conn, post.id).unwrap().is_none());
    }

    #[test]
    fn test_get_by_slug_counts_views() {
        let fx = Fixture::new();
        let conn = fx.conn();
        fx.publish(&conn, "Popular");

        posts::get_post_by_slug(&conn, "popular").unwrap().unwrap();
        let post = posts::get_post_by_slug(&conn, "popular").unwrap().unwrap();
        assert_eq!(post.view_count, 2);

        assert!(posts::get_post_by_slug(&conn, "missing").unwrap().is_none());
        let err = posts::get_post_by_slug(&conn, "p").unwrap_err();
        assert!(matches!(content_error(&err), ContentError::Validation(_)));
    }

    #[test]
    fn test_unique_index_backs_the_resolver() {
        let fx = Fixture::new();
        let conn = fx.conn();
        let post = fx.publish(&conn, "Unique");
        let other = fx.publish(&conn, "Other");

        let result = conn.execute(
            "UPDATE posts SET slug = ? WHERE id = ?",
            (&post.slug, other.id.to_string()),
        );
        let err = anyhow::Error::from(result.unwrap_err());
        assert!(newsniche::db::is_unique_violation(&err, "posts", "slug"));
    }

    fn stale_check(_: &str, _: Option<Uuid>) -> anyhow::Result<bool> {
        Ok(false)
    }

    #[test]
    fn test_slug_write_gives_up_after_repeated_races() {
        let fx = Fixture::new();
        let conn = fx.conn();
        fx.publish(&conn, "Race");
        let other = fx.publish(&conn, "Other");

        let mut attempts = 0;
        let err = SlugResolver::default()
            .write_with_slug("Race", SlugKind::Post, &stale_check, None, |slug| {
                attempts += 1;
                conn.execute(
                    "UPDATE posts SET slug = ? WHERE id = ?",
                    (slug, other.id.to_string()),
                )?;
                Ok(())
            })
            .unwrap_err();

        assert_eq!(attempts, SLUG_CONFLICT_RETRIES);
        assert!(matches!(content_error(&err), ContentError::Conflict(_)));
        assert_eq!(posts::get_post(&conn, other.id).unwrap().unwrap().slug, "other");
    }

    #[test]
    fn test_slug_write_recovers_after_one_race() {
        let fx = Fixture::new();
        let conn = fx.conn();
        fx.publish(&conn, "Race");
        let other = fx.publish(&conn, "Other");

        // The first answer is out of date, later ones come from the table.
        let answered = Cell::new(false);
        let check = |candidate: &str, exclude: Option<Uuid>| {
            if !answered.replace(true) {
                return Ok(false);
            }
            TableSlugs::posts(&conn).slug_exists(candidate, exclude)
        };

        let mut attempts = 0;
        let slug = SlugResolver::default()
            .write_with_slug("Race", SlugKind::Post, &check, Some(other.id), |slug| {
                attempts += 1;
                conn.execute(
                    "UPDATE posts SET slug = ? WHERE id = ?",
                    (slug, other.id.to_string()),
                )?;
                Ok(slug.to_string())
            })
            .unwrap();

        assert_eq!(attempts, 2);
        assert_eq!(slug, "race-1");
        assert_eq!(posts::get_post(&conn, other.id).unwrap().unwrap().slug, "race-1");
    }

    #[test]
    fn test_publish_date_must_be_rfc3339() {
        let fx = Fixture::new();
        let conn = fx.conn();
        let session = session_for(fx.admin.clone());
        let post = fx.publish(&conn, "Dated");

        let err = posts::update_post(
            &conn,
            post.id,
            UpdatePost {
                published_at: Some("not-a-date".to_string()),
                ..UpdatePost::default()
            },
            &session,
            &PostRules::default(),
        )
        .unwrap_err();
        assert!(matches!(content_error(&err), ContentError::Validation(_)));
        assert_eq!(
            posts::get_post(&conn, post.id).unwrap().unwrap().published_at,
            post.published_at
        );

        let updated = posts::update_post(
            &conn,
            post.id,
            UpdatePost {
                published_at: Some("2024-03-05T10:00:00+06:00".to_string()),
                ..UpdatePost::default()
            },
            &session,
            &PostRules::default(),
        )
        .unwrap();
        assert_eq!(
            updated.published_at.as_deref(),
            Some("2024-03-05T04:00:00.000Z")
        );
    }

    #[test]
    fn test_corrupt_rows_fail_to_load() {
        let fx = Fixture::new();
        let conn = fx.conn();
        let bad_status = fx.publish(&conn, "Bad Status");
        let bad_json = fx.publish(&conn, "Bad Json");

        conn.execute(
            "UPDATE posts SET status = 'retracted' WHERE id = ?",
            [bad_status.id.to_string()],
        )
        .unwrap();
        conn.execute(
            "UPDATE posts SET seo_keywords = '{broken' WHERE id = ?",
            [bad_json.id.to_string()],
        )
        .unwrap();

        let err = posts::get_post(&conn, bad_status.id).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::FromSqlConversionFailure(..))
        ));
        let err = posts::get_post(&conn, bad_json.id).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::FromSqlConversionFailure(..))
        ));
    }

    #[test]
    fn test_list_posts_filters_and_paginates() {
        let fx = Fixture::new();
        let conn = fx.conn();
        let rules = PostRules::default();

        for i in 0..12 {
            let mut input = new_post(&format!("Post {}", i), fx.category, PostStatus::Published);
            if i % 3 == 0 {
                input.tags = vec!["rust".to_string()];
            }
            posts::create_post(&conn, input, fx.admin.id, &rules).unwrap();
        }
        posts::create_post(
            &conn,
            new_post("Hidden draft", fx.category, PostStatus::Draft),
            fx.admin.id,
            &rules,
        )
        .unwrap();

        let page = posts::list_posts(&*conn, &ListQuery::default(), 10, 100).unwrap();
        assert_eq!(page.pagination.total_posts, 12);
        assert_eq!(page.pagination.total_pages, 2);
        assert_eq!(page.posts.len(), 10);
        assert!(page.pagination.has_next_page);

        let second = posts::list_posts(
            &*conn,
            &ListQuery {
                page: Some(2),
                ..ListQuery::default()
            },
            10,
            100,
        )
        .unwrap();
        assert_eq!(second.posts.len(), 2);
        assert!(second.pagination.has_prev_page);

        let tagged = posts::list_posts(
            &*conn,
            &ListQuery {
                tag: Some("rust".to_string()),
                ..ListQuery::default()
            },
            10,
            100,
        )
        .unwrap();
        assert_eq!(tagged.pagination.total_posts, 4);

        let all = posts::list_posts(
            &*conn,
            &ListQuery {
                status: Some("all".to_string()),
                ..ListQuery::default()
            },
            10,
            100,
        )
        .unwrap();
        assert_eq!(all.pagination.total_posts, 13);

        let err = posts::list_posts(
            &*conn,
            &ListQuery {
                category: Some("nope".to_string()),
                ..ListQuery::default()
            },
            10,
            100,
        )
        .unwrap_err();
        assert!(matches!(content_error(&err), ContentError::Validation(_)));
    }

    #[test]
    fn test_fix_slugs_repairs_blank_slugs() {
        let fx = Fixture::new();
        let conn = fx.conn();
        let broken = fx.publish(&conn, "Needs Repair");
        let healthy = fx.publish(&conn, "Healthy");
        conn.execute(
            "UPDATE posts SET slug = '-' WHERE id = ?",
            [broken.id.to_string()],
        )
        .unwrap();

        let repairs = posts::fix_slugs(&conn, &PostRules::default()).unwrap();
        assert_eq!(repairs.len(), 1);
        assert_eq!(repairs[0].id, broken.id);
        assert_eq!(repairs[0].old_slug, "-");
        assert_eq!(repairs[0].new_slug, "needs-repair");

        let again = posts::fix_slugs(&conn, &PostRules::default()).unwrap();
        assert!(again.is_empty());
        assert_eq!(
            posts::get_post(&conn, healthy.id).unwrap().unwrap().slug,
            "healthy"
        );
    }
}

mod search_integration_tests {
    use super::*;

    fn search(conn: &Connection, term: &str) -> newsniche::services::search::SearchPage {
        SearchEngine::default()
            .search(
                conn,
                &SearchRequest {
                    term: term.to_string(),
                    ..SearchRequest::default()
                },
            )
            .unwrap()
    }

    #[test]
    fn test_search_matches_title_content_excerpt_and_tags() {
        let fx = Fixture::new();
        let conn = fx.conn();
        let rules = PostRules::default();

        fx.publish(&conn, "Rust ownership explained");
        let mut tagged = new_post("Something else", fx.category, PostStatus::Published);
        tagged.tags = vec!["Tokio".to_string()];
        posts::create_post(&conn, tagged, fx.admin.id, &rules).unwrap();

        assert_eq!(search(&conn, "OWNERSHIP").total, 1);
        assert_eq!(search(&conn, "tokio").total, 1);
        assert_eq!(search(&conn, "tok").total, 0);
        assert_eq!(search(&conn, "article body").total, 2);
        assert_eq!(search(&conn, "zzzz").total, 0);
    }

    #[test]
    fn test_search_bengali_and_highlight() {
        let fx = Fixture::new();
        let conn = fx.conn();
        fx.publish(&conn, "আমার সোনার বাংলা");

        let page = search(&conn, "সোনার");
        assert_eq!(page.total, 1);
        assert_eq!(
            page.posts[0].title,
            "আমার <mark class=\"bg-yellow-200\">সোনার</mark> বাংলা"
        );
        assert_eq!(page.posts[0].slug, "আমার-সোনার-বাংলা");
    }

    #[test]
    fn test_search_literal_metacharacters() {
        let fx = Fixture::new();
        let conn = fx.conn();
        fx.publish(&conn, "Modern C++ tips");
        fx.publish(&conn, "Plain C tips");

        let page = search(&conn, "C++");
        assert_eq!(page.total, 1);
        assert!(page.posts[0].title.contains("<mark class=\"bg-yellow-200\">C++</mark>"));
    }

    #[test]
    fn test_search_status_and_category_filters() {
        let fx = Fixture::new();
        let conn = fx.conn();
        fx.publish(&conn, "Visible guide");
        posts::create_post(
            &conn,
            new_post("Draft guide", fx.category, PostStatus::Draft),
            fx.admin.id,
            &PostRules::default(),
        )
        .unwrap();

        assert_eq!(search(&conn, "guide").total, 1);

        let engine = SearchEngine::default();
        let all = engine
            .search(
                &*conn,
                &SearchRequest {
                    term: "guide".to_string(),
                    status: Some("all".to_string()),
                    ..SearchRequest::default()
                },
            )
            .unwrap();
        assert_eq!(all.total, 2);

        let drafts = engine
            .search(
                &*conn,
                &SearchRequest {
                    term: "guide".to_string(),
                    status: Some("draft".to_string()),
                    ..SearchRequest::default()
                },
            )
            .unwrap();
        assert_eq!(drafts.total, 1);

        let other_category = engine
            .search(
                &*conn,
                &SearchRequest {
                    term: "guide".to_string(),
                    category: Some(Uuid::new_v4().to_string()),
                    ..SearchRequest::default()
                },
            )
            .unwrap();
        assert_eq!(other_category.total, 0);
    }

    #[test]
    fn test_far_page_returns_nothing() {
        let fx = Fixture::new();
        let conn = fx.conn();
        for title in ["First story", "Second story", "Third story"] {
            fx.publish(&conn, title);
        }

        let page = SearchEngine::default()
            .search(
                &*conn,
                &SearchRequest {
                    term: "story".to_string(),
                    page: Some(1_000_000_000_000_000_000),
                    page_size: Some(10),
                    ..SearchRequest::default()
                },
            )
            .unwrap();
        assert_eq!(page.total, 3);
        assert!(page.posts.is_empty());
        assert!(!page.has_next_page);

        let list = posts::list_posts(
            &*conn,
            &ListQuery {
                page: Some(i64::MAX),
                ..ListQuery::default()
            },
            10,
            100,
        )
        .unwrap();
        assert_eq!(list.pagination.total_posts, 3);
        assert!(list.posts.is_empty());
    }

    #[test]
    fn test_search_orders_by_publish_date() {
        let fx = Fixture::new();
        let conn = fx.conn();
        let older = fx.publish(&conn, "Ordering one");
        let newer = fx.publish(&conn, "Ordering two");
        conn.execute(
            "UPDATE posts SET published_at = '2020-01-01T00:00:00.000Z' WHERE id = ?",
            [older.id.to_string()],
        )
        .unwrap();

        let page = search(&conn, "ordering");
        let ids: Vec<_> = page.posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }
}

mod tag_and_sitemap_integration_tests {
    use super::*;

    #[test]
    fn test_tag_counts_only_published() {
        let fx = Fixture::new();
        let conn = fx.conn();
        let rules = PostRules::default();

        for (title, status) in [
            ("One", PostStatus::Published),
            ("Two", PostStatus::Published),
            ("Three", PostStatus::Draft),
        ] {
            let mut input = new_post(title, fx.category, status);
            input.tags = vec!["news".to_string()];
            if title == "One" {
                input.tags.push("featured".to_string());
            }
            posts::create_post(&conn, input, fx.admin.id, &rules).unwrap();
        }

        let counts = tags::list_tags_with_counts(&conn).unwrap();
        assert_eq!(counts[0].name, "news");
        assert_eq!(counts[0].count, 2);
        assert_eq!(counts[1].name, "featured");
        assert_eq!(counts[1].count, 1);

        assert_eq!(tags::suggest_tags(&conn, "EW", 10).unwrap(), vec!["news"]);
    }

    #[test]
    fn test_suggestions_skip_draft_only_tags() {
        let fx = Fixture::new();
        let conn = fx.conn();
        let rules = PostRules::default();

        let mut draft = new_post("Unreleased", fx.category, PostStatus::Draft);
        draft.tags = vec!["secret launch".to_string(), "shared".to_string()];
        posts::create_post(&conn, draft, fx.admin.id, &rules).unwrap();
        let mut public = new_post("Released", fx.category, PostStatus::Published);
        public.tags = vec!["shared".to_string()];
        posts::create_post(&conn, public, fx.admin.id, &rules).unwrap();

        assert!(tags::suggest_tags(&conn, "secret", 10).unwrap().is_empty());
        assert_eq!(tags::suggest_tags(&conn, "sha", 10).unwrap(), vec!["shared"]);
    }

    #[test]
    fn test_sitemap_lists_public_pages() {
        let fx = Fixture::new();
        let conn = fx.conn();
        fx.publish(&conn, "Mapped Post");
        posts::create_post(
            &conn,
            new_post("Secret Draft", fx.category, PostStatus::Draft),
            fx.admin.id,
            &PostRules::default(),
        )
        .unwrap();

        let base = url::Url::parse("https://example.com").unwrap();
        let xml = sitemap::generate_sitemap(&conn, &base).unwrap();

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<loc>https://example.com/</loc>"));
        assert!(xml.contains("<loc>https://example.com/blog/mapped-post</loc>"));
        assert!(xml.contains("<loc>https://example.com/blog/category/technology</loc>"));
        assert!(!xml.contains("secret-draft"));

        let robots = sitemap::generate_robots(&base).unwrap();
        assert!(robots.contains("Sitemap: https://example.com/sitemap.xml"));
        assert!(robots.contains("Disallow: /admin/"));
    }
}

mod http_integration_tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use newsniche::web::{app, AppState};
    use newsniche::Config;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const CONFIG: &str = r#"
[site]
title = "NewsNiche"
description = "Test site"
url = "https://example.com"

[database]
path = ":memory:"
"#;

    fn test_app() -> (Router, Database) {
        let config: Config = toml::from_str(CONFIG).unwrap();
        let db = create_test_db();
        let state = AppState::new(config, db.clone()).unwrap();
        (app(Arc::new(state)), db)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(app: &Router, email: &str) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": "Writer", "email": email, "password": TEST_PASSWORD })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_and_security_headers() {
        let (app, _db) = test_app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get(header::X_FRAME_OPTIONS).unwrap(), "DENY");
    }

    #[tokio::test]
    async fn test_auth_flow() {
        let (app, _db) = test_app();
        let token = register(&app, "admin@example.com").await;

        let (status, me) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], "admin@example.com");
        assert_eq!(me["role"], "admin");
        assert!(me.get("passwordHash").is_none());

        let (status, _) = send(&app, Method::GET, "/api/auth/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "admin@example.com", "password": TEST_PASSWORD })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let login_token = body["token"].as_str().unwrap().to_string();

        let (status, _) =
            send(&app, Method::POST, "/api/auth/logout", Some(&login_token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, Method::GET, "/api/auth/me", Some(&login_token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_rate_limited() {
        let (app, _db) = test_app();
        register(&app, "admin@example.com").await;

        for _ in 0..5 {
            let (status, _) = send(
                &app,
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": "admin@example.com", "password": "wrong-password" })),
            )
            .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "admin@example.com", "password": TEST_PASSWORD })),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_post_lifecycle_over_http() {
        let (app, _db) = test_app();
        let admin = register(&app, "admin@example.com").await;

        let (status, category) = send(
            &app,
            Method::POST,
            "/api/categories",
            Some(&admin),
            Some(json!({ "name": "প্রযুক্তি", "language": "bn" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(category["slug"], "প্রযুক্তি");
        let category_id = category["id"].as_str().unwrap().to_string();

        let post_body = json!({
            "title": "My Blogging Journey",
            "content": body("blogging"),
            "excerpt": "How I started a blog",
            "category": category_id,
            "featuredImage": "https://example.com/cover.jpg",
            "tags": ["life"],
            "status": "published",
        });
        let (status, post) =
            send(&app, Method::POST, "/api/posts", Some(&admin), Some(post_body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(post["slug"], "my-blogging-journey");
        assert_eq!(post["category"]["slug"], "প্রযুক্তি");

        let (status, second) =
            send(&app, Method::POST, "/api/posts", Some(&admin), Some(post_body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(second["slug"], "my-blogging-journey-1");

        let (status, page) =
            send(&app, Method::GET, "/api/posts/search?q=blog&limit=1&page=2", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 2);
        assert_eq!(page["totalPages"], 2);
        assert_eq!(page["hasNextPage"], false);
        assert_eq!(page["hasPrevPage"], true);
        assert_eq!(page["posts"].as_array().unwrap().len(), 1);
        assert!(page["posts"][0]["title"]
            .as_str()
            .unwrap()
            .contains("<mark class=\"bg-yellow-200\">Blog</mark>ging"));

        let id = post["id"].as_str().unwrap();
        let (status, patched) = send(
            &app,
            Method::PATCH,
            &format!("/api/posts/{}", id),
            Some(&admin),
            Some(json!({ "title": "A Different Title" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(patched["slug"], "a-different-title");

        let (status, fetched) =
            send(&app, Method::GET, "/api/posts/slug/a-different-title", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["viewCount"], 1);

        let (status, list) = send(&app, Method::GET, "/api/posts?limit=abc", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["pagination"]["totalPosts"], 2);

        let (status, _) =
            send(&app, Method::DELETE, &format!("/api/posts/{}", id), Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, Method::GET, &format!("/api/posts/{}", id), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_search_error_statuses() {
        let (app, _db) = test_app();

        let (status, page) = send(&app, Method::GET, "/api/posts/search?q=a", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 0);
        assert_eq!(page["posts"], json!([]));

        let (status, body) = send(
            &app,
            Method::GET,
            "/api/posts/search?q=rust&category=bogus",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid category ID");

        let (status, _) = send(
            &app,
            Method::GET,
            "/api/posts/search?q=rust&status=deleted",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_role_checks() {
        let (app, _db) = test_app();
        let admin = register(&app, "admin@example.com").await;
        let reader = register(&app, "reader@example.com").await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/categories",
            Some(&reader),
            Some(json!({ "name": "Nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, Method::POST, "/api/fix-slugs", Some(&reader), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&app, Method::POST, "/api/fix-slugs", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fixed"], json!([]));

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/categories",
            Some(&admin),
            Some(json!({ "name": "Dup", "language": "en" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/categories",
            Some(&admin),
            Some(json!({ "name": "Dup", "language": "en" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_sitemap_and_robots() {
        let (app, _db) = test_app();

        let response = app
            .clone()
            .oneshot(Request::get("/sitemap.xml").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/xml"
        );

        let response = app
            .oneshot(Request::get("/robots.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("Sitemap: https://example.com/sitemap.xml"));
    }
}
