/// Integration tests for registration and admin bootstrap
mod common;

use common::{database::*, fixtures::*};
use pamana::orm::profiles;
use pamana::store::{MemoryStore, NoteStore};
use pamana::user::RegistrationForm;
use pamana::{Error, NoteService, Role};
use sea_orm::EntityTrait;
use std::sync::Arc;

fn form(course_id: i32) -> RegistrationForm {
    RegistrationForm {
        school_id: "2024-1234-H".to_string(),
        email: "Juan.DelaCruz@Example.edu".to_string(),
        first_name: "Juan".to_string(),
        last_name: "Dela Cruz".to_string(),
        password: "correct horse".to_string(),
        confirm_password: "correct horse".to_string(),
        course_id,
    }
}

#[actix_rt::test]
async fn test_register_creates_student_with_profile() {
    let store = db_store().await;
    let service = NoteService::new(store.clone());
    let course = create_course(store.as_ref(), "BS Computer Science").await;

    let user = service.register(form(course.id)).await.unwrap();
    assert_eq!(user.role, Role::Student);
    assert_eq!(user.course_id, Some(course.id));
    assert_eq!(user.email, "juan.delacruz@example.edu");
    assert!(user.is_active);

    let profile = profiles::Entity::find_by_id(user.id)
        .one(store.connection())
        .await
        .unwrap();
    assert!(profile.is_some());
}

#[actix_rt::test]
async fn test_register_hashes_password() {
    let store = Arc::new(MemoryStore::new());
    let service = NoteService::new(store.clone());
    let course = create_course(store.as_ref(), "BS Nursing").await;

    let user = service.register(form(course.id)).await.unwrap();
    assert!(store.has_profile(user.id));
    let hash = store.password_hash(user.id).unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(!hash.contains("correct horse"));
}

#[actix_rt::test]
async fn test_duplicate_school_id_or_email_is_refused() {
    for (name, store) in all_stores().await {
        let service = NoteService::new(store.clone());
        let course = create_course(store.as_ref(), "BS Computer Science").await;
        service.register(form(course.id)).await.unwrap();

        let mut same_id = form(course.id);
        same_id.email = "other@example.edu".to_string();
        assert!(
            matches!(service.register(same_id).await, Err(Error::Validation(_))),
            "{}",
            name
        );

        let mut same_email = form(course.id);
        same_email.school_id = "2024-9999-H".to_string();
        same_email.email = "juan.delacruz@example.edu".to_string();
        assert!(
            matches!(service.register(same_email).await, Err(Error::Validation(_))),
            "{}",
            name
        );

        assert_eq!(store.count_users().await.unwrap(), 1, "{}", name);
    }
}

#[actix_rt::test]
async fn test_register_rejects_bad_input() {
    let store = db_store().await;
    let service = NoteService::new(store.clone());
    let course = create_course(store.as_ref(), "BS Computer Science").await;

    assert!(matches!(
        service.register(form(course.id + 100)).await,
        Err(Error::Validation(_))
    ));

    let mut mismatch = form(course.id);
    mismatch.confirm_password = "correct horse!".to_string();
    assert!(matches!(
        service.register(mismatch).await,
        Err(Error::Validation(_))
    ));

    let mut bad_id = form(course.id);
    bad_id.school_id = "20241234".to_string();
    assert!(matches!(
        service.register(bad_id).await,
        Err(Error::Validation(_))
    ));

    assert_eq!(store.count_users().await.unwrap(), 0);
}

#[actix_rt::test]
async fn test_bootstrap_admin_runs_once() {
    let store = db_store().await;
    let service = NoteService::new(store.clone());

    let admin = service
        .bootstrap_admin("0000-0001-H", "Admin@Example.edu", "a long password")
        .await
        .unwrap()
        .expect("First bootstrap should create an admin");
    assert_eq!(admin.role, Role::Admin);
    assert_eq!(admin.course_id, None);
    assert_eq!(admin.email, "admin@example.edu");
    assert!(admin.flags().is_superuser);

    let again = service
        .bootstrap_admin("0000-0002-H", "second@example.edu", "a long password")
        .await
        .unwrap();
    assert!(again.is_none());
    assert_eq!(store.count_users().await.unwrap(), 1);
}

#[actix_rt::test]
async fn test_bootstrap_admin_validates_input() {
    let store = db_store().await;
    let service = NoteService::new(store.clone());

    assert!(matches!(
        service.bootstrap_admin("admin", "admin@example.edu", "a long password").await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        service.bootstrap_admin("0000-0001-H", "not-an-email", "a long password").await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        service.bootstrap_admin("0000-0001-H", "admin@example.edu", "short").await,
        Err(Error::Validation(_))
    ));
    assert!(!store.any_admin().await.unwrap());
}

#[actix_rt::test]
async fn test_email_uniqueness_ignores_case_on_both_stores() {
    for (name, store) in all_stores().await {
        let new_user = |school_id: &str, email: &str| pamana::user::NewUser {
            school_id: school_id.to_string(),
            email: email.to_string(),
            first_name: "Ana".to_string(),
            last_name: "Reyes".to_string(),
            password_hash: "not-a-real-hash".to_string(),
            role: Role::Admin,
            course_id: None,
            created_at: minutes_ago(0),
        };

        let user = store
            .insert_user(new_user("0000-0001-H", " Ana.Reyes@Example.EDU "))
            .await
            .unwrap();
        assert_eq!(user.email, "ana.reyes@example.edu", "{}", name);

        let res = store
            .insert_user(new_user("0000-0002-H", "ana.reyes@example.edu"))
            .await;
        assert!(matches!(res, Err(Error::Validation(_))), "{}", name);
        assert_eq!(store.count_users().await.unwrap(), 1, "{}", name);
    }
}
