/// Integration tests for role changes, the last-admin guard and activation
mod common;

use common::{database::*, fixtures::*};
use pamana::{Error, Role};

#[actix_rt::test]
async fn test_sole_admin_cannot_be_demoted() {
    for (name, store) in all_stores().await {
        let w = World::new(store).await;

        let res = w
            .service
            .change_role(&w.admin, w.admin.id, Role::Student, Some(w.x.id))
            .await;
        assert!(matches!(res, Err(Error::CannotRemoveLastAdmin)), "{}", name);
        assert_eq!(
            res.unwrap_err().to_string(),
            "Cannot remove the last admin."
        );

        let admin = w.store.find_user(w.admin.id).await.unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin, "{}", name);
        assert_eq!(admin.course_id, None, "{}", name);
    }
}

#[actix_rt::test]
async fn test_promotion_derives_flags_and_clears_course() {
    let w = World::new(db_store().await).await;

    let promoted = w
        .service
        .change_role(&w.admin, w.student_a.id, Role::Admin, None)
        .await
        .unwrap();
    assert_eq!(promoted.role, Role::Admin);
    assert_eq!(promoted.course_id, None);
    assert!(promoted.first_name.is_empty() && promoted.last_name.is_empty());
    assert!(promoted.flags().is_staff && promoted.flags().is_superuser);

    // With two admins, either may now step down
    let demoted = w
        .service
        .change_role(&promoted, w.admin.id, Role::Moderator, Some(w.y.id))
        .await
        .unwrap();
    assert_eq!(demoted.role, Role::Moderator);
    assert_eq!(demoted.course_id, Some(w.y.id));
    assert!(demoted.flags().is_staff && !demoted.flags().is_superuser);

    // Now promoted is the last one
    let res = w
        .service
        .change_role(&promoted, promoted.id, Role::Student, Some(w.x.id))
        .await;
    assert!(matches!(res, Err(Error::CannotRemoveLastAdmin)));
}

#[actix_rt::test]
async fn test_moderator_keeps_course_when_made_student() {
    let w = World::new(db_store().await).await;
    let user = w
        .service
        .change_role(&w.admin, w.mod_x.id, Role::Student, None)
        .await
        .unwrap();
    assert_eq!(user.role, Role::Student);
    assert_eq!(user.course_id, Some(w.x.id));
    assert!(!user.flags().is_staff);
}

#[actix_rt::test]
async fn test_demoting_admin_needs_existing_course() {
    let w = World::new(db_store().await).await;
    let second = w
        .service
        .change_role(&w.admin, w.student_b.id, Role::Admin, None)
        .await
        .unwrap();

    let res = w.service.change_role(&w.admin, second.id, Role::Student, None).await;
    assert!(matches!(res, Err(Error::Validation(_))));

    let res = w.service.change_role(&w.admin, second.id, Role::Student, Some(777)).await;
    assert!(matches!(res, Err(Error::Validation(_))));
}

#[actix_rt::test]
async fn test_only_admins_change_roles() {
    let w = World::new(db_store().await).await;
    let res = w
        .service
        .change_role(&w.mod_x, w.student_a.id, Role::Moderator, None)
        .await;
    assert!(matches!(res, Err(Error::PermissionDenied(_))));

    let res = w.service.change_role(&w.admin, 4242, Role::Moderator, None).await;
    assert!(matches!(res, Err(Error::NotFound(_))));
}

#[actix_rt::test]
async fn test_last_active_admin_cannot_be_deactivated() {
    let w = World::new(db_store().await).await;

    let res = w.service.set_active(&w.admin, w.admin.id, false).await;
    assert!(matches!(res, Err(Error::CannotRemoveLastAdmin)));

    let user = w.service.set_active(&w.admin, w.student_a.id, false).await.unwrap();
    assert!(!user.is_active);

    // A deactivated account loses its authority
    let inactive = w.store.find_user(w.student_a.id).await.unwrap().unwrap();
    let res = w
        .service
        .upload_note(&inactive, note_form("Inactive upload", w.math_x.id, None))
        .await;
    assert!(matches!(res, Err(Error::PermissionDenied(_))));

    let user = w.service.set_active(&w.admin, w.student_a.id, true).await.unwrap();
    assert!(user.is_active);
}

/// Counts the admins among `ids` that are still active.
async fn active_admins(w: &World, ids: &[i32]) -> usize {
    let mut admins = 0;
    for id in ids {
        let user = w.store.find_user(*id).await.unwrap().unwrap();
        if user.is_admin() && user.is_active {
            admins += 1;
        }
    }
    admins
}

/// Runs both changes as separate tasks and returns `(succeeded, refused)`.
async fn race(
    first: impl std::future::Future<Output = pamana::Result<pamana::User>> + 'static,
    second: impl std::future::Future<Output = pamana::Result<pamana::User>> + 'static,
) -> (usize, usize) {
    let handles = vec![actix_rt::spawn(first), actix_rt::spawn(second)];

    let mut ok = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(Error::CannotRemoveLastAdmin) => refused += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    (ok, refused)
}

#[actix_rt::test]
async fn test_concurrent_demotions_leave_one_admin() {
    for (name, store) in all_stores().await {
        let w = World::new(store).await;
        let second = w
            .service
            .change_role(&w.admin, w.student_a.id, Role::Admin, None)
            .await
            .unwrap();

        let (service, actor, target, course_id) =
            (w.service.clone(), w.admin.clone(), second.id, w.x.id);
        let demote_second = async move {
            service
                .change_role(&actor, target, Role::Student, Some(course_id))
                .await
        };
        let (service, actor, target, course_id) =
            (w.service.clone(), second.clone(), w.admin.id, w.x.id);
        let demote_first = async move {
            service
                .change_role(&actor, target, Role::Student, Some(course_id))
                .await
        };

        assert_eq!(race(demote_second, demote_first).await, (1, 1), "{}", name);
        assert_eq!(active_admins(&w, &[w.admin.id, second.id]).await, 1, "{}", name);
    }
}

#[actix_rt::test]
async fn test_deactivation_racing_demotion_leaves_one_admin() {
    for (name, store) in all_stores().await {
        let w = World::new(store).await;
        let second = w
            .service
            .change_role(&w.admin, w.student_b.id, Role::Admin, None)
            .await
            .unwrap();

        let (service, actor, target) = (w.service.clone(), w.admin.clone(), second.id);
        let deactivate_second = async move { service.set_active(&actor, target, false).await };
        let (service, actor, target, course_id) =
            (w.service.clone(), second.clone(), w.admin.id, w.y.id);
        let demote_first = async move {
            service
                .change_role(&actor, target, Role::Moderator, Some(course_id))
                .await
        };

        assert_eq!(race(deactivate_second, demote_first).await, (1, 1), "{}", name);
        assert_eq!(active_admins(&w, &[w.admin.id, second.id]).await, 1, "{}", name);
    }
}
