//! Integration tests for group membership reconciliation.

mod common;

use std::time::Duration;

use adsession_connector::error::DirectoryError;
use adsession_connector::memory::Modification;
use adsession_ldap::GetGroupArgs;
use common::*;

/// Group `G` with members `A` and `B`, plus users `C` and `D` outside it.
fn scenario_directory() -> DirectoryBuilder {
    DirectoryBuilder::new()
        .user("A")
        .user("B")
        .user("C")
        .user("D")
        .group("G", &["A", "B"])
}

/// Tests the reference scenario: one new member appended, one existing
/// member skipped, one write with the full list.
#[tokio::test]
async fn test_add_members_appends_new_and_skips_existing() {
    let directory = scenario_directory().build();
    let session = session(&directory);

    let added = session.add_group_members("G", ["C", "A"]).await.unwrap();

    assert_eq!(added, 1);
    assert_eq!(
        directory.modifications(),
        vec![Modification {
            dn: group_dn("G"),
            attribute: "member".to_string(),
            values: vec![user_dn("A"), user_dn("B"), user_dn("C")],
        }]
    );
}

/// Tests that appended DNs follow the caller's order, not lookup completion.
#[tokio::test]
async fn test_add_members_keeps_caller_order() {
    let directory = scenario_directory()
        .slow(user_filter("C"), Duration::from_millis(100))
        .build();
    let session = session(&directory);

    let added = session.add_group_members("G", ["C", "D"]).await.unwrap();

    assert_eq!(added, 2);
    let modifications = directory.modifications();
    assert_eq!(modifications.len(), 1);
    assert_eq!(
        modifications[0].values,
        vec![user_dn("A"), user_dn("B"), user_dn("C"), user_dn("D")]
    );
}

/// Tests that adding an existing member writes nothing.
#[tokio::test]
async fn test_add_existing_member_is_noop() {
    let logger = CaptureLogger::default();
    let directory = fixture_directory();
    let session = session(&directory).with_logger(logger.clone());

    let added = session.add_group_members("group1", ["user1"]).await.unwrap();

    assert_eq!(added, 0);
    assert!(directory.modifications().is_empty());
    assert!(logger.contains("already a member"));
}

/// Tests that unknown accounts are skipped without failing the call.
#[tokio::test]
async fn test_add_unknown_account_is_skipped() {
    let logger = CaptureLogger::default();
    let directory = fixture_directory();
    let session = session(&directory).with_logger(logger.clone());

    let added = session
        .add_group_members("group1", ["userFake"])
        .await
        .unwrap();
    assert_eq!(added, 0);
    assert!(directory.modifications().is_empty());
    assert!(logger.contains("'userFake'"));

    let added = session
        .add_group_members("group1", ["userFake", "userToAdd"])
        .await
        .unwrap();
    assert_eq!(added, 1);
    assert_eq!(
        directory.modifications()[0].values,
        vec![user_dn("user1"), user_dn("userToAdd")]
    );
}

/// Tests that a repeated candidate is added once.
#[tokio::test]
async fn test_add_repeated_candidate_counts_once() {
    let directory = scenario_directory().build();
    let session = session(&directory);

    let added = session
        .add_group_members("G", ["C", "C", "A", "C"])
        .await
        .unwrap();

    assert_eq!(added, 1);
    assert_eq!(
        directory.modifications()[0].values,
        vec![user_dn("A"), user_dn("B"), user_dn("C")]
    );
}

/// Tests that an empty candidate list writes nothing.
#[tokio::test]
async fn test_add_no_candidates() {
    let directory = scenario_directory().build();
    let session = session(&directory);

    let added = session
        .add_group_members("G", Vec::<String>::new())
        .await
        .unwrap();

    assert_eq!(added, 0);
    assert!(directory.modifications().is_empty());
}

/// Tests that a missing group is an error.
#[tokio::test]
async fn test_add_to_missing_group() {
    let directory = fixture_directory();
    let session = session(&directory);

    let err = session
        .add_group_members("groupFake", ["user1"])
        .await
        .unwrap_err();

    assert!(matches!(err, DirectoryError::NotFound { kind: "group", .. }));
    assert!(directory.modifications().is_empty());
}

/// Tests that a failing group lookup is propagated.
#[tokio::test]
async fn test_add_group_lookup_error() {
    let directory = fixture_directory();
    let session = session(&directory);

    let err = session
        .add_group_members("entryForErr", ["user1"])
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "OPERATION_FAILED");
    assert!(directory.modifications().is_empty());
}

/// Tests that one failed account lookup fails the whole call with no write.
#[tokio::test]
async fn test_add_account_lookup_error_aborts_without_write() {
    let directory = fixture_directory();
    let session = session(&directory);

    let err = session
        .add_group_members("group1", ["userToAdd", "entryForErr"])
        .await
        .unwrap_err();

    assert!(err.to_string().contains("failed to fetch account 'entryForErr'"));
    assert!(directory.modifications().is_empty());
}

/// Tests that an account identifier matching several users fails the call
/// with no write.
#[tokio::test]
async fn test_add_ambiguous_account_aborts_without_write() {
    let directory = fixture_directory();
    let session = session(&directory);

    let err = session
        .add_group_members("group1", ["notUniq", "userToAdd"])
        .await
        .unwrap_err();

    match err {
        DirectoryError::AmbiguousResult { count, .. } => assert_eq!(count, 2),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(directory.modifications().is_empty());
}

/// Tests that a hard failure does not wait for slow lookups.
#[tokio::test]
async fn test_lookup_error_aborts_pending_lookups() {
    let directory = scenario_directory()
        .slow(user_filter("C"), Duration::from_secs(30))
        .failing(user_filter("broken"))
        .build();
    let session = session(&directory);

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        session.add_group_members("G", ["C", "broken"]),
    )
    .await
    .expect("call returns without waiting for the slow lookup");

    assert!(result.is_err());
    assert!(directory.modifications().is_empty());
}

/// Tests removing a member.
#[tokio::test]
async fn test_remove_member() {
    let directory = scenario_directory().build();
    let session = session(&directory);

    let removed = session.remove_group_members("G", ["A"]).await.unwrap();

    assert_eq!(removed, 1);
    assert_eq!(
        directory.modifications(),
        vec![Modification {
            dn: group_dn("G"),
            attribute: "member".to_string(),
            values: vec![user_dn("B")],
        }]
    );

    // The stored group reflects the write.
    let group = directory.entry(&group_dn("G")).unwrap();
    assert_eq!(group.texts("member"), vec![user_dn("B").as_str()]);
}

/// Tests that removing a non-member writes nothing.
#[tokio::test]
async fn test_remove_non_member_is_noop() {
    let logger = CaptureLogger::default();
    let directory = fixture_directory();
    let session = session(&directory).with_logger(logger.clone());

    let removed = session
        .remove_group_members("group1", ["user2"])
        .await
        .unwrap();

    assert_eq!(removed, 0);
    assert!(directory.modifications().is_empty());
    assert!(logger.contains("isn't a member"));
}

/// Tests removing every member writes an empty list.
#[tokio::test]
async fn test_remove_all_members() {
    let directory = scenario_directory().build();
    let session = session(&directory);

    let removed = session
        .remove_group_members("G", ["B", "A", "D"])
        .await
        .unwrap();

    assert_eq!(removed, 2);
    assert_eq!(directory.modifications()[0].values, Vec::<String>::new());
}

/// Tests remove error paths mirror the add ones.
#[tokio::test]
async fn test_remove_errors() {
    let directory = fixture_directory();
    let session = session(&directory);

    let err = session
        .remove_group_members("groupFake", ["user1"])
        .await
        .unwrap_err();
    assert!(matches!(err, DirectoryError::NotFound { .. }));

    let err = session
        .remove_group_members("group1", ["user1", "entryForErr"])
        .await
        .unwrap_err();
    assert!(err.is_permanent());

    let removed = session
        .remove_group_members("group1", ["userFake"])
        .await
        .unwrap();
    assert_eq!(removed, 0);
    assert!(directory.modifications().is_empty());
}

/// Tests that a rejected write is returned and counts nothing.
#[tokio::test]
async fn test_failed_write_is_returned() {
    let directory = scenario_directory().build().with_failing_modify(group_dn("G"));
    let session = session(&directory);

    let err = session.add_group_members("G", ["C"]).await.unwrap_err();

    assert_eq!(err.error_code(), "OPERATION_FAILED");
    assert!(directory.modifications().is_empty());
}

/// Tests that a later lookup sees the members written by reconciliation.
#[tokio::test]
async fn test_add_then_read_back() {
    let directory = fixture_directory();
    let session = session(&directory);

    let added = session
        .add_group_members("group1", ["userToAdd", "user2"])
        .await
        .unwrap();
    assert_eq!(added, 2);

    let group = directory.entry(&group_dn("group1")).unwrap();
    assert_eq!(
        group.texts("member"),
        vec![
            user_dn("user1").as_str(),
            user_dn("userToAdd").as_str(),
            user_dn("user2").as_str()
        ]
    );

    // Member snapshots come from the members search, which the fixture
    // does not recompute from the written attribute.
    let snapshot = session
        .get_group(&GetGroupArgs::by_id("group1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.members_id(), Some(vec!["user1".to_string()]));
}
