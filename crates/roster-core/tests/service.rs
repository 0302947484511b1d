use std::path::Path;

use roster_core::{AttributeMap, ErrorKind, LogicalField, OfflineDirectory, Roster, RosterConfig};

const PEOPLE: &str = "ou=people,dc=example,dc=com";
const GROUPS: &str = "ou=groups,dc=example,dc=com";

fn fixture() -> OfflineDirectory {
    let path = Path::new(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../tests/fixtures/directory.ldif"
    ));
    OfflineDirectory::from_ldif_file(path).unwrap()
}

fn roster(dir: &OfflineDirectory) -> Roster<OfflineDirectory> {
    Roster::new(dir.clone(), AttributeMap::default(), PEOPLE, GROUPS)
}

fn ids(users: &[roster_core::UserRecord]) -> Vec<&str> {
    users.iter().map(|u| u.id()).collect()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_fixture_loads() {
    let dir = fixture();
    let group = dir
        .entry("cn=platform-admins,ou=groups,dc=example,dc=com")
        .unwrap();
    assert_eq!(group.object_classes(), vec!["top", "group"]);
    assert_eq!(group.values("member").unwrap().len(), 2);
}

#[tokio::test]
async fn test_empty_query_does_not_connect() {
    let dir = fixture();
    let roster = roster(&dir);

    assert!(roster.search_users("").await.unwrap().is_empty());
    assert!(roster.search_users("   ").await.unwrap().is_empty());
    assert!(roster.search_groups("\t").await.unwrap().is_empty());
    assert_eq!(dir.connect_count(), 0);
}

#[tokio::test]
async fn test_unquoted_term_is_substring() {
    let dir = fixture();
    let users = roster(&dir).search_users("bob").await.unwrap();
    assert_eq!(ids(&users), vec!["Bob Smith", "Bobby Tables"]);
    assert_eq!(dir.connect_count(), 1);
    assert_eq!(dir.search_count(), 1);
}

#[tokio::test]
async fn test_quoted_term_is_whole_word() {
    let dir = fixture();
    let users = roster(&dir).search_users("\"Bob\"").await.unwrap();
    assert_eq!(ids(&users), vec!["Bob Smith"]);

    let users = roster(&dir).search_users("\"bob\" platform").await.unwrap();
    assert_eq!(ids(&users), vec!["Bob Smith"]);
}

#[tokio::test]
async fn test_user_without_email_is_excluded() {
    let dir = fixture();
    let users = roster(&dir).search_users("engineer").await.unwrap();
    assert_eq!(ids(&users), vec!["Bob Smith"]);

    let users = roster(&dir).search_users("ghost").await.unwrap();
    assert!(users.is_empty());
}

#[tokio::test]
async fn test_user_record_fields() {
    let dir = fixture();
    let users = roster(&dir).search_users("jane").await.unwrap();
    assert_eq!(users.len(), 1);
    let jane = &users[0];
    assert_eq!(jane.email(), "jane.doe@example.com");
    assert_eq!(jane.get(LogicalField::JobTitle), "Manager");
    assert_eq!(jane.get(LogicalField::UidNumber), "1003");
    assert_eq!(jane.fields().len(), 6);
}

#[tokio::test]
async fn test_numeric_user_search_matches_uid_number() {
    let dir = fixture();
    let users = roster(&dir).search_users("1002").await.unwrap();
    assert_eq!(ids(&users), vec!["Bobby Tables"]);
}

#[tokio::test]
async fn test_filter_metacharacters_rejected_before_connect() {
    let dir = fixture();
    let roster = roster(&dir);

    for query in ["bob*", "a)(uid=*", "back\\slash", "(admin"] {
        let err = roster.search_users(query).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "query {:?}", query);
        let err = roster.search_groups(query).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "query {:?}", query);
    }
    assert_eq!(dir.connect_count(), 0);
}

#[tokio::test]
async fn test_posix_group_members_sorted() {
    let dir = fixture();
    let groups = roster(&dir).search_groups("engineering").await.unwrap();
    assert_eq!(groups.len(), 1);
    let eng = &groups[0];
    assert_eq!(eng.id, "engineering");
    assert_eq!(eng.name, "engineering");
    assert_eq!(eng.gid_number, Some(5000));
    assert_eq!(eng.description, "Engineering staff");
    assert_eq!(eng.members, strings(&["adams", "bsmith", "zoe"]));
}

#[tokio::test]
async fn test_ad_group_members_from_dns() {
    let dir = fixture();
    let groups = roster(&dir).search_groups("platform").await.unwrap();
    assert_eq!(groups.len(), 1);
    let admins = &groups[0];
    assert_eq!(admins.id, "platform-admins");
    assert_eq!(admins.gid_number, None);
    assert_eq!(admins.members, strings(&["Jane Doe"]));
}

#[tokio::test]
async fn test_group_search_numeric_and_quoted() {
    let dir = fixture();
    let roster = roster(&dir);

    let groups = roster.search_groups("5000").await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].id, "engineering");

    assert!(roster.search_groups("\"eng\"").await.unwrap().is_empty());

    let groups = roster.search_groups("\"ops\"").await.unwrap();
    assert_eq!(groups.len(), 1);
    assert!(groups[0].members.is_empty());
}

#[tokio::test]
async fn test_submit_membership_adds_and_reports_existing() {
    let dir = fixture();
    let roster = roster(&dir);

    let receipt = roster
        .submit_membership("engineering", &strings(&["jdoe", "bsmith"]))
        .await
        .unwrap();
    assert_eq!(receipt.group_id, "engineering");
    assert_eq!(receipt.group_dn, "cn=engineering,ou=groups,dc=example,dc=com");
    assert_eq!(receipt.added, strings(&["jdoe"]));
    assert_eq!(receipt.already_present, strings(&["bsmith"]));
    assert_eq!(dir.modify_count(), 2);

    let groups = roster.search_groups("\"engineering\"").await.unwrap();
    assert_eq!(groups[0].members, strings(&["adams", "bsmith", "jdoe", "zoe"]));
}

#[tokio::test]
async fn test_resubmit_is_idempotent() {
    let dir = fixture();
    let roster = roster(&dir);
    let users = strings(&["jdoe", "btables"]);

    roster.submit_membership("ops", &users).await.unwrap();
    let receipt = roster.submit_membership("ops", &users).await.unwrap();
    assert!(receipt.added.is_empty());
    assert_eq!(receipt.already_present, users);

    let ops = dir.entry("cn=ops,ou=groups,dc=example,dc=com").unwrap();
    assert_eq!(ops.values("memberUid").unwrap(), &users[..]);
}

#[tokio::test]
async fn test_submit_membership_unknown_group() {
    let dir = fixture();
    let err = roster(&dir)
        .submit_membership("nope", &strings(&["jdoe"]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(dir.connect_count(), 1);
    assert_eq!(dir.modify_count(), 0);
}

#[tokio::test]
async fn test_submit_membership_requires_posix_group() {
    let dir = fixture();
    let err = roster(&dir)
        .submit_membership("platform-admins", &strings(&["jdoe"]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(dir.modify_count(), 0);
}

#[tokio::test]
async fn test_submit_membership_validation() {
    let dir = fixture();
    let roster = roster(&dir);

    let err = roster
        .submit_membership("  ", &strings(&["jdoe"]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = roster.submit_membership("ops", &[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = roster
        .submit_membership("ops", &strings(&["", " "]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = roster
        .submit_membership("ops*", &strings(&["jdoe"]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert_eq!(dir.connect_count(), 0);
}

#[tokio::test]
async fn test_roster_from_config() {
    let config = RosterConfig::from_toml(&format!(
        "user_base_dn = \"{}\"\ngroup_base_dn = \"{}\"\nattributes = \"id:uid email:mail name:cn\"\n",
        PEOPLE, GROUPS
    ))
    .unwrap();
    let dir = fixture();
    let roster = Roster::from_config(dir.clone(), &config).unwrap();
    assert_eq!(roster.attributes().id_attribute(), "uid");

    let users = roster.search_users("jane").await.unwrap();
    assert_eq!(ids(&users), vec!["jdoe"]);
    assert_eq!(users[0].fields().len(), 3);

    // With `uid` as the id there is no alternate identifier, so groups are
    // identified by gidNumber when they have one.
    let groups = roster.search_groups("engineering").await.unwrap();
    assert_eq!(groups[0].id, "5000");
    assert_eq!(groups[0].name, "engineering");
}

#[tokio::test]
async fn test_preview_membership_splits_selection() {
    let dir = fixture();
    let split = roster(&dir)
        .preview_membership("engineering", &strings(&["jdoe", "bsmith", "jdoe"]))
        .await
        .unwrap();
    assert_eq!(split.members, strings(&["bsmith"]));
    assert_eq!(split.non_members, strings(&["jdoe"]));
    assert_eq!(dir.modify_count(), 0);
}

#[tokio::test]
async fn test_preview_membership_uses_submit_lookup() {
    let dir = fixture();
    let roster = roster(&dir);

    // Active Directory groups cannot be submitted to, so they cannot be
    // previewed either.
    let err = roster
        .preview_membership("platform-admins", &strings(&["jdoe"]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = roster
        .preview_membership("eng\"ineering", &strings(&["jdoe"]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = roster
        .preview_membership("ops)", &strings(&["jdoe"]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}
