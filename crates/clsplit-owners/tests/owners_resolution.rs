//! End-to-end ownership resolution over an on-disk rule tree.

use std::collections::HashMap;

use clsplit_owners::approval::{ApprovalStatus, files_approval_status};
use clsplit_owners::client::{LocalRuleClient, OwnersClient, validate_rules};
use clsplit_owners::index::{NoJitter, OwnersError};
use clsplit_owners::suggest::ReviewerSuggester;

fn write_tree(root: &std::path::Path, files: &[(&str, &str)]) {
    for (path, contents) in files {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, contents).unwrap();
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_resolution_against_disk() {
    let tmp = tempfile::tempdir().unwrap();
    write_tree(
        tmp.path(),
        &[
            ("OWNERS", "root@example.com\n"),
            ("net/OWNERS", "net@example.com\nset noparent\n"),
            ("ui/OWNERS", "ui@example.com\n"),
            ("ui/views/OWNERS", "views@example.com\n"),
        ],
    );

    let client = LocalRuleClient::from_root(tmp.path()).with_tie_breaker(NoJitter);

    let ranking = client.list_owners("ui/views/button.cc").unwrap();
    let owners: Vec<_> = ranking.owners().collect();
    assert_eq!(
        owners,
        vec!["views@example.com", "ui@example.com", "root@example.com"]
    );

    // noparent seals the net/ subtree off from the root owner.
    let ranking = client.list_owners("net/socket.cc").unwrap();
    assert_eq!(ranking.owners().collect::<Vec<_>>(), vec!["net@example.com"]);
}

#[test]
fn test_batch_resolution_matches_serial_on_disk() {
    let tmp = tempfile::tempdir().unwrap();
    write_tree(
        tmp.path(),
        &[
            ("OWNERS", "root@example.com\n"),
            ("a/OWNERS", "a@example.com\n"),
            ("b/OWNERS", "b@example.com\n"),
        ],
    );

    let client = LocalRuleClient::from_root(tmp.path())
        .with_tie_breaker(NoJitter)
        .with_batch_workers(4);

    let paths: Vec<String> = (0..20)
        .map(|i| format!("{}/file_{i}.cc", if i % 2 == 0 { "a" } else { "b" }))
        .collect();
    let batch = client.batch_list_owners(&paths).unwrap();
    for path in &paths {
        assert_eq!(batch[path], client.list_owners(path).unwrap());
    }
}

#[test]
fn test_approval_gating_flow() {
    let tmp = tempfile::tempdir().unwrap();
    write_tree(
        tmp.path(),
        &[(
            "OWNERS",
            "per-file approved.cc=approver@example.com\n\
             per-file reviewed.h=reviewer@example.com\n\
             missing@example.com\n",
        )],
    );

    let client = LocalRuleClient::from_root(tmp.path()).with_tie_breaker(NoJitter);
    let status = files_approval_status(
        &client,
        &strings(&["approved.cc", "reviewed.h"]),
        &strings(&["approver@example.com"]),
        &strings(&["approver@example.com", "reviewer@example.com"]),
    )
    .unwrap();

    assert_eq!(status["approved.cc"], ApprovalStatus::Approved);
    assert_eq!(status["reviewed.h"], ApprovalStatus::Pending);
}

#[test]
fn test_suggestion_respects_uncommitted_override() {
    // The working tree grants bob ownership, but the pinned committed
    // contents only know alice; suggestions follow the pinned state.
    let tmp = tempfile::tempdir().unwrap();
    write_tree(
        tmp.path(),
        &[("lib/OWNERS", "alice@example.com\nbob@example.com\n")],
    );

    let mut overrides = HashMap::new();
    overrides.insert("lib/OWNERS".to_string(), "alice@example.com\n".to_string());
    let client = LocalRuleClient::with_overrides(tmp.path(), overrides)
        .with_tie_breaker(NoJitter);

    let suggestion = ReviewerSuggester::new(&client)
        .suggest_owners(&strings(&["lib/a.rs", "lib/b.rs"]))
        .unwrap();
    assert_eq!(suggestion.owners, vec!["alice@example.com"]);
}

#[test]
fn test_malformed_tree_fails_resolution_but_lints_fully() {
    let tmp = tempfile::tempdir().unwrap();
    write_tree(
        tmp.path(),
        &[
            ("ok/OWNERS", "fine@example.com\n"),
            ("broken/OWNERS", "fine@example.com\nnot a rule\n"),
        ],
    );

    let client = LocalRuleClient::from_root(tmp.path()).with_tie_breaker(NoJitter);
    let err = client.list_owners("broken/file.cc").unwrap_err();
    assert!(matches!(err, OwnersError::InvalidConfig(_)));

    let findings = validate_rules(tmp.path()).unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].path, "broken/OWNERS");
    assert_eq!(findings[0].line, 2);
}
