// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn base_doc() -> RuleDoc {
    RuleDoc {
        id: "r1".to_owned(),
        name: None,
        title: None,
        desc: None,
        why: None,
        advice: None,
        enabled: true,
        log_source: LogSourceMatch::One("ssh".to_owned()),
        require: vec![],
        r#match: BTreeMap::new(),
        regex: BTreeMap::new(),
        group_by: vec![],
        window_sec: Some(60),
        threshold: Some(5),
        distinct_on: None,
        sequence: None,
        cooldown_sec: 0,
        dedup_key: "{rule_id}:{src_ip}".to_owned(),
        severity: Severity::Medium,
        tags: vec![],
    }
}

#[test]
fn window_rule_compiles() {
    let rule = Rule::from_doc(base_doc()).expect("valid window rule");
    match rule.kind {
        RuleKind::Window { window_sec, threshold, .. } => {
            assert_eq!(window_sec, 60);
            assert_eq!(threshold, 5);
        }
        RuleKind::Sequence(_) => panic!("expected window rule"),
    }
}

#[yare::parameterized(
    both_sequence_and_window = { |doc: &mut RuleDoc| {
        doc.sequence = Some(SequenceSpec { fail_count: 5, fail_within_sec: 300, success_within_sec: 60 });
    } },
    neither_sequence_nor_window = { |doc: &mut RuleDoc| {
        doc.window_sec = None;
        doc.threshold = None;
    } },
    zero_threshold = { |doc: &mut RuleDoc| { doc.threshold = Some(0); } },
    negative_cooldown = { |doc: &mut RuleDoc| { doc.cooldown_sec = -1; } },
    zero_window_sec = { |doc: &mut RuleDoc| { doc.window_sec = Some(0); } },
    invalid_regex = { |doc: &mut RuleDoc| { doc.regex.insert("path".to_owned(), "(unclosed".to_owned()); } },
    zero_fail_count = { |doc: &mut RuleDoc| {
        doc.window_sec = None;
        doc.threshold = None;
        doc.sequence = Some(SequenceSpec { fail_count: 0, fail_within_sec: 300, success_within_sec: 60 });
    } },
    empty_id = { |doc: &mut RuleDoc| { doc.id = String::new(); } },
)]
fn rejects_invalid_rule_document(mutate: impl FnOnce(&mut RuleDoc)) {
    let mut doc = base_doc();
    mutate(&mut doc);
    assert!(Rule::from_doc(doc).is_err());
}

#[test]
fn sequence_rule_compiles() {
    let mut doc = base_doc();
    doc.window_sec = None;
    doc.threshold = None;
    doc.sequence =
        Some(SequenceSpec { fail_count: 5, fail_within_sec: 300, success_within_sec: 60 });
    let rule = Rule::from_doc(doc).expect("valid sequence rule");
    assert!(matches!(rule.kind, RuleKind::Sequence(_)));
}

#[test]
fn catalog_iterates_enabled_only_in_id_order() {
    let mut a = base_doc();
    a.id = "b-rule".to_owned();
    let mut b = base_doc();
    b.id = "a-rule".to_owned();
    b.enabled = false;
    let mut c = base_doc();
    c.id = "c-rule".to_owned();

    let catalog = RuleCatalog::new(vec![
        Rule::from_doc(a).expect("valid"),
        Rule::from_doc(b).expect("valid"),
        Rule::from_doc(c).expect("valid"),
    ]);

    let ids: Vec<&str> = catalog.enabled_rules().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["b-rule", "c-rule"]);
    assert_eq!(catalog.len(), 3);
}

#[test]
fn log_source_match_handles_one_and_many() {
    let one = LogSourceMatch::One("ssh".to_owned());
    assert!(one.matches("ssh"));
    assert!(!one.matches("http"));

    let many = LogSourceMatch::Many(vec!["ssh".to_owned(), "http".to_owned()]);
    assert!(many.matches("http"));
    assert!(!many.matches("dns"));
}

#[test]
fn severity_falls_back_to_other_for_unknown_values() {
    assert_eq!(Severity::Other("weird".to_owned()).as_str(), "weird");
}
