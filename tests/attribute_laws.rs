//! Property tests for attribute-set union and filter composition.

use std::sync::Arc;

use crucible::attributes::{unite, AttrInstance, Attribute, AttributeSet};
use crucible::filters::{AttrFilterGroup, AttrFilterSet, CombinedFilter, NameFilter, Verdict};
use crucible::suite::TestName;
use once_cell::sync::Lazy;
use proptest::prelude::*;

static ATTRIBUTES: Lazy<Vec<Arc<Attribute>>> = Lazy::new(|| {
    vec![
        Attribute::list("area"),
        Attribute::list("owner"),
        Attribute::scalar("tier"),
        Attribute::list("tags"),
    ]
});

fn instance_strategy() -> impl Strategy<Value = AttrInstance> {
    (
        0..ATTRIBUTES.len(),
        prop::collection::btree_set("[a-d]", 0..3),
    )
        .prop_map(|(index, values)| AttrInstance::new(&ATTRIBUTES[index], values))
}

fn set_strategy() -> impl Strategy<Value = AttributeSet> {
    prop::collection::vec(instance_strategy(), 0..4).prop_map(AttributeSet::from_iter)
}

fn group_strategy() -> impl Strategy<Value = AttrFilterGroup> {
    let clauses = prop::collection::vec(
        (0..ATTRIBUTES.len(), prop::option::of("[a-d]"), any::<bool>()),
        1..3,
    );
    (clauses, any::<bool>()).prop_map(|(clauses, skip)| {
        let text = clauses
            .into_iter()
            .map(|(index, value, negated)| {
                let name = ATTRIBUTES[index].name();
                let bang = if negated { "!" } else { "" };
                match value {
                    Some(value) => format!("{bang}{name}={value}"),
                    None => format!("{bang}{name}"),
                }
            })
            .collect::<Vec<_>>()
            .join(",");
        let action = if skip {
            crucible::filters::GroupAction::Skip
        } else {
            crucible::filters::GroupAction::Run
        };
        AttrFilterGroup::parse(&text, action).unwrap()
    })
}

fn name() -> TestName {
    TestName {
        suites: vec!["laws".to_string()],
        test: "subject".to_string(),
        id: 0,
    }
}

proptest! {
    #[test]
    fn unite_is_associative(a in set_strategy(), b in set_strategy(), c in set_strategy()) {
        let left = unite(&unite(&a, &b).unwrap(), &c).unwrap();
        let right = unite(&a, &unite(&b, &c).unwrap()).unwrap();
        prop_assert_eq!(left, right);
    }

    #[test]
    fn empty_set_is_the_identity(a in set_strategy()) {
        let empty = AttributeSet::new();
        prop_assert_eq!(&unite(&a, &empty).unwrap(), &a);
        prop_assert_eq!(&unite(&empty, &a).unwrap(), &a);
    }

    #[test]
    fn union_keeps_every_name(a in set_strategy(), b in set_strategy()) {
        let united = unite(&a, &b).unwrap();
        for instance in a.iter().chain(b.iter()) {
            prop_assert!(united.contains(instance.name()));
        }
        let names: Vec<&str> = united.iter().map(AttrInstance::name).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        sorted.dedup();
        prop_assert_eq!(names, sorted);
    }

    #[test]
    fn a_name_miss_always_hides(
        attrs in set_strategy(),
        groups in prop::collection::vec(group_strategy(), 0..4),
    ) {
        let filter = CombinedFilter::new(
            NameFilter::from_patterns(["^nothing$"]).unwrap(),
            groups.into_iter().collect::<AttrFilterSet>(),
        );
        prop_assert_eq!(filter.verdict_for(&name(), &attrs), Verdict::Hide);
    }

    #[test]
    fn combined_verdict_is_never_indeterminate(
        attrs in set_strategy(),
        groups in prop::collection::vec(group_strategy(), 0..4),
    ) {
        let filter = CombinedFilter::new(
            NameFilter::new(),
            groups.into_iter().collect::<AttrFilterSet>(),
        );
        prop_assert!(!filter.verdict_for(&name(), &attrs).is_indeterminate());
    }
}
