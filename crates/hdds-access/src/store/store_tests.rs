// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

    use super::*;
    use crate::model::{AccessLevel, Mode};

    fn topic_access(name: &str, mode: Mode) -> TopicAccess {
        TopicAccess {
            name: Some(name.to_string()),
            mode,
            ..TopicAccess::default()
        }
    }

    fn names(store: &RuleStore, parent: RuleParent) -> Vec<Option<String>> {
        store
            .topics(parent)
            .unwrap()
            .iter()
            .map(|r| r.name().map(str::to_string))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Handles
    // -----------------------------------------------------------------------
    #[test]
    fn test_handles_are_unique_and_never_zero() {
        let mut store = RuleStore::default();
        let d1 = store.add_domain().unwrap();
        let d2 = store.add_domain().unwrap();
        let p1 = store.add_participant().unwrap();
        assert_ne!(d1, 0);
        assert_ne!(d1, d2);
        assert_ne!(p1, 0);

        store.remove_domain(d2).unwrap();
        let d3 = store.add_domain().unwrap();
        assert_ne!(d3, d2, "handles are never reused");
    }

    #[test]
    fn test_stale_handles_are_not_found() {
        let mut store = RuleStore::default();
        let d = store.add_domain().unwrap();
        store.remove_domain(d).unwrap();

        assert!(store.domain(d).unwrap_err().is_not_found());
        assert!(store
            .set_domain_access(d, DomainAccess::default())
            .unwrap_err()
            .is_not_found());
        assert!(store
            .add_topic(RuleParent::Domain(d))
            .unwrap_err()
            .is_not_found());
        assert!(store.participant(42).unwrap_err().is_not_found());
    }

    #[test]
    fn test_domain_handle_space_is_bounded() {
        let mut store = RuleStore::default();
        store.next_domain = MAX_ENTITY_HANDLE;
        assert_eq!(store.add_domain().unwrap(), MAX_ENTITY_HANDLE);
        assert!(matches!(
            store.add_domain(),
            Err(AccessError::OutOfResources(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Domains
    // -----------------------------------------------------------------------
    #[test]
    fn test_remove_domain_requires_empty_lists() {
        let mut store = RuleStore::default();
        let d = store.add_domain().unwrap();
        let t = store.add_topic(RuleParent::Domain(d)).unwrap();

        let err = store.remove_domain(d).unwrap_err();
        assert!(matches!(err, AccessError::PreconditionNotMet(_)));

        store.remove_topic(RuleParent::Domain(d), t).unwrap();
        store.remove_domain(d).unwrap();
        assert!(store.domain(d).is_err());
    }

    #[test]
    fn test_remove_domain_cascade() {
        let mut store = RuleStore::default();
        let d = store.add_domain().unwrap();
        let t = store.add_topic(RuleParent::Domain(d)).unwrap();
        store.add_partition(RuleParent::Domain(d)).unwrap();

        store.remove_domain_cascade(d).unwrap();
        assert!(store.domain(d).is_err());
        assert!(store.topic_by_handle(t).is_none());
        assert!(store.partitions.rules.is_empty());
    }

    #[test]
    fn test_find_domain_prefers_exact_id() {
        let mut store = RuleStore::default();
        let any = store.add_domain().unwrap();
        let five = store.add_domain().unwrap();
        store
            .set_domain_access(
                five,
                DomainAccess {
                    domain_id: 5,
                    ..DomainAccess::default()
                },
            )
            .unwrap();

        assert_eq!(store.find_domain(5), Some(five));
        assert_eq!(store.find_domain(6), Some(any));
        assert_eq!(store.find_domain_exact(6), None);
    }

    // -----------------------------------------------------------------------
    // Placeholder rule
    // -----------------------------------------------------------------------
    #[test]
    fn test_new_domain_holds_only_placeholder() {
        let mut store = RuleStore::default();
        let d = store.add_domain().unwrap();
        let topics = store.topics(RuleParent::Domain(d)).unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].handle(), 0);
        assert_eq!(topics[0].mode(), Mode::ALL);
    }

    #[test]
    fn test_first_add_replaces_placeholder() {
        let mut store = RuleStore::default();
        let d = store.add_domain().unwrap();
        let parent = RuleParent::Domain(d);
        let t = store.add_topic(parent).unwrap();

        let list = store.rule_list(parent, RuleKind::Topic).unwrap();
        assert!(!list.is_implicit());
        assert_eq!(list.handles(), &[t]);
        // The partition list is untouched
        assert!(store
            .rule_list(parent, RuleKind::Partition)
            .unwrap()
            .is_implicit());
    }

    // -----------------------------------------------------------------------
    // Precedence ordering
    // -----------------------------------------------------------------------
    #[test]
    fn test_exact_rule_moves_ahead_of_wildcard() {
        let mut store = RuleStore::default();
        let d = store.add_domain().unwrap();
        let parent = RuleParent::Domain(d);

        let wild = store.add_topic(parent).unwrap();
        store
            .set_topic_access(parent, wild, topic_access("data.*", Mode::READ))
            .unwrap();
        let exact = store.add_topic(parent).unwrap();
        store
            .set_topic_access(parent, exact, topic_access("data.secret", Mode::NONE))
            .unwrap();
        let other = store.add_topic(parent).unwrap();
        store
            .set_topic_access(parent, other, topic_access("misc.?", Mode::READ))
            .unwrap();

        assert_eq!(
            names(&store, parent),
            vec![
                Some("data.secret".to_string()),
                Some("data.*".to_string()),
                Some("misc.?".to_string()),
            ]
        );
    }

    #[test]
    fn test_unnamed_rule_stays_in_place() {
        let mut store = RuleStore::default();
        let d = store.add_domain().unwrap();
        let parent = RuleParent::Domain(d);
        let first = store.add_topic(parent).unwrap();
        let second = store.add_topic(parent).unwrap();
        store
            .set_topic_access(parent, second, TopicAccess::default())
            .unwrap();
        assert_eq!(
            store.rule_list(parent, RuleKind::Topic).unwrap().handles(),
            &[first, second]
        );
    }

    // -----------------------------------------------------------------------
    // Refreshed flags
    // -----------------------------------------------------------------------
    #[test]
    fn test_set_access_marks_rule_and_parent_refreshed() {
        let mut store = RuleStore::default();
        let p = store.add_participant().unwrap();
        let parent = RuleParent::Participant(p);
        let t = store.add_partition(parent).unwrap();

        store.participant_mut(p).unwrap().refreshed = false;
        store.partitions.rules.get_mut(&t).unwrap().refreshed = false;

        store
            .set_partition_access(
                parent,
                t,
                PartitionAccess {
                    name: Some("p1".into()),
                    mode: Mode::WRITE,
                    ..PartitionAccess::default()
                },
            )
            .unwrap();

        assert!(store.participant(p).unwrap().is_refreshed());
        assert!(store.partition(parent, t).unwrap().is_refreshed());
    }

    // -----------------------------------------------------------------------
    // Participants
    // -----------------------------------------------------------------------
    #[test]
    fn test_participant_by_name_first_in_store_order() {
        let mut store = RuleStore::default();
        let a = store.add_participant().unwrap();
        let b = store.add_participant().unwrap();
        for h in [a, b] {
            store
                .set_participant_access(
                    h,
                    ParticipantAccess {
                        name: "dev-*".into(),
                        level: AccessLevel::Secret,
                        blacklist: false,
                    },
                )
                .unwrap();
        }
        assert_eq!(store.participant_by_name("dev-*"), Some(a));
        assert_eq!(store.participant_by_name("dev-42"), None);
    }

    #[test]
    fn test_remove_participant_cascades_rules() {
        let mut store = RuleStore::default();
        let p = store.add_participant().unwrap();
        let t = store.add_topic(RuleParent::Participant(p)).unwrap();

        let removed = store.remove_participant(p).unwrap();
        assert_eq!(removed.handle(), p);
        assert!(store.participant(p).unwrap_err().is_not_found());
        assert!(store.topic_by_handle(t).is_none());
    }

    #[test]
    fn test_set_access_rejected_on_clone() {
        let mut store = RuleStore::default();
        let template = store.add_participant().unwrap();
        let clone = store
            .insert_participant(ParticipantKind::Clone(template))
            .unwrap();
        let err = store
            .set_participant_access(clone, ParticipantAccess::default())
            .unwrap_err();
        assert!(matches!(err, AccessError::PreconditionNotMet(_)));
    }

    // -----------------------------------------------------------------------
    // Rules are scoped to their parent
    // -----------------------------------------------------------------------
    #[test]
    fn test_rule_lookup_requires_matching_parent() {
        let mut store = RuleStore::default();
        let d1 = store.add_domain().unwrap();
        let d2 = store.add_domain().unwrap();
        let t = store.add_topic(RuleParent::Domain(d1)).unwrap();

        assert!(store.topic(RuleParent::Domain(d1), t).is_ok());
        assert!(store
            .topic(RuleParent::Domain(d2), t)
            .unwrap_err()
            .is_not_found());
        assert!(store
            .remove_topic(RuleParent::Domain(d2), t)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_list_capacity() {
        let mut store = RuleStore::new(StoreLimits {
            max_rules_per_list: 2,
            fine_grained_capacity: 4,
        });
        let d = store.add_domain().unwrap();
        store.add_topic(RuleParent::Domain(d)).unwrap();
        store.add_topic(RuleParent::Domain(d)).unwrap();
        assert!(matches!(
            store.add_topic(RuleParent::Domain(d)),
            Err(AccessError::OutOfResources(_))
        ));
    }

    #[test]
    fn test_find_topic_by_exact_pattern() {
        let mut store = RuleStore::default();
        let d = store.add_domain().unwrap();
        let parent = RuleParent::Domain(d);
        let t = store.add_topic(parent).unwrap();
        store
            .set_topic_access(parent, t, topic_access("data.*", Mode::READ))
            .unwrap();
        assert_eq!(store.find_topic(parent, Some("data.*")), Some(t));
        assert_eq!(store.find_topic(parent, Some("data.x")), None);
    }

    // -----------------------------------------------------------------------
    // Fine-grained
    // -----------------------------------------------------------------------
    #[test]
    fn test_fine_grained_attach_and_clear() {
        let mut store = RuleStore::default();
        let d = store.add_domain().unwrap();
        let parent = RuleParent::Domain(d);
        let t = store.add_topic(parent).unwrap();

        store
            .add_fine_grained_peer(parent, t, FineGrainedTier::Admin, Direction::Read, 7)
            .unwrap();
        let rule = store.topic(parent, t).unwrap();
        assert_eq!(rule.fine_grained(FineGrainedTier::Admin).unwrap().read(), &[7]);
        assert!(rule.fine_grained(FineGrainedTier::App).is_none());

        let cleared = store
            .clear_fine_grained(parent, t, FineGrainedTier::Admin)
            .unwrap();
        assert!(cleared.is_some());
        assert!(store
            .topic(parent, t)
            .unwrap()
            .effective_fine_grained()
            .is_none());
    }

    #[test]
    fn test_fine_grained_capacity_from_limits() {
        let mut store = RuleStore::new(StoreLimits {
            max_rules_per_list: 8,
            fine_grained_capacity: 1,
        });
        let d = store.add_domain().unwrap();
        let parent = RuleParent::Domain(d);
        let t = store.add_topic(parent).unwrap();
        let list = FineGrainedTopic::from_lists(&[1, 2], &[], 8).unwrap();
        assert!(matches!(
            store.set_fine_grained(parent, t, FineGrainedTier::App, list),
            Err(AccessError::OutOfResources(_))
        ));
    }
