use interop_conformance::fixtures::registry;
use interop_conformance::strategies::fixtures;
use interop_core::{Transport, ROLE_RELAY};
use interop_plan::{compile, predict, AssumeAvailable, EndpointMode, KnownImages, PlanningFilters};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Ranks never decrease and the registry's (client, relay, endpoint) order survives within a class.
    #[test]
    fn plan_is_stably_sorted(items in fixtures(), target in 1u32..24) {
        let reg = registry(target, &items);
        let plan = compile(&reg, &reg.current_target, &PlanningFilters::default(), &AssumeAvailable).unwrap();

        for (i, e) in plan.entries().iter().enumerate() {
            prop_assert_eq!(e.index, i);
        }
        for w in plan.entries().windows(2) {
            prop_assert!(w[0].classification.rank() <= w[1].classification.rank());
            if w[0].classification == w[1].classification {
                prop_assert!((w[0].client.as_str(), w[0].relay.as_str()) <= (w[1].client.as_str(), w[1].relay.as_str()));
            }
        }
    }

    /// Every entry has a shared version, a matching classification and an active endpoint.
    #[test]
    fn entries_are_consistent_with_registry(items in fixtures(), target in 1u32..24) {
        let reg = registry(target, &items);
        let plan = compile(&reg, &reg.current_target, &PlanningFilters::default(), &AssumeAvailable).unwrap();

        for e in plan.entries() {
            let client = reg.get(&e.client).unwrap();
            let relay = reg.get(&e.relay).unwrap();
            let p = predict(client, relay, &reg.current_target).unwrap();
            prop_assert_eq!(&p.version, &e.version);
            prop_assert_eq!(p.classification, e.classification);
            prop_assert!(e.is_runnable());

            let role = relay.role(ROLE_RELAY).unwrap();
            match e.mode {
                EndpointMode::Docker => {
                    prop_assert_eq!(Some(e.target.as_str()), relay.docker_image(ROLE_RELAY));
                    prop_assert!(e.tls_disable_verify);
                }
                EndpointMode::Remote(transport) => {
                    let declared = role
                        .remote
                        .iter()
                        .filter(|r| r.url == e.target)
                        .any(|r| !r.is_inactive() && r.transport == transport);
                    prop_assert!(declared, "{} is not an active {} endpoint", e.target, transport);
                }
            }
        }

        // Disjoint pairs are reported, never planned.
        for client in reg.clients() {
            for relay in reg.relays() {
                if predict(client, relay, &reg.current_target).is_none() {
                    prop_assert!(!plan.pairs().contains(&(client.id.as_str(), relay.id.as_str())));
                }
            }
        }
    }

    /// Filters only ever remove entries.
    #[test]
    fn filters_select_a_subset(items in fixtures(), target in 1u32..24, quic in any::<bool>()) {
        let reg = registry(target, &items);
        let all = compile(&reg, &reg.current_target, &PlanningFilters::default(), &AssumeAvailable).unwrap();
        let transport = if quic { Transport::Quic } else { Transport::Webtransport };
        let filters = PlanningFilters::builder().remote_only(true).transport(Some(transport)).build().unwrap();
        let some = compile(&reg, &reg.current_target, &filters, &AssumeAvailable).unwrap();

        prop_assert!(some.len() <= all.len());
        for e in some.entries() {
            prop_assert_eq!(e.mode, EndpointMode::Remote(transport));
            prop_assert!(all.entries().iter().any(|a| a.client == e.client && a.relay == e.relay && a.target == e.target));
        }
    }

    /// Missing images turn entries into skips; they never disappear from the plan.
    #[test]
    fn unavailable_images_keep_entries(items in fixtures(), target in 1u32..24) {
        let reg = registry(target, &items);
        let all = compile(&reg, &reg.current_target, &PlanningFilters::default(), &AssumeAvailable).unwrap();
        let none = compile(&reg, &reg.current_target, &PlanningFilters::default(), &KnownImages::new()).unwrap();
        prop_assert_eq!(all.len(), none.len());
        prop_assert_eq!(none.runnable_count(), 0);
    }
}
