#![forbid(unsafe_code)]

//! proptest strategies for version sets, registries and TAP reports.

use std::collections::BTreeSet;

use proptest::prelude::*;

use crate::fixtures::{Fixture, Remote};

/// Non-empty set of draft ordinals.
pub fn version_set() -> impl Strategy<Value = BTreeSet<u32>> {
    prop::collection::btree_set(1u32..24, 1..6)
}

fn remote() -> impl Strategy<Value = Remote> {
    (0u32..1000, prop::bool::ANY, prop_oneof![3 => Just("active"), 1 => Just("inactive"), 1 => Just("untested")]).prop_map(
        |(n, quic, status)| {
            let (scheme, transport) = if quic { ("moqt", "quic") } else { ("https", "webtransport") };
            Remote { url: format!("{scheme}://relay{n}.example:4443"), transport, status }
        },
    )
}

/// Registry of 1 to 5 implementations with ids `i0`, `i1`, ...; each has at least one role.
pub fn fixtures() -> impl Strategy<Value = Vec<Fixture>> {
    let one = (version_set(), prop::bool::ANY, prop::bool::ANY, prop::collection::vec(remote(), 0..3));
    prop::collection::vec(one, 1..6).prop_map(|items| {
        items
            .into_iter()
            .enumerate()
            .map(|(i, (versions, client, docker, remotes))| {
                let mut f = Fixture::new(format!("i{i}"), versions);
                f.client = client;
                f.relay_docker = docker;
                f.remotes = remotes;
                if !f.client && !f.relay_docker && f.remotes.is_empty() {
                    f.client = true;
                }
                f
            })
            .collect()
    })
}

/// Kind of one top-level TAP test point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseKind {
    Pass,
    Fail,
    Skip,
    /// `not ok ... # TODO`
    TodoFailing,
}

pub fn case_kinds() -> impl Strategy<Value = Vec<CaseKind>> {
    prop::collection::vec(
        prop_oneof![Just(CaseKind::Pass), Just(CaseKind::Fail), Just(CaseKind::Skip), Just(CaseKind::TodoFailing)],
        0..12,
    )
}

/// Shape of a generated TAP 14 report.
#[derive(Debug, Clone, Copy, Default)]
pub struct TapShape {
    /// Indented subtest block before each point; nested points fail on purpose.
    pub subtests: bool,
    /// YAML diagnostic block after each point.
    pub diagnostics: bool,
}

/// Render a TAP 14 report for `cases`.
pub fn tap_report(cases: &[CaseKind], shape: TapShape) -> String {
    let mut out = String::from("TAP version 14\n# generated\n");
    out.push_str(&format!("1..{}\n", cases.len()));
    for (i, kind) in cases.iter().enumerate() {
        let n = i + 1;
        if shape.subtests {
            out.push_str(&format!("    # Subtest: case-{n}\n"));
            out.push_str("    1..2\n    not ok 1 - nested failure\n    ok 2 - nested pass\n");
        }
        let line = match kind {
            CaseKind::Pass => format!("ok {n} - case-{n}\n"),
            CaseKind::Fail => format!("not ok {n} - case-{n}\n"),
            CaseKind::Skip => format!("ok {n} - case-{n} # SKIP not supported\n"),
            CaseKind::TodoFailing => format!("not ok {n} - case-{n} # TODO flaky\n"),
        };
        out.push_str(&line);
        if shape.diagnostics {
            out.push_str(&format!(
                "  ---\n  duration_ms: {}\n  message: \"case {n} \\\"done\\\"\"\n  ...\n",
                n * 10
            ));
        }
    }
    out
}

/// Render the same cases in the legacy glyph dialect. Skips have no legacy spelling and are omitted.
pub fn legacy_report(cases: &[CaseKind]) -> String {
    cases
        .iter()
        .enumerate()
        .filter_map(|(i, kind)| match kind {
            CaseKind::Pass | CaseKind::TodoFailing => Some(format!("✓ case-{}\n", i + 1)),
            CaseKind::Fail => Some(format!("✗ case-{}\n", i + 1)),
            CaseKind::Skip => None,
        })
        .collect()
}

/// Expected (passed, failed, skipped, total) for `cases`.
pub fn expected_counts(cases: &[CaseKind]) -> (u32, u32, u32, u32) {
    let count = |k: &[CaseKind]| cases.iter().filter(|c| k.contains(c)).count() as u32;
    let passed = count(&[CaseKind::Pass, CaseKind::TodoFailing]);
    let failed = count(&[CaseKind::Fail]);
    let skipped = count(&[CaseKind::Skip]);
    (passed, failed, skipped, cases.len() as u32)
}
