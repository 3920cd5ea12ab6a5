// SPDX-License-Identifier: MIT OR Apache-2.0

use cwn_ingest::deps::{parse_depfile, sort_dependencies, Dependency};
use proptest::prelude::*;

fn arb_dependency() -> impl Strategy<Value = Dependency> {
    (
        prop_oneof![Just("npm"), Just("go"), Just("pypi")],
        "[a-z][a-z0-9/._-]{0,16}",
        "[0-9]{1,2}(\\.[0-9]{1,2}){0,2}",
        proptest::collection::btree_map("(sha256|sha512|sha1)", "[a-f0-9]{8}", 0..3),
    )
        .prop_map(|(ecosystem, name, version, hashes)| {
            let mut dep = Dependency::new(ecosystem, name, version, "depfile");
            dep.hashes = hashes;
            dep
        })
}

proptest! {
    #[test]
    fn sorting_is_idempotent(mut deps in proptest::collection::vec(arb_dependency(), 0..12)) {
        sort_dependencies(&mut deps);
        let once = deps.clone();
        sort_dependencies(&mut deps);
        prop_assert_eq!(deps, once);
    }

    #[test]
    fn sorted_output_is_ordered_by_name_then_version(
        mut deps in proptest::collection::vec(arb_dependency(), 2..12),
    ) {
        sort_dependencies(&mut deps);
        for pair in deps.windows(2) {
            let key_a = (&pair[0].name, &pair[0].version);
            let key_b = (&pair[1].name, &pair[1].version);
            prop_assert!(key_a <= key_b);
        }
    }

    #[test]
    fn parsers_never_panic_on_arbitrary_input(
        ecosystem in prop_oneof![Just("npm"), Just("go"), Just("pypi")],
        contents in ".{0,200}",
    ) {
        let _ = parse_depfile(ecosystem, "depfile", &contents);
    }
}
