//! Property-based tests for sitepack
//!
//! Verifies the lossless-escaping contract of the dump grammar and the
//! rewriter's no-op invariant across randomly generated inputs, including
//! values that embed quote characters and the statement terminator itself.

use proptest::prelude::*;
use rusqlite::Connection;
use sitepack::dump::{dump, load, table_rows};
use sitepack::rewrite_script;
use sitepack::EnvDescriptor;
use std::collections::HashSet;

/// A cell value: NULL or text drawn from a hostile alphabet (quotes,
/// semicolons, newlines, some unicode)
fn cell_strategy() -> impl Strategy<Value = Option<String>> {
    let text = prop::collection::vec(
        prop_oneof![
            Just('"'),
            Just('\''),
            Just(';'),
            Just('\n'),
            Just('\r'),
            Just(','),
            Just('\\'),
            prop::char::range('a', 'z'),
            prop::char::range('0', '9'),
            Just('é'),
            Just('漢'),
            Just(' '),
        ],
        0..40,
    )
    .prop_map(|chars| chars.into_iter().collect::<String>());
    prop_oneof![
        1 => Just(None),
        4 => text.prop_map(Some),
    ]
}

fn rows_strategy() -> impl Strategy<Value = Vec<(Option<String>, Option<String>)>> {
    prop::collection::vec((cell_strategy(), cell_strategy()), 0..20)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Dump then load reproduces an equivalent row set per table, for
    /// arbitrary values including NULLs and terminator sequences.
    #[test]
    fn prop_dump_load_roundtrip(rows in rows_strategy()) {
        let source = Connection::open_in_memory().unwrap();
        source
            .execute("CREATE TABLE payload (a TEXT, b TEXT)", [])
            .unwrap();
        for (a, b) in &rows {
            source
                .execute("INSERT INTO payload VALUES (?1, ?2)", (a, b))
                .unwrap();
        }

        let script = dump(&source, &HashSet::new()).unwrap();
        let destination = Connection::open_in_memory().unwrap();
        let report = load(&destination, &script.text, &HashSet::new()).unwrap();

        prop_assert!(report.failures.is_empty(), "failures: {:?}", report.failures);
        prop_assert_eq!(
            table_rows(&destination, "payload").unwrap(),
            table_rows(&source, "payload").unwrap()
        );
    }

    /// No emitted literal ever contains the raw statement terminator, so
    /// splitting the script back is safe.
    #[test]
    fn prop_script_rows_never_embed_the_terminator(rows in rows_strategy()) {
        let source = Connection::open_in_memory().unwrap();
        source
            .execute("CREATE TABLE payload (a TEXT, b TEXT)", [])
            .unwrap();
        for (a, b) in &rows {
            source
                .execute("INSERT INTO payload VALUES (?1, ?2)", (a, b))
                .unwrap();
        }

        let script = dump(&source, &HashSet::new()).unwrap();
        let statements = script.text.split(";\n").count();
        // One schema statement, one insert per row, plus trailing blanks.
        prop_assert!(statements >= rows.len() + 1);
        for fragment in script.text.split(";\n") {
            let fragment = fragment.trim();
            if fragment.starts_with("INSERT") {
                prop_assert!(fragment.ends_with(')'), "split mid-statement: {fragment:?}");
            }
        }
    }

    /// Rewriting a script whose origin URL equals the destination URL is
    /// a byte-level no-op.
    #[test]
    fn prop_rewrite_noop_for_equal_urls(
        script in "[ -~]{0,200}",
        url in "https://[a-z]{1,12}\\.(com|org|example)",
    ) {
        let origin = EnvDescriptor::new(url.clone(), url.clone());
        prop_assert_eq!(rewrite_script(&script, &origin, &url), script);
    }

    /// Rewriting then rewriting back restores the original script when
    /// neither URL is a substring of the other.
    #[test]
    fn prop_rewrite_back_and_forth(body in "[a-z ]{0,80}") {
        let origin = EnvDescriptor::new("https://origin-host.example", "https://origin-host.example");
        let destination = "https://destination-host.example";
        let script = format!("INSERT INTO \"t\" VALUES(\"{body} https://origin-host.example/page\");\n");

        let rewritten = rewrite_script(&script, &origin, destination);
        let back = rewrite_script(
            &rewritten,
            &EnvDescriptor::new(destination, destination),
            "https://origin-host.example",
        );
        prop_assert_eq!(back, script);
    }
}
