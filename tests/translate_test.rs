//! End-to-end translation tests: FlowQL in, ClickHouse SQL out.
//!
//! Every case compares the emitted SQL byte-for-byte against the canonical
//! output for the `flow_log` database descriptors shipped in the repo.

use std::path::Path;
use std::sync::OnceLock;

use flowql::descriptor::Registry;
use flowql::{translate, QueryError};

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("db_descriptions");
        Registry::load(&dir).expect("descriptor load should succeed")
    })
}

#[test]
fn test_translate_golden_cases() {
    let cases: &[(&str, &str)] = &[
        (
            "select byte from l4_flow_log",
            "SELECT byte_tx+byte_rx AS byte FROM flow_log.l4_flow_log",
        ),
        (
            "select Sum(byte)/Time_interval as sum_byte, time(time, 120) as time_120 from l4_flow_log group by time_120 having Sum(byte)>=0 limit 10 offset 20",
            "WITH toStartOfInterval(time, toIntervalSecond(120)) + toIntervalSecond(arrayJoin([0]) * 120) AS _time_120 SELECT toUnixTimestamp(_time_120) AS time_120, divide(SUM(byte_tx+byte_rx), 120) AS sum_byte FROM flow_log.l4_flow_log GROUP BY time_120 HAVING SUM(byte_tx+byte_rx) >= 0 LIMIT 20, 10",
        ),
        (
            "select Sum(log_count) as sum_log_count from l4_flow_log order by sum_log_count desc",
            "SELECT SUM(1) AS sum_log_count FROM flow_log.l4_flow_log ORDER BY sum_log_count desc",
        ),
        (
            "select Uniq(ip_0) as uniq_ip_0 from l4_flow_log",
            "SELECT uniqIf([toString(ip4_0), toString(subnet_id_0), toString(is_ipv4), toString(ip6_0)], NOT (((is_ipv4 = 1) OR (ip6_0 = toIPv6('::'))) AND ((is_ipv4 = 0) OR (ip4_0 = toIPv4('0.0.0.0'))))) AS uniq_ip_0 FROM flow_log.l4_flow_log",
        ),
        (
            "select Max(byte) as max_byte, Sum(log_count) as sum_log_count from l4_flow_log having Sum(byte)>=0",
            "SELECT MAX(_sum_byte_tx_plus_byte_rx) AS max_byte, SUM(_sum_1) AS sum_log_count FROM (SELECT SUM(byte_tx+byte_rx) AS _sum_byte_tx_plus_byte_rx, SUM(1) AS _sum_1 FROM flow_log.l4_flow_log) HAVING SUM(_sum_byte_tx_plus_byte_rx) >= 0",
        ),
        (
            "select (Max(byte_tx) + Sum(byte_tx))/1 as max_byte_tx from l4_flow_log",
            "SELECT divide(plus(MAX(_sum_byte_tx), SUM(_sum_byte_tx)), 1) AS max_byte_tx FROM (SELECT SUM(byte_tx) AS _sum_byte_tx FROM flow_log.l4_flow_log)",
        ),
        (
            "select Avg(byte_tx) as avg_byte_tx from l4_flow_log",
            "SELECT AVG(_sum_byte_tx) AS avg_byte_tx FROM (SELECT SUM(byte_tx) AS _sum_byte_tx FROM flow_log.l4_flow_log)",
        ),
        (
            "select Stddev(byte_tx) as stddev_byte_tx from l4_flow_log",
            "SELECT stddevPopStable(_sum_byte_tx) AS stddev_byte_tx FROM (SELECT SUM(byte_tx) AS _sum_byte_tx FROM flow_log.l4_flow_log)",
        ),
        (
            "select Max(byte_tx) as max_byte_tx from l4_flow_log order by max_byte_tx",
            "SELECT MAX(_sum_byte_tx) AS max_byte_tx FROM (SELECT SUM(byte_tx) AS _sum_byte_tx FROM flow_log.l4_flow_log) ORDER BY max_byte_tx asc",
        ),
        (
            "select Spread(byte_tx) as spread_byte_tx from l4_flow_log where time>=60 and time<=180",
            "WITH if(count(_sum_byte_tx)=3, min(_sum_byte_tx), 0) AS min_fillnullaszero__sum_byte_tx SELECT minus(MAX(_sum_byte_tx), min_fillnullaszero__sum_byte_tx) AS spread_byte_tx FROM (SELECT SUM(byte_tx) AS _sum_byte_tx FROM flow_log.l4_flow_log PREWHERE `time` >= 60 AND `time` <= 180)",
        ),
        (
            "select Rspread(byte_tx) as rspread_byte_tx from l4_flow_log where time>=60 and time<=180",
            "WITH if(count(_sum_byte_tx)=3, min(_sum_byte_tx), 0) AS min_fillnullaszero__sum_byte_tx SELECT divide(MAX(_sum_byte_tx)+1e-15, min_fillnullaszero__sum_byte_tx+1e-15) AS rspread_byte_tx FROM (SELECT SUM(byte_tx) AS _sum_byte_tx FROM flow_log.l4_flow_log PREWHERE `time` >= 60 AND `time` <= 180)",
        ),
        (
            "select Rspread(rtt) as rspread_rtt from l4_flow_log ",
            "SELECT divide(MAXArray(arrayFilter(x -> x!=0, _grouparray_rtt))+1e-15, MINArray(arrayFilter(x -> x!=0, _grouparray_rtt))+1e-15) AS rspread_rtt FROM (SELECT groupArrayIf(rtt, rtt != 0) AS _grouparray_rtt FROM flow_log.l4_flow_log)",
        ),
        (
            "select Percentile(byte_tx, 50) as percentile_byte_tx from l4_flow_log",
            "SELECT quantile(50)(_sum_byte_tx) AS percentile_byte_tx FROM (SELECT SUM(byte_tx) AS _sum_byte_tx FROM flow_log.l4_flow_log)",
        ),
        (
            "select Avg(rtt) as avg_rtt from l4_flow_log",
            "SELECT AVGIf(rtt, rtt != 0) AS avg_rtt FROM flow_log.l4_flow_log",
        ),
        (
            "select Max(byte_tx) as max_byte_tx, Avg(rtt) as avg_rtt from l4_flow_log",
            "SELECT MAX(_sum_byte_tx) AS max_byte_tx, AVGArray(arrayFilter(x -> x!=0, _grouparray_rtt)) AS avg_rtt FROM (SELECT SUM(byte_tx) AS _sum_byte_tx, groupArrayIf(rtt, rtt != 0) AS _grouparray_rtt FROM flow_log.l4_flow_log)",
        ),
        (
            "select ((Max(byte_tx))+Avg(rtt ))/(1-Avg(rtt )) as avg_rtt from l4_flow_log",
            "SELECT divide(plus(MAX(_sum_byte_tx), AVGArray(arrayFilter(x -> x!=0, _grouparray_rtt))), minus(1, AVGArray(arrayFilter(x -> x!=0, _grouparray_rtt)))) AS avg_rtt FROM (SELECT SUM(byte_tx) AS _sum_byte_tx, groupArrayIf(rtt, rtt != 0) AS _grouparray_rtt FROM flow_log.l4_flow_log)",
        ),
        (
            "select Apdex(rtt, 100) as apdex_rtt_100 from l4_flow_log",
            "WITH if(COUNTArray(arrayFilter(x -> x!=0, _grouparray_rtt))>0, divide(plus(COUNTArray(arrayFilter(x -> (x <= 100 AND 0 < x), _grouparray_rtt)), divide(COUNTArray(arrayFilter(x -> ((100 < x) AND (x <= (100 * 4))), _grouparray_rtt)), 2)), COUNTArray(arrayFilter(x -> x!=0, _grouparray_rtt))), null) AS divide_0divider_as_null_plus_apdex_satisfy__grouparray_rtt_100_apdex_toler__grouparray_rtt_100_count__grouparray_rtt SELECT divide_0divider_as_null_plus_apdex_satisfy__grouparray_rtt_100_apdex_toler__grouparray_rtt_100_count__grouparray_rtt*100 AS apdex_rtt_100 FROM (SELECT groupArrayIf(rtt, rtt != 0) AS _grouparray_rtt FROM flow_log.l4_flow_log)",
        ),
        (
            "select Max(byte) as max_byte, time(time,120) as time_120 from l4_flow_log group by time_120",
            "WITH toStartOfInterval(_time, toIntervalSecond(120)) + toIntervalSecond(arrayJoin([0]) * 120) AS _time_120 SELECT toUnixTimestamp(_time_120) AS time_120, MAX(_sum_byte_tx_plus_byte_rx) AS max_byte FROM (WITH toStartOfInterval(time, toIntervalSecond(60)) AS _time SELECT _time, SUM(byte_tx+byte_rx) AS _sum_byte_tx_plus_byte_rx FROM flow_log.l4_flow_log GROUP BY _time) GROUP BY time_120",
        ),
    ];

    for (input, expected) in cases {
        let out = translate(registry(), "flow_log", input)
            .unwrap_or_else(|e| panic!("translate({input:?}) failed: {e}"));
        assert_eq!(&out, expected, "translate({input:?})");
    }
}

#[test]
fn test_translate_enum_tag_adds_translation_tier() {
    let out = translate(registry(), "flow_log", "select tap_side from l4_flow_log").unwrap();
    assert_eq!(
        out,
        "SELECT transform(_tap_side, [0, 1, 2], ['rest', 'c', 's'], '') AS tap_side \
         FROM (SELECT tap_side AS _tap_side FROM flow_log.l4_flow_log)"
    );
}

#[test]
fn test_translate_plain_tag_group() {
    let out = translate(
        registry(),
        "flow_log",
        "select pod, Max(byte_tx) as max_byte_tx from l4_flow_log group by pod",
    )
    .unwrap();
    assert_eq!(
        out,
        "SELECT pod, MAX(_sum_byte_tx) AS max_byte_tx FROM \
         (SELECT pod, SUM(byte_tx) AS _sum_byte_tx FROM flow_log.l4_flow_log GROUP BY pod) \
         GROUP BY pod"
    );
}

#[test]
fn test_translate_unknown_column() {
    let err = translate(registry(), "flow_log", "select bytes from l4_flow_log").unwrap_err();
    match err {
        QueryError::UnknownColumn { db, name } => {
            assert_eq!(db, "flow_log");
            assert_eq!(name, "bytes");
        }
        other => panic!("expected UnknownColumn, got {other:?}"),
    }
}

#[test]
fn test_translate_unknown_function() {
    let err = translate(
        registry(),
        "flow_log",
        "select Mean(byte) as x from l4_flow_log",
    )
    .unwrap_err();
    assert!(matches!(err, QueryError::UnknownFunction(name) if name == "Mean"));
}

#[test]
fn test_translate_invalid_argument() {
    let err = translate(
        registry(),
        "flow_log",
        "select Percentile(byte_tx) as x from l4_flow_log",
    )
    .unwrap_err();
    assert!(matches!(err, QueryError::InvalidArgument { .. }));

    let err = translate(
        registry(),
        "flow_log",
        "select Apdex(byte_tx, 100) as x from l4_flow_log",
    )
    .unwrap_err();
    assert!(matches!(err, QueryError::InvalidArgument { .. }));
}

#[test]
fn test_translate_layer_conflict() {
    let err = translate(
        registry(),
        "flow_log",
        "select Uniq(ip_0) as u, Max(byte_tx) as m from l4_flow_log",
    )
    .unwrap_err();
    assert!(matches!(err, QueryError::LayerConflict(name) if name == "Uniq(ip_0)"));
}

#[test]
fn test_translate_malformed() {
    assert!(matches!(
        translate(registry(), "flow_log", "select from where"),
        Err(QueryError::Malformed(_))
    ));
}

// ============================================================================
// Property-style checks over composed projection lists
// ============================================================================

const PROJECTIONS: &[(&str, &str)] = &[
    ("Sum(byte)", "p_sum_byte"),
    ("Max(byte_tx)", "p_max_byte_tx"),
    ("Avg(rtt)", "p_avg_rtt"),
    ("Min(packet)", "p_min_packet"),
    ("Stddev(byte_rx)", "p_stddev_byte_rx"),
];

fn select_of(items: &[(&str, &str)]) -> String {
    let list = items
        .iter()
        .map(|(expr, alias)| format!("{expr} as {alias}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("select {list} from l4_flow_log")
}

#[test]
fn test_every_alias_appears_once_at_outermost_tier() {
    for width in 1..=PROJECTIONS.len() {
        let items = &PROJECTIONS[..width];
        let out = translate(registry(), "flow_log", &select_of(items)).unwrap();
        // The outermost tier is everything before the first nested FROM (.
        let outer = out.split(" FROM (").next().unwrap();
        for (_, alias) in items {
            let hits = out.matches(&format!(" AS {alias}")).count();
            assert_eq!(hits, 1, "alias {alias} in {out}");
            assert!(
                outer.contains(&format!(" AS {alias}")),
                "alias {alias} missing from outermost tier: {out}"
            );
        }
    }
}

#[test]
fn test_reordering_projections_reorders_select() {
    let ab = translate(
        registry(),
        "flow_log",
        &select_of(&[PROJECTIONS[1], PROJECTIONS[2]]),
    )
    .unwrap();
    let ba = translate(
        registry(),
        "flow_log",
        &select_of(&[PROJECTIONS[2], PROJECTIONS[1]]),
    )
    .unwrap();
    let pos = |s: &str, alias: &str| s.find(&format!(" AS {alias}")).unwrap();
    assert!(pos(&ab, "p_max_byte_tx") < pos(&ab, "p_avg_rtt"));
    assert!(pos(&ba, "p_avg_rtt") < pos(&ba, "p_max_byte_tx"));
}

#[test]
fn test_duplicate_filter_yields_one_conjunct() {
    let out = translate(
        registry(),
        "flow_log",
        "select byte from l4_flow_log where time>=60 and time>=60",
    )
    .unwrap();
    assert_eq!(
        out,
        "SELECT byte_tx+byte_rx AS byte FROM flow_log.l4_flow_log PREWHERE `time` >= 60"
    );
}

#[test]
fn test_duplicate_projection_deduped_stable() {
    let out = translate(
        registry(),
        "flow_log",
        "select byte, byte, byte_tx from l4_flow_log",
    )
    .unwrap();
    assert_eq!(
        out,
        "SELECT byte_tx+byte_rx AS byte, byte_tx FROM flow_log.l4_flow_log"
    );
}
