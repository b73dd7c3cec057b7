use crate::net::Addr;
use crate::proto::ospf::{LinkStateDb, LinkStateRecord};
use crate::sim::SimTime;

fn rec(origin: u32, link: u32, cost: f64, neighbor: u32, ts: u64) -> LinkStateRecord {
    LinkStateRecord {
        origin: Addr(origin),
        link_id: link,
        cost,
        bandwidth: 100.0,
        delay: 1.0,
        neighbor: Addr(neighbor),
        timestamp: SimTime(ts),
    }
}

#[test]
fn stale_timestamps_are_ignored() {
    let mut db = LinkStateDb::default();
    assert!(db.update(rec(10, 0, 1.0, 11, 100)));
    // 更旧
    assert!(!db.update(rec(10, 0, 9.0, 11, 50)));
    // 相同时间戳也不接受（已持有）
    assert!(!db.update(rec(10, 0, 9.0, 11, 100)));
    assert_eq!(db.get(Addr(10), 0).expect("record").cost, 1.0);

    // 更新的时间戳替换记录
    assert!(db.update(rec(10, 0, 2.5, 11, 200)));
    assert_eq!(db.get(Addr(10), 0).expect("record").cost, 2.5);
    assert_eq!(db.len(), 1);
}

#[test]
fn records_are_keyed_by_origin_and_link() {
    let mut db = LinkStateDb::default();
    assert!(db.update(rec(10, 0, 1.0, 11, 1)));
    assert!(db.update(rec(10, 1, 1.0, 12, 1)));
    assert!(db.update(rec(11, 0, 1.0, 10, 1)));
    assert_eq!(db.len(), 3);
}

#[test]
fn dijkstra_prefers_the_cheaper_two_hop_path() {
    let mut db = LinkStateDb::default();
    // a-b 代价 5，a-c 与 c-b 各 1（双向）
    let (a, b, c) = (1, 2, 3);
    db.update(rec(a, 0, 5.0, b, 1));
    db.update(rec(b, 0, 5.0, a, 1));
    db.update(rec(a, 1, 1.0, c, 1));
    db.update(rec(c, 0, 1.0, a, 1));
    db.update(rec(c, 1, 1.0, b, 1));
    db.update(rec(b, 1, 1.0, c, 1));

    let spf = db.shortest_paths(Addr(a));
    let to_b = spf.get(&Addr(b)).expect("b reachable");
    assert_eq!(to_b.first_hop, Addr(c));
    assert_eq!(to_b.cost, 2.0);
    assert_eq!(to_b.hops, 2);

    let to_c = spf.get(&Addr(c)).expect("c reachable");
    assert_eq!(to_c.first_hop, Addr(c));
    assert_eq!(to_c.hops, 1);
}

#[test]
fn dijkstra_skips_links_without_a_learned_neighbor() {
    let mut db = LinkStateDb::default();
    db.update(rec(1, 0, 1.0, u32::MAX, 1)); // 邻居未知（广播占位）
    let spf = db.shortest_paths(Addr(1));
    assert!(spf.is_empty());
}

#[test]
fn unreachable_routers_are_absent_from_the_result() {
    let mut db = LinkStateDb::default();
    db.update(rec(1, 0, 1.0, 2, 1));
    db.update(rec(3, 0, 1.0, 4, 1)); // 与 1 不连通
    let spf = db.shortest_paths(Addr(1));
    assert!(spf.contains_key(&Addr(2)));
    assert!(!spf.contains_key(&Addr(3)));
    assert!(!spf.contains_key(&Addr(4)));
}
