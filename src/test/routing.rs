use crate::net::{Addr, RipRoute};
use crate::proto::routing::{
    parse_static_routes, RouteEntry, RoutingTable, RIP_INFINITY,
};
use crate::sim::SimTime;

fn entry(dest: u32, gate: usize, metric: f64, hops: u32) -> RouteEntry {
    RouteEntry {
        dest: Addr(dest),
        next_hop: gate,
        metric,
        bandwidth: 100.0,
        delay: 1.0,
        hop_count: hops,
        last_update: SimTime::ZERO,
    }
}

#[test]
fn parse_static_routes_accepts_dest_gate_pairs() {
    let routes = parse_static_routes("2:1,3:1,601:1").expect("valid");
    assert_eq!(
        routes,
        vec![(Addr(2), 1), (Addr(3), 1), (Addr(601), 1)]
    );
}

#[test]
fn parse_static_routes_ignores_empty_items() {
    assert_eq!(parse_static_routes("").expect("valid"), vec![]);
    assert_eq!(
        parse_static_routes(" 7:0 , ").expect("valid"),
        vec![(Addr(7), 0)]
    );
}

#[test]
fn parse_static_routes_rejects_garbage() {
    assert!(parse_static_routes("7").is_err());
    assert!(parse_static_routes("a:b").is_err());
    assert!(parse_static_routes("1:2:3").is_err());
}

#[test]
fn rip_import_adds_a_hop_and_installs_unknown_destinations() {
    let mut table = RoutingTable::default();
    let routes = [RipRoute {
        dest: Addr(999),
        metric: 2.0,
        hops: 2,
    }];
    assert!(table.merge_rip(&routes, 1, SimTime(5)));

    let e = table.lookup(Addr(999)).expect("installed");
    assert_eq!(e.next_hop, 1);
    assert_eq!(e.metric, 3.0);
    assert_eq!(e.hop_count, 3);
    assert_eq!(e.last_update, SimTime(5));
}

#[test]
fn rip_import_discards_routes_at_the_hop_limit() {
    let mut table = RoutingTable::default();
    let routes = [
        RipRoute {
            dest: Addr(1),
            metric: 15.0,
            hops: 15,
        },
        RipRoute {
            dest: Addr(2),
            metric: 30.0,
            hops: 40,
        },
    ];
    assert!(!table.merge_rip(&routes, 0, SimTime::ZERO));
    assert!(table.lookup(Addr(1)).is_none());
    assert!(table.lookup(Addr(2)).is_none());
}

#[test]
fn rip_import_keeps_existing_route_unless_strictly_better() {
    let mut table = RoutingTable::default();
    table.install(entry(5, 0, 2.0, 2));

    // 同样的度量：不替换
    let equal = [RipRoute {
        dest: Addr(5),
        metric: 1.0,
        hops: 1,
    }];
    assert!(!table.merge_rip(&equal, 3, SimTime::ZERO));
    assert_eq!(table.lookup(Addr(5)).expect("kept").next_hop, 0);

    // 严格更优：替换
    let better = [RipRoute {
        dest: Addr(5),
        metric: 0.5,
        hops: 1,
    }];
    assert!(table.merge_rip(&better, 3, SimTime::ZERO));
    let e = table.lookup(Addr(5)).expect("replaced");
    assert_eq!(e.next_hop, 3);
    assert_eq!(e.metric, 1.5);
}

#[test]
fn every_imported_hop_count_stays_below_infinity() {
    let mut table = RoutingTable::default();
    let routes: Vec<RipRoute> = (0..40)
        .map(|i| RipRoute {
            dest: Addr(1000 + i),
            metric: i as f64,
            hops: i,
        })
        .collect();
    table.merge_rip(&routes, 0, SimTime::ZERO);
    for e in table.iter() {
        assert!(e.hop_count < RIP_INFINITY, "dest {} hops {}", e.dest, e.hop_count);
    }
}

#[test]
fn rip_export_round_trips_table_entries() {
    let mut table = RoutingTable::default();
    table.install(entry(2, 1, 1.0, 1));
    table.install(entry(3, 2, 4.0, 4));

    let mut exported = table.rip_export();
    exported.sort_by_key(|r| r.dest);
    assert_eq!(exported.len(), 2);
    assert_eq!(exported[0].dest, Addr(2));
    assert_eq!(exported[0].hops, 1);
    assert_eq!(exported[1].dest, Addr(3));
    assert_eq!(exported[1].metric, 4.0);
}
