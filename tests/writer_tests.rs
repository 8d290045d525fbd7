mod support;

use brushbsp::contents::{CONTENTS_EMPTY, CONTENTS_SOLID, CONTENTS_WATER, Contents};
use brushbsp::map::{MapBrush, MapEntity};
use brushbsp::options::{Limits, Options};
use brushbsp::texinfo::TEX_SKIP;
use brushbsp::writer::BspData;
use brushbsp::writer::bsp29::{BSP_VERSION, NUM_LUMPS};
use brushbsp::{CompileError, CompiledMap, EntityId, compile};
use nalgebra::Point3;
use support::{cube, hollow_room};

fn pool_room(extra: Vec<MapBrush>) -> Vec<MapEntity> {
    let mut world = hollow_room([0.0, 0.0, 0.0], [256.0, 256.0, 128.0], 16.0);
    world.push(cube([64.0, 64.0, 0.0], [192.0, 192.0, 32.0], Contents::WATER));
    world.extend(extra);
    vec![
        MapEntity::world(world),
        MapEntity::point("info_player_start", Point3::new(128.0, 128.0, 48.0)),
        MapEntity::brush_model(
            "func_door",
            vec![cube([224.0, 96.0, 0.0], [240.0, 160.0, 96.0], Contents::SOLID)],
        ),
    ]
}

fn compiled() -> CompiledMap {
    compile(&pool_room(Vec::new()), &Options::default()).expect("compiles")
}

fn check_node_child(bsp: &BspData, child: i32) {
    if child >= 0 {
        assert!((child as usize) < bsp.nodes.len());
    } else {
        assert!(((-child - 1) as usize) < bsp.leafs.len());
    }
}

#[test]
fn tables_only_reference_existing_entries() {
    let map = compiled();
    let bsp = &map.bsp;

    assert_eq!(bsp.leafs[0].contents, CONTENTS_SOLID);
    assert_eq!(bsp.leafs[0].num_marksurfaces, 0);
    assert_eq!(bsp.edges[0], [0, 0]);

    for node in &bsp.nodes {
        assert!((node.plane as usize) < bsp.planes.len());
        for child in node.children {
            check_node_child(bsp, child);
        }
        assert!((node.first_face + node.num_faces) as usize <= bsp.faces.len());
    }
    for node in &bsp.clipnodes {
        assert!((node.plane as usize) < bsp.planes.len());
        for child in node.children {
            if child >= 0 {
                assert!((child as usize) < bsp.clipnodes.len());
            } else {
                assert!(child == CONTENTS_EMPTY || child == CONTENTS_SOLID);
            }
        }
    }
    for leaf in &bsp.leafs {
        let end = leaf.first_marksurface + leaf.num_marksurfaces;
        assert!(end as usize <= bsp.marksurfaces.len());
    }
    for m in &bsp.marksurfaces {
        assert!((*m as usize) < bsp.faces.len());
    }
    for face in &bsp.faces {
        assert!(face.num_edges >= 3);
        assert!((face.first_edge + face.num_edges) as usize <= bsp.surfedges.len());
        assert!((face.plane as usize) < bsp.planes.len());
        assert!((face.texinfo as usize) < bsp.texinfo.len());
    }
    for e in &bsp.surfedges {
        assert_ne!(*e, 0);
        assert!((e.unsigned_abs() as usize) < bsp.edges.len());
    }
    for edge in &bsp.edges[1..] {
        assert!((edge[0] as usize) < bsp.vertices.len());
        assert!((edge[1] as usize) < bsp.vertices.len());
        assert_ne!(edge[0], edge[1]);
    }
    for info in &bsp.texinfo {
        assert!((info.miptex as usize) < bsp.textures.len());
    }
}

#[test]
fn faces_close_into_loops() {
    let bsp = compiled().bsp;
    let vertex = |e: i32| {
        let edge = bsp.edges[e.unsigned_abs() as usize];
        if e > 0 { [edge[0], edge[1]] } else { [edge[1], edge[0]] }
    };
    for face in &bsp.faces {
        let first = face.first_edge as usize;
        let edges = &bsp.surfedges[first..first + face.num_edges as usize];
        for (i, e) in edges.iter().enumerate() {
            let next = edges[(i + 1) % edges.len()];
            assert_eq!(vertex(*e)[1], vertex(next)[0]);
        }
    }
}

#[test]
fn models_follow_entity_order() {
    let map = compiled();
    let bsp = &map.bsp;
    assert_eq!(bsp.models.len(), 2);

    let (world, door) = (&bsp.models[0], &bsp.models[1]);
    assert_eq!(world.headnode[0], 0);
    assert_eq!(world.first_face, 0);
    assert_eq!(door.first_face, world.num_faces);
    assert!(door.num_faces > 0);
    assert!(door.headnode[0] > 0);
    // both collision hulls were written
    assert!(world.headnode[1] >= 0 && world.headnode[2] >= 0);
    assert_eq!(world.headnode[3], 0);
    assert!(door.mins[0] <= 223.0 && door.maxs[0] >= 241.0);

    assert!(bsp.entities.starts_with("{\n\"classname\" \"worldspawn\"\n}\n"));
    assert!(bsp.entities.contains("\"model\" \"*1\""));
    assert!(bsp.entities.contains("\"origin\" \"128 128 48\""));

    let water = bsp.leafs.iter().filter(|l| l.contents == CONTENTS_WATER).count();
    assert!(water > 0);
}

#[test]
fn bsp29_header_describes_the_lumps() {
    let map = compiled();
    let bytes = map.to_bsp29().expect("serialises");
    let read_i32 = |at: usize| {
        i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    };

    assert_eq!(read_i32(0), BSP_VERSION);
    let lump = |i: usize| (read_i32(4 + i * 8) as usize, read_i32(8 + i * 8) as usize);
    for i in 0..NUM_LUMPS {
        let (offset, len) = lump(i);
        assert_eq!(offset % 4, 0);
        assert!(offset + len <= bytes.len());
    }

    let (offset, len) = lump(0);
    assert_eq!(&bytes[offset..offset + len - 1], map.bsp.entities.as_bytes());
    assert_eq!(bytes[offset + len - 1], 0);

    assert_eq!(lump(1).1, map.bsp.planes.len() * 20);
    assert_eq!(lump(10).1, map.bsp.leafs.len() * 28);
    assert_eq!(lump(14).1, map.bsp.models.len() * 64);
    // no visibility or lighting yet
    assert_eq!(lump(4).1, 0);
    assert_eq!(lump(8).1, 0);

    let mut streamed = Vec::new();
    map.write_bsp29(&mut streamed).expect("writes");
    assert_eq!(streamed, bytes);
}

#[test]
fn portal_file_matches_the_written_leaves() {
    let map = compiled();
    let prt = map.portal_file.as_deref().expect("portal file");
    let mut lines = prt.lines();
    assert_eq!(lines.next(), Some("PRT1"));
    let leaves: usize = lines.next().and_then(|l| l.parse().ok()).expect("leaf count");
    let portals: usize = lines.next().and_then(|l| l.parse().ok()).expect("portal count");

    assert_eq!(leaves, map.bsp.models[0].visleafs as usize);
    let rest: Vec<&str> = lines.collect();
    assert_eq!(rest.len(), portals);
    assert!(portals > 0);
    for line in rest {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let points: usize = fields[0].parse().expect("point count");
        assert!(points >= 3);
        for id in &fields[1..3] {
            assert!(id.parse::<usize>().expect("leaf id") < leaves);
        }
        assert_eq!(line.matches('(').count(), points);
    }
}

#[test]
fn skip_faces_are_only_written_on_request() {
    let pillar =
        cube([16.0, 16.0, 0.0], [48.0, 48.0, 96.0], Contents::SOLID).with_tex_flags(TEX_SKIP);
    let entities = pool_room(vec![pillar]);
    let options = Options::default().with_no_clip(true);

    let plain = compile(&entities, &options).expect("compiles");
    let kept = compile(&entities, &options.clone().with_no_skip(true)).expect("compiles");
    assert!(kept.bsp.faces.len() > plain.bsp.faces.len());
}

#[test]
fn outgrowing_a_table_limit_fails_the_compile() {
    let options = Options::default().with_limits(Limits {
        planes: 2,
        ..Limits::BSP29
    });
    match compile(&pool_room(Vec::new()), &options) {
        Err(CompileError::LimitExceeded {
            what,
            count,
            limit,
            entity,
        }) => {
            assert_eq!(what, "planes");
            assert_eq!(limit, 2);
            assert!(count > 2);
            assert_eq!(entity, EntityId::WORLD);
        }
        other => panic!("expected a limit error, got {other:?}"),
    }
}

#[test]
fn texinfo_flags_other_than_skip_keep_faces() {
    let flagged =
        cube([16.0, 16.0, 0.0], [48.0, 48.0, 96.0], Contents::SOLID).with_tex_flags(1 << 2);
    let plain = cube([16.0, 16.0, 0.0], [48.0, 48.0, 96.0], Contents::SOLID);
    let options = Options::default().with_no_clip(true);

    let with_flag = compile(&pool_room(vec![flagged]), &options).expect("compiles");
    let without = compile(&pool_room(vec![plain]), &options).expect("compiles");
    assert_eq!(with_flag.bsp.faces.len(), without.bsp.faces.len());
}
