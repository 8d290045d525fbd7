// main.rs
//
// Compiles a few built-in rooms and writes the results to bsp/.

use brushbsp::contents::Contents;
use brushbsp::float_types::Real;
use brushbsp::{MapBrush, MapEntity, Options, compile};
use log::{error, info};
use nalgebra::Point3;
use std::fs;

/// Six wall brushes enclosing the box from `mins` to `maxs`.
fn hollow_room(mins: Point3<Real>, maxs: Point3<Real>, wall: Real) -> Vec<MapBrush> {
    let mut brushes = Vec::new();
    for axis in 0..3 {
        let mut lo_min = mins - nalgebra::Vector3::repeat(wall);
        let mut lo_max = maxs + nalgebra::Vector3::repeat(wall);
        lo_max[axis] = mins[axis];
        brushes.push(MapBrush::from_box(lo_min, lo_max, Contents::SOLID, "wall"));

        lo_min[axis] = maxs[axis];
        let hi_max = maxs + nalgebra::Vector3::repeat(wall);
        brushes.push(MapBrush::from_box(lo_min, hi_max, Contents::SOLID, "wall"));
    }
    brushes
}

fn main() {
    env_logger::init();
    let _ = fs::create_dir_all("bsp");
    let options = Options::default();

    // 1) a sealed room with a pool and a door
    let mut world = hollow_room(Point3::new(0.0, 0.0, 0.0), Point3::new(256.0, 256.0, 128.0), 16.0);
    world.push(MapBrush::from_box(
        Point3::new(64.0, 64.0, 0.0),
        Point3::new(192.0, 192.0, 32.0),
        Contents::WATER,
        "*water0",
    ));
    let door = MapBrush::from_box(
        Point3::new(240.0, 96.0, 0.0),
        Point3::new(256.0, 160.0, 96.0),
        Contents::SOLID,
        "door",
    );
    let entities = vec![
        MapEntity::world(world),
        MapEntity::point("info_player_start", Point3::new(128.0, 128.0, 48.0)),
        MapEntity::brush_model("func_door", vec![door]),
    ];

    match compile(&entities, &options) {
        Ok(map) => {
            if let Ok(bytes) = map.to_bsp29() {
                let _ = fs::write("bsp/room.bsp", bytes);
            }
            if let Some(prt) = &map.portal_file {
                let _ = fs::write("bsp/room.prt", prt);
            }
            info!("room: {:?}", map.stats);
        }
        Err(e) => error!("room: {e}"),
    }

    // 2) the same room with the ceiling missing leaks
    let mut open = hollow_room(Point3::new(0.0, 0.0, 0.0), Point3::new(256.0, 256.0, 128.0), 16.0);
    open.remove(5);
    let entities = vec![
        MapEntity::world(open),
        MapEntity::point("info_player_start", Point3::new(128.0, 128.0, 48.0)),
    ];
    match compile(&entities, &options) {
        Ok(map) => {
            if let Some(pts) = map.point_file() {
                let _ = fs::write("bsp/leaky.pts", pts);
            }
            if let Ok(bytes) = map.to_bsp29() {
                let _ = fs::write("bsp/leaky.bsp", bytes);
            }
        }
        Err(e) => error!("leaky: {e}"),
    }

    // 3) a leak is fatal under leak testing
    if let Err(e) = compile(&entities, &options.clone().with_leak_test(true)) {
        info!("leak test: {e}");
    }
}
