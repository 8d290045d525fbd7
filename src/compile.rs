//! The compile pipeline, from map entities to BSP tables.
//!
//! Every model (the world and each brush entity) is compiled once per hull.
//! Brushes are loaded up front, in entity order, so plane and texinfo ids
//! never depend on thread scheduling. The (model, hull) jobs then run on
//! the worker pool and are flattened into one set of tables in order.

use crate::brush::{Brush, load_brushes};
use crate::bsp::{BspStats, Tree, build_tree};
use crate::csg::{CsgStats, csg_faces};
use crate::errors::CompileError;
use crate::face::{Face, FaceKey};
use crate::float_types::Real;
use crate::map::{EntityId, MapEntity};
use crate::merge::{merge_surfaces, merge_tree_faces};
use crate::options::Options;
use crate::outside::{
    LeakReport, OutsideStats, fill_outside, find_leak, flood_outside, mark_occupants,
};
use crate::plane::PlaneTable;
use crate::portal::{PortalGraph, portalize};
use crate::surface::build_surfaces;
use crate::texinfo::TexInfoTable;
use crate::writer::{Bsp29Writer, BspData, export, write_portal_file};
use log::{info, warn};
use nalgebra::Point3;
use std::io::Write;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Counts from one (model, hull) job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HullStats {
    pub brushes: usize,
    pub csg: CsgStats,
    pub surfaces: usize,
    pub bsp: BspStats,
    pub portals: usize,
    pub outside: OutsideStats,
    /// Faces removed by merging
    pub merged: usize,
    /// The outside was filled and the tree rebuilt
    pub filled: bool,
}

#[derive(Debug, Clone)]
pub struct HullResult {
    pub hull: usize,
    pub tree: Tree,
    /// Portals of the final tree, when the world's draw hull was portalised
    pub portals: Option<PortalGraph>,
    pub leak: Option<LeakReport>,
    pub stats: HullStats,
}

#[derive(Debug, Clone)]
pub struct CompiledModel {
    pub entity: EntityId,
    /// Indexed by hull number
    pub hulls: Vec<HullResult>,
}

/// Totals over the whole compile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub models: usize,
    pub brushes: usize,
    pub planes: usize,
    pub texinfo: usize,
    /// Face fragments out of CSG, every hull
    pub csg_faces: usize,
    pub nodes: usize,
    pub leaves: usize,
    pub portals: usize,
    pub filled_leaves: usize,
    pub merged_faces: usize,
    pub leaks: usize,
}

#[derive(Debug, Clone)]
pub struct CompiledMap {
    pub models: Vec<CompiledModel>,
    pub bsp: BspData,
    /// Portal file text, written once the world has been sealed and filled
    pub portal_file: Option<String>,
    /// First leak found in the world, draw hull first
    pub leak: Option<LeakReport>,
    pub stats: Stats,
}

impl CompiledMap {
    pub fn to_bsp29(&self) -> Result<Vec<u8>, CompileError> {
        Ok(Bsp29Writer::new(&self.bsp).to_bytes()?)
    }

    pub fn write_bsp29<W: Write>(&self, writer: &mut W) -> Result<(), CompileError> {
        Ok(Bsp29Writer::new(&self.bsp).write(writer)?)
    }

    /// Leak trail as point file text.
    pub fn point_file(&self) -> Option<String> {
        self.leak.as_ref().map(LeakReport::to_pts)
    }

    pub fn world(&self) -> Option<&CompiledModel> {
        self.models.iter().find(|m| m.entity == EntityId::WORLD)
    }
}

struct Job {
    entity: EntityId,
    hull: usize,
    brushes: Vec<Brush>,
}

/// Shared, read-only state of every job.
struct JobContext<'a> {
    planes: &'a PlaneTable,
    texinfo: &'a TexInfoTable,
    options: &'a Options,
    occupants: Vec<(EntityId, Point3<Real>)>,
}

/// Node faces still visible after the fill, in key order.
fn gather_faces(tree: &Tree, visible: &hashbrown::HashSet<FaceKey>) -> Vec<Face> {
    tree.faces
        .iter()
        .enumerate()
        .filter(|(i, _)| visible.contains(&FaceKey(*i)))
        .map(|(_, face)| Face {
            original: None,
            ..face.clone()
        })
        .collect()
}

fn compile_hull(job: Job, ctx: &JobContext<'_>) -> Result<HullResult, CompileError> {
    let Job {
        entity,
        hull,
        brushes,
    } = job;
    let options = ctx.options;
    let world = entity == EntityId::WORLD;
    let eps = options.on_epsilon;
    let mut stats = HullStats {
        brushes: brushes.len(),
        ..HullStats::default()
    };

    let (faces, csg) = csg_faces(&brushes, ctx.planes, options);
    stats.csg = csg;
    let mut surfaces = build_surfaces(faces);
    if hull == 0 {
        stats.merged += merge_surfaces(&mut surfaces);
    }
    stats.surfaces = surfaces.len();

    let midsplit = (hull > 0 || world) && !options.force_good_tree;
    let (mut tree, bsp) = build_tree(entity, surfaces, ctx.planes, ctx.texinfo, options, midsplit)?;
    stats.bsp = bsp;

    let mut portals = None;
    let mut leak = None;
    if world && !options.no_fill {
        let graph = portalize(&tree, ctx.planes, eps, options.world_extent)?;
        stats.outside.occupied_leaves = mark_occupants(&mut tree, ctx.planes, &ctx.occupants);
        stats.outside.outside_leaves = flood_outside(&mut tree, &graph);
        leak = find_leak(&tree, &graph, hull, &ctx.occupants, options.leak_dist);

        if let Some(report) = &leak {
            if options.leak_test {
                return Err(CompileError::Leak {
                    hull,
                    occupant: report.occupant,
                    origin: report.origin,
                });
            }
        } else if stats.outside.occupied_leaves == 0 {
            warn!("hull {hull}: no entities in empty space, outside not filled");
        }

        if stats.outside.occupied_leaves > 0 && leak.is_none() {
            let (visible, filled) = fill_outside(&mut tree, &graph);
            stats.outside.filled_leaves = filled;
            let mut surfaces = build_surfaces(gather_faces(&tree, &visible));
            if hull == 0 {
                stats.merged += merge_surfaces(&mut surfaces);
            }
            let (rebuilt, bsp) =
                build_tree(entity, surfaces, ctx.planes, ctx.texinfo, options, false)?;
            tree = rebuilt;
            stats.bsp = bsp;
            stats.filled = true;
            if hull == 0 {
                portals = Some(portalize(&tree, ctx.planes, eps, options.world_extent)?);
            }
        } else if hull == 0 {
            portals = Some(graph);
        }
    }

    if hull == 0 {
        let texinfo = ctx.texinfo.snapshot();
        stats.merged += merge_tree_faces(&mut tree, &texinfo, options.subdivide_size);
        tree.assign_clusters();
    }
    stats.portals = portals.as_ref().map_or(0, PortalGraph::len);

    Ok(HullResult {
        hull,
        tree,
        portals,
        leak,
        stats,
    })
}

fn run_jobs(jobs: Vec<Job>, ctx: &JobContext<'_>) -> Result<Vec<HullResult>, CompileError> {
    #[cfg(feature = "parallel")]
    {
        let run = || {
            jobs.into_par_iter()
                .map(|job| compile_hull(job, ctx))
                .collect::<Result<Vec<_>, _>>()
        };
        if ctx.options.no_threads {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(1)
                .build()
                .map_err(|e| CompileError::invariant(format!("worker pool: {e}")))?;
            return pool.install(run);
        }
        run()
    }

    #[cfg(not(feature = "parallel"))]
    {
        jobs.into_iter().map(|job| compile_hull(job, ctx)).collect()
    }
}

/// Compiles `entities` (entity 0 is the world) into BSP tables.
///
/// Leaks are reported in the result; they only fail the compile when
/// [`Options::leak_test`] is set.
pub fn compile(entities: &[MapEntity], options: &Options) -> Result<CompiledMap, CompileError> {
    let planes = PlaneTable::new();
    let texinfo = TexInfoTable::new();

    let occupants: Vec<(EntityId, Point3<Real>)> = entities
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.occupant_origin(EntityId(i)).map(|o| (EntityId(i), o)))
        .collect();

    let mut jobs = Vec::new();
    let mut model_ids = Vec::new();
    for (i, entity) in entities.iter().enumerate() {
        let id = EntityId(i);
        if !entity.is_model(id) {
            continue;
        }
        model_ids.push(id);
        for hull in 0..options.num_hulls() {
            let brushes = load_brushes(id, &entity.brushes, hull, options, &planes, &texinfo)?;
            jobs.push(Job {
                entity: id,
                hull,
                brushes,
            });
        }
    }
    info!(
        "{} models, {} jobs, {} planes, {} texinfo",
        model_ids.len(),
        jobs.len(),
        planes.len(),
        texinfo.len()
    );

    let ctx = JobContext {
        planes: &planes,
        texinfo: &texinfo,
        options,
        occupants,
    };
    let mut results = run_jobs(jobs, &ctx)?.into_iter();

    let mut models = Vec::with_capacity(model_ids.len());
    for entity in model_ids {
        let hulls: Vec<HullResult> = results.by_ref().take(options.num_hulls()).collect();
        models.push(CompiledModel { entity, hulls });
    }

    let mut stats = Stats {
        models: models.len(),
        ..Stats::default()
    };
    for result in models.iter().flat_map(|m| &m.hulls) {
        stats.brushes += result.stats.brushes;
        stats.csg_faces += result.stats.csg.faces;
        stats.nodes += result.stats.bsp.nodes;
        stats.leaves += result.stats.bsp.leaves;
        stats.portals += result.stats.portals;
        stats.filled_leaves += result.stats.outside.filled_leaves;
        stats.merged_faces += result.stats.merged;
        stats.leaks += usize::from(result.leak.is_some());
    }

    let world = models.iter().find(|m| m.entity == EntityId::WORLD);
    let leak = world.and_then(|m| m.hulls.iter().find_map(|h| h.leak.clone()));
    let portal_file = world
        .and_then(|m| m.hulls.first())
        .filter(|h| h.stats.filled)
        .and_then(|h| h.portals.as_ref().map(|g| write_portal_file(&h.tree, g)));

    let bsp = export(&models, entities, &planes, &texinfo, options)?;
    stats.planes = bsp.planes.len();
    stats.texinfo = bsp.texinfo.len();

    info!(
        "compiled {} models: {} nodes, {} leaves, {} portals, {} leaks",
        stats.models, stats.nodes, stats.leaves, stats.portals, stats.leaks
    );
    Ok(CompiledMap {
        models,
        bsp,
        portal_file,
        leak,
        stats,
    })
}
