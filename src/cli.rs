use std::{num::NonZeroUsize, time::Instant};

use clap::{Parser, ValueEnum};
use indicatif::ProgressBar;
use log::info;
use minioctree::{
    geometry::WorldBox,
    octree::{
        DEFAULT_MAX_DEPTH, DEFAULT_MAX_PRIMITIVES_PER_LEAF, Octree, OctreeSettings,
        TraversalOptions,
    },
    scene::{generation, primitives::Sphere},
    workload::{self, QueryKind, WorkloadSettings},
};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SceneKind {
    /// Ground sphere, a grid of small spheres and three large ones
    Showcase,
    /// Uniform random cloud of spheres
    Random,
    /// Three spheres, small enough to print the whole tree
    Debug,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Mode {
    Nearest,
    Any,
}

#[derive(Parser)]
#[command(name = "minioctree-cli", about = "Build an octree over spheres and trace rays through it")]
struct Cli {
    #[arg(long, value_enum, default_value_t = SceneKind::Showcase)]
    scene: SceneKind,
    /// Number of spheres in the random scene
    #[arg(long, default_value_t = 1000)]
    sphere_count: usize,
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: u32,
    #[arg(long, default_value_t = DEFAULT_MAX_PRIMITIVES_PER_LEAF)]
    max_per_leaf: NonZeroUsize,
    /// Number of rays to trace
    #[arg(long, default_value_t = 100_000)]
    rays: usize,
    /// Worker threads, defaults to the number of CPUs
    #[arg(long)]
    threads: Option<NonZeroUsize>,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long, value_enum, default_value_t = Mode::Nearest)]
    mode: Mode,
    /// Visit every intersected node, even behind the closest hit
    #[arg(long)]
    no_pruning: bool,
    /// Dump the tree and its flattened form
    #[arg(long)]
    print_tree: bool,
    /// Compare all results against testing every sphere
    #[arg(long)]
    brute_force_check: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let spheres: Vec<Sphere> = match cli.scene {
        SceneKind::Showcase => generation::showcase(cli.seed),
        SceneKind::Random => generation::random_cloud(
            cli.sphere_count,
            &WorldBox::new([-50.0, -50.0, -50.0].into(), [50.0, 50.0, 50.0].into()),
            0.2..1.5,
            cli.seed,
        ),
        SceneKind::Debug => generation::debug_layout(),
    };
    info!("Generated {} spheres", spheres.len());

    let settings = OctreeSettings::builder()
        .max_depth(cli.max_depth)
        .max_primitives_per_leaf(cli.max_per_leaf)
        .build();

    let start = Instant::now();
    let octree = Octree::from_objects(&spheres, &settings)?;
    println!("Built octree in {:?}", start.elapsed());
    octree.print_statistics();

    if cli.print_tree {
        octree.print_tree();
        for (i, sphere) in spheres.iter().enumerate() {
            match octree.find_leaf(&sphere.center) {
                Some(leaf) => println!("Sphere {i} center is in L{}", leaf.index()),
                None => println!("Sphere {i} center is outside of the tree"),
            }
        }
        octree.flatten().print();
    }

    // Rays come from a shell around the scene, aimed at the part above the ground
    let targets = match cli.scene {
        SceneKind::Showcase => WorldBox::new([-10.0, 0.0, -10.0].into(), [10.0, 2.0, 10.0].into()),
        _ => *octree.bounding_box(),
    };
    let shell_radius = match cli.scene {
        SceneKind::Showcase => 30.0,
        _ => targets.size().norm(),
    };
    let rays = workload::rays_from_shell(cli.rays, &targets, shell_radius, cli.seed);

    let query = match cli.mode {
        Mode::Nearest => QueryKind::Nearest,
        Mode::Any => QueryKind::Any,
    };
    let mut workload_settings = WorkloadSettings {
        query,
        options: TraversalOptions {
            distance_pruning: !cli.no_pruning,
        },
        ..Default::default()
    };
    if let Some(threads) = cli.threads {
        workload_settings.threads = threads;
    }

    let bar = ProgressBar::new(rays.len() as u64);
    let result = workload::run(&octree, &spheres, &rays, &workload_settings, {
        let bar = bar.clone();
        move |finished, _| bar.set_position(finished as u64)
    })?;
    bar.finish_and_clear();

    println!(
        "Traced {} rays in {:?} ({:.0} rays/s) on {} threads, {} hits",
        rays.len(),
        result.elapsed,
        result.rays_per_second(),
        workload_settings.threads,
        result.hit_count(),
    );
    println!("{}", result.statistics);

    if cli.brute_force_check {
        let reference = workload::run_linear(&spheres, &rays);
        let mismatches = workload::count_mismatches(&result, &reference, query, 1e-4);
        println!(
            "Brute force took {:?} ({} primitive tests per ray), {} mismatches",
            reference.elapsed,
            spheres.len(),
            mismatches,
        );
        anyhow::ensure!(mismatches == 0, "Octree results differ from brute force");
    }

    Ok(())
}
