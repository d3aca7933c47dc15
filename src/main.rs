use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use sdfrender::{
    canvas::Canvas,
    integrator::{self, Integrator, RenderConfig, Shading, Technique},
    parser,
};

const DEMO_SCENE: &str = include_str!("../scenes/demo.scene");

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Trace,
    March,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Model {
    Lambert,
    Phong,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The scene to render. The built-in demo scene is used when this is omitted.
    scene: Option<PathBuf>,

    /// Write the image to this png, rather than printing it to the terminal.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, default_value_t = 120)]
    width: u32,

    #[arg(long, default_value_t = 80)]
    height: u32,

    /// The number of render threads.
    #[arg(short = 'j', long, default_value_t = num_cpus::get())]
    threads: usize,

    #[arg(long, value_enum, default_value_t = Mode::March)]
    mode: Mode,

    #[arg(long, value_enum, default_value_t = Model::Phong)]
    shading: Model,

    /// Samples per pixel along each axis.
    #[arg(long, default_value_t = 1)]
    samples: u32,

    /// Jitter samples within each pixel, using this seed.
    #[arg(long)]
    jitter: Option<u64>,

    /// Color surfaces by their normals instead of lighting them.
    #[arg(long)]
    normals: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let source = match &args.scene {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => String::from(DEMO_SCENE),
    };
    let scene = parser::parse(&source)?;
    let camera = scene.camera().unwrap_or_default();

    let config = RenderConfig {
        width: args.width,
        height: args.height,
        threads: args.threads,
        technique: match args.mode {
            Mode::Trace => Technique::RayTrace,
            Mode::March => Technique::RayMarch,
        },
        shading: match args.shading {
            Model::Lambert => Shading::Lambert,
            Model::Phong => Shading::Phong,
        },
        samples: args.samples,
    };

    let integrator: Box<dyn Integrator> = if args.normals {
        Box::new(config.debug_normals())
    } else {
        Box::new(config.direct_lighting())
    };

    let cancel = AtomicBool::new(false);
    let canvas = match args.jitter {
        Some(seed) => {
            let sampler = config.jittered_sampler(seed);
            integrator::render(&config, &scene, &camera, sampler, &integrator, &cancel)?
        }
        None => {
            let sampler = config.uniform_sampler();
            integrator::render(&config, &scene, &camera, sampler, &integrator, &cancel)?
        }
    };

    match canvas {
        Some(canvas) => write_output(&args, &canvas),
        None => Ok(()),
    }
}

fn write_output(args: &Args, canvas: &Canvas) -> Result<()> {
    match &args.output {
        Some(path) => {
            image::save_buffer(
                path,
                &canvas.data(),
                canvas.width(),
                canvas.height(),
                image::ColorType::Rgb8,
            )
            .with_context(|| format!("writing {}", path.display()))?;
            log::info!("wrote {}", path.display());
        }
        None => print!("{}", canvas.to_ascii()),
    }

    Ok(())
}
