//! Entry point for meshpipe.
//! Loads one model or primitive through a backend and reports what was uploaded.

use anyhow::{Context, Result, bail};
use asset::{DirectorySource, ResourceSource, TextureData};
use renderer::{
    GpuMesh, GraphicsBackend, GraphicsContext, LoadOptions, RecordingBackend, WgpuBackend,
    WrapMode, create_box, create_from_resource, create_ground_plane, create_sky_box,
    wgpu_backend::wgpu_attributes,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Primitive {
    Box,
    Ground,
    Sky,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BackendKind {
    Trace,
    Wgpu,
}

#[derive(Debug)]
struct Args {
    assets: String,
    model: Option<String>,
    primitive: Option<Primitive>,
    texture: Option<String>,
    wrap: WrapMode,
    backend: BackendKind,
    gpu_backends: wgpu::Backends,
}

fn parse_gpu_backend(val: &str) -> wgpu::Backends {
    match val.to_ascii_lowercase().as_str() {
        "auto" => wgpu::Backends::all(),
        "vulkan" | "vk" => wgpu::Backends::VULKAN,
        "dx12" | "d3d12" => wgpu::Backends::DX12,
        "metal" | "mtl" => wgpu::Backends::METAL,
        "gl" | "opengl" | "gles" => wgpu::Backends::GL,
        other => {
            log::warn!("Unknown GPU backend '{}', falling back to auto.", other);
            wgpu::Backends::all()
        }
    }
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        assets: "assets".to_owned(),
        model: None,
        primitive: None,
        texture: None,
        wrap: WrapMode::ClampToEdge,
        backend: BackendKind::Trace,
        gpu_backends: wgpu::Backends::all(),
    };

    for arg in std::env::args().skip(1) {
        if let Some(v) = arg.strip_prefix("--assets=") {
            args.assets = v.to_owned();
        } else if let Some(v) = arg.strip_prefix("--model=") {
            args.model = Some(v.to_owned());
        } else if let Some(v) = arg.strip_prefix("--texture=") {
            args.texture = Some(v.to_owned());
        } else if let Some(v) = arg.strip_prefix("--primitive=") {
            args.primitive = Some(match v.to_ascii_lowercase().as_str() {
                "box" | "cube" => Primitive::Box,
                "ground" | "plane" => Primitive::Ground,
                "sky" | "skybox" => Primitive::Sky,
                other => bail!("unknown primitive '{}' (expected box|ground|sky)", other),
            });
        } else if let Some(v) = arg.strip_prefix("--wrap=") {
            args.wrap = match v.to_ascii_lowercase().as_str() {
                "clamp" => WrapMode::ClampToEdge,
                "repeat" => WrapMode::Repeat,
                other => bail!("unknown wrap mode '{}' (expected clamp|repeat)", other),
            };
        } else if let Some(v) = arg.strip_prefix("--backend=") {
            args.backend = match v.to_ascii_lowercase().as_str() {
                "trace" => BackendKind::Trace,
                "wgpu" | "gpu" => BackendKind::Wgpu,
                other => bail!("unknown backend '{}' (expected trace|wgpu)", other),
            };
        } else if let Some(v) = arg.strip_prefix("--gpu-backend=") {
            args.gpu_backends = parse_gpu_backend(v);
        } else {
            log::warn!("Ignoring unrecognised argument '{}'", arg);
        }
    }

    if args.model.is_some() == args.primitive.is_some() {
        bail!("pass exactly one of --model=NAME or --primitive=box|ground|sky");
    }
    Ok(args)
}

fn load_texture(source: &dyn ResourceSource, name: Option<&str>) -> Result<TextureData> {
    match name {
        Some(name) => Ok(TextureData::load(source, name)?),
        None => Ok(TextureData::checkerboard(64)),
    }
}

fn load<B: GraphicsBackend>(context: &GraphicsContext<B>, args: &Args) -> Result<GpuMesh<B>> {
    let source = DirectorySource::new(&args.assets);

    let mesh = match (&args.model, args.primitive) {
        (Some(model), _) => {
            let options = LoadOptions {
                wrap: args.wrap,
                ..LoadOptions::default()
            };
            create_from_resource(context, &source, model, &options)
                .with_context(|| format!("loading model '{}' from '{}'", model, args.assets))?
        }
        (None, Some(Primitive::Box)) => match &args.texture {
            Some(name) => create_box(context, Some(&TextureData::load(&source, name)?))?,
            None => create_box(context, None)?,
        },
        (None, Some(Primitive::Ground)) => {
            create_ground_plane(context, &load_texture(&source, args.texture.as_deref())?)?
        }
        (None, Some(Primitive::Sky)) => {
            create_sky_box(context, &load_texture(&source, args.texture.as_deref())?)?
        }
        (None, None) => bail!("nothing to load"),
    };

    log::info!(
        "Uploaded mesh: {} vertices, {} indices, texture: {}",
        mesh.vertex_count(),
        mesh.index_count(),
        if mesh.texture().is_some() { "yes" } else { "no" }
    );
    Ok(mesh)
}

fn run_trace(args: &Args) -> Result<()> {
    let context = GraphicsContext::new(RecordingBackend::new());
    let mut mesh = load(&context, args)?;
    mesh.release();

    let backend = context.borrow_mut();
    for call in backend.calls() {
        println!("{}", call);
    }
    if backend.live_objects() != 0 || backend.invalid_deletes() != 0 {
        bail!(
            "backend left {} live objects and saw {} invalid deletes",
            backend.live_objects(),
            backend.invalid_deletes()
        );
    }
    Ok(())
}

fn run_wgpu(args: &Args) -> Result<()> {
    let backend = pollster::block_on(WgpuBackend::headless(args.gpu_backends))?;
    let context = GraphicsContext::new(backend);
    let mut mesh = load(&context, args)?;

    context.with(|backend| {
        for binding in backend.vertex_bindings(mesh.vertex_array()).unwrap_or_default() {
            let attributes = wgpu_attributes(&binding.layout);
            log::info!(
                "Vertex buffer {} (stride {}): {:?}",
                binding.buffer.0,
                binding.layout.stride,
                attributes
            );
        }
    });

    mesh.release();
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args()?;
    log::info!("Starting meshpipe. {:?}", args);

    match args.backend {
        BackendKind::Trace => run_trace(&args)?,
        BackendKind::Wgpu => run_wgpu(&args)?,
    }

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}
