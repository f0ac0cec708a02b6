use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use profileready::api::{self, DownloadQuery, SignRequest};
use profileready::{
    ApiService, AssetStore, ExecutorKind, Overlay, RasterExecutor, RenderPipeline, RenderRequest,
    Settings, remote,
};

#[derive(Parser, Debug)]
#[command(name = "profileready", version)]
struct Cli {
    /// JSON settings file (environment variables override it).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Raster executor to use.
    #[arg(long, value_enum, global = true)]
    executor: Option<ExecutorKind>,

    #[arg(long, global = true)]
    upload_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    static_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    overlay_dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a photo and write its preview.
    Upload(UploadArgs),
    /// Render a stored photo into a new asset.
    Render(RenderArgs),
    /// Convert the latest raster of an asset to png, jpg or pdf.
    Download(DownloadArgs),
    /// List size presets and overlays.
    Presets,
    /// Upload a file into the caller's remote folder (requires a bearer token).
    Push(PushArgs),
    /// Mint a signed URL for one of the caller's remote files.
    Sign(SignArgs),
}

#[derive(Parser, Debug)]
struct UploadArgs {
    /// Photo to upload.
    file: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Render request JSON; flags below override its fields.
    #[arg(long)]
    request: Option<PathBuf>,

    #[arg(long)]
    asset_id: Option<String>,

    /// Preset name or `WIDTHxHEIGHT`.
    #[arg(long)]
    size: Option<String>,

    #[arg(long)]
    bgcolor: Option<String>,

    #[arg(long)]
    overlay: Option<Overlay>,

    #[arg(long, allow_negative_numbers = true)]
    scale_x: Option<f64>,

    #[arg(long, allow_negative_numbers = true)]
    scale_y: Option<f64>,

    #[arg(long, allow_negative_numbers = true)]
    offset_x: Option<f64>,

    #[arg(long, allow_negative_numbers = true)]
    offset_y: Option<f64>,

    /// Crop rectangle in percent: `X,Y,W,H`.
    #[arg(long, value_parser = parse_crop)]
    crop: Option<[f64; 4]>,

    #[arg(long)]
    brightness: Option<f64>,

    #[arg(long)]
    contrast: Option<f64>,
}

#[derive(Parser, Debug)]
struct DownloadArgs {
    #[arg(long)]
    asset_id: String,

    #[arg(long, default_value = "png")]
    format: String,

    /// Output file (defaults to the attachment name in the current directory).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct PushArgs {
    /// Bearer token resolved by the configured token table.
    #[arg(long, env = "PROFILEREADY_TOKEN")]
    token: String,

    file: PathBuf,
}

#[derive(Parser, Debug)]
struct SignArgs {
    #[arg(long, env = "PROFILEREADY_TOKEN")]
    token: String,

    /// Object path, e.g. `users/<uid>/<file>`.
    #[arg(long)]
    path: String,

    /// Lifetime in seconds.
    #[arg(long)]
    expires_in: Option<u64>,
}

fn parse_crop(s: &str) -> Result<[f64; 4], String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("crop: {e}"))?;
    <[f64; 4]>::try_from(parts).map_err(|_| "crop needs four values: X,Y,W,H".to_string())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    match cli.cmd {
        Command::Presets => cmd_presets(),
        Command::Upload(args) => cmd_upload(&service(&settings)?, args),
        Command::Render(args) => cmd_render(&service(&settings)?, args),
        Command::Download(args) => cmd_download(&service(&settings)?, args),
        Command::Push(args) => cmd_push(&service(&settings)?, args),
        Command::Sign(args) => cmd_sign(&service(&settings)?, args),
    }
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(kind) = cli.executor {
        settings.executor = kind;
    }
    if let Some(dir) = &cli.upload_dir {
        settings.upload_dir = dir.clone();
    }
    if let Some(dir) = &cli.static_dir {
        settings.static_dir = dir.clone();
    }
    if let Some(dir) = &cli.overlay_dir {
        settings.overlay_dir = dir.clone();
    }
    Ok(settings)
}

fn service(settings: &Settings) -> anyhow::Result<ApiService<Box<dyn RasterExecutor>>> {
    let store = AssetStore::open(&settings.upload_dir, &settings.static_dir)?;
    let remote = remote::shared(settings.remote.as_ref());
    let ttl = settings
        .remote
        .as_ref()
        .map(|r| r.signed_url_ttl())
        .unwrap_or_default();
    let pipeline = RenderPipeline::new(settings.build_executor(), store, settings.pipeline_options())
        .with_remote(remote.clone(), ttl);
    Ok(ApiService::new(pipeline)
        .with_verifier(settings.build_verifier()?)
        .with_remote(remote))
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_presets() -> anyhow::Result<()> {
    let overlays: Vec<_> = Overlay::ALL
        .into_iter()
        .map(|o| serde_json::json!({ "name": o.as_str(), "file": o.file_name() }))
        .collect();
    print_json(&serde_json::json!({
        "sizes": api::presets(),
        "overlays": overlays,
    }))
}

fn cmd_upload(svc: &ApiService<Box<dyn RasterExecutor>>, args: UploadArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("read '{}'", args.file.display()))?;
    let name = args.file.file_name().and_then(|n| n.to_str());
    print_json(&svc.upload(&bytes, name)?)
}

fn cmd_render(svc: &ApiService<Box<dyn RasterExecutor>>, args: RenderArgs) -> anyhow::Result<()> {
    let mut req = match &args.request {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("read '{}'", path.display()))?;
            RenderRequest::from_json(&text)?
        }
        None => RenderRequest::default(),
    };
    if args.asset_id.is_some() {
        req.asset_id = args.asset_id;
    }
    if args.size.is_some() {
        req.size = args.size;
    }
    if args.bgcolor.is_some() {
        req.bgcolor = args.bgcolor;
    }
    if let Some(overlay) = args.overlay {
        req.overlay = Some(overlay.as_str().to_string());
    }
    if let Some([x, y, w, h]) = args.crop {
        req.crop_x = Some(x);
        req.crop_y = Some(y);
        req.crop_w = Some(w);
        req.crop_h = Some(h);
    }
    for (slot, value) in [
        (&mut req.overlay_scale_x, args.scale_x),
        (&mut req.overlay_scale_y, args.scale_y),
        (&mut req.overlay_offset_x, args.offset_x),
        (&mut req.overlay_offset_y, args.offset_y),
        (&mut req.brightness, args.brightness),
        (&mut req.contrast, args.contrast),
    ] {
        if value.is_some() {
            *slot = value;
        }
    }
    print_json(&svc.render(&req)?)
}

fn cmd_download(svc: &ApiService<Box<dyn RasterExecutor>>, args: DownloadArgs) -> anyhow::Result<()> {
    let dl = svc.download(&DownloadQuery {
        asset_id: Some(args.asset_id),
        format: Some(args.format),
    })?;
    let out = match args.out {
        Some(out) => out,
        None => PathBuf::from(attachment_name(&dl.content_disposition)),
    };
    std::fs::write(&out, &dl.bytes).with_context(|| format!("write '{}'", out.display()))?;
    tracing::info!(out = %out.display(), content_type = dl.content_type, bytes = dl.bytes.len(), "downloaded");
    Ok(())
}

fn attachment_name(disposition: &str) -> &str {
    disposition
        .split_once("filename=\"")
        .and_then(|(_, rest)| rest.strip_suffix('"'))
        .map(|name| Path::new(name).file_name().and_then(|n| n.to_str()).unwrap_or(name))
        .unwrap_or("download")
}

fn cmd_push(svc: &ApiService<Box<dyn RasterExecutor>>, args: PushArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("read '{}'", args.file.display()))?;
    let name = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file");
    let content_type = remote::content_type_for(&args.file);
    let auth = format!("Bearer {}", args.token);
    print_json(&svc.upload_user_file(Some(&auth), bytes, name, content_type)?)
}

fn cmd_sign(svc: &ApiService<Box<dyn RasterExecutor>>, args: SignArgs) -> anyhow::Result<()> {
    let auth = format!("Bearer {}", args.token);
    let req = SignRequest {
        path: Some(args.path),
        expires_in: args.expires_in,
    };
    print_json(&svc.sign(Some(&auth), &req)?)
}
