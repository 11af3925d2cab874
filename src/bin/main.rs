//! S3D Thumbnailer CLI
//!
//! Inspect SimCity 4 model and texture assets and render thumbnails.

use clap::{Parser, Subcommand};
use s3d_thumbnailer::assets::FALLBACK_TEXTURE_GROUP;
use s3d_thumbnailer::fsh::parse_texture_container_with;
use s3d_thumbnailer::{
    decode_to_rgba8, decompress, decompress_if_needed, is_compressed, load_model_bytes, open_source,
    AssetSource, FshParseMode, MemorySource, SoftwareContext, ThumbnailConfig, ThumbnailRenderer,
    TgiKey,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "s3d-thumbnailer")]
#[command(author, version, about = "Decode SimCity 4 assets and render model thumbnails", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decompress a compressed asset
    Decompress {
        /// Compressed input file
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show the bitmaps of an FSH texture and optionally export the main one
    Texture {
        /// FSH file (compressed or not)
        input: PathBuf,

        /// Write the main bitmap as PNG
        #[arg(long)]
        png: Option<PathBuf>,

        /// Zero-pad a slightly short last bitmap instead of failing
        #[arg(long)]
        lenient: bool,
    },

    /// Show the contents of an S3D model
    Model {
        /// S3D file (compressed or not)
        input: PathBuf,
    },

    /// List the assets found in a directory or ZIP archive
    Assets {
        /// Asset directory or ZIP archive
        path: PathBuf,
    },

    /// Render a model thumbnail to PNG
    Thumbnail {
        /// S3D file (compressed or not)
        input: PathBuf,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,

        /// Directory or ZIP archive holding the model's textures
        #[arg(short, long)]
        assets: Option<PathBuf>,

        /// Model group as hex; taken from the input file name if omitted
        #[arg(short, long, value_parser = parse_hex)]
        group: Option<u32>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Thumbnail edge length in pixels
        #[arg(short, long)]
        size: Option<u32>,

        /// Animation frame to render
        #[arg(long)]
        frame: Option<usize>,
    },
}

fn parse_hex(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(digits, 16).map_err(|_| format!("Invalid hex value: '{}'", s))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Decompress { input, output } => {
            decompress_file(&input, &output)?;
        }
        Commands::Texture {
            input,
            png,
            lenient,
        } => {
            show_texture(&input, png.as_deref(), lenient)?;
        }
        Commands::Model { input } => {
            show_model(&input)?;
        }
        Commands::Assets { path } => {
            list_assets(&path)?;
        }
        Commands::Thumbnail {
            input,
            output,
            assets,
            group,
            config,
            size,
            frame,
        } => {
            let mut thumbnail_config = match &config {
                Some(path) => ThumbnailConfig::from_file(path)?,
                None => ThumbnailConfig::default(),
            };
            if let Some(size) = size {
                thumbnail_config = thumbnail_config.with_size(size);
            }
            if let Some(frame) = frame {
                thumbnail_config = thumbnail_config.with_frame(frame);
            }
            render_thumbnail(&input, &output, assets.as_deref(), group, thumbnail_config)?;
        }
    }

    Ok(())
}

fn decompress_file(input: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(input)?;
    if !is_compressed(&bytes) {
        return Err(format!("{:?} is not compressed", input).into());
    }
    let data = decompress(&bytes)?;
    fs::write(output, &data)?;
    tracing::info!("Decompressed {} bytes to {} bytes in {:?}", bytes.len(), data.len(), output);
    Ok(())
}

fn show_texture(input: &Path, png: Option<&Path>, lenient: bool) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(input)?;
    let bytes = decompress_if_needed(&bytes)?;
    let mode = if lenient {
        FshParseMode::Lenient
    } else {
        FshParseMode::Strict
    };
    let container = parse_texture_container_with(&bytes, mode)?;

    println!("Texture container {}", String::from_utf8_lossy(&container.magic));
    println!("  Directory: {}", String::from_utf8_lossy(&container.directory_id));
    println!("  Bitmaps: {}", container.bitmaps.len());
    for bitmap in &container.bitmaps {
        println!(
            "    {} {:?} {}x{} ({} mipmaps)",
            bitmap.name_str(),
            bitmap.format,
            bitmap.width,
            bitmap.height,
            bitmap.mipmap_count
        );
    }

    if let Some(png_path) = png {
        let bitmap = container
            .main_bitmap()
            .ok_or("texture container has no bitmaps")?;
        let pixels = decode_to_rgba8(bitmap)?;
        let image = image::RgbaImage::from_raw(bitmap.width, bitmap.height, pixels)
            .ok_or("decoded bitmap has the wrong size")?;
        image.save(png_path)?;
        println!("Exported {}x{} PNG to {:?}", bitmap.width, bitmap.height, png_path);
    }

    Ok(())
}

fn show_model(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let model = load_model_bytes(&fs::read(input)?)?;

    println!("Model v{}.{}", model.major_version, model.minor_version);
    println!("  Vertex buffers: {} ({} vertices)", model.vertex_buffers.len(), model.vertex_count());
    println!("  Index buffers: {}", model.index_buffers.len());
    println!(
        "  Primitive blocks: {} ({} primitives)",
        model.primitive_blocks.len(),
        model.primitive_count()
    );
    println!("  Materials: {}", model.materials.len());
    for (i, material) in model.materials.iter().enumerate() {
        let textures: Vec<String> = material
            .textures
            .iter()
            .map(|t| format!("0x{:08X}", t.texture_id))
            .collect();
        println!("    #{} flags {:?} textures [{}]", i, material.flags, textures.join(", "));
    }
    println!(
        "  Animation: {} frames at {} fps, {} meshes",
        model.animation.frame_count,
        model.animation.frame_rate,
        model.animation.meshes.len()
    );
    println!("  Bounds: {:?} - {:?}", model.bbox.min, model.bbox.max);

    Ok(())
}

fn list_assets(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = open_source(path)?;
    let keys = source.keys();
    println!("{} assets in {:?}", keys.len(), path);
    for key in keys {
        println!("  {}", key);
    }
    Ok(())
}

fn render_thumbnail(
    input: &Path,
    output: &Path,
    assets: Option<&Path>,
    group: Option<u32>,
    config: ThumbnailConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let model = load_model_bytes(&fs::read(input)?)?;

    let group = group
        .or_else(|| {
            input
                .file_name()
                .and_then(|name| TgiKey::from_file_name(&name.to_string_lossy()))
                .map(|key| key.group)
        })
        .unwrap_or(FALLBACK_TEXTURE_GROUP);

    let source: Box<dyn AssetSource> = match assets {
        Some(path) => open_source(path)?,
        None => Box::new(MemorySource::new()),
    };
    let resolver = config.resolver(source.as_ref(), group);

    tracing::info!(size = config.size, group = %format!("0x{:08X}", group), "Rendering thumbnail");
    let mut ctx = SoftwareContext::new();
    let mut renderer = ThumbnailRenderer::new(config);
    let thumbnail = renderer.render(&mut ctx, &model, &resolver)?;
    thumbnail.save_png(&ctx, output)?;
    println!("Saved {}x{} thumbnail to {:?}", thumbnail.size, thumbnail.size, output);

    Ok(())
}
